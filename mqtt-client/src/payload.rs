//! The constrained payload stream (C7, spec §4.7).
//!
//! Once a PUBLISH's variable header has been decoded, the session hands the
//! callback a bounded view over the transport instead of a buffer: the
//! payload is never copied into an allocation the library controls. The
//! callback may read any prefix of it (or none at all); whatever it leaves
//! unread is drained by the session before the next packet is attempted
//! (see `ClientSession::process_one`'s `skip_remaining` handling).

use crate::context::Context;

/// A read-only view over at most `payload_size` bytes of a PUBLISH payload,
/// borrowing the transport for the lifetime of one `on_publish` invocation.
pub struct PayloadReader<'a, T: Context> {
    transport: &'a mut T,
    remaining: usize,
}

impl<'a, T: Context> PayloadReader<'a, T> {
    pub(crate) fn new(transport: &'a mut T, payload_size: usize) -> Self {
        PayloadReader {
            transport,
            remaining: payload_size,
        }
    }

    /// Bytes of the payload not yet read by the callback.
    pub fn remaining(&self) -> usize {
        self.remaining
    }

    /// Reads up to `buf.len()` bytes, never more than `remaining()`.
    /// Returns `Ok(0)` once the payload is exhausted.
    pub fn read(&mut self, buf: &mut [u8]) -> Result<usize, T::Error> {
        if self.remaining == 0 || buf.is_empty() {
            return Ok(0);
        }
        let want = buf.len().min(self.remaining);
        let n = self.transport.read_some(&mut buf[..want])?;
        self.remaining -= n;
        Ok(n)
    }

    /// Consumed by the session after the callback returns: how many bytes
    /// of this PUBLISH's payload are still sitting on the wire.
    pub(crate) fn into_unread(self) -> usize {
        self.remaining
    }
}

#[cfg(test)]
mod tests {
    use super::PayloadReader;
    use crate::context::test_support::MemoryTransport;

    #[test]
    fn reads_at_most_the_declared_size() {
        let transport = MemoryTransport::new();
        transport.push_inbound(b"hello, more data than the payload");
        let mut transport = transport;
        let mut reader = PayloadReader::new(&mut transport, 5);

        let mut buf = [0u8; 16];
        let n = reader.read(&mut buf).unwrap();
        assert_eq!(n, 5);
        assert_eq!(&buf[..5], b"hello");
        assert_eq!(reader.remaining(), 0);
        assert_eq!(reader.read(&mut buf).unwrap(), 0);
    }

    #[test]
    fn unread_prefix_is_reported() {
        let transport = MemoryTransport::new();
        transport.push_inbound(b"ab");
        let mut transport = transport;
        let mut reader = PayloadReader::new(&mut transport, 2);

        let mut buf = [0u8; 1];
        assert_eq!(reader.read(&mut buf).unwrap(), 1);
        assert_eq!(reader.into_unread(), 1);
    }
}
