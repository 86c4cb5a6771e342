//! The transport contract (spec §4.1): the handful of byte-level operations
//! `ClientSession` needs and nothing else.
//!
//! The session never assumes blocking or non-blocking I/O; it only ever calls
//! `read_some`/`read`/`write`, exactly as `terraqtt`'s context concept does,
//! and is agnostic to whether those calls block the caller's thread or
//! suspend a cooperative task. `try_clone` is the one addition over spec
//! §4.1's three operations: it lets the session keep a second handle to the
//! same stream for its write-side mutex (see `Writer` in `session.rs`),
//! mirroring the `TryClone` split in `mqtt-sync-client/src/io.rs`.

use std::io;
use std::net::TcpStream;

/// Everything `ClientSession` asks of a transport.
pub trait Context: Sized {
    type Error: std::fmt::Debug + std::fmt::Display;

    /// Read 1..=`buf.len()` bytes. Returns `Ok(0)` only on EOF.
    fn read_some(&mut self, buf: &mut [u8]) -> Result<usize, Self::Error>;

    /// Read exactly `buf.len()` bytes or fail.
    fn read(&mut self, buf: &mut [u8]) -> Result<(), Self::Error>;

    /// Write exactly `buf.len()` bytes.
    fn write(&mut self, buf: &[u8]) -> Result<(), Self::Error>;

    /// Produce a second handle onto the same stream, used for the writer
    /// half of the session (see `session::Writer`).
    fn try_clone(&self) -> Result<Self, Self::Error>;
}

impl Context for TcpStream {
    type Error = io::Error;

    fn read_some(&mut self, buf: &mut [u8]) -> Result<usize, io::Error> {
        io::Read::read(self, buf)
    }

    fn read(&mut self, buf: &mut [u8]) -> Result<(), io::Error> {
        io::Read::read_exact(self, buf)
    }

    fn write(&mut self, buf: &[u8]) -> Result<(), io::Error> {
        io::Write::write_all(self, buf)
    }

    fn try_clone(&self) -> Result<Self, io::Error> {
        TcpStream::try_clone(self)
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use std::cell::RefCell;
    use std::collections::VecDeque;
    use std::rc::Rc;

    use super::Context;

    /// An in-memory, single-threaded transport double: one queue of bytes
    /// the session reads from, one it writes to. `try_clone` shares both
    /// queues through `Rc<RefCell<_>>` so the cloned writer handle observes
    /// the same stream as the original.
    #[derive(Clone, Default)]
    pub struct MemoryTransport {
        inbound: Rc<RefCell<VecDeque<u8>>>,
        outbound: Rc<RefCell<VecDeque<u8>>>,
    }

    impl MemoryTransport {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn push_inbound(&self, bytes: &[u8]) {
            self.inbound.borrow_mut().extend(bytes.iter().copied());
        }

        pub fn take_outbound(&self) -> Vec<u8> {
            self.outbound.borrow_mut().drain(..).collect()
        }
    }

    impl Context for MemoryTransport {
        type Error = &'static str;

        fn read_some(&mut self, buf: &mut [u8]) -> Result<usize, Self::Error> {
            let mut inbound = self.inbound.borrow_mut();
            let n = buf.len().min(inbound.len());
            for slot in buf.iter_mut().take(n) {
                *slot = inbound.pop_front().unwrap();
            }
            Ok(n)
        }

        fn read(&mut self, buf: &mut [u8]) -> Result<(), Self::Error> {
            let n = self.read_some(buf)?;
            if n == buf.len() {
                Ok(())
            } else {
                Err("not enough buffered bytes for an exact read")
            }
        }

        fn write(&mut self, buf: &[u8]) -> Result<(), Self::Error> {
            self.outbound.borrow_mut().extend(buf.iter().copied());
            Ok(())
        }

        fn try_clone(&self) -> Result<Self, Self::Error> {
            Ok(self.clone())
        }
    }
}
