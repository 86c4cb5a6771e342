//! The client session loop (C9, spec §4.9).
//!
//! `ClientSession<T>` owns the read side of the transport and the read
//! context; `Writer<T>` is the cheap-to-clone write side, guarded by a
//! single mutex (spec §4.9: "writes are serialized by a single mutex that is
//! held across one whole packet's emission"). The split exists so that a
//! callback invoked from inside `process_one` — which already holds `&mut
//! self` for the read side — can still write a response packet (a QoS 1
//! PUBACK from `on_publish`, for instance) through its own clone of the
//! writer without fighting the borrow checker over one shared field.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use log::{debug, trace, warn};
use mqtt_core::{
    decoder_for as decode_v3, encode_packet as encode_v3, ConnectAckHeader, ConnectHeader,
    Decoder as DecoderV3, DisconnectHeader, Error, FixedHeader, FixedHeaderDecoder, LastWill,
    Packet, PacketId, PubResponseHeader, PublishHeader, QoS, SubAckHeader, SubscribeHeader,
    SubscriptionRequest, UnsubAckHeader, UnsubscribeHeader,
};
use mqtt_packet::{decoder_for as decode_v5, encode_packet as encode_v5, Decoder as DecoderV5};

use crate::context::Context;
use crate::error::SessionError;
use crate::keepalive::{Clock, KeepAlive, KeepAliveAction, SystemClock};
use crate::payload::PayloadReader;

/// Which wire version this session speaks. A single `Packet` data model
/// (see `mqtt-core::packet`) serves both; only the codec entry points
/// differ.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProtocolVersion {
    V3,
    V5,
}

/// One fully decoded inbound packet, handed to the caller's handler by
/// `process_one`. Replaces the source's overridable-method callback
/// surface (`on_connack`, `on_publish`, ...) with a single tagged variant
/// and one handler function, per spec §9's re-architecture note.
pub enum Event<'a, T: Context> {
    ConnectAck(&'a ConnectAckHeader),
    /// `payload` yields at most `header.payload_size` bytes; whatever the
    /// handler leaves unread is drained by the session afterward.
    Publish {
        header: &'a PublishHeader,
        payload: &'a mut PayloadReader<'a, T>,
    },
    PublishAck(&'a PubResponseHeader),
    PublishReceived(&'a PubResponseHeader),
    PublishRelease(&'a PubResponseHeader),
    PublishComplete(&'a PubResponseHeader),
    SubscribeAck(&'a SubAckHeader),
    UnsubscribeAck(&'a UnsubAckHeader),
    PingResp,
}

fn encode(
    version: ProtocolVersion,
    packet: &Packet,
    payload: &[u8],
    out: &mut Vec<u8>,
) -> Result<(), Error> {
    match version {
        ProtocolVersion::V3 => encode_v3(packet, payload, out),
        ProtocolVersion::V5 => encode_v5(packet, payload, out),
    }
}

enum BodyDecoder {
    V3(DecoderV3),
    V5(DecoderV5),
}

impl BodyDecoder {
    fn for_header(version: ProtocolVersion, header: &FixedHeader) -> Result<Self, Error> {
        Ok(match version {
            ProtocolVersion::V3 => BodyDecoder::V3(decode_v3(header)?),
            ProtocolVersion::V5 => BodyDecoder::V5(decode_v5(header)?),
        })
    }

    fn feed(&mut self, input: &[u8]) -> Result<(usize, Option<Packet>), Error> {
        match self {
            BodyDecoder::V3(d) => d.feed(input),
            BodyDecoder::V5(d) => d.feed(input),
        }
    }
}

enum ReadState {
    FixedHeader(FixedHeaderDecoder),
    Body {
        header: FixedHeader,
        decoder: BodyDecoder,
    },
}

impl ReadState {
    fn new() -> Self {
        ReadState::FixedHeader(FixedHeaderDecoder::new())
    }
}

struct Shared<T: Context, C: Clock> {
    writer: Mutex<T>,
    keep_alive: Mutex<KeepAlive<C>>,
    version: ProtocolVersion,
}

/// The write side of a session: cheap to clone (it's an `Arc` handle), safe
/// to call concurrently (writes are serialized by an internal mutex), and
/// the thing a callback uses to answer an inbound packet without needing
/// `&mut ClientSession`.
pub struct Writer<T: Context, C: Clock = SystemClock> {
    shared: Arc<Shared<T, C>>,
}

impl<T: Context, C: Clock> Clone for Writer<T, C> {
    fn clone(&self) -> Self {
        Writer {
            shared: self.shared.clone(),
        }
    }
}

impl<T: Context, C: Clock> Writer<T, C> {
    fn write_packet(&self, packet: &Packet, payload: &[u8]) -> Result<(), SessionError<T::Error>> {
        let mut buf = Vec::new();
        encode(self.shared.version, packet, payload, &mut buf)?;
        trace!(
            "writing {} ({} bytes total)",
            packet.packet_type(),
            buf.len()
        );
        {
            let mut transport = self.shared.writer.lock().unwrap();
            transport.write(&buf).map_err(SessionError::Transport)?;
        }
        let mut keep_alive = self.shared.keep_alive.lock().unwrap();
        keep_alive.reset_next_ping();
        if matches!(packet, Packet::PingReq) {
            keep_alive.note_ping_sent();
        }
        Ok(())
    }

    pub fn disconnect(&self) -> Result<(), SessionError<T::Error>> {
        debug!("sending DISCONNECT");
        self.write_packet(&Packet::Disconnect(DisconnectHeader::default()), &[])
    }

    pub fn publish(
        &self,
        topic: &str,
        payload: &[u8],
        packet_id: Option<PacketId>,
        qos: QoS,
        retain: bool,
    ) -> Result<(), SessionError<T::Error>> {
        if qos != QoS::AtMostOnce && packet_id.is_none() {
            return Err(Error::BadPacketPayload(mqtt_core::PacketType::Publish).into());
        }
        let header = PublishHeader {
            topic: topic.to_owned(),
            dup: false,
            retain,
            qos,
            packet_id,
            payload_size: payload.len(),
            ..Default::default()
        };
        self.write_packet(&Packet::Publish(header), payload)
    }

    pub fn publish_ack(&self, packet_id: PacketId) -> Result<(), SessionError<T::Error>> {
        self.write_packet(
            &Packet::PublishAck(PubResponseHeader {
                packet_id,
                ..Default::default()
            }),
            &[],
        )
    }

    pub fn publish_received(&self, packet_id: PacketId) -> Result<(), SessionError<T::Error>> {
        self.write_packet(
            &Packet::PublishReceived(PubResponseHeader {
                packet_id,
                ..Default::default()
            }),
            &[],
        )
    }

    pub fn publish_release(&self, packet_id: PacketId) -> Result<(), SessionError<T::Error>> {
        self.write_packet(
            &Packet::PublishRelease(PubResponseHeader {
                packet_id,
                ..Default::default()
            }),
            &[],
        )
    }

    pub fn publish_complete(&self, packet_id: PacketId) -> Result<(), SessionError<T::Error>> {
        self.write_packet(
            &Packet::PublishComplete(PubResponseHeader {
                packet_id,
                ..Default::default()
            }),
            &[],
        )
    }

    pub fn subscribe(
        &self,
        filters: &[(String, QoS)],
        packet_id: PacketId,
    ) -> Result<(), SessionError<T::Error>> {
        let subscriptions = filters
            .iter()
            .map(|(topic_filter, qos)| SubscriptionRequest {
                topic_filter: topic_filter.clone(),
                qos: *qos,
                no_local: false,
                retain_as_published: false,
                retain_handling: Default::default(),
            })
            .collect();
        self.write_packet(
            &Packet::Subscribe(SubscribeHeader {
                packet_id,
                subscriptions,
                ..Default::default()
            }),
            &[],
        )
    }

    pub fn unsubscribe(
        &self,
        filters: &[String],
        packet_id: PacketId,
    ) -> Result<(), SessionError<T::Error>> {
        self.write_packet(
            &Packet::Unsubscribe(UnsubscribeHeader {
                packet_id,
                topic_filters: filters.to_vec(),
                ..Default::default()
            }),
            &[],
        )
    }

    pub fn ping(&self) -> Result<(), SessionError<T::Error>> {
        self.write_packet(&Packet::PingReq, &[])
    }
}

/// Parameters for a CONNECT beyond the three the public API names
/// explicitly (spec §6); everything else defaults.
#[derive(Debug, Clone, Default)]
pub struct ConnectOptions {
    pub last_will: Option<LastWill>,
    pub username: Option<String>,
    pub password: Option<Vec<u8>>,
}

/// The client session: one per logical connection. Drives inbound parsing
/// (`process_one`), the keep-alive clock (`update_state`), and exposes the
/// write-side operations directly as well as through a cloneable `Writer`.
pub struct ClientSession<T: Context, C: Clock = SystemClock> {
    reader: T,
    writer: Writer<T, C>,
    read_state: ReadState,
    /// Bytes of a previous PUBLISH's payload the callback left unread
    /// (spec §4.7); drained at the start of the next `process_one` call.
    skip_remaining: usize,
}

impl<T: Context> ClientSession<T, SystemClock> {
    /// Wraps an already-connected transport. Call `connect` next to emit
    /// CONNECT and arm the keep-alive timer.
    pub fn new(version: ProtocolVersion, transport: T) -> Result<Self, SessionError<T::Error>> {
        Self::with_clock(version, transport, SystemClock)
    }
}

impl<T: Context, C: Clock> ClientSession<T, C> {
    pub fn with_clock(
        version: ProtocolVersion,
        transport: T,
        clock: C,
    ) -> Result<Self, SessionError<T::Error>> {
        let writer_handle = transport.try_clone().map_err(SessionError::Transport)?;
        let shared = Arc::new(Shared {
            writer: Mutex::new(writer_handle),
            keep_alive: Mutex::new(KeepAlive::new(clock, Duration::ZERO)),
            version,
        });
        Ok(ClientSession {
            reader: transport,
            writer: Writer { shared },
            read_state: ReadState::new(),
            skip_remaining: 0,
        })
    }

    /// A cheap-to-clone handle to the write side, for use from inside a
    /// `process_one` handler or from another thread.
    pub fn writer(&self) -> Writer<T, C> {
        self.writer.clone()
    }

    pub fn connect(
        &mut self,
        client_id: &str,
        clean_session: bool,
        keep_alive: Duration,
        options: ConnectOptions,
    ) -> Result<(), SessionError<T::Error>> {
        if !clean_session && client_id.is_empty() {
            return Err(Error::EmptyClientIdentifier.into());
        }
        let keep_alive_secs = keep_alive.as_secs().min(u64::from(u16::MAX)) as u16;
        let header = ConnectHeader {
            client_id: client_id.to_owned(),
            clean_session,
            keep_alive: keep_alive_secs,
            last_will: options.last_will,
            username: options.username,
            password: options.password,
            ..Default::default()
        };
        debug!("connecting as {client_id:?} (clean_session={clean_session})");
        self.writer.write_packet(&Packet::Connect(header), &[])?;
        let keep_alive_dur = Duration::from_secs(u64::from(keep_alive_secs));
        self.writer
            .shared
            .keep_alive
            .lock()
            .unwrap()
            .set_timeout(keep_alive_dur);
        Ok(())
    }

    pub fn disconnect(&mut self) -> Result<(), SessionError<T::Error>> {
        self.writer.disconnect()
    }

    pub fn publish(
        &mut self,
        topic: &str,
        payload: &[u8],
        packet_id: Option<PacketId>,
        qos: QoS,
        retain: bool,
    ) -> Result<(), SessionError<T::Error>> {
        self.writer.publish(topic, payload, packet_id, qos, retain)
    }

    pub fn subscribe(
        &mut self,
        filters: &[(String, QoS)],
        packet_id: PacketId,
    ) -> Result<(), SessionError<T::Error>> {
        self.writer.subscribe(filters, packet_id)
    }

    pub fn unsubscribe(
        &mut self,
        filters: &[String],
        packet_id: PacketId,
    ) -> Result<(), SessionError<T::Error>> {
        self.writer.unsubscribe(filters, packet_id)
    }

    pub fn ping(&mut self) -> Result<(), SessionError<T::Error>> {
        self.writer.ping()
    }

    /// Advances the keep-alive clock. May emit PINGREQ; may surface
    /// `ConnectionTimedOut` (spec §4.9).
    pub fn update_state(&mut self) -> Result<(), SessionError<T::Error>> {
        let action = self.writer.shared.keep_alive.lock().unwrap().poll();
        match action {
            KeepAliveAction::Idle => Ok(()),
            KeepAliveAction::SendPing => {
                debug!("keep-alive interval elapsed, sending PINGREQ");
                self.writer.ping()
            }
            KeepAliveAction::TimedOut => {
                warn!("no PINGRESP within the ping response timeout");
                Err(SessionError::ConnectionTimedOut)
            }
        }
    }

    /// Drives inbound parsing. Returns the number of transport bytes
    /// consumed this call (spec §4.9's six-step `process_one` semantics).
    pub fn process_one<F>(
        &mut self,
        available: usize,
        handler: &mut F,
    ) -> Result<usize, SessionError<T::Error>>
    where
        F: FnMut(&Writer<T, C>, Event<'_, T>) -> Result<(), SessionError<T::Error>>,
    {
        if available == 0 {
            return Ok(0);
        }

        let mut consumed = 0usize;
        let mut byte = [0u8; 1];

        while consumed < available {
            if self.skip_remaining > 0 {
                let n = self
                    .reader
                    .read_some(&mut byte)
                    .map_err(SessionError::Transport)?;
                if n == 0 {
                    return Ok(consumed);
                }
                self.skip_remaining -= 1;
                consumed += 1;
                continue;
            }

            match &mut self.read_state {
                ReadState::FixedHeader(decoder) => {
                    let n = self
                        .reader
                        .read_some(&mut byte)
                        .map_err(SessionError::Transport)?;
                    if n == 0 {
                        return Ok(consumed);
                    }
                    consumed += 1;
                    let (_, header) = decoder.feed(&byte)?;
                    if let Some(header) = header {
                        trace!(
                            "fixed header parsed: {} (remaining {})",
                            header.packet_type,
                            header.remaining_length
                        );
                        let mut body_decoder =
                            BodyDecoder::for_header(self.writer.shared.version, &header)?;
                        // Zero-length bodies (PINGREQ, PINGRESP, v3
                        // DISCONNECT) complete on an empty feed; check
                        // before consuming any byte that belongs to the
                        // next packet.
                        if let (_, Some(packet)) = body_decoder.feed(&[])? {
                            self.handle_packet(packet, handler)?;
                            return Ok(consumed);
                        }
                        self.read_state = ReadState::Body {
                            header,
                            decoder: body_decoder,
                        };
                    }
                }
                ReadState::Body { decoder, .. } => {
                    let n = self
                        .reader
                        .read_some(&mut byte)
                        .map_err(SessionError::Transport)?;
                    if n == 0 {
                        return Ok(consumed);
                    }
                    consumed += 1;
                    let (_, packet) = decoder.feed(&byte)?;
                    if let Some(packet) = packet {
                        self.handle_packet(packet, handler)?;
                        return Ok(consumed);
                    }
                }
            }
        }

        Ok(consumed)
    }

    /// A full packet has just been decoded: for PUBLISH, hand the payload
    /// to the handler as a bounded stream and record what it leaves
    /// unread; for everything else, dispatch the tagged event directly.
    /// Either way the read state resets for the next packet.
    fn handle_packet<F>(&mut self, packet: Packet, handler: &mut F) -> Result<(), SessionError<T::Error>>
    where
        F: FnMut(&Writer<T, C>, Event<'_, T>) -> Result<(), SessionError<T::Error>>,
    {
        self.read_state = ReadState::new();
        if let Packet::Publish(header) = packet {
            let mut payload = PayloadReader::new(&mut self.reader, header.payload_size);
            let result = handler(
                &self.writer,
                Event::Publish {
                    header: &header,
                    payload: &mut payload,
                },
            );
            self.skip_remaining = payload.into_unread();
            return result;
        }
        self.dispatch(&packet, handler)
    }

    fn dispatch<F>(&self, packet: &Packet, handler: &mut F) -> Result<(), SessionError<T::Error>>
    where
        F: FnMut(&Writer<T, C>, Event<'_, T>) -> Result<(), SessionError<T::Error>>,
    {
        match packet {
            Packet::ConnectAck(header) => handler(&self.writer, Event::ConnectAck(header)),
            Packet::PublishAck(header) => handler(&self.writer, Event::PublishAck(header)),
            Packet::PublishReceived(header) => {
                handler(&self.writer, Event::PublishReceived(header))
            }
            Packet::PublishRelease(header) => handler(&self.writer, Event::PublishRelease(header)),
            Packet::PublishComplete(header) => {
                handler(&self.writer, Event::PublishComplete(header))
            }
            Packet::SubscribeAck(header) => handler(&self.writer, Event::SubscribeAck(header)),
            Packet::UnsubscribeAck(header) => handler(&self.writer, Event::UnsubscribeAck(header)),
            Packet::PingResp => {
                self.writer.shared.keep_alive.lock().unwrap().on_pong();
                handler(&self.writer, Event::PingResp)
            }
            Packet::Publish(_) => unreachable!("PUBLISH is dispatched by process_one directly"),
            other => {
                warn!("unexpected inbound packet {}", other.packet_type());
                Ok(())
            }
        }
    }
}

impl<T: Context, C: Clock> Drop for ClientSession<T, C> {
    fn drop(&mut self) {
        let _ = self.writer.disconnect();
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::{ClientSession, ConnectOptions, Event, ProtocolVersion};
    use crate::context::test_support::MemoryTransport;
    use mqtt_core::QoS;

    fn session(transport: MemoryTransport) -> ClientSession<MemoryTransport> {
        ClientSession::new(ProtocolVersion::V3, transport).unwrap()
    }

    #[test]
    fn scenario_1_bare_connect() {
        let transport = MemoryTransport::new();
        let mut s = session(transport.clone());
        s.connect("name", true, Duration::from_secs(30), ConnectOptions::default())
            .unwrap();
        assert_eq!(
            transport.take_outbound(),
            vec![
                0x10, 0x10, 0x00, 0x04, 0x4D, 0x51, 0x54, 0x54, 0x04, 0x02, 0x00, 0x1E, 0x00,
                0x04, 0x6E, 0x61, 0x6D, 0x65,
            ]
        );
    }

    #[test]
    fn scenario_2_pingreq_pingresp() {
        let transport = MemoryTransport::new();
        let mut s = session(transport.clone());

        s.ping().unwrap();
        assert_eq!(transport.take_outbound(), vec![0xC0, 0x00]);

        transport.push_inbound(&[0xD0, 0x00]);
        let mut pongs = 0;
        s.process_one(2, &mut |_writer, event| {
            if matches!(event, Event::PingResp) {
                pongs += 1;
            }
            Ok(())
        })
        .unwrap();
        assert_eq!(pongs, 1);
    }

    #[test]
    fn scenario_3_disconnect() {
        let transport = MemoryTransport::new();
        let mut s = session(transport.clone());
        s.disconnect().unwrap();
        assert_eq!(transport.take_outbound(), vec![0xE0, 0x00]);
    }

    #[test]
    fn scenario_4_publish_qos0_byte_at_a_time() {
        let transport = MemoryTransport::new();
        let mut s = session(transport.clone());

        s.publish("a/b", b"hi", None, QoS::AtMostOnce, false)
            .unwrap();
        let wire = transport.take_outbound();
        assert_eq!(
            wire,
            vec![0x30, 0x07, 0x00, 0x03, 0x61, 0x2F, 0x62, 0x68, 0x69]
        );

        transport.push_inbound(&wire);
        let mut seen = 0;
        let mut payload_bytes = Vec::new();
        let mut total_consumed = 0;
        for _ in 0..7 {
            total_consumed += s
                .process_one(1, &mut |_writer, event| {
                    if let Event::Publish { header, payload } = event {
                        seen += 1;
                        assert_eq!(header.topic, "a/b");
                        assert_eq!(header.payload_size, 2);
                        let mut buf = [0u8; 2];
                        let n = payload.read(&mut buf).unwrap();
                        payload_bytes.extend_from_slice(&buf[..n]);
                    }
                    Ok(())
                })
                .unwrap();
        }
        assert_eq!(total_consumed, 7);
        assert_eq!(seen, 1);
        assert_eq!(payload_bytes, b"hi");
    }
}
