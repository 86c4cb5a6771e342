//! Resumable v3 packet body decoders (C4).
//!
//! Each decoder is constructed once the fixed header is known (so it knows
//! its `remaining_length` budget and can validate its flag nibble up front)
//! and is then fed arbitrary chunks of the packet body via `feed`, exactly
//! like [`crate::context::FixedHeaderDecoder`]. A decoder never reads past
//! `remaining_length`; running out of budget mid-field is a
//! `BadPacketPayload` error rather than a panic.

use crate::packet::*;
use crate::primitives::{decode_blob, decode_u16, decode_u8, decode_utf8, BlobScratch, U16Scratch};
use crate::Error;

/// Dispatches a just-parsed [`FixedHeader`] to the matching body decoder,
/// validating the flags nibble per packet type along the way.
pub fn decoder_for(header: &FixedHeader) -> Result<Decoder, Error> {
    use PacketType::*;
    trace!(
        "decoding {} (flags {:#06b}, remaining {})",
        header.packet_type, header.flags, header.remaining_length
    );
    match header.packet_type {
        Connect => Ok(Decoder::Connect(ConnectDecoder::new(header.remaining_length))),
        ConnectAck => Ok(Decoder::ConnectAck(ConnectAckDecoder::new(
            header.remaining_length,
        ))),
        Publish => {
            let dup = header.flags & 0b1000 != 0;
            let qos = QoS::try_from((header.flags & 0b0110) >> 1).map_err(|_| Error::BadQoS)?;
            let retain = header.flags & 0b0001 != 0;
            Ok(Decoder::Publish(PublishDecoder::new(
                header.remaining_length,
                dup,
                retain,
                qos,
            )))
        }
        PublishAck => packet_id_only(header, PacketIdOnlyKind::PubAck),
        PublishReceived => packet_id_only(header, PacketIdOnlyKind::PubRec),
        PublishRelease => {
            require_flags(header, 0b0010)?;
            packet_id_only(header, PacketIdOnlyKind::PubRel)
        }
        PublishComplete => packet_id_only(header, PacketIdOnlyKind::PubComp),
        Subscribe => {
            require_flags(header, 0b0010)?;
            Ok(Decoder::Subscribe(SubscribeDecoder::new(
                header.remaining_length,
            )))
        }
        SubscribeAck => Ok(Decoder::SubscribeAck(SubAckDecoder::new(
            header.remaining_length,
        ))),
        Unsubscribe => {
            require_flags(header, 0b0010)?;
            Ok(Decoder::Unsubscribe(UnsubscribeDecoder::new(
                header.remaining_length,
            )))
        }
        UnsubscribeAck => packet_id_only(header, PacketIdOnlyKind::UnsubAck),
        PingReq => empty(header, PacketType::PingReq),
        PingResp => empty(header, PacketType::PingResp),
        Disconnect => empty(header, PacketType::Disconnect),
        Auth => Err(Error::BadPacketType), // AUTH does not exist in v3.1.1
    }
}

fn require_flags(header: &FixedHeader, expected: u8) -> Result<(), Error> {
    if header.flags == expected {
        Ok(())
    } else {
        Err(Error::BadPacketFlags(header.packet_type))
    }
}

fn empty(header: &FixedHeader, ty: PacketType) -> Result<Decoder, Error> {
    if header.remaining_length != 0 {
        return Err(Error::BadPacketPayload(ty));
    }
    Ok(Decoder::Empty(ty))
}

fn packet_id_only(header: &FixedHeader, kind: PacketIdOnlyKind) -> Result<Decoder, Error> {
    if header.remaining_length != 2 {
        return Err(Error::BadPacketPayload(header.packet_type));
    }
    Ok(Decoder::PacketIdOnly(PacketIdOnlyDecoder {
        kind,
        scratch: U16Scratch::default(),
    }))
}

/// A decoder for exactly one v3 packet body, in progress.
pub enum Decoder {
    Connect(ConnectDecoder),
    ConnectAck(ConnectAckDecoder),
    Publish(PublishDecoder),
    PacketIdOnly(PacketIdOnlyDecoder),
    Subscribe(SubscribeDecoder),
    SubscribeAck(SubAckDecoder),
    Unsubscribe(UnsubscribeDecoder),
    Empty(PacketType),
}

impl Decoder {
    /// Feeds more body bytes in. Returns bytes consumed and, once the body
    /// is fully decoded, the assembled packet.
    pub fn feed(&mut self, input: &[u8]) -> Result<(usize, Option<Packet>), Error> {
        match self {
            Decoder::Connect(d) => d.feed(input),
            Decoder::ConnectAck(d) => d.feed(input),
            Decoder::Publish(d) => d.feed(input),
            Decoder::PacketIdOnly(d) => d.feed(input),
            Decoder::Subscribe(d) => d.feed(input),
            Decoder::SubscribeAck(d) => d.feed(input),
            Decoder::Unsubscribe(d) => d.feed(input),
            Decoder::Empty(ty) => Ok((0, Some(empty_packet(*ty)))),
        }
    }
}

fn empty_packet(ty: PacketType) -> Packet {
    match ty {
        PacketType::PingReq => Packet::PingReq,
        PacketType::PingResp => Packet::PingResp,
        PacketType::Disconnect => Packet::Disconnect(DisconnectHeader::default()),
        _ => unreachable!("empty_packet called with a non-empty packet type"),
    }
}

// ---------------------------------------------------------------------
// CONNECT

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ConnectSeq {
    ProtocolName,
    ProtocolLevel,
    Flags,
    KeepAlive,
    ClientId,
    WillTopic,
    WillMessage,
    Username,
    Password,
    Done,
}

pub struct ConnectDecoder {
    remaining: usize,
    total_consumed: usize,
    seq: ConnectSeq,
    blob: BlobScratch,
    u16: U16Scratch,
    header: ConnectHeader,
    connect_flags: u8,
}

impl ConnectDecoder {
    fn new(remaining_length: usize) -> Self {
        ConnectDecoder {
            remaining: remaining_length,
            total_consumed: 0,
            seq: ConnectSeq::ProtocolName,
            blob: BlobScratch::default(),
            u16: U16Scratch::default(),
            header: ConnectHeader::default(),
            connect_flags: 0,
        }
    }

    // `consumed` below counts only bytes read during *this* call; a CONNECT
    // body routinely spans many `feed` calls (one per incoming chunk), so the
    // final remaining-length check needs a running total across all of them,
    // tracked separately in `self.total_consumed`.
    fn feed(&mut self, input: &[u8]) -> Result<(usize, Option<Packet>), Error> {
        let mut consumed = 0;

        if self.seq == ConnectSeq::ProtocolName {
            let (n, result) = decode_utf8(&mut self.blob, &input[consumed..]);
            consumed += n;
            match result? {
                None => {
                    self.total_consumed += consumed;
                    return Ok((consumed, None));
                }
                Some(name) => {
                    if name != "MQTT" && name != "MQIsdp" {
                        return Err(Error::BadPacketPayload(PacketType::Connect));
                    }
                    self.seq = ConnectSeq::ProtocolLevel;
                }
            }
        }

        if self.seq == ConnectSeq::ProtocolLevel {
            let (n, byte) = decode_u8(&input[consumed..]);
            consumed += n;
            match byte {
                None => {
                    self.total_consumed += consumed;
                    return Ok((consumed, None));
                }
                Some(_level) => self.seq = ConnectSeq::Flags,
            }
        }

        if self.seq == ConnectSeq::Flags {
            let (n, byte) = decode_u8(&input[consumed..]);
            consumed += n;
            match byte {
                None => {
                    self.total_consumed += consumed;
                    return Ok((consumed, None));
                }
                Some(flags) => {
                    if flags & 0x01 != 0 {
                        return Err(Error::BadPacketPayload(PacketType::Connect));
                    }
                    self.connect_flags = flags;
                    self.header.clean_session = flags & 0x02 != 0;
                    self.seq = ConnectSeq::KeepAlive;
                }
            }
        }

        if self.seq == ConnectSeq::KeepAlive {
            let (n, value) = decode_u16(&mut self.u16, &input[consumed..]);
            consumed += n;
            match value {
                None => {
                    self.total_consumed += consumed;
                    return Ok((consumed, None));
                }
                Some(keep_alive) => {
                    self.header.keep_alive = keep_alive;
                    self.seq = ConnectSeq::ClientId;
                }
            }
        }

        if self.seq == ConnectSeq::ClientId {
            let (n, result) = decode_utf8(&mut self.blob, &input[consumed..]);
            consumed += n;
            match result? {
                None => {
                    self.total_consumed += consumed;
                    return Ok((consumed, None));
                }
                Some(client_id) => {
                    if client_id.is_empty() && !self.header.clean_session {
                        return Err(Error::EmptyClientIdentifier);
                    }
                    self.header.client_id = client_id;
                    self.seq = ConnectSeq::WillTopic;
                }
            }
        }

        let has_will = self.connect_flags & 0x04 != 0;
        if self.seq == ConnectSeq::WillTopic {
            if !has_will {
                self.seq = ConnectSeq::Username;
            } else {
                let (n, result) = decode_utf8(&mut self.blob, &input[consumed..]);
                consumed += n;
                match result? {
                    None => {
                        self.total_consumed += consumed;
                        return Ok((consumed, None));
                    }
                    Some(topic) => {
                        let qos = (self.connect_flags & 0x18) >> 3;
                        let qos = QoS::try_from(qos).map_err(|_| Error::BadQoS)?;
                        self.header.last_will = Some(LastWill {
                            topic,
                            qos,
                            retain: self.connect_flags & 0x20 != 0,
                            ..Default::default()
                        });
                        self.seq = ConnectSeq::WillMessage;
                    }
                }
            }
        }

        if self.seq == ConnectSeq::WillMessage {
            let (n, payload) = decode_blob(&mut self.blob, &input[consumed..]);
            consumed += n;
            match payload {
                None => {
                    self.total_consumed += consumed;
                    return Ok((consumed, None));
                }
                Some(payload) => {
                    if let Some(will) = self.header.last_will.as_mut() {
                        will.payload = payload;
                    }
                    self.seq = ConnectSeq::Username;
                }
            }
        }

        let has_username = self.connect_flags & 0x80 != 0;
        let has_password = self.connect_flags & 0x40 != 0;
        if has_password && !has_username {
            return Err(Error::BadUsernamePassword);
        }

        if self.seq == ConnectSeq::Username {
            if !has_username {
                self.seq = ConnectSeq::Password;
            } else {
                let (n, result) = decode_utf8(&mut self.blob, &input[consumed..]);
                consumed += n;
                match result? {
                    None => {
                        self.total_consumed += consumed;
                        return Ok((consumed, None));
                    }
                    Some(username) => {
                        self.header.username = Some(username);
                        self.seq = ConnectSeq::Password;
                    }
                }
            }
        }

        if self.seq == ConnectSeq::Password {
            if !has_password {
                self.seq = ConnectSeq::Done;
            } else {
                let (n, password) = decode_blob(&mut self.blob, &input[consumed..]);
                consumed += n;
                match password {
                    None => {
                        self.total_consumed += consumed;
                        return Ok((consumed, None));
                    }
                    Some(password) => {
                        self.header.password = Some(password);
                        self.seq = ConnectSeq::Done;
                    }
                }
            }
        }

        self.total_consumed += consumed;
        if self.total_consumed != self.remaining {
            return Err(Error::BadPacketPayload(PacketType::Connect));
        }
        Ok((consumed, Some(Packet::Connect(std::mem::take(&mut self.header)))))
    }
}

// ---------------------------------------------------------------------
// CONNACK

pub struct ConnectAckDecoder {
    remaining: usize,
    got_flags: bool,
    session_present: bool,
}

impl ConnectAckDecoder {
    fn new(remaining_length: usize) -> Self {
        ConnectAckDecoder {
            remaining: remaining_length,
            got_flags: false,
            session_present: false,
        }
    }

    fn feed(&mut self, input: &[u8]) -> Result<(usize, Option<Packet>), Error> {
        if self.remaining != 2 {
            return Err(Error::BadPacketPayload(PacketType::ConnectAck));
        }
        let mut consumed = 0;
        if !self.got_flags {
            let (n, byte) = decode_u8(&input[consumed..]);
            consumed += n;
            match byte {
                None => return Ok((consumed, None)),
                Some(flags) => {
                    if flags & 0xFE != 0 {
                        return Err(Error::BadPacketFlags(PacketType::ConnectAck));
                    }
                    self.session_present = flags & 0x01 != 0;
                    self.got_flags = true;
                }
            }
        }
        let (n, byte) = decode_u8(&input[consumed..]);
        consumed += n;
        match byte {
            None => Ok((consumed, None)),
            Some(code) => Ok((
                consumed,
                Some(Packet::ConnectAck(ConnectAckHeader {
                    session_present: self.session_present,
                    reason_code: code,
                    ..Default::default()
                })),
            )),
        }
    }
}

// ---------------------------------------------------------------------
// PUBLISH

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PublishSeq {
    Topic,
    PacketId,
    Done,
}

pub struct PublishDecoder {
    remaining: usize,
    consumed_total: usize,
    seq: PublishSeq,
    blob: BlobScratch,
    u16: U16Scratch,
    topic: String,
    dup: bool,
    retain: bool,
    qos: QoS,
}

impl PublishDecoder {
    fn new(remaining_length: usize, dup: bool, retain: bool, qos: QoS) -> Self {
        PublishDecoder {
            remaining: remaining_length,
            consumed_total: 0,
            seq: PublishSeq::Topic,
            blob: BlobScratch::default(),
            u16: U16Scratch::default(),
            topic: String::new(),
            dup,
            retain,
            qos,
        }
    }

    fn feed(&mut self, input: &[u8]) -> Result<(usize, Option<Packet>), Error> {
        let mut consumed = 0;

        if self.seq == PublishSeq::Topic {
            let (n, result) = decode_utf8(&mut self.blob, &input[consumed..]);
            consumed += n;
            match result? {
                None => {
                    self.consumed_total += consumed;
                    return Ok((consumed, None));
                }
                Some(topic) => {
                    self.topic = topic;
                    self.seq = if self.qos == QoS::AtMostOnce {
                        PublishSeq::Done
                    } else {
                        PublishSeq::PacketId
                    };
                }
            }
        }

        if self.seq == PublishSeq::PacketId {
            let (n, value) = decode_u16(&mut self.u16, &input[consumed..]);
            consumed += n;
            match value {
                None => {
                    self.consumed_total += consumed;
                    return Ok((consumed, None));
                }
                Some(id) => {
                    self.consumed_total += consumed;
                    let payload_size = self.remaining.saturating_sub(self.consumed_total);
                    return Ok((
                        consumed,
                        Some(Packet::Publish(PublishHeader {
                            topic: std::mem::take(&mut self.topic),
                            dup: self.dup,
                            retain: self.retain,
                            qos: self.qos,
                            packet_id: Some(id),
                            payload_size,
                            ..Default::default()
                        })),
                    ));
                }
            }
        }

        self.consumed_total += consumed;
        let payload_size = self.remaining.saturating_sub(self.consumed_total);
        Ok((
            consumed,
            Some(Packet::Publish(PublishHeader {
                topic: std::mem::take(&mut self.topic),
                dup: self.dup,
                retain: self.retain,
                qos: self.qos,
                packet_id: None,
                payload_size,
                ..Default::default()
            })),
        ))
    }
}

// ---------------------------------------------------------------------
// PUBACK / PUBREC / PUBREL / PUBCOMP / UNSUBACK: packet identifier only.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PacketIdOnlyKind {
    PubAck,
    PubRec,
    PubRel,
    PubComp,
    UnsubAck,
}

pub struct PacketIdOnlyDecoder {
    kind: PacketIdOnlyKind,
    scratch: U16Scratch,
}

impl PacketIdOnlyDecoder {
    fn feed(&mut self, input: &[u8]) -> Result<(usize, Option<Packet>), Error> {
        let (consumed, value) = decode_u16(&mut self.scratch, input);
        match value {
            None => Ok((consumed, None)),
            Some(id) => {
                let packet = match self.kind {
                    PacketIdOnlyKind::PubAck => Packet::PublishAck(PubResponseHeader {
                        packet_id: id,
                        ..Default::default()
                    }),
                    PacketIdOnlyKind::PubRec => Packet::PublishReceived(PubResponseHeader {
                        packet_id: id,
                        ..Default::default()
                    }),
                    PacketIdOnlyKind::PubRel => Packet::PublishRelease(PubResponseHeader {
                        packet_id: id,
                        ..Default::default()
                    }),
                    PacketIdOnlyKind::PubComp => Packet::PublishComplete(PubResponseHeader {
                        packet_id: id,
                        ..Default::default()
                    }),
                    PacketIdOnlyKind::UnsubAck => Packet::UnsubscribeAck(UnsubAckHeader {
                        packet_id: id,
                        ..Default::default()
                    }),
                };
                Ok((consumed, Some(packet)))
            }
        }
    }
}

// ---------------------------------------------------------------------
// SUBSCRIBE

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SubscribeSeq {
    Filter,
    Options,
}

pub struct SubscribeDecoder {
    remaining: usize,
    consumed_total: usize,
    got_packet_id: bool,
    seq: SubscribeSeq,
    u16: U16Scratch,
    blob: BlobScratch,
    packet_id: PacketId,
    pending_filter: String,
    subscriptions: Vec<SubscriptionRequest>,
}

impl SubscribeDecoder {
    fn new(remaining_length: usize) -> Self {
        SubscribeDecoder {
            remaining: remaining_length,
            consumed_total: 0,
            got_packet_id: false,
            seq: SubscribeSeq::Filter,
            u16: U16Scratch::default(),
            blob: BlobScratch::default(),
            packet_id: 0,
            pending_filter: String::new(),
            subscriptions: Vec::new(),
        }
    }

    fn feed(&mut self, input: &[u8]) -> Result<(usize, Option<Packet>), Error> {
        let mut consumed = 0;

        if !self.got_packet_id {
            let (n, value) = decode_u16(&mut self.u16, &input[consumed..]);
            consumed += n;
            self.consumed_total += n;
            match value {
                None => return Ok((consumed, None)),
                Some(id) => {
                    self.packet_id = id;
                    self.got_packet_id = true;
                }
            }
        }

        loop {
            if self.consumed_total >= self.remaining {
                if self.subscriptions.is_empty() {
                    return Err(Error::BadPacketPayload(PacketType::Subscribe));
                }
                return Ok((
                    consumed,
                    Some(Packet::Subscribe(SubscribeHeader {
                        packet_id: self.packet_id,
                        subscriptions: std::mem::take(&mut self.subscriptions),
                        ..Default::default()
                    })),
                ));
            }

            if self.seq == SubscribeSeq::Filter {
                let (n, result) = decode_utf8(&mut self.blob, &input[consumed..]);
                consumed += n;
                self.consumed_total += n;
                match result? {
                    None => return Ok((consumed, None)),
                    Some(filter) => {
                        self.pending_filter = filter;
                        self.seq = SubscribeSeq::Options;
                    }
                }
            }

            let (n, byte) = decode_u8(&input[consumed..]);
            consumed += n;
            self.consumed_total += n;
            match byte {
                None => return Ok((consumed, None)),
                Some(options) => {
                    let qos = QoS::try_from(options & 0x03).map_err(|_| Error::BadQoS)?;
                    self.subscriptions.push(SubscriptionRequest {
                        topic_filter: std::mem::take(&mut self.pending_filter),
                        qos,
                        no_local: options & 0x04 != 0,
                        retain_as_published: options & 0x08 != 0,
                        retain_handling: RetainHandling::try_from((options & 0x30) >> 4)
                            .unwrap_or_default(),
                    });
                    self.seq = SubscribeSeq::Filter;
                }
            }
        }
    }
}

// ---------------------------------------------------------------------
// SUBACK

pub struct SubAckDecoder {
    remaining: usize,
    consumed_total: usize,
    got_packet_id: bool,
    u16: U16Scratch,
    packet_id: PacketId,
    reason_codes: Vec<u8>,
}

impl SubAckDecoder {
    fn new(remaining_length: usize) -> Self {
        SubAckDecoder {
            remaining: remaining_length,
            consumed_total: 0,
            got_packet_id: false,
            u16: U16Scratch::default(),
            packet_id: 0,
            reason_codes: Vec::new(),
        }
    }

    fn feed(&mut self, input: &[u8]) -> Result<(usize, Option<Packet>), Error> {
        let mut consumed = 0;
        if !self.got_packet_id {
            let (n, value) = decode_u16(&mut self.u16, &input[consumed..]);
            consumed += n;
            self.consumed_total += n;
            match value {
                None => return Ok((consumed, None)),
                Some(id) => {
                    self.packet_id = id;
                    self.got_packet_id = true;
                }
            }
        }

        while self.consumed_total < self.remaining {
            let (n, byte) = decode_u8(&input[consumed..]);
            consumed += n;
            self.consumed_total += n;
            match byte {
                None => return Ok((consumed, None)),
                Some(code) => self.reason_codes.push(code),
            }
        }

        if self.reason_codes.is_empty() {
            return Err(Error::BadPacketPayload(PacketType::SubscribeAck));
        }
        Ok((
            consumed,
            Some(Packet::SubscribeAck(SubAckHeader {
                packet_id: self.packet_id,
                reason_codes: std::mem::take(&mut self.reason_codes),
                ..Default::default()
            })),
        ))
    }
}

// ---------------------------------------------------------------------
// UNSUBSCRIBE

pub struct UnsubscribeDecoder {
    remaining: usize,
    consumed_total: usize,
    got_packet_id: bool,
    u16: U16Scratch,
    blob: BlobScratch,
    packet_id: PacketId,
    filters: Vec<String>,
}

impl UnsubscribeDecoder {
    fn new(remaining_length: usize) -> Self {
        UnsubscribeDecoder {
            remaining: remaining_length,
            consumed_total: 0,
            got_packet_id: false,
            u16: U16Scratch::default(),
            blob: BlobScratch::default(),
            packet_id: 0,
            filters: Vec::new(),
        }
    }

    fn feed(&mut self, input: &[u8]) -> Result<(usize, Option<Packet>), Error> {
        let mut consumed = 0;
        if !self.got_packet_id {
            let (n, value) = decode_u16(&mut self.u16, &input[consumed..]);
            consumed += n;
            self.consumed_total += n;
            match value {
                None => return Ok((consumed, None)),
                Some(id) => {
                    self.packet_id = id;
                    self.got_packet_id = true;
                }
            }
        }

        while self.consumed_total < self.remaining {
            let (n, result) = decode_utf8(&mut self.blob, &input[consumed..]);
            consumed += n;
            self.consumed_total += n;
            match result? {
                None => return Ok((consumed, None)),
                Some(filter) => self.filters.push(filter),
            }
        }

        if self.filters.is_empty() {
            return Err(Error::BadPacketPayload(PacketType::Unsubscribe));
        }
        Ok((
            consumed,
            Some(Packet::Unsubscribe(UnsubscribeHeader {
                packet_id: self.packet_id,
                topic_filters: std::mem::take(&mut self.filters),
                ..Default::default()
            })),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::FixedHeaderDecoder;

    fn decode_one(bytes: &[u8]) -> Packet {
        let mut header_decoder = FixedHeaderDecoder::new();
        let (n, header) = header_decoder.feed(bytes).unwrap();
        let header = header.expect("complete fixed header");
        let mut decoder = decoder_for(&header).unwrap();
        let (body_consumed, packet) = decoder.feed(&bytes[n..]).unwrap();
        assert_eq!(n + body_consumed, bytes.len());
        packet.expect("complete packet")
    }

    #[test]
    fn pingreq_roundtrip() {
        let packet = decode_one(&[0xC0, 0x00]);
        assert_eq!(packet, Packet::PingReq);
    }

    #[test]
    fn connect_minimal() {
        #[rustfmt::skip]
        let bytes = [
            0x10, 0x10,
            0x00, 0x04, b'M', b'Q', b'T', b'T',
            0x04,
            0x02, // clean session
            0x00, 0x00, // keep alive
            0x00, 0x04, b't', b'e', b's', b't',
        ];
        let packet = decode_one(&bytes);
        match packet {
            Packet::Connect(header) => {
                assert_eq!(header.client_id, "test");
                assert!(header.clean_session);
                assert_eq!(header.keep_alive, 0);
                assert!(header.last_will.is_none());
            }
            other => panic!("expected CONNECT, got {other:?}"),
        }
    }

    #[test]
    fn connect_rejects_empty_client_id_without_clean_session() {
        #[rustfmt::skip]
        let bytes = [
            0x10, 0x0C,
            0x00, 0x04, b'M', b'Q', b'T', b'T',
            0x04,
            0x00, // clean_session = false
            0x00, 0x00,
            0x00, 0x00,
        ];
        let mut header_decoder = FixedHeaderDecoder::new();
        let (n, header) = header_decoder.feed(&bytes).unwrap();
        let header = header.unwrap();
        let mut decoder = decoder_for(&header).unwrap();
        let result = decoder.feed(&bytes[n..]);
        assert_eq!(result, Err(Error::EmptyClientIdentifier));
    }

    #[test]
    fn publish_qos0_computes_payload_size() {
        #[rustfmt::skip]
        let bytes = [
            0x30, 0x09,
            0x00, 0x03, b'a', b'/', b'b',
            b'h', b'i',
        ];
        let mut header_decoder = FixedHeaderDecoder::new();
        let (n, header) = header_decoder.feed(&bytes).unwrap();
        let header = header.unwrap();
        let mut decoder = decoder_for(&header).unwrap();
        let (body_consumed, packet) = decoder.feed(&bytes[n..n + 5]).unwrap();
        assert_eq!(body_consumed, 5);
        match packet.unwrap() {
            Packet::Publish(p) => {
                assert_eq!(p.topic, "a/b");
                assert_eq!(p.qos, QoS::AtMostOnce);
                assert_eq!(p.packet_id, None);
                assert_eq!(p.payload_size, 2);
            }
            other => panic!("expected PUBLISH, got {other:?}"),
        }
    }

    #[test]
    fn subscribe_two_filters() {
        #[rustfmt::skip]
        let bytes = [
            0x82, 0x0C,
            0x00, 0x01,
            0x00, 0x03, b'a', b'/', b'b', 0x00,
            0x00, 0x03, b'c', b'/', b'd', 0x01,
        ];
        let packet = decode_one(&bytes);
        match packet {
            Packet::Subscribe(header) => {
                assert_eq!(header.packet_id, 1);
                assert_eq!(header.subscriptions.len(), 2);
                assert_eq!(header.subscriptions[0].topic_filter, "a/b");
                assert_eq!(header.subscriptions[0].qos, QoS::AtMostOnce);
                assert_eq!(header.subscriptions[1].qos, QoS::AtLeastOnce);
            }
            other => panic!("expected SUBSCRIBE, got {other:?}"),
        }
    }

    #[test]
    fn puback_roundtrip() {
        let packet = decode_one(&[0x40, 0x02, 0x00, 0x07]);
        match packet {
            Packet::PublishAck(ack) => assert_eq!(ack.packet_id, 7),
            other => panic!("expected PUBACK, got {other:?}"),
        }
    }

    #[test]
    fn disconnect_roundtrip() {
        let packet = decode_one(&[0xE0, 0x00]);
        assert_eq!(packet, Packet::Disconnect(DisconnectHeader::default()));
    }

    #[test]
    fn byte_at_a_time_connect_resumes_correctly() {
        #[rustfmt::skip]
        let bytes = [
            0x10, 0x10,
            0x00, 0x04, b'M', b'Q', b'T', b'T',
            0x04,
            0x02,
            0x00, 0x0A,
            0x00, 0x04, b't', b'e', b's', b't',
        ];
        let mut header_decoder = FixedHeaderDecoder::new();
        let mut offset = 0;
        let mut header = None;
        while header.is_none() {
            let (n, h) = header_decoder.feed(&bytes[offset..offset + 1]).unwrap();
            offset += n;
            header = h;
        }
        let header = header.unwrap();
        let mut decoder = decoder_for(&header).unwrap();
        let mut packet = None;
        while offset < bytes.len() {
            let (n, p) = decoder.feed(&bytes[offset..offset + 1]).unwrap();
            offset += n;
            if let Some(p) = p {
                packet = Some(p);
            }
        }
        match packet.unwrap() {
            Packet::Connect(header) => {
                assert_eq!(header.client_id, "test");
                assert_eq!(header.keep_alive, 10);
            }
            other => panic!("expected CONNECT, got {other:?}"),
        }
    }
}
