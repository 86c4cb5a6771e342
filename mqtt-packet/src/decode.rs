//! Resumable v5 packet body decoders (C6, read side).
//!
//! Each decoder here follows the same shape as `mqtt_core::decode`'s v3
//! decoders (fed arbitrary chunks via `feed`, state tracked in `seq` plus a
//! running `consumed`/`total_consumed` tally compared against the fixed
//! header's `remaining_length`); the one thing v5 adds to every packet type
//! is a properties block, decoded by [`crate::props::PropertyDecoder`] and
//! folded into the same header structs `mqtt-core` already defines.

use std::convert::TryFrom;

use mqtt_core::primitives::{decode_blob, decode_u16, decode_u8, decode_utf8, BlobScratch, U16Scratch};
use mqtt_core::{
    AuthHeader, ConnectAckHeader, ConnectHeader, DisconnectHeader, Error, FixedHeader, LastWill,
    Packet, PacketId, PacketType, PropertyId, PubResponseHeader, PublishHeader, QoS, RetainHandling,
    SubAckHeader, SubscribeHeader, SubscriptionRequest, UnsubAckHeader, UnsubscribeHeader,
};

use crate::props::{PropertyDecoder, PropertyValue};

/// Dispatches a just-parsed [`FixedHeader`] to the matching v5 body decoder,
/// validating the flags nibble per packet type along the way.
pub fn decoder_for(header: &FixedHeader) -> Result<Decoder, Error> {
    use PacketType::*;
    let ty = header.packet_type;
    trace!(
        "decoding v5 {} (flags {:#06b}, remaining {})",
        ty, header.flags, header.remaining_length
    );
    match ty {
        Connect => Ok(Decoder::Connect(Box::new(ConnectDecoder::new(
            header.remaining_length,
        )))),
        ConnectAck => {
            require_flags(header, 0)?;
            Ok(Decoder::ConnectAck(Box::new(ConnectAckDecoder::new(
                header.remaining_length,
            ))))
        }
        Publish => {
            let dup = header.flags & 0b1000 != 0;
            let qos = QoS::try_from((header.flags & 0b0110) >> 1).map_err(|_| Error::BadQoS)?;
            if qos == QoS::AtMostOnce && dup {
                return Err(Error::BadPacketFlags(ty));
            }
            let retain = header.flags & 0b0001 != 0;
            Ok(Decoder::Publish(Box::new(PublishDecoder::new(
                header.remaining_length,
                dup,
                retain,
                qos,
            ))))
        }
        PublishAck => pub_response(header, PubResponseKind::PubAck),
        PublishReceived => pub_response(header, PubResponseKind::PubRec),
        PublishRelease => {
            require_flags(header, 0b0010)?;
            pub_response(header, PubResponseKind::PubRel)
        }
        PublishComplete => pub_response(header, PubResponseKind::PubComp),
        Subscribe => {
            require_flags(header, 0b0010)?;
            Ok(Decoder::Subscribe(Box::new(SubscribeDecoder::new(
                header.remaining_length,
            ))))
        }
        SubscribeAck => {
            require_flags(header, 0)?;
            Ok(Decoder::SubAck(Box::new(SubAckDecoder::new(
                header.remaining_length,
            ))))
        }
        Unsubscribe => {
            require_flags(header, 0b0010)?;
            Ok(Decoder::Unsubscribe(Box::new(UnsubscribeDecoder::new(
                header.remaining_length,
            ))))
        }
        UnsubscribeAck => {
            require_flags(header, 0)?;
            Ok(Decoder::UnsubAck(Box::new(UnsubAckDecoder::new(
                header.remaining_length,
            ))))
        }
        PingReq | PingResp => {
            if header.flags != 0 || header.remaining_length != 0 {
                return Err(Error::BadPacketFlags(ty));
            }
            Ok(Decoder::Empty(ty))
        }
        Disconnect => {
            require_flags(header, 0)?;
            Ok(Decoder::Disconnect(Box::new(DisconnectDecoder::new(
                header.remaining_length,
            ))))
        }
        Auth => {
            require_flags(header, 0)?;
            Ok(Decoder::Auth(Box::new(AuthDecoder::new(
                header.remaining_length,
            ))))
        }
    }
}

fn require_flags(header: &FixedHeader, expected: u8) -> Result<(), Error> {
    if header.flags == expected {
        Ok(())
    } else {
        Err(Error::BadPacketFlags(header.packet_type))
    }
}

fn pub_response(header: &FixedHeader, kind: PubResponseKind) -> Result<Decoder, Error> {
    if header.remaining_length < 2 {
        return Err(Error::BadPacketPayload(header.packet_type));
    }
    Ok(Decoder::PubResponse(
        kind,
        Box::new(PubResponseDecoder::new(header.remaining_length)),
    ))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PubResponseKind {
    PubAck,
    PubRec,
    PubRel,
    PubComp,
}

/// A decoder for exactly one v5 packet body, in progress.
pub enum Decoder {
    Connect(Box<ConnectDecoder>),
    ConnectAck(Box<ConnectAckDecoder>),
    Publish(Box<PublishDecoder>),
    PubResponse(PubResponseKind, Box<PubResponseDecoder>),
    Subscribe(Box<SubscribeDecoder>),
    SubAck(Box<SubAckDecoder>),
    Unsubscribe(Box<UnsubscribeDecoder>),
    UnsubAck(Box<UnsubAckDecoder>),
    Disconnect(Box<DisconnectDecoder>),
    Auth(Box<AuthDecoder>),
    Empty(PacketType),
}

impl Decoder {
    pub fn feed(&mut self, input: &[u8]) -> Result<(usize, Option<Packet>), Error> {
        match self {
            Decoder::Connect(d) => d.feed(input),
            Decoder::ConnectAck(d) => d.feed(input),
            Decoder::Publish(d) => d.feed(input),
            Decoder::PubResponse(kind, d) => d.feed(*kind, input),
            Decoder::Subscribe(d) => d.feed(input),
            Decoder::SubAck(d) => d.feed(input),
            Decoder::Unsubscribe(d) => d.feed(input),
            Decoder::UnsubAck(d) => d.feed(input),
            Decoder::Disconnect(d) => d.feed(input),
            Decoder::Auth(d) => d.feed(input),
            Decoder::Empty(ty) => Ok((0, Some(empty_packet(*ty)))),
        }
    }
}

fn empty_packet(ty: PacketType) -> Packet {
    match ty {
        PacketType::PingReq => Packet::PingReq,
        PacketType::PingResp => Packet::PingResp,
        _ => unreachable!("empty_packet called with a non-empty packet type"),
    }
}

// ---------------------------------------------------------------------
// property application

fn apply_connect_property(
    header: &mut ConnectHeader,
    id: PropertyId,
    value: PropertyValue,
) -> Result<(), Error> {
    use PropertyId::*;
    match (id, value) {
        (SessionExpiryInterval, PropertyValue::U32(v)) => header.session_expiry_interval = Some(v),
        (ReceiveMaximum, PropertyValue::U16(v)) => {
            if v == 0 {
                return Err(Error::MalformedReceiveMaximum);
            }
            header.receive_maximum = Some(v);
        }
        (MaximumPacketSize, PropertyValue::U32(v)) => header.maximum_packet_size = Some(v),
        (TopicAliasMaximum, PropertyValue::U16(v)) => header.topic_alias_maximum = Some(v),
        (RequestResponseInformation, PropertyValue::Byte(v)) => {
            header.request_response_information = Some(v != 0)
        }
        (RequestProblemInformation, PropertyValue::Byte(v)) => {
            header.request_problem_information = Some(v != 0)
        }
        (AuthenticationMethod, PropertyValue::Utf8(v)) => header.authentication_method = Some(v),
        (AuthenticationData, PropertyValue::Bytes(v)) => header.authentication_data = Some(v),
        (UserProperty, PropertyValue::Utf8Pair(k, v)) => header.user_properties.push((k, v)),
        _ => {}
    }
    Ok(())
}

#[derive(Default)]
struct WillProps {
    delay_interval: Option<u32>,
    payload_format_indicator: Option<u8>,
    message_expiry_interval: Option<u32>,
    content_type: Option<String>,
    response_topic: Option<String>,
    correlation_data: Option<Vec<u8>>,
    user_properties: Vec<(String, String)>,
}

fn apply_will_property(props: &mut WillProps, id: PropertyId, value: PropertyValue) -> Result<(), Error> {
    use PropertyId::*;
    match (id, value) {
        (WillDelayInterval, PropertyValue::U32(v)) => props.delay_interval = Some(v),
        (PayloadFormatIndicator, PropertyValue::Byte(v)) => props.payload_format_indicator = Some(v),
        (MessageExpiryInterval, PropertyValue::U32(v)) => props.message_expiry_interval = Some(v),
        (ContentType, PropertyValue::Utf8(v)) => props.content_type = Some(v),
        (ResponseTopic, PropertyValue::Utf8(v)) => props.response_topic = Some(v),
        (CorrelationData, PropertyValue::Bytes(v)) => props.correlation_data = Some(v),
        (UserProperty, PropertyValue::Utf8Pair(k, v)) => props.user_properties.push((k, v)),
        _ => {}
    }
    Ok(())
}

fn apply_connect_ack_property(
    header: &mut ConnectAckHeader,
    id: PropertyId,
    value: PropertyValue,
) -> Result<(), Error> {
    use PropertyId::*;
    match (id, value) {
        (SessionExpiryInterval, PropertyValue::U32(v)) => header.session_expiry_interval = Some(v),
        (ReceiveMaximum, PropertyValue::U16(v)) => {
            if v == 0 {
                return Err(Error::MalformedReceiveMaximum);
            }
            header.receive_maximum = Some(v);
        }
        (MaximumQoS, PropertyValue::Byte(v)) => {
            let qos = QoS::try_from(v).map_err(|_| Error::MalformedMaximumQoS)?;
            header.maximum_qos = Some(qos);
        }
        (RetainAvailable, PropertyValue::Byte(v)) => header.retain_available = Some(v != 0),
        (MaximumPacketSize, PropertyValue::U32(v)) => header.maximum_packet_size = Some(v),
        (AssignedClientIdentifier, PropertyValue::Utf8(v)) => header.assigned_client_id = Some(v),
        (TopicAliasMaximum, PropertyValue::U16(v)) => header.topic_alias_maximum = Some(v),
        (ReasonString, PropertyValue::Utf8(v)) => header.reason_string = Some(v),
        (UserProperty, PropertyValue::Utf8Pair(k, v)) => header.user_properties.push((k, v)),
        (WildcardSubscriptionAvailable, PropertyValue::Byte(v)) => {
            header.wildcard_subscription_available = Some(v != 0)
        }
        (SubscriptionIdentifierAvailable, PropertyValue::Byte(v)) => {
            header.subscription_identifier_available = Some(v != 0)
        }
        (SharedSubscriptionAvailable, PropertyValue::Byte(v)) => {
            header.shared_subscription_available = Some(v != 0)
        }
        (ServerKeepAlive, PropertyValue::U16(v)) => header.server_keep_alive = Some(v),
        (ResponseInformation, PropertyValue::Utf8(v)) => header.response_information = Some(v),
        (ServerReference, PropertyValue::Utf8(v)) => header.server_reference = Some(v),
        (AuthenticationMethod, PropertyValue::Utf8(v)) => header.authentication_method = Some(v),
        (AuthenticationData, PropertyValue::Bytes(v)) => header.authentication_data = Some(v),
        _ => {}
    }
    Ok(())
}

fn apply_publish_property(
    header: &mut PublishHeader,
    id: PropertyId,
    value: PropertyValue,
) -> Result<(), Error> {
    use PropertyId::*;
    match (id, value) {
        (PayloadFormatIndicator, PropertyValue::Byte(v)) => header.payload_format_indicator = Some(v),
        (MessageExpiryInterval, PropertyValue::U32(v)) => header.message_expiry_interval = Some(v),
        (TopicAlias, PropertyValue::U16(v)) => header.topic_alias = Some(v),
        (ResponseTopic, PropertyValue::Utf8(v)) => header.response_topic = Some(v),
        (CorrelationData, PropertyValue::Bytes(v)) => header.correlation_data = Some(v),
        (ContentType, PropertyValue::Utf8(v)) => header.content_type = Some(v),
        (SubscriptionIdentifier, PropertyValue::VarInt(v)) => header.subscription_identifiers.push(v),
        (UserProperty, PropertyValue::Utf8Pair(k, v)) => header.user_properties.push((k, v)),
        _ => {}
    }
    Ok(())
}

fn apply_pub_response_property(
    header: &mut PubResponseHeader,
    id: PropertyId,
    value: PropertyValue,
) -> Result<(), Error> {
    use PropertyId::*;
    match (id, value) {
        (ReasonString, PropertyValue::Utf8(v)) => header.reason_string = Some(v),
        (UserProperty, PropertyValue::Utf8Pair(k, v)) => header.user_properties.push((k, v)),
        _ => {}
    }
    Ok(())
}

fn apply_subscribe_property(
    header: &mut SubscribeHeader,
    id: PropertyId,
    value: PropertyValue,
) -> Result<(), Error> {
    use PropertyId::*;
    match (id, value) {
        (SubscriptionIdentifier, PropertyValue::VarInt(v)) => header.subscription_identifier = Some(v),
        (UserProperty, PropertyValue::Utf8Pair(k, v)) => header.user_properties.push((k, v)),
        _ => {}
    }
    Ok(())
}

fn apply_sub_ack_property(
    header: &mut SubAckHeader,
    id: PropertyId,
    value: PropertyValue,
) -> Result<(), Error> {
    use PropertyId::*;
    match (id, value) {
        (ReasonString, PropertyValue::Utf8(v)) => header.reason_string = Some(v),
        (UserProperty, PropertyValue::Utf8Pair(k, v)) => header.user_properties.push((k, v)),
        _ => {}
    }
    Ok(())
}

fn apply_unsubscribe_property(
    header: &mut UnsubscribeHeader,
    id: PropertyId,
    value: PropertyValue,
) -> Result<(), Error> {
    if let (PropertyId::UserProperty, PropertyValue::Utf8Pair(k, v)) = (id, value) {
        header.user_properties.push((k, v));
    }
    Ok(())
}

fn apply_unsub_ack_property(
    header: &mut UnsubAckHeader,
    id: PropertyId,
    value: PropertyValue,
) -> Result<(), Error> {
    use PropertyId::*;
    match (id, value) {
        (ReasonString, PropertyValue::Utf8(v)) => header.reason_string = Some(v),
        (UserProperty, PropertyValue::Utf8Pair(k, v)) => header.user_properties.push((k, v)),
        _ => {}
    }
    Ok(())
}

fn apply_disconnect_property(
    header: &mut DisconnectHeader,
    id: PropertyId,
    value: PropertyValue,
) -> Result<(), Error> {
    use PropertyId::*;
    match (id, value) {
        (SessionExpiryInterval, PropertyValue::U32(v)) => header.session_expiry_interval = Some(v),
        (ReasonString, PropertyValue::Utf8(v)) => header.reason_string = Some(v),
        (ServerReference, PropertyValue::Utf8(v)) => header.server_reference = Some(v),
        (UserProperty, PropertyValue::Utf8Pair(k, v)) => header.user_properties.push((k, v)),
        _ => {}
    }
    Ok(())
}

fn apply_auth_property(header: &mut AuthHeader, id: PropertyId, value: PropertyValue) -> Result<(), Error> {
    use PropertyId::*;
    match (id, value) {
        (AuthenticationMethod, PropertyValue::Utf8(v)) => header.authentication_method = Some(v),
        (AuthenticationData, PropertyValue::Bytes(v)) => header.authentication_data = Some(v),
        (ReasonString, PropertyValue::Utf8(v)) => header.reason_string = Some(v),
        (UserProperty, PropertyValue::Utf8Pair(k, v)) => header.user_properties.push((k, v)),
        _ => {}
    }
    Ok(())
}

// ---------------------------------------------------------------------
// CONNECT

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ConnectSeq {
    ProtocolName,
    ProtocolLevel,
    Flags,
    KeepAlive,
    Properties,
    ClientId,
    WillProperties,
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
    props: PropertyDecoder,
    will_props: PropertyDecoder,
    will_props_out: WillProps,
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
            props: PropertyDecoder::new(),
            will_props: PropertyDecoder::new(),
            will_props_out: WillProps::default(),
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
                    if name != "MQTT" {
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
                    self.seq = ConnectSeq::Properties;
                }
            }
        }

        if self.seq == ConnectSeq::Properties {
            let (n, result) = self.props.feed(&input[consumed..]);
            consumed += n;
            match result? {
                None => {
                    self.total_consumed += consumed;
                    return Ok((consumed, None));
                }
                Some(properties) => {
                    for (id, value) in properties {
                        apply_connect_property(&mut self.header, id, value)?;
                    }
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
                    self.seq = ConnectSeq::WillProperties;
                }
            }
        }

        let has_will = self.connect_flags & 0x04 != 0;

        if self.seq == ConnectSeq::WillProperties {
            if !has_will {
                self.seq = ConnectSeq::Username;
            } else {
                let (n, result) = self.will_props.feed(&input[consumed..]);
                consumed += n;
                match result? {
                    None => {
                        self.total_consumed += consumed;
                        return Ok((consumed, None));
                    }
                    Some(properties) => {
                        for (id, value) in properties {
                            apply_will_property(&mut self.will_props_out, id, value)?;
                        }
                        self.seq = ConnectSeq::WillTopic;
                    }
                }
            }
        }

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
                        let props = std::mem::take(&mut self.will_props_out);
                        self.header.last_will = Some(LastWill {
                            topic,
                            qos,
                            retain: self.connect_flags & 0x20 != 0,
                            delay_interval: props.delay_interval,
                            payload_format_indicator: props.payload_format_indicator,
                            message_expiry_interval: props.message_expiry_interval,
                            content_type: props.content_type,
                            response_topic: props.response_topic,
                            correlation_data: props.correlation_data,
                            user_properties: props.user_properties,
                            ..Default::default()
                        });
                        self.seq = ConnectSeq::WillMessage;
                    }
                }
            }
        }

        if self.seq == ConnectSeq::WillMessage {
            if !has_will {
                self.seq = ConnectSeq::Username;
            } else {
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
        }

        let has_username = self.connect_flags & 0x80 != 0;
        let has_password = self.connect_flags & 0x40 != 0;

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

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ConnectAckSeq {
    Flags,
    ReasonCode,
    Properties,
}

pub struct ConnectAckDecoder {
    remaining: usize,
    total_consumed: usize,
    seq: ConnectAckSeq,
    props: PropertyDecoder,
    header: ConnectAckHeader,
}

impl ConnectAckDecoder {
    fn new(remaining_length: usize) -> Self {
        ConnectAckDecoder {
            remaining: remaining_length,
            total_consumed: 0,
            seq: ConnectAckSeq::Flags,
            props: PropertyDecoder::new(),
            header: ConnectAckHeader::default(),
        }
    }

    fn feed(&mut self, input: &[u8]) -> Result<(usize, Option<Packet>), Error> {
        if self.remaining < 2 {
            return Err(Error::BadPacketPayload(PacketType::ConnectAck));
        }
        let mut consumed = 0;

        if self.seq == ConnectAckSeq::Flags {
            let (n, byte) = decode_u8(&input[consumed..]);
            consumed += n;
            match byte {
                None => {
                    self.total_consumed += consumed;
                    return Ok((consumed, None));
                }
                Some(flags) => {
                    if flags & 0xFE != 0 {
                        return Err(Error::BadPacketFlags(PacketType::ConnectAck));
                    }
                    self.header.session_present = flags & 0x01 != 0;
                    self.seq = ConnectAckSeq::ReasonCode;
                }
            }
        }

        if self.seq == ConnectAckSeq::ReasonCode {
            let (n, byte) = decode_u8(&input[consumed..]);
            consumed += n;
            match byte {
                None => {
                    self.total_consumed += consumed;
                    return Ok((consumed, None));
                }
                Some(code) => {
                    self.header.reason_code = code;
                    self.seq = ConnectAckSeq::Properties;
                }
            }
        }

        let (n, result) = self.props.feed(&input[consumed..]);
        consumed += n;
        match result? {
            None => {
                self.total_consumed += consumed;
                Ok((consumed, None))
            }
            Some(properties) => {
                for (id, value) in properties {
                    apply_connect_ack_property(&mut self.header, id, value)?;
                }
                self.total_consumed += consumed;
                if self.total_consumed != self.remaining {
                    return Err(Error::BadPacketPayload(PacketType::ConnectAck));
                }
                Ok((consumed, Some(Packet::ConnectAck(std::mem::take(&mut self.header)))))
            }
        }
    }
}

// ---------------------------------------------------------------------
// PUBLISH

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PublishSeq {
    Topic,
    PacketId,
    Properties,
    Done,
}

pub struct PublishDecoder {
    remaining: usize,
    consumed_total: usize,
    seq: PublishSeq,
    blob: BlobScratch,
    u16: U16Scratch,
    props: PropertyDecoder,
    topic: String,
    dup: bool,
    retain: bool,
    qos: QoS,
    header: PublishHeader,
}

impl PublishDecoder {
    fn new(remaining_length: usize, dup: bool, retain: bool, qos: QoS) -> Self {
        PublishDecoder {
            remaining: remaining_length,
            consumed_total: 0,
            seq: PublishSeq::Topic,
            blob: BlobScratch::default(),
            u16: U16Scratch::default(),
            props: PropertyDecoder::new(),
            topic: String::new(),
            dup,
            retain,
            qos,
            header: PublishHeader::default(),
        }
    }

    fn feed(&mut self, input: &[u8]) -> Result<(usize, Option<Packet>), Error> {
        let mut consumed = 0;

        if self.seq == PublishSeq::Topic {
            let (n, result) = decode_utf8(&mut self.blob, &input[consumed..]);
            consumed += n;
            self.consumed_total += n;
            match result? {
                None => return Ok((consumed, None)),
                Some(topic) => {
                    self.topic = topic;
                    self.seq = if self.qos == QoS::AtMostOnce {
                        PublishSeq::Properties
                    } else {
                        PublishSeq::PacketId
                    };
                }
            }
        }

        if self.seq == PublishSeq::PacketId {
            let (n, value) = decode_u16(&mut self.u16, &input[consumed..]);
            consumed += n;
            self.consumed_total += n;
            match value {
                None => return Ok((consumed, None)),
                Some(id) => {
                    self.header.packet_id = Some(id);
                    self.seq = PublishSeq::Properties;
                }
            }
        }

        if self.seq == PublishSeq::Properties {
            let (n, result) = self.props.feed(&input[consumed..]);
            consumed += n;
            self.consumed_total += n;
            match result? {
                None => return Ok((consumed, None)),
                Some(properties) => {
                    for (id, value) in properties {
                        apply_publish_property(&mut self.header, id, value)?;
                    }
                    self.seq = PublishSeq::Done;
                }
            }
        }

        let payload_size = self.remaining.saturating_sub(self.consumed_total);
        self.header.topic = std::mem::take(&mut self.topic);
        self.header.dup = self.dup;
        self.header.retain = self.retain;
        self.header.qos = self.qos;
        self.header.payload_size = payload_size;
        Ok((consumed, Some(Packet::Publish(std::mem::take(&mut self.header)))))
    }
}

// ---------------------------------------------------------------------
// PUBACK / PUBREC / PUBREL / PUBCOMP
//
// The reason code and property length/properties may be entirely omitted
// when the reason code is 0 (success) and there are no properties, in which
// case the remaining length is exactly 2 (just the packet identifier).
// Unlike a strict `remaining_length == 2` check, this decoder also accepts
// the 3-byte (reason code, no properties) and 4+-byte (reason code plus
// properties) shapes, per MQTT 5 §3.4.2.1/§3.6.2.1/etc.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PubResponseSeq {
    PacketId,
    ReasonCode,
    Properties,
}

pub struct PubResponseDecoder {
    remaining: usize,
    consumed_total: usize,
    seq: PubResponseSeq,
    u16: U16Scratch,
    props: PropertyDecoder,
    header: PubResponseHeader,
}

impl PubResponseDecoder {
    fn new(remaining_length: usize) -> Self {
        PubResponseDecoder {
            remaining: remaining_length,
            consumed_total: 0,
            seq: PubResponseSeq::PacketId,
            u16: U16Scratch::default(),
            props: PropertyDecoder::new(),
            header: PubResponseHeader::default(),
        }
    }

    fn feed(&mut self, kind: PubResponseKind, input: &[u8]) -> Result<(usize, Option<Packet>), Error> {
        let mut consumed = 0;

        if self.seq == PubResponseSeq::PacketId {
            let (n, value) = decode_u16(&mut self.u16, &input[consumed..]);
            consumed += n;
            self.consumed_total += n;
            match value {
                None => return Ok((consumed, None)),
                Some(id) => {
                    self.header.packet_id = id;
                    self.seq = PubResponseSeq::ReasonCode;
                }
            }
        }

        if self.consumed_total >= self.remaining {
            return Ok((consumed, Some(self.finish(kind))));
        }

        if self.seq == PubResponseSeq::ReasonCode {
            let (n, byte) = decode_u8(&input[consumed..]);
            consumed += n;
            self.consumed_total += n;
            match byte {
                None => return Ok((consumed, None)),
                Some(code) => {
                    self.header.reason_code = Some(code);
                    self.seq = PubResponseSeq::Properties;
                }
            }
        }

        if self.consumed_total >= self.remaining {
            return Ok((consumed, Some(self.finish(kind))));
        }

        let (n, result) = self.props.feed(&input[consumed..]);
        consumed += n;
        self.consumed_total += n;
        match result? {
            None => Ok((consumed, None)),
            Some(properties) => {
                for (id, value) in properties {
                    apply_pub_response_property(&mut self.header, id, value)?;
                }
                Ok((consumed, Some(self.finish(kind))))
            }
        }
    }

    fn finish(&mut self, kind: PubResponseKind) -> Packet {
        let header = std::mem::take(&mut self.header);
        match kind {
            PubResponseKind::PubAck => Packet::PublishAck(header),
            PubResponseKind::PubRec => Packet::PublishReceived(header),
            PubResponseKind::PubRel => Packet::PublishRelease(header),
            PubResponseKind::PubComp => Packet::PublishComplete(header),
        }
    }
}

// ---------------------------------------------------------------------
// SUBSCRIBE

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SubscribeSeq {
    Properties,
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
    props: PropertyDecoder,
    packet_id: PacketId,
    pending_filter: String,
    header: SubscribeHeader,
}

impl SubscribeDecoder {
    fn new(remaining_length: usize) -> Self {
        SubscribeDecoder {
            remaining: remaining_length,
            consumed_total: 0,
            got_packet_id: false,
            seq: SubscribeSeq::Properties,
            u16: U16Scratch::default(),
            blob: BlobScratch::default(),
            props: PropertyDecoder::new(),
            packet_id: 0,
            pending_filter: String::new(),
            header: SubscribeHeader::default(),
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

        if self.seq == SubscribeSeq::Properties {
            let (n, result) = self.props.feed(&input[consumed..]);
            consumed += n;
            self.consumed_total += n;
            match result? {
                None => return Ok((consumed, None)),
                Some(properties) => {
                    for (id, value) in properties {
                        apply_subscribe_property(&mut self.header, id, value)?;
                    }
                    self.seq = SubscribeSeq::Filter;
                }
            }
        }

        loop {
            if self.consumed_total >= self.remaining {
                if self.header.subscriptions.is_empty() {
                    return Err(Error::BadPacketPayload(PacketType::Subscribe));
                }
                self.header.packet_id = self.packet_id;
                return Ok((consumed, Some(Packet::Subscribe(std::mem::take(&mut self.header)))));
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
                    self.header.subscriptions.push(SubscriptionRequest {
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

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SubAckSeq {
    Properties,
    ReasonCodes,
}

pub struct SubAckDecoder {
    remaining: usize,
    consumed_total: usize,
    got_packet_id: bool,
    seq: SubAckSeq,
    u16: U16Scratch,
    props: PropertyDecoder,
    packet_id: PacketId,
    header: SubAckHeader,
}

impl SubAckDecoder {
    fn new(remaining_length: usize) -> Self {
        SubAckDecoder {
            remaining: remaining_length,
            consumed_total: 0,
            got_packet_id: false,
            seq: SubAckSeq::Properties,
            u16: U16Scratch::default(),
            props: PropertyDecoder::new(),
            packet_id: 0,
            header: SubAckHeader::default(),
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

        if self.seq == SubAckSeq::Properties {
            let (n, result) = self.props.feed(&input[consumed..]);
            consumed += n;
            self.consumed_total += n;
            match result? {
                None => return Ok((consumed, None)),
                Some(properties) => {
                    for (id, value) in properties {
                        apply_sub_ack_property(&mut self.header, id, value)?;
                    }
                    self.seq = SubAckSeq::ReasonCodes;
                }
            }
        }

        while self.consumed_total < self.remaining {
            let (n, byte) = decode_u8(&input[consumed..]);
            consumed += n;
            self.consumed_total += n;
            match byte {
                None => return Ok((consumed, None)),
                Some(code) => self.header.reason_codes.push(code),
            }
        }

        if self.header.reason_codes.is_empty() {
            return Err(Error::BadPacketPayload(PacketType::SubscribeAck));
        }
        self.header.packet_id = self.packet_id;
        Ok((consumed, Some(Packet::SubscribeAck(std::mem::take(&mut self.header)))))
    }
}

// ---------------------------------------------------------------------
// UNSUBSCRIBE

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum UnsubscribeSeq {
    Properties,
    Filters,
}

pub struct UnsubscribeDecoder {
    remaining: usize,
    consumed_total: usize,
    got_packet_id: bool,
    seq: UnsubscribeSeq,
    u16: U16Scratch,
    blob: BlobScratch,
    props: PropertyDecoder,
    packet_id: PacketId,
    header: UnsubscribeHeader,
}

impl UnsubscribeDecoder {
    fn new(remaining_length: usize) -> Self {
        UnsubscribeDecoder {
            remaining: remaining_length,
            consumed_total: 0,
            got_packet_id: false,
            seq: UnsubscribeSeq::Properties,
            u16: U16Scratch::default(),
            blob: BlobScratch::default(),
            props: PropertyDecoder::new(),
            packet_id: 0,
            header: UnsubscribeHeader::default(),
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

        if self.seq == UnsubscribeSeq::Properties {
            let (n, result) = self.props.feed(&input[consumed..]);
            consumed += n;
            self.consumed_total += n;
            match result? {
                None => return Ok((consumed, None)),
                Some(properties) => {
                    for (id, value) in properties {
                        apply_unsubscribe_property(&mut self.header, id, value)?;
                    }
                    self.seq = UnsubscribeSeq::Filters;
                }
            }
        }

        while self.consumed_total < self.remaining {
            let (n, result) = decode_utf8(&mut self.blob, &input[consumed..]);
            consumed += n;
            self.consumed_total += n;
            match result? {
                None => return Ok((consumed, None)),
                Some(filter) => self.header.topic_filters.push(filter),
            }
        }

        if self.header.topic_filters.is_empty() {
            return Err(Error::BadPacketPayload(PacketType::Unsubscribe));
        }
        self.header.packet_id = self.packet_id;
        Ok((consumed, Some(Packet::Unsubscribe(std::mem::take(&mut self.header)))))
    }
}

// ---------------------------------------------------------------------
// UNSUBACK

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum UnsubAckSeq {
    Properties,
    ReasonCodes,
}

pub struct UnsubAckDecoder {
    remaining: usize,
    consumed_total: usize,
    got_packet_id: bool,
    seq: UnsubAckSeq,
    u16: U16Scratch,
    props: PropertyDecoder,
    packet_id: PacketId,
    header: UnsubAckHeader,
}

impl UnsubAckDecoder {
    fn new(remaining_length: usize) -> Self {
        UnsubAckDecoder {
            remaining: remaining_length,
            consumed_total: 0,
            got_packet_id: false,
            seq: UnsubAckSeq::Properties,
            u16: U16Scratch::default(),
            props: PropertyDecoder::new(),
            packet_id: 0,
            header: UnsubAckHeader::default(),
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

        if self.seq == UnsubAckSeq::Properties {
            let (n, result) = self.props.feed(&input[consumed..]);
            consumed += n;
            self.consumed_total += n;
            match result? {
                None => return Ok((consumed, None)),
                Some(properties) => {
                    for (id, value) in properties {
                        apply_unsub_ack_property(&mut self.header, id, value)?;
                    }
                    self.seq = UnsubAckSeq::ReasonCodes;
                }
            }
        }

        while self.consumed_total < self.remaining {
            let (n, byte) = decode_u8(&input[consumed..]);
            consumed += n;
            self.consumed_total += n;
            match byte {
                None => return Ok((consumed, None)),
                Some(code) => self.header.reason_codes.push(code),
            }
        }

        if self.header.reason_codes.is_empty() {
            return Err(Error::BadPacketPayload(PacketType::UnsubscribeAck));
        }
        self.header.packet_id = self.packet_id;
        Ok((consumed, Some(Packet::UnsubscribeAck(std::mem::take(&mut self.header)))))
    }
}

// ---------------------------------------------------------------------
// DISCONNECT
//
// May be the bare two-byte fixed header with no body at all (reason code
// implied `NormalDisconnection`, no properties).

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DisconnectSeq {
    ReasonCode,
    Properties,
}

pub struct DisconnectDecoder {
    remaining: usize,
    consumed_total: usize,
    seq: DisconnectSeq,
    props: PropertyDecoder,
    header: DisconnectHeader,
}

impl DisconnectDecoder {
    fn new(remaining_length: usize) -> Self {
        DisconnectDecoder {
            remaining: remaining_length,
            consumed_total: 0,
            seq: DisconnectSeq::ReasonCode,
            props: PropertyDecoder::new(),
            header: DisconnectHeader::default(),
        }
    }

    fn feed(&mut self, input: &[u8]) -> Result<(usize, Option<Packet>), Error> {
        if self.remaining == 0 {
            return Ok((0, Some(Packet::Disconnect(DisconnectHeader::default()))));
        }
        let mut consumed = 0;

        if self.seq == DisconnectSeq::ReasonCode {
            let (n, byte) = decode_u8(&input[consumed..]);
            consumed += n;
            self.consumed_total += n;
            match byte {
                None => return Ok((consumed, None)),
                Some(code) => {
                    self.header.reason_code = Some(code);
                    self.seq = DisconnectSeq::Properties;
                }
            }
        }

        if self.consumed_total >= self.remaining {
            return Ok((consumed, Some(Packet::Disconnect(std::mem::take(&mut self.header)))));
        }

        let (n, result) = self.props.feed(&input[consumed..]);
        consumed += n;
        self.consumed_total += n;
        match result? {
            None => Ok((consumed, None)),
            Some(properties) => {
                for (id, value) in properties {
                    apply_disconnect_property(&mut self.header, id, value)?;
                }
                Ok((consumed, Some(Packet::Disconnect(std::mem::take(&mut self.header)))))
            }
        }
    }
}

// ---------------------------------------------------------------------
// AUTH
//
// Like DISCONNECT, may be the bare fixed header with no body (reason code
// implied `Success`, no properties).

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum AuthSeq {
    ReasonCode,
    Properties,
}

pub struct AuthDecoder {
    remaining: usize,
    consumed_total: usize,
    seq: AuthSeq,
    props: PropertyDecoder,
    header: AuthHeader,
}

impl AuthDecoder {
    fn new(remaining_length: usize) -> Self {
        AuthDecoder {
            remaining: remaining_length,
            consumed_total: 0,
            seq: AuthSeq::ReasonCode,
            props: PropertyDecoder::new(),
            header: AuthHeader::default(),
        }
    }

    fn feed(&mut self, input: &[u8]) -> Result<(usize, Option<Packet>), Error> {
        if self.remaining == 0 {
            return Ok((0, Some(Packet::Auth(AuthHeader::default()))));
        }
        let mut consumed = 0;

        if self.seq == AuthSeq::ReasonCode {
            let (n, byte) = decode_u8(&input[consumed..]);
            consumed += n;
            self.consumed_total += n;
            match byte {
                None => return Ok((consumed, None)),
                Some(code) => {
                    self.header.reason_code = code;
                    self.seq = AuthSeq::Properties;
                }
            }
        }

        if self.consumed_total >= self.remaining {
            return Ok((consumed, Some(Packet::Auth(std::mem::take(&mut self.header)))));
        }

        let (n, result) = self.props.feed(&input[consumed..]);
        consumed += n;
        self.consumed_total += n;
        match result? {
            None => Ok((consumed, None)),
            Some(properties) => {
                for (id, value) in properties {
                    apply_auth_property(&mut self.header, id, value)?;
                }
                Ok((consumed, Some(Packet::Auth(std::mem::take(&mut self.header)))))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encode::encode_packet;
    use mqtt_core::FixedHeaderDecoder;

    fn roundtrip(packet: &Packet, payload: &[u8]) -> Packet {
        let mut out = Vec::new();
        encode_packet(packet, payload, &mut out).unwrap();

        let mut header_decoder = FixedHeaderDecoder::new();
        let mut offset = 0;
        let header = loop {
            let (n, header) = header_decoder.feed(&out[offset..offset + 1]).unwrap();
            offset += n;
            if let Some(header) = header {
                break header;
            }
        };
        let mut decoder = decoder_for(&header).unwrap();
        let mut packet = None;
        while offset < out.len() {
            let (n, p) = decoder.feed(&out[offset..offset + 1]).unwrap();
            offset += n;
            if let Some(p) = p {
                packet = Some(p);
            }
        }
        assert_eq!(offset, out.len());
        packet.unwrap()
    }

    #[test]
    fn connect_minimal_roundtrips_byte_at_a_time() {
        let packet = Packet::Connect(ConnectHeader {
            client_id: "test".into(),
            clean_session: true,
            ..Default::default()
        });
        assert_eq!(roundtrip(&packet, &[]), packet);
    }

    #[test]
    fn connect_with_properties_and_will_roundtrips() {
        let packet = Packet::Connect(ConnectHeader {
            client_id: "test".into(),
            clean_session: true,
            keep_alive: 30,
            session_expiry_interval: Some(3600),
            receive_maximum: Some(20),
            last_will: Some(LastWill {
                topic: "status".into(),
                payload: b"offline".to_vec(),
                qos: QoS::AtLeastOnce,
                delay_interval: Some(5),
                ..Default::default()
            }),
            username: Some("bob".into()),
            password: Some(b"secret".to_vec()),
            ..Default::default()
        });
        assert_eq!(roundtrip(&packet, &[]), packet);
    }

    #[test]
    fn connack_with_properties_roundtrips() {
        let packet = Packet::ConnectAck(ConnectAckHeader {
            session_present: true,
            reason_code: 0,
            session_expiry_interval: Some(120),
            maximum_qos: Some(QoS::AtLeastOnce),
            assigned_client_id: Some("auto-1".into()),
            ..Default::default()
        });
        assert_eq!(roundtrip(&packet, &[]), packet);
    }

    #[test]
    fn publish_qos0_computes_payload_size_with_properties() {
        let packet = Packet::Publish(PublishHeader {
            topic: "a/b".into(),
            qos: QoS::AtMostOnce,
            content_type: Some("text/plain".into()),
            ..Default::default()
        });
        let decoded = roundtrip(&packet, b"hello");
        match decoded {
            Packet::Publish(header) => {
                assert_eq!(header.payload_size, 5);
                assert_eq!(header.content_type.as_deref(), Some("text/plain"));
            }
            _ => panic!("expected Publish"),
        }
    }

    #[test]
    fn puback_without_reason_code_is_two_bytes() {
        let header = FixedHeader {
            packet_type: PacketType::PublishAck,
            flags: 0,
            remaining_length: 2,
        };
        let mut decoder = decoder_for(&header).unwrap();
        let (n, packet) = decoder.feed(&[0x00, 0x07]).unwrap();
        assert_eq!(n, 2);
        match packet.unwrap() {
            Packet::PublishAck(header) => {
                assert_eq!(header.packet_id, 7);
                assert_eq!(header.reason_code, None);
            }
            _ => panic!("expected PublishAck"),
        }
    }

    #[test]
    fn puback_with_reason_code_and_no_properties_is_three_bytes() {
        let header = FixedHeader {
            packet_type: PacketType::PublishAck,
            flags: 0,
            remaining_length: 3,
        };
        let mut decoder = decoder_for(&header).unwrap();
        let (_, packet) = decoder.feed(&[0x00, 0x07, 0x10]).unwrap();
        match packet.unwrap() {
            Packet::PublishAck(header) => {
                assert_eq!(header.reason_code, Some(0x10));
            }
            _ => panic!("expected PublishAck"),
        }
    }

    #[test]
    fn disconnect_with_no_body_is_normal_disconnection() {
        let header = FixedHeader {
            packet_type: PacketType::Disconnect,
            flags: 0,
            remaining_length: 0,
        };
        let mut decoder = decoder_for(&header).unwrap();
        let (n, packet) = decoder.feed(&[]).unwrap();
        assert_eq!(n, 0);
        assert_eq!(packet.unwrap(), Packet::Disconnect(DisconnectHeader::default()));
    }

    #[test]
    fn subscribe_two_filters_with_properties_roundtrips() {
        let packet = Packet::Subscribe(SubscribeHeader {
            packet_id: 9,
            subscriptions: vec![
                SubscriptionRequest {
                    topic_filter: "a/+".into(),
                    qos: QoS::AtLeastOnce,
                    no_local: true,
                    retain_as_published: false,
                    retain_handling: RetainHandling::SendIfNewSubscription,
                },
                SubscriptionRequest {
                    topic_filter: "b/#".into(),
                    qos: QoS::ExactlyOnce,
                    no_local: false,
                    retain_as_published: true,
                    retain_handling: RetainHandling::DoNotSend,
                },
            ],
            subscription_identifier: Some(42),
            ..Default::default()
        });
        assert_eq!(roundtrip(&packet, &[]), packet);
    }

    #[test]
    fn receive_maximum_of_zero_is_rejected() {
        let mut props = Vec::new();
        crate::props::encode_properties(
            &[(PropertyId::ReceiveMaximum, PropertyValue::U16(0))],
            &mut props,
        )
        .unwrap();

        let mut body = Vec::new();
        body.push(0x00); // session_present = false
        body.push(0x00); // reason_code = success
        body.extend_from_slice(&props);

        let header = FixedHeader {
            packet_type: PacketType::ConnectAck,
            flags: 0,
            remaining_length: body.len(),
        };
        let mut decoder = decoder_for(&header).unwrap();
        let result = decoder.feed(&body);
        assert_eq!(result, Err(Error::MalformedReceiveMaximum));
    }

    #[test]
    fn byte_at_a_time_connect_resumes_correctly() {
        let packet = Packet::Connect(ConnectHeader {
            client_id: "resumed".into(),
            clean_session: true,
            keep_alive: 15,
            session_expiry_interval: Some(60),
            ..Default::default()
        });
        assert_eq!(roundtrip(&packet, &[]), packet);
    }

    #[test]
    fn unknown_packet_type_byte_is_rejected() {
        let header = FixedHeader {
            packet_type: PacketType::Auth,
            flags: 0b0001,
            remaining_length: 0,
        };
        assert!(decoder_for(&header).is_err());
    }
}
