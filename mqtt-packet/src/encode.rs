//! One-shot v5 packet encoders (C6, write side).
//!
//! Mirrors `mqtt_core::encode`'s shape: each packet type's body is built into
//! a local `Vec<u8>` first (properties blocks are themselves built the same
//! way inside [`crate::props::encode_properties`]), so the fixed header's
//! remaining length always comes from a finished buffer's length rather than
//! a separate size-counting pass.

use mqtt_core::context::encode_fixed_header;
use mqtt_core::primitives::{encode_blob, encode_u16, encode_utf8};
use mqtt_core::{
    AuthHeader, ConnectAckHeader, ConnectHeader, DisconnectHeader, Error, FixedHeader, LastWill,
    Packet, PacketType, PropertyId, PubResponseHeader, PublishHeader, QoS, SubAckHeader,
    SubscribeHeader, UnsubAckHeader, UnsubscribeHeader,
};

use crate::props::{encode_properties, PropertyValue};

/// Protocol level byte CONNECT advertises for MQTT 5.
const PROTOCOL_LEVEL: u8 = 5;

/// Encodes `packet` (and, for PUBLISH, `payload`) into `out`, prefixed by its
/// fixed header. `payload` is ignored for every packet type except PUBLISH.
pub fn encode_packet(packet: &Packet, payload: &[u8], out: &mut Vec<u8>) -> Result<(), Error> {
    let mut body = Vec::new();
    encode_body(packet, payload, &mut body)?;

    let header = FixedHeader {
        packet_type: packet.packet_type(),
        flags: packet_flags(packet),
        remaining_length: body.len(),
    };
    trace!(
        "encoding v5 {} ({} bytes + {} byte payload)",
        header.packet_type, body.len(), payload.len()
    );
    encode_fixed_header(&header, out)?;
    out.extend_from_slice(&body);
    Ok(())
}

fn packet_flags(packet: &Packet) -> u8 {
    match packet {
        Packet::Publish(p) => {
            let mut flags = (p.qos as u8) << 1;
            if p.dup {
                flags |= 0b1000;
            }
            if p.retain {
                flags |= 0b0001;
            }
            flags
        }
        Packet::PublishRelease(_) | Packet::Subscribe(_) | Packet::Unsubscribe(_) => 0b0010,
        _ => 0,
    }
}

fn encode_body(packet: &Packet, payload: &[u8], out: &mut Vec<u8>) -> Result<(), Error> {
    match packet {
        Packet::Connect(header) => encode_connect(header, out),
        Packet::ConnectAck(header) => encode_connect_ack(header, out),
        Packet::Publish(header) => encode_publish(header, payload, out),
        Packet::PublishAck(header)
        | Packet::PublishReceived(header)
        | Packet::PublishRelease(header)
        | Packet::PublishComplete(header) => encode_pub_response(header, out),
        Packet::Subscribe(header) => encode_subscribe(header, out),
        Packet::SubscribeAck(header) => encode_suback(header, out),
        Packet::Unsubscribe(header) => encode_unsubscribe(header, out),
        Packet::UnsubscribeAck(header) => encode_unsuback(header, out),
        Packet::PingReq | Packet::PingResp => Ok(()),
        Packet::Disconnect(header) => encode_disconnect(header, out),
        Packet::Auth(header) => encode_auth(header, out),
    }
}

fn encode_connect(header: &ConnectHeader, out: &mut Vec<u8>) -> Result<(), Error> {
    if !header.clean_session && header.client_id.is_empty() {
        return Err(Error::EmptyClientIdentifier);
    }

    encode_utf8("MQTT", out)?;
    out.push(PROTOCOL_LEVEL);

    let mut flags = 0u8;
    if header.clean_session {
        flags |= 0x02;
    }
    if let Some(will) = &header.last_will {
        flags |= 0x04;
        flags |= (will.qos as u8) << 3;
        if will.retain {
            flags |= 0x20;
        }
    }
    if header.username.is_some() {
        flags |= 0x80;
    }
    if header.password.is_some() {
        if header.username.is_none() {
            return Err(Error::BadUsernamePassword);
        }
        flags |= 0x40;
    }
    out.push(flags);
    encode_u16(header.keep_alive, out);

    let mut props = Vec::new();
    if let Some(v) = header.session_expiry_interval {
        props.push((PropertyId::SessionExpiryInterval, PropertyValue::U32(v)));
    }
    if let Some(v) = header.receive_maximum {
        props.push((PropertyId::ReceiveMaximum, PropertyValue::U16(v)));
    }
    // Bound to this CONNECT's own `maximum_packet_size` field, not some
    // ambient default, so a client can actually advertise a smaller limit
    // than the wire maximum.
    if let Some(v) = header.maximum_packet_size {
        props.push((PropertyId::MaximumPacketSize, PropertyValue::U32(v)));
    }
    if let Some(v) = header.topic_alias_maximum {
        props.push((PropertyId::TopicAliasMaximum, PropertyValue::U16(v)));
    }
    if let Some(v) = header.request_response_information {
        props.push((
            PropertyId::RequestResponseInformation,
            PropertyValue::Byte(v as u8),
        ));
    }
    if let Some(v) = header.request_problem_information {
        props.push((
            PropertyId::RequestProblemInformation,
            PropertyValue::Byte(v as u8),
        ));
    }
    if let Some(v) = &header.authentication_method {
        props.push((PropertyId::AuthenticationMethod, PropertyValue::Utf8(v.clone())));
    }
    if let Some(v) = &header.authentication_data {
        props.push((PropertyId::AuthenticationData, PropertyValue::Bytes(v.clone())));
    }
    for (k, v) in &header.user_properties {
        props.push((
            PropertyId::UserProperty,
            PropertyValue::Utf8Pair(k.clone(), v.clone()),
        ));
    }
    encode_properties(&props, out)?;

    encode_utf8(&header.client_id, out)?;

    if let Some(will) = &header.last_will {
        encode_will_properties(will, out)?;
        encode_utf8(&will.topic, out)?;
        encode_blob(&will.payload, out)?;
    }
    if let Some(username) = &header.username {
        encode_utf8(username, out)?;
    }
    if let Some(password) = &header.password {
        encode_blob(password, out)?;
    }
    Ok(())
}

fn encode_will_properties(will: &LastWill, out: &mut Vec<u8>) -> Result<(), Error> {
    let mut props = Vec::new();
    if let Some(v) = will.delay_interval {
        props.push((PropertyId::WillDelayInterval, PropertyValue::U32(v)));
    }
    if let Some(v) = will.payload_format_indicator {
        props.push((PropertyId::PayloadFormatIndicator, PropertyValue::Byte(v)));
    }
    if let Some(v) = will.message_expiry_interval {
        props.push((PropertyId::MessageExpiryInterval, PropertyValue::U32(v)));
    }
    if let Some(v) = &will.content_type {
        props.push((PropertyId::ContentType, PropertyValue::Utf8(v.clone())));
    }
    if let Some(v) = &will.response_topic {
        props.push((PropertyId::ResponseTopic, PropertyValue::Utf8(v.clone())));
    }
    if let Some(v) = &will.correlation_data {
        props.push((PropertyId::CorrelationData, PropertyValue::Bytes(v.clone())));
    }
    for (k, v) in &will.user_properties {
        props.push((
            PropertyId::UserProperty,
            PropertyValue::Utf8Pair(k.clone(), v.clone()),
        ));
    }
    encode_properties(&props, out)
}

fn encode_connect_ack(header: &ConnectAckHeader, out: &mut Vec<u8>) -> Result<(), Error> {
    out.push(if header.session_present { 0x01 } else { 0x00 });
    out.push(header.reason_code);

    let mut props = Vec::new();
    if let Some(v) = header.session_expiry_interval {
        props.push((PropertyId::SessionExpiryInterval, PropertyValue::U32(v)));
    }
    if let Some(v) = header.receive_maximum {
        props.push((PropertyId::ReceiveMaximum, PropertyValue::U16(v)));
    }
    if let Some(v) = header.maximum_qos {
        props.push((PropertyId::MaximumQoS, PropertyValue::Byte(v as u8)));
    }
    if let Some(v) = header.retain_available {
        props.push((PropertyId::RetainAvailable, PropertyValue::Byte(v as u8)));
    }
    if let Some(v) = header.maximum_packet_size {
        props.push((PropertyId::MaximumPacketSize, PropertyValue::U32(v)));
    }
    if let Some(v) = &header.assigned_client_id {
        props.push((PropertyId::AssignedClientIdentifier, PropertyValue::Utf8(v.clone())));
    }
    if let Some(v) = header.topic_alias_maximum {
        props.push((PropertyId::TopicAliasMaximum, PropertyValue::U16(v)));
    }
    if let Some(v) = &header.reason_string {
        props.push((PropertyId::ReasonString, PropertyValue::Utf8(v.clone())));
    }
    for (k, v) in &header.user_properties {
        props.push((
            PropertyId::UserProperty,
            PropertyValue::Utf8Pair(k.clone(), v.clone()),
        ));
    }
    if let Some(v) = header.wildcard_subscription_available {
        props.push((
            PropertyId::WildcardSubscriptionAvailable,
            PropertyValue::Byte(v as u8),
        ));
    }
    if let Some(v) = header.subscription_identifier_available {
        props.push((
            PropertyId::SubscriptionIdentifierAvailable,
            PropertyValue::Byte(v as u8),
        ));
    }
    if let Some(v) = header.shared_subscription_available {
        props.push((
            PropertyId::SharedSubscriptionAvailable,
            PropertyValue::Byte(v as u8),
        ));
    }
    if let Some(v) = header.server_keep_alive {
        props.push((PropertyId::ServerKeepAlive, PropertyValue::U16(v)));
    }
    if let Some(v) = &header.response_information {
        props.push((PropertyId::ResponseInformation, PropertyValue::Utf8(v.clone())));
    }
    if let Some(v) = &header.server_reference {
        props.push((PropertyId::ServerReference, PropertyValue::Utf8(v.clone())));
    }
    if let Some(v) = &header.authentication_method {
        props.push((PropertyId::AuthenticationMethod, PropertyValue::Utf8(v.clone())));
    }
    if let Some(v) = &header.authentication_data {
        props.push((PropertyId::AuthenticationData, PropertyValue::Bytes(v.clone())));
    }
    encode_properties(&props, out)
}

fn encode_publish(header: &PublishHeader, payload: &[u8], out: &mut Vec<u8>) -> Result<(), Error> {
    encode_utf8(&header.topic, out)?;
    if header.qos != QoS::AtMostOnce {
        let packet_id = header
            .packet_id
            .ok_or(Error::BadPacketPayload(PacketType::Publish))?;
        encode_u16(packet_id, out);
    }

    let mut props = Vec::new();
    if let Some(v) = header.payload_format_indicator {
        props.push((PropertyId::PayloadFormatIndicator, PropertyValue::Byte(v)));
    }
    // Seconds, per MQTT 5 §3.3.2.3.3 — the same unit the decoder assumes.
    if let Some(v) = header.message_expiry_interval {
        props.push((PropertyId::MessageExpiryInterval, PropertyValue::U32(v)));
    }
    if let Some(v) = header.topic_alias {
        props.push((PropertyId::TopicAlias, PropertyValue::U16(v)));
    }
    if let Some(v) = &header.response_topic {
        props.push((PropertyId::ResponseTopic, PropertyValue::Utf8(v.clone())));
    }
    if let Some(v) = &header.correlation_data {
        props.push((PropertyId::CorrelationData, PropertyValue::Bytes(v.clone())));
    }
    if let Some(v) = &header.content_type {
        props.push((PropertyId::ContentType, PropertyValue::Utf8(v.clone())));
    }
    for v in &header.subscription_identifiers {
        props.push((PropertyId::SubscriptionIdentifier, PropertyValue::VarInt(*v)));
    }
    for (k, v) in &header.user_properties {
        props.push((
            PropertyId::UserProperty,
            PropertyValue::Utf8Pair(k.clone(), v.clone()),
        ));
    }
    encode_properties(&props, out)?;

    out.extend_from_slice(payload);
    Ok(())
}

/// Shared by PUBACK/PUBREC/PUBREL/PUBCOMP: the reason code and properties
/// are both omittable, so a plain-success response with no extra
/// information still encodes down to just the two-byte packet identifier.
fn encode_pub_response(header: &PubResponseHeader, out: &mut Vec<u8>) -> Result<(), Error> {
    encode_u16(header.packet_id, out);

    let reason_code = header.reason_code.unwrap_or(0);
    let has_properties = header.reason_string.is_some() || !header.user_properties.is_empty();
    if reason_code == 0 && !has_properties {
        return Ok(());
    }
    out.push(reason_code);
    if !has_properties {
        return Ok(());
    }

    let mut props = Vec::new();
    if let Some(v) = &header.reason_string {
        props.push((PropertyId::ReasonString, PropertyValue::Utf8(v.clone())));
    }
    for (k, v) in &header.user_properties {
        props.push((
            PropertyId::UserProperty,
            PropertyValue::Utf8Pair(k.clone(), v.clone()),
        ));
    }
    encode_properties(&props, out)
}

fn encode_subscribe(header: &SubscribeHeader, out: &mut Vec<u8>) -> Result<(), Error> {
    encode_u16(header.packet_id, out);

    let mut props = Vec::new();
    if let Some(v) = header.subscription_identifier {
        props.push((PropertyId::SubscriptionIdentifier, PropertyValue::VarInt(v)));
    }
    for (k, v) in &header.user_properties {
        props.push((
            PropertyId::UserProperty,
            PropertyValue::Utf8Pair(k.clone(), v.clone()),
        ));
    }
    encode_properties(&props, out)?;

    for sub in &header.subscriptions {
        encode_utf8(&sub.topic_filter, out)?;
        let mut options = sub.qos as u8;
        if sub.no_local {
            options |= 0x04;
        }
        if sub.retain_as_published {
            options |= 0x08;
        }
        options |= (sub.retain_handling as u8) << 4;
        out.push(options);
    }
    Ok(())
}

fn encode_suback(header: &SubAckHeader, out: &mut Vec<u8>) -> Result<(), Error> {
    encode_u16(header.packet_id, out);

    let mut props = Vec::new();
    if let Some(v) = &header.reason_string {
        props.push((PropertyId::ReasonString, PropertyValue::Utf8(v.clone())));
    }
    for (k, v) in &header.user_properties {
        props.push((
            PropertyId::UserProperty,
            PropertyValue::Utf8Pair(k.clone(), v.clone()),
        ));
    }
    encode_properties(&props, out)?;

    out.extend_from_slice(&header.reason_codes);
    Ok(())
}

fn encode_unsubscribe(header: &UnsubscribeHeader, out: &mut Vec<u8>) -> Result<(), Error> {
    encode_u16(header.packet_id, out);

    let mut props = Vec::new();
    for (k, v) in &header.user_properties {
        props.push((
            PropertyId::UserProperty,
            PropertyValue::Utf8Pair(k.clone(), v.clone()),
        ));
    }
    encode_properties(&props, out)?;

    for filter in &header.topic_filters {
        encode_utf8(filter, out)?;
    }
    Ok(())
}

fn encode_unsuback(header: &UnsubAckHeader, out: &mut Vec<u8>) -> Result<(), Error> {
    encode_u16(header.packet_id, out);

    let mut props = Vec::new();
    if let Some(v) = &header.reason_string {
        props.push((PropertyId::ReasonString, PropertyValue::Utf8(v.clone())));
    }
    for (k, v) in &header.user_properties {
        props.push((
            PropertyId::UserProperty,
            PropertyValue::Utf8Pair(k.clone(), v.clone()),
        ));
    }
    encode_properties(&props, out)?;

    out.extend_from_slice(&header.reason_codes);
    Ok(())
}

fn encode_disconnect(header: &DisconnectHeader, out: &mut Vec<u8>) -> Result<(), Error> {
    let reason_code = header.reason_code.unwrap_or(0);
    let has_properties = header.session_expiry_interval.is_some()
        || header.reason_string.is_some()
        || header.server_reference.is_some()
        || !header.user_properties.is_empty();
    if reason_code == 0 && !has_properties {
        return Ok(());
    }
    out.push(reason_code);
    if !has_properties {
        return Ok(());
    }

    let mut props = Vec::new();
    if let Some(v) = header.session_expiry_interval {
        props.push((PropertyId::SessionExpiryInterval, PropertyValue::U32(v)));
    }
    if let Some(v) = &header.reason_string {
        props.push((PropertyId::ReasonString, PropertyValue::Utf8(v.clone())));
    }
    if let Some(v) = &header.server_reference {
        props.push((PropertyId::ServerReference, PropertyValue::Utf8(v.clone())));
    }
    for (k, v) in &header.user_properties {
        props.push((
            PropertyId::UserProperty,
            PropertyValue::Utf8Pair(k.clone(), v.clone()),
        ));
    }
    encode_properties(&props, out)
}

fn encode_auth(header: &AuthHeader, out: &mut Vec<u8>) -> Result<(), Error> {
    let has_properties = header.authentication_method.is_some()
        || header.authentication_data.is_some()
        || header.reason_string.is_some()
        || !header.user_properties.is_empty();
    if header.reason_code == 0 && !has_properties {
        return Ok(());
    }
    out.push(header.reason_code);
    if !has_properties {
        return Ok(());
    }

    let mut props = Vec::new();
    if let Some(v) = &header.authentication_method {
        props.push((PropertyId::AuthenticationMethod, PropertyValue::Utf8(v.clone())));
    }
    if let Some(v) = &header.authentication_data {
        props.push((PropertyId::AuthenticationData, PropertyValue::Bytes(v.clone())));
    }
    if let Some(v) = &header.reason_string {
        props.push((PropertyId::ReasonString, PropertyValue::Utf8(v.clone())));
    }
    for (k, v) in &header.user_properties {
        props.push((
            PropertyId::UserProperty,
            PropertyValue::Utf8Pair(k.clone(), v.clone()),
        ));
    }
    encode_properties(&props, out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pingreq_is_two_bytes() {
        let mut out = Vec::new();
        encode_packet(&Packet::PingReq, &[], &mut out).unwrap();
        assert_eq!(out, vec![0xC0, 0x00]);
    }

    #[test]
    fn disconnect_with_default_header_is_two_bytes() {
        let mut out = Vec::new();
        encode_packet(&Packet::Disconnect(DisconnectHeader::default()), &[], &mut out).unwrap();
        assert_eq!(out, vec![0xE0, 0x00]);
    }

    #[test]
    fn puback_with_default_header_is_four_bytes() {
        let mut out = Vec::new();
        let header = PubResponseHeader {
            packet_id: 7,
            ..Default::default()
        };
        encode_packet(&Packet::PublishAck(header), &[], &mut out).unwrap();
        #[rustfmt::skip]
        let expected = vec![0x40, 0x02, 0x00, 0x07];
        assert_eq!(out, expected);
    }

    #[test]
    fn connect_carries_protocol_level_five() {
        let packet = Packet::Connect(ConnectHeader {
            client_id: "test".into(),
            clean_session: true,
            ..Default::default()
        });
        let mut out = Vec::new();
        encode_packet(&packet, &[], &mut out).unwrap();
        // fixed header (2) + "MQTT" (6) + protocol level
        assert_eq!(out[8], 5);
    }

    #[test]
    fn connect_rejects_empty_client_id_without_clean_session() {
        let packet = Packet::Connect(ConnectHeader {
            client_id: String::new(),
            clean_session: false,
            ..Default::default()
        });
        let mut out = Vec::new();
        assert_eq!(
            encode_packet(&packet, &[], &mut out),
            Err(Error::EmptyClientIdentifier)
        );
    }
}
