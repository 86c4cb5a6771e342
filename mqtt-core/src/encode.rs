//! One-shot v3 packet encoders (C4, write side).
//!
//! Encoding does not need to be resumable the way decoding does: the caller
//! already owns a complete [`Packet`] value, so each encoder computes its
//! remaining length up front and then emits the fixed header followed by the
//! body into a single `Vec<u8>`, the same two-pass shape
//! `mqtt-sync-client::io::Sender` uses (`Vec::with_capacity` sized by
//! `packet.size()`, then one `write_all`).

use crate::context::encode_fixed_header;
use crate::packet::*;
use crate::primitives::{encode_u16, encode_utf8};
use crate::Error;

/// Encodes `packet` (and, for PUBLISH, `payload`) into `out`, prefixed by its
/// fixed header. `payload` is ignored for every packet type except PUBLISH.
pub fn encode_packet(packet: &Packet, payload: &[u8], out: &mut Vec<u8>) -> Result<(), Error> {
    let mut body = Vec::new();
    encode_body(packet, payload, &mut body)?;

    let flags = packet_flags(packet);
    let header = FixedHeader {
        packet_type: packet.packet_type(),
        flags,
        remaining_length: body.len(),
    };
    trace!(
        "encoding {} ({} bytes + {} byte payload)",
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
        | Packet::PublishComplete(header) => {
            encode_u16(header.packet_id, out);
            Ok(())
        }
        Packet::Subscribe(header) => encode_subscribe(header, out),
        Packet::SubscribeAck(header) => encode_suback(header, out),
        Packet::Unsubscribe(header) => encode_unsubscribe(header, out),
        Packet::UnsubscribeAck(header) => {
            encode_u16(header.packet_id, out);
            Ok(())
        }
        Packet::PingReq | Packet::PingResp => Ok(()),
        Packet::Disconnect(_) => Ok(()),
        Packet::Auth(_) => Err(Error::BadPacketType),
    }
}

fn encode_connect(header: &ConnectHeader, out: &mut Vec<u8>) -> Result<(), Error> {
    if !header.clean_session && header.client_id.is_empty() {
        return Err(Error::EmptyClientIdentifier);
    }

    encode_utf8("MQTT", out)?;
    out.push(4); // protocol level, v3.1.1

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
    encode_utf8(&header.client_id, out)?;

    if let Some(will) = &header.last_will {
        encode_utf8(&will.topic, out)?;
        crate::primitives::encode_blob(&will.payload, out)?;
    }
    if let Some(username) = &header.username {
        encode_utf8(username, out)?;
    }
    if let Some(password) = &header.password {
        crate::primitives::encode_blob(password, out)?;
    }
    Ok(())
}

fn encode_connect_ack(header: &ConnectAckHeader, out: &mut Vec<u8>) -> Result<(), Error> {
    out.push(if header.session_present { 0x01 } else { 0x00 });
    out.push(header.reason_code);
    Ok(())
}

fn encode_publish(header: &PublishHeader, payload: &[u8], out: &mut Vec<u8>) -> Result<(), Error> {
    encode_utf8(&header.topic, out)?;
    if header.qos != QoS::AtMostOnce {
        let packet_id = header
            .packet_id
            .ok_or(Error::BadPacketPayload(PacketType::Publish))?;
        encode_u16(packet_id, out);
    }
    out.extend_from_slice(payload);
    Ok(())
}

fn encode_subscribe(header: &SubscribeHeader, out: &mut Vec<u8>) -> Result<(), Error> {
    encode_u16(header.packet_id, out);
    for sub in &header.subscriptions {
        encode_utf8(&sub.topic_filter, out)?;
        out.push(sub.qos as u8);
    }
    Ok(())
}

fn encode_suback(header: &SubAckHeader, out: &mut Vec<u8>) -> Result<(), Error> {
    encode_u16(header.packet_id, out);
    out.extend_from_slice(&header.reason_codes);
    Ok(())
}

fn encode_unsubscribe(header: &UnsubscribeHeader, out: &mut Vec<u8>) -> Result<(), Error> {
    encode_u16(header.packet_id, out);
    for filter in &header.topic_filters {
        encode_utf8(filter, out)?;
    }
    Ok(())
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
    fn disconnect_is_two_bytes() {
        let mut out = Vec::new();
        encode_packet(
            &Packet::Disconnect(DisconnectHeader::default()),
            &[],
            &mut out,
        )
        .unwrap();
        assert_eq!(out, vec![0xE0, 0x00]);
    }

    #[test]
    fn connect_matches_reference_bytes() {
        let packet = Packet::Connect(ConnectHeader {
            client_id: "test".into(),
            clean_session: true,
            keep_alive: 0,
            ..Default::default()
        });
        let mut out = Vec::new();
        encode_packet(&packet, &[], &mut out).unwrap();
        #[rustfmt::skip]
        let expected = vec![
            0x10, 0x10,
            0x00, 0x04, b'M', b'Q', b'T', b'T',
            0x04,
            0x02,
            0x00, 0x00,
            0x00, 0x04, b't', b'e', b's', b't',
        ];
        assert_eq!(out, expected);
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

    #[test]
    fn publish_qos0_carries_payload_verbatim() {
        let packet = Packet::Publish(PublishHeader {
            topic: "a/b".into(),
            qos: QoS::AtMostOnce,
            ..Default::default()
        });
        let mut out = Vec::new();
        encode_packet(&packet, b"hi", &mut out).unwrap();
        #[rustfmt::skip]
        let expected = vec![
            0x30, 0x07,
            0x00, 0x03, b'a', b'/', b'b',
            b'h', b'i',
        ];
        assert_eq!(out, expected);
    }

    #[test]
    fn encode_then_decode_connect_roundtrips() {
        use crate::context::FixedHeaderDecoder;
        use crate::decode::decoder_for;

        let packet = Packet::Connect(ConnectHeader {
            client_id: "roundtrip".into(),
            clean_session: true,
            keep_alive: 42,
            username: Some("bob".into()),
            password: Some(b"secret".to_vec()),
            ..Default::default()
        });
        let mut out = Vec::new();
        encode_packet(&packet, &[], &mut out).unwrap();

        let mut header_decoder = FixedHeaderDecoder::new();
        let (n, header) = header_decoder.feed(&out).unwrap();
        let header = header.unwrap();
        let mut decoder = decoder_for(&header).unwrap();
        let (_, decoded) = decoder.feed(&out[n..]).unwrap();
        assert_eq!(decoded.unwrap(), packet);
    }
}
