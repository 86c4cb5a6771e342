//! Resumable v5 property block codec (C5).
//!
//! A property block is a variable-length-integer byte count followed by that
//! many bytes of `(identifier, value)` pairs, where the value's wire shape is
//! fixed per identifier (MQTT 5 §2.2.2.2). Every identifier may appear at
//! most once except `UserProperty` and `SubscriptionIdentifier`, which the
//! spec explicitly allows to repeat; everything else repeating is a
//! `DuplicateProperty` error, caught here with a bitmap keyed by identifier
//! code rather than a `HashSet` (there are only 43 possible codes).

use mqtt_core::primitives::{
    decode_blob, decode_u16, decode_u32, decode_u8, decode_utf8, decode_varint, encode_blob,
    encode_u16, encode_u32, encode_utf8, encode_varint, varint_size, BlobScratch, U16Scratch,
    U32Scratch, VarIntScratch,
};
use mqtt_core::{Error, PropertyId};

/// A decoded property value, tagged by the wire shape its identifier
/// implies.
#[derive(Debug, Clone, PartialEq)]
pub enum PropertyValue {
    Byte(u8),
    U16(u16),
    U32(u32),
    VarInt(u32),
    Utf8(String),
    Bytes(Vec<u8>),
    Utf8Pair(String, String),
}

fn wire_shape(id: PropertyId) -> Shape {
    use PropertyId::*;
    match id {
        PayloadFormatIndicator | RequestProblemInformation | RequestResponseInformation
        | MaximumQoS | RetainAvailable | WildcardSubscriptionAvailable
        | SubscriptionIdentifierAvailable | SharedSubscriptionAvailable => Shape::Byte,
        ServerKeepAlive | ReceiveMaximum | TopicAliasMaximum | TopicAlias => Shape::U16,
        MessageExpiryInterval | SessionExpiryInterval | WillDelayInterval | MaximumPacketSize => {
            Shape::U32
        }
        SubscriptionIdentifier => Shape::VarInt,
        ContentType | ResponseTopic | AssignedClientIdentifier | AuthenticationMethod
        | ResponseInformation | ServerReference | ReasonString => Shape::Utf8,
        CorrelationData | AuthenticationData => Shape::Bytes,
        UserProperty => Shape::Utf8Pair,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Shape {
    Byte,
    U16,
    U32,
    VarInt,
    Utf8,
    Bytes,
    Utf8Pair,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Seq {
    ContainerLength,
    Identifier,
    Value,
    KeyThenValue,
}

/// Resumable decoder for one property block.
pub struct PropertyDecoder {
    seq: Seq,
    varint: VarIntScratch,
    u16: U16Scratch,
    u32: U32Scratch,
    blob: BlobScratch,
    container_len: usize,
    consumed: usize,
    seen: u64,
    pending_id: Option<PropertyId>,
    pending_key: Option<String>,
    properties: Vec<(PropertyId, PropertyValue)>,
}

impl PropertyDecoder {
    pub fn new() -> Self {
        PropertyDecoder {
            seq: Seq::ContainerLength,
            varint: VarIntScratch::default(),
            u16: U16Scratch::default(),
            u32: U32Scratch::default(),
            blob: BlobScratch::default(),
            container_len: 0,
            consumed: 0,
            seen: 0,
            pending_id: None,
            pending_key: None,
            properties: Vec::new(),
        }
    }

    fn mark_seen(&mut self, id: PropertyId) -> Result<(), Error> {
        let bit = 1u64 << id.code();
        if self.seen & bit != 0 && !id.is_repeatable() {
            return Err(Error::DuplicateProperty(id));
        }
        self.seen |= bit;
        Ok(())
    }

    /// Feeds more bytes in. Returns bytes consumed and, once the whole block
    /// (including its own length prefix) has been read, the property list.
    pub fn feed(
        &mut self,
        input: &[u8],
    ) -> Result<(usize, Option<Vec<(PropertyId, PropertyValue)>>), Error> {
        let mut consumed = 0;

        if self.seq == Seq::ContainerLength {
            let (n, result) = decode_varint(&mut self.varint, &input[consumed..]);
            consumed += n;
            match result? {
                None => return Ok((consumed, None)),
                Some(len) => {
                    self.container_len = len as usize;
                    self.seq = Seq::Identifier;
                    if self.container_len == 0 {
                        return Ok((consumed, Some(std::mem::take(&mut self.properties))));
                    }
                }
            }
        }

        loop {
            if self.consumed >= self.container_len {
                return Ok((consumed, Some(std::mem::take(&mut self.properties))));
            }

            if self.seq == Seq::Identifier {
                let (n, result) = decode_varint(&mut self.varint, &input[consumed..]);
                consumed += n;
                self.consumed += n;
                match result? {
                    None => return Ok((consumed, None)),
                    Some(raw) => {
                        let id = u8::try_from(raw)
                            .ok()
                            .and_then(|b| PropertyId::try_from(b).ok())
                            .ok_or(Error::BadPropertyIdentifier)?;
                        self.mark_seen(id)?;
                        self.pending_id = Some(id);
                        self.seq = if wire_shape(id) == Shape::Utf8Pair {
                            Seq::KeyThenValue
                        } else {
                            Seq::Value
                        };
                    }
                }
            }

            let id = self.pending_id.expect("identifier decoded before value");

            if self.seq == Seq::KeyThenValue {
                let (n, result) = decode_utf8(&mut self.blob, &input[consumed..]);
                consumed += n;
                self.consumed += n;
                match result? {
                    None => return Ok((consumed, None)),
                    Some(key) => {
                        self.pending_key = Some(key);
                        self.seq = Seq::Value;
                    }
                }
            }

            let (n, value) = self.feed_value(id, &input[consumed..])?;
            consumed += n;
            self.consumed += n;
            match value {
                None => return Ok((consumed, None)),
                Some(value) => {
                    if self.consumed > self.container_len {
                        return Err(Error::BadPropertyLength);
                    }
                    self.properties.push((id, value));
                    self.pending_id = None;
                    self.pending_key = None;
                    self.seq = Seq::Identifier;
                }
            }
        }
    }

    fn feed_value(
        &mut self,
        id: PropertyId,
        input: &[u8],
    ) -> Result<(usize, Option<PropertyValue>), Error> {
        match wire_shape(id) {
            Shape::Byte => {
                let (n, byte) = decode_u8(input);
                Ok((n, byte.map(PropertyValue::Byte)))
            }
            Shape::U16 => {
                let (n, value) = decode_u16(&mut self.u16, input);
                Ok((n, value.map(PropertyValue::U16)))
            }
            Shape::U32 => {
                // Session/message-expiry/maximum-packet-size/will-delay are
                // encoded as plain four-byte big-endian integers, not
                // variable-length ones.
                let (n, value) = decode_u32(&mut self.u32, input);
                Ok((n, value.map(PropertyValue::U32)))
            }
            Shape::VarInt => {
                let (n, result) = decode_varint(&mut self.varint, input);
                Ok((n, result?.map(PropertyValue::VarInt)))
            }
            Shape::Utf8 => {
                let (n, result) = decode_utf8(&mut self.blob, input);
                Ok((n, result?.map(PropertyValue::Utf8)))
            }
            Shape::Bytes => {
                let (n, result) = decode_blob(&mut self.blob, input);
                Ok((n, result.map(PropertyValue::Bytes)))
            }
            Shape::Utf8Pair => {
                let (n, result) = decode_utf8(&mut self.blob, input);
                Ok((
                    n,
                    result?.map(|value| {
                        let key = self.pending_key.take().unwrap_or_default();
                        PropertyValue::Utf8Pair(key, value)
                    }),
                ))
            }
        }
    }

}

pub fn encode_properties(properties: &[(PropertyId, PropertyValue)], out: &mut Vec<u8>) -> Result<(), Error> {
    let mut body = Vec::new();
    for (id, value) in properties {
        encode_varint(u32::from(id.code()), &mut body)?;
        match value {
            PropertyValue::Byte(b) => body.push(*b),
            PropertyValue::U16(v) => encode_u16(*v, &mut body),
            PropertyValue::U32(v) => encode_u32(*v, &mut body),
            PropertyValue::VarInt(v) => encode_varint(*v, &mut body)?,
            PropertyValue::Utf8(s) => encode_utf8(s, &mut body)?,
            PropertyValue::Bytes(b) => encode_blob(b, &mut body)?,
            PropertyValue::Utf8Pair(k, v) => {
                encode_utf8(k, &mut body)?;
                encode_utf8(v, &mut body)?;
            }
        }
    }
    varint_size(body.len() as u32)?;
    encode_varint(body.len() as u32, out)?;
    out.extend_from_slice(&body);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decode_all(bytes: &[u8]) -> Vec<(PropertyId, PropertyValue)> {
        let mut decoder = PropertyDecoder::new();
        let mut consumed = 0;
        let mut result = None;
        while result.is_none() {
            let (n, props) = decoder.feed(&bytes[consumed..]).unwrap();
            consumed += n;
            result = props;
        }
        assert_eq!(consumed, bytes.len());
        result.unwrap()
    }

    #[test]
    fn empty_property_block() {
        assert_eq!(decode_all(&[0x00]), vec![]);
    }

    #[test]
    fn session_expiry_interval_roundtrip() {
        let props = vec![(PropertyId::SessionExpiryInterval, PropertyValue::U32(3600))];
        let mut out = Vec::new();
        encode_properties(&props, &mut out).unwrap();
        assert_eq!(decode_all(&out), props);
    }

    #[test]
    fn session_expiry_interval_resumes_one_byte_at_a_time() {
        let props = vec![(PropertyId::SessionExpiryInterval, PropertyValue::U32(0x0E10_1234))];
        let mut bytes = Vec::new();
        encode_properties(&props, &mut bytes).unwrap();

        let mut decoder = PropertyDecoder::new();
        let mut result = None;
        for &byte in &bytes {
            let (_, props) = decoder.feed(&[byte]).unwrap();
            if props.is_some() {
                result = props;
            }
        }
        assert_eq!(result.unwrap(), props);
    }

    #[test]
    fn user_properties_may_repeat() {
        let props = vec![
            (
                PropertyId::UserProperty,
                PropertyValue::Utf8Pair("a".into(), "1".into()),
            ),
            (
                PropertyId::UserProperty,
                PropertyValue::Utf8Pair("a".into(), "2".into()),
            ),
        ];
        let mut out = Vec::new();
        encode_properties(&props, &mut out).unwrap();
        assert_eq!(decode_all(&out), props);
    }

    #[test]
    fn duplicate_session_expiry_interval_is_rejected() {
        let props = vec![
            (PropertyId::SessionExpiryInterval, PropertyValue::U32(1)),
            (PropertyId::SessionExpiryInterval, PropertyValue::U32(2)),
        ];
        let mut bytes = Vec::new();
        encode_properties(&props, &mut bytes).unwrap();

        let mut decoder = PropertyDecoder::new();
        let mut consumed = 0;
        let mut err = None;
        loop {
            match decoder.feed(&bytes[consumed..]) {
                Ok((n, Some(_))) => {
                    consumed += n;
                    break;
                }
                Ok((n, None)) => consumed += n,
                Err(e) => {
                    err = Some(e);
                    break;
                }
            }
        }
        assert_eq!(err, Some(Error::DuplicateProperty(PropertyId::SessionExpiryInterval)));
    }

    #[test]
    fn unknown_identifier_is_rejected() {
        let bytes = [0x02, 0x7E, 0x00];
        let mut decoder = PropertyDecoder::new();
        let result = decoder.feed(&bytes);
        assert_eq!(result, Err(Error::BadPropertyIdentifier));
    }

    #[test]
    fn value_overrunning_declared_length_is_rejected() {
        // declared length 2, but session-expiry-interval's id byte plus a
        // u32 value needs 5 more bytes: the block lies about its length.
        let bytes = [0x02, 0x11, 0x00, 0x00, 0x00, 0x01];
        let mut decoder = PropertyDecoder::new();
        let mut consumed = 0;
        let mut err = None;
        loop {
            match decoder.feed(&bytes[consumed..]) {
                Ok((n, Some(_))) => {
                    consumed += n;
                    break;
                }
                Ok((n, None)) => consumed += n,
                Err(e) => {
                    err = Some(e);
                    break;
                }
            }
        }
        assert_eq!(err, Some(Error::BadPropertyLength));
    }
}
