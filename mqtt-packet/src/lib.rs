//! MQTT 5 property system and v5 packet encoders/decoders (C5, C6).
//!
//! Builds on `mqtt-core`'s wire primitives, fixed-header codec and shared
//! packet data model. Everything here follows the same resumable, allocation
//! bounded shape as `mqtt-core`'s v3 decoders; the one thing v5 adds to every
//! packet type is a properties block (`props`), parsed by
//! [`PropertyDecoder`] and folded into the same header structs `mqtt-core`
//! already defines.

#[macro_use]
extern crate log;

extern crate mqtt_core as mqtt;

mod decode;
mod encode;
mod props;
mod reason_code;

pub use crate::decode::{decoder_for, Decoder};
pub use crate::encode::encode_packet;
pub use crate::props::{encode_properties, PropertyDecoder, PropertyValue};
pub use crate::reason_code::ReasonCode;
