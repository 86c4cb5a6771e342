//! Incremental MQTT 3.1.1 wire codec: primitives, fixed header, the shared
//! packet data model, and v3 packet encoders/decoders.
//!
//! `mqtt-packet` builds the v5 property system and v5 packet codecs on top
//! of the primitives and data model exported here; `mqtt-client` builds the
//! connection state engine on top of both.

#[macro_use]
extern crate log;

mod context;
mod decode;
mod encode;
mod error;
mod packet;
pub mod primitives;

pub use context::{encode_fixed_header, FixedHeaderDecoder};
pub use decode::{decoder_for, Decoder};
pub use encode::encode_packet;
pub use error::Error;
pub use packet::{
    AuthHeader, ConnectAckHeader, ConnectHeader, ConnectReturnCode, DisconnectHeader, FixedHeader,
    LastWill, Packet, PacketId, PacketType, PropertyId, PubResponseHeader, PublishHeader, QoS,
    RetainHandling, SubAckHeader, SubscribeHeader, SubscriptionRequest, UnsubAckHeader,
    UnsubscribeHeader,
};
