//! Crate-wide error type.
//!
//! Names follow `terraqtt::errc` (the original C++ implementation this codec
//! was distilled from) rather than inventing new vocabulary, so the taxonomy
//! in spec §7 maps one-to-one onto variant names here.

use derive_more::Display;

use crate::packet::{PacketType, PropertyId};

/// Everything that can go wrong encoding or decoding an MQTT packet.
///
/// There is deliberately no `Io` variant: transport errors are the caller's
/// own error type and are never folded into this one (see `mqtt-client`'s
/// `SessionError`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum Error {
    /// A variable-length integer would need a fifth continuation byte.
    #[display(fmt = "variable integer too large")]
    VariableIntegerTooLarge,
    /// A blob (string or binary data) is longer than 65,535 bytes.
    #[display(fmt = "container too long")]
    ContainerTooLong,
    /// A PUBLISH payload does not fit in the remaining packet length.
    #[display(fmt = "payload too large")]
    PayloadTooLarge,

    /// The continuation bit was still set on the fourth byte of a variable
    /// integer while decoding.
    #[display(fmt = "malformed variable integer")]
    MalformedVariableInteger,
    /// The high nibble of the first fixed-header byte is not a known
    /// [`PacketType`].
    #[display(fmt = "bad packet type")]
    BadPacketType,
    /// The low nibble (flags) of the fixed header is invalid for this
    /// packet's type.
    #[display(fmt = "bad {} flags", _0)]
    BadPacketFlags(PacketType),
    /// The remaining length does not match what this packet type requires.
    #[display(fmt = "bad {} payload", _0)]
    BadPacketPayload(PacketType),
    /// A PUBLISH, SUBSCRIBE option, or CONNECT will carried QoS value 3.
    #[display(fmt = "bad qos")]
    BadQoS,
    /// A CONNACK return code outside the six defined v3 values.
    #[display(fmt = "bad connect return code")]
    BadConnectReturnCode,
    /// A reason code outside the set valid for its packet type (v5).
    #[display(fmt = "bad reason code")]
    BadReasonCode,
    /// `clean_session == false` with an empty client identifier.
    #[display(fmt = "empty client identifier")]
    EmptyClientIdentifier,
    /// Will flag unset but will QoS/retain bits present, or similar.
    #[display(fmt = "bad will")]
    BadWill,
    /// Password present without a username.
    #[display(fmt = "bad username/password combination")]
    BadUsernamePassword,

    /// The v5 Receive Maximum property carried value 0.
    #[display(fmt = "malformed receive maximum")]
    MalformedReceiveMaximum,
    /// The v5 Maximum QoS property carried a value greater than 1.
    #[display(fmt = "malformed maximum qos")]
    MalformedMaximumQoS,
    /// An identifier byte in a v5 property block matches no known
    /// [`PropertyId`].
    #[display(fmt = "bad property identifier")]
    BadPropertyIdentifier,
    /// An at-most-once v5 property appeared more than once in the same
    /// property block.
    #[display(fmt = "duplicate {}", _0)]
    DuplicateProperty(PropertyId),
    /// The number of bytes consumed while parsing a property block did not
    /// equal the block's declared length.
    #[display(fmt = "property block length mismatch")]
    BadPropertyLength,

    /// A length-prefixed string was not valid UTF-8.
    #[display(fmt = "malformed utf-8 string")]
    MalformedUtf8,
}

impl Error {
    /// The numeric error code used by `terraqtt`: `100 + offset` for
    /// protocol errors, `4000 + property identifier` for duplicates.
    pub fn code(&self) -> u32 {
        use Error::*;
        match self {
            VariableIntegerTooLarge => 101,
            ContainerTooLong => 102,
            PayloadTooLarge => 1,
            MalformedVariableInteger => 100,
            BadPacketType => 103,
            BadPacketFlags(_) => 104,
            BadPacketPayload(_) => 105,
            BadQoS => 106,
            BadConnectReturnCode => 107,
            BadReasonCode => 108,
            EmptyClientIdentifier => 109,
            BadWill => 110,
            BadUsernamePassword => 111,
            MalformedReceiveMaximum => 114,
            MalformedMaximumQoS => 115,
            BadPropertyIdentifier => 116,
            DuplicateProperty(id) => 4000 + u32::from(id.code()),
            BadPropertyLength => 112,
            MalformedUtf8 => 113,
        }
    }

    /// `true` for everything in the 100..=500 protocol-error range, matching
    /// `terraqtt::ErrorCondition::protocol_error`.
    pub fn is_protocol_error(&self) -> bool {
        matches!(self.code(), 100..=500)
    }
}

impl std::error::Error for Error {}
