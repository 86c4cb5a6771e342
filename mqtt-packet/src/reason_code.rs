//! The v5 reason code space (MQTT 5 §2.4) and which codes are legal on each
//! packet type. v3.1.1 has no reason codes; `ConnectReturnCode` in
//! `mqtt-core` covers that protocol version's much smaller CONNACK code set.

use derive_more::Display;
use num_enum::TryFromPrimitive;

use mqtt_core::PacketType;

/// A v5 reason code, shared across CONNACK, the PUBACK family, SUBACK,
/// UNSUBACK, DISCONNECT and AUTH. Not every value is legal on every packet
/// type; see [`ReasonCode::is_valid_for`].
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, TryFromPrimitive, Display)]
pub enum ReasonCode {
    /// Doubles as `Success`/`NormalDisconnection`/`GrantedQoS0`.
    #[display(fmt = "GrantedQoS0")]
    GrantedQoS0 = 0x00,
    #[display(fmt = "GrantedQoS1")]
    GrantedQoS1 = 0x01,
    #[display(fmt = "GrantedQoS2")]
    GrantedQoS2 = 0x02,
    #[display(fmt = "DisconnectWithWillMessage")]
    DisconnectWithWillMessage = 0x04,
    #[display(fmt = "NoMatchingSubscribers")]
    NoMatchingSubscribers = 0x10,
    #[display(fmt = "NoSubscriptionExisted")]
    NoSubscriptionExisted = 0x11,
    #[display(fmt = "ContinueAuthentication")]
    ContinueAuthentication = 0x18,
    #[display(fmt = "Reauthenticate")]
    Reauthenticate = 0x19,
    #[display(fmt = "UnspecifiedError")]
    UnspecifiedError = 0x80,
    #[display(fmt = "MalformedPacket")]
    MalformedPacket = 0x81,
    #[display(fmt = "ProtocolError")]
    ProtocolError = 0x82,
    #[display(fmt = "ImplementationSpecificError")]
    ImplementationSpecificError = 0x83,
    #[display(fmt = "UnsupportedProtocolVersion")]
    UnsupportedProtocolVersion = 0x84,
    #[display(fmt = "ClientIdentifierNotValid")]
    ClientIdentifierNotValid = 0x85,
    #[display(fmt = "BadUserNameOrPassword")]
    BadUserNameOrPassword = 0x86,
    #[display(fmt = "NotAuthorized")]
    NotAuthorized = 0x87,
    #[display(fmt = "ServerUnavailable")]
    ServerUnavailable = 0x88,
    #[display(fmt = "ServerBusy")]
    ServerBusy = 0x89,
    #[display(fmt = "Banned")]
    Banned = 0x8A,
    #[display(fmt = "ServerShuttingDown")]
    ServerShuttingDown = 0x8B,
    #[display(fmt = "BadAuthenticationMethod")]
    BadAuthenticationMethod = 0x8C,
    #[display(fmt = "KeepAliveTimeout")]
    KeepAliveTimeout = 0x8D,
    #[display(fmt = "SessionTakenOver")]
    SessionTakenOver = 0x8E,
    #[display(fmt = "TopicFilterInvalid")]
    TopicFilterInvalid = 0x8F,
    #[display(fmt = "TopicNameInvalid")]
    TopicNameInvalid = 0x90,
    #[display(fmt = "PacketIdentifierInUse")]
    PacketIdentifierInUse = 0x91,
    #[display(fmt = "PacketIdentifierNotFound")]
    PacketIdentifierNotFound = 0x92,
    #[display(fmt = "ReceiveMaximumExceeded")]
    ReceiveMaximumExceeded = 0x93,
    #[display(fmt = "TopicAliasInvalid")]
    TopicAliasInvalid = 0x94,
    #[display(fmt = "PacketTooLarge")]
    PacketTooLarge = 0x95,
    #[display(fmt = "MessageRateTooHigh")]
    MessageRateTooHigh = 0x96,
    #[display(fmt = "QuotaExceeded")]
    QuotaExceeded = 0x97,
    #[display(fmt = "AdministrativeAction")]
    AdministrativeAction = 0x98,
    #[display(fmt = "PayloadFormatInvalid")]
    PayloadFormatInvalid = 0x99,
    #[display(fmt = "RetainNotSupported")]
    RetainNotSupported = 0x9A,
    #[display(fmt = "QoSNotSupported")]
    QoSNotSupported = 0x9B,
    #[display(fmt = "UseAnotherServer")]
    UseAnotherServer = 0x9C,
    #[display(fmt = "ServerMoved")]
    ServerMoved = 0x9D,
    #[display(fmt = "SharedSubscriptionsNotSupported")]
    SharedSubscriptionsNotSupported = 0x9E,
    #[display(fmt = "ConnectionRateExceeded")]
    ConnectionRateExceeded = 0x9F,
    #[display(fmt = "MaximumConnectTime")]
    MaximumConnectTime = 0xA0,
    #[display(fmt = "SubscriptionIdentifiersNotSupported")]
    SubscriptionIdentifiersNotSupported = 0xA1,
    #[display(fmt = "WildcardSubscriptionsNotSupported")]
    WildcardSubscriptionsNotSupported = 0xA2,
}

impl ReasonCode {
    /// Alias for the zero code on packet types where it means plain success
    /// rather than "granted QoS 0".
    pub const SUCCESS: ReasonCode = ReasonCode::GrantedQoS0;
    pub const NORMAL_DISCONNECTION: ReasonCode = ReasonCode::GrantedQoS0;

    /// Whether this code is one the spec permits on `packet_type`. Used to
    /// turn a structurally-valid-but-out-of-domain byte into
    /// `mqtt_core::Error::BadReasonCode` instead of silently accepting it.
    pub fn is_valid_for(&self, packet_type: PacketType) -> bool {
        use PacketType::*;
        use ReasonCode::*;
        match packet_type {
            ConnectAck => !matches!(
                self,
                DisconnectWithWillMessage
                    | NoMatchingSubscribers
                    | NoSubscriptionExisted
                    | ContinueAuthentication
                    | Reauthenticate
                    | PacketIdentifierInUse
                    | PacketIdentifierNotFound
                    | TopicFilterInvalid
                    | MessageRateTooHigh
                    | SharedSubscriptionsNotSupported
                    | MaximumConnectTime
                    | SubscriptionIdentifiersNotSupported
                    | WildcardSubscriptionsNotSupported
                    | KeepAliveTimeout
                    | SessionTakenOver
                    | AdministrativeAction
                    | TopicAliasInvalid
                    | ConnectionRateExceeded
            ),
            PublishAck | PublishReceived => matches!(
                self,
                GrantedQoS0
                    | NoMatchingSubscribers
                    | UnspecifiedError
                    | ImplementationSpecificError
                    | NotAuthorized
                    | TopicNameInvalid
                    | PacketIdentifierInUse
                    | QuotaExceeded
                    | PayloadFormatInvalid
            ),
            PublishRelease | PublishComplete => {
                matches!(self, GrantedQoS0 | PacketIdentifierNotFound)
            }
            SubscribeAck => matches!(
                self,
                GrantedQoS0
                    | GrantedQoS1
                    | GrantedQoS2
                    | UnspecifiedError
                    | ImplementationSpecificError
                    | NotAuthorized
                    | TopicFilterInvalid
                    | PacketIdentifierInUse
                    | QuotaExceeded
                    | SharedSubscriptionsNotSupported
                    | SubscriptionIdentifiersNotSupported
                    | WildcardSubscriptionsNotSupported
            ),
            UnsubscribeAck => matches!(
                self,
                GrantedQoS0
                    | NoSubscriptionExisted
                    | UnspecifiedError
                    | ImplementationSpecificError
                    | NotAuthorized
                    | TopicFilterInvalid
                    | PacketIdentifierInUse
            ),
            Disconnect => !matches!(
                self,
                GrantedQoS1
                    | GrantedQoS2
                    | NoMatchingSubscribers
                    | NoSubscriptionExisted
                    | ContinueAuthentication
                    | Reauthenticate
                    | ClientIdentifierNotValid
                    | BadUserNameOrPassword
                    | ServerUnavailable
                    | Banned
                    | BadAuthenticationMethod
                    | TopicNameInvalid
                    | PacketIdentifierInUse
                    | PacketIdentifierNotFound
                    | PacketTooLarge
                    | RetainNotSupported
                    | QoSNotSupported
            ),
            Auth => matches!(self, GrantedQoS0 | ContinueAuthentication | Reauthenticate),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn connack_accepts_success_and_rejects_pubrel_only_codes() {
        assert!(ReasonCode::GrantedQoS0.is_valid_for(PacketType::ConnectAck));
        assert!(!ReasonCode::PacketIdentifierNotFound.is_valid_for(PacketType::ConnectAck));
    }

    #[test]
    fn pubrel_accepts_only_two_codes() {
        assert!(ReasonCode::GrantedQoS0.is_valid_for(PacketType::PublishRelease));
        assert!(ReasonCode::PacketIdentifierNotFound.is_valid_for(PacketType::PublishRelease));
        assert!(!ReasonCode::NotAuthorized.is_valid_for(PacketType::PublishRelease));
    }
}
