//! Shared packet data model.
//!
//! One record per packet type serves both protocol versions: v5-only fields
//! are carried as `Option<T>`/`Vec<T>` and are simply left at their default
//! when a packet is decoded or encoded in v3 mode. Decoded strings and binary
//! blobs are owned (`String`/`Vec<u8>`) rather than borrowed, because a
//! resumable decode may assemble a single field out of bytes delivered across
//! several unrelated buffers.

use derive_more::Display;
use num_enum::TryFromPrimitive;

/// The sixteen MQTT control packet types (0 is reserved and never produced).
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, TryFromPrimitive, Display)]
pub enum PacketType {
    #[display(fmt = "CONNECT")]
    Connect = 1,
    #[display(fmt = "CONNACK")]
    ConnectAck = 2,
    #[display(fmt = "PUBLISH")]
    Publish = 3,
    #[display(fmt = "PUBACK")]
    PublishAck = 4,
    #[display(fmt = "PUBREC")]
    PublishReceived = 5,
    #[display(fmt = "PUBREL")]
    PublishRelease = 6,
    #[display(fmt = "PUBCOMP")]
    PublishComplete = 7,
    #[display(fmt = "SUBSCRIBE")]
    Subscribe = 8,
    #[display(fmt = "SUBACK")]
    SubscribeAck = 9,
    #[display(fmt = "UNSUBSCRIBE")]
    Unsubscribe = 10,
    #[display(fmt = "UNSUBACK")]
    UnsubscribeAck = 11,
    #[display(fmt = "PINGREQ")]
    PingReq = 12,
    #[display(fmt = "PINGRESP")]
    PingResp = 13,
    #[display(fmt = "DISCONNECT")]
    Disconnect = 14,
    #[display(fmt = "AUTH")]
    Auth = 15,
}

/// Quality of service level carried by PUBLISH and subscription requests.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, TryFromPrimitive, Display)]
pub enum QoS {
    #[display(fmt = "at-most-once")]
    AtMostOnce = 0,
    #[display(fmt = "at-least-once")]
    AtLeastOnce = 1,
    #[display(fmt = "exactly-once")]
    ExactlyOnce = 2,
}

impl Default for QoS {
    fn default() -> Self {
        QoS::AtMostOnce
    }
}

/// The CONNACK return code defined by v3.1.1 §3.2.2.3.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, TryFromPrimitive, Display)]
pub enum ConnectReturnCode {
    #[display(fmt = "Connection Accepted")]
    Accepted = 0,
    #[display(fmt = "Connection Refused, unacceptable protocol version")]
    UnacceptableProtocolVersion = 1,
    #[display(fmt = "Connection Refused, identifier rejected")]
    IdentifierRejected = 2,
    #[display(fmt = "Connection Refused, Server unavailable")]
    ServerUnavailable = 3,
    #[display(fmt = "Connection Refused, bad user name or password")]
    BadUsernameOrPassword = 4,
    #[display(fmt = "Connection Refused, not authorized")]
    NotAuthorized = 5,
}

/// SUBSCRIBE retain-handling option (v5 only; always `SendAtSubscribe` on v3).
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, TryFromPrimitive)]
pub enum RetainHandling {
    #[default]
    SendAtSubscribe = 0,
    SendIfNewSubscription = 1,
    DoNotSend = 2,
}

/// Numeric packet identifier used to correlate QoS 1/2 and SUB/UNSUB
/// handshakes. Never zero.
pub type PacketId = u16;

/// v5 property identifiers, named and numbered per MQTT 5 §2.2.2.2.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, TryFromPrimitive, Display)]
pub enum PropertyId {
    #[display(fmt = "payload_format_indicator")]
    PayloadFormatIndicator = 0x01,
    #[display(fmt = "message_expiry_interval")]
    MessageExpiryInterval = 0x02,
    #[display(fmt = "content_type")]
    ContentType = 0x03,
    #[display(fmt = "response_topic")]
    ResponseTopic = 0x08,
    #[display(fmt = "correlation_data")]
    CorrelationData = 0x09,
    #[display(fmt = "subscription_identifier")]
    SubscriptionIdentifier = 0x0B,
    #[display(fmt = "session_expiry_interval")]
    SessionExpiryInterval = 0x11,
    #[display(fmt = "assigned_client_identifier")]
    AssignedClientIdentifier = 0x12,
    #[display(fmt = "server_keep_alive")]
    ServerKeepAlive = 0x13,
    #[display(fmt = "authentication_method")]
    AuthenticationMethod = 0x15,
    #[display(fmt = "authentication_data")]
    AuthenticationData = 0x16,
    #[display(fmt = "request_problem_information")]
    RequestProblemInformation = 0x17,
    #[display(fmt = "will_delay_interval")]
    WillDelayInterval = 0x18,
    #[display(fmt = "request_response_information")]
    RequestResponseInformation = 0x19,
    #[display(fmt = "response_information")]
    ResponseInformation = 0x1A,
    #[display(fmt = "server_reference")]
    ServerReference = 0x1C,
    #[display(fmt = "reason_string")]
    ReasonString = 0x1F,
    #[display(fmt = "receive_maximum")]
    ReceiveMaximum = 0x21,
    #[display(fmt = "topic_alias_maximum")]
    TopicAliasMaximum = 0x22,
    #[display(fmt = "topic_alias")]
    TopicAlias = 0x23,
    #[display(fmt = "maximum_qos")]
    MaximumQoS = 0x24,
    #[display(fmt = "retain_available")]
    RetainAvailable = 0x25,
    #[display(fmt = "user_property")]
    UserProperty = 0x26,
    #[display(fmt = "maximum_packet_size")]
    MaximumPacketSize = 0x27,
    #[display(fmt = "wildcard_subscription_available")]
    WildcardSubscriptionAvailable = 0x28,
    #[display(fmt = "subscription_identifier_available")]
    SubscriptionIdentifierAvailable = 0x29,
    #[display(fmt = "shared_subscription_available")]
    SharedSubscriptionAvailable = 0x2A,
}

impl PropertyId {
    /// The raw wire identifier, also used as the `4000 + n` duplicate error
    /// code offset.
    pub fn code(&self) -> u8 {
        *self as u8
    }

    /// Properties that MQTT 5 §2.2.2.2 explicitly allows to repeat (user
    /// properties and subscription identifiers); every other property must
    /// appear at most once per property block.
    pub fn is_repeatable(&self) -> bool {
        matches!(
            self,
            PropertyId::UserProperty | PropertyId::SubscriptionIdentifier
        )
    }
}

/// A CONNECT last-will message.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LastWill {
    pub topic: String,
    pub payload: Vec<u8>,
    pub qos: QoS,
    pub retain: bool,

    // v5 will properties
    pub delay_interval: Option<u32>,
    pub payload_format_indicator: Option<u8>,
    pub message_expiry_interval: Option<u32>,
    pub content_type: Option<String>,
    pub response_topic: Option<String>,
    pub correlation_data: Option<Vec<u8>>,
    pub user_properties: Vec<(String, String)>,
}

/// CONNECT (§3.1).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConnectHeader {
    pub client_id: String,
    pub clean_session: bool,
    pub keep_alive: u16,
    pub last_will: Option<LastWill>,
    pub username: Option<String>,
    pub password: Option<Vec<u8>>,

    // v5 CONNECT properties
    pub session_expiry_interval: Option<u32>,
    pub receive_maximum: Option<u16>,
    pub maximum_packet_size: Option<u32>,
    pub topic_alias_maximum: Option<u16>,
    pub request_response_information: Option<bool>,
    pub request_problem_information: Option<bool>,
    pub authentication_method: Option<String>,
    pub authentication_data: Option<Vec<u8>>,
    pub user_properties: Vec<(String, String)>,
}

/// CONNACK (§3.2).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConnectAckHeader {
    pub session_present: bool,
    /// Raw return/reason code byte. Use `connect_return_code()` on v3
    /// connections or the `ReasonCode` mapping in `mqtt-packet` on v5 ones.
    pub reason_code: u8,

    // v5 CONNACK properties
    pub session_expiry_interval: Option<u32>,
    pub receive_maximum: Option<u16>,
    pub maximum_qos: Option<QoS>,
    pub retain_available: Option<bool>,
    pub maximum_packet_size: Option<u32>,
    pub assigned_client_id: Option<String>,
    pub topic_alias_maximum: Option<u16>,
    pub reason_string: Option<String>,
    pub user_properties: Vec<(String, String)>,
    pub wildcard_subscription_available: Option<bool>,
    pub subscription_identifier_available: Option<bool>,
    pub shared_subscription_available: Option<bool>,
    pub server_keep_alive: Option<u16>,
    pub response_information: Option<String>,
    pub server_reference: Option<String>,
    pub authentication_method: Option<String>,
    pub authentication_data: Option<Vec<u8>>,
}

impl ConnectAckHeader {
    pub fn connect_return_code(&self) -> Result<ConnectReturnCode, crate::Error> {
        ConnectReturnCode::try_from(self.reason_code).map_err(|_| crate::Error::BadConnectReturnCode)
    }
}

/// PUBLISH (§3.3). The payload itself is streamed separately by
/// `mqtt-client`'s constrained payload reader, not buffered here.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PublishHeader {
    pub topic: String,
    pub dup: bool,
    pub retain: bool,
    pub qos: QoS,
    pub packet_id: Option<PacketId>,
    /// Size in bytes of the payload that follows this header on the wire.
    pub payload_size: usize,

    // v5 PUBLISH properties
    pub payload_format_indicator: Option<u8>,
    /// Seconds, per MQTT 5 §3.3.2.3.3.
    pub message_expiry_interval: Option<u32>,
    pub topic_alias: Option<u16>,
    pub response_topic: Option<String>,
    pub correlation_data: Option<Vec<u8>>,
    pub content_type: Option<String>,
    pub subscription_identifiers: Vec<u32>,
    pub user_properties: Vec<(String, String)>,
}

/// Shared shape of PUBACK/PUBREC/PUBREL/PUBCOMP: a packet identifier, plus
/// (v5 only) a reason code and reason properties.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PubResponseHeader {
    pub packet_id: PacketId,
    pub reason_code: Option<u8>,
    pub reason_string: Option<String>,
    pub user_properties: Vec<(String, String)>,
}

/// One filter in a SUBSCRIBE packet.
#[derive(Debug, Clone, PartialEq)]
pub struct SubscriptionRequest {
    pub topic_filter: String,
    pub qos: QoS,
    pub no_local: bool,
    pub retain_as_published: bool,
    pub retain_handling: RetainHandling,
}

/// SUBSCRIBE (§3.8).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SubscribeHeader {
    pub packet_id: PacketId,
    pub subscriptions: Vec<SubscriptionRequest>,
    pub subscription_identifier: Option<u32>,
    pub user_properties: Vec<(String, String)>,
}

/// SUBACK (§3.9). `reason_codes` holds one raw byte per filter in the
/// matching SUBSCRIBE, in order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SubAckHeader {
    pub packet_id: PacketId,
    pub reason_codes: Vec<u8>,
    pub reason_string: Option<String>,
    pub user_properties: Vec<(String, String)>,
}

/// UNSUBSCRIBE (§3.10).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UnsubscribeHeader {
    pub packet_id: PacketId,
    pub topic_filters: Vec<String>,
    pub user_properties: Vec<(String, String)>,
}

/// UNSUBACK (§3.11). `reason_codes` is empty on v3 (no payload beyond the
/// packet identifier).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UnsubAckHeader {
    pub packet_id: PacketId,
    pub reason_codes: Vec<u8>,
    pub reason_string: Option<String>,
    pub user_properties: Vec<(String, String)>,
}

/// DISCONNECT (§3.14). Absent reason code on v3 (no payload at all).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DisconnectHeader {
    pub reason_code: Option<u8>,
    pub session_expiry_interval: Option<u32>,
    pub reason_string: Option<String>,
    pub server_reference: Option<String>,
    pub user_properties: Vec<(String, String)>,
}

/// AUTH (§3.15, v5 only; the packet type does not exist in v3.1.1).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AuthHeader {
    pub reason_code: u8,
    pub authentication_method: Option<String>,
    pub authentication_data: Option<Vec<u8>>,
    pub reason_string: Option<String>,
    pub user_properties: Vec<(String, String)>,
}

/// Every decoded packet, tagged by type.
#[derive(Debug, Clone, PartialEq)]
pub enum Packet {
    Connect(ConnectHeader),
    ConnectAck(ConnectAckHeader),
    Publish(PublishHeader),
    PublishAck(PubResponseHeader),
    PublishReceived(PubResponseHeader),
    PublishRelease(PubResponseHeader),
    PublishComplete(PubResponseHeader),
    Subscribe(SubscribeHeader),
    SubscribeAck(SubAckHeader),
    Unsubscribe(UnsubscribeHeader),
    UnsubscribeAck(UnsubAckHeader),
    PingReq,
    PingResp,
    Disconnect(DisconnectHeader),
    Auth(AuthHeader),
}

impl Packet {
    pub fn packet_type(&self) -> PacketType {
        match self {
            Packet::Connect(_) => PacketType::Connect,
            Packet::ConnectAck(_) => PacketType::ConnectAck,
            Packet::Publish(_) => PacketType::Publish,
            Packet::PublishAck(_) => PacketType::PublishAck,
            Packet::PublishReceived(_) => PacketType::PublishReceived,
            Packet::PublishRelease(_) => PacketType::PublishRelease,
            Packet::PublishComplete(_) => PacketType::PublishComplete,
            Packet::Subscribe(_) => PacketType::Subscribe,
            Packet::SubscribeAck(_) => PacketType::SubscribeAck,
            Packet::Unsubscribe(_) => PacketType::Unsubscribe,
            Packet::UnsubscribeAck(_) => PacketType::UnsubscribeAck,
            Packet::PingReq => PacketType::PingReq,
            Packet::PingResp => PacketType::PingResp,
            Packet::Disconnect(_) => PacketType::Disconnect,
            Packet::Auth(_) => PacketType::Auth,
        }
    }
}

/// The parsed fixed header (§3.1 of the wire spec, common to every packet).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FixedHeader {
    pub packet_type: PacketType,
    pub flags: u8,
    pub remaining_length: usize,
}
