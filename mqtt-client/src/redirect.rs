//! Server-redirect following (spec §4's supplemented-features note): an
//! opt-in helper, not something `ClientSession` applies on its own.
//!
//! `mqtt-sync-client::connect::Connector::connect` used to reconnect
//! automatically on a CONNACK `ServiceUnavailable`/v5 `ServerUnavailable` or a
//! DISCONNECT `UseAnotherServer`/`ServerMoved` carrying a server reference.
//! `ClientSession` has no notion of "reconnect" (it doesn't own the act of
//! dialing a new transport), so that behavior is exposed here as two pure
//! inspection functions the caller's handler can call from the `ConnectAck`
//! and the generic disconnect-reason-code path, and use to drive its own
//! retry against the referenced host.

use mqtt_core::{ConnectAckHeader, ConnectReturnCode};
use mqtt_packet::ReasonCode;

/// If this CONNACK is a v3 `ServerUnavailable` or v5 `ServerUnavailable`
/// carrying a `server_reference`, returns that reference. `None` means
/// either the CONNACK wasn't a redirect or it didn't name a target.
pub fn connect_ack_redirect(header: &ConnectAckHeader) -> Option<&str> {
    let is_redirect = match header.connect_return_code() {
        Ok(ConnectReturnCode::ServerUnavailable) => true,
        Err(_) => matches!(
            ReasonCode::try_from(header.reason_code),
            Ok(ReasonCode::ServerUnavailable)
        ),
        _ => false,
    };
    is_redirect
        .then(|| header.server_reference.as_deref())
        .flatten()
}

/// If this DISCONNECT's v5 reason code is `UseAnotherServer`/`ServerMoved`
/// and it carries a `server_reference`, returns that reference.
pub fn disconnect_redirect(
    reason_code: Option<u8>,
    server_reference: Option<&str>,
) -> Option<&str> {
    let redirects = matches!(
        reason_code.and_then(|code| ReasonCode::try_from(code).ok()),
        Some(ReasonCode::UseAnotherServer) | Some(ReasonCode::ServerMoved)
    );
    redirects.then_some(server_reference).flatten()
}

#[cfg(test)]
mod tests {
    use super::{connect_ack_redirect, disconnect_redirect};
    use mqtt_core::ConnectAckHeader;

    #[test]
    fn v3_service_unavailable_with_reference() {
        let header = ConnectAckHeader {
            reason_code: 3, // ConnectReturnCode::ServerUnavailable
            server_reference: Some("broker2.example.com".to_owned()),
            ..Default::default()
        };
        assert_eq!(
            connect_ack_redirect(&header),
            Some("broker2.example.com")
        );
    }

    #[test]
    fn accepted_connack_is_not_a_redirect() {
        let header = ConnectAckHeader {
            reason_code: 0,
            server_reference: Some("broker2.example.com".to_owned()),
            ..Default::default()
        };
        assert_eq!(connect_ack_redirect(&header), None);
    }

    #[test]
    fn disconnect_use_another_server() {
        assert_eq!(
            disconnect_redirect(Some(0x9C), Some("broker2.example.com")),
            Some("broker2.example.com")
        );
    }

    #[test]
    fn disconnect_without_reference_is_not_followed() {
        assert_eq!(disconnect_redirect(Some(0x9C), None), None);
    }

    #[test]
    fn normal_disconnect_is_not_a_redirect() {
        assert_eq!(disconnect_redirect(Some(0x00), Some("x")), None);
    }
}
