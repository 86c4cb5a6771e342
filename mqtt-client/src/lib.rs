//! Client-side MQTT connection state engine: a single logical session that
//! speaks both MQTT 3.1.1 and MQTT 5 over any transport implementing
//! [`Context`], with a polled keep-alive clock and a constrained PUBLISH
//! payload stream. See `mqtt-core` and `mqtt-packet` for the wire codecs
//! this crate drives.

pub extern crate mqtt_core as mqtt;
pub extern crate mqtt_packet as packet;

mod context;
mod error;
mod keepalive;
mod payload;
mod redirect;
mod session;

pub use context::Context;
pub use error::SessionError;
pub use keepalive::{Clock, SystemClock};
pub use payload::PayloadReader;
pub use redirect::{connect_ack_redirect, disconnect_redirect};
pub use session::{ClientSession, ConnectOptions, Event, ProtocolVersion, Writer};
