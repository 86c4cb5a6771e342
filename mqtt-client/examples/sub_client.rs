//! An MQTT 3.1.1 / MQTT 5 client for subscribing to topics and printing
//! whatever arrives on them, built directly on `mqtt_client::ClientSession`.

use std::net::TcpStream;
use std::process;
use std::time::{Duration, Instant};

use anyhow::{anyhow, Result};
use log::debug;
use structopt::StructOpt;

use mqtt_client::{ClientSession, ConnectOptions, Event, ProtocolVersion};
use mqtt_core::QoS;

#[derive(StructOpt, Debug)]
#[structopt(
    name = "sub_client",
    about = "an MQTT version 5/3.1.1 client for subscribing to topics"
)]
struct Opt {
    /// Specify the host to connect to.
    #[structopt(short, long, default_value = "localhost")]
    host: String,

    /// Connect to the port specified.
    #[structopt(short, long, default_value = "1883")]
    port: u16,

    /// Specify which version of the MQTT protocol should be used when connecting to the remote broker.
    #[structopt(short = "V", long, default_value = "311", parse(try_from_str = parse_protocol_version))]
    protocol_version: ProtocolVersion,

    /// The id to use for this client.
    #[structopt(short, long)]
    id: Option<String>,

    /// Provide a prefix that the client id will be built from by appending the process id of the client.
    #[structopt(short = "I", long, default_value = "sub_client")]
    id_prefix: String,

    /// The number of seconds between sending PING commands to the broker
    /// for the purposes of informing it we are still connected and functioning.
    #[structopt(short, long, default_value = "60")]
    keep_alive: u16,

    /// Provide a username to be used for authenticating with the broker.
    #[structopt(short, long)]
    username: Option<String>,

    /// Provide a password to be used for authenticating with the broker.
    #[structopt(short = "P", long)]
    password: Option<String>,

    /// Disconnect and exit the program immediately after the given count of messages have been received.
    #[structopt(short = "C")]
    count: Option<usize>,

    /// The MQTT topic to subscribe to.
    #[structopt(short, long)]
    topic: Vec<String>,

    /// Specify the quality of service desired for the incoming messages.
    #[structopt(short, long, default_value = "at-most-once", parse(try_from_str = parse_qos))]
    qos: QoS,
}

fn parse_protocol_version(s: &str) -> Result<ProtocolVersion> {
    match s {
        "v3" | "311" | "3.11" => Ok(ProtocolVersion::V3),
        "v5" | "5" | "5.0" => Ok(ProtocolVersion::V5),
        _ => Err(anyhow!("invalid protocol version: {}", s)),
    }
}

fn parse_qos(s: &str) -> Result<QoS> {
    match s {
        "0" | "at-most-once" => Ok(QoS::AtMostOnce),
        "1" | "at-least-once" => Ok(QoS::AtLeastOnce),
        "2" | "exactly-once" => Ok(QoS::ExactlyOnce),
        _ => Err(anyhow!("invalid QoS: {}", s)),
    }
}

impl Opt {
    fn client_id(&self) -> String {
        match self.id {
            Some(ref id) => id.clone(),
            None => format!("{}{}", self.id_prefix, process::id()),
        }
    }
}

fn main() -> Result<()> {
    pretty_env_logger::init();

    let opt = Opt::from_args();
    debug!("{:#?}", opt);

    let stream = TcpStream::connect((opt.host.as_str(), opt.port))?;
    let mut session = ClientSession::new(opt.protocol_version, stream)?;

    session.connect(
        &opt.client_id(),
        true,
        Duration::from_secs(u64::from(opt.keep_alive)),
        ConnectOptions {
            username: opt.username.clone(),
            password: opt.password.clone().map(String::into_bytes),
            ..Default::default()
        },
    )?;

    let filters: Vec<_> = opt.topic.iter().cloned().map(|t| (t, opt.qos)).collect();
    if !filters.is_empty() {
        session.subscribe(&filters, 1)?;
    }

    let mut received = 0usize;
    let mut last_ping_check = Instant::now();

    loop {
        if last_ping_check.elapsed() >= Duration::from_secs(1) {
            session.update_state()?;
            last_ping_check = Instant::now();
        }

        session.process_one(1, &mut |writer, event| {
            match event {
                Event::SubscribeAck(ack) => {
                    debug!("subscribed: {:?}", ack.reason_codes);
                }
                Event::Publish { header, payload } => {
                    let mut buf = vec![0u8; payload.remaining()];
                    payload.read(&mut buf).ok();
                    println!("{}: {}", header.topic, String::from_utf8_lossy(&buf));
                    if let Some(packet_id) = header.packet_id {
                        if header.qos == QoS::AtLeastOnce {
                            writer.publish_ack(packet_id)?;
                        } else if header.qos == QoS::ExactlyOnce {
                            writer.publish_received(packet_id)?;
                        }
                    }
                    received += 1;
                }
                _ => {}
            }
            Ok(())
        })?;

        if let Some(count) = opt.count {
            if received >= count {
                break;
            }
        }
    }

    session.disconnect()?;

    Ok(())
}
