//! [`MqttClient`] over `rumqttc`'s blocking client.
//!
//! The connection's event loop runs on its own thread and forwards
//! incoming publishes through a channel, so [`MqttClient::try_recv`] never
//! blocks.
//!
//! # Example
//!
//! ```ignore
//! use rs_sinric::config::MqttConfig;
//! use rs_sinric::services::{MqttTransport, RumqttClient};
//!
//! let config = MqttConfig::default().with_host("192.168.1.100");
//! let client = RumqttClient::connect(&config)?;
//! let mut transport = MqttTransport::new(client, &config);
//! transport.subscribe()?;
//! ```

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{channel, Receiver, Sender, TryRecvError};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use rumqttc::{Client, ClientError, Connection, Event, MqttOptions, Packet, QoS};

use crate::config::MqttConfig;
use crate::traits::{MqttClient, MqttMessage};

/// Outgoing request queue depth.
const REQUEST_CAPACITY: usize = 10;

/// Pause before the event loop retries after a connection error.
const RECONNECT_DELAY: Duration = Duration::from_secs(1);

/// Blocking MQTT client.
pub struct RumqttClient {
    client: Client,
    messages: Receiver<MqttMessage>,
    connected: Arc<AtomicBool>,
}

impl RumqttClient {
    /// Connect to the configured broker and start the event loop thread.
    ///
    /// The connection completes in the background; check
    /// [`is_connected`](MqttClient::is_connected).
    pub fn connect(config: &MqttConfig) -> Result<Self, std::io::Error> {
        let mut options = MqttOptions::new(
            config.client_id.as_str(),
            config.host.as_str(),
            config.port,
        );
        options.set_keep_alive(Duration::from_secs(u64::from(config.keep_alive_secs)));
        if config.has_auth() {
            options.set_credentials(config.username.as_str(), config.password.as_str());
        }

        let (client, connection) = Client::new(options, REQUEST_CAPACITY);
        let (tx, messages) = channel();
        let connected = Arc::new(AtomicBool::new(false));

        let flag = Arc::clone(&connected);
        thread::Builder::new()
            .name("mqtt-event-loop".into())
            .spawn(move || run_event_loop(connection, tx, flag))?;

        tracing::info!(host = %config.host, port = config.port, "mqtt client started");
        Ok(Self {
            client,
            messages,
            connected,
        })
    }
}

fn run_event_loop(mut connection: Connection, tx: Sender<MqttMessage>, connected: Arc<AtomicBool>) {
    for notification in connection.iter() {
        match notification {
            Ok(Event::Incoming(Packet::ConnAck(_))) => {
                connected.store(true, Ordering::Relaxed);
                tracing::info!("mqtt connected");
            }
            Ok(Event::Incoming(Packet::Publish(publish))) => {
                let msg = MqttMessage::new(publish.topic, publish.payload.to_vec());
                if tx.send(msg).is_err() {
                    // Client dropped
                    return;
                }
            }
            Ok(_) => {}
            Err(err) => {
                if connected.swap(false, Ordering::Relaxed) {
                    tracing::warn!(error = %err, "mqtt connection lost");
                } else {
                    tracing::debug!(error = %err, "mqtt connect attempt failed");
                }
                thread::sleep(RECONNECT_DELAY);
            }
        }
    }
}

impl MqttClient for RumqttClient {
    type Error = ClientError;

    fn publish(&mut self, topic: &str, payload: &[u8], retain: bool) -> Result<(), ClientError> {
        self.client
            .publish(topic, QoS::AtLeastOnce, retain, payload.to_vec())
    }

    fn subscribe(&mut self, topic: &str) -> Result<(), ClientError> {
        self.client.subscribe(topic, QoS::AtLeastOnce)
    }

    fn try_recv(&mut self) -> Option<MqttMessage> {
        match self.messages.try_recv() {
            Ok(msg) => Some(msg),
            Err(TryRecvError::Empty) => None,
            Err(TryRecvError::Disconnected) => {
                self.connected.store(false, Ordering::Relaxed);
                None
            }
        }
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Relaxed)
    }
}
