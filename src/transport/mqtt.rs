// src/transport/mqtt.rs
//! MQTT broker transport built on rumqttc
//!
//! Each session owns one `AsyncClient` plus a background task polling its
//! event loop. Polling is what drives the network, including rumqttc's own
//! reconnect on the next poll after a connection error.

use super::{ConnectOptions, Session, Transport};
use crate::config::constants::mqtt::{
    DISCONNECT_GRACE_MS, EVENT_LOOP_CAPACITY, EVENT_LOOP_ERROR_PAUSE_MS,
};
use crate::error::{SimError, SimResult};
use async_trait::async_trait;
use rumqttc::{AsyncClient, ConnectReturnCode, Event, EventLoop, MqttOptions, Outgoing, Packet, QoS};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{sleep, timeout};
use tracing::{debug, info, warn};

/// Transport opening one rumqttc client per session
#[derive(Debug, Clone)]
pub struct MqttTransport {
    verbose: bool,
    capacity: usize,
}

impl Default for MqttTransport {
    fn default() -> Self {
        Self::new(false)
    }
}

impl MqttTransport {
    /// `verbose` logs connection events at info level
    pub fn new(verbose: bool) -> Self {
        Self {
            verbose,
            capacity: EVENT_LOOP_CAPACITY,
        }
    }

    fn mqtt_options(options: &ConnectOptions) -> MqttOptions {
        let mut mqtt_options =
            MqttOptions::new(options.client_id.clone(), options.host.clone(), options.port);
        mqtt_options.set_keep_alive(options.keep_alive);
        mqtt_options.set_clean_session(true);
        if let Some(credentials) = &options.credentials {
            mqtt_options.set_credentials(
                credentials.username.clone(),
                credentials.password.clone(),
            );
        }
        mqtt_options
    }
}

#[async_trait]
impl Transport for MqttTransport {
    async fn connect(&self, options: &ConnectOptions) -> SimResult<Box<dyn Session>> {
        let (client, mut event_loop) =
            AsyncClient::new(Self::mqtt_options(options), self.capacity);

        match timeout(options.connect_timeout, wait_for_connack(&mut event_loop)).await {
            Ok(Ok(())) => {}
            Ok(Err(reason)) => return Err(SimError::connect(&options.client_id, reason)),
            Err(_) => {
                return Err(SimError::connect(
                    &options.client_id,
                    format!("no CONNACK within {:?}", options.connect_timeout),
                ))
            }
        }

        if self.verbose {
            info!(
                client_id = %options.client_id,
                broker = %format!("{}:{}", options.host, options.port),
                "Connected to MQTT broker"
            );
        }

        let poller = tokio::spawn(drive_event_loop(
            event_loop,
            options.client_id.clone(),
            self.verbose,
        ));

        Ok(Box::new(MqttSession {
            client,
            client_id: options.client_id.clone(),
            poller: Some(poller),
        }))
    }
}

async fn wait_for_connack(event_loop: &mut EventLoop) -> Result<(), String> {
    loop {
        match event_loop.poll().await {
            Ok(Event::Incoming(Packet::ConnAck(ack))) => {
                return if ack.code == ConnectReturnCode::Success {
                    Ok(())
                } else {
                    Err(format!("broker refused connection: {:?}", ack.code))
                };
            }
            Ok(_) => continue,
            Err(e) => return Err(e.to_string()),
        }
    }
}

/// Keep the connection alive until DISCONNECT goes out
async fn drive_event_loop(mut event_loop: EventLoop, client_id: String, verbose: bool) {
    loop {
        match event_loop.poll().await {
            Ok(Event::Incoming(Packet::ConnAck(_))) => {
                if verbose {
                    info!(client_id = %client_id, "Reconnected to MQTT broker");
                }
            }
            Ok(Event::Outgoing(Outgoing::Disconnect)) => {
                debug!(client_id = %client_id, "Disconnect sent, stopping event loop");
                break;
            }
            Ok(_) => {}
            Err(e) => {
                warn!(client_id = %client_id, error = %e, "MQTT event loop error");
                sleep(Duration::from_millis(EVENT_LOOP_ERROR_PAUSE_MS)).await;
            }
        }
    }
}

struct MqttSession {
    client: AsyncClient,
    client_id: String,
    poller: Option<JoinHandle<()>>,
}

#[async_trait]
impl Session for MqttSession {
    fn client_id(&self) -> &str {
        &self.client_id
    }

    /// Queue one QoS 0 message without waiting for room
    ///
    /// While the broker is unreachable nothing drains the request channel, so
    /// a full queue fails the publish instead of parking the device.
    async fn publish(&mut self, topic: &str, payload: Vec<u8>) -> SimResult<()> {
        self.client
            .try_publish(topic, QoS::AtMostOnce, false, payload)
            .map_err(|e| SimError::publish(topic, e))
    }

    async fn disconnect(&mut self) -> SimResult<()> {
        let Some(poller) = self.poller.take() else {
            return Ok(());
        };

        let result = self
            .client
            .try_disconnect()
            .map_err(|e| SimError::connect(&self.client_id, e));

        // Give the event loop a moment to flush DISCONNECT, then stop it
        let abort = poller.abort_handle();
        if result.is_err() {
            abort.abort();
        } else if timeout(Duration::from_millis(DISCONNECT_GRACE_MS), poller)
            .await
            .is_err()
        {
            abort.abort();
        }

        if result.is_ok() {
            debug!(client_id = %self.client_id, "MQTT session closed");
        }
        result
    }
}

impl Drop for MqttSession {
    fn drop(&mut self) {
        if let Some(poller) = self.poller.take() {
            poller.abort();
        }
    }
}
