// src/transport/mod.rs
//! Broker transport abstraction
//!
//! The publisher only needs to open a session and push `(topic, payload)`
//! pairs through it. [`MemoryTransport`] records everything in-process;
//! `MqttTransport` (feature `mqtt`) talks to a real broker.

pub mod memory;
#[cfg(feature = "mqtt")]
pub mod mqtt;

pub use memory::{MemoryTransport, PublishedMessage};
#[cfg(feature = "mqtt")]
pub use mqtt::MqttTransport;

use crate::config::constants::mqtt::CONNECT_TIMEOUT_MS;
use crate::config::MqttSettings;
use crate::error::SimResult;
use async_trait::async_trait;
use std::time::Duration;

/// Username/password pair sent on connect
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"***")
            .finish()
    }
}

/// Everything needed to open one device's session
#[derive(Debug, Clone, PartialEq)]
pub struct ConnectOptions {
    pub host: String,
    pub port: u16,
    pub client_id: String,
    pub credentials: Option<Credentials>,
    pub keep_alive: Duration,
    pub connect_timeout: Duration,
}

impl ConnectOptions {
    /// Options for one client id against the shared broker settings
    pub fn from_settings(settings: &MqttSettings, client_id: impl Into<String>) -> Self {
        let credentials = settings.has_credentials().then(|| Credentials {
            username: settings.username.clone(),
            password: settings.password.clone(),
        });

        Self {
            host: settings.uri.clone(),
            port: settings.port,
            client_id: client_id.into(),
            credentials,
            keep_alive: Duration::from_secs(settings.keep_alive_secs),
            connect_timeout: Duration::from_millis(CONNECT_TIMEOUT_MS),
        }
    }
}

/// Opens broker sessions
#[async_trait]
pub trait Transport: Send + Sync {
    async fn connect(&self, options: &ConnectOptions) -> SimResult<Box<dyn Session>>;
}

/// One open logical connection, owned by a single device
#[async_trait]
pub trait Session: Send {
    /// Client identity this session was opened with
    fn client_id(&self) -> &str;

    async fn publish(&mut self, topic: &str, payload: Vec<u8>) -> SimResult<()>;

    async fn disconnect(&mut self) -> SimResult<()>;
}
