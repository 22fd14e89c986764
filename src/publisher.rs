// src/publisher.rs
//! Per-device publish loop
//!
//! A [`DevicePublisher`] owns everything one simulated device needs: its
//! generators, its broker identity and its own session. The scheduler runs
//! one publisher per device on its own task.
//!
//! Lifecycle: `Disconnected -> Connecting -> Connected -> Stopped`, or
//! `Connecting -> Failed` when every connect attempt is refused.

use crate::config::constants::mqtt::{RETRY_BASE_DELAY_MS, RETRY_MAX_DELAY_MS};
use crate::config::constants::publish::{CANCEL_GRACE_MS, SESSION_CLOSE_TIMEOUT_MS};
use crate::config::{validate_device_model, DeviceModel, MqttSettings};
use crate::error::{SimError, SimResult};
use crate::simulation::GeneratorRegistry;
use crate::transport::{ConnectOptions, Session, Transport};
use crate::utils::random::{generate_client_id, SharedRng};
use crate::utils::time::{SystemTimeProvider, TimeProvider};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{sleep, timeout};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Payload of one published message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensorReading {
    pub device: String,
    pub param: String,
    pub value: f64,
    /// Seconds since the Unix epoch
    pub ts: f64,
}

impl SensorReading {
    pub fn to_json(&self) -> SimResult<String> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn to_payload(&self) -> SimResult<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    pub fn from_payload(payload: &[u8]) -> SimResult<Self> {
        Ok(serde_json::from_slice(payload)?)
    }
}

/// `{prefix}/device/{device_id}/{param}`
pub fn topic_for(prefix: &str, device_id: &str, param: &str) -> String {
    format!("{}/device/{}/{}", prefix, device_id, param)
}

/// Where a publisher is in its lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PublisherState {
    Disconnected,
    Connecting,
    Connected,
    Stopped,
    Failed,
}

/// Counters reported when a publisher stops
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PublisherStats {
    pub ticks: u64,
    pub published: u64,
    pub failed: u64,
    pub connect_attempts: u32,
}

/// Connect retry schedule: exponential backoff with a ceiling
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total connect attempts, including the first
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: crate::config::constants::mqtt::DEFAULT_CONNECT_RETRIES,
            base_delay: Duration::from_millis(RETRY_BASE_DELAY_MS),
            max_delay: Duration::from_millis(RETRY_MAX_DELAY_MS),
        }
    }
}

impl RetryPolicy {
    pub fn from_settings(settings: &MqttSettings) -> Self {
        Self {
            max_attempts: settings.connect_retries,
            ..Self::default()
        }
    }

    /// Single attempt, no waiting
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            ..Self::default()
        }
    }

    /// Wait before retry number `retry` (0-based)
    pub fn delay_for(&self, retry: u32) -> Duration {
        let factor = 1u32.checked_shl(retry).unwrap_or(u32::MAX);
        self.base_delay.saturating_mul(factor).min(self.max_delay)
    }

    fn attempts(&self) -> u32 {
        self.max_attempts.max(1)
    }
}

/// Samples one device's generators and publishes every value on a fixed delay
pub struct DevicePublisher {
    device_id: String,
    registry: GeneratorRegistry,
    transport: Arc<dyn Transport>,
    options: ConnectOptions,
    topic_prefix: String,
    interval: Duration,
    clock: Arc<dyn TimeProvider>,
    verbose: bool,
    retry: RetryPolicy,
    state: PublisherState,
    stats: PublisherStats,
}

impl std::fmt::Debug for DevicePublisher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DevicePublisher")
            .field("device_id", &self.device_id)
            .field("client_id", &self.options.client_id)
            .field("parameters", &self.registry.len())
            .field("interval", &self.interval)
            .field("state", &self.state)
            .finish()
    }
}

impl DevicePublisher {
    /// Build the generators and derive the client identity
    ///
    /// Fails on an unsupported waveform before anything is connected. An empty
    /// `settings.client_id` derives `{device_id}_{8 alphanumerics}`.
    pub fn new(
        model: &DeviceModel,
        settings: &MqttSettings,
        interval: Duration,
        transport: Arc<dyn Transport>,
        rng: &SharedRng,
    ) -> SimResult<Self> {
        if interval.is_zero() {
            return Err(SimError::config("publish_interval", "must be positive"));
        }
        validate_device_model(model)?;

        let registry = GeneratorRegistry::from_model(model, rng)?;
        let client_id = if settings.client_id.is_empty() {
            generate_client_id(&model.id, rng)
        } else {
            settings.client_id.clone()
        };

        Ok(Self {
            device_id: model.id.clone(),
            registry,
            transport,
            options: ConnectOptions::from_settings(settings, client_id),
            topic_prefix: settings.topic_prefix.clone(),
            interval,
            clock: Arc::new(SystemTimeProvider),
            verbose: false,
            retry: RetryPolicy::from_settings(settings),
            state: PublisherState::Disconnected,
            stats: PublisherStats::default(),
        })
    }

    pub fn with_clock(mut self, clock: Arc<dyn TimeProvider>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn device_id(&self) -> &str {
        &self.device_id
    }

    pub fn client_id(&self) -> &str {
        &self.options.client_id
    }

    pub fn state(&self) -> PublisherState {
        self.state
    }

    pub fn stats(&self) -> PublisherStats {
        self.stats
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn registry(&self) -> &GeneratorRegistry {
        &self.registry
    }

    /// Publish until `cancel` fires
    pub async fn run(&mut self, cancel: &CancellationToken) -> SimResult<PublisherStats> {
        self.drive(None, cancel).await
    }

    /// Publish exactly `ticks` times (fewer if cancelled), without a trailing wait
    pub async fn run_ticks(
        &mut self,
        ticks: u64,
        cancel: &CancellationToken,
    ) -> SimResult<PublisherStats> {
        self.drive(Some(ticks), cancel).await
    }

    async fn drive(
        &mut self,
        max_ticks: Option<u64>,
        cancel: &CancellationToken,
    ) -> SimResult<PublisherStats> {
        self.stats = PublisherStats::default();

        let mut session = match self.connect(cancel).await {
            Ok(session) => session,
            Err(e) => {
                self.state = match e {
                    SimError::Cancelled => PublisherState::Stopped,
                    _ => PublisherState::Failed,
                };
                return Err(e);
            }
        };
        self.state = PublisherState::Connected;

        self.tick_loop(session.as_mut(), max_ticks, cancel).await;

        // A session that cannot close in time is dropped, which releases it
        match timeout(Duration::from_millis(SESSION_CLOSE_TIMEOUT_MS), session.disconnect()).await {
            Ok(Ok(())) => {
                if self.verbose {
                    info!(device = %self.device_id, client_id = %self.options.client_id, "Disconnected");
                }
            }
            Ok(Err(e)) => warn!(device = %self.device_id, error = %e, "Disconnect failed"),
            Err(_) => warn!(device = %self.device_id, "Disconnect timed out, dropping session"),
        }
        drop(session);
        self.state = PublisherState::Stopped;

        debug!(
            device = %self.device_id,
            ticks = self.stats.ticks,
            published = self.stats.published,
            failed = self.stats.failed,
            "Publisher stopped"
        );
        Ok(self.stats)
    }

    async fn connect(&mut self, cancel: &CancellationToken) -> SimResult<Box<dyn Session>> {
        self.state = PublisherState::Connecting;
        if cancel.is_cancelled() {
            return Err(SimError::Cancelled);
        }

        let attempts = self.retry.attempts();
        let mut last_error = None;

        for attempt in 0..attempts {
            if attempt > 0 {
                let delay = self.retry.delay_for(attempt - 1);
                debug!(device = %self.device_id, attempt = attempt + 1, ?delay, "Retrying connect");
                tokio::select! {
                    _ = sleep(delay) => {}
                    _ = cancel.cancelled() => return Err(SimError::Cancelled),
                }
            }

            self.stats.connect_attempts += 1;
            let result = tokio::select! {
                result = self.transport.connect(&self.options) => result,
                _ = cancel.cancelled() => return Err(SimError::Cancelled),
            };

            match result {
                Ok(session) => {
                    if self.verbose {
                        info!(
                            device = %self.device_id,
                            client_id = %session.client_id(),
                            "Connected"
                        );
                    }
                    return Ok(session);
                }
                Err(e) => {
                    warn!(
                        device = %self.device_id,
                        attempt = attempt + 1,
                        of = attempts,
                        error = %e,
                        "Connect attempt failed"
                    );
                    last_error = Some(e);
                }
            }
        }

        Err(last_error.unwrap_or_else(|| {
            SimError::connect(&self.options.client_id, "no connect attempt was made")
        }))
    }

    async fn tick_loop(
        &mut self,
        session: &mut dyn Session,
        max_ticks: Option<u64>,
        cancel: &CancellationToken,
    ) {
        loop {
            if cancel.is_cancelled() || max_ticks.is_some_and(|n| self.stats.ticks >= n) {
                break;
            }

            self.tick(session, cancel).await;

            if max_ticks.is_some_and(|n| self.stats.ticks >= n) {
                break;
            }

            // Fixed delay: the wait starts once this tick's publishes are done
            tokio::select! {
                _ = sleep(self.interval) => {}
                _ = cancel.cancelled() => break,
            }
        }
    }

    async fn tick(&mut self, session: &mut dyn Session, cancel: &CancellationToken) {
        self.stats.ticks += 1;
        let grace = self.interval.min(Duration::from_millis(CANCEL_GRACE_MS));

        for (param, value) in self.registry.sample_all() {
            let topic = topic_for(&self.topic_prefix, &self.device_id, &param);
            let reading = SensorReading {
                device: self.device_id.clone(),
                param,
                value,
                ts: self.clock.now_secs(),
            };

            let text = match reading.to_json() {
                Ok(text) => text,
                Err(e) => {
                    self.stats.failed += 1;
                    warn!(device = %self.device_id, topic = %topic, error = %e, "Encoding failed");
                    continue;
                }
            };

            // An in-flight publish gets a short grace after cancel, then is abandoned
            let outcome = tokio::select! {
                result = session.publish(&topic, text.as_bytes().to_vec()) => Some(result),
                _ = cancelled_after(cancel, grace) => None,
            };

            match outcome {
                Some(Ok(())) => {
                    self.stats.published += 1;
                    if self.verbose {
                        info!("[{}] Published to {}: {}", self.device_id, topic, text);
                    } else {
                        debug!("[{}] Published to {}: {}", self.device_id, topic, text);
                    }
                }
                Some(Err(e)) => {
                    self.stats.failed += 1;
                    warn!(device = %self.device_id, error = %e, "Publish failed");
                }
                None => {
                    self.stats.failed += 1;
                    warn!(device = %self.device_id, topic = %topic, "Publish abandoned after cancel");
                    return;
                }
            }
        }
    }
}

async fn cancelled_after(cancel: &CancellationToken, grace: Duration) {
    cancel.cancelled().await;
    sleep(grace).await;
}
