// src/scheduler.rs
//! Concurrent supervision of every device publisher
//!
//! All generators are built up front, so a bad waveform is reported before
//! any device connects. Each publisher then runs on its own task; a device
//! that fails to connect, keeps failing to publish or panics never affects
//! the others.

use crate::config::SimulatorConfig;
use crate::error::{SimError, SimResult};
use crate::publisher::{DevicePublisher, PublisherStats, RetryPolicy};
use crate::transport::Transport;
use crate::utils::random::SharedRng;
use crate::utils::time::TimeProvider;
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// How one device's run ended
#[derive(Debug)]
pub struct DeviceOutcome {
    pub device_id: String,
    pub result: SimResult<PublisherStats>,
}

impl DeviceOutcome {
    pub fn is_ok(&self) -> bool {
        self.result.is_ok()
    }

    /// Ended with an error other than cancellation
    pub fn is_failure(&self) -> bool {
        matches!(&self.result, Err(e) if !matches!(e, SimError::Cancelled))
    }

    pub fn stats(&self) -> Option<&PublisherStats> {
        self.result.as_ref().ok()
    }
}

/// Per-device results of one run, ordered by device id
#[derive(Debug, Default)]
pub struct SimulationReport {
    outcomes: Vec<DeviceOutcome>,
}

impl SimulationReport {
    fn new(mut outcomes: Vec<DeviceOutcome>) -> Self {
        outcomes.sort_by(|a, b| a.device_id.cmp(&b.device_id));
        Self { outcomes }
    }

    pub fn outcomes(&self) -> &[DeviceOutcome] {
        &self.outcomes
    }

    pub fn outcome(&self, device_id: &str) -> Option<&DeviceOutcome> {
        self.outcomes.iter().find(|o| o.device_id == device_id)
    }

    /// Successful publishes across all devices
    pub fn published(&self) -> u64 {
        self.outcomes
            .iter()
            .filter_map(DeviceOutcome::stats)
            .map(|s| s.published)
            .sum()
    }

    pub fn failed_publishes(&self) -> u64 {
        self.outcomes
            .iter()
            .filter_map(DeviceOutcome::stats)
            .map(|s| s.failed)
            .sum()
    }

    pub fn failed_devices(&self) -> Vec<&str> {
        self.outcomes
            .iter()
            .filter(|o| o.is_failure())
            .map(|o| o.device_id.as_str())
            .collect()
    }

    /// True when there were devices and none of them ran
    pub fn all_failed(&self) -> bool {
        !self.outcomes.is_empty() && self.outcomes.iter().all(DeviceOutcome::is_failure)
    }
}

/// Runs one [`DevicePublisher`] per configured device at a shared interval
pub struct SimulationScheduler {
    publishers: Vec<DevicePublisher>,
    rejected: Vec<DeviceOutcome>,
    interval: Duration,
}

impl SimulationScheduler {
    /// Build every device, excluding (and logging) those with a bad waveform
    pub fn new(
        config: &SimulatorConfig,
        transport: Arc<dyn Transport>,
        rng: SharedRng,
    ) -> SimResult<Self> {
        Self::build(config, transport, &rng, false)
    }

    /// Build every device, failing on the first bad waveform
    pub fn strict(
        config: &SimulatorConfig,
        transport: Arc<dyn Transport>,
        rng: SharedRng,
    ) -> SimResult<Self> {
        Self::build(config, transport, &rng, true)
    }

    fn build(
        config: &SimulatorConfig,
        transport: Arc<dyn Transport>,
        rng: &SharedRng,
        strict: bool,
    ) -> SimResult<Self> {
        config.validate()?;
        let interval = config.interval();

        if let Some(client_id) = config.shared_client_id() {
            warn!(
                client_id = %client_id,
                devices = config.devices.len(),
                "Every device connects with the same client id; the broker may drop all but one"
            );
        }

        let mut publishers = Vec::with_capacity(config.devices.len());
        let mut rejected = Vec::new();

        for model in config.device_models() {
            match DevicePublisher::new(&model, &config.mqtt, interval, Arc::clone(&transport), rng) {
                Ok(publisher) => publishers.push(publisher.with_verbose(config.verbose)),
                Err(e) if strict => return Err(e),
                Err(e) => {
                    error!(device = %model.id, error = %e, "Device excluded from simulation");
                    rejected.push(DeviceOutcome {
                        device_id: model.id,
                        result: Err(e),
                    });
                }
            }
        }

        debug!(
            devices = publishers.len(),
            rejected = rejected.len(),
            ?interval,
            "Scheduler ready"
        );

        Ok(Self {
            publishers,
            rejected,
            interval,
        })
    }

    pub fn with_clock(mut self, clock: Arc<dyn TimeProvider>) -> Self {
        self.publishers = self
            .publishers
            .into_iter()
            .map(|p| p.with_clock(Arc::clone(&clock)))
            .collect();
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.publishers = self
            .publishers
            .into_iter()
            .map(|p| p.with_retry(retry))
            .collect();
        self
    }

    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.publishers = self
            .publishers
            .into_iter()
            .map(|p| p.with_verbose(verbose))
            .collect();
        self
    }

    /// Devices that will run, in id order
    pub fn device_ids(&self) -> Vec<&str> {
        self.publishers.iter().map(|p| p.device_id()).collect()
    }

    /// Devices excluded at construction
    pub fn rejected_ids(&self) -> Vec<&str> {
        self.rejected.iter().map(|o| o.device_id.as_str()).collect()
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Run every device until `cancel` fires
    pub async fn run(self, cancel: CancellationToken) -> SimulationReport {
        self.launch(None, cancel).await
    }

    /// Run every device for exactly `ticks` ticks
    pub async fn run_ticks(self, ticks: u64, cancel: CancellationToken) -> SimulationReport {
        self.launch(Some(ticks), cancel).await
    }

    async fn launch(self, max_ticks: Option<u64>, cancel: CancellationToken) -> SimulationReport {
        info!(
            devices = self.publishers.len(),
            interval = ?self.interval,
            "Starting simulation"
        );

        let mut tasks = JoinSet::new();
        let mut pending = BTreeSet::new();

        for mut publisher in self.publishers {
            let cancel = cancel.clone();
            pending.insert(publisher.device_id().to_string());

            tasks.spawn(async move {
                let result = match max_ticks {
                    Some(n) => publisher.run_ticks(n, &cancel).await,
                    None => publisher.run(&cancel).await,
                };
                DeviceOutcome {
                    device_id: publisher.device_id().to_string(),
                    result,
                }
            });
        }

        let mut outcomes = self.rejected;
        let mut abnormal_reason = None;

        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(outcome) => {
                    pending.remove(&outcome.device_id);
                    match &outcome.result {
                        Ok(stats) => debug!(
                            device = %outcome.device_id,
                            published = stats.published,
                            failed = stats.failed,
                            "Device finished"
                        ),
                        Err(SimError::Cancelled) => {
                            debug!(device = %outcome.device_id, "Device cancelled while connecting")
                        }
                        Err(e) => error!(device = %outcome.device_id, error = %e, "Device failed"),
                    }
                    outcomes.push(outcome);
                }
                Err(e) => {
                    error!(error = %e, "Device task ended abnormally");
                    abnormal_reason = Some(if e.is_panic() {
                        "task panicked".to_string()
                    } else {
                        e.to_string()
                    });
                }
            }
        }

        // Whatever never reported back must be a task that panicked or was aborted
        for device in pending {
            let reason = abnormal_reason
                .clone()
                .unwrap_or_else(|| "task ended without a result".to_string());
            outcomes.push(DeviceOutcome {
                device_id: device.clone(),
                result: Err(SimError::Task { device, reason }),
            });
        }

        let report = SimulationReport::new(outcomes);
        info!(
            published = report.published(),
            failed_publishes = report.failed_publishes(),
            failed_devices = report.failed_devices().len(),
            "Simulation finished"
        );
        report
    }
}
