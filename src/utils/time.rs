// src/utils/time.rs
//! Wall-clock access for sample timestamps

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

/// Time provider trait for dependency injection and testing
pub trait TimeProvider: Send + Sync {
    /// Seconds since the Unix epoch with sub-second precision
    fn now_secs(&self) -> f64;
}

/// System time provider using actual system clock
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemTimeProvider;

impl TimeProvider for SystemTimeProvider {
    fn now_secs(&self) -> f64 {
        current_timestamp_secs()
    }
}

/// Mock time provider for deterministic testing
///
/// Every read returns the current value and then moves it forward by `step`,
/// so consecutive readings are strictly increasing when `step` is non-zero.
#[derive(Debug)]
pub struct MockTimeProvider {
    current_micros: AtomicU64,
    step_micros: u64,
}

impl MockTimeProvider {
    pub fn new(initial_secs: f64) -> Self {
        Self::stepping(initial_secs, 0.0)
    }

    pub fn stepping(initial_secs: f64, step_secs: f64) -> Self {
        Self {
            current_micros: AtomicU64::new(secs_to_micros(initial_secs)),
            step_micros: secs_to_micros(step_secs),
        }
    }

    pub fn advance_by(&self, secs: f64) {
        self.current_micros
            .fetch_add(secs_to_micros(secs), Ordering::Relaxed);
    }

    pub fn set_time(&self, secs: f64) {
        self.current_micros
            .store(secs_to_micros(secs), Ordering::Relaxed);
    }
}

impl TimeProvider for MockTimeProvider {
    fn now_secs(&self) -> f64 {
        let micros = self
            .current_micros
            .fetch_add(self.step_micros, Ordering::Relaxed);
        micros as f64 / 1_000_000.0
    }
}

fn secs_to_micros(secs: f64) -> u64 {
    (secs.max(0.0) * 1_000_000.0).round() as u64
}

/// Current wall-clock time as floating-point seconds since the epoch
pub fn current_timestamp_secs() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs_f64()
}
