// src/transport/memory.rs
//! In-process transport that records every publish
//!
//! Used by the test-suite and by `--dry-run`. Failures and latency can be
//! injected per client id or topic to exercise the publisher's error paths.

use super::{ConnectOptions, Session, Transport};
use crate::error::{SimError, SimResult};
use crate::publisher::SensorReading;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// One recorded publish
#[derive(Debug, Clone, PartialEq)]
pub struct PublishedMessage {
    pub client_id: String,
    pub topic: String,
    pub payload: Vec<u8>,
}

impl PublishedMessage {
    /// Decode the payload back into its four fields
    pub fn reading(&self) -> SimResult<SensorReading> {
        SensorReading::from_payload(&self.payload)
    }
}

#[derive(Debug, Default)]
struct MemoryState {
    messages: Mutex<Vec<PublishedMessage>>,
    /// client-id prefix -> remaining connect failures
    connect_failures: Mutex<HashMap<String, u32>>,
    failing_topics: Mutex<Vec<String>>,
    slow_topics: Mutex<Vec<(String, Duration)>>,
    stalled_topics: Mutex<Vec<String>>,
    connects: AtomicUsize,
    disconnects: AtomicUsize,
}

/// Recording transport; clones share the same log
#[derive(Debug, Clone, Default)]
pub struct MemoryTransport {
    state: Arc<MemoryState>,
}

impl MemoryTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Refuse the next `attempts` connects of clients whose id starts with `prefix`
    ///
    /// `u32::MAX` refuses forever.
    pub fn fail_connects(&self, prefix: impl Into<String>, attempts: u32) -> &Self {
        self.state
            .connect_failures
            .lock()
            .insert(prefix.into(), attempts);
        self
    }

    /// Fail every publish whose topic contains `fragment`
    pub fn fail_publishes_matching(&self, fragment: impl Into<String>) -> &Self {
        self.state.failing_topics.lock().push(fragment.into());
        self
    }

    /// Delay every publish whose topic contains `fragment`
    pub fn delay_publishes_matching(&self, fragment: impl Into<String>, delay: Duration) -> &Self {
        self.state.slow_topics.lock().push((fragment.into(), delay));
        self
    }

    /// Never complete a publish whose topic contains `fragment`
    ///
    /// Stands in for a broker connection whose outgoing queue never drains.
    pub fn stall_publishes_matching(&self, fragment: impl Into<String>) -> &Self {
        self.state.stalled_topics.lock().push(fragment.into());
        self
    }

    pub fn messages(&self) -> Vec<PublishedMessage> {
        self.state.messages.lock().clone()
    }

    pub fn messages_for_topic_fragment(&self, fragment: &str) -> Vec<PublishedMessage> {
        self.state
            .messages
            .lock()
            .iter()
            .filter(|m| m.topic.contains(fragment))
            .cloned()
            .collect()
    }

    pub fn message_count(&self) -> usize {
        self.state.messages.lock().len()
    }

    pub fn connect_count(&self) -> usize {
        self.state.connects.load(Ordering::SeqCst)
    }

    pub fn disconnect_count(&self) -> usize {
        self.state.disconnects.load(Ordering::SeqCst)
    }

    pub fn clear(&self) {
        self.state.messages.lock().clear();
    }

    fn take_connect_failure(&self, client_id: &str) -> bool {
        let mut failures = self.state.connect_failures.lock();
        for (prefix, remaining) in failures.iter_mut() {
            if client_id.starts_with(prefix.as_str()) && *remaining > 0 {
                if *remaining != u32::MAX {
                    *remaining -= 1;
                }
                return true;
            }
        }
        false
    }
}

#[async_trait]
impl Transport for MemoryTransport {
    async fn connect(&self, options: &ConnectOptions) -> SimResult<Box<dyn Session>> {
        if self.take_connect_failure(&options.client_id) {
            return Err(SimError::connect(&options.client_id, "connection refused (injected)"));
        }

        self.state.connects.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(MemorySession {
            client_id: options.client_id.clone(),
            state: Arc::clone(&self.state),
            open: true,
        }))
    }
}

struct MemorySession {
    client_id: String,
    state: Arc<MemoryState>,
    open: bool,
}

impl MemorySession {
    fn delay_for(&self, topic: &str) -> Option<Duration> {
        self.state
            .slow_topics
            .lock()
            .iter()
            .find(|(fragment, _)| topic.contains(fragment.as_str()))
            .map(|(_, delay)| *delay)
    }

    fn stalls(&self, topic: &str) -> bool {
        self.state
            .stalled_topics
            .lock()
            .iter()
            .any(|fragment| topic.contains(fragment.as_str()))
    }

    fn should_fail(&self, topic: &str) -> bool {
        self.state
            .failing_topics
            .lock()
            .iter()
            .any(|fragment| topic.contains(fragment.as_str()))
    }
}

#[async_trait]
impl Session for MemorySession {
    fn client_id(&self) -> &str {
        &self.client_id
    }

    async fn publish(&mut self, topic: &str, payload: Vec<u8>) -> SimResult<()> {
        if !self.open {
            return Err(SimError::publish(topic, "session is closed"));
        }

        if self.stalls(topic) {
            std::future::pending::<()>().await;
        }

        if let Some(delay) = self.delay_for(topic) {
            tokio::time::sleep(delay).await;
        }

        if self.should_fail(topic) {
            return Err(SimError::publish(topic, "publish rejected (injected)"));
        }

        self.state.messages.lock().push(PublishedMessage {
            client_id: self.client_id.clone(),
            topic: topic.to_string(),
            payload,
        });
        Ok(())
    }

    async fn disconnect(&mut self) -> SimResult<()> {
        if self.open {
            self.open = false;
            self.state.disconnects.fetch_add(1, Ordering::SeqCst);
        }
        Ok(())
    }
}
