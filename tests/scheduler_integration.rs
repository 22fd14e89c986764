// tests/scheduler_integration.rs
//! End-to-end runs of the scheduler over the in-memory transport
//!
//! Timing-sensitive tests run on a paused tokio clock so every interval is
//! exact and nothing actually sleeps.

use iot_sim::config::{DeviceModel, ParameterMap, SimulatorConfig};
use iot_sim::publisher::RetryPolicy;
use iot_sim::scheduler::SimulationScheduler;
use iot_sim::simulation::{WaveformKind, WaveformSpec};
use iot_sim::transport::MemoryTransport;
use iot_sim::utils::{shared_rng, MockTimeProvider};
use iot_sim::SimError;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{sleep, Instant};
use tokio_util::sync::CancellationToken;

fn device(id: &str, params: &[(&str, WaveformSpec)]) -> DeviceModel {
    params
        .iter()
        .fold(DeviceModel::new(id, ParameterMap::new()), |model, (name, spec)| {
            model.with_parameter(*name, spec.clone())
        })
}

fn config(interval: f64, devices: Vec<DeviceModel>) -> SimulatorConfig {
    let mut config = SimulatorConfig::default();
    config.devices.clear();
    config.publish_interval = interval;
    config.verbose = false;
    config.mqtt.topic_prefix = "test/sim".to_string();
    devices
        .into_iter()
        .fold(config, |config, model| config.with_device(model))
}

fn scheduler(config: &SimulatorConfig, transport: &MemoryTransport) -> SimulationScheduler {
    SimulationScheduler::strict(config, Arc::new(transport.clone()), shared_rng(Some(42)))
        .expect("valid configuration")
        .with_clock(Arc::new(MockTimeProvider::stepping(1_700_000_000.0, 0.001)))
}

#[tokio::test(start_paused = true)]
async fn test_two_devices_three_ticks() {
    let transport = MemoryTransport::new();
    let config = config(
        2.0,
        vec![
            device("alpha", &[("Temp", WaveformSpec::linear(20.0, 0.1))]),
            device("beta", &[("Level", WaveformSpec::linear(5.0, -1.0))]),
        ],
    );

    let report = scheduler(&config, &transport)
        .run_ticks(3, CancellationToken::new())
        .await;

    assert_eq!(transport.message_count(), 6);
    assert_eq!(report.published(), 6);
    assert_eq!(report.failed_publishes(), 0);
    assert!(report.failed_devices().is_empty());
    assert_eq!(transport.disconnect_count(), 2);

    let alpha = transport.messages_for_topic_fragment("/device/alpha/");
    assert!(alpha.iter().all(|m| m.topic == "test/sim/device/alpha/Temp"));
    let readings: Vec<_> = alpha.iter().map(|m| m.reading().unwrap()).collect();
    assert_eq!(
        readings.iter().map(|r| r.value).collect::<Vec<_>>(),
        vec![20.0, 20.1, 20.2]
    );
    assert!(readings.iter().all(|r| r.device == "alpha" && r.param == "Temp"));
    assert!(readings.windows(2).all(|w| w[0].ts < w[1].ts));

    let beta = transport.messages_for_topic_fragment("/device/beta/");
    assert!(beta.iter().all(|m| m.topic == "test/sim/device/beta/Level"));
    let values: Vec<f64> = beta.iter().map(|m| m.reading().unwrap().value).collect();
    assert_eq!(values, vec![5.0, 4.0, 3.0]);
}

#[tokio::test(start_paused = true)]
async fn test_parameters_published_in_name_order() {
    let transport = MemoryTransport::new();
    let config = config(
        1.0,
        vec![device(
            "dev",
            &[
                ("zeta", WaveformSpec::linear(0.0, 1.0)),
                ("alpha", WaveformSpec::periodic(WaveformKind::Triangle, 1.0, 0.2)),
                ("mid", WaveformSpec::noise(0.0, 1.0)),
            ],
        )],
    );

    scheduler(&config, &transport)
        .run_ticks(2, CancellationToken::new())
        .await;

    let params: Vec<String> = transport
        .messages()
        .iter()
        .map(|m| m.reading().unwrap().param)
        .collect();
    assert_eq!(params, vec!["alpha", "mid", "zeta", "alpha", "mid", "zeta"]);
}

#[tokio::test(start_paused = true)]
async fn test_cancel_stops_all_devices_within_one_interval() {
    let transport = MemoryTransport::new();
    let config = config(
        2.0,
        vec![
            device("a", &[("p", WaveformSpec::linear(0.0, 1.0))]),
            device("b", &[("p", WaveformSpec::linear(0.0, 1.0))]),
        ],
    );
    let cancel = CancellationToken::new();
    let run = tokio::spawn(scheduler(&config, &transport).run(cancel.clone()));

    // Ticks at 0s, 2s and 4s
    sleep(Duration::from_secs(5)).await;
    let before_cancel = transport.message_count();
    assert_eq!(before_cancel, 6);

    let cancelled_at = Instant::now();
    cancel.cancel();
    let report = run.await.unwrap();

    assert!(cancelled_at.elapsed() < Duration::from_secs(2));
    assert_eq!(transport.message_count(), before_cancel);
    assert_eq!(transport.disconnect_count(), 2);
    assert_eq!(report.published(), 6);

    sleep(Duration::from_secs(10)).await;
    assert_eq!(transport.message_count(), before_cancel);
}

#[tokio::test(start_paused = true)]
async fn test_cancel_releases_device_with_stalled_publish() {
    let transport = MemoryTransport::new();
    transport.stall_publishes_matching("/device/stuck/");
    let config = config(
        2.0,
        vec![
            device("stuck", &[("p", WaveformSpec::linear(0.0, 1.0))]),
            device("fine", &[("p", WaveformSpec::linear(0.0, 1.0))]),
        ],
    );
    let cancel = CancellationToken::new();
    let run = tokio::spawn(scheduler(&config, &transport).run(cancel.clone()));

    sleep(Duration::from_secs(3)).await;
    assert_eq!(transport.messages_for_topic_fragment("/device/fine/").len(), 2);
    assert!(transport.messages_for_topic_fragment("/device/stuck/").is_empty());

    let cancelled_at = Instant::now();
    cancel.cancel();
    let report = run.await.unwrap();

    assert!(cancelled_at.elapsed() <= Duration::from_secs(2));
    assert_eq!(transport.disconnect_count(), 2);
    let stuck = report.outcome("stuck").unwrap().stats().unwrap();
    assert_eq!(stuck.published, 0);
    assert_eq!(stuck.failed, 1);

    let after_cancel = transport.message_count();
    sleep(Duration::from_secs(10)).await;
    assert_eq!(transport.message_count(), after_cancel);
}

#[tokio::test(start_paused = true)]
async fn test_failed_connect_does_not_stop_sibling() {
    let transport = MemoryTransport::new();
    transport.fail_connects("unreachable_", u32::MAX);
    let config = config(
        1.0,
        vec![
            device("unreachable", &[("p", WaveformSpec::linear(0.0, 1.0))]),
            device("healthy", &[("p", WaveformSpec::linear(0.0, 1.0))]),
        ],
    );

    let report = scheduler(&config, &transport)
        .with_retry(RetryPolicy {
            max_attempts: 3,
            ..RetryPolicy::default()
        })
        .run_ticks(3, CancellationToken::new())
        .await;

    assert_eq!(transport.messages_for_topic_fragment("/device/healthy/").len(), 3);
    assert!(transport.messages_for_topic_fragment("/device/unreachable/").is_empty());
    assert_eq!(report.failed_devices(), vec!["unreachable"]);
    assert!(!report.all_failed());

    let failed = report.outcome("unreachable").unwrap();
    assert!(matches!(&failed.result, Err(SimError::Connect { client_id, .. }) if client_id.starts_with("unreachable_")));
}

#[tokio::test(start_paused = true)]
async fn test_publish_failures_do_not_stop_other_parameters() {
    let transport = MemoryTransport::new();
    transport.fail_publishes_matching("/broken");
    let config = config(
        1.0,
        vec![device(
            "dev",
            &[
                ("broken", WaveformSpec::linear(0.0, 1.0)),
                ("ok", WaveformSpec::linear(0.0, 1.0)),
            ],
        )],
    );

    let report = scheduler(&config, &transport)
        .run_ticks(4, CancellationToken::new())
        .await;

    let stats = report.outcome("dev").unwrap().stats().copied().unwrap();
    assert_eq!(stats.ticks, 4);
    assert_eq!(stats.published, 4);
    assert_eq!(stats.failed, 4);
    assert_eq!(transport.messages_for_topic_fragment("/ok").len(), 4);
}

#[tokio::test(start_paused = true)]
async fn test_slow_device_does_not_block_others() {
    let transport = MemoryTransport::new();
    transport.delay_publishes_matching("/device/slow/", Duration::from_secs(10));
    let config = config(
        1.0,
        vec![
            device("slow", &[("p", WaveformSpec::linear(0.0, 1.0))]),
            device("fast", &[("p", WaveformSpec::linear(0.0, 1.0))]),
        ],
    );

    let run = tokio::spawn(
        scheduler(&config, &transport).run_ticks(3, CancellationToken::new()),
    );

    sleep(Duration::from_secs(3)).await;
    assert_eq!(transport.messages_for_topic_fragment("/device/fast/").len(), 3);
    assert!(transport.messages_for_topic_fragment("/device/slow/").is_empty());

    let report = run.await.unwrap();
    assert_eq!(report.published(), 6);
}

#[tokio::test(start_paused = true)]
async fn test_configured_client_id_is_shared() {
    let transport = MemoryTransport::new();
    let mut config = config(
        1.0,
        vec![
            device("a", &[("p", WaveformSpec::linear(0.0, 1.0))]),
            device("b", &[("p", WaveformSpec::linear(0.0, 1.0))]),
        ],
    );
    config.mqtt.client_id = "fleet".to_string();

    scheduler(&config, &transport)
        .run_ticks(1, CancellationToken::new())
        .await;

    assert!(transport.messages().iter().all(|m| m.client_id == "fleet"));
}

#[tokio::test(start_paused = true)]
async fn test_lenient_mode_skips_bad_device() {
    let transport = MemoryTransport::new();
    let config = config(
        1.0,
        vec![
            device("good", &[("p", WaveformSpec::linear(0.0, 1.0))]),
            device("broken", &[("p", WaveformSpec::of_kind("zigzag"))]),
        ],
    );

    assert!(SimulationScheduler::strict(&config, Arc::new(transport.clone()), shared_rng(None)).is_err());

    let scheduler =
        SimulationScheduler::new(&config, Arc::new(transport.clone()), shared_rng(None)).unwrap();
    assert_eq!(scheduler.device_ids(), vec!["good"]);

    let report = scheduler.run_ticks(2, CancellationToken::new()).await;
    assert_eq!(report.failed_devices(), vec!["broken"]);
    assert_eq!(transport.message_count(), 2);
    assert_eq!(transport.connect_count(), 1);
}

#[tokio::test]
async fn test_cancelled_before_start_publishes_nothing() {
    let transport = MemoryTransport::new();
    let config = config(1.0, vec![device("a", &[("p", WaveformSpec::linear(0.0, 1.0))])]);
    let cancel = CancellationToken::new();
    cancel.cancel();

    let report = scheduler(&config, &transport).run(cancel).await;

    assert_eq!(transport.message_count(), 0);
    assert!(report.failed_devices().is_empty());
    assert!(!report.all_failed());
}
