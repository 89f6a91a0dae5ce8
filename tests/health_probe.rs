use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use latency_failover::health::RecoveryHook;
use latency_failover::{ConnectionState, HealthProbe, ManagerError};
use tokio::time;
use url::Url;

mod common;

use common::{test_config, timeouts, MockTransport};

fn spawn_probe(transport: &Arc<MockTransport>) -> (HealthProbe, Arc<AtomicUsize>) {
    let config = test_config();
    let recoveries = Arc::new(AtomicUsize::new(0));
    let counter = recoveries.clone();
    let on_recovered: RecoveryHook = Arc::new(move || {
        counter.fetch_add(1, Ordering::SeqCst);
    });
    let probe = HealthProbe::spawn(
        Url::parse(&config.endpoint).unwrap(),
        &config.health_probe,
        &config.primary,
        transport.clone(),
        on_recovered,
    )
    .unwrap();
    (probe, recoveries)
}

#[tokio::test]
async fn test_spawn_rejects_zero_probe_timeout() {
    let mut config = test_config();
    config.primary.probe_timeout_ms = 0;
    let on_recovered: RecoveryHook = Arc::new(|| {});
    let result = HealthProbe::spawn(
        Url::parse(&config.endpoint).unwrap(),
        &config.health_probe,
        &config.primary,
        Arc::new(MockTransport::new()),
        on_recovered,
    );
    assert!(matches!(result, Err(ManagerError::InvalidConfig(_))));
}

#[tokio::test(start_paused = true)]
async fn test_terminate_before_start_is_noop() {
    let transport = Arc::new(MockTransport::new());
    let (probe, recoveries) = spawn_probe(&transport);

    probe.terminate().await;
    probe.terminate().await;
    assert_eq!(probe.state(), ConnectionState::Idle);

    time::sleep(Duration::from_secs(30)).await;
    assert_eq!(transport.open_count(), 0);
    assert_eq!(recoveries.load(Ordering::SeqCst), 0);
}

#[tokio::test(start_paused = true)]
async fn test_retries_until_terminated() {
    let transport = Arc::new(MockTransport::new().fail_opens(1000));
    let (probe, _) = spawn_probe(&transport);

    probe.start().unwrap();
    time::sleep(Duration::from_secs(60)).await;
    assert!(transport.open_count() > 4);
    assert_ne!(probe.state(), ConnectionState::Failed);

    let snapshot = probe.snapshot().await.unwrap();
    assert!(snapshot.retry_enabled);
    assert!(snapshot.attempts > 4);

    probe.terminate().await;
    let opens = transport.open_count();
    time::sleep(Duration::from_secs(60)).await;
    assert_eq!(transport.open_count(), opens);
    assert_eq!(probe.state(), ConnectionState::Disconnected);
}

#[tokio::test(start_paused = true)]
async fn test_reports_recovery_once_and_keeps_running() {
    let transport = Arc::new(MockTransport::new());
    let (probe, recoveries) = spawn_probe(&transport);

    probe.start().unwrap();
    time::sleep(Duration::from_secs(12)).await;
    assert_eq!(recoveries.load(Ordering::SeqCst), 1);

    time::sleep(Duration::from_secs(30)).await;
    assert_eq!(recoveries.load(Ordering::SeqCst), 1);
    assert_eq!(probe.state(), ConnectionState::Connected);

    let snapshot = probe.snapshot().await.unwrap();
    assert_eq!(snapshot.window_len, 10);
    assert_eq!(snapshot.bad_count, 0);

    probe.terminate().await;
    assert_eq!(transport.connection(0).close_count(), 1);
    assert_eq!(probe.state(), ConnectionState::Disconnected);
}

#[tokio::test(start_paused = true)]
async fn test_bad_window_starts_from_scratch() {
    let transport = Arc::new(MockTransport::new().with_connection(timeouts(10)));
    let (probe, recoveries) = spawn_probe(&transport);

    probe.start().unwrap();
    time::sleep(Duration::from_secs(12)).await;
    assert_eq!(transport.open_count(), 2);
    assert_eq!(transport.connection(0).probe_count(), 10);
    assert_eq!(transport.connection(0).close_count(), 1);
    assert_eq!(recoveries.load(Ordering::SeqCst), 0);

    // The fresh connection answers quickly and gets its own full window.
    time::sleep(Duration::from_secs(12)).await;
    assert_eq!(recoveries.load(Ordering::SeqCst), 1);
    assert_eq!(probe.state(), ConnectionState::Connected);

    probe.terminate().await;
}
