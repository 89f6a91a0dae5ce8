//! Shared utilities for integration testing.
//!
//! `MockTransport` hands out scripted connections: connect attempts can be made to
//! fail, each successful connection replays its own probe script, and tests can
//! close a connection from the "remote" side. Meant for tokio's paused clock.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use latency_failover::config::ClientConfig;
use latency_failover::manager::ManagerSnapshot;
use latency_failover::{Connection, Payload, PrimaryManager, Transport, TransportError};
use tokio::sync::Notify;
use tokio::time;
use url::Url;

pub const GOOD: Duration = Duration::from_millis(20);
/// Answered, but over the 100ms threshold used by `test_config`.
pub const SLOW: Duration = Duration::from_millis(150);

/// What one probe on a mock connection does.
#[derive(Debug, Clone, Copy)]
pub enum Probe {
    /// Answer after this round trip (times out if it exceeds the deadline).
    Latency(Duration),
    /// Never answer.
    Timeout,
    /// Fail with a non-timeout transport error.
    Error,
}

pub fn good(n: usize) -> Vec<Probe> {
    vec![Probe::Latency(GOOD); n]
}

pub fn slow(n: usize) -> Vec<Probe> {
    vec![Probe::Latency(SLOW); n]
}

pub fn timeouts(n: usize) -> Vec<Probe> {
    vec![Probe::Timeout; n]
}

pub struct MockConnection {
    script: Mutex<VecDeque<Probe>>,
    fallback: Probe,
    stuck_close: bool,
    remote_close: Notify,
    pub probes: AtomicUsize,
    pub closes: AtomicUsize,
}

impl MockConnection {
    /// Close the connection from the remote side.
    pub fn close_remotely(&self) {
        self.remote_close.notify_one();
    }

    pub fn probe_count(&self) -> usize {
        self.probes.load(Ordering::SeqCst)
    }

    pub fn close_count(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Connection for MockConnection {
    async fn probe(&self, deadline: Duration) -> Result<Duration, TransportError> {
        self.probes.fetch_add(1, Ordering::SeqCst);
        let next = self.script.lock().unwrap().pop_front().unwrap_or(self.fallback);
        match next {
            Probe::Latency(latency) if latency < deadline => {
                time::sleep(latency).await;
                Ok(latency)
            }
            Probe::Latency(_) | Probe::Timeout => {
                time::sleep(deadline).await;
                Err(TransportError::ProbeTimeout(deadline))
            }
            Probe::Error => Err(TransportError::Probe("connection reset".into())),
        }
    }

    async fn recv(&self) -> Result<Payload, TransportError> {
        self.remote_close.notified().await;
        Err(TransportError::RemoteClosed {
            code: 1001,
            reason: "going away".into(),
        })
    }

    async fn close(&self, _deadline: Duration) -> Result<(), TransportError> {
        self.closes.fetch_add(1, Ordering::SeqCst);
        if self.stuck_close {
            std::future::pending::<()>().await;
        }
        Ok(())
    }
}

/// Transport handing out scripted connections in open order.
pub struct MockTransport {
    failing_opens: AtomicUsize,
    plans: Mutex<VecDeque<Vec<Probe>>>,
    fallback: Probe,
    stuck_close: bool,
    pub opens: AtomicUsize,
    pub connections: Mutex<Vec<Arc<MockConnection>>>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self {
            failing_opens: AtomicUsize::new(0),
            plans: Mutex::new(VecDeque::new()),
            fallback: Probe::Latency(GOOD),
            stuck_close: false,
            opens: AtomicUsize::new(0),
            connections: Mutex::new(Vec::new()),
        }
    }

    /// Make the next `n` connect attempts fail.
    pub fn fail_opens(self, n: usize) -> Self {
        self.failing_opens.store(n, Ordering::SeqCst);
        self
    }

    /// Probe script for the next successful connection; later probes answer quickly.
    pub fn with_connection(self, probes: Vec<Probe>) -> Self {
        self.plans.lock().unwrap().push_back(probes);
        self
    }

    /// Behaviour once a connection's script is exhausted.
    pub fn with_fallback(mut self, fallback: Probe) -> Self {
        self.fallback = fallback;
        self
    }

    /// Connections whose close never completes.
    pub fn with_stuck_close(mut self) -> Self {
        self.stuck_close = true;
        self
    }

    pub fn open_count(&self) -> usize {
        self.opens.load(Ordering::SeqCst)
    }

    pub fn connection(&self, index: usize) -> Arc<MockConnection> {
        self.connections.lock().unwrap()[index].clone()
    }

    pub fn connection_count(&self) -> usize {
        self.connections.lock().unwrap().len()
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn open(&self, _endpoint: &Url, _deadline: Duration) -> Result<Arc<dyn Connection>, TransportError> {
        self.opens.fetch_add(1, Ordering::SeqCst);

        let failing = self
            .failing_opens
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failing {
            return Err(TransportError::Connect("connection refused".into()));
        }

        let script = self.plans.lock().unwrap().pop_front().unwrap_or_default();
        let connection = Arc::new(MockConnection {
            script: Mutex::new(script.into()),
            fallback: self.fallback,
            stuck_close: self.stuck_close,
            remote_close: Notify::new(),
            probes: AtomicUsize::new(0),
            closes: AtomicUsize::new(0),
        });
        self.connections.lock().unwrap().push(connection.clone());
        Ok(connection)
    }
}

/// Defaults, except a 100ms latency threshold so slow-but-answered probes count as bad.
pub fn test_config() -> ClientConfig {
    let mut config = ClientConfig {
        endpoint: "ws://mock.test/feed".to_string(),
        ..ClientConfig::default()
    };
    config.primary.latency_threshold_ms = 100;
    config.health_probe.latency_threshold_ms = 100;
    config
}

/// Poll snapshots on the (paused) clock until `predicate` holds.
pub async fn eventually<F>(manager: &PrimaryManager, predicate: F) -> ManagerSnapshot
where
    F: Fn(&ManagerSnapshot) -> bool,
{
    for _ in 0..1200 {
        let snapshot = manager.snapshot().await.unwrap();
        if predicate(&snapshot) {
            return snapshot;
        }
        time::sleep(Duration::from_millis(100)).await;
    }
    panic!("condition not reached within 120s");
}
