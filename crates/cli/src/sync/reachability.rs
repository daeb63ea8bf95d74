// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Reachability monitoring.
//!
//! [`ReachabilityMonitor`] holds the single authoritative online/offline
//! flag. It starts offline and only goes online on a confirmed positive
//! signal. Subscribers are woken on edges only: reporting the state the
//! monitor is already in is a no-op.
//!
//! Signals come from whatever the host platform offers (call
//! [`ReachabilityMonitor::report`]) or from a [`ProbeHandle`] task that
//! periodically opens a TCP connection to the backend.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::net::TcpStream;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Network connectivity as seen by the sync engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Connectivity {
    Online,
    Offline,
}

impl Connectivity {
    pub fn from_online(online: bool) -> Self {
        if online {
            Connectivity::Online
        } else {
            Connectivity::Offline
        }
    }

    pub fn is_online(self) -> bool {
        self == Connectivity::Online
    }
}

impl std::fmt::Display for Connectivity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Connectivity::Online => f.write_str("online"),
            Connectivity::Offline => f.write_str("offline"),
        }
    }
}

/// Authoritative online/offline state with edge notifications.
pub struct ReachabilityMonitor {
    tx: watch::Sender<Connectivity>,
}

impl ReachabilityMonitor {
    /// Creates a monitor in the offline state.
    pub fn new() -> Self {
        let (tx, _) = watch::channel(Connectivity::Offline);
        ReachabilityMonitor { tx }
    }

    /// Reports the latest signal. Returns true if this was an edge.
    pub fn report(&self, online: bool) -> bool {
        let next = Connectivity::from_online(online);
        let changed = self.tx.send_if_modified(|current| {
            if *current == next {
                false
            } else {
                *current = next;
                true
            }
        });
        if changed {
            tracing::info!("connectivity changed: {}", next);
        }
        changed
    }

    pub fn connectivity(&self) -> Connectivity {
        *self.tx.borrow()
    }

    pub fn is_online(&self) -> bool {
        self.connectivity().is_online()
    }

    /// Receiver that wakes on every edge.
    pub fn subscribe(&self) -> watch::Receiver<Connectivity> {
        self.tx.subscribe()
    }
}

impl Default for ReachabilityMonitor {
    fn default() -> Self {
        Self::new()
    }
}

/// Configuration for the TCP reachability probe.
#[derive(Debug, Clone)]
pub struct ProbeConfig {
    /// `host:port` to connect to.
    pub addr: String,
    /// Delay between probes.
    pub interval: Duration,
    /// Max time to wait for a connection.
    pub timeout: Duration,
}

/// Handle to a running probe task. Dropping it stops the probe.
pub struct ProbeHandle {
    cancel_token: CancellationToken,
    task: Option<JoinHandle<()>>,
}

impl ProbeHandle {
    /// Spawns a probe that feeds `monitor` until stopped.
    pub fn spawn(monitor: Arc<ReachabilityMonitor>, config: ProbeConfig) -> Self {
        let cancel_token = CancellationToken::new();
        let token = cancel_token.clone();

        let task = tokio::spawn(async move {
            loop {
                let online = tokio::select! {
                    _ = token.cancelled() => return,
                    online = probe_once(&config.addr, config.timeout) => online,
                };
                monitor.report(online);

                tokio::select! {
                    _ = token.cancelled() => return,
                    _ = tokio::time::sleep(config.interval) => {}
                }
            }
        });

        ProbeHandle {
            cancel_token,
            task: Some(task),
        }
    }

    /// Stops the probe and waits for the task to exit.
    pub async fn stop(mut self) {
        self.cancel_token.cancel();
        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
    }
}

impl Drop for ProbeHandle {
    fn drop(&mut self) {
        self.cancel_token.cancel();
    }
}

/// Tries one TCP connection to `addr`.
pub async fn probe_once(addr: &str, timeout: Duration) -> bool {
    match tokio::time::timeout(timeout, TcpStream::connect(addr)).await {
        Ok(Ok(_)) => true,
        Ok(Err(e)) => {
            tracing::debug!("probe {} failed: {}", addr, e);
            false
        }
        Err(_) => {
            tracing::debug!("probe {} timed out", addr);
            false
        }
    }
}

/// Derives the `host:port` to probe from a `ws://` or `wss://` URL.
pub fn probe_target(url: &str) -> Option<String> {
    let (rest, default_port) = if let Some(rest) = url.strip_prefix("ws://") {
        (rest, 80)
    } else if let Some(rest) = url.strip_prefix("wss://") {
        (rest, 443)
    } else {
        return None;
    };

    let authority = rest.split(['/', '?', '#']).next().unwrap_or_default();
    if authority.is_empty() {
        return None;
    }

    // Bracketed IPv6 literal, optional port
    if authority.starts_with('[') {
        return match authority.rfind("]:") {
            Some(_) => Some(authority.to_string()),
            None => Some(format!("{authority}:{default_port}")),
        };
    }

    match authority.rsplit_once(':') {
        Some((host, port)) if !host.is_empty() && port.parse::<u16>().is_ok() => {
            Some(authority.to_string())
        }
        Some(_) => None,
        None => Some(format!("{authority}:{default_port}")),
    }
}
