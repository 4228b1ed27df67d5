//! "Network is up" signals awaited before every attempt.

use std::time::Duration;

use tokio::net::lookup_host;
use tokio::sync::watch;

/// Blocks until the network is usable.
///
/// Called at the start of every attempt, so implementations must return
/// immediately when connectivity is already present.
pub trait Connectivity {
    async fn wait(&mut self);
}

/// Connectivity driven by a shared on/off flag.
///
/// Whatever brings the link up flips the flag with [`watch::Sender::send`].
#[derive(Debug, Clone)]
pub struct WatchConnectivity {
    rx: watch::Receiver<bool>,
}

impl WatchConnectivity {
    pub fn new(rx: watch::Receiver<bool>) -> Self {
        Self { rx }
    }

    /// A flag starting in the given state, plus the sender controlling it.
    pub fn channel(up: bool) -> (watch::Sender<bool>, Self) {
        let (tx, rx) = watch::channel(up);
        (tx, Self::new(rx))
    }
}

impl Connectivity for WatchConnectivity {
    async fn wait(&mut self) {
        // A dropped sender can never signal again; treat the last value as final.
        if self.rx.wait_for(|up| *up).await.is_err() {
            tracing::warn!("Connectivity source dropped");
        }
    }
}

/// Considers the network up once the target host resolves.
#[derive(Debug, Clone)]
pub struct ResolveConnectivity {
    addr: String,
    poll_interval: Duration,
}

impl ResolveConnectivity {
    pub fn new(host: &str, port: u16, poll_interval: Duration) -> Self {
        Self {
            addr: format!("{}:{}", host, port),
            poll_interval,
        }
    }
}

impl Connectivity for ResolveConnectivity {
    async fn wait(&mut self) {
        loop {
            match lookup_host(&self.addr).await.map(|mut addrs| addrs.next()) {
                Ok(Some(_)) => return,
                Ok(None) => tracing::debug!(addr = %self.addr, "No addresses yet"),
                Err(e) => tracing::debug!(addr = %self.addr, error = %e, "Waiting for network"),
            }
            tokio::time::sleep(self.poll_interval).await;
        }
    }
}
