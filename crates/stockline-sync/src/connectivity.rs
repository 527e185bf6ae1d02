//! # Connectivity Oracle
//!
//! Answers "are we online right now?" on demand.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  ConnectivityOracle::is_online()                                       │
//! │                                                                         │
//! │  HttpProbe          HEAD <probe url>, any HTTP status = online          │
//! │                     timeout / DNS / refused          = offline          │
//! │                                                                         │
//! │  StaticConnectivity flag set by the host (forced modes, tests)         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::debug;
use url::Url;

use crate::config::{ConnectivityMode, SyncConfig};
use crate::error::{SyncError, SyncResult};

/// Reports whether the remote is reachable.
#[async_trait]
pub trait ConnectivityOracle: Send + Sync {
    async fn is_online(&self) -> bool;
}

// =============================================================================
// HTTP Probe
// =============================================================================

/// Probes a URL with a short HEAD request.
#[derive(Debug, Clone)]
pub struct HttpProbe {
    client: reqwest::Client,
    url: Url,
}

impl HttpProbe {
    pub fn new(url: Url, timeout: Duration) -> SyncResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .connect_timeout(timeout)
            .build()
            .map_err(|e| SyncError::InvalidConfig(e.to_string()))?;

        Ok(HttpProbe { client, url })
    }
}

#[async_trait]
impl ConnectivityOracle for HttpProbe {
    async fn is_online(&self) -> bool {
        match self.client.head(self.url.clone()).send().await {
            Ok(response) => {
                debug!(status = %response.status(), "Connectivity probe answered");
                true
            }
            Err(e) => {
                debug!(error = %e, "Connectivity probe failed");
                false
            }
        }
    }
}

// =============================================================================
// Static Connectivity
// =============================================================================

/// A connectivity flag the host flips by hand.
///
/// Clones share the flag.
#[derive(Debug, Clone)]
pub struct StaticConnectivity {
    online: Arc<AtomicBool>,
}

impl StaticConnectivity {
    pub fn new(online: bool) -> Self {
        StaticConnectivity {
            online: Arc::new(AtomicBool::new(online)),
        }
    }

    pub fn online() -> Self {
        Self::new(true)
    }

    pub fn offline() -> Self {
        Self::new(false)
    }

    pub fn set_online(&self, online: bool) {
        self.online.store(online, Ordering::SeqCst);
    }
}

#[async_trait]
impl ConnectivityOracle for StaticConnectivity {
    async fn is_online(&self) -> bool {
        self.online.load(Ordering::SeqCst)
    }
}

/// Builds the oracle selected by `[connectivity] mode`.
pub fn from_config(config: &SyncConfig) -> SyncResult<Arc<dyn ConnectivityOracle>> {
    let oracle: Arc<dyn ConnectivityOracle> = match config.connectivity.mode {
        ConnectivityMode::Auto => Arc::new(HttpProbe::new(
            config.probe_url()?,
            Duration::from_secs(config.connectivity.probe_timeout_secs),
        )?),
        ConnectivityMode::Online => Arc::new(StaticConnectivity::online()),
        ConnectivityMode::Offline => Arc::new(StaticConnectivity::offline()),
    };
    Ok(oracle)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_static_connectivity_is_shared() {
        let oracle = StaticConnectivity::offline();
        let clone = oracle.clone();
        assert!(!clone.is_online().await);

        oracle.set_online(true);
        assert!(clone.is_online().await);
    }

    #[tokio::test]
    async fn test_probe_of_closed_port_is_offline() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let url = Url::parse(&format!("http://{addr}/")).unwrap();
        let probe = HttpProbe::new(url, Duration::from_millis(500)).unwrap();
        assert!(!probe.is_online().await);
    }

    #[tokio::test]
    async fn test_forced_modes() {
        let mut config = SyncConfig::default();
        config.connectivity.mode = ConnectivityMode::Offline;
        assert!(!from_config(&config).unwrap().is_online().await);

        config.connectivity.mode = ConnectivityMode::Online;
        assert!(from_config(&config).unwrap().is_online().await);
    }
}
