//! Online check performed before a submission is allowed to start.

use async_trait::async_trait;
use std::time::Duration;
use tokio::net::TcpStream;

use crate::config::Config;

#[async_trait]
pub trait Connectivity: Send + Sync {
    async fn is_online(&self) -> bool;
}

/// Considers the host online when a TCP connection to the probe endpoint opens in time.
#[derive(Debug, Clone)]
pub struct TcpProbe {
    host: String,
    port: u16,
    timeout: Duration,
}

impl TcpProbe {
    pub fn new(host: impl Into<String>, port: u16, timeout: Duration) -> Self {
        Self {
            host: host.into(),
            port,
            timeout,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(
            config.pipeline.probe_host.clone(),
            config.pipeline.probe_port,
            config.timeouts.connectivity,
        )
    }
}

#[async_trait]
impl Connectivity for TcpProbe {
    async fn is_online(&self) -> bool {
        let target = (self.host.as_str(), self.port);
        match tokio::time::timeout(self.timeout, TcpStream::connect(target)).await {
            Ok(Ok(_)) => true,
            Ok(Err(e)) => {
                tracing::debug!(host = %self.host, port = self.port, error = %e, "connectivity probe failed");
                false
            }
            Err(_) => {
                tracing::debug!(host = %self.host, port = self.port, "connectivity probe timed out");
                false
            }
        }
    }
}

/// Fixed answer, for hosts that have no way to probe.
#[derive(Debug, Clone, Copy)]
pub struct AssumeOnline(pub bool);

#[async_trait]
impl Connectivity for AssumeOnline {
    async fn is_online(&self) -> bool {
        self.0
    }
}
