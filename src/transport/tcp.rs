//! TCP transport for the WCS -> LCU command link

use anyhow::{Context, Result};
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::time::timeout;
use tracing::debug;

/// Bound on connection establishment
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// TCP connector for the LCU command port
#[derive(Debug, Clone)]
pub struct TcpConnector {
    address: String,
    connect_timeout: Duration,
}

impl TcpConnector {
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
        }
    }

    pub fn with_connect_timeout(mut self, connect_timeout: Duration) -> Self {
        self.connect_timeout = connect_timeout;
        self
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    /// Open the link
    ///
    /// Refused, unreachable and timed out connections are all errors; there
    /// is no retry.
    pub async fn connect(&self) -> Result<TcpStream> {
        let stream = timeout(self.connect_timeout, TcpStream::connect(&self.address))
            .await
            .with_context(|| format!("Timed out connecting to LCU at {}", self.address))?
            .with_context(|| format!("Failed to connect to LCU at {}", self.address))?;

        // Frames are small and written whole; don't let Nagle hold them back
        stream.set_nodelay(true)?;
        debug!("TCP link open: {:?} -> {:?}", stream.local_addr(), stream.peer_addr());

        Ok(stream)
    }
}
