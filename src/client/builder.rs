//! Client builder.
//!
//! [`ClientBuilder`] resolves a target string and connection options into a
//! running [`Client`].

use std::time::Duration;

use crate::client::{
    Client, ClientConfig, DEFAULT_MAX_PAYLOAD_SIZE, DEFAULT_QUEUE_DEPTH, DEFAULT_TIMEOUT,
};
use crate::error::{Error, Result};
use crate::pdu::HEADER_SIZE;
use crate::transport::{self, Target};

/// Builder for constructing AgentX clients.
///
/// # Example
///
/// ```rust,no_run
/// use async_agentx::ClientBuilder;
/// use std::time::Duration;
///
/// # async fn example() -> async_agentx::Result<()> {
/// let client = ClientBuilder::new("tcp:localhost:705")
///     .timeout(Duration::from_secs(10))
///     .connect_timeout(Duration::from_secs(2))
///     .connect()
///     .await?;
/// # Ok(())
/// # }
/// ```
pub struct ClientBuilder {
    target: String,
    timeout: Duration,
    queue_depth: usize,
    max_payload_size: usize,
    connect_timeout: Option<Duration>,
}

impl ClientBuilder {
    /// Create a new client builder.
    ///
    /// `target` is `tcp:host:port`, `unix:/path/to/socket`, or a bare
    /// `host:port` (TCP).
    pub fn new(target: impl Into<String>) -> Self {
        Self {
            target: target.into(),
            timeout: DEFAULT_TIMEOUT,
            queue_depth: DEFAULT_QUEUE_DEPTH,
            max_payload_size: DEFAULT_MAX_PAYLOAD_SIZE,
            connect_timeout: None,
        }
    }

    /// Set the per-request timeout (default: 5 seconds).
    ///
    /// The whole seconds (capped at 255) are also sent to the master as the
    /// session timeout when a session is opened.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the depth of the internal queues (default: 64).
    pub fn queue_depth(mut self, depth: usize) -> Self {
        self.queue_depth = depth;
        self
    }

    /// Set the largest payload accepted from the master (default: 1 MiB).
    ///
    /// A larger announced payload is treated as a framing failure and
    /// closes the connection.
    pub fn max_payload_size(mut self, size: usize) -> Self {
        self.max_payload_size = size;
        self
    }

    /// Limit how long establishing the connection may take.
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = Some(timeout);
        self
    }

    /// Validate the settings and produce the configuration.
    pub fn build_config(&self) -> Result<ClientConfig> {
        if self.timeout.is_zero() {
            return Err(Error::Config("timeout must be greater than zero".into()).boxed());
        }
        if self.queue_depth == 0 {
            return Err(Error::Config("queue_depth must be greater than zero".into()).boxed());
        }
        if self.max_payload_size < HEADER_SIZE {
            return Err(Error::Config(
                format!("max_payload_size must be at least {} bytes", HEADER_SIZE).into(),
            )
            .boxed());
        }
        Ok(ClientConfig {
            timeout: self.timeout,
            queue_depth: self.queue_depth,
            max_payload_size: self.max_payload_size,
            connect_timeout: self.connect_timeout,
        })
    }

    /// Connect to the master and start the client.
    pub async fn connect(self) -> Result<Client> {
        let config = self.build_config()?;
        let target = Target::parse(&self.target)?;
        tracing::debug!(target: "async_agentx::client", { agentx.target = %target }, "connecting");

        match target {
            Target::Tcp(addr) => {
                let stream = transport::connect_tcp(&addr, config.connect_timeout).await?;
                Ok(Client::from_stream(stream, config))
            }
            #[cfg(unix)]
            Target::Unix(path) => {
                let stream = transport::connect_unix(&path, config.connect_timeout).await?;
                Ok(Client::from_stream(stream, config))
            }
            #[cfg(not(unix))]
            Target::Unix(path) => Err(Error::Config(
                format!("unix sockets unsupported on this platform: {}", path.display()).into(),
            )
            .boxed()),
        }
    }
}
