//! AgentX client.
//!
//! A [`Client`] owns one connection to the master agent. Connecting spawns
//! three tasks (transport reader, transport writer, dispatcher); the
//! client handle itself only sends commands to the dispatcher, so it is
//! cheap to clone and safe to use from many tasks at once.

mod builder;
pub(crate) mod dispatcher;

pub use builder::ClientBuilder;

use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;
use tracing::instrument;

use crate::error::{Error, Result};
use crate::oid::Oid;
use crate::pdu::{HeaderPacket, Timeout};
use crate::session::{Handler, Session};
use crate::transport;
use dispatcher::{Command, Dispatcher};

/// Default per-request timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

/// Default depth of the command, outbound and event queues.
pub const DEFAULT_QUEUE_DEPTH: usize = 64;

/// Default limit on incoming payload size (1 MiB).
pub const DEFAULT_MAX_PAYLOAD_SIZE: usize = 1024 * 1024;

/// Client configuration.
///
/// Most users should use [`ClientBuilder`] rather than constructing this directly.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Per-request timeout, also announced in the Open PDU (default: 5 seconds)
    pub timeout: Duration,
    /// Capacity of the internal queues (default: 64)
    pub queue_depth: usize,
    /// Largest payload accepted from the master (default: 1 MiB)
    pub max_payload_size: usize,
    /// Limit on establishing the connection (default: None)
    pub connect_timeout: Option<Duration>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_TIMEOUT,
            queue_depth: DEFAULT_QUEUE_DEPTH,
            max_payload_size: DEFAULT_MAX_PAYLOAD_SIZE,
            connect_timeout: None,
        }
    }
}

/// AgentX client.
#[derive(Clone)]
pub struct Client {
    inner: Arc<ClientInner>,
}

struct ClientInner {
    commands: mpsc::Sender<Command>,
    cancel: CancellationToken,
    config: ClientConfig,
}

impl Drop for ClientInner {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

impl Client {
    /// Create a new client builder.
    ///
    /// # Example
    ///
    /// ```rust,no_run
    /// use async_agentx::Client;
    /// use std::time::Duration;
    ///
    /// # async fn example() -> async_agentx::Result<()> {
    /// let client = Client::builder("unix:/var/agentx/master")
    ///     .timeout(Duration::from_secs(2))
    ///     .connect()
    ///     .await?;
    /// # Ok(())
    /// # }
    /// ```
    pub fn builder(target: impl Into<String>) -> ClientBuilder {
        ClientBuilder::new(target)
    }

    /// Connect to `target` with default settings.
    pub async fn connect(target: impl Into<String>) -> Result<Client> {
        ClientBuilder::new(target).connect().await
    }

    /// Run the client over an already-connected stream.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn from_stream<S>(stream: S, config: ClientConfig) -> Client
    where
        S: AsyncRead + AsyncWrite + Send + 'static,
    {
        let cancel = CancellationToken::new();
        let transport = transport::spawn(stream, &config, &cancel);
        let (command_tx, command_rx) = mpsc::channel(config.queue_depth);
        let dispatcher = Dispatcher::new(command_rx, transport, config.timeout, cancel.clone());
        tokio::spawn(dispatcher.run());

        Client {
            inner: Arc::new(ClientInner {
                commands: command_tx,
                cancel,
                config,
            }),
        }
    }

    /// The configuration this client runs with.
    pub fn config(&self) -> &ClientConfig {
        &self.inner.config
    }

    /// Tear down the connection.
    ///
    /// Every outstanding and later request fails with
    /// [`Error::ConnectionClosed`].
    pub fn close(&self) {
        tracing::debug!(target: "async_agentx::client", "closing client");
        self.inner.cancel.cancel();
    }

    /// Whether the connection has been closed, locally or by failure.
    pub fn is_closed(&self) -> bool {
        self.inner.cancel.is_cancelled()
    }

    /// Send `packet` and wait for the matching response.
    ///
    /// The packet id is assigned by the dispatcher; whatever the header
    /// carries is overwritten. Fails with [`Error::Timeout`] when no reply
    /// arrives within [`ClientConfig::timeout`].
    pub async fn request(&self, packet: HeaderPacket) -> Result<HeaderPacket> {
        self.submit(packet, None).await
    }

    /// Open a session and route the master's requests for it to `handler`.
    ///
    /// The handler is in place before the Open reply is delivered, so no
    /// request the master sends for the new session goes unanswered.
    #[instrument(level = "debug", skip(self, id, handler), err, fields(agentx.id = %id))]
    pub async fn session(
        &self,
        id: Oid,
        description: &str,
        handler: impl Handler,
    ) -> Result<Session> {
        let timeout = Timeout::saturating_from(self.inner.config.timeout);
        Session::open(self.clone(), id, description, timeout, Box::new(handler)).await
    }

    /// Like [`Client::request`], installing `handler` for the session id of
    /// a successful reply.
    pub(crate) async fn submit(
        &self,
        packet: HeaderPacket,
        handler: Option<Box<dyn Handler>>,
    ) -> Result<HeaderPacket> {
        if self.is_closed() {
            return Err(Error::ConnectionClosed.boxed());
        }
        let (reply_tx, reply_rx) = oneshot::channel();
        self.command(Command::Request {
            packet,
            reply: reply_tx,
            handler,
        })
        .await?;
        reply_rx
            .await
            .map_err(|_| Error::ConnectionClosed.boxed())?
    }

    pub(crate) async fn command(&self, command: Command) -> Result<()> {
        self.inner
            .commands
            .send(command)
            .await
            .map_err(|_| Error::ConnectionClosed.boxed())
    }
}

impl std::fmt::Debug for Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("config", &self.inner.config)
            .field("closed", &self.is_closed())
            .finish()
    }
}
