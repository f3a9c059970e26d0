//! Connection transport.
//!
//! One physical connection is split into a read half and a write half, each
//! owned by its own task:
//!
//! - the [`reader`] frames incoming bytes into [`HeaderPacket`]s and hands
//!   them to the dispatcher as [`Event`]s;
//! - the [`writer`] encodes [`Outbound`] packets and flushes them in
//!   submission order.
//!
//! Neither task touches the correlation tables; they only talk to the
//! dispatcher over channels.

pub(crate) mod reader;
pub(crate) mod writer;

#[cfg(any(test, feature = "testing"))]
mod mock;

#[cfg(any(test, feature = "testing"))]
pub use mock::*;

use std::fmt;
use std::future::Future;
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncWrite, BufReader, BufWriter};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::client::ClientConfig;
use crate::error::{Error, Result};
use crate::pdu::HeaderPacket;

/// Something the reader observed on the connection.
#[derive(Debug)]
pub(crate) enum Event {
    /// A complete, decoded packet.
    Packet(HeaderPacket),
    /// The connection is unusable; the reader has stopped.
    Closed(Box<Error>),
}

/// A packet queued for the writer.
#[derive(Debug)]
pub(crate) struct Outbound {
    pub packet: HeaderPacket,
    /// Whether a reply slot waits on this packet id. Failures of untracked
    /// packets (replies to the master) are only logged.
    pub tracked: bool,
}

/// The writer could not put one item on the wire.
#[derive(Debug)]
pub(crate) struct WriteFailure {
    pub packet_id: u32,
    pub error: Box<Error>,
}

/// Channel ends the dispatcher uses to drive a spawned transport.
pub(crate) struct TransportHandle {
    pub outbound: mpsc::Sender<Outbound>,
    pub events: mpsc::Receiver<Event>,
    pub failures: mpsc::UnboundedReceiver<WriteFailure>,
}

/// Split `stream` and spawn the reader and writer tasks.
///
/// Both tasks stop when `cancel` fires.
pub(crate) fn spawn<S>(stream: S, config: &ClientConfig, cancel: &CancellationToken) -> TransportHandle
where
    S: AsyncRead + AsyncWrite + Send + 'static,
{
    let (read_half, write_half) = tokio::io::split(stream);
    let (outbound_tx, outbound_rx) = mpsc::channel(config.queue_depth);
    let (event_tx, event_rx) = mpsc::channel(config.queue_depth);
    let (failure_tx, failure_rx) = mpsc::unbounded_channel();

    tokio::spawn(reader::run(
        BufReader::new(read_half),
        config.max_payload_size,
        event_tx,
        cancel.clone(),
    ));
    tokio::spawn(writer::run(
        BufWriter::new(write_half),
        outbound_rx,
        failure_tx,
        cancel.clone(),
    ));

    TransportHandle {
        outbound: outbound_tx,
        events: event_rx,
        failures: failure_rx,
    }
}

/// Where the master agent listens.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    /// `host:port` over TCP.
    Tcp(String),
    /// Unix domain socket path (net-snmp's default is `/var/agentx/master`).
    Unix(std::path::PathBuf),
}

impl Target {
    /// Parse `tcp:host:port`, `unix:/path`, or a bare `host:port`.
    pub fn parse(target: &str) -> Result<Self> {
        if let Some(path) = target.strip_prefix("unix:") {
            if path.is_empty() {
                return Err(Error::Config("unix target needs a socket path".into()).boxed());
            }
            return Ok(Target::Unix(path.into()));
        }
        let addr = target.strip_prefix("tcp:").unwrap_or(target);
        if addr.is_empty() || !addr.contains(':') {
            return Err(Error::Config(format!("invalid target address: {}", target).into()).boxed());
        }
        Ok(Target::Tcp(addr.to_string()))
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Target::Tcp(addr) => write!(f, "tcp:{}", addr),
            Target::Unix(path) => write!(f, "unix:{}", path.display()),
        }
    }
}

async fn with_connect_timeout<T>(
    connect_timeout: Option<Duration>,
    fut: impl Future<Output = std::io::Result<T>>,
) -> Result<T> {
    let result = match connect_timeout {
        Some(limit) => tokio::time::timeout(limit, fut).await.map_err(|_| {
            Error::io(std::io::Error::new(
                std::io::ErrorKind::TimedOut,
                format!("connect timed out after {:?}", limit),
            ))
        })?,
        None => fut.await,
    };
    result.map_err(Error::io)
}

/// Open a TCP connection to the master.
pub(crate) async fn connect_tcp(addr: &str, connect_timeout: Option<Duration>) -> Result<TcpStream> {
    let stream = with_connect_timeout(connect_timeout, TcpStream::connect(addr)).await?;
    if let Err(e) = stream.set_nodelay(true) {
        tracing::debug!(target: "async_agentx::transport", { error = %e }, "failed to set TCP_NODELAY");
    }
    Ok(stream)
}

/// Open a Unix domain socket connection to the master.
#[cfg(unix)]
pub(crate) async fn connect_unix(
    path: &std::path::Path,
    connect_timeout: Option<Duration>,
) -> Result<tokio::net::UnixStream> {
    with_connect_timeout(connect_timeout, tokio::net::UnixStream::connect(path)).await
}
