//! In-memory master agent for testing.
//!
//! [`MockMaster`] speaks raw AgentX frames over any byte stream, so tests
//! can script exactly what the master sends and inspect what the client
//! wrote, including malformed or out-of-order traffic.

use std::time::Duration;

use bytes::Bytes;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt, BufReader, DuplexStream};

use super::reader::read_packet;
use crate::error::{Error, Result};
use crate::pdu::{HeaderPacket, Pdu, Response};

/// Default maximum payload the mock accepts.
const MOCK_MAX_PAYLOAD: usize = 1024 * 1024;

/// Scriptable master agent.
///
/// # Example
///
/// ```rust,ignore
/// use async_agentx::transport::MockMaster;
/// use async_agentx::{Client, ClientConfig, oid};
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() -> async_agentx::Result<()> {
/// let (stream, mut master) = MockMaster::pair();
/// let client = Client::from_stream(stream, ClientConfig::default());
///
/// let open = tokio::spawn(async move {
///     master.accept_open(42).await.unwrap();
///     master
/// });
/// let session = client
///     .session(oid!(1, 3, 6, 1, 4, 1, 8072), "demo", async_agentx::NullHandler)
///     .await?;
/// assert_eq!(session.id(), 42);
/// # drop(open.await);
/// # Ok(())
/// # }
/// ```
pub struct MockMaster<S = DuplexStream> {
    stream: BufReader<S>,
    sys_uptime: u32,
}

impl MockMaster<DuplexStream> {
    /// Create a connected `(client stream, master)` pair.
    pub fn pair() -> (DuplexStream, Self) {
        let (client, master) = tokio::io::duplex(64 * 1024);
        (client, Self::new(master))
    }
}

impl<S> MockMaster<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Wrap an already-connected stream (e.g. an accepted `TcpStream`).
    pub fn new(stream: S) -> Self {
        Self {
            stream: BufReader::new(stream),
            sys_uptime: 0,
        }
    }

    /// sysUpTime placed in responses built by [`respond`](Self::respond).
    pub fn set_sys_uptime(&mut self, ticks: u32) {
        self.sys_uptime = ticks;
    }

    /// Read the next packet the client sent.
    pub async fn recv(&mut self) -> Result<HeaderPacket> {
        read_packet(&mut self.stream, MOCK_MAX_PAYLOAD).await
    }

    /// Read the next packet, failing with [`Error::Timeout`] after `limit`.
    pub async fn recv_timeout(&mut self, limit: Duration) -> Result<HeaderPacket> {
        tokio::time::timeout(limit, self.recv())
            .await
            .map_err(|_| {
                Error::Timeout {
                    packet_id: 0,
                    elapsed: limit,
                }
                .boxed()
            })?
    }

    /// Encode and send a packet exactly as given.
    pub async fn send(&mut self, packet: &HeaderPacket) -> Result<()> {
        let frame = packet.encode()?;
        self.send_raw(&frame).await
    }

    /// Send raw bytes, bypassing the encoder.
    pub async fn send_raw(&mut self, bytes: &[u8]) -> Result<()> {
        let stream = self.stream.get_mut();
        stream.write_all(bytes).await.map_err(Error::io)?;
        stream.flush().await.map_err(Error::io)
    }

    /// Answer `request` with `response`, copying its ids.
    pub async fn respond(&mut self, request: &HeaderPacket, mut response: Response) -> Result<()> {
        if response.sys_uptime == 0 {
            response.sys_uptime = self.sys_uptime;
        }
        self.send(&request.reply(response)).await
    }

    /// Answer `request` with an empty, successful response.
    pub async fn ack(&mut self, request: &HeaderPacket) -> Result<()> {
        self.respond(request, Response::default()).await
    }

    /// Expect an Open and accept it, assigning `session_id`.
    pub async fn accept_open(&mut self, session_id: u32) -> Result<HeaderPacket> {
        let open = self.recv().await?;
        if !matches!(open.pdu, Pdu::Open(_)) {
            return Err(Error::UnexpectedPdu {
                expected: "Open",
                actual: open.pdu.pdu_type().name(),
            }
            .boxed());
        }
        let mut reply = open.reply(Response {
            sys_uptime: self.sys_uptime,
            ..Response::default()
        });
        reply.header.session_id = session_id;
        self.send(&reply).await?;
        Ok(open)
    }

    /// Send a master-initiated request on `session_id` and return the
    /// client's answer.
    pub async fn query(
        &mut self,
        session_id: u32,
        packet_id: u32,
        pdu: impl Into<Pdu>,
    ) -> Result<HeaderPacket> {
        let mut packet = HeaderPacket::new(pdu).session(session_id);
        packet.header.packet_id = packet_id;
        self.send(&packet).await?;
        self.recv().await
    }

    /// Send a packet with an attached context.
    pub async fn send_with_context(
        &mut self,
        packet: HeaderPacket,
        context: impl Into<Bytes>,
    ) -> Result<()> {
        self.send(&packet.context(context)).await
    }

    /// Consume the master, returning the underlying stream.
    pub fn into_inner(self) -> S {
        self.stream.into_inner()
    }
}
