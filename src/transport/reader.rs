//! Read half: frames the byte stream into packets.

use bytes::BytesMut;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use super::Event;
use crate::error::{Error, Result};
use crate::pdu::{HEADER_SIZE, Header, HeaderPacket};
use crate::util::HexBytes;

/// Read exactly one frame.
///
/// A clean EOF before the first header byte is [`Error::ConnectionClosed`].
/// An unknown type code yields [`Error::UnsupportedType`] with the body
/// already consumed, so the stream is still framed.
pub(crate) async fn read_packet<R>(reader: &mut R, max_payload_size: usize) -> Result<HeaderPacket>
where
    R: AsyncRead + Unpin,
{
    let mut header_buf = [0u8; HEADER_SIZE];
    let n = reader.read(&mut header_buf).await.map_err(Error::io)?;
    if n == 0 {
        return Err(Error::ConnectionClosed.boxed());
    }
    reader
        .read_exact(&mut header_buf[n..])
        .await
        .map_err(Error::io)?;

    let header = Header::decode(&header_buf)?;
    let payload_length = header.payload_length as usize;
    if payload_length > max_payload_size {
        tracing::warn!(
            target: "async_agentx::transport",
            { agentx.packet_id = header.packet_id, size = payload_length, max = max_payload_size },
            "payload exceeds maximum"
        );
        return Err(Error::PayloadTooLarge {
            size: payload_length,
            max: max_payload_size,
        }
        .boxed());
    }

    let mut body = BytesMut::zeroed(payload_length);
    reader.read_exact(&mut body).await.map_err(Error::io)?;
    tracing::trace!(
        target: "async_agentx::transport",
        { agentx.packet_id = header.packet_id, header = %HexBytes(&header_buf), body = %HexBytes(&body) },
        "frame received"
    );

    HeaderPacket::decode(header, body.freeze())
}

/// Reader task: forward packets to the dispatcher until the connection
/// fails or `cancel` fires.
pub(crate) async fn run<R>(
    mut reader: R,
    max_payload_size: usize,
    events: mpsc::Sender<Event>,
    cancel: CancellationToken,
) where
    R: AsyncRead + Unpin,
{
    loop {
        let result = tokio::select! {
            _ = cancel.cancelled() => break,
            result = read_packet(&mut reader, max_payload_size) => result,
        };

        let event = match result {
            Ok(packet) => {
                tracing::debug!(
                    target: "async_agentx::transport",
                    {
                        agentx.pdu_type = %packet.pdu.pdu_type(),
                        agentx.session_id = packet.header.session_id,
                        agentx.packet_id = packet.header.packet_id,
                    },
                    "packet received"
                );
                Event::Packet(packet)
            }
            Err(e) if matches!(*e, Error::UnsupportedType(_)) => {
                tracing::warn!(target: "async_agentx::transport", { error = %e }, "skipping unhandled packet");
                continue;
            }
            Err(e) => {
                tracing::warn!(target: "async_agentx::transport", { error = %e }, "connection lost");
                let _ = events.send(Event::Closed(e)).await;
                break;
            }
        };

        if events.send(event).await.is_err() {
            break;
        }
    }
    tracing::debug!(target: "async_agentx::transport", "reader stopped");
}
