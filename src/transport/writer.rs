//! Write half: encodes and flushes packets in submission order.

use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use super::{Outbound, WriteFailure};
use crate::error::{Error, Result};

async fn write_packet<W>(writer: &mut W, outbound: &Outbound) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    let frame = outbound.packet.encode()?;
    writer.write_all(&frame).await.map_err(Error::io)?;
    writer.flush().await.map_err(Error::io)
}

/// Writer task.
///
/// A failed item is reported and skipped; the queue keeps draining.
pub(crate) async fn run<W>(
    mut writer: W,
    mut queue: mpsc::Receiver<Outbound>,
    failures: mpsc::UnboundedSender<WriteFailure>,
    cancel: CancellationToken,
) where
    W: AsyncWrite + Unpin,
{
    loop {
        let outbound = tokio::select! {
            _ = cancel.cancelled() => break,
            item = queue.recv() => match item {
                Some(outbound) => outbound,
                None => break,
            },
        };

        let packet_id = outbound.packet.header.packet_id;
        match write_packet(&mut writer, &outbound).await {
            Ok(()) => {
                tracing::debug!(
                    target: "async_agentx::transport",
                    {
                        agentx.pdu_type = %outbound.packet.pdu.pdu_type(),
                        agentx.session_id = outbound.packet.header.session_id,
                        agentx.packet_id = packet_id,
                    },
                    "packet sent"
                );
            }
            Err(error) => {
                tracing::warn!(
                    target: "async_agentx::transport",
                    { agentx.packet_id = packet_id, error = %error },
                    "failed to send packet"
                );
                if outbound.tracked {
                    let _ = failures.send(WriteFailure { packet_id, error });
                }
            }
        }
    }

    if let Err(e) = writer.shutdown().await {
        tracing::debug!(target: "async_agentx::transport", { error = %e }, "shutdown of write half failed");
    }
    tracing::debug!(target: "async_agentx::transport", "writer stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::oid::Oid;
    use crate::pdu::{HeaderPacket, Pdu, Response};
    use crate::transport::reader::read_packet;
    use crate::varbind::VarBind;

    fn outbound(packet_id: u32, pdu: Pdu) -> Outbound {
        let mut packet = HeaderPacket::new(pdu);
        packet.header.packet_id = packet_id;
        Outbound {
            packet,
            tracked: true,
        }
    }

    #[tokio::test]
    async fn test_writes_in_order_and_skips_bad_items() {
        let (client, mut server) = tokio::io::duplex(4096);
        let (queue_tx, queue_rx) = mpsc::channel(8);
        let (failures_tx, mut failures_rx) = mpsc::unbounded_channel();
        let cancel = CancellationToken::new();
        tokio::spawn(run(client, queue_rx, failures_tx, cancel.clone()));

        // 200 sub-identifiers cannot be encoded
        let bad = Response::new(vec![VarBind::null(Oid::new(0..200))]);

        queue_tx.send(outbound(1, Pdu::Ping)).await.unwrap();
        queue_tx.send(outbound(2, Pdu::Response(bad))).await.unwrap();
        queue_tx.send(outbound(3, Pdu::Ping)).await.unwrap();

        let first = read_packet(&mut server, 1024).await.unwrap();
        let second = read_packet(&mut server, 1024).await.unwrap();
        assert_eq!(first.header.packet_id, 1);
        assert_eq!(second.header.packet_id, 3);

        let failure = failures_rx.recv().await.unwrap();
        assert_eq!(failure.packet_id, 2);
        assert!(matches!(*failure.error, Error::Encode { .. }));
        cancel.cancel();
    }

    #[tokio::test]
    async fn test_untracked_failures_are_not_reported() {
        let (client, _server) = tokio::io::duplex(4096);
        let (queue_tx, queue_rx) = mpsc::channel(8);
        let (failures_tx, mut failures_rx) = mpsc::unbounded_channel();
        let task = tokio::spawn(run(client, queue_rx, failures_tx, CancellationToken::new()));

        let mut item = outbound(5, Pdu::Ping);
        item.packet.context = Some(bytes::Bytes::from_static(b"ctx"));
        item.packet.pdu = Pdu::CommitSet;
        item.tracked = false;
        queue_tx.send(item).await.unwrap();
        drop(queue_tx);

        task.await.unwrap();
        assert!(failures_rx.recv().await.is_none());
    }
}
