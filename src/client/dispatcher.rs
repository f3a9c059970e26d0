//! The dispatcher actor.
//!
//! Sole owner of the `packet id -> reply slot` and `session id -> handler`
//! tables. Every mutation happens inside [`Dispatcher::run`], one event at
//! a time, so neither table needs a lock.
//!
//! Packet ids come from a wrapping 32-bit counter. Zero is never used and
//! ids still outstanding are skipped, so a collision needs 2^32 - 1
//! simultaneously outstanding requests.
//!
//! The dispatcher never waits on the writer queue. Packets go to a local
//! backlog that is drained whenever the queue has room, so a stalled peer
//! cannot keep deadlines from firing.

use std::collections::{HashMap, VecDeque};
use std::future::poll_fn;
use std::time::{Duration, Instant};

use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;
use tokio_util::time::{DelayQueue, delay_queue};

use crate::error::{Error, Result};
use crate::pdu::{HeaderPacket, Pdu};
use crate::session::{Handler, SessionHandler};
use crate::transport::{Event, Outbound, TransportHandle, WriteFailure};

/// Requests from the client facade and sessions.
pub(crate) enum Command {
    /// Stamp a packet id on `packet`, send it and deliver the reply.
    ///
    /// With a `handler`, a successful reply also installs it for the
    /// session id the reply carries, before the reply reaches the caller.
    Request {
        packet: HeaderPacket,
        reply: oneshot::Sender<Result<HeaderPacket>>,
        handler: Option<Box<dyn Handler>>,
    },
    RemoveSession {
        session_id: u32,
    },
}

struct Pending {
    reply: oneshot::Sender<Result<HeaderPacket>>,
    deadline: delay_queue::Key,
    sent_at: Instant,
    handler: Option<Box<dyn Handler>>,
}

pub(crate) struct Dispatcher {
    commands: mpsc::Receiver<Command>,
    events: mpsc::Receiver<Event>,
    failures: mpsc::UnboundedReceiver<WriteFailure>,
    outbound: mpsc::Sender<Outbound>,
    backlog: VecDeque<Outbound>,
    pending: HashMap<u32, Pending>,
    sessions: HashMap<u32, SessionHandler>,
    deadlines: DelayQueue<u32>,
    next_packet_id: u32,
    timeout: Duration,
    cancel: CancellationToken,
}

impl Dispatcher {
    pub(crate) fn new(
        commands: mpsc::Receiver<Command>,
        transport: TransportHandle,
        timeout: Duration,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            commands,
            events: transport.events,
            failures: transport.failures,
            outbound: transport.outbound,
            backlog: VecDeque::new(),
            pending: HashMap::new(),
            sessions: HashMap::new(),
            deadlines: DelayQueue::new(),
            next_packet_id: 1,
            timeout,
            cancel,
        }
    }

    /// Run until the connection fails, the client is closed, or every
    /// client handle is dropped.
    pub(crate) async fn run(mut self) {
        let reason = loop {
            let outbound = self.outbound.clone();
            tokio::select! {
                _ = self.cancel.cancelled() => break Error::ConnectionClosed.boxed(),
                permit = outbound.reserve(), if !self.backlog.is_empty() => match permit {
                    Ok(permit) => {
                        if let Some(outbound) = self.backlog.pop_front() {
                            permit.send(outbound);
                        }
                    }
                    Err(_) => break Error::ConnectionClosed.boxed(),
                },
                command = self.commands.recv() => match command {
                    Some(command) => self.handle_command(command),
                    None => break Error::ConnectionClosed.boxed(),
                },
                Some(failure) = self.failures.recv() => self.fail(failure),
                event = self.events.recv() => match event {
                    Some(Event::Packet(packet)) => self.route(packet),
                    Some(Event::Closed(error)) => break error,
                    None => break Error::ConnectionClosed.boxed(),
                },
                Some(expired) = poll_fn(|cx| self.deadlines.poll_expired(cx)), if !self.deadlines.is_empty() => {
                    self.expire(expired.into_inner());
                }
            }
        };
        self.shutdown(&reason);
    }

    fn allocate_packet_id(&mut self) -> u32 {
        loop {
            let id = self.next_packet_id;
            self.next_packet_id = self.next_packet_id.wrapping_add(1);
            if id != 0 && !self.pending.contains_key(&id) {
                return id;
            }
        }
    }

    fn handle_command(&mut self, command: Command) {
        match command {
            Command::Request {
                mut packet,
                reply,
                handler,
            } => {
                if reply.is_closed() {
                    return;
                }
                let packet_id = self.allocate_packet_id();
                packet.header.packet_id = packet_id;
                let deadline = self.deadlines.insert(packet_id, self.timeout);
                self.pending.insert(
                    packet_id,
                    Pending {
                        reply,
                        deadline,
                        sent_at: Instant::now(),
                        handler,
                    },
                );
                tracing::trace!(
                    target: "async_agentx::dispatcher",
                    {
                        agentx.packet_id = packet_id,
                        agentx.session_id = packet.header.session_id,
                        agentx.pdu_type = %packet.pdu.pdu_type(),
                        agentx.outstanding = self.pending.len(),
                        backlog = self.backlog.len(),
                    },
                    "request queued"
                );
                self.backlog.push_back(Outbound {
                    packet,
                    tracked: true,
                });
            }
            Command::RemoveSession { session_id } => {
                if self.sessions.remove(&session_id).is_some() {
                    tracing::debug!(target: "async_agentx::dispatcher", { agentx.session_id = session_id }, "session removed");
                }
            }
        }
    }

    /// Deliver to the pending slot for `packet_id`, if any.
    fn complete(&mut self, packet_id: u32, result: Result<HeaderPacket>) -> bool {
        let Some(pending) = self.pending.remove(&packet_id) else {
            return false;
        };
        self.deadlines.try_remove(&pending.deadline);
        if let (Some(handler), Ok(reply)) = (pending.handler, &result) {
            if matches!(&reply.pdu, Pdu::Response(response) if !response.is_error()) {
                let session_id = reply.header.session_id;
                tracing::debug!(target: "async_agentx::dispatcher", { agentx.session_id = session_id }, "session added");
                self.sessions
                    .insert(session_id, SessionHandler::new(session_id, handler));
            }
        }
        // The caller may have stopped waiting; nothing to do then.
        let _ = pending.reply.send(result);
        true
    }

    fn route(&mut self, packet: HeaderPacket) {
        let packet_id = packet.header.packet_id;
        let session_id = packet.header.session_id;

        // Master-initiated requests carry the master's own packet ids, so
        // only responses are matched against our reply slots.
        if matches!(packet.pdu, Pdu::Response(_)) {
            if !self.complete(packet_id, Ok(packet)) {
                tracing::debug!(
                    target: "async_agentx::dispatcher",
                    { agentx.packet_id = packet_id, agentx.session_id = session_id },
                    "unroutable response (late or duplicate), dropping"
                );
            }
            return;
        }

        if let Pdu::Close(close) = &packet.pdu {
            if self.sessions.remove(&session_id).is_some() {
                tracing::info!(
                    target: "async_agentx::dispatcher",
                    { agentx.session_id = session_id, reason = %close.reason },
                    "master closed session"
                );
            } else {
                tracing::warn!(
                    target: "async_agentx::dispatcher",
                    { agentx.session_id = session_id },
                    "Close for unknown session, dropping"
                );
            }
            return;
        }

        let Some(session) = self.sessions.get_mut(&session_id) else {
            tracing::warn!(
                target: "async_agentx::dispatcher",
                {
                    agentx.packet_id = packet_id,
                    agentx.session_id = session_id,
                    agentx.pdu_type = %packet.pdu.pdu_type(),
                },
                "packet has no owner, dropping"
            );
            return;
        };

        if let Some(reply) = session.handle(&packet) {
            self.backlog.push_back(Outbound {
                packet: reply,
                tracked: false,
            });
        }
    }

    fn fail(&mut self, failure: WriteFailure) {
        self.complete(failure.packet_id, Err(failure.error));
    }

    fn expire(&mut self, packet_id: u32) {
        // The key already left the queue, so only the slot is removed.
        if let Some(pending) = self.pending.remove(&packet_id) {
            let elapsed = pending.sent_at.elapsed();
            tracing::debug!(
                target: "async_agentx::dispatcher",
                { agentx.packet_id = packet_id, elapsed_ms = elapsed.as_millis() as u64 },
                "request timed out"
            );
            // Not written yet: the id may be reused, so the packet must not go out.
            self.backlog
                .retain(|o| !(o.tracked && o.packet.header.packet_id == packet_id));
            let _ = pending.reply.send(Err(Error::Timeout { packet_id, elapsed }.boxed()));
        }
    }

    /// Fail everything still waiting and stop the transport tasks.
    fn shutdown(&mut self, reason: &Error) {
        if matches!(reason, Error::ConnectionClosed) {
            tracing::debug!(target: "async_agentx::dispatcher", { outstanding = self.pending.len() }, "dispatcher stopping");
        } else {
            tracing::warn!(
                target: "async_agentx::dispatcher",
                { error = %reason, outstanding = self.pending.len() },
                "connection failed, dispatcher stopping"
            );
        }
        self.cancel.cancel();
        self.deadlines.clear();
        self.backlog.clear();
        for (_, pending) in self.pending.drain() {
            let _ = pending.reply.send(Err(Error::ConnectionClosed.boxed()));
        }
        self.sessions.clear();

        self.commands.close();
        while let Ok(command) = self.commands.try_recv() {
            if let Command::Request { reply, .. } = command {
                let _ = reply.send(Err(Error::ConnectionClosed.boxed()));
            }
        }
    }
}
