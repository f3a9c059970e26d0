//! Answering master-initiated requests.
//!
//! The dispatcher hands every Get, GetNext, GetBulk and set-phase PDU for a
//! session to that session's [`SessionHandler`], which calls into the
//! user's [`Handler`] and builds the Response. Handlers run on the
//! dispatcher task, so they must not block.

use std::panic::{self, AssertUnwindSafe};

use bytes::Bytes;

use crate::error::ErrorStatus;
use crate::oid::Oid;
use crate::pdu::{GetBulk, HeaderPacket, Pdu, PduType, Response, SearchRange};
use crate::value::Value;
use crate::varbind::VarBind;

/// Details of the request a handler is answering.
#[derive(Debug, Clone)]
pub struct RequestContext {
    pub session_id: u32,
    pub transaction_id: u32,
    pub packet_id: u32,
    pub pdu_type: PduType,
    /// Non-default context, if the master sent one.
    pub context: Option<Bytes>,
}

impl RequestContext {
    fn from_packet(packet: &HeaderPacket) -> Self {
        Self {
            session_id: packet.header.session_id,
            transaction_id: packet.header.transaction_id,
            packet_id: packet.header.packet_id,
            pdu_type: packet.pdu.pdu_type(),
            context: packet.context.clone(),
        }
    }
}

/// Result of a Get for one OID.
#[derive(Debug, Clone, PartialEq)]
pub enum GetResult {
    Value(Value),
    NoSuchObject,
    NoSuchInstance,
}

/// Result of a GetNext within one search range.
#[derive(Debug, Clone, PartialEq)]
pub enum GetNextResult {
    Value(VarBind),
    EndOfMibView,
}

/// Result of a set phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SetResult {
    Ok,
    Err(ErrorStatus),
}

/// Serves the subtrees a session registered.
///
/// Only [`get`](Handler::get) and [`get_next`](Handler::get_next) are
/// required. The set hooks default to refusing writes.
///
/// # Example
///
/// ```rust
/// use async_agentx::session::{GetNextResult, GetResult, Handler, RequestContext};
/// use async_agentx::pdu::SearchRange;
/// use async_agentx::{Oid, Value, VarBind, oid};
///
/// struct Uptime(u32);
///
/// impl Handler for Uptime {
///     fn get(&mut self, _ctx: &RequestContext, oid: &Oid) -> GetResult {
///         if oid == &oid!(1, 3, 6, 1, 4, 1, 8072, 9999, 1, 0) {
///             GetResult::Value(Value::TimeTicks(self.0))
///         } else {
///             GetResult::NoSuchObject
///         }
///     }
///
///     fn get_next(&mut self, _ctx: &RequestContext, range: &SearchRange) -> GetNextResult {
///         let only = oid!(1, 3, 6, 1, 4, 1, 8072, 9999, 1, 0);
///         if range.contains(&only) {
///             GetNextResult::Value(VarBind::new(only, Value::TimeTicks(self.0)))
///         } else {
///             GetNextResult::EndOfMibView
///         }
///     }
/// }
/// ```
pub trait Handler: Send + 'static {
    /// Value of exactly `oid`.
    fn get(&mut self, ctx: &RequestContext, oid: &Oid) -> GetResult;

    /// First object inside `range` in lexicographic order.
    ///
    /// Results outside the range are replaced by endOfMibView.
    fn get_next(&mut self, ctx: &RequestContext, range: &SearchRange) -> GetNextResult;

    /// Validate one varbind of a TestSet. Called once per varbind, in order.
    fn test_set(&mut self, _ctx: &RequestContext, _varbind: &VarBind) -> SetResult {
        SetResult::Err(ErrorStatus::NotWritable)
    }

    /// Apply the varbinds that passed `test_set`.
    fn commit_set(&mut self, _ctx: &RequestContext, _varbinds: &[VarBind]) -> SetResult {
        SetResult::Ok
    }

    /// Revert a commit.
    fn undo_set(&mut self, _ctx: &RequestContext, _varbinds: &[VarBind]) -> SetResult {
        SetResult::Ok
    }

    /// Release anything held since `test_set`.
    fn cleanup_set(&mut self, _ctx: &RequestContext) {}
}

/// Handler that serves nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullHandler;

impl Handler for NullHandler {
    fn get(&mut self, _ctx: &RequestContext, _oid: &Oid) -> GetResult {
        GetResult::NoSuchObject
    }

    fn get_next(&mut self, _ctx: &RequestContext, _range: &SearchRange) -> GetNextResult {
        GetNextResult::EndOfMibView
    }
}

/// Set transaction in progress between TestSet and CleanupSet.
struct SetTransaction {
    transaction_id: u32,
    varbinds: Vec<VarBind>,
}

/// Per-session responder owned by the dispatcher.
pub struct SessionHandler {
    session_id: u32,
    handler: Box<dyn Handler>,
    set: Option<SetTransaction>,
}

impl SessionHandler {
    pub(crate) fn new(session_id: u32, handler: Box<dyn Handler>) -> Self {
        Self {
            session_id,
            handler,
            set: None,
        }
    }

    /// Build the reply to a master-initiated packet.
    ///
    /// Returns `None` only for CleanupSet, which RFC 2741 leaves
    /// unanswered. A panic in the user's handler is answered with
    /// `processingError` and abandons any set transaction in progress.
    pub fn handle(&mut self, packet: &HeaderPacket) -> Option<HeaderPacket> {
        let ctx = RequestContext::from_packet(packet);
        tracing::debug!(
            target: "async_agentx::session",
            {
                agentx.session_id = self.session_id,
                agentx.transaction_id = ctx.transaction_id,
                agentx.packet_id = ctx.packet_id,
                agentx.pdu_type = %ctx.pdu_type,
            },
            "handling master request"
        );

        let response = match panic::catch_unwind(AssertUnwindSafe(|| self.respond(&ctx, packet))) {
            Ok(response) => response?,
            Err(_) => {
                tracing::error!(
                    target: "async_agentx::session",
                    { agentx.session_id = self.session_id, agentx.pdu_type = %ctx.pdu_type },
                    "handler panicked"
                );
                self.set = None;
                Response::error(ErrorStatus::ProcessingError, 0)
            }
        };
        Some(packet.reply(response))
    }

    fn respond(&mut self, ctx: &RequestContext, packet: &HeaderPacket) -> Option<Response> {
        let response = match &packet.pdu {
            Pdu::Get(get) => Response::new(
                get.ranges
                    .iter()
                    .map(|range| self.get(ctx, &range.start))
                    .collect(),
            ),
            Pdu::GetNext(get_next) => Response::new(
                get_next
                    .ranges
                    .iter()
                    .map(|range| self.get_next(ctx, range))
                    .collect(),
            ),
            Pdu::GetBulk(get_bulk) => Response::new(self.get_bulk(ctx, get_bulk)),
            Pdu::TestSet(test_set) => self.test_set(ctx, &test_set.varbinds),
            Pdu::CommitSet => self.set_phase(ctx, ErrorStatus::CommitFailed, |h, ctx, vbs| {
                h.commit_set(ctx, vbs)
            }),
            Pdu::UndoSet => self.set_phase(ctx, ErrorStatus::UndoFailed, |h, ctx, vbs| {
                h.undo_set(ctx, vbs)
            }),
            Pdu::CleanupSet => {
                self.handler.cleanup_set(ctx);
                self.set = None;
                return None;
            }
            other => {
                tracing::warn!(
                    target: "async_agentx::session",
                    { agentx.session_id = self.session_id, agentx.pdu_type = %other.pdu_type() },
                    "unsupported request from master"
                );
                Response::error(ErrorStatus::ProcessingError, 0)
            }
        };
        Some(response)
    }

    fn get(&mut self, ctx: &RequestContext, oid: &Oid) -> VarBind {
        let value = match self.handler.get(ctx, oid) {
            GetResult::Value(value) => value,
            GetResult::NoSuchObject => Value::NoSuchObject,
            GetResult::NoSuchInstance => Value::NoSuchInstance,
        };
        VarBind::new(oid.clone(), value)
    }

    fn get_next(&mut self, ctx: &RequestContext, range: &SearchRange) -> VarBind {
        match self.handler.get_next(ctx, range) {
            GetNextResult::Value(vb) if range.contains(&vb.oid) => vb,
            GetNextResult::Value(vb) => {
                tracing::debug!(
                    target: "async_agentx::session",
                    { oid = %vb.oid, start = %range.start, end = %range.end },
                    "handler returned OID outside search range"
                );
                VarBind::new(range.start.clone(), Value::EndOfMibView)
            }
            GetNextResult::EndOfMibView => VarBind::new(range.start.clone(), Value::EndOfMibView),
        }
    }

    /// RFC 2741 §7.2.3.2: one GetNext per non-repeater, then up to
    /// `max_repetitions` rows over the remaining ranges.
    fn get_bulk(&mut self, ctx: &RequestContext, pdu: &GetBulk) -> Vec<VarBind> {
        let non_repeaters = (pdu.non_repeaters as usize).min(pdu.ranges.len());
        let (singles, repeaters) = pdu.ranges.split_at(non_repeaters);

        let mut varbinds: Vec<VarBind> = singles
            .iter()
            .map(|range| self.get_next(ctx, range))
            .collect();

        let mut cursors: Vec<SearchRange> = repeaters.to_vec();
        let mut done = vec![false; cursors.len()];
        for _ in 0..pdu.max_repetitions {
            let mut row_complete = true;
            for (cursor, done) in cursors.iter_mut().zip(done.iter_mut()) {
                if *done {
                    varbinds.push(VarBind::new(cursor.start.clone(), Value::EndOfMibView));
                    continue;
                }
                let vb = self.get_next(ctx, cursor);
                if vb.value == Value::EndOfMibView {
                    *done = true;
                } else {
                    cursor.start = vb.oid.clone();
                    cursor.include = false;
                    row_complete = false;
                }
                varbinds.push(vb);
            }
            if row_complete {
                break;
            }
        }
        varbinds
    }

    fn test_set(&mut self, ctx: &RequestContext, varbinds: &[VarBind]) -> Response {
        for (i, vb) in varbinds.iter().enumerate() {
            if let SetResult::Err(status) = self.handler.test_set(ctx, vb) {
                return Response::error(status, index_of(i));
            }
        }
        self.set = Some(SetTransaction {
            transaction_id: ctx.transaction_id,
            varbinds: varbinds.to_vec(),
        });
        Response::default()
    }

    fn set_phase<F>(&mut self, ctx: &RequestContext, failure: ErrorStatus, phase: F) -> Response
    where
        F: FnOnce(&mut dyn Handler, &RequestContext, &[VarBind]) -> SetResult,
    {
        let Some(set) = self
            .set
            .as_ref()
            .filter(|set| set.transaction_id == ctx.transaction_id)
        else {
            tracing::warn!(
                target: "async_agentx::session",
                { agentx.transaction_id = ctx.transaction_id, agentx.pdu_type = %ctx.pdu_type },
                "set phase without matching TestSet"
            );
            return Response::error(failure, 0);
        };
        match phase(self.handler.as_mut(), ctx, &set.varbinds) {
            SetResult::Ok => Response::default(),
            SetResult::Err(status) => {
                tracing::debug!(target: "async_agentx::session", { status = %status }, "set phase failed");
                Response::error(failure, 0)
            }
        }
    }
}

/// 1-based varbind index for error responses.
fn index_of(position: usize) -> u16 {
    u16::try_from(position + 1).unwrap_or(u16::MAX)
}

impl std::fmt::Debug for SessionHandler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionHandler")
            .field("session_id", &self.session_id)
            .field("set_in_progress", &self.set.is_some())
            .finish()
    }
}
