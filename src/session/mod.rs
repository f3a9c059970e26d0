//! AgentX sessions.
//!
//! A [`Session`] is opened with [`Client::session`](crate::Client::session)
//! and lives until [`Session::close`] or until the master closes it. Its
//! administrative operations (Register, Notify, Ping, ...) are requests on
//! the shared client; master-initiated requests for the session are
//! answered by the [`Handler`] given at open time.

mod handler;

pub use handler::{
    GetNextResult, GetResult, Handler, NullHandler, RequestContext, SessionHandler, SetResult,
};

use bytes::Bytes;
use tracing::instrument;

use crate::client::Client;
use crate::client::dispatcher::Command;
use crate::error::{Error, Result};
use crate::oid::Oid;
use crate::pdu::{
    AddAgentCaps, Close, CloseReason, Flags, HeaderPacket, IndexAllocate, IndexDeallocate,
    Notify, Open, Pdu, Register, RemoveAgentCaps, Response, Timeout, Unregister,
};
use crate::varbind::VarBind;

/// An open AgentX session.
#[derive(Debug, Clone)]
pub struct Session {
    client: Client,
    id: u32,
    timeout: Timeout,
}

impl Session {
    /// Perform the Open handshake. The session id comes from the
    /// response header.
    pub(crate) async fn open(
        client: Client,
        id: Oid,
        description: &str,
        timeout: Timeout,
        handler: Box<dyn Handler>,
    ) -> Result<Session> {
        let open = Open {
            timeout,
            id,
            description: Bytes::copy_from_slice(description.as_bytes()),
        };
        let reply = client.submit(HeaderPacket::new(open), Some(handler)).await?;
        let session_id = reply.header.session_id;
        check(reply)?;
        tracing::info!(target: "async_agentx::session", { agentx.session_id = session_id }, "session opened");
        Ok(Session {
            client,
            id: session_id,
            timeout,
        })
    }

    /// Master-assigned session id.
    pub fn id(&self) -> u32 {
        self.id
    }

    /// Timeout announced in the Open PDU.
    pub fn timeout(&self) -> Timeout {
        self.timeout
    }

    async fn call(&self, packet: HeaderPacket) -> Result<Response> {
        check(self.client.request(packet.session(self.id)).await?)
    }

    /// Register `subtree` with default priority and timeout.
    pub async fn register(&self, subtree: Oid) -> Result<()> {
        self.register_with(Register::new(subtree), Flags::empty())
            .await
    }

    /// Register with explicit timeout, priority, range and header flags
    /// (e.g. [`Flags::INSTANCE_REGISTRATION`]).
    #[instrument(level = "debug", skip(self, register), err, fields(agentx.session_id = self.id, agentx.subtree = %register.subtree))]
    pub async fn register_with(&self, register: Register, flags: Flags) -> Result<()> {
        self.call(HeaderPacket::new(register).flags(flags)).await?;
        Ok(())
    }

    /// Unregister `subtree` registered with default priority.
    pub async fn unregister(&self, subtree: Oid) -> Result<()> {
        self.unregister_with(Unregister::new(subtree)).await
    }

    /// Unregister with the priority and range used at registration.
    #[instrument(level = "debug", skip(self, unregister), err, fields(agentx.session_id = self.id, agentx.subtree = %unregister.subtree))]
    pub async fn unregister_with(&self, unregister: Unregister) -> Result<()> {
        self.call(HeaderPacket::new(unregister)).await?;
        Ok(())
    }

    /// Send a notification. The first two varbinds are normally sysUpTime.0
    /// and snmpTrapOID.0.
    pub async fn notify(&self, varbinds: Vec<VarBind>) -> Result<()> {
        self.call(HeaderPacket::new(Notify { varbinds })).await?;
        Ok(())
    }

    /// Check the master is alive. Returns its sysUpTime.
    pub async fn ping(&self) -> Result<u32> {
        let response = self.call(HeaderPacket::new(Pdu::Ping)).await?;
        Ok(response.sys_uptime)
    }

    /// Allocate index values. `flags` may carry [`Flags::NEW_INDEX`] or
    /// [`Flags::ANY_INDEX`]. Returns the allocated varbinds.
    pub async fn index_allocate(&self, varbinds: Vec<VarBind>, flags: Flags) -> Result<Vec<VarBind>> {
        let packet = HeaderPacket::new(IndexAllocate { varbinds }).flags(flags);
        Ok(self.call(packet).await?.varbinds)
    }

    /// Release index values.
    pub async fn index_deallocate(&self, varbinds: Vec<VarBind>) -> Result<Vec<VarBind>> {
        let packet = HeaderPacket::new(IndexDeallocate { varbinds });
        Ok(self.call(packet).await?.varbinds)
    }

    /// Advertise agent capabilities (an entry in sysORTable).
    pub async fn add_agent_caps(&self, id: Oid, description: &str) -> Result<()> {
        let caps = AddAgentCaps {
            id,
            description: Bytes::copy_from_slice(description.as_bytes()),
        };
        self.call(HeaderPacket::new(caps)).await?;
        Ok(())
    }

    /// Withdraw agent capabilities.
    pub async fn remove_agent_caps(&self, id: Oid) -> Result<()> {
        self.call(HeaderPacket::new(RemoveAgentCaps { id })).await?;
        Ok(())
    }

    /// Close the session. The handler is released even if the master
    /// rejects the Close.
    #[instrument(level = "debug", skip(self), err, fields(agentx.session_id = self.id))]
    pub async fn close(self, reason: CloseReason) -> Result<()> {
        let result = self.call(HeaderPacket::new(Close { reason })).await;
        // Dispatcher already gone means the session is gone too.
        let _ = self
            .client
            .command(Command::RemoveSession {
                session_id: self.id,
            })
            .await;
        result?;
        tracing::info!(target: "async_agentx::session", { agentx.session_id = self.id }, "session closed");
        Ok(())
    }
}

/// Unwrap a Response, mapping a non-zero `res.error` to [`Error::Agentx`].
fn check(reply: HeaderPacket) -> Result<Response> {
    match reply.pdu {
        Pdu::Response(response) if response.is_error() => Err(Error::Agentx {
            status: response.error,
            index: response.index,
        }
        .boxed()),
        Pdu::Response(response) => Ok(response),
        other => Err(Error::UnexpectedPdu {
            expected: "Response",
            actual: other.pdu_type().name(),
        }
        .boxed()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::ClientConfig;
    use crate::error::ErrorStatus;
    use crate::oid;
    use crate::transport::MockMaster;
    use crate::value::Value;

    #[tokio::test]
    async fn test_open_and_register() {
        let (stream, mut master) = MockMaster::pair();
        let client = Client::from_stream(stream, ClientConfig::default());

        let server = tokio::spawn(async move {
            let open = master.accept_open(11).await.unwrap();
            let register = master.recv().await.unwrap();
            master.ack(&register).await.unwrap();
            (open, register)
        });

        let session = client
            .session(oid!(1, 3, 6, 1, 4, 1, 8072), "test agent", NullHandler)
            .await
            .unwrap();
        assert_eq!(session.id(), 11);
        assert_eq!(session.timeout(), Timeout::from_secs(5));
        session.register(oid!(1, 3, 6, 1, 4, 1, 8072, 9999)).await.unwrap();

        let (open, register) = server.await.unwrap();
        let Pdu::Open(open) = open.pdu else {
            panic!("expected Open");
        };
        assert_eq!(&open.description[..], b"test agent");
        assert_eq!(open.timeout, Timeout::from_secs(5));
        assert_eq!(register.header.session_id, 11);
        let Pdu::Register(register) = register.pdu else {
            panic!("expected Register");
        };
        assert_eq!(register.subtree, oid!(1, 3, 6, 1, 4, 1, 8072, 9999));
        assert_eq!(register.priority, 127);
    }

    #[tokio::test]
    async fn test_error_response_maps_to_agentx_error() {
        let (stream, mut master) = MockMaster::pair();
        let client = Client::from_stream(stream, ClientConfig::default());

        tokio::spawn(async move {
            master.accept_open(3).await.unwrap();
            let register = master.recv().await.unwrap();
            master
                .respond(&register, Response::error(ErrorStatus::DuplicateRegistration, 0))
                .await
                .unwrap();
            master
        });

        let session = client
            .session(oid!(1, 3, 6, 1, 4, 1, 1), "dup", NullHandler)
            .await
            .unwrap();
        let err = session.register(oid!(1, 3, 6, 1, 2, 1, 1)).await.unwrap_err();
        assert!(matches!(
            *err,
            Error::Agentx {
                status: ErrorStatus::DuplicateRegistration,
                index: 0
            }
        ));
    }

    #[tokio::test]
    async fn test_ping_and_index_allocate() {
        let (stream, mut master) = MockMaster::pair();
        let client = Client::from_stream(stream, ClientConfig::default());

        let server = tokio::spawn(async move {
            master.set_sys_uptime(4200);
            master.accept_open(8).await.unwrap();
            let ping = master.recv().await.unwrap();
            master.ack(&ping).await.unwrap();

            let alloc = master.recv().await.unwrap();
            let Pdu::IndexAllocate(body) = &alloc.pdu else {
                panic!("expected IndexAllocate");
            };
            let mut varbinds = body.varbinds.clone();
            varbinds[0].value = Value::Integer(17);
            master.respond(&alloc, Response::new(varbinds)).await.unwrap();
            alloc
        });

        let session = client
            .session(oid!(1, 3, 6, 1, 4, 1, 1), "idx", NullHandler)
            .await
            .unwrap();
        assert_eq!(session.ping().await.unwrap(), 4200);
        let allocated = session
            .index_allocate(
                vec![VarBind::new(oid!(1, 3, 6, 1, 4, 1, 1, 1), Value::Integer(0))],
                Flags::ANY_INDEX,
            )
            .await
            .unwrap();
        assert_eq!(allocated[0].value, Value::Integer(17));

        let alloc = server.await.unwrap();
        assert!(alloc.header.flags.contains(Flags::ANY_INDEX));
        assert_eq!(alloc.header.session_id, 8);
    }

    #[tokio::test]
    async fn test_close_removes_session() {
        let (stream, mut master) = MockMaster::pair();
        let client = Client::from_stream(stream, ClientConfig::default());

        let server = tokio::spawn(async move {
            master.accept_open(5).await.unwrap();
            let close = master.recv().await.unwrap();
            master.ack(&close).await.unwrap();

            // the session is gone by the time the Ping arrives, so a Get
            // for it must go unanswered
            let ping = master.recv().await.unwrap();
            let mut get = HeaderPacket::new(crate::pdu::Get::default()).session(5);
            get.header.packet_id = 900;
            master.send(&get).await.unwrap();
            master.ack(&ping).await.unwrap();
            let stray = master
                .recv_timeout(std::time::Duration::from_millis(100))
                .await;
            (close, ping, stray.is_err())
        });

        let session = client
            .session(oid!(1, 3, 6, 1, 4, 1, 1), "bye", NullHandler)
            .await
            .unwrap();
        session.close(CloseReason::Shutdown).await.unwrap();
        client.request(HeaderPacket::new(Pdu::Ping)).await.unwrap();

        let (close, ping, unanswered) = server.await.unwrap();
        assert_eq!(
            close.pdu,
            Pdu::Close(Close {
                reason: CloseReason::Shutdown
            })
        );
        assert_eq!(ping.pdu, Pdu::Ping);
        assert!(unanswered);
    }
}
