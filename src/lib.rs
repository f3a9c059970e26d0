//! # async-agentx
//!
//! Async AgentX (RFC 2741) subagent client for Rust.
//!
//! ## Features
//!
//! - One long-lived connection (TCP or Unix socket) multiplexing any number
//!   of concurrent requests and sessions
//! - Responses correlated by packet id in any arrival order, with a
//!   per-request timeout
//! - Master-initiated Get/GetNext/GetBulk and set transactions routed to a
//!   per-session [`Handler`]
//! - Byte-exact wire codec that reads both byte orders
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use async_agentx::{Client, NullHandler, oid};
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() -> async_agentx::Result<()> {
//!     let client = Client::builder("tcp:localhost:705")
//!         .timeout(Duration::from_secs(5))
//!         .connect()
//!         .await?;
//!
//!     let session = client
//!         .session(oid!(1, 3, 6, 1, 4, 1, 8072), "example subagent", NullHandler)
//!         .await?;
//!     session.register(oid!(1, 3, 6, 1, 4, 1, 8072, 9999)).await?;
//!
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! [`Client::from_stream`] spawns three tasks: a transport reader, a
//! transport writer and the dispatcher. The dispatcher is the only owner
//! of the pending-request and session tables; callers and the transport
//! talk to it through channels. When the connection fails or
//! [`Client::close`] is called, every outstanding request completes with
//! [`Error::ConnectionClosed`].

pub mod client;
pub mod codec;
pub mod error;
pub mod oid;
pub mod pdu;
pub mod session;
pub mod transport;
pub mod value;
pub mod varbind;

pub(crate) mod util;

// Re-exports for convenience
pub use client::{Client, ClientBuilder, ClientConfig};
pub use error::{DecodeErrorKind, EncodeErrorKind, Error, ErrorStatus, Result};
pub use oid::Oid;
pub use pdu::{CloseReason, Flags, Header, HeaderPacket, Pdu, PduType, SearchRange, Timeout};
pub use session::{GetNextResult, GetResult, Handler, NullHandler, RequestContext, Session, SetResult};
pub use transport::Target;
pub use value::Value;
pub use varbind::VarBind;

/// Testing utilities exposed via the `testing` feature.
#[cfg(feature = "testing")]
pub mod testing {
    pub use crate::transport::MockMaster;
    pub use crate::util::{HexDecodeError, decode_hex};
}
