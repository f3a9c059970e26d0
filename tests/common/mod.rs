//! Shared test infrastructure for async-agentx.
//!
//! Provides a scriptable master agent over an in-memory duplex stream or a
//! loopback TCP connection, a BTreeMap-backed handler, and MIB fixtures.

// Allow dead code and unused imports since not all test files use all utilities
#![allow(dead_code)]
#![allow(unused_imports)]

pub mod fixtures;
pub mod handler;

pub use fixtures::{sys_descr, sys_uptime, system_mib, system_subtree, test_enterprise};
pub use handler::TestHandler;

use std::time::Duration;

use async_agentx::testing::MockMaster;
use async_agentx::{Client, ClientConfig};
use tokio::io::DuplexStream;
use tokio::net::{TcpListener, TcpStream};

/// Client config with a short timeout so hung tests fail fast.
pub fn test_config() -> ClientConfig {
    ClientConfig {
        timeout: Duration::from_secs(2),
        ..ClientConfig::default()
    }
}

/// Client connected to an in-memory master.
pub fn mock_client(config: ClientConfig) -> (Client, MockMaster<DuplexStream>) {
    init_tracing();
    let (stream, master) = MockMaster::pair();
    (Client::from_stream(stream, config), master)
}

/// Client connected to a master over loopback TCP.
pub async fn tcp_client(timeout: Duration) -> (Client, MockMaster<TcpStream>) {
    init_tracing();
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("local addr");
    let accept = tokio::spawn(async move { listener.accept().await.expect("accept").0 });

    let client = Client::builder(format!("tcp:{}", addr))
        .timeout(timeout)
        .connect_timeout(Duration::from_secs(2))
        .connect()
        .await
        .expect("connect");
    let stream = accept.await.expect("accept task");
    (client, MockMaster::new(stream))
}

/// Install a subscriber that writes to the test harness and honours
/// `RUST_LOG`. Safe to call from every test.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}
