//! Shared helpers for the end-to-end suites
//!
//! Each test uses its own port block so the suites can run in parallel.

#![allow(dead_code)]

use std::sync::{Arc, Mutex};
use std::time::Duration;

use topicbus::{Address, Broker, BrokerConfig, BrokerKind, Payload};

/// Settle time after connects; pub/sub drops frames sent before the
/// subscription has propagated (slow joiner).
pub const SETTLE: Duration = Duration::from_millis(500);

/// Generous upper bound for a receive that must succeed
pub const RECV_TIMEOUT: Duration = Duration::from_secs(30);

/// Short bound for a receive that must NOT produce a message
pub const SILENCE: Duration = Duration::from_millis(500);

pub fn addr(port: u16) -> Address {
    Address::tcp("127.0.0.1", port)
}

/// Bind a broker on the given port and drive its loops in the background
pub async fn start_broker(kind: BrokerKind, port: u16) {
    let config = BrokerConfig::new(kind, addr(port));
    let broker = Broker::bind(&config).await.expect("broker bind");
    tokio::spawn(async move {
        let _ = broker.run().await;
    });
}

pub type Collected = Arc<Mutex<Vec<(String, String)>>>;

/// A callback that accumulates `(topic, message)` pairs in receipt order
pub fn collector() -> (Collected, impl FnMut(&str, &Payload) + Send + 'static) {
    let collected: Collected = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&collected);
    let callback = move |topic: &str, payload: &Payload| {
        sink.lock()
            .unwrap()
            .push((topic.to_string(), payload.to_string()));
    };
    (collected, callback)
}
