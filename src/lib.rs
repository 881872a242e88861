//! # topicbus
//!
//! A topic-based publish/subscribe messaging fabric. Publishers and
//! subscribers never address each other directly; they register interest
//! in named topics with an intermediary broker, which establishes the
//! data-plane connections between them.
//!
//! Two broker topologies are provided:
//!
//! - **Routing** ([`RoutingBroker`]): store-and-forward; every published
//!   message is relayed through the broker.
//! - **Direct** ([`DirectBroker`]): the broker only distributes peer
//!   addresses; data flows publisher → subscriber directly, and the
//!   broker pushes live updates when new publishers appear.
//!
//! # Quick start (routing)
//!
//! ```no_run
//! use topicbus::{Address, Broker, BrokerConfig, BrokerKind, Payload, Publisher, Subscriber};
//!
//! # async fn example() -> topicbus::Result<()> {
//! let broker_addr = Address::tcp("127.0.0.1", 5555);
//!
//! // Broker process
//! let config = BrokerConfig::new(BrokerKind::Route, broker_addr.clone());
//! let broker = Broker::bind(&config).await?;
//! tokio::spawn(broker.run());
//!
//! // Producer process
//! let mut publisher = Publisher::bind(Address::tcp("127.0.0.1", 5556), broker_addr.clone()).await?;
//! publisher.register("numbers").await?;
//! publisher.publish("numbers", Payload::from("42")).await?;
//!
//! // Consumer process
//! let mut subscriber = Subscriber::bind(Address::tcp("127.0.0.1", 5557), broker_addr).await?;
//! subscriber.register("numbers").await?;
//! subscriber.wait_for_message().await?;
//! # Ok(())
//! # }
//! ```
//!
//! # Delivery semantics
//!
//! Per-topic, per-publisher FIFO order is preserved end to end; no
//! ordering exists across publishers of the same topic. Publishing is
//! fire-and-forget: no persistence, no acknowledgment, no exactly-once.
//! Registered addresses live for the broker's process lifetime; there
//! is no expiry, heartbeat, or unregistration of publishers.

pub mod broker;
pub mod client;
pub mod error;
pub mod protocol;

pub use broker::{Broker, BrokerConfig, DirectBroker, RoutingBroker};
pub use client::{Publisher, Subscriber};
pub use error::{Error, Result};
pub use protocol::{
    Address, BrokerKind, Envelope, Payload, PayloadEncoding, EXIT_MESSAGE, EXIT_TOPIC,
};
