//! Broker topologies
//!
//! Two broker topologies exist behind one registration protocol:
//!
//! - [`RoutingBroker`], store-and-forward: subscribes to publishers'
//!   streams and republishes them to subscribers. Runs a registration
//!   loop and a relay loop concurrently.
//! - [`DirectBroker`], discovery only: hands subscribers the addresses
//!   of publishers and pushes updates when new publishers appear. Runs a
//!   single registration loop.
//!
//! [`Broker`] is the tagged variant over both; only the routing variant
//! has a data-plane loop, so there is no common "process" hook to leave
//! unused on the direct side. Peers are wired by explicit constructor
//! parameters; there is no process-wide broker handle.

pub mod config;
pub mod direct;
pub mod routing;

pub use config::BrokerConfig;
pub use direct::{DirectBroker, PublisherRegistry};
pub use routing::{Relay, RoutingBroker, RoutingRegistrar};

use crate::error::Result;
use crate::protocol::BrokerKind;

/// A broker of either topology
pub enum Broker {
    /// Store-and-forward relay
    Routing(RoutingBroker),
    /// Peer-address distribution
    Direct(DirectBroker),
}

impl Broker {
    /// Bind the broker topology selected by the config
    pub async fn bind(config: &BrokerConfig) -> Result<Self> {
        match config.kind {
            BrokerKind::Route => Ok(Broker::Routing(RoutingBroker::bind(config).await?)),
            BrokerKind::Direct => Ok(Broker::Direct(DirectBroker::bind(config).await?)),
        }
    }

    /// Which topology this broker runs
    pub fn kind(&self) -> BrokerKind {
        match self {
            Broker::Routing(_) => BrokerKind::Route,
            Broker::Direct(_) => BrokerKind::Direct,
        }
    }

    /// Run the broker's loop(s) until socket teardown
    pub async fn run(self) -> Result<()> {
        match self {
            Broker::Routing(broker) => broker.run().await,
            Broker::Direct(mut broker) => broker.run().await,
        }
    }
}
