//! Broker configuration

use crate::protocol::{Address, BrokerKind};

/// Broker configuration options
#[derive(Debug, Clone)]
pub struct BrokerConfig {
    /// Which broker topology to run
    pub kind: BrokerKind,

    /// Well-known registration endpoint, connect form.
    ///
    /// The broker binds the wildcard form of this address; registrants
    /// connect to it as given.
    pub address: Address,

    /// Depth of the registrar-to-relay command channel (routing broker)
    pub command_depth: usize,
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            kind: BrokerKind::Route,
            address: Address::tcp("127.0.0.1", 5555),
            command_depth: 64,
        }
    }
}

impl BrokerConfig {
    /// Create a config for the given topology and registration endpoint
    pub fn new(kind: BrokerKind, address: Address) -> Self {
        Self {
            kind,
            address,
            ..Default::default()
        }
    }

    /// Set the broker topology
    pub fn kind(mut self, kind: BrokerKind) -> Self {
        self.kind = kind;
        self
    }

    /// Set the registration endpoint
    pub fn address(mut self, address: Address) -> Self {
        self.address = address;
        self
    }

    /// Set the command channel depth
    pub fn command_depth(mut self, depth: usize) -> Self {
        self.command_depth = depth.max(1);
        self
    }
}
