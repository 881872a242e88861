//! Peer-address-distributing direct broker
//!
//! The direct broker never touches data-plane traffic. It is the single
//! well-known discovery point: publishers register their addresses, and
//! subscribers learn those addresses: synchronously in the registration
//! reply for publishers that already exist, and via pushed announcements
//! for publishers that appear later. Data then flows publisher to
//! subscriber directly.
//!
//! This trades one extra hop of indirection for lower steady-state
//! latency once connections are established, at the cost of an
//! O(subscribers) fan-out on every publisher registration and a second
//! listening loop on every subscriber.
//!
//! There is no unregistration path: an address that stops producing
//! remains in the registry forever and keeps being handed to new
//! subscribers, which simply never receive data on that path.

use std::collections::{HashMap, HashSet};

use zeromq::{PubSocket, RepSocket, Socket, SocketRecv, SocketSend};

use crate::error::Result;
use crate::protocol::registration::{
    encode_publisher_reply, encode_subscriber_reply, Announcement, Registration, RegistrationKind,
};
use crate::protocol::{Address, BrokerKind};

use super::config::BrokerConfig;

/// Topic to publisher-address mapping.
///
/// Entries are insertion-ordered and grow monotonically; nothing is ever
/// removed.
#[derive(Debug, Default)]
pub struct PublisherRegistry {
    entries: HashMap<String, Vec<Address>>,
}

impl PublisherRegistry {
    /// Record a publisher of `topic` at `address`.
    ///
    /// Returns `false` if that exact pair is already present, so a
    /// repeated registration creates no duplicate entry and no repeated
    /// announcement.
    pub fn insert(&mut self, topic: &str, address: Address) -> bool {
        let addresses = self.entries.entry(topic.to_string()).or_default();
        if addresses.contains(&address) {
            return false;
        }
        addresses.push(address);
        true
    }

    /// The current publisher addresses for `topic`, oldest first
    pub fn snapshot(&self, topic: &str) -> Vec<Address> {
        self.entries.get(topic).cloned().unwrap_or_default()
    }

    /// Number of publishers currently known for `topic`
    pub fn publisher_count(&self, topic: &str) -> usize {
        self.entries.get(topic).map_or(0, Vec::len)
    }

    /// Number of topics with at least one publisher
    pub fn topic_count(&self) -> usize {
        self.entries.len()
    }
}

/// A broker that only distributes peer addresses
pub struct DirectBroker {
    registration: RepSocket,
    announce: PubSocket,
    registry: PublisherRegistry,
    subscribers: HashSet<Address>,
}

impl DirectBroker {
    /// Bind the registration endpoint and create the announcement socket.
    ///
    /// Bind failures (address in use) are fatal here.
    pub async fn bind(config: &BrokerConfig) -> Result<Self> {
        let mut registration = RepSocket::new();
        registration
            .bind(&config.address.bind_form().to_string())
            .await?;

        tracing::info!(addr = %config.address, "Direct broker listening");

        Ok(Self {
            registration,
            announce: PubSocket::new(),
            registry: PublisherRegistry::default(),
            subscribers: HashSet::new(),
        })
    }

    /// The publisher registry
    pub fn registry(&self) -> &PublisherRegistry {
        &self.registry
    }

    /// Consume exactly one registration message.
    ///
    /// Publishers are appended to the registry and announced to every
    /// currently attached subscriber; subscribers get the announcement
    /// channel wired toward them and the current registry snapshot for
    /// their topic in the reply. Malformed registrations are logged and
    /// dropped without a reply.
    pub async fn process_registration(&mut self) -> Result<()> {
        let msg = self.registration.recv().await?;

        let reg = match Registration::from_message(&msg) {
            Ok(reg) => reg,
            Err(err) => {
                tracing::warn!(error = %err, "Dropping invalid registration");
                return Ok(());
            }
        };

        let reply = match reg.kind {
            RegistrationKind::Publisher => {
                if self.registry.insert(&reg.topic, reg.address.clone()) {
                    tracing::info!(
                        topic = %reg.topic,
                        addr = %reg.address,
                        known = self.registry.publisher_count(&reg.topic),
                        "Publisher registered"
                    );

                    // Push the new address to every attached subscriber of
                    // this topic; the announce filter does the narrowing.
                    let announcement = Announcement {
                        topic: reg.topic,
                        address: reg.address,
                    };
                    self.announce.send(announcement.into_message()).await?;
                } else {
                    tracing::debug!(
                        topic = %reg.topic,
                        addr = %reg.address,
                        "Duplicate publisher registration ignored"
                    );
                }
                encode_publisher_reply(BrokerKind::Direct)
            }
            RegistrationKind::Subscriber => {
                if self.subscribers.insert(reg.address.clone()) {
                    // A registrant-supplied address may be unconnectable;
                    // that is the registrant's fault, so log it, drop the
                    // address from the attached set (a later registration
                    // retries) and keep serving. The reply still goes out.
                    if let Err(err) = self.announce.connect(&reg.address.to_string()).await {
                        tracing::warn!(
                            addr = %reg.address,
                            error = %err,
                            "Announce connect failed, ignoring subscriber"
                        );
                        self.subscribers.remove(&reg.address);
                    }
                }

                let snapshot = self.registry.snapshot(&reg.topic);
                tracing::info!(
                    topic = %reg.topic,
                    addr = %reg.address,
                    publishers = snapshot.len(),
                    "Subscriber registered"
                );
                encode_subscriber_reply(BrokerKind::Direct, &snapshot)
            }
        };

        self.registration.send(reply).await?;
        Ok(())
    }

    /// Process registrations until the socket is torn down.
    ///
    /// The direct broker has no data-plane loop of its own; this is its
    /// only loop.
    pub async fn run(&mut self) -> Result<()> {
        loop {
            self.process_registration().await?;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(port: u16) -> Address {
        Address::tcp("127.0.0.1", port)
    }

    #[test]
    fn registry_preserves_insertion_order() {
        let mut registry = PublisherRegistry::default();

        registry.insert("numbers", addr(5564));
        registry.insert("numbers", addr(5566));
        registry.insert("numbers", addr(5565));

        assert_eq!(registry.snapshot("numbers"), vec![addr(5564), addr(5566), addr(5565)]);
    }

    #[test]
    fn registry_deduplicates_per_topic_pair() {
        let mut registry = PublisherRegistry::default();

        assert!(registry.insert("numbers", addr(5564)));
        assert!(!registry.insert("numbers", addr(5564)));
        // Same address under another topic is a distinct entry
        assert!(registry.insert("letters", addr(5564)));

        assert_eq!(registry.publisher_count("numbers"), 1);
        assert_eq!(registry.topic_count(), 2);
    }

    #[test]
    fn snapshot_of_unknown_topic_is_empty() {
        let registry = PublisherRegistry::default();

        assert!(registry.snapshot("numbers").is_empty());
        assert_eq!(registry.publisher_count("numbers"), 0);
    }
}
