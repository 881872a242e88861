//! Store-and-forward routing broker
//!
//! The routing broker relays every published message through itself: its
//! fan-in socket subscribes to each registered publisher's stream, and a
//! single fan-out socket pushes to every registered subscriber. Relay is a
//! pure pass-through with no buffering; the transport's own topic filter,
//! applied at registration time, decides what each subscriber sees.
//!
//! # Concurrency
//!
//! Registration traffic and data traffic arrive on independent channels,
//! so the broker is split into two loops that must run concurrently:
//!
//! ```text
//!   RoutingRegistrar                       Relay
//!   ┌──────────────────┐   commands   ┌─────────────────────┐
//!   │ rep.recv()       │ ───────────► │ select! {           │
//!   │ route table      │              │   command ⟶ connect │
//!   │ rep.send(ROUTE)  │              │   fan_in  ⟶ fan_out │
//!   └──────────────────┘              │ }                   │
//!                                     └─────────────────────┘
//! ```
//!
//! All socket mutation happens inside the relay loop; the registrar only
//! mutates its route table and sends attach commands, so neither loop can
//! starve the other and no lock is needed.

use std::collections::HashSet;

use tokio::sync::mpsc;
use zeromq::{PubSocket, RepSocket, Socket, SocketRecv, SocketSend, SubSocket};

use crate::error::{Error, Result};
use crate::protocol::registration::{
    encode_publisher_reply, encode_subscriber_reply, Registration, RegistrationKind,
};
use crate::protocol::{Address, BrokerKind};

use super::config::BrokerConfig;

/// Socket attachment requested by the registrar, applied by the relay
#[derive(Debug)]
enum RelayCommand {
    /// Connect the fan-in socket to a publisher and widen its topic filter
    AttachPublisher {
        /// Topic filter to add, if not already subscribed
        subscribe: Option<String>,
        /// Publisher address to connect, if not already connected
        connect: Option<Address>,
    },
    /// Connect the fan-out socket toward a subscriber
    AttachSubscriber {
        /// Subscriber address to connect
        address: Address,
    },
}

/// Topic-route bookkeeping owned by the registrar.
///
/// Tracks which `(topic, address)` pairs are already wired so that a
/// repeated registration is observable only as an idempotent no-op.
#[derive(Debug, Default)]
struct RouteTable {
    pairs: HashSet<(String, Address)>,
    publisher_addresses: HashSet<Address>,
    topics: HashSet<String>,
    subscribers: HashSet<Address>,
}

impl RouteTable {
    /// Record a publisher registration.
    ///
    /// `None` means the exact pair was already registered. Otherwise the
    /// returned command carries only the attachment work still missing at
    /// the transport layer.
    fn add_publisher(&mut self, topic: &str, address: &Address) -> Option<RelayCommand> {
        if !self.pairs.insert((topic.to_string(), address.clone())) {
            return None;
        }

        let connect = self
            .publisher_addresses
            .insert(address.clone())
            .then(|| address.clone());
        let subscribe = self.topics.insert(topic.to_string()).then(|| topic.to_string());

        Some(RelayCommand::AttachPublisher { subscribe, connect })
    }

    /// Record a subscriber registration; `None` if the fan-out path toward
    /// this address already exists
    fn add_subscriber(&mut self, address: &Address) -> Option<RelayCommand> {
        self.subscribers
            .insert(address.clone())
            .then(|| RelayCommand::AttachSubscriber {
                address: address.clone(),
            })
    }
}

/// The registration-processing half of a routing broker
pub struct RoutingRegistrar {
    registration: RepSocket,
    routes: RouteTable,
    commands: mpsc::Sender<RelayCommand>,
}

impl RoutingRegistrar {
    /// Consume exactly one registration message and reply `ROUTE`.
    ///
    /// A malformed or unknown-kind registration is logged and dropped
    /// without a reply; the misbehaving registrant's blocking receive
    /// hangs, and this loop moves on.
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
                match self.routes.add_publisher(&reg.topic, &reg.address) {
                    Some(command) => {
                        tracing::info!(
                            topic = %reg.topic,
                            addr = %reg.address,
                            "Publisher registered"
                        );
                        self.send_command(command).await?;
                    }
                    None => {
                        tracing::debug!(
                            topic = %reg.topic,
                            addr = %reg.address,
                            "Duplicate publisher registration ignored"
                        );
                    }
                }
                encode_publisher_reply(BrokerKind::Route)
            }
            RegistrationKind::Subscriber => {
                match self.routes.add_subscriber(&reg.address) {
                    Some(command) => {
                        tracing::info!(
                            topic = %reg.topic,
                            addr = %reg.address,
                            "Subscriber registered"
                        );
                        self.send_command(command).await?;
                    }
                    None => {
                        // Fan-out path exists; the subscriber's own filter
                        // handles the additional topic.
                        tracing::debug!(
                            topic = %reg.topic,
                            addr = %reg.address,
                            "Subscriber fan-out already attached"
                        );
                    }
                }
                encode_subscriber_reply(BrokerKind::Route, &[])
            }
        };

        self.registration.send(reply).await?;
        Ok(())
    }

    /// Process registrations until the socket or the relay is torn down
    pub async fn run(&mut self) -> Result<()> {
        loop {
            self.process_registration().await?;
        }
    }

    async fn send_command(&mut self, command: RelayCommand) -> Result<()> {
        self.commands
            .send(command)
            .await
            .map_err(|_| Error::LoopStopped)
    }
}

/// The message-relay half of a routing broker
pub struct Relay {
    fan_in: SubSocket,
    fan_out: PubSocket,
    commands: mpsc::Receiver<RelayCommand>,
}

impl Relay {
    /// Drive the relay one step: either apply one attachment command from
    /// the registrar, or pass one publication through unmodified.
    pub async fn process(&mut self) -> Result<()> {
        tokio::select! {
            command = self.commands.recv() => match command {
                Some(command) => self.apply(command).await?,
                None => return Err(Error::LoopStopped),
            },
            msg = self.fan_in.recv() => {
                // Pure relay: no buffering, no routing decision beyond the
                // filters installed at registration time.
                self.fan_out.send(msg?).await?;
            }
        }
        Ok(())
    }

    /// Relay until the sockets or the registrar are torn down
    pub async fn run(&mut self) -> Result<()> {
        loop {
            self.process().await?;
        }
    }

    /// Apply one attachment command.
    ///
    /// A registrant-supplied address may be unconnectable; that is the
    /// registrant's fault, so a failed connect is logged and the relay
    /// keeps serving everyone else. Only this broker's own sockets can
    /// end the loop.
    async fn apply(&mut self, command: RelayCommand) -> Result<()> {
        match command {
            RelayCommand::AttachPublisher { subscribe, connect } => {
                if let Some(address) = connect {
                    match self.fan_in.connect(&address.to_string()).await {
                        Ok(()) => {
                            tracing::debug!(addr = %address, "Fan-in connected to publisher");
                        }
                        Err(err) => {
                            tracing::warn!(
                                addr = %address,
                                error = %err,
                                "Fan-in connect failed, ignoring publisher"
                            );
                        }
                    }
                }
                if let Some(topic) = subscribe {
                    self.fan_in.subscribe(&topic).await?;
                    tracing::debug!(topic = %topic, "Fan-in filter widened");
                }
            }
            RelayCommand::AttachSubscriber { address } => {
                match self.fan_out.connect(&address.to_string()).await {
                    Ok(()) => {
                        tracing::debug!(addr = %address, "Fan-out connected to subscriber");
                    }
                    Err(err) => {
                        tracing::warn!(
                            addr = %address,
                            error = %err,
                            "Fan-out connect failed, ignoring subscriber"
                        );
                    }
                }
            }
        }
        Ok(())
    }
}

/// A broker that relays every published message through itself
pub struct RoutingBroker {
    registrar: RoutingRegistrar,
    relay: Relay,
}

impl RoutingBroker {
    /// Bind the registration endpoint and create the relay sockets.
    ///
    /// Bind failures (address in use) are fatal here; nothing is
    /// recovered.
    pub async fn bind(config: &BrokerConfig) -> Result<Self> {
        let mut registration = RepSocket::new();
        registration
            .bind(&config.address.bind_form().to_string())
            .await?;

        let fan_in = SubSocket::new();
        let fan_out = PubSocket::new();
        let (tx, rx) = mpsc::channel(config.command_depth);

        tracing::info!(addr = %config.address, "Routing broker listening");

        Ok(Self {
            registrar: RoutingRegistrar {
                registration,
                routes: RouteTable::default(),
                commands: tx,
            },
            relay: Relay {
                fan_in,
                fan_out,
                commands: rx,
            },
        })
    }

    /// Split into the two loops that must run concurrently
    pub fn split(self) -> (RoutingRegistrar, Relay) {
        (self.registrar, self.relay)
    }

    /// Run both loops until either exits.
    ///
    /// A closed socket surfaces as an error that ends the corresponding
    /// loop; this is the shutdown path, not a retryable failure.
    pub async fn run(self) -> Result<()> {
        let (mut registrar, mut relay) = self.split();
        tokio::try_join!(registrar.run(), relay.run())?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(port: u16) -> Address {
        Address::tcp("127.0.0.1", port)
    }

    #[test]
    fn first_publisher_needs_connect_and_subscribe() {
        let mut routes = RouteTable::default();

        let command = routes.add_publisher("numbers", &addr(5556)).unwrap();
        match command {
            RelayCommand::AttachPublisher { subscribe, connect } => {
                assert_eq!(subscribe.as_deref(), Some("numbers"));
                assert_eq!(connect, Some(addr(5556)));
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn duplicate_pair_is_a_no_op() {
        let mut routes = RouteTable::default();

        assert!(routes.add_publisher("numbers", &addr(5556)).is_some());
        assert!(routes.add_publisher("numbers", &addr(5556)).is_none());
    }

    #[test]
    fn known_address_new_topic_only_subscribes() {
        let mut routes = RouteTable::default();
        routes.add_publisher("numbers", &addr(5556));

        let command = routes.add_publisher("letters", &addr(5556)).unwrap();
        match command {
            RelayCommand::AttachPublisher { subscribe, connect } => {
                assert_eq!(subscribe.as_deref(), Some("letters"));
                assert_eq!(connect, None);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn known_topic_new_address_only_connects() {
        let mut routes = RouteTable::default();
        routes.add_publisher("numbers", &addr(5556));

        let command = routes.add_publisher("numbers", &addr(5557)).unwrap();
        match command {
            RelayCommand::AttachPublisher { subscribe, connect } => {
                assert_eq!(subscribe, None);
                assert_eq!(connect, Some(addr(5557)));
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn subscriber_attach_is_per_address() {
        let mut routes = RouteTable::default();

        assert!(routes.add_subscriber(&addr(5557)).is_some());
        // Same subscriber registering a second topic reuses the path
        assert!(routes.add_subscriber(&addr(5557)).is_none());
        assert!(routes.add_subscriber(&addr(5558)).is_some());
    }
}
