//! Publisher client
//!
//! Used by producer processes: binds a broadcast socket, registers each
//! topic with the configured broker, frames and sends messages.

use std::time::Duration;

use zeromq::{PubSocket, ReqSocket, Socket, SocketRecv, SocketSend};

use crate::error::{Error, Result};
use crate::protocol::registration::{decode_publisher_reply, Registration, RegistrationKind};
use crate::protocol::{Address, BrokerKind, Envelope, Payload};

/// Pause after each data send. The transport flushes its write buffer
/// only from inside `send`, with a single non-rescheduling poll, so
/// back-to-back burst writes can strand their tail in the buffer; the
/// pause lets each flush complete before the next write lands on it.
const SEND_PACING: Duration = Duration::from_millis(1);

/// Publisher for publishing messages.
///
/// After registering with a broker, a publisher publishes messages about
/// registered topics. Each instance owns its sockets exclusively; they
/// are created here and released on drop.
///
/// # Example
/// ```no_run
/// use topicbus::{Address, Payload, Publisher};
///
/// # async fn example() -> topicbus::Result<()> {
/// let mut publisher = Publisher::bind(
///     Address::tcp("127.0.0.1", 5556),
///     Address::tcp("127.0.0.1", 5555),
/// )
/// .await?;
///
/// publisher.register("numbers").await?;
/// publisher.publish("numbers", Payload::from("42")).await?;
/// # Ok(())
/// # }
/// ```
pub struct Publisher {
    address: Address,
    topics: Vec<String>,
    broker_kind: Option<BrokerKind>,
    data: PubSocket,
    registration: ReqSocket,
}

impl Publisher {
    /// Bind the broadcast socket at `address` and connect the
    /// registration channel to the broker.
    ///
    /// Fails if `address` is already bound elsewhere; that is fatal to
    /// this instance, not recovered.
    pub async fn bind(address: Address, broker_address: Address) -> Result<Self> {
        let mut data = PubSocket::new();
        data.bind(&address.bind_form().to_string()).await?;

        let mut registration = ReqSocket::new();
        registration.connect(&broker_address.to_string()).await?;

        tracing::info!(
            addr = %address,
            broker = %broker_address,
            "Publisher bound, registering with broker"
        );

        Ok(Self {
            address,
            topics: Vec::new(),
            broker_kind: None,
            data,
            registration,
        })
    }

    /// The connect-form address this publisher advertises
    pub fn address(&self) -> &Address {
        &self.address
    }

    /// Broker kind learned from the last registration reply
    pub fn broker_kind(&self) -> Option<BrokerKind> {
        self.broker_kind
    }

    /// Whether `topic` has been registered on this instance
    pub fn is_registered(&self, topic: &str) -> bool {
        self.topics.iter().any(|t| t == topic)
    }

    /// Register a topic with the broker.
    ///
    /// Tells the broker to expect messages about `topic` from this
    /// publisher's address. Must be called before publishing on the
    /// topic. Blocks for the broker-type reply.
    pub async fn register(&mut self, topic: &str) -> Result<BrokerKind> {
        tracing::info!(topic = %topic, addr = %self.address, "Registering publisher topic");

        if !self.is_registered(topic) {
            self.topics.push(topic.to_string());
        }

        let request = Registration {
            kind: RegistrationKind::Publisher,
            topic: topic.to_string(),
            address: self.address.clone(),
        };
        self.registration.send(request.into_message()).await?;

        let reply = self.registration.recv().await?;
        let kind = decode_publisher_reply(&reply)?;
        self.broker_kind = Some(kind);

        tracing::info!(broker_kind = %kind, "Connected to broker");
        Ok(kind)
    }

    /// Publish a message on a registered topic.
    ///
    /// Fire-and-forget: no acknowledgment, no delivery guarantee, no
    /// backpressure beyond the transport's own send buffer. Sends are
    /// paced by a short pause so burst tails are not stranded in that
    /// buffer. Fails with [`Error::TopicNotRegistered`] before anything
    /// touches the wire if `topic` was never registered.
    pub async fn publish(&mut self, topic: &str, payload: impl Into<Payload>) -> Result<()> {
        if !self.is_registered(topic) {
            return Err(Error::TopicNotRegistered {
                topic: topic.to_string(),
            });
        }

        let envelope = Envelope::new(topic, payload.into());
        self.data.send(envelope.into_message()?).await?;
        tokio::time::sleep(SEND_PACING).await;
        Ok(())
    }
}
