//! Subscriber client
//!
//! Used by consumer processes: registers each topic with the configured
//! broker and dispatches received messages to an application callback.
//!
//! The subscriber binds one socket at its own address, the *broker
//! feed*, which is what the broker connects to: a routing broker pushes
//! relayed data through it, a direct broker pushes "new publisher"
//! announcements. In direct mode a second socket, the *direct feed*,
//! dials publishers and carries the data.
//!
//! In direct mode the announcement-listening loop and the
//! message-receiving loop are independent blocking receives on different
//! channels, so they must run concurrently: [`Subscriber::start_listener`]
//! detaches the broker feed into an [`AnnouncementListener`] whose loop
//! forwards each discovered address back to the subscriber over a
//! channel; [`Subscriber::wait_for_message`] services those while it
//! waits for data.

use std::collections::HashSet;

use tokio::sync::mpsc;
use zeromq::{ReqSocket, Socket, SocketRecv, SocketSend, SubSocket};

use crate::error::{Error, Result};
use crate::protocol::registration::{decode_subscriber_reply, Registration, RegistrationKind};
use crate::protocol::{Address, Announcement, BrokerKind, Envelope, Payload};

/// Notification callback: `(topic, message)`
pub type Callback = Box<dyn FnMut(&str, &Payload) + Send>;

/// The default callback: prints topic and message to standard output
pub fn printing_callback(topic: &str, message: &Payload) {
    println!("Topic: {topic}, Message: {message}");
}

/// Subscriber for receiving messages.
///
/// After registering with a broker, a subscriber notifies the
/// application through a registered callback whenever a message on a
/// registered topic arrives. Each instance owns its sockets exclusively.
///
/// # Example
/// ```no_run
/// use topicbus::{Address, Subscriber};
///
/// # async fn example() -> topicbus::Result<()> {
/// let mut subscriber = Subscriber::bind(
///     Address::tcp("127.0.0.1", 5557),
///     Address::tcp("127.0.0.1", 5555),
/// )
/// .await?;
///
/// subscriber.register("numbers").await?;
/// subscriber.set_callback(|topic, message| {
///     println!("{topic}: {message}");
/// });
/// loop {
///     subscriber.wait_for_message().await?;
/// }
/// # }
/// ```
pub struct Subscriber {
    address: Address,
    topics: HashSet<String>,
    broker_kind: Option<BrokerKind>,
    /// Bound at `address`; taken by [`Subscriber::start_listener`]
    broker_feed: Option<SubSocket>,
    /// Dials publishers directly (direct mode only)
    direct_feed: SubSocket,
    registration: ReqSocket,
    publishers: HashSet<Address>,
    announcements: Option<mpsc::Receiver<Announcement>>,
    callback: Callback,
}

/// One step of [`Subscriber::wait_for_message`] in direct mode
enum FeedEvent {
    Data(zeromq::ZmqMessage),
    Discovered(Option<Announcement>),
}

impl Subscriber {
    /// Bind the broker feed at `address` and connect the registration
    /// channel to the broker.
    ///
    /// Fails if `address` is already bound elsewhere; fatal to this
    /// instance.
    pub async fn bind(address: Address, broker_address: Address) -> Result<Self> {
        let mut broker_feed = SubSocket::new();
        broker_feed.bind(&address.bind_form().to_string()).await?;

        let mut registration = ReqSocket::new();
        registration.connect(&broker_address.to_string()).await?;

        tracing::info!(
            addr = %address,
            broker = %broker_address,
            "Subscriber bound, registering with broker"
        );

        Ok(Self {
            address,
            topics: HashSet::new(),
            broker_kind: None,
            broker_feed: Some(broker_feed),
            direct_feed: SubSocket::new(),
            registration,
            publishers: HashSet::new(),
            announcements: None,
            callback: Box::new(printing_callback),
        })
    }

    /// The connect-form address this subscriber advertises
    pub fn address(&self) -> &Address {
        &self.address
    }

    /// Broker kind learned from the last registration reply
    pub fn broker_kind(&self) -> Option<BrokerKind> {
        self.broker_kind
    }

    /// Publisher addresses this subscriber has connected to (direct mode)
    pub fn known_publishers(&self) -> impl Iterator<Item = &Address> {
        self.publishers.iter()
    }

    /// Register a topic with the broker and subscribe the receive filter.
    ///
    /// Blocks for the broker-type reply. Against a direct broker the
    /// reply also carries the current publisher addresses for `topic`;
    /// these are dialled immediately, and future ones arrive through the
    /// announcement channel.
    ///
    /// Topics must be registered before [`Subscriber::start_listener`]
    /// detaches the broker feed.
    pub async fn register(&mut self, topic: &str) -> Result<BrokerKind> {
        if self.broker_feed.is_none() {
            return Err(Error::ListenerStarted);
        }
        tracing::info!(topic = %topic, addr = %self.address, "Registering subscriber topic");

        let request = Registration {
            kind: RegistrationKind::Subscriber,
            topic: topic.to_string(),
            address: self.address.clone(),
        };
        self.registration.send(request.into_message()).await?;

        let reply = self.registration.recv().await?;
        let (kind, known) = decode_subscriber_reply(&reply)?;
        self.broker_kind = Some(kind);
        self.topics.insert(topic.to_string());

        let feed = self.broker_feed.as_mut().ok_or(Error::ListenerStarted)?;
        feed.subscribe(topic).await?;

        if kind == BrokerKind::Direct {
            self.direct_feed.subscribe(topic).await?;
            tracing::info!(
                topic = %topic,
                publishers = known.len(),
                "Direct broker returned publisher snapshot"
            );
            for address in known {
                self.connect_publisher(address).await?;
            }
        }

        tracing::info!(broker_kind = %kind, "Connected to broker");
        Ok(kind)
    }

    /// Unregister a topic.
    ///
    /// Drops the local topic filter only; the broker is not informed. A
    /// routing broker keeps relaying the topic toward this address until
    /// the transport-level unsubscribe propagates, and those messages are
    /// silently discarded.
    ///
    /// Fails with [`Error::TopicNotRegistered`] if `topic` was never
    /// registered.
    pub async fn unregister(&mut self, topic: &str) -> Result<()> {
        if !self.topics.remove(topic) {
            return Err(Error::TopicNotRegistered {
                topic: topic.to_string(),
            });
        }

        if let Some(feed) = self.broker_feed.as_mut() {
            feed.unsubscribe(topic).await?;
        }
        if self.broker_kind == Some(BrokerKind::Direct) {
            self.direct_feed.unsubscribe(topic).await?;
        }

        tracing::info!(topic = %topic, "Unregistered topic locally");
        Ok(())
    }

    /// Replace the notification callback.
    ///
    /// Takes effect for all subsequently received messages; not
    /// retroactive.
    pub fn set_callback(&mut self, callback: impl FnMut(&str, &Payload) + Send + 'static) {
        self.callback = Box::new(callback);
    }

    /// Detach the broker feed into a concurrently running announcement
    /// listener.
    ///
    /// Only meaningful after a registration established direct mode.
    /// Announcements the listener receives are forwarded back here and
    /// serviced inside [`Subscriber::wait_for_message`].
    pub fn start_listener(&mut self) -> Result<AnnouncementListener> {
        if self.broker_kind != Some(BrokerKind::Direct) {
            return Err(Error::NotDirectMode);
        }
        let feed = self.broker_feed.take().ok_or(Error::ListenerStarted)?;

        let (tx, rx) = mpsc::channel(64);
        self.announcements = Some(rx);

        Ok(AnnouncementListener { feed, forward: tx })
    }

    /// Block until one message on a registered topic has been received,
    /// invoke the callback, and return the envelope.
    ///
    /// The transport's subscribe filter is a byte-prefix test, so a
    /// registration for `"orders"` also lets `"orders-archive"` traffic
    /// reach the socket; an exact-match guard here drops such envelopes
    /// before the callback sees them.
    pub async fn wait_for_message(&mut self) -> Result<Envelope> {
        loop {
            let msg = match self.broker_kind {
                Some(BrokerKind::Direct) => match self.next_feed_event().await? {
                    FeedEvent::Data(msg) => msg,
                    FeedEvent::Discovered(Some(announcement)) => {
                        self.handle_announcement(announcement).await?;
                        continue;
                    }
                    FeedEvent::Discovered(None) => {
                        // Listener gone; stop servicing the channel.
                        self.announcements = None;
                        continue;
                    }
                },
                _ => {
                    let feed = self.broker_feed.as_mut().ok_or(Error::ListenerStarted)?;
                    feed.recv().await?
                }
            };

            let envelope = Envelope::from_message(&msg)?;
            if !self.topics.contains(&envelope.topic) {
                tracing::debug!(
                    topic = %envelope.topic,
                    "Dropping prefix-matched envelope for unregistered topic"
                );
                continue;
            }

            (self.callback)(&envelope.topic, &envelope.payload);
            return Ok(envelope);
        }
    }

    async fn next_feed_event(&mut self) -> Result<FeedEvent> {
        match self.announcements.as_mut() {
            Some(rx) => Ok(tokio::select! {
                announcement = rx.recv() => FeedEvent::Discovered(announcement),
                msg = self.direct_feed.recv() => FeedEvent::Data(msg?),
            }),
            None => Ok(FeedEvent::Data(self.direct_feed.recv().await?)),
        }
    }

    async fn handle_announcement(&mut self, announcement: Announcement) -> Result<()> {
        // Announcements go through the same exact-match guard as data.
        if !self.topics.contains(&announcement.topic) {
            tracing::debug!(
                topic = %announcement.topic,
                "Ignoring announcement for unregistered topic"
            );
            return Ok(());
        }
        self.connect_publisher(announcement.address).await
    }

    async fn connect_publisher(&mut self, address: Address) -> Result<()> {
        if !self.publishers.insert(address.clone()) {
            tracing::debug!(addr = %address, "Already connected to publisher");
            return Ok(());
        }
        self.direct_feed.connect(&address.to_string()).await?;
        tracing::info!(addr = %address, "Connected directly to publisher");
        Ok(())
    }
}

/// The announcement-listening half of a direct-mode subscriber.
///
/// Owns the broker feed after [`Subscriber::start_listener`]; its loop
/// must run concurrently with the subscriber's message loop.
pub struct AnnouncementListener {
    feed: SubSocket,
    forward: mpsc::Sender<Announcement>,
}

impl AnnouncementListener {
    /// Block until one `(topic, address)` announcement has been received
    /// and forwarded to the subscriber.
    ///
    /// Frames that do not decode as announcements are logged and skipped.
    pub async fn wait_for_announcement(&mut self) -> Result<Announcement> {
        loop {
            let msg = self.feed.recv().await?;
            match Announcement::from_message(&msg) {
                Ok(announcement) => {
                    tracing::info!(
                        topic = %announcement.topic,
                        addr = %announcement.address,
                        "New publisher announced"
                    );
                    self.forward
                        .send(announcement.clone())
                        .await
                        .map_err(|_| Error::LoopStopped)?;
                    return Ok(announcement);
                }
                Err(err) => {
                    tracing::warn!(error = %err, "Dropping invalid announcement");
                }
            }
        }
    }

    /// Listen until the socket or the subscriber is torn down
    pub async fn run(mut self) -> Result<()> {
        loop {
            self.wait_for_announcement().await?;
        }
    }
}
