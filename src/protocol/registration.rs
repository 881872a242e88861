//! Registration handshake messages
//!
//! A registrant sends a 3-frame request `[kind, topic, address]` to the
//! broker's well-known endpoint and blocks for the reply. The reply tells
//! the client which connection strategy to apply:
//!
//! - a routing broker answers `[ROUTE]` and the client keeps talking to
//!   the broker's relay;
//! - a direct broker answers `[DIRECT]`, and for subscriber registrations
//!   appends the current publisher-address snapshot for the topic:
//!   `[DIRECT, count, addr...]` (possibly zero addresses).
//!
//! Direct brokers additionally push 2-frame `[topic, address]`
//! announcements to already-registered subscribers whenever a new
//! publisher appears.

use std::fmt;
use std::str::FromStr;

use bytes::Bytes;
use zeromq::ZmqMessage;

use crate::error::{Error, Result};

use super::address::Address;
use super::frame_str;

/// Literal kind frame sent by publishers
pub const REGISTER_PUBLISHER: &str = "REGISTER_PUBLISHER";
/// Literal kind frame sent by subscribers
pub const REGISTER_SUBSCRIBER: &str = "REGISTER_SUBSCRIBER";

/// Role a registrant declares to the broker
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegistrationKind {
    /// "I produce topic T at address A"
    Publisher,
    /// "I consume topic T at address A"
    Subscriber,
}

impl RegistrationKind {
    /// The literal wire frame for this kind
    pub fn as_frame(&self) -> &'static str {
        match self {
            RegistrationKind::Publisher => REGISTER_PUBLISHER,
            RegistrationKind::Subscriber => REGISTER_SUBSCRIBER,
        }
    }

    /// Parse a kind frame.
    ///
    /// An unrecognized literal is a protocol violation by the registrant,
    /// not a broker fault.
    pub fn from_frame(frame: &str) -> Result<Self> {
        match frame {
            REGISTER_PUBLISHER => Ok(RegistrationKind::Publisher),
            REGISTER_SUBSCRIBER => Ok(RegistrationKind::Subscriber),
            other => Err(Error::UnknownRegistrationKind(other.to_string())),
        }
    }
}

impl fmt::Display for RegistrationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_frame())
    }
}

/// Broker-type token returned to every registrant
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BrokerKind {
    /// Store-and-forward: all data flows through the broker
    Route,
    /// Peer-address-distributing: data flows publisher to subscriber
    Direct,
}

impl BrokerKind {
    /// The literal wire frame for this token
    pub fn as_frame(&self) -> &'static str {
        match self {
            BrokerKind::Route => "ROUTE",
            BrokerKind::Direct => "DIRECT",
        }
    }

    /// Parse a broker-type token frame
    pub fn from_frame(frame: &str) -> Result<Self> {
        match frame {
            "ROUTE" => Ok(BrokerKind::Route),
            "DIRECT" => Ok(BrokerKind::Direct),
            other => Err(Error::Malformed(format!("unknown broker type: {other}"))),
        }
    }
}

impl fmt::Display for BrokerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_frame())
    }
}

impl FromStr for BrokerKind {
    type Err = Error;

    /// Lenient parse used by launchers: accepts `r`/`d` and full names
    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "r" | "route" | "routing" => Ok(BrokerKind::Route),
            "d" | "direct" => Ok(BrokerKind::Direct),
            other => Err(Error::Malformed(format!("unknown broker type: {other}"))),
        }
    }
}

/// One registration request: `(kind, topic, address)`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Registration {
    /// Declared role
    pub kind: RegistrationKind,
    /// Topic being produced or consumed
    pub topic: String,
    /// Connect-form address of the registrant
    pub address: Address,
}

impl Registration {
    /// Frame this registration as a 3-part message
    pub fn into_message(self) -> ZmqMessage {
        let mut msg = ZmqMessage::from(self.kind.as_frame());
        msg.push_back(Bytes::from(self.topic));
        msg.push_back(Bytes::from(self.address.to_string()));
        msg
    }

    /// Decode a 3-part registration message
    pub fn from_message(msg: &ZmqMessage) -> Result<Self> {
        let kind = RegistrationKind::from_frame(frame_str(msg, 0)?)?;
        let topic = frame_str(msg, 1)?.to_string();
        let address = frame_str(msg, 2)?.parse()?;

        Ok(Registration {
            kind,
            topic,
            address,
        })
    }
}

/// Encode the reply to a publisher registration: the type token alone
pub fn encode_publisher_reply(kind: BrokerKind) -> ZmqMessage {
    ZmqMessage::from(kind.as_frame())
}

/// Decode the reply a publisher receives
pub fn decode_publisher_reply(msg: &ZmqMessage) -> Result<BrokerKind> {
    BrokerKind::from_frame(frame_str(msg, 0)?)
}

/// Encode the reply to a subscriber registration.
///
/// A routing broker sends the token alone; a direct broker appends the
/// current publisher-address snapshot as `count` followed by that many
/// address frames.
pub fn encode_subscriber_reply(kind: BrokerKind, publishers: &[Address]) -> ZmqMessage {
    let mut msg = ZmqMessage::from(kind.as_frame());
    if kind == BrokerKind::Direct {
        msg.push_back(Bytes::from(publishers.len().to_string()));
        for addr in publishers {
            msg.push_back(Bytes::from(addr.to_string()));
        }
    }
    msg
}

/// Decode the reply a subscriber receives.
///
/// Returns the broker kind and the publisher snapshot (always empty for a
/// routing broker).
pub fn decode_subscriber_reply(msg: &ZmqMessage) -> Result<(BrokerKind, Vec<Address>)> {
    let kind = BrokerKind::from_frame(frame_str(msg, 0)?)?;
    if kind == BrokerKind::Route {
        return Ok((kind, Vec::new()));
    }

    let count: usize = frame_str(msg, 1)?
        .parse()
        .map_err(|_| Error::Malformed("publisher count is not a number".into()))?;

    // The count frame is wire-controlled; never reserve more than the
    // message could actually carry.
    let mut publishers = Vec::with_capacity(count.min(msg.len()));
    for i in 0..count {
        publishers.push(frame_str(msg, 2 + i)?.parse()?);
    }

    Ok((kind, publishers))
}

/// A pushed "new publisher" notice: `(topic, address)`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Announcement {
    /// Topic the new publisher produces
    pub topic: String,
    /// Connect-form address of the new publisher
    pub address: Address,
}

impl Announcement {
    /// Frame this announcement as a 2-part message.
    ///
    /// The topic comes first so the subscribe filter applies to it.
    pub fn into_message(self) -> ZmqMessage {
        let mut msg = ZmqMessage::from(self.topic);
        msg.push_back(Bytes::from(self.address.to_string()));
        msg
    }

    /// Decode a 2-part announcement message
    pub fn from_message(msg: &ZmqMessage) -> Result<Self> {
        let topic = frame_str(msg, 0)?.to_string();
        let address = frame_str(msg, 1)?.parse()?;
        Ok(Announcement { topic, address })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(port: u16) -> Address {
        Address::tcp("127.0.0.1", port)
    }

    #[test]
    fn registration_round_trip() {
        let reg = Registration {
            kind: RegistrationKind::Publisher,
            topic: "numbers".into(),
            address: addr(5556),
        };

        let decoded = Registration::from_message(&reg.clone().into_message()).unwrap();
        assert_eq!(decoded, reg);
    }

    #[test]
    fn unknown_kind_is_rejected() {
        let mut msg = ZmqMessage::from("REQUEST_PUBLISHERS");
        msg.push_back(Bytes::from_static(b"numbers"));
        msg.push_back(Bytes::from_static(b"tcp://127.0.0.1:5556"));

        let err = Registration::from_message(&msg).unwrap_err();
        assert!(matches!(
            err,
            crate::error::Error::UnknownRegistrationKind(kind) if kind == "REQUEST_PUBLISHERS"
        ));
    }

    #[test]
    fn short_registration_is_malformed() {
        let msg = ZmqMessage::from(REGISTER_PUBLISHER);
        assert!(Registration::from_message(&msg).is_err());
    }

    #[test]
    fn publisher_reply_is_one_frame() {
        let msg = encode_publisher_reply(BrokerKind::Route);
        assert_eq!(msg.len(), 1);
        assert_eq!(decode_publisher_reply(&msg).unwrap(), BrokerKind::Route);
    }

    #[test]
    fn routing_subscriber_reply_carries_no_addresses() {
        let msg = encode_subscriber_reply(BrokerKind::Route, &[addr(1), addr(2)]);
        assert_eq!(msg.len(), 1);

        let (kind, publishers) = decode_subscriber_reply(&msg).unwrap();
        assert_eq!(kind, BrokerKind::Route);
        assert!(publishers.is_empty());
    }

    #[test]
    fn direct_subscriber_reply_carries_snapshot() {
        let snapshot = vec![addr(5564), addr(5565)];
        let msg = encode_subscriber_reply(BrokerKind::Direct, &snapshot);
        assert_eq!(msg.len(), 4);

        let (kind, publishers) = decode_subscriber_reply(&msg).unwrap();
        assert_eq!(kind, BrokerKind::Direct);
        assert_eq!(publishers, snapshot);
    }

    #[test]
    fn direct_subscriber_reply_may_be_empty() {
        let msg = encode_subscriber_reply(BrokerKind::Direct, &[]);
        assert_eq!(msg.len(), 2);

        let (_, publishers) = decode_subscriber_reply(&msg).unwrap();
        assert!(publishers.is_empty());
    }

    #[test]
    fn oversized_publisher_count_is_rejected_without_reserving() {
        let mut msg = ZmqMessage::from("DIRECT");
        msg.push_back(Bytes::from_static(b"18446744073709551615"));

        assert!(matches!(
            decode_subscriber_reply(&msg),
            Err(Error::Malformed(_))
        ));
    }

    #[test]
    fn announcement_round_trip() {
        let ann = Announcement {
            topic: "numbers".into(),
            address: addr(5564),
        };
        let decoded = Announcement::from_message(&ann.clone().into_message()).unwrap();
        assert_eq!(decoded, ann);
    }

    #[test]
    fn cli_token_parses_both_brokers() {
        assert_eq!("r".parse::<BrokerKind>().unwrap(), BrokerKind::Route);
        assert_eq!("d".parse::<BrokerKind>().unwrap(), BrokerKind::Direct);
        assert_eq!("direct".parse::<BrokerKind>().unwrap(), BrokerKind::Direct);
        assert!("x".parse::<BrokerKind>().is_err());
    }
}
