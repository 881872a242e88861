//! Data-plane message envelopes
//!
//! A published message travels as a 4-frame multipart message:
//! `[topic, timestamp, encoding, payload]`. The timestamp exists purely
//! for latency measurement by the subscriber; it has no other protocol
//! significance, so an unparseable timestamp is never a receive error.

use std::fmt;

use bytes::Bytes;
use chrono::{DateTime, NaiveDateTime, Utc};
use zeromq::ZmqMessage;

use crate::error::{Error, Result};

use super::frame_str;

/// Fixed-width textual format of the envelope timestamp (UTC)
pub const TIMESTAMP_FORMAT: &str = "%m/%d/%Y, %H:%M:%S";

/// Encoding tag of the payload frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayloadEncoding {
    /// UTF-8 text
    Text,
    /// Application-defined serialized object, opaque to the bus
    Object,
    /// JSON document
    Json,
}

impl PayloadEncoding {
    /// The literal wire frame for this encoding
    pub fn as_frame(&self) -> &'static str {
        match self {
            PayloadEncoding::Text => "STRING",
            PayloadEncoding::Object => "STRUCTURED_OBJECT",
            PayloadEncoding::Json => "JSON",
        }
    }

    /// Parse an encoding frame
    pub fn from_frame(frame: &str) -> Result<Self> {
        match frame {
            "STRING" => Ok(PayloadEncoding::Text),
            "STRUCTURED_OBJECT" => Ok(PayloadEncoding::Object),
            "JSON" => Ok(PayloadEncoding::Json),
            other => Err(Error::Malformed(format!("unknown payload encoding: {other}"))),
        }
    }
}

/// A decoded message payload.
///
/// `Object` payloads are handed to the application as raw bytes; the bus
/// never deserializes them.
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    /// UTF-8 text
    Text(String),
    /// Opaque serialized object
    Object(Bytes),
    /// JSON document
    Json(serde_json::Value),
}

impl Payload {
    /// The encoding tag this payload travels under
    pub fn encoding(&self) -> PayloadEncoding {
        match self {
            Payload::Text(_) => PayloadEncoding::Text,
            Payload::Object(_) => PayloadEncoding::Object,
            Payload::Json(_) => PayloadEncoding::Json,
        }
    }

    fn into_bytes(self) -> Result<Bytes> {
        match self {
            Payload::Text(s) => Ok(Bytes::from(s)),
            Payload::Object(b) => Ok(b),
            Payload::Json(v) => Ok(Bytes::from(serde_json::to_vec(&v)?)),
        }
    }

    fn decode(encoding: PayloadEncoding, bytes: &Bytes) -> Result<Self> {
        match encoding {
            PayloadEncoding::Text => Ok(Payload::Text(std::str::from_utf8(bytes)?.to_string())),
            PayloadEncoding::Object => Ok(Payload::Object(bytes.clone())),
            PayloadEncoding::Json => Ok(Payload::Json(serde_json::from_slice(bytes)?)),
        }
    }
}

impl fmt::Display for Payload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Payload::Text(s) => f.write_str(s),
            Payload::Object(b) => write!(f, "<{} object bytes>", b.len()),
            Payload::Json(v) => write!(f, "{v}"),
        }
    }
}

impl From<&str> for Payload {
    fn from(s: &str) -> Self {
        Payload::Text(s.to_string())
    }
}

impl From<String> for Payload {
    fn from(s: String) -> Self {
        Payload::Text(s)
    }
}

impl From<serde_json::Value> for Payload {
    fn from(v: serde_json::Value) -> Self {
        Payload::Json(v)
    }
}

/// One published message: `(topic, send timestamp, payload)`
#[derive(Debug, Clone, PartialEq)]
pub struct Envelope {
    /// Topic the message was published under
    pub topic: String,
    /// Send timestamp, formatted per [`TIMESTAMP_FORMAT`].
    ///
    /// Kept as the raw frame text so a peer with a different clock format
    /// never breaks delivery.
    pub sent_at: String,
    /// The message payload
    pub payload: Payload,
}

impl Envelope {
    /// Create an envelope stamped with the current UTC time
    pub fn new(topic: impl Into<String>, payload: Payload) -> Self {
        Self {
            topic: topic.into(),
            sent_at: Utc::now().format(TIMESTAMP_FORMAT).to_string(),
            payload,
        }
    }

    /// Parse the send timestamp, if it matches [`TIMESTAMP_FORMAT`]
    pub fn sent_at(&self) -> Option<DateTime<Utc>> {
        NaiveDateTime::parse_from_str(&self.sent_at, TIMESTAMP_FORMAT)
            .ok()
            .map(|naive| naive.and_utc())
    }

    /// Whole-second latency relative to `now`, for the latency-measuring
    /// subscriber variant. `None` if the timestamp frame is unparseable.
    pub fn latency_from(&self, now: DateTime<Utc>) -> Option<chrono::Duration> {
        self.sent_at().map(|sent| now - sent)
    }

    /// True when this envelope carries the sentinel shutdown pair
    pub fn is_exit_sentinel(&self) -> bool {
        self.topic == super::EXIT_TOPIC
            && matches!(&self.payload, Payload::Text(body) if body == super::EXIT_MESSAGE)
    }

    /// Frame this envelope as a 4-part message, topic frame first
    pub fn into_message(self) -> Result<ZmqMessage> {
        let encoding = self.payload.encoding();
        let mut msg = ZmqMessage::from(self.topic);
        msg.push_back(Bytes::from(self.sent_at));
        msg.push_back(Bytes::from_static(encoding.as_frame().as_bytes()));
        msg.push_back(self.payload.into_bytes()?);
        Ok(msg)
    }

    /// Decode a 4-part envelope message
    pub fn from_message(msg: &ZmqMessage) -> Result<Self> {
        let topic = frame_str(msg, 0)?.to_string();
        let sent_at = frame_str(msg, 1)?.to_string();
        let encoding = PayloadEncoding::from_frame(frame_str(msg, 2)?)?;
        let payload_frame = msg
            .get(3)
            .ok_or_else(|| Error::Malformed("missing payload frame".into()))?;
        let payload = Payload::decode(encoding, payload_frame)?;

        Ok(Envelope {
            topic,
            sent_at,
            payload,
        })
    }
}

#[cfg(test)]
mod tests {
    use chrono::Duration;
    use serde_json::json;

    use super::*;

    #[test]
    fn text_envelope_round_trip() {
        let env = Envelope::new("numbers", Payload::from("42"));
        let decoded = Envelope::from_message(&env.clone().into_message().unwrap()).unwrap();

        assert_eq!(decoded, env);
        assert_eq!(decoded.payload, Payload::Text("42".into()));
    }

    #[test]
    fn json_envelope_round_trip() {
        let env = Envelope::new("orders", Payload::Json(json!({"id": 7, "qty": 3})));
        let decoded = Envelope::from_message(&env.into_message().unwrap()).unwrap();

        assert_eq!(decoded.payload, Payload::Json(json!({"id": 7, "qty": 3})));
    }

    #[test]
    fn object_payload_is_opaque() {
        let blob = Bytes::from_static(&[0x80, 0x04, 0x95, 0x00]);
        let env = Envelope::new("objects", Payload::Object(blob.clone()));
        let decoded = Envelope::from_message(&env.into_message().unwrap()).unwrap();

        assert_eq!(decoded.payload, Payload::Object(blob));
    }

    #[test]
    fn timestamp_is_fixed_width_and_parseable() {
        let env = Envelope::new("t", Payload::from("x"));

        // e.g. "08/24/2026, 17:03:09"
        assert_eq!(env.sent_at.len(), 20);
        let sent = env.sent_at().expect("freshly stamped envelope must parse");
        assert!(Utc::now() - sent < Duration::seconds(5));
    }

    #[test]
    fn unparseable_timestamp_is_not_an_error() {
        let mut msg = ZmqMessage::from("t");
        msg.push_back(Bytes::from_static(b"not a timestamp"));
        msg.push_back(Bytes::from_static(b"STRING"));
        msg.push_back(Bytes::from_static(b"body"));

        let env = Envelope::from_message(&msg).unwrap();
        assert_eq!(env.sent_at, "not a timestamp");
        assert!(env.sent_at().is_none());
        assert!(env.latency_from(Utc::now()).is_none());
    }

    #[test]
    fn unknown_encoding_is_malformed() {
        let mut msg = ZmqMessage::from("t");
        msg.push_back(Bytes::from_static(b"08/24/2026, 00:00:00"));
        msg.push_back(Bytes::from_static(b"PICKLE"));
        msg.push_back(Bytes::from_static(b"body"));

        assert!(matches!(
            Envelope::from_message(&msg),
            Err(Error::Malformed(_))
        ));
    }

    #[test]
    fn exit_sentinel_requires_both_fields() {
        let exact = Envelope::new(super::super::EXIT_TOPIC, Payload::from(super::super::EXIT_MESSAGE));
        assert!(exact.is_exit_sentinel());

        let wrong_body = Envelope::new(super::super::EXIT_TOPIC, Payload::from("bye"));
        assert!(!wrong_body.is_exit_sentinel());

        let wrong_topic = Envelope::new("numbers", Payload::from(super::super::EXIT_MESSAGE));
        assert!(!wrong_topic.is_exit_sentinel());
    }
}
