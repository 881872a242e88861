//! Wire protocol: registration handshake and data-plane envelopes
//!
//! Everything that crosses a socket is a multipart message of UTF-8 text
//! frames (payload frames may be arbitrary bytes). Two message families
//! exist:
//!
//! - **Registration**, spoken over a request/reply channel to the broker's
//!   well-known endpoint: `[kind, topic, address]`, answered with the
//!   broker-type token (plus a publisher-address snapshot for subscribers
//!   of a direct broker).
//! - **Envelopes**, spoken over publish/subscribe channels:
//!   `[topic, timestamp, encoding, payload]`. The topic frame comes first
//!   because the subscribe filter is a byte-prefix test on frame zero.
//!
//! The broker's registration address is assumed well known to all
//! participants; nothing in the protocol discovers it.

pub mod address;
pub mod envelope;
pub mod registration;

pub use address::Address;
pub use envelope::{Envelope, Payload, PayloadEncoding, TIMESTAMP_FORMAT};
pub use registration::{Announcement, BrokerKind, Registration, RegistrationKind};

use zeromq::ZmqMessage;

use crate::error::{Error, Result};

/// Reserved topic signalling "no more data" to subscribers that opt in
pub const EXIT_TOPIC: &str = "EXIT_MESSAGE";

/// Fixed message body accompanying [`EXIT_TOPIC`]
pub const EXIT_MESSAGE: &str = "Exiting...";

/// Borrow frame `index` of a multipart message as text.
///
/// Missing frames and non-UTF-8 text frames are both protocol violations.
pub(crate) fn frame_str(msg: &ZmqMessage, index: usize) -> Result<&str> {
    let frame = msg
        .get(index)
        .ok_or_else(|| Error::Malformed(format!("missing frame {index}")))?;
    Ok(std::str::from_utf8(frame)?)
}
