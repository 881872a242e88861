//! Crate-wide error types
//!
//! Everything fallible in topicbus returns [`Result`]. Transport failures
//! from the socket layer are wrapped rather than re-modelled; protocol
//! violations and client misuse get their own variants so callers can
//! distinguish "register first" from "the wire is broken".

use thiserror::Error;

/// Error type for all topicbus operations
#[derive(Debug, Error)]
pub enum Error {
    /// An operation referenced a topic never passed through `register`.
    ///
    /// Recoverable: register the topic and retry.
    #[error("topic has not been registered: {topic}")]
    TopicNotRegistered {
        /// The offending topic
        topic: String,
    },

    /// A registration message carried an unrecognized kind frame.
    ///
    /// Broker-side this is logged and the registration is dropped without
    /// a reply; the misbehaving registrant's blocking receive will hang.
    #[error("unknown registration kind: {0}")]
    UnknownRegistrationKind(String),

    /// A multipart message did not match the expected frame layout
    #[error("malformed message: {0}")]
    Malformed(String),

    /// An address string could not be parsed
    #[error("invalid address '{0}': expected <scheme>://<host>:<port>")]
    InvalidAddress(String),

    /// Direct-mode operation attempted against a routing broker (or before
    /// any registration established the broker kind)
    #[error("operation requires a DIRECT broker registration")]
    NotDirectMode,

    /// Topics must be registered before the announcement listener is
    /// detached; the listener owns the broker-feed socket afterwards.
    #[error("announcement listener already started")]
    ListenerStarted,

    /// A companion loop (relay or announcement listener) has stopped and
    /// its channel is closed. Treated as loop exit, like a closed socket.
    #[error("companion loop has stopped")]
    LoopStopped,

    /// Error surfaced from the message-queue socket layer.
    ///
    /// Bind conflicts (address in use) arrive through here and are fatal
    /// to the constructing component. A closed socket also surfaces here
    /// and means "loop exit", not a retryable failure.
    #[error("transport error: {0}")]
    Transport(#[from] zeromq::ZmqError),

    /// A frame expected to be text was not valid UTF-8
    #[error("frame is not valid UTF-8")]
    FrameUtf8(#[from] std::str::Utf8Error),

    /// A JSON payload failed to encode or decode
    #[error("invalid JSON payload: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result alias used throughout the crate
pub type Result<T> = std::result::Result<T, Error>;
