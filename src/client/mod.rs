//! Client libraries for producer and consumer processes
//!
//! - [`Publisher`] binds a broadcast socket, registers topics with the
//!   broker, and sends framed envelopes fire-and-forget.
//! - [`Subscriber`] registers topics, receives envelopes (relayed or
//!   direct), and dispatches them to an application callback. In direct
//!   mode it additionally runs an [`AnnouncementListener`] loop to learn
//!   about publishers that appear after it registered.

pub mod publisher;
pub mod subscriber;

pub use publisher::Publisher;
pub use subscriber::{printing_callback, AnnouncementListener, Callback, Subscriber};
