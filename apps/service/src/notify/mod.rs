//! Notification decision, digest composition, and delivery.

pub mod gate;
pub mod transport;

pub use gate::{DIGEST_SUBJECT, NotificationGate, RunMode};
pub use transport::{SmtpTransport, Transport, TransportError};
