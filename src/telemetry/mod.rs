//! Live telemetry over a Unix stream socket.
//!
//! The measurement loop publishes each completed [`crate::analysis::Levels`]
//! record through a [`TelemetryPublisher`]; a background thread forwards the
//! latest one to every connected client as a JSON object.

pub mod message;
pub mod server;

pub use message::{TelemetryMessage, TelemetryValues};
pub use server::{TelemetryBroadcaster, TelemetryPublisher, ACCEPT_INTERVAL, MAX_CLIENTS};
