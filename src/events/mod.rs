//! Execution event log
//!
//! A bounded, append-only log of execution events shared by every
//! component, with replay and live subscription.

pub mod types;
pub mod bus;

pub use types::{Event, Level, NewEvent, Status, StreamFrame};
pub use bus::{EventBus, DEFAULT_CAPACITY, DEFAULT_HEARTBEAT};
