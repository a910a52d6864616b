//! In-process events between product modules.
//!
//! Producers emit named events with a JSON payload; consumers subscribe by
//! name. Delivery never crosses the process boundary and nothing is persisted.

pub mod bus;
pub mod event;
pub mod handler;

pub use bus::{EmitReport, EventBus, ListenerFailure, SubscriptionHandle};
pub use event::{Event, names};
pub use handler::{EventHandler, HandlerError, SharedHandler, handler_fn};
