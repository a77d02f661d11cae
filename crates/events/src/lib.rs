//! Ledger events and their distribution.
//!
//! Domain crates describe what happened as [`Event`]s; the engine wraps committed
//! events in an [`EventEnvelope`] and fans them out over an [`EventBus`].

pub mod bus;
pub mod envelope;
pub mod event;
pub mod handler;
pub mod in_memory_bus;

pub use bus::{EventBus, Subscription};
pub use envelope::EventEnvelope;
pub use event::Event;
pub use handler::execute;
pub use in_memory_bus::{InMemoryBusError, InMemoryEventBus};
