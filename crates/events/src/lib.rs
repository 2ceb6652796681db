//! `assessly-events` — domain-agnostic event machinery.
//!
//! Event trait + envelope (the wire shape other components depend on) and
//! the pub/sub abstraction used to fan events out to projections.

pub mod bus;
pub mod envelope;
pub mod event;
pub mod handler;
pub mod in_memory_bus;
pub mod scope;

pub use bus::{EventBus, Subscription};
pub use envelope::EventEnvelope;
pub use event::{Event, EventKindError};
pub use handler::execute;
pub use in_memory_bus::{InMemoryBusError, InMemoryEventBus};
pub use scope::OrganizationScoped;
