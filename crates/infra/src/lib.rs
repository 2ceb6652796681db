//! Infrastructure layer: event log, command dispatch, read models, projections.

pub mod event_store;
pub mod command_dispatcher;
pub mod read_model;
pub mod projections;
pub mod workers;
pub mod external;
