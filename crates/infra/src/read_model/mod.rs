//! Read-model storage abstractions.
//!
//! Read models are disposable: they can always be rebuilt from the event log,
//! so the store interface is a plain organization-isolated key/value surface.

pub mod organization_store;

pub use organization_store::{GlobalStore, InMemoryOrganizationStore, OrganizationStore};
