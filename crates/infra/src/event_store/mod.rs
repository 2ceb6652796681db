//! Append-only event store boundary.
//!
//! Defines the organization-scoped storage abstraction the rest of the
//! platform builds on, without making any storage-engine assumptions.

pub mod in_memory;
pub mod r#trait;

pub use in_memory::InMemoryEventStore;
pub use r#trait::{
    DEFAULT_QUERY_LIMIT, EventStore, EventStoreError, GlobalEventQuery, StoredEvent,
    UncommittedEvent,
};

/// Adapter that publishes committed events to an `EventBus` after a successful append.
///
/// This ensures the ordering invariant: **publish happens only after append succeeds**.
pub struct PublishingEventStore<S, B> {
    store: S,
    bus: B,
}

impl<S, B> PublishingEventStore<S, B> {
    pub fn new(store: S, bus: B) -> Self {
        Self { store, bus }
    }

    pub fn into_parts(self) -> (S, B) {
        (self.store, self.bus)
    }
}

impl<S, B> EventStore for PublishingEventStore<S, B>
where
    S: EventStore,
    B: assessly_events::EventBus<assessly_events::EventEnvelope<serde_json::Value>>,
{
    fn append(&self, event: UncommittedEvent) -> Result<StoredEvent, EventStoreError> {
        // 1) Append (durable step)
        let committed = self.store.append(event)?;

        // 2) Publish the committed event (best-effort; at-least-once acceptable)
        self.bus
            .publish(committed.to_envelope())
            .map_err(|err| EventStoreError::Publish(format!("{err:?}")))?;

        Ok(committed)
    }

    fn events(
        &self,
        organization_id: assessly_core::OrganizationId,
        aggregate_id: assessly_core::AggregateId,
    ) -> Result<Vec<StoredEvent>, EventStoreError> {
        self.store.events(organization_id, aggregate_id)
    }

    fn events_after(
        &self,
        organization_id: assessly_core::OrganizationId,
        aggregate_id: assessly_core::AggregateId,
        after_version: u64,
    ) -> Result<Vec<StoredEvent>, EventStoreError> {
        self.store.events_after(organization_id, aggregate_id, after_version)
    }

    fn events_by_organization(
        &self,
        organization_id: assessly_core::OrganizationId,
        limit: Option<usize>,
    ) -> Result<Vec<StoredEvent>, EventStoreError> {
        self.store.events_by_organization(organization_id, limit)
    }
}
