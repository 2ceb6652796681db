use std::collections::HashMap;
use std::sync::RwLock;

use chrono::Utc;

use assessly_core::{AggregateId, OrganizationId};

use super::r#trait::{
    DEFAULT_QUERY_LIMIT, EventStore, EventStoreError, GlobalEventQuery, StoredEvent,
    UncommittedEvent,
};

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
struct StreamKey {
    organization_id: OrganizationId,
    aggregate_id: AggregateId,
}

/// In-memory append-only event store.
///
/// Streams are kept per (organization, aggregate); a secondary index keeps
/// every organization's events in append order so organization-wide reads
/// don't scan the whole map. Intended for tests/dev.
#[derive(Debug, Default)]
pub struct InMemoryEventStore {
    streams: RwLock<HashMap<StreamKey, Vec<StoredEvent>>>,
    by_organization: RwLock<HashMap<OrganizationId, Vec<StoredEvent>>>,
}

impl InMemoryEventStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn current_version(stream: &[StoredEvent]) -> u64 {
        stream.last().map(|e| e.version).unwrap_or(0)
    }

    fn validate(event: &UncommittedEvent) -> Result<(), EventStoreError> {
        if event.event_id.is_nil() {
            return Err(EventStoreError::Validation("event_id is nil".to_string()));
        }
        if event.organization_id.is_nil() {
            return Err(EventStoreError::Validation(
                "organization_id is nil".to_string(),
            ));
        }
        if event.aggregate_id.is_nil() {
            return Err(EventStoreError::Validation(
                "aggregate_id is nil".to_string(),
            ));
        }
        if event.aggregate_type.trim().is_empty() {
            return Err(EventStoreError::Validation(
                "aggregate_type is empty".to_string(),
            ));
        }
        if event.event_type.trim().is_empty() {
            return Err(EventStoreError::Validation(
                "event_type is empty".to_string(),
            ));
        }
        if event.version == 0 {
            return Err(EventStoreError::Validation(
                "version must start at 1".to_string(),
            ));
        }
        Ok(())
    }
}

impl EventStore for InMemoryEventStore {
    fn append(&self, event: UncommittedEvent) -> Result<StoredEvent, EventStoreError> {
        Self::validate(&event)?;

        let key = StreamKey {
            organization_id: event.organization_id,
            aggregate_id: event.aggregate_id,
        };

        let mut streams = self
            .streams
            .write()
            .map_err(|_| EventStoreError::Storage("streams lock poisoned".to_string()))?;

        let stream = streams.entry(key).or_default();
        let current = Self::current_version(stream);

        if event.version <= current {
            return Err(EventStoreError::Concurrency(format!(
                "version {} already committed for aggregate {} (stream is at {current})",
                event.version, event.aggregate_id
            )));
        }
        if event.version > current + 1 {
            return Err(EventStoreError::Validation(format!(
                "version {} would leave a gap for aggregate {} (stream is at {current})",
                event.version, event.aggregate_id
            )));
        }

        // Enforce aggregate type stability across the stream.
        if let Some(existing) = stream.first() {
            if existing.aggregate_type != event.aggregate_type {
                return Err(EventStoreError::Validation(format!(
                    "stream aggregate_type is '{}', attempted append with '{}'",
                    existing.aggregate_type, event.aggregate_type
                )));
            }
        }

        let stored = StoredEvent {
            event_id: event.event_id,
            organization_id: event.organization_id,
            aggregate_id: event.aggregate_id,
            aggregate_type: event.aggregate_type,
            event_type: event.event_type,
            schema_version: event.schema_version,
            version: event.version,
            occurred_at: Utc::now(),
            payload: event.payload,
        };

        stream.push(stored.clone());

        let mut by_org = self
            .by_organization
            .write()
            .map_err(|_| EventStoreError::Storage("organization index lock poisoned".to_string()))?;
        by_org
            .entry(stored.organization_id)
            .or_default()
            .push(stored.clone());

        Ok(stored)
    }

    fn events(
        &self,
        organization_id: OrganizationId,
        aggregate_id: AggregateId,
    ) -> Result<Vec<StoredEvent>, EventStoreError> {
        let key = StreamKey {
            organization_id,
            aggregate_id,
        };

        let streams = self
            .streams
            .read()
            .map_err(|_| EventStoreError::Storage("streams lock poisoned".to_string()))?;

        Ok(streams.get(&key).cloned().unwrap_or_default())
    }

    fn events_after(
        &self,
        organization_id: OrganizationId,
        aggregate_id: AggregateId,
        after_version: u64,
    ) -> Result<Vec<StoredEvent>, EventStoreError> {
        let key = StreamKey {
            organization_id,
            aggregate_id,
        };

        let streams = self
            .streams
            .read()
            .map_err(|_| EventStoreError::Storage("streams lock poisoned".to_string()))?;

        let Some(stream) = streams.get(&key) else {
            return Ok(vec![]);
        };

        // Versions are contiguous from 1, so `after_version` is also an index.
        let skip = (after_version as usize).min(stream.len());
        Ok(stream[skip..].to_vec())
    }

    fn events_by_organization(
        &self,
        organization_id: OrganizationId,
        limit: Option<usize>,
    ) -> Result<Vec<StoredEvent>, EventStoreError> {
        let limit = limit.unwrap_or(DEFAULT_QUERY_LIMIT);

        let by_org = self
            .by_organization
            .read()
            .map_err(|_| EventStoreError::Storage("organization index lock poisoned".to_string()))?;

        let Some(events) = by_org.get(&organization_id) else {
            return Ok(vec![]);
        };

        // Append order tracks occurred_at; newest-first is a reverse walk.
        Ok(events.iter().rev().take(limit).cloned().collect())
    }
}

impl GlobalEventQuery for InMemoryEventStore {
    fn all_events(&self, limit: Option<usize>) -> Result<Vec<StoredEvent>, EventStoreError> {
        let limit = limit.unwrap_or(DEFAULT_QUERY_LIMIT);

        let by_org = self
            .by_organization
            .read()
            .map_err(|_| EventStoreError::Storage("organization index lock poisoned".to_string()))?;

        let mut all: Vec<StoredEvent> = by_org.values().flatten().cloned().collect();
        all.sort_by(|a, b| b.occurred_at.cmp(&a.occurred_at));
        all.truncate(limit);
        Ok(all)
    }
}
