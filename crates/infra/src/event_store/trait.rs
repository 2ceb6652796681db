use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use thiserror::Error;
use uuid::Uuid;

use assessly_core::{AggregateId, OrganizationId};
use assessly_events::{Event, EventEnvelope, EventKindError};
use std::sync::Arc;

/// Bound applied to list queries when the caller passes no explicit limit.
///
/// Every query is finite; unbounded reads of the log are not offered.
pub const DEFAULT_QUERY_LIMIT: usize = 500;

/// An event ready to be appended to a stream.
///
/// The caller chooses `version`: it must have read the stream's current
/// version and picked `current + 1`. The append-time slot check on
/// (`organization_id`, `aggregate_id`, `version`) is the optimistic
/// concurrency guard — if another writer committed that slot first, the
/// append fails and the caller retries with a freshly read version.
///
/// `occurred_at` is deliberately absent: the store assigns it at append
/// time and it is immutable afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UncommittedEvent {
    pub event_id: Uuid,
    pub organization_id: OrganizationId,
    pub aggregate_id: AggregateId,
    pub aggregate_type: String,

    pub event_type: String,
    pub schema_version: u32,

    /// 1-based position the caller expects this event to occupy.
    pub version: u64,

    pub payload: JsonValue,
}

impl UncommittedEvent {
    /// Convenience constructor from a typed domain event.
    ///
    /// Keeps infra decoupled from business code while still capturing the
    /// kind metadata needed for later decoding.
    pub fn from_typed<E>(
        organization_id: OrganizationId,
        aggregate_id: AggregateId,
        aggregate_type: impl Into<String>,
        event_id: Uuid,
        version: u64,
        event: &E,
    ) -> Result<Self, EventStoreError>
    where
        E: Event,
    {
        let payload = event.to_payload().map_err(|e| {
            EventStoreError::Validation(format!("payload serialization failed: {e}"))
        })?;

        Ok(Self {
            event_id,
            organization_id,
            aggregate_id,
            aggregate_type: aggregate_type.into(),
            event_type: event.event_type().to_string(),
            schema_version: event.schema_version(),
            version,
            payload,
        })
    }
}

/// A committed event in an append-only stream.
///
/// This is the storage/wire shape other components depend on. Once
/// committed, every field is immutable; events are never updated or
/// deleted. The tuple (`organization_id`, `aggregate_id`, `version`) is
/// unique and versions are contiguous from 1.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredEvent {
    pub event_id: Uuid,
    pub organization_id: OrganizationId,
    pub aggregate_id: AggregateId,
    pub aggregate_type: String,

    pub event_type: String,
    pub schema_version: u32,

    /// Monotonically increasing position in the aggregate stream.
    pub version: u64,

    /// Assigned by the store at append time.
    pub occurred_at: DateTime<Utc>,

    pub payload: JsonValue,
}

impl StoredEvent {
    /// Convert into an organization-scoped envelope for publication.
    pub fn to_envelope(&self) -> EventEnvelope<JsonValue> {
        EventEnvelope::new(
            self.event_id,
            self.organization_id,
            self.aggregate_id,
            self.aggregate_type.clone(),
            self.event_type.clone(),
            self.version,
            self.occurred_at,
            self.payload.clone(),
        )
    }

    /// Rebuild the stored shape from a published envelope.
    pub fn from_envelope(envelope: &EventEnvelope<JsonValue>) -> Self {
        Self {
            event_id: envelope.event_id(),
            organization_id: envelope.organization_id(),
            aggregate_id: envelope.aggregate_id(),
            aggregate_type: envelope.aggregate_type().to_string(),
            event_type: envelope.event_type().to_string(),
            schema_version: 1,
            version: envelope.version(),
            occurred_at: envelope.occurred_at(),
            payload: envelope.payload().clone(),
        }
    }

    /// Decode the payload into a typed domain event.
    pub fn decode<E: Event>(&self) -> Result<E, EventKindError> {
        E::from_parts(&self.event_type, &self.payload)
    }
}

/// Event store operation error.
///
/// Infrastructure errors (storage) are kept distinguishable from business
/// conflicts (`Concurrency`) so the command layer can retry only the latter.
#[derive(Debug, Error)]
pub enum EventStoreError {
    /// The target (aggregate, version) slot is already occupied, or the
    /// caller's view of the stream is stale. Recoverable: re-read the
    /// current version and retry.
    #[error("optimistic concurrency conflict: {0}")]
    Concurrency(String),

    /// Malformed event (missing/invalid required field, or an append that
    /// would create a version gap). Not retried automatically.
    #[error("invalid event: {0}")]
    Validation(String),

    /// Cross-organization access attempted (security violation).
    #[error("organization isolation violation: {0}")]
    OrganizationIsolation(String),

    /// Backend failure (lock poisoning, connectivity). Propagated unchanged.
    #[error("storage failure: {0}")]
    Storage(String),

    /// Event publication failed after a successful append.
    #[error("event publication failed: {0}")]
    Publish(String),
}

/// Append-only, organization-scoped event store.
///
/// The single source of truth. Streams are keyed by
/// (`organization_id`, `aggregate_id`); within a stream versions are
/// contiguous starting at 1. Appended events are immediately visible to all
/// subsequent reads.
///
/// Lookups the implementations must keep sub-linear: by
/// (`aggregate_id`, `organization_id`, `version`) and by
/// (`organization_id`, `occurred_at`).
///
/// `NotFound` is not part of the error surface: reads of unknown or
/// wrong-organization aggregates return an empty sequence.
pub trait EventStore: Send + Sync {
    /// Persist one event.
    ///
    /// - `Validation` if a required field is missing/invalid, or if
    ///   `event.version > current + 1` (committing it would create a gap).
    /// - `Concurrency` if `event.version <= current` (the slot is occupied:
    ///   another writer won the race).
    ///
    /// On success the returned event carries the append-time `occurred_at`.
    fn append(&self, event: UncommittedEvent) -> Result<StoredEvent, EventStoreError>;

    /// Full ordered stream (version ascending) for one aggregate, scoped to
    /// the organization. Empty if unknown or owned by another organization.
    fn events(
        &self,
        organization_id: OrganizationId,
        aggregate_id: AggregateId,
    ) -> Result<Vec<StoredEvent>, EventStoreError>;

    /// Events with `version > after_version`, ascending. Used for
    /// incremental projection catch-up.
    fn events_after(
        &self,
        organization_id: OrganizationId,
        aggregate_id: AggregateId,
        after_version: u64,
    ) -> Result<Vec<StoredEvent>, EventStoreError>;

    /// All events for one organization across aggregates, newest-first.
    /// `limit` defaults to [`DEFAULT_QUERY_LIMIT`].
    fn events_by_organization(
        &self,
        organization_id: OrganizationId,
        limit: Option<usize>,
    ) -> Result<Vec<StoredEvent>, EventStoreError>;
}

/// Platform-admin capability: cross-organization event queries.
///
/// Deliberately a separate trait rather than a method on [`EventStore`]:
/// request-scoped code holds `&dyn EventStore` and cannot reach the
/// unscoped query by accident. Authorization for handing out this
/// capability is the caller's concern.
pub trait GlobalEventQuery: Send + Sync {
    /// All events across organizations, newest-first.
    /// `limit` defaults to [`DEFAULT_QUERY_LIMIT`].
    fn all_events(&self, limit: Option<usize>) -> Result<Vec<StoredEvent>, EventStoreError>;
}

impl<S> EventStore for Arc<S>
where
    S: EventStore + ?Sized,
{
    fn append(&self, event: UncommittedEvent) -> Result<StoredEvent, EventStoreError> {
        (**self).append(event)
    }

    fn events(
        &self,
        organization_id: OrganizationId,
        aggregate_id: AggregateId,
    ) -> Result<Vec<StoredEvent>, EventStoreError> {
        (**self).events(organization_id, aggregate_id)
    }

    fn events_after(
        &self,
        organization_id: OrganizationId,
        aggregate_id: AggregateId,
        after_version: u64,
    ) -> Result<Vec<StoredEvent>, EventStoreError> {
        (**self).events_after(organization_id, aggregate_id, after_version)
    }

    fn events_by_organization(
        &self,
        organization_id: OrganizationId,
        limit: Option<usize>,
    ) -> Result<Vec<StoredEvent>, EventStoreError> {
        (**self).events_by_organization(organization_id, limit)
    }
}

impl<S> GlobalEventQuery for Arc<S>
where
    S: GlobalEventQuery + ?Sized,
{
    fn all_events(&self, limit: Option<usize>) -> Result<Vec<StoredEvent>, EventStoreError> {
        (**self).all_events(limit)
    }
}
