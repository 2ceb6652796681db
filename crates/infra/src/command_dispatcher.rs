//! Command execution pipeline (application-level orchestration).
//!
//! Implements the command dispatch pattern for event-sourced aggregates:
//!
//! ```text
//! Command
//!   ↓
//! 1. Load events from store (organization-scoped)
//!   ↓
//! 2. Rehydrate aggregate (apply historical events to rebuild state)
//!   ↓
//! 3. Handle command (pure decision logic, produces events)
//!   ↓
//! 4. Persist events to store (append-only, optimistic concurrency check)
//!   ↓
//! 5. Publish events to bus (for projections, handlers, etc.)
//! ```
//!
//! The pipeline is identical for every aggregate, so it lives here once.
//! Organization isolation, optimistic concurrency and event ordering are
//! enforced in this layer, keeping domain code pure. This module contains
//! no IO itself; it composes the `EventStore` and `EventBus` traits, so
//! tests run it against the in-memory implementations.

use serde_json::Value as JsonValue;
use thiserror::Error;
use uuid::Uuid;

use assessly_core::{Aggregate, AggregateId, DomainError, ExpectedVersion, OrganizationId};
use assessly_events::{Event, EventBus, EventEnvelope, EventKindError};

use crate::event_store::{EventStore, EventStoreError, StoredEvent, UncommittedEvent};

#[derive(Debug, Error)]
pub enum DispatchError {
    /// Optimistic concurrency failure (stale aggregate version).
    #[error("concurrency conflict: {0}")]
    Concurrency(String),

    /// Organization isolation violation (cross-organization stream mixing).
    #[error("organization isolation violation: {0}")]
    OrganizationIsolation(String),

    /// Domain validation failure (deterministic).
    #[error("validation failed: {0}")]
    Validation(String),

    /// Domain invariant failure (deterministic).
    #[error("invariant violated: {0}")]
    InvariantViolation(String),

    /// Domain-level not found.
    #[error("not found")]
    NotFound,

    /// Historical event payloads could not be decoded into the aggregate's
    /// event type.
    #[error(transparent)]
    Kind(#[from] EventKindError),

    /// Persisting to the event store failed.
    #[error(transparent)]
    Store(EventStoreError),

    /// Publication failed after a successful append (at-least-once; the
    /// events are durable, only the fan-out is missing).
    #[error("event publication failed: {0}")]
    Publish(String),
}

impl From<EventStoreError> for DispatchError {
    fn from(value: EventStoreError) -> Self {
        match &value {
            EventStoreError::Concurrency(msg) => DispatchError::Concurrency(msg.clone()),
            EventStoreError::OrganizationIsolation(msg) => {
                DispatchError::OrganizationIsolation(msg.clone())
            }
            _ => DispatchError::Store(value),
        }
    }
}

impl From<DomainError> for DispatchError {
    fn from(value: DomainError) -> Self {
        match value {
            DomainError::Validation(msg) => DispatchError::Validation(msg),
            DomainError::InvariantViolation(msg) => DispatchError::InvariantViolation(msg),
            DomainError::Conflict(msg) => DispatchError::Concurrency(msg),
            DomainError::NotFound => DispatchError::NotFound,
            DomainError::InvalidId(msg) => DispatchError::Validation(msg),
        }
    }
}

/// Reusable command execution engine for event-sourced aggregates.
///
/// Sits between the API layer and the infrastructure layer and gives every
/// command the same execution model:
///
/// - events are persisted before publication (a failed append publishes
///   nothing);
/// - each decided event is appended at `current + 1`, so a concurrent
///   writer surfaces as `DispatchError::Concurrency` and the caller retries
///   by re-dispatching;
/// - a publish failure after the append returns `Publish` with the events
///   already durable (at-least-once delivery, and projections self-heal).
#[derive(Debug)]
pub struct CommandDispatcher<S, B> {
    store: S,
    bus: B,
}

impl<S, B> CommandDispatcher<S, B> {
    pub fn new(store: S, bus: B) -> Self {
        Self { store, bus }
    }

    pub fn into_parts(self) -> (S, B) {
        (self.store, self.bus)
    }
}

impl<S, B> CommandDispatcher<S, B>
where
    S: EventStore,
    B: EventBus<EventEnvelope<JsonValue>>,
{
    /// Dispatch a command through the full pipeline.
    ///
    /// `make_aggregate` builds the fresh instance history is replayed onto
    /// (e.g. `AssessmentSession::empty(id)`); the dispatcher stays generic
    /// over how aggregates are constructed.
    ///
    /// Returns the committed events with their assigned versions and
    /// append-time timestamps.
    pub fn dispatch<A>(
        &self,
        organization_id: OrganizationId,
        aggregate_id: AggregateId,
        aggregate_type: impl Into<String>,
        command: A::Command,
        make_aggregate: impl FnOnce(OrganizationId, AggregateId) -> A,
    ) -> Result<Vec<StoredEvent>, DispatchError>
    where
        A: Aggregate<Error = DomainError>,
        A::Event: Event,
    {
        self.dispatch_expecting(
            organization_id,
            aggregate_id,
            aggregate_type,
            command,
            ExpectedVersion::Any,
            make_aggregate,
        )
    }

    /// Like [`dispatch`](Self::dispatch), but fails with `Concurrency` if
    /// the stream is not at `expected` when loaded. Lets a caller carry a
    /// version read earlier (e.g. from a form) through to the write.
    pub fn dispatch_expecting<A>(
        &self,
        organization_id: OrganizationId,
        aggregate_id: AggregateId,
        aggregate_type: impl Into<String>,
        command: A::Command,
        expected: ExpectedVersion,
        make_aggregate: impl FnOnce(OrganizationId, AggregateId) -> A,
    ) -> Result<Vec<StoredEvent>, DispatchError>
    where
        A: Aggregate<Error = DomainError>,
        A::Event: Event,
    {
        // 1) Load history (organization-scoped)
        let history = self.store.events(organization_id, aggregate_id)?;
        validate_loaded_stream(organization_id, aggregate_id, &history)?;

        let current = history.last().map(|e| e.version).unwrap_or(0);
        if !expected.matches(current) {
            return Err(DispatchError::Concurrency(format!(
                "expected {expected:?}, found {current}"
            )));
        }

        // 2) Rehydrate aggregate
        let mut aggregate = make_aggregate(organization_id, aggregate_id);
        for stored in &history {
            let ev: A::Event = stored.decode()?;
            aggregate.apply(&ev);
        }

        // 3) Decide events (no mutation)
        let decided = aggregate.handle(&command).map_err(DispatchError::from)?;
        if decided.is_empty() {
            return Ok(vec![]);
        }

        // 4+5) Persist at current+1.. and publish each committed event.
        let aggregate_type = aggregate_type.into();
        let mut committed = Vec::with_capacity(decided.len());
        for (offset, ev) in decided.iter().enumerate() {
            let uncommitted = UncommittedEvent::from_typed(
                organization_id,
                aggregate_id,
                aggregate_type.clone(),
                Uuid::now_v7(),
                current + 1 + offset as u64,
                ev,
            )?;

            let stored = self.store.append(uncommitted)?;
            self.bus
                .publish(stored.to_envelope())
                .map_err(|e| DispatchError::Publish(format!("{e:?}")))?;
            committed.push(stored);
        }

        Ok(committed)
    }
}

fn validate_loaded_stream(
    organization_id: OrganizationId,
    aggregate_id: AggregateId,
    stream: &[StoredEvent],
) -> Result<(), DispatchError> {
    // Re-check isolation and ordering even though the store already
    // guarantees both; a buggy backend must not leak across organizations.
    for (idx, e) in stream.iter().enumerate() {
        if e.organization_id != organization_id {
            return Err(DispatchError::OrganizationIsolation(format!(
                "loaded stream contains wrong organization_id at index {idx}"
            )));
        }
        if e.aggregate_id != aggregate_id {
            return Err(DispatchError::OrganizationIsolation(format!(
                "loaded stream contains wrong aggregate_id at index {idx}"
            )));
        }
        if e.version != idx as u64 + 1 {
            return Err(DispatchError::Store(EventStoreError::Validation(format!(
                "loaded stream is not contiguous (index {idx}, version {})",
                e.version
            ))));
        }
    }
    Ok(())
}
