//! Generic projection engine.
//!
//! One read-model row per aggregate, advanced event by event. All three
//! read models (sessions, companies, license pools) share this engine and
//! differ only in their [`Projection`] impl.

use std::marker::PhantomData;

use chrono::{DateTime, Utc};
use serde_json::Value as JsonValue;
use thiserror::Error;
use tracing::warn;

use assessly_core::{AggregateId, OrganizationId};
use assessly_events::{Event, EventEnvelope, EventKindError};

use crate::event_store::{DEFAULT_QUERY_LIMIT, EventStore, EventStoreError, StoredEvent};
use crate::read_model::{GlobalStore, OrganizationStore};

/// A read-model row that can be derived from one aggregate's event stream.
///
/// Rows carry the version of the last event folded in; the engine uses it
/// for idempotency and ordering, the row itself never touches it.
pub trait Projection: Clone + Send + Sync + 'static {
    type Ev: Event;

    /// Stream discriminator this read model consumes. Events of any other
    /// aggregate type are ignored, not errors.
    const AGGREGATE_TYPE: &'static str;

    /// Stable name used in logs.
    const NAME: &'static str;

    /// Organization and aggregate the event belongs to, read from the payload.
    fn scope_of(event: &Self::Ev) -> (OrganizationId, AggregateId);

    /// Build the initial row, or `None` if this event kind cannot open a stream.
    fn create(event: &Self::Ev) -> Option<Self>;

    /// Fold one subsequent event into the row.
    fn fold(&mut self, event: &Self::Ev);

    /// Version of the last event folded into this row.
    fn version(&self) -> u64;

    /// Record that the event at `version` (stamped `occurred_at`) was folded.
    fn advance(&mut self, version: u64, occurred_at: DateTime<Utc>);
}

#[derive(Debug, Error)]
pub enum ProjectionError {
    #[error(transparent)]
    Kind(#[from] EventKindError),

    #[error("organization isolation violation: {0}")]
    OrganizationIsolation(String),

    /// A row already exists for the aggregate a creation event targets.
    #[error("read model row already exists for aggregate {aggregate_id}")]
    AlreadyExists { aggregate_id: AggregateId },

    /// A non-creation event arrived for an aggregate with no row. The
    /// caller creates or rebuilds first.
    #[error("no read model row for aggregate {aggregate_id}")]
    Missing { aggregate_id: AggregateId },

    /// The event kind cannot do what the caller asked of it (e.g. a
    /// non-creation event passed to `create`).
    #[error("event '{event_type}' cannot create a read model row")]
    InvalidEventKind { event_type: String },

    /// The incoming event is ahead of the row and the log could not bridge
    /// the gap. Should not happen against a store with contiguous streams.
    #[error("read model at v{at} cannot reach incoming event v{found}")]
    OutOfOrder { at: u64, found: u64 },

    #[error(transparent)]
    Store(#[from] EventStoreError),
}

/// What a single `apply` did.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ApplyOutcome {
    /// The event advanced the row by exactly one version.
    Applied,
    /// The event was at or behind the row's version; dropped (idempotency).
    AlreadyApplied,
    /// The event was ahead; the engine caught up from the log instead.
    GapFilled { applied: usize },
    /// The event belongs to a different aggregate type.
    Ignored,
}

/// Event-driven maintainer of one read model.
///
/// Couples an organization-isolated row store with the event log the rows
/// are derived from. The log handle is what makes gap recovery possible:
/// an out-of-order delivery triggers a catch-up read rather than a failure.
pub struct ProjectionStore<P, S, L> {
    store: S,
    log: L,
    _projection: PhantomData<P>,
}

impl<P, S, L> ProjectionStore<P, S, L>
where
    P: Projection,
    S: OrganizationStore<AggregateId, P>,
    L: EventStore,
{
    pub fn new(store: S, log: L) -> Self {
        Self {
            store,
            log,
            _projection: PhantomData,
        }
    }

    /// Point lookup. Never replays.
    pub fn get(&self, organization_id: OrganizationId, aggregate_id: AggregateId) -> Option<P> {
        self.store.get(organization_id, &aggregate_id)
    }

    /// Organization-scoped listing. `limit` defaults to
    /// [`DEFAULT_QUERY_LIMIT`]; listings are always bounded.
    pub fn list(&self, organization_id: OrganizationId, limit: Option<usize>) -> Vec<P> {
        let limit = limit.unwrap_or(DEFAULT_QUERY_LIMIT);
        let mut rows = self.store.list(organization_id);
        rows.truncate(limit);
        rows
    }

    pub fn list_where(
        &self,
        organization_id: OrganizationId,
        limit: Option<usize>,
        predicate: impl Fn(&P) -> bool,
    ) -> Vec<P> {
        let limit = limit.unwrap_or(DEFAULT_QUERY_LIMIT);
        self.store
            .list(organization_id)
            .into_iter()
            .filter(|row| predicate(row))
            .take(limit)
            .collect()
    }

    /// Seed a row from a creation event.
    ///
    /// `AlreadyExists` if the aggregate already has a row,
    /// `InvalidEventKind` if the event cannot open a stream.
    pub fn create(&self, stored: &StoredEvent) -> Result<P, ProjectionError> {
        if stored.aggregate_type != P::AGGREGATE_TYPE {
            return Err(ProjectionError::InvalidEventKind {
                event_type: stored.event_type.clone(),
            });
        }

        let event: P::Ev = stored.decode()?;
        Self::check_scope(stored, &event)?;

        if self
            .store
            .get(stored.organization_id, &stored.aggregate_id)
            .is_some()
        {
            return Err(ProjectionError::AlreadyExists {
                aggregate_id: stored.aggregate_id,
            });
        }

        let row = Self::step(None, stored, &event)?;
        self.store
            .upsert(stored.organization_id, stored.aggregate_id, row.clone());
        Ok(row)
    }

    /// Apply one committed event to the read model.
    ///
    /// Sequential (`row.version + 1`) events fold directly. Events at or
    /// behind the row's version are dropped, which makes redelivery safe.
    /// Events ahead of an existing row trigger a catch-up read from the
    /// log; events for an aggregate with no row (other than a v1 creation)
    /// fail `Missing` so the caller rebuilds deliberately.
    pub fn apply(&self, stored: &StoredEvent) -> Result<ApplyOutcome, ProjectionError> {
        if stored.aggregate_type != P::AGGREGATE_TYPE {
            return Ok(ApplyOutcome::Ignored);
        }

        let event: P::Ev = stored.decode()?;
        Self::check_scope(stored, &event)?;

        let organization_id = stored.organization_id;
        let aggregate_id = stored.aggregate_id;

        let row = self.store.get(organization_id, &aggregate_id);
        let at = row.as_ref().map(P::version).unwrap_or(0);

        if row.is_none() && stored.version > 1 {
            return Err(ProjectionError::Missing { aggregate_id });
        }

        if stored.version <= at {
            return Ok(ApplyOutcome::AlreadyApplied);
        }

        if stored.version == at + 1 {
            let next = Self::step(row, stored, &event)?;
            self.store.upsert(organization_id, aggregate_id, next);
            return Ok(ApplyOutcome::Applied);
        }

        // The row is behind by more than one event: catch up from the log.
        warn!(
            projection = P::NAME,
            %aggregate_id,
            at,
            found = stored.version,
            "read model behind the log, catching up"
        );

        let missing = self.log.events_after(organization_id, aggregate_id, at)?;

        let mut row = row;
        let mut applied = 0usize;
        for e in &missing {
            let ev: P::Ev = e.decode()?;
            Self::check_scope(e, &ev)?;
            row = Some(Self::step(row, e, &ev)?);
            applied += 1;
        }

        let reached = row.as_ref().map(P::version).unwrap_or(0);
        if reached < stored.version {
            return Err(ProjectionError::OutOfOrder {
                at: reached,
                found: stored.version,
            });
        }
        if let Some(row) = row {
            self.store.upsert(organization_id, aggregate_id, row);
        }

        Ok(ApplyOutcome::GapFilled { applied })
    }

    /// Apply an event published on the bus.
    pub fn ingest(
        &self,
        envelope: &EventEnvelope<JsonValue>,
    ) -> Result<ApplyOutcome, ProjectionError> {
        self.apply(&StoredEvent::from_envelope(envelope))
    }

    /// Recovery path: replay one aggregate's full stream from the log into
    /// a fresh row. `Ok(None)` when the log holds nothing for the aggregate.
    pub fn rebuild(
        &self,
        organization_id: OrganizationId,
        aggregate_id: AggregateId,
    ) -> Result<Option<P>, ProjectionError> {
        let history = self.log.events(organization_id, aggregate_id)?;

        let mut row: Option<P> = None;
        for stored in &history {
            if stored.aggregate_type != P::AGGREGATE_TYPE {
                return Ok(None);
            }
            let event: P::Ev = stored.decode()?;
            Self::check_scope(stored, &event)?;
            row = Some(Self::step(row, stored, &event)?);
        }

        if let Some(row) = &row {
            self.store
                .upsert(organization_id, aggregate_id, row.clone());
        }
        Ok(row)
    }

    /// Throw away an organization's rows and rebuild them from the given
    /// events. Foreign aggregate types and other organizations' events are
    /// filtered out, so the full log can be passed as-is.
    pub fn rebuild_organization(
        &self,
        organization_id: OrganizationId,
        events: impl IntoIterator<Item = StoredEvent>,
    ) -> Result<usize, ProjectionError> {
        self.store.clear_organization(organization_id);

        let mut events: Vec<StoredEvent> = events
            .into_iter()
            .filter(|e| {
                e.organization_id == organization_id && e.aggregate_type == P::AGGREGATE_TYPE
            })
            .collect();
        events.sort_by_key(|e| (*e.aggregate_id.as_uuid().as_bytes(), e.version));

        let mut applied = 0usize;
        for e in &events {
            if self.apply(e)? == ApplyOutcome::Applied {
                applied += 1;
            }
        }
        Ok(applied)
    }

    fn check_scope(stored: &StoredEvent, event: &P::Ev) -> Result<(), ProjectionError> {
        let (organization_id, aggregate_id) = P::scope_of(event);
        if organization_id != stored.organization_id {
            return Err(ProjectionError::OrganizationIsolation(
                "event organization_id does not match stream organization_id".to_string(),
            ));
        }
        if aggregate_id != stored.aggregate_id {
            return Err(ProjectionError::OrganizationIsolation(
                "event aggregate id does not match stream aggregate_id".to_string(),
            ));
        }
        Ok(())
    }

    fn step(row: Option<P>, stored: &StoredEvent, event: &P::Ev) -> Result<P, ProjectionError> {
        let mut next = match row {
            Some(mut row) => {
                row.fold(event);
                row
            }
            None => P::create(event).ok_or_else(|| ProjectionError::InvalidEventKind {
                event_type: stored.event_type.clone(),
            })?,
        };
        next.advance(stored.version, stored.occurred_at);
        Ok(next)
    }
}

impl<P, S, L> ProjectionStore<P, S, L>
where
    P: Projection,
    S: OrganizationStore<AggregateId, P> + GlobalStore<AggregateId, P>,
    L: EventStore,
{
    /// Platform-admin listing across all organizations. Only reachable when
    /// the read backend carries the [`GlobalStore`] capability.
    pub fn list_global(&self, limit: Option<usize>) -> Vec<P> {
        let limit = limit.unwrap_or(DEFAULT_QUERY_LIMIT);
        let mut rows = self.store.list_all();
        rows.truncate(limit);
        rows
    }
}
