//! License pool read model.
//!
//! One row per pool. Only the primitive counters are stored; `available`,
//! `is_warning` and `is_depleted` are recomputed on every read so they can
//! never drift from the counters they summarize.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use assessly_core::{AggregateId, OrganizationId};
use assessly_licensing::{LicensePoolEvent, LicensePoolId};

use crate::projections::store::{Projection, ProjectionStore};
use crate::read_model::OrganizationStore;

/// Stream discriminator for license pool aggregates.
pub const LICENSE_POOL_AGGREGATE_TYPE: &str = "license_pool";

/// Read model: purchased-vs-consumed license counts for one assessment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LicensePoolProjection {
    pub pool_id: LicensePoolId,
    pub organization_id: OrganizationId,
    pub assessment_name: String,
    pub total_purchased: u64,
    pub consumed: u64,
    pub warning_threshold: u64,
    pub is_active: bool,
    pub version: u64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl LicensePoolProjection {
    pub fn available(&self) -> u64 {
        self.total_purchased.saturating_sub(self.consumed)
    }

    /// Running low: at or below the threshold (a depleted pool still warns).
    pub fn is_warning(&self) -> bool {
        self.available() <= self.warning_threshold
    }

    pub fn is_depleted(&self) -> bool {
        self.available() == 0
    }
}

impl Projection for LicensePoolProjection {
    type Ev = LicensePoolEvent;

    const AGGREGATE_TYPE: &'static str = LICENSE_POOL_AGGREGATE_TYPE;
    const NAME: &'static str = "license_pools.by_id";

    fn scope_of(event: &LicensePoolEvent) -> (OrganizationId, AggregateId) {
        (event.organization_id(), event.pool_id().0)
    }

    fn create(event: &LicensePoolEvent) -> Option<Self> {
        let LicensePoolEvent::PoolCreated(e) = event else {
            return None;
        };
        Some(Self {
            pool_id: e.pool_id,
            organization_id: e.organization_id,
            assessment_name: e.assessment_name.clone(),
            total_purchased: e.total_purchased,
            consumed: 0,
            warning_threshold: e.warning_threshold,
            is_active: true,
            version: 0,
            created_at: DateTime::<Utc>::MIN_UTC,
            updated_at: DateTime::<Utc>::MIN_UTC,
        })
    }

    fn fold(&mut self, event: &LicensePoolEvent) {
        match event {
            LicensePoolEvent::PoolCreated(_) => {}
            LicensePoolEvent::LicensesConsumed(e) => {
                self.consumed += e.count;
            }
            LicensePoolEvent::LicensesReleased(e) => {
                self.consumed = self.consumed.saturating_sub(e.count);
            }
            LicensePoolEvent::LicensesPurchased(e) => {
                self.total_purchased += e.count;
            }
            LicensePoolEvent::WarningThresholdChanged(e) => {
                self.warning_threshold = e.warning_threshold;
            }
            LicensePoolEvent::PoolDeactivated(_) => {
                self.is_active = false;
            }
        }
    }

    fn version(&self) -> u64 {
        self.version
    }

    fn advance(&mut self, version: u64, occurred_at: DateTime<Utc>) {
        if self.version == 0 {
            self.created_at = occurred_at;
        }
        self.version = version;
        self.updated_at = occurred_at;
    }
}

impl<S, L> ProjectionStore<LicensePoolProjection, S, L>
where
    S: OrganizationStore<AggregateId, LicensePoolProjection>,
    L: crate::event_store::EventStore,
{
    pub fn get_pool(
        &self,
        organization_id: OrganizationId,
        pool_id: LicensePoolId,
    ) -> Option<LicensePoolProjection> {
        self.get(organization_id, pool_id.0)
    }

    pub fn list_active(&self, organization_id: OrganizationId) -> Vec<LicensePoolProjection> {
        self.list_where(organization_id, None, |p| p.is_active)
    }

    /// Pools running low on licenses (for notification fan-out).
    pub fn list_warning(&self, organization_id: OrganizationId) -> Vec<LicensePoolProjection> {
        self.list_where(organization_id, None, |p| p.is_warning())
    }

    pub fn list_depleted(&self, organization_id: OrganizationId) -> Vec<LicensePoolProjection> {
        self.list_where(organization_id, None, |p| p.is_depleted())
    }
}

#[cfg(test)]
mod tests {
    use assessly_licensing::{
        LicensesConsumed, LicensesPurchased, LicensesReleased, PoolCreated,
    };
    use std::sync::Arc;

    use super::*;
    use crate::event_store::{EventStore, InMemoryEventStore, StoredEvent, UncommittedEvent};
    use crate::read_model::InMemoryOrganizationStore;

    type Store = ProjectionStore<
        LicensePoolProjection,
        Arc<InMemoryOrganizationStore<AggregateId, LicensePoolProjection>>,
        Arc<InMemoryEventStore>,
    >;

    fn fixture() -> (Store, Arc<InMemoryEventStore>) {
        let log = Arc::new(InMemoryEventStore::new());
        let rows = Arc::new(InMemoryOrganizationStore::new());
        (ProjectionStore::new(rows, log.clone()), log)
    }

    fn append(
        log: &Arc<InMemoryEventStore>,
        organization_id: OrganizationId,
        pool_id: LicensePoolId,
        version: u64,
        event: &LicensePoolEvent,
    ) -> StoredEvent {
        let uncommitted = UncommittedEvent::from_typed(
            organization_id,
            pool_id.0,
            LICENSE_POOL_AGGREGATE_TYPE,
            uuid::Uuid::now_v7(),
            version,
            event,
        )
        .unwrap();
        log.append(uncommitted).unwrap()
    }

    fn created(
        organization_id: OrganizationId,
        pool_id: LicensePoolId,
        total: u64,
        threshold: u64,
    ) -> LicensePoolEvent {
        LicensePoolEvent::PoolCreated(PoolCreated {
            organization_id,
            pool_id,
            assessment_name: "Backend Screening".to_string(),
            total_purchased: total,
            warning_threshold: threshold,
        })
    }

    #[test]
    fn warning_and_depleted_are_derived_from_counters() {
        let (proj, log) = fixture();
        let organization_id = OrganizationId::new();
        let pool_id = LicensePoolId::new(AggregateId::new());

        let mut version = 0;
        let mut feed = |event: &LicensePoolEvent| {
            version += 1;
            let stored = append(&log, organization_id, pool_id, version, event);
            proj.apply(&stored).unwrap();
        };

        feed(&created(organization_id, pool_id, 10, 2));
        feed(&LicensePoolEvent::LicensesConsumed(LicensesConsumed {
            organization_id,
            pool_id,
            count: 8,
        }));

        let row = proj.get_pool(organization_id, pool_id).unwrap();
        assert_eq!(row.available(), 2);
        assert!(row.is_warning());
        assert!(!row.is_depleted());
        assert_eq!(proj.list_warning(organization_id).len(), 1);

        feed(&LicensePoolEvent::LicensesConsumed(LicensesConsumed {
            organization_id,
            pool_id,
            count: 2,
        }));

        let row = proj.get_pool(organization_id, pool_id).unwrap();
        assert_eq!(row.available(), 0);
        assert!(row.is_warning());
        assert!(row.is_depleted());
        assert_eq!(proj.list_depleted(organization_id).len(), 1);
    }

    #[test]
    fn release_and_purchase_move_the_counters_back() {
        let (proj, log) = fixture();
        let organization_id = OrganizationId::new();
        let pool_id = LicensePoolId::new(AggregateId::new());

        let mut version = 0;
        let mut feed = |event: &LicensePoolEvent| {
            version += 1;
            let stored = append(&log, organization_id, pool_id, version, event);
            proj.apply(&stored).unwrap();
        };

        feed(&created(organization_id, pool_id, 5, 1));
        feed(&LicensePoolEvent::LicensesConsumed(LicensesConsumed {
            organization_id,
            pool_id,
            count: 5,
        }));
        feed(&LicensePoolEvent::LicensesReleased(LicensesReleased {
            organization_id,
            pool_id,
            count: 2,
        }));
        feed(&LicensePoolEvent::LicensesPurchased(LicensesPurchased {
            organization_id,
            pool_id,
            count: 10,
        }));

        let row = proj.get_pool(organization_id, pool_id).unwrap();
        assert_eq!(row.total_purchased, 15);
        assert_eq!(row.consumed, 3);
        assert_eq!(row.available(), 12);
        assert!(!row.is_warning());
        assert_eq!(row.version, 4);
    }

    #[test]
    fn rebuild_reproduces_derived_state() {
        let (proj, log) = fixture();
        let organization_id = OrganizationId::new();
        let pool_id = LicensePoolId::new(AggregateId::new());

        let mut events = Vec::new();
        events.push(append(
            &log,
            organization_id,
            pool_id,
            1,
            &created(organization_id, pool_id, 10, 2),
        ));
        events.push(append(
            &log,
            organization_id,
            pool_id,
            2,
            &LicensePoolEvent::LicensesConsumed(LicensesConsumed {
                organization_id,
                pool_id,
                count: 9,
            }),
        ));

        let applied = proj.rebuild_organization(organization_id, events).unwrap();
        assert_eq!(applied, 2);

        let row = proj.get_pool(organization_id, pool_id).unwrap();
        assert_eq!(row.available(), 1);
        assert!(row.is_warning());

        // Per-aggregate rebuild from the log lands on the same row.
        let again = proj.rebuild(organization_id, pool_id.0).unwrap().unwrap();
        assert_eq!(again, row);
    }
}
