//! Company read model.
//!
//! One row per client company: contact details, active flag, and the user
//! roster. The roster is a set, so membership checks stay cheap and a
//! replayed `UserAdded` cannot double-count.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use assessly_companies::{CompanyEvent, CompanyId};
use assessly_core::{AggregateId, OrganizationId, UserId};

use crate::projections::store::{Projection, ProjectionStore};
use crate::read_model::OrganizationStore;

/// Stream discriminator for company aggregates.
pub const COMPANY_AGGREGATE_TYPE: &str = "company";

/// Read model: a client company and its user roster.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompanyProjection {
    pub company_id: CompanyId,
    pub organization_id: OrganizationId,
    pub name: String,
    pub contact_email: String,
    pub is_active: bool,
    pub members: BTreeSet<UserId>,
    pub version: u64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl CompanyProjection {
    pub fn member_count(&self) -> usize {
        self.members.len()
    }

    pub fn has_member(&self, user_id: UserId) -> bool {
        self.members.contains(&user_id)
    }
}

impl Projection for CompanyProjection {
    type Ev = CompanyEvent;

    const AGGREGATE_TYPE: &'static str = COMPANY_AGGREGATE_TYPE;
    const NAME: &'static str = "companies.by_id";

    fn scope_of(event: &CompanyEvent) -> (OrganizationId, AggregateId) {
        (event.organization_id(), event.company_id().0)
    }

    fn create(event: &CompanyEvent) -> Option<Self> {
        let CompanyEvent::CompanyCreated(e) = event else {
            return None;
        };
        Some(Self {
            company_id: e.company_id,
            organization_id: e.organization_id,
            name: e.name.clone(),
            contact_email: e.contact_email.clone(),
            is_active: true,
            members: BTreeSet::new(),
            version: 0,
            created_at: DateTime::<Utc>::MIN_UTC,
            updated_at: DateTime::<Utc>::MIN_UTC,
        })
    }

    fn fold(&mut self, event: &CompanyEvent) {
        match event {
            CompanyEvent::CompanyCreated(_) => {}
            CompanyEvent::CompanyDetailsUpdated(e) => {
                self.name = e.name.clone();
                self.contact_email = e.contact_email.clone();
            }
            CompanyEvent::UserAdded(e) => {
                self.members.insert(e.user_id);
            }
            CompanyEvent::UserRemoved(e) => {
                self.members.remove(&e.user_id);
            }
            CompanyEvent::CompanyDeactivated(_) => {
                self.is_active = false;
            }
            CompanyEvent::CompanyReactivated(_) => {
                self.is_active = true;
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

impl<S, L> ProjectionStore<CompanyProjection, S, L>
where
    S: OrganizationStore<AggregateId, CompanyProjection>,
    L: crate::event_store::EventStore,
{
    pub fn get_company(
        &self,
        organization_id: OrganizationId,
        company_id: CompanyId,
    ) -> Option<CompanyProjection> {
        self.get(organization_id, company_id.0)
    }

    pub fn list_active(&self, organization_id: OrganizationId) -> Vec<CompanyProjection> {
        self.list_where(organization_id, None, |c| c.is_active)
    }

    pub fn list_for_user(
        &self,
        organization_id: OrganizationId,
        user_id: UserId,
    ) -> Vec<CompanyProjection> {
        self.list_where(organization_id, None, |c| c.has_member(user_id))
    }
}
