//! Assessment session read model.
//!
//! One row per session: who is taking what, how far along, and the running
//! score. Score is derived from the answer counters on every read rather
//! than stored, so a replayed or rebuilt row can never disagree with itself.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use assessly_core::{AggregateId, OrganizationId, UserId};
use assessly_sessions::{SessionEvent, SessionId, SessionStatus};

use crate::projections::store::{Projection, ProjectionStore};
use crate::read_model::OrganizationStore;

/// Stream discriminator for assessment session aggregates.
pub const SESSION_AGGREGATE_TYPE: &str = "assessment_session";

/// Read model: one candidate's run through one assessment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionProjection {
    pub session_id: SessionId,
    pub organization_id: OrganizationId,
    pub candidate_id: UserId,
    pub candidate_email: String,
    pub assessment_name: String,
    pub status: SessionStatus,
    pub question_count: u32,
    pub answered: u32,
    pub correct: u32,
    pub version: u64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl SessionProjection {
    /// Percentage of answered questions that were correct (0 when nothing
    /// was answered yet).
    pub fn score_percent(&self) -> u32 {
        if self.answered == 0 {
            0
        } else {
            self.correct * 100 / self.answered
        }
    }
}

impl Projection for SessionProjection {
    type Ev = SessionEvent;

    const AGGREGATE_TYPE: &'static str = SESSION_AGGREGATE_TYPE;
    const NAME: &'static str = "sessions.by_id";

    fn scope_of(event: &SessionEvent) -> (OrganizationId, AggregateId) {
        (event.organization_id(), event.session_id().0)
    }

    fn create(event: &SessionEvent) -> Option<Self> {
        let SessionEvent::SessionCreated(e) = event else {
            return None;
        };
        Some(Self {
            session_id: e.session_id,
            organization_id: e.organization_id,
            candidate_id: e.candidate_id,
            candidate_email: e.candidate_email.clone(),
            assessment_name: e.assessment_name.clone(),
            status: SessionStatus::Pending,
            question_count: e.question_count,
            answered: 0,
            correct: 0,
            version: 0,
            created_at: DateTime::<Utc>::MIN_UTC,
            updated_at: DateTime::<Utc>::MIN_UTC,
        })
    }

    fn fold(&mut self, event: &SessionEvent) {
        match event {
            // A stream holds a single create; nothing to fold.
            SessionEvent::SessionCreated(_) => {}
            SessionEvent::SessionStarted(_) => {
                self.status = SessionStatus::InProgress;
            }
            SessionEvent::AnswerRecorded(e) => {
                self.answered += 1;
                if e.correct {
                    self.correct += 1;
                }
            }
            // The payload carries a score snapshot; the row keeps deriving
            // its own from the counters.
            SessionEvent::SessionCompleted(_) => {
                self.status = SessionStatus::Completed;
            }
            SessionEvent::SessionCancelled(_) => {
                self.status = SessionStatus::Cancelled;
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

impl<S, L> ProjectionStore<SessionProjection, S, L>
where
    S: OrganizationStore<AggregateId, SessionProjection>,
    L: crate::event_store::EventStore,
{
    pub fn get_session(
        &self,
        organization_id: OrganizationId,
        session_id: SessionId,
    ) -> Option<SessionProjection> {
        self.get(organization_id, session_id.0)
    }

    pub fn list_by_status(
        &self,
        organization_id: OrganizationId,
        status: SessionStatus,
    ) -> Vec<SessionProjection> {
        self.list_where(organization_id, None, |s| s.status == status)
    }

    pub fn list_for_candidate(
        &self,
        organization_id: OrganizationId,
        candidate_id: UserId,
    ) -> Vec<SessionProjection> {
        self.list_where(organization_id, None, |s| s.candidate_id == candidate_id)
    }
}
