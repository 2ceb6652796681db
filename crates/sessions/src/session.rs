use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use assessly_core::{Aggregate, AggregateId, AggregateRoot, DomainError, OrganizationId, UserId};
use assessly_events::{Event, EventKindError};

/// Assessment session identifier (organization-scoped via `organization_id`
/// fields in events/commands).
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(pub AggregateId);

impl SessionId {
    pub fn new(id: AggregateId) -> Self {
        Self(id)
    }
}

impl core::fmt::Display for SessionId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

/// Lifecycle status of an assessment session.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionStatus {
    Pending,
    InProgress,
    Completed,
    Cancelled,
}

/// Aggregate root: a single candidate's run through one assessment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssessmentSession {
    id: SessionId,
    organization_id: Option<OrganizationId>,
    candidate_id: Option<UserId>,
    assessment_name: String,
    question_count: u32,
    answered: u32,
    correct: u32,
    status: SessionStatus,
    version: u64,
    created: bool,
}

impl AssessmentSession {
    /// Create an empty, not-yet-created aggregate instance for rehydration.
    pub fn empty(id: SessionId) -> Self {
        Self {
            id,
            organization_id: None,
            candidate_id: None,
            assessment_name: String::new(),
            question_count: 0,
            answered: 0,
            correct: 0,
            status: SessionStatus::Pending,
            version: 0,
            created: false,
        }
    }

    pub fn id_typed(&self) -> SessionId {
        self.id
    }

    pub fn organization_id(&self) -> Option<OrganizationId> {
        self.organization_id
    }

    pub fn status(&self) -> SessionStatus {
        self.status
    }

    pub fn answered(&self) -> u32 {
        self.answered
    }

    pub fn correct(&self) -> u32 {
        self.correct
    }

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

impl AggregateRoot for AssessmentSession {
    type Id = SessionId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

/// Command: CreateSession.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateSession {
    pub organization_id: OrganizationId,
    pub session_id: SessionId,
    pub candidate_id: UserId,
    pub candidate_email: String,
    pub assessment_name: String,
    pub question_count: u32,
}

/// Command: StartSession.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StartSession {
    pub organization_id: OrganizationId,
    pub session_id: SessionId,
}

/// Command: RecordAnswer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordAnswer {
    pub organization_id: OrganizationId,
    pub session_id: SessionId,
    pub question_index: u32,
    pub correct: bool,
}

/// Command: CompleteSession.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompleteSession {
    pub organization_id: OrganizationId,
    pub session_id: SessionId,
}

/// Command: CancelSession.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CancelSession {
    pub organization_id: OrganizationId,
    pub session_id: SessionId,
    pub reason: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionCommand {
    CreateSession(CreateSession),
    StartSession(StartSession),
    RecordAnswer(RecordAnswer),
    CompleteSession(CompleteSession),
    CancelSession(CancelSession),
}

/// Event: SessionCreated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionCreated {
    pub organization_id: OrganizationId,
    pub session_id: SessionId,
    pub candidate_id: UserId,
    pub candidate_email: String,
    pub assessment_name: String,
    pub question_count: u32,
}

/// Event: SessionStarted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionStarted {
    pub organization_id: OrganizationId,
    pub session_id: SessionId,
}

/// Event: AnswerRecorded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnswerRecorded {
    pub organization_id: OrganizationId,
    pub session_id: SessionId,
    pub question_index: u32,
    pub correct: bool,
}

/// Event: SessionCompleted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionCompleted {
    pub organization_id: OrganizationId,
    pub session_id: SessionId,
    pub score_percent: u32,
}

/// Event: SessionCancelled.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionCancelled {
    pub organization_id: OrganizationId,
    pub session_id: SessionId,
    pub reason: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionEvent {
    SessionCreated(SessionCreated),
    SessionStarted(SessionStarted),
    AnswerRecorded(AnswerRecorded),
    SessionCompleted(SessionCompleted),
    SessionCancelled(SessionCancelled),
}

impl SessionEvent {
    pub fn organization_id(&self) -> OrganizationId {
        match self {
            SessionEvent::SessionCreated(e) => e.organization_id,
            SessionEvent::SessionStarted(e) => e.organization_id,
            SessionEvent::AnswerRecorded(e) => e.organization_id,
            SessionEvent::SessionCompleted(e) => e.organization_id,
            SessionEvent::SessionCancelled(e) => e.organization_id,
        }
    }

    pub fn session_id(&self) -> SessionId {
        match self {
            SessionEvent::SessionCreated(e) => e.session_id,
            SessionEvent::SessionStarted(e) => e.session_id,
            SessionEvent::AnswerRecorded(e) => e.session_id,
            SessionEvent::SessionCompleted(e) => e.session_id,
            SessionEvent::SessionCancelled(e) => e.session_id,
        }
    }
}

impl Event for SessionEvent {
    fn event_type(&self) -> &'static str {
        match self {
            SessionEvent::SessionCreated(_) => "session.created",
            SessionEvent::SessionStarted(_) => "session.started",
            SessionEvent::AnswerRecorded(_) => "session.answer_recorded",
            SessionEvent::SessionCompleted(_) => "session.completed",
            SessionEvent::SessionCancelled(_) => "session.cancelled",
        }
    }

    fn to_payload(&self) -> serde_json::Result<JsonValue> {
        match self {
            SessionEvent::SessionCreated(e) => serde_json::to_value(e),
            SessionEvent::SessionStarted(e) => serde_json::to_value(e),
            SessionEvent::AnswerRecorded(e) => serde_json::to_value(e),
            SessionEvent::SessionCompleted(e) => serde_json::to_value(e),
            SessionEvent::SessionCancelled(e) => serde_json::to_value(e),
        }
    }

    fn from_parts(event_type: &str, payload: &JsonValue) -> Result<Self, EventKindError> {
        let bad = |e: serde_json::Error| EventKindError::payload(event_type, e.to_string());
        match event_type {
            "session.created" => Ok(SessionEvent::SessionCreated(
                serde_json::from_value(payload.clone()).map_err(bad)?,
            )),
            "session.started" => Ok(SessionEvent::SessionStarted(
                serde_json::from_value(payload.clone()).map_err(bad)?,
            )),
            "session.answer_recorded" => Ok(SessionEvent::AnswerRecorded(
                serde_json::from_value(payload.clone()).map_err(bad)?,
            )),
            "session.completed" => Ok(SessionEvent::SessionCompleted(
                serde_json::from_value(payload.clone()).map_err(bad)?,
            )),
            "session.cancelled" => Ok(SessionEvent::SessionCancelled(
                serde_json::from_value(payload.clone()).map_err(bad)?,
            )),
            other => Err(EventKindError::unknown(other)),
        }
    }
}

impl Aggregate for AssessmentSession {
    type Command = SessionCommand;
    type Event = SessionEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            SessionEvent::SessionCreated(e) => {
                self.id = e.session_id;
                self.organization_id = Some(e.organization_id);
                self.candidate_id = Some(e.candidate_id);
                self.assessment_name = e.assessment_name.clone();
                self.question_count = e.question_count;
                self.answered = 0;
                self.correct = 0;
                self.status = SessionStatus::Pending;
                self.created = true;
            }
            SessionEvent::SessionStarted(_) => {
                self.status = SessionStatus::InProgress;
            }
            SessionEvent::AnswerRecorded(e) => {
                self.answered += 1;
                if e.correct {
                    self.correct += 1;
                }
            }
            SessionEvent::SessionCompleted(_) => {
                self.status = SessionStatus::Completed;
            }
            SessionEvent::SessionCancelled(_) => {
                self.status = SessionStatus::Cancelled;
            }
        }

        // Deterministic version tracking: +1 per applied event.
        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            SessionCommand::CreateSession(cmd) => self.handle_create(cmd),
            SessionCommand::StartSession(cmd) => self.handle_start(cmd),
            SessionCommand::RecordAnswer(cmd) => self.handle_answer(cmd),
            SessionCommand::CompleteSession(cmd) => self.handle_complete(cmd),
            SessionCommand::CancelSession(cmd) => self.handle_cancel(cmd),
        }
    }
}

impl AssessmentSession {
    fn ensure_organization(&self, organization_id: OrganizationId) -> Result<(), DomainError> {
        if !self.created {
            return Ok(());
        }
        if self.organization_id != Some(organization_id) {
            return Err(DomainError::invariant("organization mismatch"));
        }
        Ok(())
    }

    fn ensure_session_id(&self, session_id: SessionId) -> Result<(), DomainError> {
        if self.id != session_id {
            return Err(DomainError::invariant("session_id mismatch"));
        }
        Ok(())
    }

    fn ensure_exists(&self) -> Result<(), DomainError> {
        if !self.created {
            return Err(DomainError::not_found());
        }
        Ok(())
    }

    fn handle_create(&self, cmd: &CreateSession) -> Result<Vec<SessionEvent>, DomainError> {
        if self.created {
            return Err(DomainError::conflict("session already exists"));
        }
        if cmd.assessment_name.trim().is_empty() {
            return Err(DomainError::validation("assessment_name cannot be empty"));
        }
        if cmd.question_count == 0 {
            return Err(DomainError::validation("question_count must be positive"));
        }
        Ok(vec![SessionEvent::SessionCreated(SessionCreated {
            organization_id: cmd.organization_id,
            session_id: cmd.session_id,
            candidate_id: cmd.candidate_id,
            candidate_email: cmd.candidate_email.clone(),
            assessment_name: cmd.assessment_name.clone(),
            question_count: cmd.question_count,
        })])
    }

    fn handle_start(&self, cmd: &StartSession) -> Result<Vec<SessionEvent>, DomainError> {
        self.ensure_exists()?;
        self.ensure_organization(cmd.organization_id)?;
        self.ensure_session_id(cmd.session_id)?;

        if self.status != SessionStatus::Pending {
            return Err(DomainError::invariant("session can only start from Pending"));
        }
        Ok(vec![SessionEvent::SessionStarted(SessionStarted {
            organization_id: cmd.organization_id,
            session_id: cmd.session_id,
        })])
    }

    fn handle_answer(&self, cmd: &RecordAnswer) -> Result<Vec<SessionEvent>, DomainError> {
        self.ensure_exists()?;
        self.ensure_organization(cmd.organization_id)?;
        self.ensure_session_id(cmd.session_id)?;

        if self.status != SessionStatus::InProgress {
            return Err(DomainError::invariant("session is not in progress"));
        }
        if cmd.question_index >= self.question_count {
            return Err(DomainError::validation("question_index out of range"));
        }
        if self.answered >= self.question_count {
            return Err(DomainError::invariant("all questions already answered"));
        }
        Ok(vec![SessionEvent::AnswerRecorded(AnswerRecorded {
            organization_id: cmd.organization_id,
            session_id: cmd.session_id,
            question_index: cmd.question_index,
            correct: cmd.correct,
        })])
    }

    fn handle_complete(&self, cmd: &CompleteSession) -> Result<Vec<SessionEvent>, DomainError> {
        self.ensure_exists()?;
        self.ensure_organization(cmd.organization_id)?;
        self.ensure_session_id(cmd.session_id)?;

        if self.status != SessionStatus::InProgress {
            return Err(DomainError::invariant("only an in-progress session can complete"));
        }
        Ok(vec![SessionEvent::SessionCompleted(SessionCompleted {
            organization_id: cmd.organization_id,
            session_id: cmd.session_id,
            score_percent: self.score_percent(),
        })])
    }

    fn handle_cancel(&self, cmd: &CancelSession) -> Result<Vec<SessionEvent>, DomainError> {
        self.ensure_exists()?;
        self.ensure_organization(cmd.organization_id)?;
        self.ensure_session_id(cmd.session_id)?;

        match self.status {
            SessionStatus::Pending | SessionStatus::InProgress => {
                Ok(vec![SessionEvent::SessionCancelled(SessionCancelled {
                    organization_id: cmd.organization_id,
                    session_id: cmd.session_id,
                    reason: cmd.reason.clone(),
                })])
            }
            _ => Err(DomainError::invariant("session already finished")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assessly_events::execute;

    fn org() -> OrganizationId {
        OrganizationId::new()
    }

    fn sid() -> SessionId {
        SessionId::new(AggregateId::new())
    }

    fn created(organization_id: OrganizationId, session_id: SessionId) -> AssessmentSession {
        let mut s = AssessmentSession::empty(session_id);
        execute(
            &mut s,
            &SessionCommand::CreateSession(CreateSession {
                organization_id,
                session_id,
                candidate_id: UserId::new(),
                candidate_email: "candidate@example.com".to_string(),
                assessment_name: "Backend Screening".to_string(),
                question_count: 4,
            }),
        )
        .unwrap();
        s
    }

    #[test]
    fn create_seeds_state_at_version_one() {
        let s = created(org(), sid());
        assert_eq!(s.version(), 1);
        assert_eq!(s.status(), SessionStatus::Pending);
        assert!(s.organization_id().is_some());
    }

    #[test]
    fn double_create_is_a_conflict() {
        let organization_id = org();
        let session_id = sid();
        let s = created(organization_id, session_id);

        let err = s
            .handle(&SessionCommand::CreateSession(CreateSession {
                organization_id,
                session_id,
                candidate_id: UserId::new(),
                candidate_email: "other@example.com".to_string(),
                assessment_name: "Backend Screening".to_string(),
                question_count: 4,
            }))
            .unwrap_err();
        assert!(matches!(err, DomainError::Conflict(_)));
    }

    #[test]
    fn answers_accumulate_and_score_is_derived() {
        let organization_id = org();
        let session_id = sid();
        let mut s = created(organization_id, session_id);

        execute(
            &mut s,
            &SessionCommand::StartSession(StartSession {
                organization_id,
                session_id,
            }),
        )
        .unwrap();

        for (i, correct) in [true, true, false].into_iter().enumerate() {
            execute(
                &mut s,
                &SessionCommand::RecordAnswer(RecordAnswer {
                    organization_id,
                    session_id,
                    question_index: i as u32,
                    correct,
                }),
            )
            .unwrap();
        }

        assert_eq!(s.answered(), 3);
        assert_eq!(s.correct(), 2);
        assert_eq!(s.score_percent(), 66);

        let events = execute(
            &mut s,
            &SessionCommand::CompleteSession(CompleteSession {
                organization_id,
                session_id,
            }),
        )
        .unwrap();
        match &events[0] {
            SessionEvent::SessionCompleted(e) => assert_eq!(e.score_percent, 66),
            other => panic!("unexpected event: {other:?}"),
        }
        assert_eq!(s.status(), SessionStatus::Completed);
    }

    #[test]
    fn answer_requires_in_progress() {
        let organization_id = org();
        let session_id = sid();
        let s = created(organization_id, session_id);

        let err = s
            .handle(&SessionCommand::RecordAnswer(RecordAnswer {
                organization_id,
                session_id,
                question_index: 0,
                correct: true,
            }))
            .unwrap_err();
        assert!(matches!(err, DomainError::InvariantViolation(_)));
    }

    #[test]
    fn cancel_after_completion_is_rejected() {
        let organization_id = org();
        let session_id = sid();
        let mut s = created(organization_id, session_id);
        execute(
            &mut s,
            &SessionCommand::StartSession(StartSession {
                organization_id,
                session_id,
            }),
        )
        .unwrap();
        execute(
            &mut s,
            &SessionCommand::CompleteSession(CompleteSession {
                organization_id,
                session_id,
            }),
        )
        .unwrap();

        let err = s
            .handle(&SessionCommand::CancelSession(CancelSession {
                organization_id,
                session_id,
                reason: None,
            }))
            .unwrap_err();
        assert!(matches!(err, DomainError::InvariantViolation(_)));
    }

    #[test]
    fn wrong_organization_is_rejected() {
        let session_id = sid();
        let s = created(org(), session_id);

        let err = s
            .handle(&SessionCommand::StartSession(StartSession {
                organization_id: org(),
                session_id,
            }))
            .unwrap_err();
        assert!(matches!(err, DomainError::InvariantViolation(_)));
    }

    #[test]
    fn event_parts_round_trip_and_unknown_kind_is_loud() {
        let ev = SessionEvent::SessionStarted(SessionStarted {
            organization_id: org(),
            session_id: sid(),
        });
        let payload = ev.to_payload().unwrap();
        let back = SessionEvent::from_parts(ev.event_type(), &payload).unwrap();
        assert_eq!(ev, back);

        let err = SessionEvent::from_parts("session.paused", &payload).unwrap_err();
        assert!(matches!(err, EventKindError::Unknown { .. }));
    }

    mod proptest_tests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #![proptest_config(ProptestConfig {
                cases: 256,
                ..ProptestConfig::default()
            })]

            /// Property: replaying the emitted events onto a fresh instance
            /// reproduces the evolved state exactly.
            #[test]
            fn replay_reproduces_state(answers in proptest::collection::vec(any::<bool>(), 1..20)) {
                let organization_id = org();
                let session_id = sid();
                let question_count = answers.len() as u32;

                let mut live = AssessmentSession::empty(session_id);
                let mut log = Vec::new();

                let mut run = |s: &mut AssessmentSession, cmd: SessionCommand| {
                    let evs = execute(s, &cmd).unwrap();
                    log.extend(evs);
                };

                run(&mut live, SessionCommand::CreateSession(CreateSession {
                    organization_id,
                    session_id,
                    candidate_id: UserId::new(),
                    candidate_email: "candidate@example.com".to_string(),
                    assessment_name: "Screening".to_string(),
                    question_count,
                }));
                run(&mut live, SessionCommand::StartSession(StartSession { organization_id, session_id }));
                for (i, correct) in answers.iter().enumerate() {
                    run(&mut live, SessionCommand::RecordAnswer(RecordAnswer {
                        organization_id,
                        session_id,
                        question_index: i as u32,
                        correct: *correct,
                    }));
                }

                let mut replayed = AssessmentSession::empty(session_id);
                for ev in &log {
                    replayed.apply(ev);
                }
                prop_assert_eq!(live, replayed);
            }

            /// Property: handle is deterministic (same state + command = same events).
            #[test]
            fn handle_is_deterministic(correct in any::<bool>(), idx in 0u32..4) {
                let organization_id = org();
                let session_id = sid();
                let mut s = created(organization_id, session_id);
                execute(&mut s, &SessionCommand::StartSession(StartSession {
                    organization_id,
                    session_id,
                })).unwrap();

                let cmd = SessionCommand::RecordAnswer(RecordAnswer {
                    organization_id,
                    session_id,
                    question_index: idx,
                    correct,
                });
                prop_assert_eq!(s.handle(&cmd).unwrap(), s.handle(&cmd).unwrap());
            }
        }
    }
}
