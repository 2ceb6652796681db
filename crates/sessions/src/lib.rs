//! Assessment sessions domain module.

pub mod session;

pub use session::{
    AnswerRecorded, AssessmentSession, CancelSession, CompleteSession, CreateSession,
    RecordAnswer, SessionCancelled, SessionCommand, SessionCompleted, SessionCreated, SessionEvent,
    SessionId, SessionStarted, SessionStatus, StartSession,
};
