use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};

use std::sync::Arc;

use assessly_core::{AggregateId, OrganizationId, UserId};
use assessly_events::{EventEnvelope, InMemoryEventBus};
use assessly_infra::command_dispatcher::CommandDispatcher;
use assessly_infra::event_store::{EventStore, InMemoryEventStore, StoredEvent, UncommittedEvent};
use assessly_infra::projections::{ProjectionStore, SESSION_AGGREGATE_TYPE, SessionProjection};
use assessly_infra::read_model::InMemoryOrganizationStore;
use assessly_sessions::{
    AnswerRecorded, AssessmentSession, CreateSession, RecordAnswer, SessionCommand,
    SessionCreated, SessionEvent, SessionId, SessionStarted, StartSession,
};

type Bus = Arc<InMemoryEventBus<EventEnvelope<serde_json::Value>>>;
type Dispatcher = CommandDispatcher<Arc<InMemoryEventStore>, Bus>;

fn setup_dispatcher() -> (Dispatcher, Arc<InMemoryEventStore>, OrganizationId) {
    let store = Arc::new(InMemoryEventStore::new());
    let bus: Bus = Arc::new(InMemoryEventBus::new());
    let dispatcher = CommandDispatcher::new(store.clone(), bus);
    (dispatcher, store, OrganizationId::new())
}

fn create_session(
    dispatcher: &Dispatcher,
    organization_id: OrganizationId,
    session_id: SessionId,
    question_count: u32,
) {
    dispatcher
        .dispatch(
            organization_id,
            session_id.0,
            SESSION_AGGREGATE_TYPE,
            SessionCommand::CreateSession(CreateSession {
                organization_id,
                session_id,
                candidate_id: UserId::new(),
                candidate_email: "candidate@example.com".to_string(),
                assessment_name: "Backend Screening".to_string(),
                question_count,
            }),
            |_, id| AssessmentSession::empty(SessionId::new(id)),
        )
        .unwrap();
}

fn bench_command_execution_latency(c: &mut Criterion) {
    let mut group = c.benchmark_group("command_execution_latency");
    group.sample_size(1000);

    // CreateSession command (first command, no history)
    group.bench_function("create_session_fresh", |b| {
        let (dispatcher, _, organization_id) = setup_dispatcher();
        b.iter(|| {
            let session_id = SessionId::new(AggregateId::new());
            create_session(&dispatcher, organization_id, session_id, black_box(20));
        });
    });

    // RecordAnswer command against a growing stream (with history)
    group.bench_function("record_answer_with_history", |b| {
        let (dispatcher, _, organization_id) = setup_dispatcher();
        let session_id = SessionId::new(AggregateId::new());

        create_session(&dispatcher, organization_id, session_id, u32::MAX);
        dispatcher
            .dispatch(
                organization_id,
                session_id.0,
                SESSION_AGGREGATE_TYPE,
                SessionCommand::StartSession(StartSession {
                    organization_id,
                    session_id,
                }),
                |_, id| AssessmentSession::empty(SessionId::new(id)),
            )
            .unwrap();

        b.iter(|| {
            dispatcher
                .dispatch(
                    organization_id,
                    session_id.0,
                    SESSION_AGGREGATE_TYPE,
                    SessionCommand::RecordAnswer(RecordAnswer {
                        organization_id,
                        session_id,
                        question_index: black_box(0),
                        correct: true,
                    }),
                    |_, id| AssessmentSession::empty(SessionId::new(id)),
                )
                .unwrap();
        });
    });

    group.finish();
}

fn bench_event_append_throughput(c: &mut Criterion) {
    let mut group = c.benchmark_group("event_append_throughput");

    for batch_size in [1usize, 10, 100, 1000].iter() {
        group.throughput(Throughput::Elements(*batch_size as u64));
        group.bench_with_input(
            BenchmarkId::new("sequential_append", batch_size),
            batch_size,
            |b, &size| {
                let store = InMemoryEventStore::new();
                let organization_id = OrganizationId::new();
                let session_id = SessionId::new(AggregateId::new());
                let mut version = 0u64;

                b.iter(|| {
                    for _ in 0..size {
                        version += 1;
                        let event = if version == 1 {
                            SessionEvent::SessionCreated(SessionCreated {
                                organization_id,
                                session_id,
                                candidate_id: UserId::new(),
                                candidate_email: "candidate@example.com".to_string(),
                                assessment_name: "Backend Screening".to_string(),
                                question_count: u32::MAX,
                            })
                        } else {
                            SessionEvent::AnswerRecorded(AnswerRecorded {
                                organization_id,
                                session_id,
                                question_index: 0,
                                correct: true,
                            })
                        };
                        let uncommitted = UncommittedEvent::from_typed(
                            organization_id,
                            session_id.0,
                            SESSION_AGGREGATE_TYPE,
                            uuid::Uuid::now_v7(),
                            version,
                            &event,
                        )
                        .unwrap();
                        black_box(store.append(uncommitted).unwrap());
                    }
                });
            },
        );
    }

    group.finish();
}

fn seed_stream(count: usize) -> (Arc<InMemoryEventStore>, OrganizationId, Vec<StoredEvent>) {
    let store = Arc::new(InMemoryEventStore::new());
    let organization_id = OrganizationId::new();
    let session_id = SessionId::new(AggregateId::new());

    let mut events = Vec::with_capacity(count);
    for version in 1..=count as u64 {
        let event = match version {
            1 => SessionEvent::SessionCreated(SessionCreated {
                organization_id,
                session_id,
                candidate_id: UserId::new(),
                candidate_email: "candidate@example.com".to_string(),
                assessment_name: "Backend Screening".to_string(),
                question_count: u32::MAX,
            }),
            2 => SessionEvent::SessionStarted(SessionStarted {
                organization_id,
                session_id,
            }),
            _ => SessionEvent::AnswerRecorded(AnswerRecorded {
                organization_id,
                session_id,
                question_index: 0,
                correct: version % 2 == 0,
            }),
        };
        let uncommitted = UncommittedEvent::from_typed(
            organization_id,
            session_id.0,
            SESSION_AGGREGATE_TYPE,
            uuid::Uuid::now_v7(),
            version,
            &event,
        )
        .unwrap();
        events.push(store.append(uncommitted).unwrap());
    }

    (store, organization_id, events)
}

fn bench_projection_apply_and_rebuild(c: &mut Criterion) {
    let mut group = c.benchmark_group("projection_apply_and_rebuild");

    for event_count in [10usize, 100, 1000, 10000].iter() {
        group.bench_with_input(
            BenchmarkId::new("apply_sequential", event_count),
            event_count,
            |b, &count| {
                let (store, _, events) = seed_stream(count);

                b.iter(|| {
                    let projection = ProjectionStore::<SessionProjection, _, _>::new(
                        Arc::new(InMemoryOrganizationStore::new()),
                        store.clone(),
                    );
                    for e in &events {
                        projection.apply(black_box(e)).unwrap();
                    }
                });
            },
        );

        group.bench_with_input(
            BenchmarkId::new("rebuild_organization", event_count),
            event_count,
            |b, &count| {
                let (store, organization_id, events) = seed_stream(count);
                let projection = ProjectionStore::<SessionProjection, _, _>::new(
                    Arc::new(InMemoryOrganizationStore::new()),
                    store,
                );

                b.iter(|| {
                    projection
                        .rebuild_organization(organization_id, black_box(events.clone()))
                        .unwrap();
                });
            },
        );
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_command_execution_latency,
    bench_event_append_throughput,
    bench_projection_apply_and_rebuild
);
criterion_main!(benches);
