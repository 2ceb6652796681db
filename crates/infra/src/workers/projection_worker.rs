use std::sync::Arc;
use std::sync::mpsc;
use std::thread;
use std::time::Duration;

use serde_json::Value as JsonValue;
use tracing::warn;

use assessly_core::{AggregateId, OrganizationId};
use assessly_events::{EventBus, EventEnvelope, Subscription};

use crate::event_store::EventStore;
use crate::projections::{ApplyOutcome, Projection, ProjectionStore};
use crate::read_model::OrganizationStore;

/// Handle to control and join a background worker.
#[derive(Debug)]
pub struct WorkerHandle {
    shutdown: mpsc::Sender<()>,
    join: Option<thread::JoinHandle<()>>,
}

impl WorkerHandle {
    /// Request graceful shutdown and wait for the worker to stop.
    pub fn shutdown(mut self) {
        let _ = self.shutdown.send(());
        if let Some(j) = self.join.take() {
            let _ = j.join();
        }
    }
}

/// Background maintainer of one read model.
///
/// Subscribes to the bus and feeds every envelope into
/// [`ProjectionStore::ingest`]. Foreign aggregate types come back `Ignored`,
/// so a single bus fans out to one worker per read model; redelivered
/// envelopes are idempotent no-ops. A failed envelope is logged and skipped,
/// never fatal: the row stays recoverable through `rebuild`.
#[derive(Debug)]
pub struct ProjectionWorker;

impl ProjectionWorker {
    /// Spawn a worker thread that keeps `projection` current from `bus`.
    ///
    /// When `organization_id` is given, envelopes of other organizations are
    /// skipped (pin a worker to one organization while backfilling it).
    pub fn spawn<P, S, L, B>(
        bus: B,
        organization_id: Option<OrganizationId>,
        projection: Arc<ProjectionStore<P, S, L>>,
    ) -> WorkerHandle
    where
        P: Projection,
        S: OrganizationStore<AggregateId, P> + Send + Sync + 'static,
        L: EventStore + Send + Sync + 'static,
        B: EventBus<EventEnvelope<JsonValue>> + Send + Sync + 'static,
    {
        let (shutdown_tx, shutdown_rx) = mpsc::channel::<()>();
        let sub: Subscription<EventEnvelope<JsonValue>> = bus.subscribe();

        let join = thread::Builder::new()
            .name(P::NAME.to_string())
            .spawn(move || worker_loop(sub, shutdown_rx, organization_id, &projection))
            .expect("failed to spawn projection worker thread");

        WorkerHandle {
            shutdown: shutdown_tx,
            join: Some(join),
        }
    }
}

fn worker_loop<P, S, L>(
    sub: Subscription<EventEnvelope<JsonValue>>,
    shutdown_rx: mpsc::Receiver<()>,
    organization_id: Option<OrganizationId>,
    projection: &ProjectionStore<P, S, L>,
) where
    P: Projection,
    S: OrganizationStore<AggregateId, P>,
    L: EventStore,
{
    let tick = Duration::from_millis(250);

    loop {
        // Shutdown check (non-blocking)
        if shutdown_rx.try_recv().is_ok() {
            break;
        }

        match sub.recv_timeout(tick) {
            Ok(envelope) => {
                if let Some(org) = organization_id {
                    if envelope.organization_id() != org {
                        continue;
                    }
                }

                match projection.ingest(&envelope) {
                    Ok(ApplyOutcome::GapFilled { applied }) => {
                        warn!(
                            projection = P::NAME,
                            applied, "caught up after out-of-order delivery"
                        );
                    }
                    Ok(_) => {}
                    Err(err) => {
                        warn!(projection = P::NAME, error = %err, "envelope not applied");
                    }
                }
            }
            Err(mpsc::RecvTimeoutError::Timeout) => continue,
            Err(mpsc::RecvTimeoutError::Disconnected) => break,
        }
    }
}
