//! Optimistic mutation execution.
//!
//! A mutation moves through `Idle -> OptimisticallyApplied` and settles
//! as `Committed`, `RolledBack` or `Queued`. The local change is visible
//! before the first remote call; a terminal failure reverts exactly that
//! change and nothing else.

use crate::cancel::Ticket;
use crate::config::ExhaustedRetryPolicy;
use crate::error::{ClassifiedError, SyncError, SyncResult};
use crate::offline::OfflineQueue;
use crate::remote::{perform_step, RemoteEntityService};
use crate::retry::RetryScheduler;
use clipdeck_core::{CollectionChange, EntityId, OrderedCollectionStore};
use clipdeck_protocol::{plan_steps, EntityKind, IdRemap, Remap, RemoteEntity, RemoteStep};
use clipdeck_storage::KeyValueStore;
use parking_lot::Mutex;
use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Lifecycle of one mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MutationState {
    /// Not started.
    Idle,
    /// Applied locally, remote calls outstanding.
    OptimisticallyApplied,
    /// Confirmed by the service.
    Committed,
    /// Reverted after a terminal failure.
    RolledBack,
    /// Kept locally and handed to the offline queue.
    Queued,
}

impl MutationState {
    /// Returns true for the three settled states.
    #[must_use]
    pub const fn is_settled(self) -> bool {
        matches!(self, Self::Committed | Self::RolledBack | Self::Queued)
    }
}

impl fmt::Display for MutationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::OptimisticallyApplied => "optimistically_applied",
            Self::Committed => "committed",
            Self::RolledBack => "rolled_back",
            Self::Queued => "queued",
        };
        f.write_str(name)
    }
}

/// How a mutation settled without an error.
#[derive(Debug, Clone, PartialEq)]
pub struct MutationOutcome {
    /// `Committed` or `Queued`.
    pub state: MutationState,
    /// Placeholder ids replaced by authoritative ones.
    pub remap: IdRemap,
}

impl MutationOutcome {
    fn new(state: MutationState, remap: IdRemap) -> Self {
        Self { state, remap }
    }

    /// Authoritative id for `id`, which may be a placeholder.
    #[must_use]
    pub fn resolve(&self, id: EntityId) -> EntityId {
        self.remap.resolve(id)
    }
}

/// How queued work joins the offline log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Enqueue {
    /// Append after everything queued.
    #[default]
    Append,
    /// Replace queued work for the same entity.
    Supersede,
}

enum Settlement {
    Committed,
    Queued,
    /// Work was queued but the caller still sees an error.
    QueuedWithError(SyncError),
    Failed(SyncError),
}

struct InFlight<'a>(&'a AtomicUsize);

impl<'a> InFlight<'a> {
    fn enter(counter: &'a AtomicUsize) -> Self {
        counter.fetch_add(1, Ordering::SeqCst);
        Self(counter)
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Applies mutations optimistically and drives them to the service.
///
/// The executor is the only writer of the stores it is handed. Each call
/// keeps its own pre-mutation snapshot, so concurrent mutations roll back
/// independently.
#[derive(Debug)]
pub struct MutationExecutor<R, S> {
    service: Arc<R>,
    offline: Arc<OfflineQueue<S>>,
    scheduler: RetryScheduler,
    policy: ExhaustedRetryPolicy,
    in_flight: AtomicUsize,
    last_error: Mutex<Option<ClassifiedError>>,
}

impl<R: RemoteEntityService, S: KeyValueStore> MutationExecutor<R, S> {
    /// Creates an executor.
    pub fn new(
        service: Arc<R>,
        offline: Arc<OfflineQueue<S>>,
        scheduler: RetryScheduler,
        policy: ExhaustedRetryPolicy,
    ) -> Self {
        Self {
            service,
            offline,
            scheduler,
            policy,
            in_flight: AtomicUsize::new(0),
            last_error: Mutex::new(None),
        }
    }

    /// The remote service.
    pub fn service(&self) -> &Arc<R> {
        &self.service
    }

    /// The offline queue.
    pub fn offline(&self) -> &Arc<OfflineQueue<S>> {
        &self.offline
    }

    /// The retry scheduler.
    pub fn scheduler(&self) -> &RetryScheduler {
        &self.scheduler
    }

    /// Mutations in flight plus entries waiting in the offline queue.
    pub fn pending_change_count(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst) + self.offline.pending_count()
    }

    /// The most recent classified error, cleared by the next commit.
    pub fn last_error(&self) -> Option<ClassifiedError> {
        self.last_error.lock().clone()
    }

    /// Records an error raised outside the executor for display.
    pub fn record_error(&self, error: &SyncError) {
        *self.last_error.lock() = Some(error.classified());
    }

    /// Applies `change` to `store` and persists it remotely.
    ///
    /// Validation happens before anything is applied: an invalid change
    /// returns [`SyncError::Core`] with the store untouched. On success
    /// placeholder ids in `store` are replaced with authoritative ones.
    ///
    /// # Errors
    ///
    /// A terminal failure reverts the change and returns the classified
    /// error. Exhausted retries either revert or queue the rest of the
    /// work, per [`ExhaustedRetryPolicy`], and return
    /// [`SyncError::RetriesExhausted`] in both cases.
    pub async fn execute<T>(
        &self,
        store: &OrderedCollectionStore<T>,
        change: CollectionChange<T>,
    ) -> SyncResult<MutationOutcome>
    where
        T: RemoteEntity + Remap,
    {
        let mut remap = IdRemap::new();
        let state = self.execute_remapping(store, change, &mut remap).await?;
        Ok(MutationOutcome::new(state, remap))
    }

    /// Like [`Self::execute`], but collects replaced placeholder ids into
    /// `remap` even when an error is returned.
    ///
    /// After an error the change may still be applied locally, with the
    /// ids in `remap` already rewritten in `store`.
    ///
    /// # Errors
    ///
    /// As [`Self::execute`].
    pub async fn execute_remapping<T>(
        &self,
        store: &OrderedCollectionStore<T>,
        change: CollectionChange<T>,
        remap: &mut IdRemap,
    ) -> SyncResult<MutationState>
    where
        T: RemoteEntity + Remap,
    {
        let (before, after) = store.apply(&change)?;
        let steps = plan_steps(&before, &after);
        debug!(
            kind = %T::KIND,
            change = change.label(),
            steps = steps.len(),
            state = %MutationState::OptimisticallyApplied,
            "applied optimistically"
        );

        let Some(entity_id) = steps.first().map(RemoteStep::target_id) else {
            return Ok(MutationState::Committed);
        };

        let settlement = self
            .submit(T::KIND, entity_id, steps, Enqueue::Append, remap)
            .await;

        if !remap.is_empty() && !matches!(settlement, Settlement::Failed(_)) {
            store.rewrite(|item| item.remap(remap));
        }

        match settlement {
            Settlement::Committed => Ok(MutationState::Committed),
            Settlement::Queued => Ok(MutationState::Queued),
            Settlement::QueuedWithError(error) => Err(error),
            Settlement::Failed(error) => {
                store.revert(&change, &before, &after);
                info!(
                    kind = %T::KIND,
                    change = change.label(),
                    state = %MutationState::RolledBack,
                    error = %error,
                    "rolled back"
                );
                Err(error)
            }
        }
    }

    /// Persists `steps` for `entity_id` with no local store involved.
    ///
    /// Used for whole-snapshot saves, which have nothing to roll back.
    pub async fn persist(
        &self,
        kind: EntityKind,
        entity_id: EntityId,
        steps: Vec<RemoteStep>,
        mode: Enqueue,
    ) -> SyncResult<MutationOutcome> {
        let mut remap = IdRemap::new();
        match self.submit(kind, entity_id, steps, mode, &mut remap).await {
            Settlement::Committed => Ok(MutationOutcome::new(MutationState::Committed, remap)),
            Settlement::Queued => Ok(MutationOutcome::new(MutationState::Queued, remap)),
            Settlement::QueuedWithError(error) | Settlement::Failed(error) => Err(error),
        }
    }

    async fn submit(
        &self,
        kind: EntityKind,
        entity_id: EntityId,
        mut steps: Vec<RemoteStep>,
        mode: Enqueue,
        remap: &mut IdRemap,
    ) -> Settlement {
        let _in_flight = InFlight::enter(&self.in_flight);

        // queued work must land first
        if !self.offline.is_empty() {
            debug!(%kind, %entity_id, pending = self.offline.pending_count(), "queueing behind offline work");
            return self.hand_off(kind, entity_id, steps, mode, None).await;
        }

        let total = steps.len();
        let error = match self.drive(&mut steps, remap).await {
            Ok(()) => {
                *self.last_error.lock() = None;
                if let Err(e) = self.offline.apply_remap(remap).await {
                    warn!(error = %e, "failed to remap queued work");
                }
                info!(%kind, %entity_id, steps = total, state = %MutationState::Committed, "committed");
                return Settlement::Committed;
            }
            Err(error) => error,
        };

        let completed = total - steps.len();
        match &error {
            SyncError::Classified(classified) if classified.kind.is_connectivity() => {
                self.hand_off(kind, entity_id, steps, mode, Some(error)).await
            }
            SyncError::RetriesExhausted { .. }
                if self.policy == ExhaustedRetryPolicy::HandOffToOfflineQueue =>
            {
                let queued = self.hand_off(kind, entity_id, steps, mode, None).await;
                self.record_error(&error);
                match queued {
                    Settlement::Queued => Settlement::QueuedWithError(error),
                    other => other,
                }
            }
            _ => {
                if completed > 0 {
                    warn!(
                        %kind,
                        %entity_id,
                        completed,
                        total,
                        "terminal failure after partial progress; completed steps stay remote"
                    );
                }
                self.record_error(&error);
                Settlement::Failed(error)
            }
        }
    }

    async fn hand_off(
        &self,
        kind: EntityKind,
        entity_id: EntityId,
        steps: Vec<RemoteStep>,
        mode: Enqueue,
        cause: Option<SyncError>,
    ) -> Settlement {
        if let Some(cause) = &cause {
            self.record_error(cause);
        }
        let queued = match mode {
            Enqueue::Append => self.offline.enqueue(kind, entity_id, steps).await,
            Enqueue::Supersede => self.offline.supersede(kind, entity_id, steps).await,
        };
        match queued {
            Ok(id) => {
                info!(%kind, %entity_id, id, state = %MutationState::Queued, "handed off to offline queue");
                Settlement::Queued
            }
            Err(error @ SyncError::QueueFull { .. }) => {
                self.record_error(&error);
                Settlement::Failed(error)
            }
            Err(error) => {
                self.record_error(&error);
                Settlement::QueuedWithError(error)
            }
        }
    }

    /// Runs steps in order, retrying each per the scheduler.
    ///
    /// Completed steps are drained from `steps`; creates extend `remap`
    /// and rewrite the steps that follow.
    async fn drive(&self, steps: &mut Vec<RemoteStep>, remap: &mut IdRemap) -> SyncResult<()> {
        let service = self.service.as_ref();
        while let Some(step) = steps.first() {
            let created = self
                .scheduler
                .run(None::<&Ticket<()>>, || perform_step(service, step))
                .await?;
            steps.remove(0);
            if let Some((placeholder, authoritative)) = created {
                let mut created = IdRemap::new();
                created.insert(placeholder, authoritative);
                steps.remap(&created);
                remap.extend(&created);
                debug!(%placeholder, %authoritative, "replaced placeholder id");
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify::ErrorClassifier;
    use crate::config::{OfflineQueueConfig, RetryConfig};
    use crate::error::ErrorKind;
    use crate::remote::MockRemoteService;
    use chrono::Utc;
    use clipdeck_core::{algebra, Edit, OrderedCollection, Segment};
    use clipdeck_protocol::{EntityRecord, RemoteFailure};
    use clipdeck_storage::MemoryKeyValueStore;

    type Executor = MutationExecutor<MockRemoteService, MemoryKeyValueStore>;

    fn executor(service: MockRemoteService, policy: ExhaustedRetryPolicy) -> Executor {
        let offline = OfflineQueue::new(
            Arc::new(MemoryKeyValueStore::new()),
            OfflineQueueConfig::default(),
        );
        MutationExecutor::new(
            Arc::new(service),
            Arc::new(offline),
            RetryScheduler::new(RetryConfig::default(), ErrorClassifier::new()),
            policy,
        )
    }

    fn seeded(service: &MockRemoteService, ranges: &[(f64, f64)]) -> OrderedCollectionStore<Segment> {
        let project = EntityId::new();
        let mut coll = OrderedCollection::new();
        for (i, (start, end)) in ranges.iter().enumerate() {
            let segment = Segment::new(project, format!("s{i}"), *start, *end, Utc::now()).unwrap();
            coll = coll.push(segment).unwrap();
        }
        for segment in coll.iter() {
            service.insert(EntityRecord::Segment(segment.clone()));
        }
        OrderedCollectionStore::new(coll)
    }

    #[tokio::test]
    async fn commit_replaces_placeholders() {
        let service = MockRemoteService::new();
        let store = seeded(&service, &[(0.0, 5.0)]);
        let exec = executor(service, ExhaustedRetryPolicy::default());

        let project = store.snapshot().as_slice()[0].project_id;
        let fresh = Segment::new(project, "new", 6.0, 9.0, Utc::now()).unwrap();
        let placeholder = fresh.id;
        let change = Edit::push(&store.snapshot(), fresh).unwrap().change;

        let outcome = exec.execute(&store, change).await.unwrap();
        assert_eq!(outcome.state, MutationState::Committed);
        let authoritative = outcome.resolve(placeholder);
        assert_ne!(authoritative, placeholder);
        assert!(store.snapshot().contains(authoritative));
        assert!(!store.snapshot().contains(placeholder));
        assert_eq!(exec.pending_change_count(), 0);
    }

    #[tokio::test]
    async fn invalid_change_touches_nothing() {
        let service = MockRemoteService::new();
        let store = seeded(&service, &[(0.0, 5.0)]);
        let exec = executor(service, ExhaustedRetryPolicy::default());
        let err = exec
            .execute(&store, CollectionChange::Remove { id: EntityId::new() })
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
        assert_eq!(store.version(), 0);
        assert_eq!(exec.service().call_count(), 0);
    }

    #[tokio::test]
    async fn terminal_failure_restores_snapshot() {
        let service = MockRemoteService::new();
        let store = seeded(&service, &[(0.0, 5.0), (5.0, 9.0)]);
        service.fail_next(RemoteFailure::http(409, "conflict"));
        let exec = executor(service, ExhaustedRetryPolicy::default());

        let before = store.snapshot();
        let last = before.ids()[1];
        let change = Edit::move_to(&before, last, 0).unwrap().change;
        let err = exec.execute(&store, change).await.unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Conflict);
        assert_eq!(store.snapshot(), before);
        assert_eq!(exec.last_error().map(|e| e.kind), Some(ErrorKind::Conflict));
    }

    #[tokio::test]
    async fn offline_failure_queues_once() {
        let service = MockRemoteService::new();
        let store = seeded(&service, &[(0.0, 10.0)]);
        service.set_online(false);
        let exec = executor(service, ExhaustedRetryPolicy::default());

        let id = store.snapshot().ids()[0];
        let change = algebra::segment::split(&store.snapshot(), id, 4.0, Utc::now())
            .unwrap()
            .change;
        let outcome = exec.execute(&store, change).await.unwrap();

        assert_eq!(outcome.state, MutationState::Queued);
        assert_eq!(store.snapshot().len(), 2);
        assert_eq!(exec.offline().pending_count(), 1);
        assert_eq!(exec.pending_change_count(), 1);
        assert_eq!(exec.last_error().map(|e| e.kind), Some(ErrorKind::Offline));
    }

    #[tokio::test]
    async fn later_mutations_queue_behind_offline_work() {
        let service = MockRemoteService::new();
        let store = seeded(&service, &[(0.0, 10.0), (10.0, 20.0)]);
        service.set_online(false);
        let exec = executor(service, ExhaustedRetryPolicy::default());

        let ids = store.snapshot().ids();
        let first = Edit::move_to(&store.snapshot(), ids[1], 0).unwrap().change;
        exec.execute(&store, first).await.unwrap();

        exec.service().set_online(true);
        let second = Edit::move_to(&store.snapshot(), ids[1], 1).unwrap().change;
        let outcome = exec.execute(&store, second).await.unwrap();
        assert_eq!(outcome.state, MutationState::Queued);
        assert_eq!(exec.offline().pending_count(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn exhausted_retries_keep_optimistic_state() {
        let service = MockRemoteService::new();
        let store = seeded(&service, &[(0.0, 5.0), (5.0, 9.0)]);
        service.fail_times(RemoteFailure::http(503, "busy"), 3);
        let exec = executor(service, ExhaustedRetryPolicy::HandOffToOfflineQueue);

        let ids = store.snapshot().ids();
        let change = Edit::move_to(&store.snapshot(), ids[1], 0).unwrap().change;
        let err = exec.execute(&store, change).await.unwrap_err();

        assert!(matches!(err, SyncError::RetriesExhausted { attempts: 3, .. }));
        assert_eq!(store.snapshot().ids(), [ids[1], ids[0]]);
        assert_eq!(exec.offline().pending_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn exhausted_retries_roll_back_when_configured() {
        let service = MockRemoteService::new();
        let store = seeded(&service, &[(0.0, 5.0), (5.0, 9.0)]);
        service.fail_times(RemoteFailure::http(503, "busy"), 3);
        let exec = executor(service, ExhaustedRetryPolicy::RollBack);

        let before = store.snapshot();
        let change = Edit::move_to(&before, before.ids()[1], 0).unwrap().change;
        exec.execute(&store, change).await.unwrap_err();

        assert_eq!(store.snapshot(), before);
        assert!(exec.offline().is_empty());
    }

    #[tokio::test]
    async fn independent_rollbacks() {
        let service = MockRemoteService::new();
        let store = seeded(&service, &[(0.0, 5.0)]);
        let exec = executor(service, ExhaustedRetryPolicy::default());
        let project = store.snapshot().as_slice()[0].project_id;

        // the second create is refused; the first must survive
        let keep = Segment::new(project, "keep", 5.0, 6.0, Utc::now()).unwrap();
        let change = Edit::push(&store.snapshot(), keep).unwrap().change;
        exec.execute(&store, change).await.unwrap();

        exec.service().fail_next(RemoteFailure::http(422, "bad"));
        let refused = Segment::new(project, "refused", 6.0, 7.0, Utc::now()).unwrap();
        let change = Edit::push(&store.snapshot(), refused).unwrap().change;
        exec.execute(&store, change).await.unwrap_err();

        let titles: Vec<String> = store.snapshot().iter().map(|s| s.title.clone()).collect();
        assert_eq!(titles, ["s0", "keep"]);
        store.snapshot().check_order().unwrap();
    }
}
