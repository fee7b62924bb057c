//! Durable queue of mutations waiting for connectivity.
//!
//! The log is persisted through a [`KeyValueStore`] after every change and
//! replayed strictly in enqueue order. Replay awaits each remote call
//! before starting the next, so a create always lands before the steps
//! that reference its id.

use crate::classify::ErrorClassifier;
use crate::config::OfflineQueueConfig;
use crate::connectivity::ConnectivityWatch;
use crate::error::{ClassifiedError, SyncError, SyncResult};
use crate::remote::{perform_step, RemoteEntityService};
use chrono::Utc;
use clipdeck_core::EntityId;
use clipdeck_protocol::{EntityKind, IdRemap, OfflineLog, PendingMutation, Remap, RemoteStep};
use clipdeck_storage::{KeyValueStore, StorageError};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// An entry dropped during replay because the service refused it.
#[derive(Debug, Clone, PartialEq)]
pub struct RejectedMutation {
    /// The entry, with the steps that had not completed.
    pub mutation: PendingMutation,
    /// Why it was refused.
    pub error: ClassifiedError,
}

/// Result of one replay pass.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReplayReport {
    /// Entries fully replayed and removed.
    pub replayed: usize,
    /// Placeholder ids replaced by authoritative ones.
    pub remap: IdRemap,
    /// The failure that stopped the pass, if any.
    pub halted: Option<ClassifiedError>,
    /// Entries removed after a terminal failure.
    pub rejected: Vec<RejectedMutation>,
}

impl ReplayReport {
    /// Returns true if every entry was replayed.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.halted.is_none()
    }
}

#[derive(Debug)]
struct QueueState {
    log: OfflineLog,
    persisted_bytes: u64,
}

/// Append-only log of pending mutations.
#[derive(Debug)]
pub struct OfflineQueue<S> {
    store: Arc<S>,
    config: OfflineQueueConfig,
    state: Mutex<QueueState>,
    replaying: Mutex<()>,
    pending: AtomicUsize,
}

impl<S: KeyValueStore> OfflineQueue<S> {
    /// Creates an empty queue. Nothing is read from `store`.
    pub fn new(store: Arc<S>, config: OfflineQueueConfig) -> Self {
        Self::with_log(store, config, OfflineLog::default(), 0)
    }

    /// Restores the queue persisted under the configured key.
    ///
    /// # Errors
    ///
    /// Fails if the store cannot be read or holds an undecodable log.
    pub fn load(store: Arc<S>, config: OfflineQueueConfig) -> SyncResult<Self> {
        let Some(bytes) = store.get(&config.storage_key)? else {
            return Ok(Self::new(store, config));
        };
        let log = OfflineLog::decode(&bytes)?;
        info!(
            key = %config.storage_key,
            entries = log.entries.len(),
            "restored offline queue"
        );
        Ok(Self::with_log(store, config, log, bytes.len() as u64))
    }

    fn with_log(
        store: Arc<S>,
        config: OfflineQueueConfig,
        log: OfflineLog,
        persisted_bytes: u64,
    ) -> Self {
        let pending = AtomicUsize::new(log.entries.len());
        Self {
            store,
            config,
            state: Mutex::new(QueueState {
                log,
                persisted_bytes,
            }),
            replaying: Mutex::new(()),
            pending,
        }
    }

    /// Queue configuration.
    pub fn config(&self) -> &OfflineQueueConfig {
        &self.config
    }

    /// Number of queued entries.
    ///
    /// An entry being replayed still counts until its replay settles.
    pub fn pending_count(&self) -> usize {
        self.pending.load(Ordering::SeqCst)
    }

    /// Returns true if nothing is queued.
    pub fn is_empty(&self) -> bool {
        self.pending_count() == 0
    }

    /// Copies of the queued entries, oldest first.
    pub async fn entries(&self) -> Vec<PendingMutation> {
        self.state.lock().await.log.entries.clone()
    }

    /// Appends a mutation and persists the log.
    ///
    /// # Errors
    ///
    /// [`SyncError::QueueFull`] if the entry bound is reached; nothing is
    /// queued then. If the persisted log would exceed the store's quota the
    /// entry stays queued in memory and [`SyncError::QuotaExceeded`] is
    /// returned.
    pub async fn enqueue(
        &self,
        kind: EntityKind,
        entity_id: EntityId,
        steps: Vec<RemoteStep>,
    ) -> SyncResult<u64> {
        let mut state = self.state.lock().await;
        self.push(&mut state, kind, entity_id, steps)
    }

    /// Replaces every queued entry for the same entity with a new one.
    ///
    /// Used for whole-snapshot saves, where only the newest matters.
    pub async fn supersede(
        &self,
        kind: EntityKind,
        entity_id: EntityId,
        steps: Vec<RemoteStep>,
    ) -> SyncResult<u64> {
        let mut state = self.state.lock().await;
        let before = state.log.entries.len();
        state
            .log
            .entries
            .retain(|entry| !(entry.entity_kind == kind && entry.entity_id == entity_id));
        let dropped = before - state.log.entries.len();
        if dropped > 0 {
            debug!(%kind, %entity_id, dropped, "superseded queued entries");
        }
        self.push(&mut state, kind, entity_id, steps)
    }

    /// Rewrites placeholder ids in every queued entry.
    pub async fn apply_remap(&self, remap: &IdRemap) -> SyncResult<()> {
        if remap.is_empty() {
            return Ok(());
        }
        let mut state = self.state.lock().await;
        if state.log.entries.is_empty() {
            return Ok(());
        }
        state.log.entries.remap(remap);
        self.persist(&mut state)
    }

    fn push(
        &self,
        state: &mut QueueState,
        kind: EntityKind,
        entity_id: EntityId,
        steps: Vec<RemoteStep>,
    ) -> SyncResult<u64> {
        if state.log.entries.len() >= self.config.max_entries {
            warn!(max_entries = self.config.max_entries, "offline queue is full");
            return Err(SyncError::QueueFull {
                max_entries: self.config.max_entries,
            });
        }

        let id = state.log.next_id;
        state.log.next_id += 1;
        let step_count = steps.len();
        state
            .log
            .entries
            .push(PendingMutation::new(id, kind, entity_id, steps, Utc::now()));
        info!(id, %kind, %entity_id, steps = step_count, "queued offline mutation");

        match self.persist(state) {
            Ok(()) => Ok(id),
            Err(SyncError::Storage(StorageError::QuotaExceeded { needed, available })) => {
                warn!(id, needed, available, "offline queue kept in memory only");
                Err(SyncError::QuotaExceeded(format!(
                    "offline queue needs {needed} more bytes, {available} available"
                )))
            }
            Err(e) => {
                warn!(id, error = %e, "offline queue kept in memory only");
                Err(e)
            }
        }
    }

    fn persist(&self, state: &mut QueueState) -> SyncResult<()> {
        self.pending.store(state.log.entries.len(), Ordering::SeqCst);

        let bytes = state.log.encode()?;
        let needed = bytes.len() as u64;
        let quota = self.store.quota()?;
        if needed > quota.available_bytes.saturating_add(state.persisted_bytes) {
            return Err(StorageError::QuotaExceeded {
                needed: needed.saturating_sub(state.persisted_bytes),
                available: quota.available_bytes,
            }
            .into());
        }
        self.store.set(&self.config.storage_key, &bytes)?;
        state.persisted_bytes = needed;
        Ok(())
    }

    fn persist_quietly(&self, state: &mut QueueState) {
        if let Err(e) = self.persist(state) {
            warn!(error = %e, "failed to persist offline queue");
        }
    }

    /// Replays queued entries in order until the queue is empty or a call
    /// fails.
    ///
    /// Completed steps are dropped from their entry as they succeed, so a
    /// halted entry resumes where it stopped. Authoritative ids returned
    /// by creates are applied to the rest of the entry and to every later
    /// entry. A retryable failure leaves the entry at the head of the
    /// queue; a terminal one removes it and reports it as rejected. Either
    /// way the pass stops. Entries queued while a pass runs are replayed
    /// in the same pass.
    pub async fn replay<R: RemoteEntityService>(
        &self,
        service: &R,
        classifier: &ErrorClassifier,
    ) -> ReplayReport {
        let _pass = self.replaying.lock().await;
        let mut report = ReplayReport::default();

        loop {
            let mut state = self.state.lock().await;
            if state.log.entries.is_empty() {
                break;
            }
            let mut entry = state.log.entries.remove(0);
            entry.attempts = entry.attempts.saturating_add(1);
            debug!(id = entry.id, attempt = entry.attempts, steps = entry.steps.len(), "replaying");

            let mut failure = None;
            while let Some(step) = entry.steps.first() {
                let result = perform_step(service, step).await;
                match result {
                    Ok(created) => {
                        entry.advance(1);
                        if let Some((placeholder, authoritative)) = created {
                            let mut remap = IdRemap::new();
                            remap.insert(placeholder, authoritative);
                            entry.remap(&remap);
                            state.log.entries.remap(&remap);
                            report.remap.extend(&remap);
                        }
                    }
                    Err(raw) => {
                        failure = Some(classifier.classify(&raw));
                        break;
                    }
                }
            }

            match failure {
                None => {
                    info!(id = entry.id, "replayed offline mutation");
                    report.replayed += 1;
                    self.persist_quietly(&mut state);
                }
                Some(error) if error.retryable => {
                    warn!(id = entry.id, kind = %error.kind, "replay halted");
                    state.log.entries.insert(0, entry);
                    self.persist_quietly(&mut state);
                    report.halted = Some(error);
                    break;
                }
                Some(error) => {
                    warn!(id = entry.id, kind = %error.kind, error = %error, "replay rejected entry");
                    self.persist_quietly(&mut state);
                    report.halted = Some(error.clone());
                    report.rejected.push(RejectedMutation {
                        mutation: entry,
                        error,
                    });
                    break;
                }
            }
        }

        report
    }

    /// Replays on every offline to online transition until the
    /// connectivity source goes away.
    pub async fn run_replay_loop<R, F>(
        &self,
        service: &R,
        classifier: &ErrorClassifier,
        mut connectivity: ConnectivityWatch,
        mut on_replay: F,
    ) where
        R: RemoteEntityService,
        F: FnMut(ReplayReport),
    {
        while connectivity.reconnected().await {
            if self.is_empty() {
                continue;
            }
            info!(pending = self.pending_count(), "connectivity restored, replaying");
            on_replay(self.replay(service, classifier).await);
        }
        debug!("connectivity source closed, replay loop stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connectivity::Connectivity;
    use crate::remote::MockRemoteService;
    use clipdeck_core::{QueueItem, Segment};
    use clipdeck_protocol::{EntityPatch, EntityRecord, RemoteFailure};
    use clipdeck_storage::MemoryKeyValueStore;

    fn queue(store: &Arc<MemoryKeyValueStore>) -> OfflineQueue<MemoryKeyValueStore> {
        OfflineQueue::new(Arc::clone(store), OfflineQueueConfig::default())
    }

    fn segment() -> Segment {
        Segment::new(EntityId::new(), "clip", 0.0, 4.0, Utc::now()).unwrap()
    }

    fn create_steps(segment: &Segment) -> Vec<RemoteStep> {
        vec![RemoteStep::create(EntityRecord::Segment(segment.clone()))]
    }

    #[tokio::test]
    async fn enqueue_persists_and_load_restores() {
        let store = Arc::new(MemoryKeyValueStore::new());
        let q = queue(&store);
        let s = segment();
        let id = q.enqueue(EntityKind::Segment, s.id, create_steps(&s)).await.unwrap();
        assert_eq!(id, 1);
        assert_eq!(q.pending_count(), 1);

        let restored = OfflineQueue::load(Arc::clone(&store), OfflineQueueConfig::default()).unwrap();
        let entries = restored.entries().await;
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].entity_id, s.id);
    }

    #[tokio::test]
    async fn full_queue_refuses() {
        let store = Arc::new(MemoryKeyValueStore::new());
        let q = OfflineQueue::new(store, OfflineQueueConfig::default().with_max_entries(1));
        let s = segment();
        q.enqueue(EntityKind::Segment, s.id, create_steps(&s)).await.unwrap();
        let err = q.enqueue(EntityKind::Segment, s.id, Vec::new()).await.unwrap_err();
        assert!(matches!(err, SyncError::QueueFull { max_entries: 1 }));
        assert_eq!(q.pending_count(), 1);
    }

    #[tokio::test]
    async fn quota_failure_keeps_entry_in_memory() {
        let store = Arc::new(MemoryKeyValueStore::with_limit(16));
        let q = queue(&store);
        let s = segment();
        let err = q
            .enqueue(EntityKind::Segment, s.id, create_steps(&s))
            .await
            .unwrap_err();
        assert!(matches!(err, SyncError::QuotaExceeded(_)));
        assert_eq!(q.pending_count(), 1);
        assert!(store.get(&q.config().storage_key).unwrap().is_none());
    }

    #[tokio::test]
    async fn supersede_replaces_same_entity() {
        let store = Arc::new(MemoryKeyValueStore::new());
        let q = queue(&store);
        let project = EntityId::new();
        let other = EntityId::new();
        q.enqueue(EntityKind::Project, project, Vec::new()).await.unwrap();
        q.enqueue(EntityKind::Project, other, Vec::new()).await.unwrap();
        q.supersede(EntityKind::Project, project, Vec::new()).await.unwrap();

        let ids: Vec<(u64, EntityId)> = q
            .entries()
            .await
            .iter()
            .map(|e| (e.id, e.entity_id))
            .collect();
        assert_eq!(ids, [(2, other), (3, project)]);
    }

    #[tokio::test]
    async fn replay_applies_remaps_to_later_entries() {
        let store = Arc::new(MemoryKeyValueStore::new());
        let q = queue(&store);
        let service = MockRemoteService::new();
        let s = segment();
        let item = QueueItem::new(&s, Utc::now());

        q.enqueue(EntityKind::Segment, s.id, create_steps(&s)).await.unwrap();
        q.enqueue(
            EntityKind::QueueItem,
            item.id,
            vec![RemoteStep::create(EntityRecord::QueueItem(item.clone()))],
        )
        .await
        .unwrap();

        let report = q.replay(&service, &ErrorClassifier::new()).await;
        assert_eq!(report.replayed, 2);
        assert!(report.is_complete());
        assert!(q.is_empty());

        let authoritative = report.remap.resolve(s.id);
        assert_ne!(authoritative, s.id);
        let stored = service.records(EntityKind::QueueItem);
        match &stored[..] {
            [EntityRecord::QueueItem(stored)] => assert_eq!(stored.segment_id, authoritative),
            other => panic!("unexpected records {other:?}"),
        }
    }

    #[tokio::test]
    async fn retryable_failure_keeps_entry_and_progress() {
        let store = Arc::new(MemoryKeyValueStore::new());
        let q = queue(&store);
        let service = MockRemoteService::new().keep_ids();
        let s = segment();
        let mut steps = create_steps(&s);
        steps.push(RemoteStep::update(EntityKind::Segment, s.id, EntityPatch::Order(3)));
        q.enqueue(EntityKind::Segment, s.id, steps).await.unwrap();

        // the create lands, the order patch hits an outage
        service.fail_on_call(2, RemoteFailure::http(503, "busy"));
        let classifier = ErrorClassifier::new();
        let report = q.replay(&service, &classifier).await;
        assert_eq!(
            report.halted.map(|e| e.kind),
            Some(crate::error::ErrorKind::ServiceUnavailable)
        );
        let entries = q.entries().await;
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].attempts, 1);
        assert_eq!(entries[0].steps.len(), 1);

        let report = q.replay(&service, &classifier).await;
        assert!(report.is_complete());
        assert!(q.is_empty());
        assert_eq!(service.calls(), ["create segment", "update segment", "update segment"]);
        assert_eq!(service.records(EntityKind::Segment).len(), 1);
    }

    #[tokio::test]
    async fn terminal_failure_rejects_entry() {
        let store = Arc::new(MemoryKeyValueStore::new());
        let q = queue(&store);
        let service = MockRemoteService::new();
        let missing = EntityId::new();
        q.enqueue(
            EntityKind::Segment,
            missing,
            vec![RemoteStep::delete(EntityKind::Segment, missing)],
        )
        .await
        .unwrap();
        let s = segment();
        q.enqueue(EntityKind::Segment, s.id, create_steps(&s)).await.unwrap();

        let report = q.replay(&service, &ErrorClassifier::new()).await;
        assert_eq!(report.rejected.len(), 1);
        assert_eq!(report.rejected[0].mutation.entity_id, missing);
        assert_eq!(report.replayed, 0);
        // halted after the rejection; the second entry waits
        assert_eq!(q.pending_count(), 1);

        let report = q.replay(&service, &ErrorClassifier::new()).await;
        assert_eq!(report.replayed, 1);
        assert!(q.is_empty());
    }

    #[tokio::test]
    async fn replay_loop_runs_on_reconnect() {
        let store = Arc::new(MemoryKeyValueStore::new());
        let q = queue(&store);
        let service = MockRemoteService::new();
        let s = segment();
        q.enqueue(EntityKind::Segment, s.id, create_steps(&s)).await.unwrap();

        let connectivity = Connectivity::new(false);
        let watch = connectivity.subscribe();
        let classifier = ErrorClassifier::new();
        let mut reports = Vec::new();

        let driver = async {
            tokio::task::yield_now().await;
            connectivity.set_online(true);
            tokio::task::yield_now().await;
            drop(connectivity);
        };
        tokio::join!(
            q.run_replay_loop(&service, &classifier, watch, |r| reports.push(r)),
            driver
        );

        assert_eq!(reports.len(), 1);
        assert_eq!(reports[0].replayed, 1);
        assert!(q.is_empty());
    }
}
