//! Per-project wiring of stores, executor, offline queue and auto-save.

use crate::autosave::{AutoSavePipeline, SaveStatus};
use crate::classify::ErrorClassifier;
use crate::config::SessionConfig;
use crate::error::{ClassifiedError, SyncError, SyncResult};
use crate::executor::{MutationExecutor, MutationOutcome, MutationState};
use crate::lookup::CachedLookup;
use crate::offline::{OfflineQueue, ReplayReport};
use crate::remote::RemoteEntityService;
use crate::retry::RetryScheduler;
use chrono::Utc;
use clipdeck_core::algebra::{queue, segment};
use clipdeck_core::{
    CacheConfig, CollectionChange, CoreError, Edit, EntityId, OrderedCollection, OrderedCollectionStore,
    Project, ProjectSnapshot, QueueItem, Segment,
};
use clipdeck_protocol::{IdRemap, Remap};
use clipdeck_storage::KeyValueStore;
use std::hash::Hash;
use std::sync::Arc;
use tracing::{info, warn};

/// What the UI shows about pending work.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionStatus {
    /// Mutations in flight or queued offline.
    pub pending_changes: usize,
    /// Auto-save flags.
    pub save: SaveStatus,
    /// Most recent classified error.
    pub last_error: Option<ClassifiedError>,
}

/// One open project.
///
/// Owns the segment and queue stores and is their only writer. Every
/// operation validates and applies locally, then persists through the
/// executor.
pub struct ProjectSession<R, S> {
    project: Project,
    segments: OrderedCollectionStore<Segment>,
    queue: OrderedCollectionStore<QueueItem>,
    executor: Arc<MutationExecutor<R, S>>,
    autosave: AutoSavePipeline<R, S>,
    classifier: ErrorClassifier,
    cache: CacheConfig,
}

impl<R: RemoteEntityService, S: KeyValueStore> ProjectSession<R, S> {
    /// Opens a session from a loaded snapshot.
    ///
    /// Any offline queue persisted for the project is restored from
    /// `store`.
    ///
    /// # Errors
    ///
    /// Fails if the snapshot is invalid or the persisted queue cannot be
    /// read.
    pub fn open(
        snapshot: ProjectSnapshot,
        service: Arc<R>,
        store: Arc<S>,
        config: SessionConfig,
    ) -> SyncResult<Self> {
        snapshot.validate()?;
        let segments = OrderedCollection::from_items(snapshot.segments)?;
        let queue = OrderedCollection::from_items(snapshot.queue)?;

        let offline = OfflineQueue::load(Arc::clone(&store), config.offline.clone())?;
        let classifier = ErrorClassifier::new();
        let executor = Arc::new(MutationExecutor::new(
            service,
            Arc::new(offline),
            RetryScheduler::new(config.retry.clone(), classifier.clone()),
            config.exhausted_policy,
        ));
        let autosave = AutoSavePipeline::new(Arc::clone(&executor), store, config.autosave.clone());

        info!(
            project = %snapshot.project.id,
            segments = segments.len(),
            queue = queue.len(),
            pending = executor.pending_change_count(),
            "opened project session"
        );

        Ok(Self {
            project: snapshot.project,
            segments: OrderedCollectionStore::new(segments),
            queue: OrderedCollectionStore::new(queue),
            executor,
            autosave,
            classifier,
            cache: config.cache,
        })
    }

    /// The project.
    pub fn project(&self) -> &Project {
        &self.project
    }

    /// Current, possibly optimistic, segments.
    pub fn segments(&self) -> OrderedCollection<Segment> {
        self.segments.snapshot()
    }

    /// Current, possibly optimistic, queue.
    pub fn queue(&self) -> OrderedCollection<QueueItem> {
        self.queue.snapshot()
    }

    /// The executor.
    pub fn executor(&self) -> &Arc<MutationExecutor<R, S>> {
        &self.executor
    }

    /// The auto-save pipeline. Its [`run`](AutoSavePipeline::run) loop is
    /// driven by the caller.
    pub fn autosave(&self) -> &AutoSavePipeline<R, S> {
        &self.autosave
    }

    /// A last-request-wins cached lookup with this session's cache and
    /// retry settings.
    pub fn cached_lookup<K: Eq + Hash + Clone, V: Clone>(&self) -> CachedLookup<K, V> {
        CachedLookup::new(self.cache.clone(), self.executor.scheduler().clone())
    }

    /// Whole-project state.
    pub fn snapshot(&self) -> ProjectSnapshot {
        ProjectSnapshot::capture(&self.project, &self.segments.snapshot(), &self.queue.snapshot())
    }

    /// Feeds the current state to auto-save.
    pub fn request_save(&self) {
        self.autosave.submit(self.snapshot());
    }

    /// Pending work, save flags and the last error.
    pub fn status(&self) -> SessionStatus {
        SessionStatus {
            pending_changes: self.executor.pending_change_count(),
            save: self.autosave.status(),
            last_error: self.executor.last_error(),
        }
    }

    async fn segments_change(
        &self,
        change: CollectionChange<Segment>,
    ) -> SyncResult<MutationOutcome> {
        let outcome = self.executor.execute(&self.segments, change).await?;
        self.remap_queue(&outcome.remap);
        Ok(outcome)
    }

    async fn queue_change(&self, change: CollectionChange<QueueItem>) -> SyncResult<MutationOutcome> {
        self.executor.execute(&self.queue, change).await
    }

    fn remap_queue(&self, remap: &IdRemap) {
        if !remap.is_empty() {
            self.queue.rewrite(|item| item.remap(remap));
        }
    }

    fn remap_both(&self, remap: &IdRemap) {
        if !remap.is_empty() {
            self.segments.rewrite(|segment| segment.remap(remap));
            self.remap_queue(remap);
        }
    }

    fn segment(&self, id: EntityId) -> SyncResult<Segment> {
        self.segments
            .snapshot()
            .get(id)
            .cloned()
            .ok_or(SyncError::Core(CoreError::NotFound { id }))
    }

    /// Appends `segment`, which carries a placeholder id until committed.
    pub async fn add_segment(&self, segment: Segment) -> SyncResult<MutationOutcome> {
        if segment.project_id != self.project.id {
            return Err(SyncError::Validation(format!(
                "segment {} belongs to project {}",
                segment.id, segment.project_id
            )));
        }
        Segment::validate_range(segment.start_time, segment.end_time)?;
        let edit = Edit::push(&self.segments.snapshot(), segment)?;
        self.segments_change(edit.change).await
    }

    /// Replaces a segment's fields and refreshes queue copies of it.
    pub async fn update_segment(&self, updated: Segment) -> SyncResult<MutationOutcome> {
        let id = updated.id;
        let edit = segment::update(&self.segments.snapshot(), updated, Utc::now())?;
        let outcome = self.segments_change(edit.change).await?;
        let current = self.segment(outcome.resolve(id))?;
        if let Some(refresh) = queue::refresh(&self.queue.snapshot(), &current)? {
            self.queue_change(refresh.change).await?;
        }
        Ok(outcome)
    }

    /// Deletes a segment and the queue items that play it.
    ///
    /// The queue items go first. If the segment delete then fails
    /// terminally, the segment is restored but its queue items stay gone.
    pub async fn delete_segment(&self, id: EntityId) -> SyncResult<MutationOutcome> {
        let edit = Edit::remove(&self.segments.snapshot(), id)?;
        let queued = self.queue.snapshot();
        let dropped = queued.iter().filter(|item| item.segment_id == id).count();
        if let Some(unqueue) = queue::drop_segment(&queued, id)? {
            self.queue_change(unqueue.change).await?;
        }
        let result = self.segments_change(edit.change).await;
        if result.is_err() && dropped > 0 && self.segments.snapshot().contains(id) {
            warn!(
                segment = %id,
                dropped,
                "segment delete failed after its queue items were removed"
            );
        }
        result
    }

    /// Splits a segment at `at_time`; queue items follow the first part.
    pub async fn split_segment(&self, id: EntityId, at_time: f64) -> SyncResult<MutationOutcome> {
        let before = self.segments.snapshot();
        let edit = segment::split(&before, id, at_time, Utc::now())?;
        let first = before
            .position(id)
            .and_then(|at| edit.next.as_slice().get(at))
            .map(|part| part.id)
            .ok_or(SyncError::Core(CoreError::NotFound { id }))?;
        self.replace_segments(edit.change, &[id], first).await
    }

    /// Merges segments; queue items of every input follow the result.
    pub async fn merge_segments(&self, ids: &[EntityId]) -> SyncResult<MutationOutcome> {
        let before = self.segments.snapshot();
        let edit = segment::merge(&before, ids, Utc::now())?;
        let merged = edit
            .next
            .iter()
            .find(|s| !before.contains(s.id))
            .map(|s| s.id)
            .ok_or_else(|| SyncError::Validation("merge produced no segment".into()))?;
        self.replace_segments(edit.change, ids, merged).await
    }

    /// Runs a change that replaces `replaced` with `successor` and points
    /// their queue items at the successor.
    ///
    /// Queue items follow whenever the successor is still present
    /// locally afterwards, including when the segment change reports an
    /// error but keeps its optimistic state.
    async fn replace_segments(
        &self,
        change: CollectionChange<Segment>,
        replaced: &[EntityId],
        successor: EntityId,
    ) -> SyncResult<MutationOutcome> {
        let mut remap = IdRemap::new();
        let result = self
            .executor
            .execute_remapping(&self.segments, change, &mut remap)
            .await;
        self.remap_queue(&remap);

        let successor = remap.resolve(successor);
        if self.segments.snapshot().contains(successor) {
            let followed = self.retarget(replaced, successor).await;
            match (&result, followed) {
                (Ok(_), Err(e)) => return Err(e),
                (Err(_), Err(e)) => {
                    warn!(segment = %successor, error = %e, "queue items did not follow replaced segments");
                }
                (_, Ok(())) => {}
            }
        }
        let state = result?;
        Ok(MutationOutcome { state, remap })
    }

    /// Appends a copy of a segment.
    pub async fn duplicate_segment(&self, id: EntityId) -> SyncResult<MutationOutcome> {
        let edit = segment::duplicate(&self.segments.snapshot(), id, Utc::now())?;
        self.segments_change(edit.change).await
    }

    /// Reorders segments to match `ids`.
    pub async fn reorder_segments(&self, ids: Vec<EntityId>) -> SyncResult<MutationOutcome> {
        let edit = segment::reorder(&self.segments.snapshot(), ids)?;
        self.segments_change(edit.change).await
    }

    /// Adds a segment to the end of the queue.
    pub async fn enqueue_segment(&self, segment_id: EntityId) -> SyncResult<MutationOutcome> {
        let segment = self.segment(segment_id)?;
        let edit = queue::enqueue(&self.queue.snapshot(), &segment, Utc::now())?;
        self.queue_change(edit.change).await
    }

    /// Removes a queue item.
    pub async fn remove_queue_item(&self, id: EntityId) -> SyncResult<MutationOutcome> {
        let edit = Edit::remove(&self.queue.snapshot(), id)?;
        self.queue_change(edit.change).await
    }

    /// Moves a queue item to `to`.
    pub async fn move_queue_item(&self, id: EntityId, to: usize) -> SyncResult<MutationOutcome> {
        let edit = Edit::move_to(&self.queue.snapshot(), id, to)?;
        self.queue_change(edit.change).await
    }

    /// Reorders the queue to match `ids`.
    pub async fn reorder_queue(&self, ids: Vec<EntityId>) -> SyncResult<MutationOutcome> {
        let edit = Edit::reindex(&self.queue.snapshot(), ids)?;
        self.queue_change(edit.change).await
    }

    /// Counts one playback of a queue item.
    pub async fn record_play(&self, id: EntityId) -> SyncResult<MutationOutcome> {
        let edit = queue::record_play(&self.queue.snapshot(), id, Utc::now())?;
        self.queue_change(edit.change).await
    }

    /// Empties the queue.
    pub async fn clear_queue(&self) -> SyncResult<MutationOutcome> {
        match queue::clear(&self.queue.snapshot())? {
            Some(edit) => self.queue_change(edit.change).await,
            None => Ok(MutationOutcome {
                state: MutationState::Committed,
                remap: IdRemap::new(),
            }),
        }
    }

    /// Replays the offline queue and applies the resulting id remaps.
    pub async fn reconnect(&self) -> ReplayReport {
        let report = self
            .executor
            .offline()
            .replay(self.executor.service().as_ref(), &self.classifier)
            .await;
        self.remap_both(&report.remap);
        for rejected in &report.rejected {
            warn!(
                id = rejected.mutation.id,
                kind = %rejected.error.kind,
                "queued mutation rejected on replay; local state kept"
            );
        }
        if let Some(error) = &report.halted {
            self.executor.record_error(&SyncError::Classified(error.clone()));
        }
        report
    }
}
