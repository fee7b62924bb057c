//! Debounced whole-project saves.

use crate::config::AutoSaveConfig;
use crate::error::{SyncError, SyncResult};
use crate::executor::{Enqueue, MutationExecutor, MutationState};
use crate::remote::RemoteEntityService;
use chrono::{DateTime, Utc};
use clipdeck_codec::Fingerprint;
use clipdeck_core::ProjectSnapshot;
use clipdeck_protocol::{EntityKind, EntityPatch, EntityRecord, RemoteStep};
use clipdeck_storage::KeyValueStore;
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// Caller-supplied check run on every snapshot before saving.
pub type SnapshotValidator = Box<dyn Fn(&ProjectSnapshot) -> Result<(), String> + Send + Sync>;

/// What a save attempt did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveOutcome {
    /// The service confirmed the snapshot.
    Saved,
    /// Identical to the last saved snapshot; nothing sent.
    Skipped,
    /// Handed to the offline queue.
    Queued,
}

/// Save flags for display.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SaveStatus {
    /// A save is in progress.
    pub is_saving: bool,
    /// When the service last confirmed a snapshot.
    pub last_saved_at: Option<DateTime<Utc>>,
    /// A submitted snapshot has not been confirmed yet.
    pub has_unsaved_changes: bool,
}

#[derive(Debug, Default)]
struct SaveState {
    status: SaveStatus,
    last_committed: Option<Fingerprint>,
}

/// Debounces project snapshots and saves the last of each burst.
pub struct AutoSavePipeline<R, S> {
    executor: Arc<MutationExecutor<R, S>>,
    drafts: Arc<S>,
    config: AutoSaveConfig,
    validator: SnapshotValidator,
    sender: Mutex<Option<mpsc::UnboundedSender<ProjectSnapshot>>>,
    receiver: tokio::sync::Mutex<mpsc::UnboundedReceiver<ProjectSnapshot>>,
    state: Mutex<SaveState>,
}

impl<R: RemoteEntityService, S: KeyValueStore> AutoSavePipeline<R, S> {
    /// Creates a pipeline that accepts every structurally valid snapshot.
    pub fn new(executor: Arc<MutationExecutor<R, S>>, drafts: Arc<S>, config: AutoSaveConfig) -> Self {
        let (sender, receiver) = mpsc::unbounded_channel();
        Self {
            executor,
            drafts,
            config,
            validator: Box::new(|_| Ok(())),
            sender: Mutex::new(Some(sender)),
            receiver: tokio::sync::Mutex::new(receiver),
            state: Mutex::new(SaveState::default()),
        }
    }

    /// Adds a predicate every snapshot must pass.
    #[must_use]
    pub fn with_validator<F>(mut self, validator: F) -> Self
    where
        F: Fn(&ProjectSnapshot) -> Result<(), String> + Send + Sync + 'static,
    {
        self.validator = Box::new(validator);
        self
    }

    /// Pipeline configuration.
    pub fn config(&self) -> &AutoSaveConfig {
        &self.config
    }

    /// Current save flags.
    pub fn status(&self) -> SaveStatus {
        self.state.lock().status
    }

    /// Feeds a snapshot to the debouncer.
    ///
    /// Ignored when auto-save is disabled or the pipeline is closed.
    pub fn submit(&self, snapshot: ProjectSnapshot) {
        if !self.config.enabled {
            return;
        }
        let sent = match self.sender.lock().as_ref() {
            Some(sender) => sender.send(snapshot).is_ok(),
            None => false,
        };
        if sent {
            self.state.lock().status.has_unsaved_changes = true;
        } else {
            debug!("auto-save closed, snapshot dropped");
        }
    }

    /// Stops accepting snapshots. [`Self::run`] saves what is pending and
    /// returns.
    pub fn close(&self) {
        self.sender.lock().take();
    }

    /// Debounce loop.
    ///
    /// Each snapshot restarts the quiet period; when it elapses, the
    /// latest snapshot is saved. Failures are logged and recorded on the
    /// executor; the loop keeps going until [`Self::close`].
    pub async fn run(&self) {
        let mut receiver = self.receiver.lock().await;
        let mut pending: Option<ProjectSnapshot> = None;

        loop {
            let received = if pending.is_some() {
                tokio::select! {
                    received = receiver.recv() => received,
                    () = tokio::time::sleep(self.config.debounce) => {
                        if let Some(snapshot) = pending.take() {
                            self.save_logged(snapshot).await;
                        }
                        continue;
                    }
                }
            } else {
                receiver.recv().await
            };

            match received {
                Some(snapshot) => {
                    if pending.replace(snapshot).is_some() {
                        debug!("debounce restarted");
                    }
                }
                None => break,
            }
        }

        if let Some(snapshot) = pending.take() {
            self.save_logged(snapshot).await;
        }
        debug!("auto-save loop stopped");
    }

    async fn save_logged(&self, snapshot: ProjectSnapshot) {
        if let Err(e) = self.save_now(snapshot).await {
            warn!(kind = %e.kind(), error = %e, "auto-save failed");
            self.executor.record_error(&e);
        }
    }

    /// Saves `snapshot` immediately.
    ///
    /// # Errors
    ///
    /// [`SyncError::Validation`] if the snapshot is malformed or fails the
    /// predicate, [`SyncError::QuotaExceeded`] if it encodes larger than
    /// the configured bound. Neither reaches the service. Remote failures
    /// surface as the executor reports them.
    pub async fn save_now(&self, snapshot: ProjectSnapshot) -> SyncResult<SaveOutcome> {
        snapshot
            .validate()
            .map_err(|e| SyncError::Validation(e.to_string()))?;
        (self.validator)(&snapshot).map_err(SyncError::Validation)?;

        let (fingerprint, bytes) = snapshot.fingerprint()?;
        if bytes.len() > self.config.max_snapshot_bytes {
            return Err(SyncError::QuotaExceeded(format!(
                "snapshot is {} bytes, limit is {}",
                bytes.len(),
                self.config.max_snapshot_bytes
            )));
        }

        {
            let mut state = self.state.lock();
            if state.last_committed == Some(fingerprint) {
                state.status.has_unsaved_changes = false;
                debug!(%fingerprint, "snapshot unchanged, save skipped");
                return Ok(SaveOutcome::Skipped);
            }
            state.status.is_saving = true;
        }

        if let Err(e) = self.drafts.set(&self.config.draft_key, &bytes) {
            warn!(key = %self.config.draft_key, error = %e, "failed to write local draft");
        }

        let project_id = snapshot.project.id;
        let step = RemoteStep::update(
            EntityKind::Project,
            project_id,
            EntityPatch::Replace(EntityRecord::Snapshot(snapshot)),
        );
        let result = self
            .executor
            .persist(EntityKind::Project, project_id, vec![step], Enqueue::Supersede)
            .await;

        let mut state = self.state.lock();
        state.status.is_saving = false;
        match result?.state {
            MutationState::Committed => {
                state.last_committed = Some(fingerprint);
                state.status.last_saved_at = Some(Utc::now());
                state.status.has_unsaved_changes = false;
                info!(%project_id, %fingerprint, bytes = bytes.len(), "auto-saved");
                Ok(SaveOutcome::Saved)
            }
            _ => {
                info!(%project_id, "auto-save queued offline");
                Ok(SaveOutcome::Queued)
            }
        }
    }
}
