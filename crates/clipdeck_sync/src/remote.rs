//! Remote entity service abstraction.

use clipdeck_core::EntityId;
use clipdeck_protocol::{
    EntityKind, EntityPatch, EntityRecord, RemoteAction, RemoteFailure, RemoteStep,
};
use parking_lot::Mutex;
use std::collections::{BTreeMap, VecDeque};
use std::time::Duration;

/// The hosted CRUD service that owns authoritative state.
///
/// This trait abstracts the network layer, allowing for different
/// implementations (HTTP, mock for testing, etc.). Every method may fail
/// with a [`RemoteFailure`] the classifier can categorize.
#[allow(async_fn_in_trait)]
pub trait RemoteEntityService {
    /// Creates `record`, returning it with its authoritative id.
    async fn create(&self, record: EntityRecord) -> Result<EntityRecord, RemoteFailure>;

    /// Patches entity `id`, returning the stored record.
    async fn update(
        &self,
        kind: EntityKind,
        id: EntityId,
        patch: EntityPatch,
    ) -> Result<EntityRecord, RemoteFailure>;

    /// Deletes entity `id`.
    async fn delete(&self, kind: EntityKind, id: EntityId) -> Result<(), RemoteFailure>;
}

/// Runs one step, returning `(placeholder, authoritative)` for creates.
pub async fn perform_step<R: RemoteEntityService>(
    service: &R,
    step: &RemoteStep,
) -> Result<Option<(EntityId, EntityId)>, RemoteFailure> {
    match &step.action {
        RemoteAction::Create { record } => {
            let placeholder = record.id();
            let created = service.create(record.clone()).await?;
            Ok(Some((placeholder, created.id())))
        }
        RemoteAction::Update { id, patch } => {
            service.update(step.kind, *id, patch.clone()).await?;
            Ok(None)
        }
        RemoteAction::Delete { id } => {
            service.delete(step.kind, *id).await?;
            Ok(None)
        }
    }
}

#[derive(Debug, Default)]
struct MockState {
    online: bool,
    assign_ids: bool,
    latency: Option<Duration>,
    records: BTreeMap<EntityId, EntityRecord>,
    failures: VecDeque<RemoteFailure>,
    scheduled: BTreeMap<usize, RemoteFailure>,
    calls: Vec<String>,
}

/// An in-memory service for testing.
///
/// Creates assign fresh authoritative ids unless disabled; scripted
/// failures are consumed one per call before any state change.
#[derive(Debug)]
pub struct MockRemoteService {
    state: Mutex<MockState>,
}

impl Default for MockRemoteService {
    fn default() -> Self {
        Self::new()
    }
}

impl MockRemoteService {
    /// Creates an online service that assigns ids.
    pub fn new() -> Self {
        Self {
            state: Mutex::new(MockState {
                online: true,
                assign_ids: true,
                ..MockState::default()
            }),
        }
    }

    /// Keeps client-chosen ids on create.
    pub fn keep_ids(self) -> Self {
        self.state.lock().assign_ids = false;
        self
    }

    /// Makes every call sleep for `latency` first.
    pub fn with_latency(self, latency: Duration) -> Self {
        self.state.lock().latency = Some(latency);
        self
    }

    /// Sets the connected state. Offline calls fail with an offline failure.
    pub fn set_online(&self, online: bool) {
        self.state.lock().online = online;
    }

    /// Makes the next call fail with `failure`.
    pub fn fail_next(&self, failure: RemoteFailure) {
        self.state.lock().failures.push_back(failure);
    }

    /// Makes the next `times` calls fail with `failure`.
    pub fn fail_times(&self, failure: RemoteFailure, times: usize) {
        let mut state = self.state.lock();
        state.failures.extend(std::iter::repeat(failure).take(times));
    }

    /// Makes call number `call` (1-based, counting all calls so far) fail.
    pub fn fail_on_call(&self, call: usize, failure: RemoteFailure) {
        self.state.lock().scheduled.insert(call, failure);
    }

    /// Seeds a stored record.
    pub fn insert(&self, record: EntityRecord) {
        self.state.lock().records.insert(record.id(), record);
    }

    /// Stored record with `id`.
    pub fn record(&self, id: EntityId) -> Option<EntityRecord> {
        self.state.lock().records.get(&id).cloned()
    }

    /// Stored records of `kind`.
    pub fn records(&self, kind: EntityKind) -> Vec<EntityRecord> {
        self.state
            .lock()
            .records
            .values()
            .filter(|r| r.kind() == kind)
            .cloned()
            .collect()
    }

    /// Calls received so far, as `"verb kind"` strings.
    pub fn calls(&self) -> Vec<String> {
        self.state.lock().calls.clone()
    }

    /// Number of calls received so far.
    pub fn call_count(&self) -> usize {
        self.state.lock().calls.len()
    }

    async fn enter(&self, verb: &str, kind: EntityKind) -> Result<(), RemoteFailure> {
        let (call, latency) = {
            let mut state = self.state.lock();
            state.calls.push(format!("{verb} {kind}"));
            (state.calls.len(), state.latency)
        };
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }
        let mut state = self.state.lock();
        if !state.online {
            return Err(RemoteFailure::offline());
        }
        if let Some(failure) = state.scheduled.remove(&call) {
            return Err(failure);
        }
        match state.failures.pop_front() {
            Some(failure) => Err(failure),
            None => Ok(()),
        }
    }
}

impl RemoteEntityService for MockRemoteService {
    async fn create(&self, mut record: EntityRecord) -> Result<EntityRecord, RemoteFailure> {
        self.enter("create", record.kind()).await?;
        let mut state = self.state.lock();
        if state.assign_ids {
            record.set_id(EntityId::new());
        }
        if state.records.contains_key(&record.id()) {
            return Err(RemoteFailure::http(
                409,
                format!("{} already exists", record.id()),
            ));
        }
        state.records.insert(record.id(), record.clone());
        Ok(record)
    }

    async fn update(
        &self,
        kind: EntityKind,
        id: EntityId,
        patch: EntityPatch,
    ) -> Result<EntityRecord, RemoteFailure> {
        self.enter("update", kind).await?;
        let mut state = self.state.lock();
        if let Some(record) = state.records.get_mut(&id) {
            patch.apply_to(record);
            return Ok(record.clone());
        }
        match patch {
            // Whole-project saves are upserts.
            EntityPatch::Replace(record) if kind == EntityKind::Project => {
                state.records.insert(id, record.clone());
                Ok(record)
            }
            _ => Err(RemoteFailure::http(404, format!("{id} not found"))),
        }
    }

    async fn delete(&self, kind: EntityKind, id: EntityId) -> Result<(), RemoteFailure> {
        self.enter("delete", kind).await?;
        match self.state.lock().records.remove(&id) {
            Some(_) => Ok(()),
            None => Err(RemoteFailure::http(404, format!("{id} not found"))),
        }
    }
}
