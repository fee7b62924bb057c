//! Mutations waiting for connectivity, and their persisted log.

use crate::record::EntityKind;
use crate::step::{IdRemap, Remap, RemoteStep};
use chrono::{DateTime, Utc};
use clipdeck_codec::{from_cbor, to_cbor, CodecError, CodecResult};
use clipdeck_core::EntityId;
use serde::{Deserialize, Serialize};

/// Current on-disk layout of [`OfflineLog`].
pub const OFFLINE_LOG_VERSION: u16 = 1;

/// A mutation whose remote steps have not all been confirmed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingMutation {
    /// Log sequence number; increases with enqueue time.
    pub id: u64,
    /// Kind of the entity the mutation targets.
    pub entity_kind: EntityKind,
    /// Entity the mutation targets.
    pub entity_id: EntityId,
    /// Steps still to run, in order.
    pub steps: Vec<RemoteStep>,
    /// When the mutation was queued.
    pub enqueued_at: DateTime<Utc>,
    /// Replay attempts so far.
    pub attempts: u32,
}

impl PendingMutation {
    /// Creates a fresh entry.
    #[must_use]
    pub fn new(
        id: u64,
        entity_kind: EntityKind,
        entity_id: EntityId,
        steps: Vec<RemoteStep>,
        enqueued_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            entity_kind,
            entity_id,
            steps,
            enqueued_at,
            attempts: 0,
        }
    }

    /// Drops the first `completed` steps after a partial replay.
    pub fn advance(&mut self, completed: usize) {
        let completed = completed.min(self.steps.len());
        self.steps.drain(..completed);
    }
}

impl Remap for PendingMutation {
    fn remap(&mut self, remap: &IdRemap) {
        self.entity_id = remap.resolve(self.entity_id);
        self.steps.remap(remap);
    }
}

/// The persisted form of an offline queue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OfflineLog {
    /// Layout version.
    pub version: u16,
    /// Sequence number for the next entry.
    pub next_id: u64,
    /// Entries in enqueue order.
    pub entries: Vec<PendingMutation>,
}

impl Default for OfflineLog {
    fn default() -> Self {
        Self {
            version: OFFLINE_LOG_VERSION,
            next_id: 1,
            entries: Vec::new(),
        }
    }
}

impl OfflineLog {
    /// Encodes the log as CBOR.
    pub fn encode(&self) -> CodecResult<Vec<u8>> {
        to_cbor(self)
    }

    /// Decodes a log, rejecting layouts this build does not know.
    pub fn decode(bytes: &[u8]) -> CodecResult<Self> {
        let log: Self = from_cbor(bytes)?;
        if log.version != OFFLINE_LOG_VERSION {
            return Err(CodecError::decoding_failed(format!(
                "unsupported offline log version {}",
                log.version
            )));
        }
        Ok(log)
    }

    /// Total number of steps still pending.
    #[must_use]
    pub fn step_count(&self) -> usize {
        self.entries.iter().map(|e| e.steps.len()).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::EntityRecord;
    use clipdeck_core::Segment;

    fn entry(id: u64) -> PendingMutation {
        let segment = Segment::new(EntityId::new(), "a", 0.0, 1.0, Utc::now()).unwrap();
        PendingMutation::new(
            id,
            EntityKind::Segment,
            segment.id,
            vec![
                RemoteStep::create(EntityRecord::Segment(segment.clone())),
                RemoteStep::delete(EntityKind::Segment, segment.id),
            ],
            Utc::now(),
        )
    }

    #[test]
    fn log_survives_encoding() {
        let log = OfflineLog {
            next_id: 3,
            entries: vec![entry(1), entry(2)],
            ..OfflineLog::default()
        };
        let decoded = OfflineLog::decode(&log.encode().unwrap()).unwrap();
        assert_eq!(decoded, log);
        assert_eq!(decoded.step_count(), 4);
    }

    #[test]
    fn unknown_version_rejected() {
        let log = OfflineLog {
            version: 99,
            ..OfflineLog::default()
        };
        assert!(OfflineLog::decode(&log.encode().unwrap()).is_err());
    }

    #[test]
    fn advance_drops_completed_steps() {
        let mut e = entry(1);
        e.advance(1);
        assert_eq!(e.steps.len(), 1);
        assert_eq!(e.steps[0].verb(), "delete");
        e.advance(5);
        assert!(e.steps.is_empty());
    }

    #[test]
    fn remap_updates_target() {
        let mut e = entry(1);
        let authoritative = EntityId::new();
        let mut remap = IdRemap::new();
        remap.insert(e.entity_id, authoritative);
        e.remap(&remap);
        assert_eq!(e.entity_id, authoritative);
        assert!(e.steps.iter().all(|s| s.target_id() == authoritative));
    }
}
