//! Verify command implementation.

use super::{DRAFT_SUFFIX, OFFLINE_SUFFIX};
use clipdeck_codec::from_cbor;
use clipdeck_core::ProjectSnapshot;
use clipdeck_protocol::OfflineLog;
use clipdeck_storage::{FileKeyValueStore, KeyValueStore};
use std::path::Path;

/// Verification result.
#[derive(Debug, Default)]
pub struct VerifyResult {
    /// Keys checked.
    pub keys_checked: usize,
    /// Problems found, one per key.
    pub errors: Vec<String>,
}

impl VerifyResult {
    fn is_ok(&self) -> bool {
        self.errors.is_empty()
    }
}

fn check_draft(bytes: &[u8]) -> Result<(), String> {
    let snapshot: ProjectSnapshot = from_cbor(bytes).map_err(|e| e.to_string())?;
    snapshot.validate().map_err(|e| e.to_string())
}

fn check_offline(bytes: &[u8]) -> Result<(), String> {
    OfflineLog::decode(bytes).map(|_| ()).map_err(|e| e.to_string())
}

/// Decodes and validates every draft and offline queue under `path`.
pub fn verify(path: &Path) -> Result<VerifyResult, Box<dyn std::error::Error>> {
    let store = FileKeyValueStore::open(path)?;
    let mut result = VerifyResult::default();

    for key in store.keys()? {
        let check: fn(&[u8]) -> Result<(), String> = if key.ends_with(DRAFT_SUFFIX) {
            check_draft
        } else if key.ends_with(OFFLINE_SUFFIX) {
            check_offline
        } else {
            continue;
        };
        let Some(bytes) = store.get(&key)? else {
            continue;
        };
        result.keys_checked += 1;
        if let Err(e) = check(&bytes) {
            tracing::debug!(%key, error = %e, "verification failed");
            result.errors.push(format!("{key}: {e}"));
        }
    }

    Ok(result)
}

/// Runs the verify command.
pub fn run(path: &Path) -> Result<(), Box<dyn std::error::Error>> {
    println!("Verifying state at {}", path.display());
    println!();

    let result = verify(path)?;
    println!("  Keys checked: {}", result.keys_checked);
    for error in &result.errors {
        println!("  ERROR: {error}");
    }
    println!();

    if result.is_ok() {
        println!("✓ All drafts and offline queues are valid");
        Ok(())
    } else {
        Err(format!("{} invalid keys", result.errors.len()).into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use clipdeck_codec::to_cbor;
    use clipdeck_core::{OrderedCollection, Project, Segment};

    fn snapshot() -> ProjectSnapshot {
        let now = Utc::now();
        let project = Project::new("demo", now);
        let segments = OrderedCollection::new()
            .push(Segment::new(project.id, "a", 0.0, 5.0, now).unwrap())
            .unwrap();
        ProjectSnapshot::capture(&project, &segments, &OrderedCollection::new())
    }

    #[test]
    fn valid_state_passes() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileKeyValueStore::open(dir.path()).unwrap();
        store.set("clipdeck.p1.draft", &to_cbor(&snapshot()).unwrap()).unwrap();
        store
            .set("clipdeck.p1.offline_queue", &OfflineLog::default().encode().unwrap())
            .unwrap();

        let result = verify(dir.path()).unwrap();
        assert_eq!(result.keys_checked, 2);
        assert!(result.is_ok());
    }

    #[test]
    fn draft_with_broken_order_fails() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileKeyValueStore::open(dir.path()).unwrap();
        let mut draft = snapshot();
        draft.segments[0].order = 3;
        store.set("clipdeck.p1.draft", &to_cbor(&draft).unwrap()).unwrap();

        let result = verify(dir.path()).unwrap();
        assert_eq!(result.errors.len(), 1);
        assert!(result.errors[0].starts_with("clipdeck.p1.draft"));
    }
}
