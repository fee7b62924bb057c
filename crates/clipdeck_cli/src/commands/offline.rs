//! Offline queue listing.

use super::OFFLINE_SUFFIX;
use chrono::{DateTime, Utc};
use clipdeck_protocol::{OfflineLog, PendingMutation};
use clipdeck_storage::{FileKeyValueStore, KeyValueStore};
use serde::Serialize;
use std::path::Path;

/// One persisted queue.
#[derive(Debug, Serialize)]
pub struct QueueListing {
    /// Storage key.
    pub key: String,
    /// Entries, oldest first.
    pub entries: Vec<EntryListing>,
    /// Entries left out by `--limit`.
    pub omitted: usize,
}

/// One queued mutation.
#[derive(Debug, Serialize)]
pub struct EntryListing {
    /// Sequence number.
    pub id: u64,
    /// Target entity kind.
    pub kind: String,
    /// Target entity.
    pub entity_id: String,
    /// Pending calls as `"verb id"`.
    pub steps: Vec<String>,
    /// Enqueue time.
    pub enqueued_at: DateTime<Utc>,
    /// Replay attempts so far.
    pub attempts: u32,
}

impl From<&PendingMutation> for EntryListing {
    fn from(entry: &PendingMutation) -> Self {
        Self {
            id: entry.id,
            kind: entry.entity_kind.to_string(),
            entity_id: entry.entity_id.to_string(),
            steps: entry
                .steps
                .iter()
                .map(|step| format!("{} {} {}", step.verb(), step.kind, step.target_id()))
                .collect(),
            enqueued_at: entry.enqueued_at,
            attempts: entry.attempts,
        }
    }
}

/// Reads every offline queue under `path`.
pub fn list(path: &Path, limit: Option<usize>) -> Result<Vec<QueueListing>, Box<dyn std::error::Error>> {
    let store = FileKeyValueStore::open(path)?;
    let mut listings = Vec::new();
    for key in store.keys()? {
        if !key.ends_with(OFFLINE_SUFFIX) {
            continue;
        }
        let Some(bytes) = store.get(&key)? else {
            continue;
        };
        let log = OfflineLog::decode(&bytes).map_err(|e| format!("{key}: {e}"))?;
        let shown = limit.unwrap_or(log.entries.len()).min(log.entries.len());
        listings.push(QueueListing {
            entries: log.entries[..shown].iter().map(EntryListing::from).collect(),
            omitted: log.entries.len() - shown,
            key,
        });
    }
    Ok(listings)
}

/// Runs the offline command.
pub fn run(path: &Path, limit: Option<usize>, format: &str) -> Result<(), Box<dyn std::error::Error>> {
    let listings = list(path, limit)?;
    match format {
        "json" => println!("{}", serde_json::to_string_pretty(&listings)?),
        _ => print_text_output(&listings),
    }
    Ok(())
}

fn print_text_output(listings: &[QueueListing]) {
    if listings.is_empty() {
        println!("No offline queues found");
        return;
    }
    for listing in listings {
        println!("{} ({} entries)", listing.key, listing.entries.len() + listing.omitted);
        for entry in &listing.entries {
            println!(
                "  #{:<6} {} {} queued {} attempts {}",
                entry.id,
                entry.kind,
                entry.entity_id,
                entry.enqueued_at.to_rfc3339(),
                entry.attempts
            );
            for step in &entry.steps {
                println!("           {step}");
            }
        }
        if listing.omitted > 0 {
            println!("  ... {} more", listing.omitted);
        }
    }
}
