//! Inspect command implementation.

use super::{DRAFT_SUFFIX, OFFLINE_SUFFIX};
use clipdeck_storage::{FileKeyValueStore, KeyValueStore};
use serde::Serialize;
use std::path::Path;

/// State directory inspection result.
#[derive(Debug, Serialize)]
pub struct InspectResult {
    /// State directory.
    pub path: String,
    /// Total stored bytes.
    pub used_bytes: u64,
    /// Stored keys.
    pub keys: Vec<KeyInfo>,
}

/// One stored key.
#[derive(Debug, Serialize)]
pub struct KeyInfo {
    /// The key.
    pub key: String,
    /// What the value holds.
    pub role: &'static str,
    /// Value size in bytes.
    pub size: usize,
}

fn role(key: &str) -> &'static str {
    if key.ends_with(OFFLINE_SUFFIX) {
        "offline queue"
    } else if key.ends_with(DRAFT_SUFFIX) {
        "draft"
    } else {
        "other"
    }
}

/// Collects key sizes under `path`.
pub fn inspect(path: &Path) -> Result<InspectResult, Box<dyn std::error::Error>> {
    if !path.is_dir() {
        return Err(format!("No state directory at {}", path.display()).into());
    }
    let store = FileKeyValueStore::open(path)?;

    let mut keys = Vec::new();
    for key in store.keys()? {
        let size = store.get(&key)?.map_or(0, |value| value.len());
        keys.push(KeyInfo {
            role: role(&key),
            key,
            size,
        });
    }

    Ok(InspectResult {
        path: path.display().to_string(),
        used_bytes: store.quota()?.used_bytes,
        keys,
    })
}

/// Runs the inspect command.
pub fn run(path: &Path, format: &str) -> Result<(), Box<dyn std::error::Error>> {
    let result = inspect(path)?;
    match format {
        "json" => println!("{}", serde_json::to_string_pretty(&result)?),
        _ => print_text_output(&result),
    }
    Ok(())
}

fn print_text_output(result: &InspectResult) {
    println!("Clipdeck State: {}", result.path);
    println!("================{}", "=".repeat(result.path.len()));
    println!();
    println!("Used: {} bytes in {} keys", result.used_bytes, result.keys.len());
    println!();
    for key in &result.keys {
        println!("  {:<48} {:>14} {:>10} bytes", key.key, key.role, key.size);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keys_are_labelled_by_suffix() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileKeyValueStore::open(dir.path()).unwrap();
        store.set("clipdeck.p1.offline_queue", b"abc").unwrap();
        store.set("clipdeck.p1.draft", b"abcdef").unwrap();
        store.set("settings", b"x").unwrap();

        let result = inspect(dir.path()).unwrap();
        let roles: Vec<(&str, &str, usize)> = result
            .keys
            .iter()
            .map(|k| (k.key.as_str(), k.role, k.size))
            .collect();
        assert_eq!(
            roles,
            [
                ("clipdeck.p1.draft", "draft", 6),
                ("clipdeck.p1.offline_queue", "offline queue", 3),
                ("settings", "other", 1),
            ]
        );
    }

    #[test]
    fn missing_directory_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(inspect(&dir.path().join("absent")).is_err());
    }
}
