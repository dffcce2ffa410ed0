// ── Variant cache ──
//
// Remembers which API variant last produced usable data for each device so
// a restart goes straight to the right endpoint. The file is loaded once
// and rewritten in full on every update:
//
//   { "variants": { "<plantId>": { "variant": "medPlantData", "updatedAt": "<rfc3339>" } } }
//
// Persistence is best-effort: read and write failures are logged and the
// cache degrades to in-memory only.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use velis_api::Variant;

/// File name of the cache inside the configured directory.
pub const CACHE_FILE_NAME: &str = "velis-cache.json";

/// A cached variant for one device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CachedVariant {
    pub variant: Variant,
    pub updated_at: DateTime<Utc>,
}

/// On-disk entry. The variant stays a plain string so one unknown name
/// does not invalidate the whole file.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StoredEntry {
    variant: String,
    updated_at: DateTime<Utc>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct CacheFile {
    #[serde(default)]
    variants: BTreeMap<String, StoredEntry>,
}

/// Persistent plant-id → variant map.
#[derive(Debug)]
pub struct VariantCache {
    path: PathBuf,
    entries: Mutex<BTreeMap<String, StoredEntry>>,
}

impl VariantCache {
    /// Load the cache file at `path`. A missing or unreadable file yields
    /// an empty cache.
    pub fn load(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let entries = read_file(&path);
        debug!(path = %path.display(), entries = entries.len(), "variant cache loaded");
        Self {
            path,
            entries: Mutex::new(entries),
        }
    }

    /// The remembered variant for `plant_id`, if any.
    pub fn get(&self, plant_id: &str) -> Option<CachedVariant> {
        let entries = self.entries.lock().expect("variant cache lock poisoned");
        let entry = entries.get(plant_id)?;
        match entry.variant.parse::<Variant>() {
            Ok(variant) => Some(CachedVariant {
                variant,
                updated_at: entry.updated_at,
            }),
            Err(_) => {
                debug!(plant = plant_id, variant = %entry.variant, "ignoring unknown cached variant");
                None
            }
        }
    }

    /// Remember `variant` for `plant_id` and rewrite the file.
    pub fn put(&self, plant_id: &str, variant: Variant) {
        let mut entries = self.entries.lock().expect("variant cache lock poisoned");
        entries.insert(
            plant_id.to_owned(),
            StoredEntry {
                variant: variant.to_string(),
                updated_at: Utc::now(),
            },
        );
        write_file(&self.path, &entries);
    }

    pub fn len(&self) -> usize {
        self.entries.lock().expect("variant cache lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn read_file(path: &Path) -> BTreeMap<String, StoredEntry> {
    let contents = match std::fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return BTreeMap::new(),
        Err(e) => {
            warn!(path = %path.display(), error = %e, "failed to read variant cache");
            return BTreeMap::new();
        }
    };
    match serde_json::from_str::<CacheFile>(&contents) {
        Ok(file) => file.variants,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "variant cache is corrupt, starting empty");
            BTreeMap::new()
        }
    }
}

fn write_file(path: &Path, entries: &BTreeMap<String, StoredEntry>) {
    #[derive(Serialize)]
    struct CacheFileRef<'a> {
        variants: &'a BTreeMap<String, StoredEntry>,
    }

    if let Some(parent) = path.parent() {
        if let Err(e) = std::fs::create_dir_all(parent) {
            warn!(path = %parent.display(), error = %e, "failed to create cache directory");
            return;
        }
    }
    let json = match serde_json::to_string_pretty(&CacheFileRef { variants: entries }) {
        Ok(json) => json,
        Err(e) => {
            warn!(error = %e, "failed to serialize variant cache");
            return;
        }
    };
    if let Err(e) = std::fs::write(path, json) {
        warn!(path = %path.display(), error = %e, "failed to write variant cache");
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn missing_file_is_empty() {
        let dir = tempfile::tempdir().expect("tempdir");
        let cache = VariantCache::load(dir.path().join(CACHE_FILE_NAME));
        assert!(cache.is_empty());
        assert_eq!(cache.get("PLANT1"), None);
    }

    #[test]
    fn put_persists_across_loads() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join(CACHE_FILE_NAME);

        let cache = VariantCache::load(&path);
        cache.put("PLANT1", Variant::Med);

        let reloaded = VariantCache::load(&path);
        let entry = reloaded.get("PLANT1").expect("entry persisted");
        assert_eq!(entry.variant, Variant::Med);
    }

    #[test]
    fn repeated_put_keeps_single_entry() {
        let dir = tempfile::tempdir().expect("tempdir");
        let cache = VariantCache::load(dir.path().join(CACHE_FILE_NAME));

        cache.put("PLANT1", Variant::Evo);
        let first = cache.get("PLANT1").expect("entry");
        cache.put("PLANT1", Variant::Evo);
        let second = cache.get("PLANT1").expect("entry");

        assert_eq!(cache.len(), 1);
        assert!(second.updated_at >= first.updated_at);
    }

    #[test]
    fn file_layout_matches_wire_names() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join(CACHE_FILE_NAME);
        VariantCache::load(&path).put("PLANT1", Variant::Slp);

        let raw: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).expect("read")).expect("json");
        assert_eq!(raw["variants"]["PLANT1"]["variant"], "slpPlantData");
        assert!(raw["variants"]["PLANT1"]["updatedAt"].is_string());
    }

    #[test]
    fn corrupt_file_starts_empty() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join(CACHE_FILE_NAME);
        std::fs::write(&path, "{ not json").expect("write");

        let cache = VariantCache::load(&path);
        assert!(cache.is_empty());

        cache.put("PLANT1", Variant::Se);
        assert_eq!(VariantCache::load(&path).len(), 1);
    }

    #[test]
    fn unknown_variant_is_ignored() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join(CACHE_FILE_NAME);
        std::fs::write(
            &path,
            r#"{"variants":{"A":{"variant":"bogusPlantData","updatedAt":"2024-05-01T10:00:00Z"},
                            "B":{"variant":"onePlantData","updatedAt":"2024-05-01T10:00:00Z"}}}"#,
        )
        .expect("write");

        let cache = VariantCache::load(&path);
        assert_eq!(cache.get("A"), None);
        assert_eq!(cache.get("B").map(|c| c.variant), Some(Variant::One));
    }

    #[test]
    fn unwritable_location_degrades_to_memory() {
        let dir = tempfile::tempdir().expect("tempdir");
        let blocker = dir.path().join("file");
        std::fs::write(&blocker, "x").expect("write");

        let cache = VariantCache::load(blocker.join(CACHE_FILE_NAME));
        cache.put("PLANT1", Variant::Med);
        assert_eq!(cache.get("PLANT1").map(|c| c.variant), Some(Variant::Med));
    }
}
