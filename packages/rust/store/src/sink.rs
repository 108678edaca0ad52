//! Durable output boundary for the result map.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use geofill_shared::{AddressKey, Coordinate, GeofillError, Resolution, Result};

/// Where flushed results go, and where a resumed run starts from.
///
/// `write` must leave a readable file even if the process dies mid-flush, so
/// `load` never sees a half-written map.
pub trait CoordinateSink {
    /// Persist the full map. Unresolved entries are recorded as explicit
    /// absences rather than placeholder coordinates.
    fn write(&self, entries: &BTreeMap<AddressKey, Resolution>) -> Result<()>;

    /// Previously resolved coordinates, if the sink holds any. Unresolved
    /// entries are omitted so a resumed run retries them.
    fn load(&self) -> Result<BTreeMap<AddressKey, Coordinate>>;
}

// ---------------------------------------------------------------------------
// JsonFileSink
// ---------------------------------------------------------------------------

/// JSON object on disk mapping each address key to `[lat, lng]`, or to
/// `null` when the lookup produced nothing usable.
pub struct JsonFileSink {
    path: PathBuf,
}

impl JsonFileSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl CoordinateSink for JsonFileSink {
    fn write(&self, entries: &BTreeMap<AddressKey, Resolution>) -> Result<()> {
        let view: BTreeMap<&str, Option<Coordinate>> = entries
            .iter()
            .map(|(key, resolution)| (key.as_str(), resolution.found()))
            .collect();

        let json = serde_json::to_string_pretty(&view)
            .map_err(|e| GeofillError::Storage(format!("failed to serialize results: {e}")))?;

        // Write to a sibling temp file first so an interrupted flush cannot
        // truncate the previous state.
        let tmp = self.path.with_extension("tmp");
        std::fs::write(&tmp, json).map_err(|e| GeofillError::io(&tmp, e))?;
        std::fs::rename(&tmp, &self.path).map_err(|e| GeofillError::io(&self.path, e))?;

        debug!(path = ?self.path, entries = entries.len(), "flushed results");
        Ok(())
    }

    fn load(&self) -> Result<BTreeMap<AddressKey, Coordinate>> {
        if !self.path.exists() {
            return Ok(BTreeMap::new());
        }

        let content =
            std::fs::read_to_string(&self.path).map_err(|e| GeofillError::io(&self.path, e))?;
        let raw: BTreeMap<String, Option<Coordinate>> =
            serde_json::from_str(&content).map_err(|e| {
                GeofillError::Storage(format!(
                    "unreadable results file {}: {e}",
                    self.path.display()
                ))
            })?;

        // `null` entries and the legacy (0, 0) failure marker both mean the
        // lookup never succeeded, so they are left out and retried.
        let resolved: BTreeMap<AddressKey, Coordinate> = raw
            .into_iter()
            .filter_map(|(key, coord)| match coord {
                Some(c) if !c.is_sentinel() => Some((AddressKey::new(key), c)),
                _ => None,
            })
            .collect();

        info!(path = ?self.path, resolved = resolved.len(), "loaded prior results");
        Ok(resolved)
    }
}

// ---------------------------------------------------------------------------
// Inspection
// ---------------------------------------------------------------------------

/// Entry counts of an existing results file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SinkSummary {
    pub total: usize,
    pub resolved: usize,
    pub unresolved: usize,
}

/// Summarize a results file without loading it into a store.
pub fn inspect_file(path: impl AsRef<Path>) -> Result<SinkSummary> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path).map_err(|e| GeofillError::io(path, e))?;
    let raw: BTreeMap<String, Option<Coordinate>> =
        serde_json::from_str(&content).map_err(|e| {
            GeofillError::Storage(format!("unreadable results file {}: {e}", path.display()))
        })?;

    let resolved = raw
        .values()
        .filter(|coord| matches!(coord, Some(c) if !c.is_sentinel()))
        .count();

    Ok(SinkSummary {
        total: raw.len(),
        resolved,
        unresolved: raw.len() - resolved,
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use uuid::Uuid;

    fn tmp_path() -> PathBuf {
        std::env::temp_dir().join(format!("gf_test_{}.json", Uuid::now_v7()))
    }

    fn key(s: &str) -> AddressKey {
        AddressKey::new(s)
    }

    fn sample_entries() -> BTreeMap<AddressKey, Resolution> {
        let mut entries = BTreeMap::new();
        entries.insert(
            key("100 Main St Boston, MA, 02101"),
            Resolution::Found(Coordinate(42.35, -71.06)),
        );
        entries.insert(key("1 Nowhere Ln Salem, MA, 01970"), Resolution::NoMatch);
        entries.insert(
            key("2 Broken Way Lynn, MA, 01901"),
            Resolution::Failed {
                detail: "REQUEST_DENIED: bad key".into(),
            },
        );
        entries
    }

    #[test]
    fn write_emits_pairs_and_nulls() {
        let path = tmp_path();
        let sink = JsonFileSink::new(&path);
        sink.write(&sample_entries()).expect("write should succeed");

        let content = std::fs::read_to_string(&path).expect("file should exist");
        let value: serde_json::Value =
            serde_json::from_str(&content).expect("file should be valid JSON");

        let resolved = &value["100 Main St Boston, MA, 02101"];
        assert_eq!(resolved[0], 42.35);
        assert_eq!(resolved[1], -71.06);
        assert!(value["1 Nowhere Ln Salem, MA, 01970"].is_null());
        assert!(value["2 Broken Way Lynn, MA, 01901"].is_null());

        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn write_leaves_no_temp_file_behind() {
        let path = tmp_path();
        let sink = JsonFileSink::new(&path);
        sink.write(&sample_entries()).expect("write should succeed");

        assert!(path.exists());
        assert!(!path.with_extension("tmp").exists());

        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn rewrite_replaces_previous_content() {
        let path = tmp_path();
        let sink = JsonFileSink::new(&path);

        let mut first = BTreeMap::new();
        first.insert(key("a"), Resolution::NoMatch);
        sink.write(&first).expect("first write should succeed");

        let mut second = BTreeMap::new();
        second.insert(key("b"), Resolution::Found(Coordinate(1.0, 2.0)));
        sink.write(&second).expect("second write should succeed");

        let loaded = sink.load().expect("load should succeed");
        assert_eq!(loaded.len(), 1);
        assert!(loaded.contains_key(&key("b")));
        assert!(!loaded.contains_key(&key("a")));

        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn load_missing_file_is_empty() {
        let sink = JsonFileSink::new(tmp_path());
        let loaded = sink.load().expect("missing file should load as empty");
        assert!(loaded.is_empty());
    }

    #[test]
    fn load_skips_nulls_and_zero_pairs() {
        let path = tmp_path();
        std::fs::write(
            &path,
            r#"{
  "kept": [42.35, -71.06],
  "never resolved": null,
  "old failure marker": [0.0, 0.0]
}"#,
        )
        .expect("fixture write should succeed");

        let sink = JsonFileSink::new(&path);
        let loaded = sink.load().expect("load should succeed");

        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded.get(&key("kept")), Some(&Coordinate(42.35, -71.06)));

        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn load_rejects_garbage() {
        let path = tmp_path();
        std::fs::write(&path, "not json at all").expect("fixture write should succeed");

        let sink = JsonFileSink::new(&path);
        let err = sink.load().expect_err("garbage should not load");
        assert!(matches!(err, GeofillError::Storage(_)));

        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn inspect_counts_resolved_and_unresolved() {
        let path = tmp_path();
        let sink = JsonFileSink::new(&path);
        sink.write(&sample_entries()).expect("write should succeed");

        let summary = inspect_file(&path).expect("inspect should succeed");
        assert_eq!(summary.total, 3);
        assert_eq!(summary.resolved, 1);
        assert_eq!(summary.unresolved, 2);

        let _ = std::fs::remove_file(&path);
    }
}
