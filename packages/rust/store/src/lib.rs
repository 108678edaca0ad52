//! Result accumulation and durable output for geofill.
//!
//! [`ResultStore`] is the in-memory address-to-resolution map the engine
//! fills during a run; [`CoordinateSink`] is the durable boundary it flushes
//! through. The JSON file sink doubles as the resume source: a later run
//! seeds its store from the same file and skips every key already resolved.

mod sink;

use std::collections::BTreeMap;

use geofill_shared::{AddressKey, Coordinate, Resolution, Result};

pub use sink::{CoordinateSink, JsonFileSink, SinkSummary, inspect_file};

// ---------------------------------------------------------------------------
// ResultStore
// ---------------------------------------------------------------------------

/// In-memory map of lookup outcomes, keyed by full address.
///
/// Grows monotonically during a run and never evicts. A `BTreeMap` keeps the
/// flushed file deterministically ordered regardless of input order.
#[derive(Debug, Default)]
pub struct ResultStore {
    entries: BTreeMap<AddressKey, Resolution>,
    /// Entries recorded since the last flush.
    pending: usize,
}

/// Per-variant entry counts, for run reports and file summaries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StoreCounts {
    pub found: usize,
    pub no_match: usize,
    pub failed: usize,
}

impl ResultStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store seeded with previously resolved coordinates, for resumed runs.
    /// Seeded entries are already durable and do not count as pending.
    pub fn seeded(initial: BTreeMap<AddressKey, Coordinate>) -> Self {
        Self {
            entries: initial
                .into_iter()
                .map(|(key, coord)| (key, Resolution::Found(coord)))
                .collect(),
            pending: 0,
        }
    }

    /// Record the outcome for a key, overwriting any earlier entry.
    pub fn put(&mut self, key: AddressKey, resolution: Resolution) {
        self.entries.insert(key, resolution);
        self.pending += 1;
    }

    pub fn get(&self, key: &AddressKey) -> Option<&Resolution> {
        self.entries.get(key)
    }

    pub fn contains(&self, key: &AddressKey) -> bool {
        self.entries.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries in key order.
    pub fn entries(&self) -> impl Iterator<Item = (&AddressKey, &Resolution)> {
        self.entries.iter()
    }

    /// Number of entries recorded since the last flush.
    pub fn pending_writes(&self) -> usize {
        self.pending
    }

    pub fn counts(&self) -> StoreCounts {
        let mut counts = StoreCounts::default();
        for resolution in self.entries.values() {
            match resolution {
                Resolution::Found(_) => counts.found += 1,
                Resolution::NoMatch => counts.no_match += 1,
                Resolution::Failed { .. } => counts.failed += 1,
            }
        }
        counts
    }

    /// Write the current map through the sink and reset the pending count.
    pub fn flush(&mut self, sink: &dyn CoordinateSink) -> Result<()> {
        sink.write(&self.entries)?;
        self.pending = 0;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use geofill_shared::Coordinate;
    use std::path::PathBuf;
    use uuid::Uuid;

    fn tmp_path() -> PathBuf {
        std::env::temp_dir().join(format!("gf_test_{}.json", Uuid::now_v7()))
    }

    fn key(s: &str) -> AddressKey {
        AddressKey::new(s)
    }

    #[test]
    fn put_and_get() {
        let mut store = ResultStore::new();
        assert!(store.is_empty());

        store.put(key("a"), Resolution::Found(Coordinate(42.35, -71.06)));
        store.put(key("b"), Resolution::NoMatch);

        assert_eq!(store.len(), 2);
        assert!(store.contains(&key("a")));
        assert!(!store.contains(&key("c")));
        assert_eq!(
            store.get(&key("a")),
            Some(&Resolution::Found(Coordinate(42.35, -71.06)))
        );
        assert_eq!(store.get(&key("b")), Some(&Resolution::NoMatch));
    }

    #[test]
    fn put_overwrites_existing_entry() {
        let mut store = ResultStore::new();
        store.put(key("a"), Resolution::NoMatch);
        store.put(key("a"), Resolution::Found(Coordinate(1.0, 2.0)));

        assert_eq!(store.len(), 1);
        assert_eq!(
            store.get(&key("a")),
            Some(&Resolution::Found(Coordinate(1.0, 2.0)))
        );
    }

    #[test]
    fn entries_iterate_in_key_order() {
        let mut store = ResultStore::new();
        store.put(key("charlie"), Resolution::NoMatch);
        store.put(key("alpha"), Resolution::NoMatch);
        store.put(key("bravo"), Resolution::NoMatch);

        let keys: Vec<&str> = store.entries().map(|(k, _)| k.as_str()).collect();
        assert_eq!(keys, vec!["alpha", "bravo", "charlie"]);
    }

    #[test]
    fn counts_split_by_variant() {
        let mut store = ResultStore::new();
        store.put(key("a"), Resolution::Found(Coordinate(1.0, 2.0)));
        store.put(key("b"), Resolution::Found(Coordinate(3.0, 4.0)));
        store.put(key("c"), Resolution::NoMatch);
        store.put(
            key("d"),
            Resolution::Failed {
                detail: "OVER_QUERY_LIMIT".into(),
            },
        );

        let counts = store.counts();
        assert_eq!(counts.found, 2);
        assert_eq!(counts.no_match, 1);
        assert_eq!(counts.failed, 1);
    }

    #[test]
    fn seeded_entries_are_durable_not_pending() {
        let mut initial = std::collections::BTreeMap::new();
        initial.insert(key("a"), Coordinate(42.35, -71.06));
        initial.insert(key("b"), Coordinate(40.71, -74.0));

        let store = ResultStore::seeded(initial);
        assert_eq!(store.len(), 2);
        assert_eq!(store.pending_writes(), 0);
        assert!(store.contains(&key("a")));
        assert_eq!(store.counts().found, 2);
    }

    #[test]
    fn flush_resets_pending_count() {
        let path = tmp_path();
        let sink = JsonFileSink::new(&path);

        let mut store = ResultStore::new();
        store.put(key("a"), Resolution::Found(Coordinate(1.0, 2.0)));
        store.put(key("b"), Resolution::NoMatch);
        assert_eq!(store.pending_writes(), 2);

        store.flush(&sink).expect("flush should succeed");
        assert_eq!(store.pending_writes(), 0);

        store.put(key("c"), Resolution::NoMatch);
        assert_eq!(store.pending_writes(), 1);

        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn flush_then_seed_roundtrip_keeps_only_found() {
        let path = tmp_path();
        let sink = JsonFileSink::new(&path);

        let mut store = ResultStore::new();
        store.put(key("found"), Resolution::Found(Coordinate(42.35, -71.06)));
        store.put(key("missing"), Resolution::NoMatch);
        store.put(
            key("refused"),
            Resolution::Failed {
                detail: "REQUEST_DENIED".into(),
            },
        );
        store.flush(&sink).expect("flush should succeed");

        let reloaded = ResultStore::seeded(sink.load().expect("load should succeed"));
        assert_eq!(reloaded.len(), 1);
        assert_eq!(
            reloaded.get(&key("found")),
            Some(&Resolution::Found(Coordinate(42.35, -71.06)))
        );
        assert!(!reloaded.contains(&key("missing")));
        assert!(!reloaded.contains(&key("refused")));

        let _ = std::fs::remove_file(&path);
    }
}
