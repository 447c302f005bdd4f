//! Persisted n-gram counts and the aggregates the scorer needs.
//!
//! A gram is identified by `(order, text)`, where `text` is the concatenation
//! of `order` consecutive tokens with no separator. Counts only ever grow by
//! summation, so merging partial stores is commutative and associative: the
//! final store does not depend on how the corpus was sharded or in which
//! order shards were merged.
//!
//! # Aggregates
//!
//! `total_unigram_count` and `vocab_size` are kept in step with every
//! mutation (incrementally on `increment`, recomputed after `prune`), so the
//! scorer can read them without scanning the table.
//!
//! # Artifact
//!
//! On disk the store is a bincode-encoded list of `(order, gram, count)`
//! records sorted by key, written atomically through a temporary file.

use crate::error::{Error, Result};
use ahash::AHashMap;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;
use tempfile::NamedTempFile;

/// One row of the gram table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GramRecord {
    pub order: u32,
    pub gram: String,
    pub count: u64,
}

#[derive(Serialize, Deserialize)]
struct StoreFile {
    records: Vec<GramRecord>,
}

/// Keep only the most frequent very short unigrams.
///
/// Among order-1 grams shorter than `max_chars` characters, the top
/// `ceil(keep_ratio * k)` by count survive (ties broken by text).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ShortUnigramCutoff {
    pub max_chars: usize,
    pub keep_ratio: f64,
}

#[derive(Debug, Clone, Default)]
pub struct GramStore {
    /// `orders[k]` holds the grams of order `k + 1`.
    orders: Vec<AHashMap<String, u64>>,
    total_unigrams: u64,
}

impl GramStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `delta` to `(order, gram)`, creating the entry if absent.
    ///
    /// Order 0 and zero deltas are ignored.
    pub fn increment(&mut self, order: usize, gram: &str, delta: u64) {
        if order == 0 || delta == 0 {
            return;
        }
        if self.orders.len() < order {
            self.orders.resize_with(order, AHashMap::new);
        }

        match self.orders[order - 1].get_mut(gram) {
            Some(count) => *count += delta,
            None => {
                self.orders[order - 1].insert(gram.to_string(), delta);
            }
        }

        if order == 1 {
            self.total_unigrams += delta;
        }
    }

    /// Count for `(order, gram)`; 0 when absent.
    pub fn get(&self, order: usize, gram: &str) -> u64 {
        if order == 0 {
            return 0;
        }
        self.orders
            .get(order - 1)
            .and_then(|table| table.get(gram))
            .copied()
            .unwrap_or(0)
    }

    /// Sum of all order-1 counts, floored at 1 so it can divide.
    pub fn total_unigram_count(&self) -> u64 {
        self.total_unigrams.max(1)
    }

    /// Number of distinct order-1 grams.
    pub fn vocab_size(&self) -> usize {
        self.orders.first().map_or(0, |table| table.len())
    }

    /// Highest order with a table (possibly empty after pruning).
    pub fn max_order(&self) -> usize {
        self.orders.len()
    }

    /// Number of stored grams across all orders.
    pub fn len(&self) -> usize {
        self.orders.iter().map(|table| table.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of grams stored at `order`.
    pub fn order_len(&self, order: usize) -> usize {
        if order == 0 {
            return 0;
        }
        self.orders.get(order - 1).map_or(0, |table| table.len())
    }

    /// Sum another partial store into this one.
    pub fn merge(&mut self, other: &GramStore) {
        for (index, table) in other.orders.iter().enumerate() {
            self.merge_order(index + 1, table);
        }
    }

    /// Sum a table of order-`order` counts into the store.
    pub fn merge_order(&mut self, order: usize, table: &AHashMap<String, u64>) {
        for (gram, &count) in table {
            self.increment(order, gram, count);
        }
    }

    /// Delete every entry for which `predicate(order, gram, count)` holds.
    ///
    /// Returns the number of entries removed.
    pub fn prune<F>(&mut self, mut predicate: F) -> usize
    where
        F: FnMut(usize, &str, u64) -> bool,
    {
        let mut removed = 0;
        for (index, table) in self.orders.iter_mut().enumerate() {
            let before = table.len();
            table.retain(|gram, count| !predicate(index + 1, gram, *count));
            removed += before - table.len();
        }
        self.recompute_aggregates();
        removed
    }

    /// Drop grams of order > 1 seen at most once.
    pub fn prune_hapax(&mut self) -> usize {
        self.prune(|order, _, count| order > 1 && count <= 1)
    }

    /// Apply a [`ShortUnigramCutoff`]; returns the number of entries removed.
    pub fn prune_short_unigrams(&mut self, cutoff: ShortUnigramCutoff) -> usize {
        let Some(unigrams) = self.orders.first() else {
            return 0;
        };

        let mut short: Vec<(&String, u64)> = unigrams
            .iter()
            .filter(|(gram, _)| gram.chars().count() < cutoff.max_chars)
            .map(|(gram, &count)| (gram, count))
            .collect();
        short.sort_by(|a, b| match b.1.cmp(&a.1) {
            Ordering::Equal => a.0.cmp(b.0),
            other => other,
        });

        let ratio = cutoff.keep_ratio.clamp(0.0, 1.0);
        let keep = (ratio * short.len() as f64).ceil() as usize;
        let dropped: ahash::AHashSet<String> = short
            .into_iter()
            .skip(keep)
            .map(|(gram, _)| gram.clone())
            .collect();

        if dropped.is_empty() {
            return 0;
        }
        self.prune(|order, gram, _| order == 1 && dropped.contains(gram))
    }

    /// All entries sorted by `(order, gram)`.
    pub fn records(&self) -> Vec<GramRecord> {
        let mut records: Vec<GramRecord> = self
            .orders
            .iter()
            .enumerate()
            .flat_map(|(index, table)| {
                table.iter().map(move |(gram, &count)| GramRecord {
                    order: (index + 1) as u32,
                    gram: gram.clone(),
                    count,
                })
            })
            .collect();
        records.sort_by(|a, b| a.order.cmp(&b.order).then_with(|| a.gram.cmp(&b.gram)));
        records
    }

    /// Write the store atomically to `path`.
    pub fn save(&self, path: &Path) -> Result<()> {
        let parent_dir = match path.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => dir,
            _ => Path::new("."),
        };
        fs::create_dir_all(parent_dir)?;

        let file = StoreFile {
            records: self.records(),
        };

        let temp_file = NamedTempFile::new_in(parent_dir)?;
        {
            let mut writer = BufWriter::new(&temp_file);
            bincode::serialize_into(&mut writer, &file)?;
            writer.flush()?;
        }
        temp_file.persist(path)?;

        log::info!(
            "Saved gram store to {} ({} grams)",
            path.display(),
            file.records.len()
        );
        Ok(())
    }

    /// Load a store written by [`GramStore::save`].
    ///
    /// A missing file is [`Error::MissingGramStore`].
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(Error::MissingGramStore(path.to_path_buf()));
        }

        let reader = BufReader::new(File::open(path)?);
        let file: StoreFile = bincode::deserialize_from(reader)?;

        let mut store = Self::new();
        for record in &file.records {
            store.increment(record.order as usize, &record.gram, record.count);
        }

        log::info!(
            "Loaded gram store from {} ({} grams, vocab {})",
            path.display(),
            store.len(),
            store.vocab_size()
        );
        Ok(store)
    }

    fn recompute_aggregates(&mut self) {
        self.total_unigrams = self.orders.first().map_or(0, |table| table.values().sum());
    }
}

impl PartialEq for GramStore {
    fn eq(&self, other: &Self) -> bool {
        self.records() == other.records()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_store() -> GramStore {
        let mut store = GramStore::new();
        store.increment(1, "爸", 10);
        store.increment(1, "妈", 10);
        store.increment(2, "爸妈", 5);
        store.increment(2, "妈爸", 1);
        store.increment(3, "爸妈爸", 1);
        store
    }

    #[test]
    fn test_get_and_aggregates() {
        let store = sample_store();
        assert_eq!(store.get(1, "爸"), 10);
        assert_eq!(store.get(2, "爸妈"), 5);
        assert_eq!(store.get(2, "不在"), 0);
        assert_eq!(store.get(7, "爸"), 0);
        assert_eq!(store.get(0, "爸"), 0);
        assert_eq!(store.total_unigram_count(), 20);
        assert_eq!(store.vocab_size(), 2);
        assert_eq!(store.max_order(), 3);
    }

    #[test]
    fn test_empty_store_total_floor() {
        let store = GramStore::new();
        assert_eq!(store.total_unigram_count(), 1);
        assert_eq!(store.vocab_size(), 0);
        assert!(store.is_empty());
    }

    #[test]
    fn test_merge_order_independent() {
        let mut a = GramStore::new();
        a.increment(1, "我", 2);
        a.increment(2, "我们", 1);
        let mut b = GramStore::new();
        b.increment(1, "我", 3);
        b.increment(1, "们", 1);
        b.increment(2, "我们", 4);

        let mut ab = GramStore::new();
        ab.merge(&a);
        ab.merge(&b);
        let mut ba = GramStore::new();
        ba.merge(&b);
        ba.merge(&a);

        assert_eq!(ab, ba);
        assert_eq!(ab.get(1, "我"), 5);
        assert_eq!(ab.get(2, "我们"), 5);
        assert_eq!(ab.total_unigram_count(), 6);
    }

    #[test]
    fn test_prune_hapax_idempotent() {
        let mut store = sample_store();
        let removed = store.prune_hapax();
        assert_eq!(removed, 2);
        let once = store.clone();

        assert_eq!(store.prune_hapax(), 0);
        assert_eq!(store, once);
        assert_eq!(store.get(2, "爸妈"), 5);
        assert_eq!(store.get(2, "妈爸"), 0);
        assert_eq!(store.vocab_size(), 2);
    }

    #[test]
    fn test_prune_recomputes_total() {
        let mut store = sample_store();
        store.prune(|order, gram, _| order == 1 && gram == "爸");
        assert_eq!(store.total_unigram_count(), 10);
        assert_eq!(store.vocab_size(), 1);
    }

    #[test]
    fn test_prune_short_unigrams() {
        let mut store = GramStore::new();
        store.increment(1, "的", 50);
        store.increment(1, "了", 40);
        store.increment(1, "吗", 3);
        store.increment(1, "呢", 1);
        store.increment(1, "我们", 1);

        let removed = store.prune_short_unigrams(ShortUnigramCutoff {
            max_chars: 2,
            keep_ratio: 0.5,
        });

        assert_eq!(removed, 2);
        assert_eq!(store.get(1, "的"), 50);
        assert_eq!(store.get(1, "了"), 40);
        assert_eq!(store.get(1, "吗"), 0);
        assert_eq!(store.get(1, "我们"), 1);
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("ngram.bin");
        let store = sample_store();

        store.save(&path).unwrap();
        let loaded = GramStore::load(&path).unwrap();

        assert_eq!(loaded, store);
        assert_eq!(loaded.total_unigram_count(), 20);
    }

    #[test]
    fn test_load_missing_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let result = GramStore::load(&dir.path().join("absent.bin"));
        assert!(matches!(result, Err(Error::MissingGramStore(_))));
    }
}
