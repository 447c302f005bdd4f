//! Confusion sets: words bucketed by how they sound.
//!
//! Every word sharing a phonetic key is a substitution candidate for every
//! other. Buckets are kept ordered by descending frequency, then by word, so
//! candidate enumeration is deterministic across runs.
//!
//! # Artifact Format
//!
//! ```text
//! {
//!   "unigram": { "xì,yán": { "戏言": 120, "细研": 8 } },
//!   "bigram":  { "深钻\t细研": 3 }
//! }
//! ```
//!
//! `bigram` holds adjacent word-pair frequencies and is used for diagnostics.
//! Entries with non-positive frequency are never stored.

use crate::error::Result;
use crate::text::PhoneticKey;
use ahash::AHashMap;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;
use tempfile::NamedTempFile;

/// A surface form and its (reweighted) corpus frequency.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfusionEntry {
    pub word: String,
    pub frequency: u64,
}

#[derive(Serialize, Deserialize, Default)]
struct ConfusionFile {
    #[serde(default)]
    unigram: BTreeMap<String, BTreeMap<String, i64>>,
    #[serde(default)]
    bigram: BTreeMap<String, i64>,
}

/// Most frequent first, then by word.
fn sort_bucket(bucket: &mut [ConfusionEntry]) {
    bucket.sort_by(|a, b| b.frequency.cmp(&a.frequency).then_with(|| a.word.cmp(&b.word)));
}

/// Key used for the pair tally of two adjacent words.
pub fn pair_key(first: &str, second: &str) -> String {
    format!("{first}\t{second}")
}

#[derive(Debug, Clone, Default)]
pub struct ConfusionSet {
    buckets: AHashMap<String, Vec<ConfusionEntry>>,
    pairs: AHashMap<String, u64>,
}

impl ConfusionSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bucket word tallies by phonetic key and keep the pair tallies.
    pub fn from_tallies(
        words: &AHashMap<String, u64>,
        pairs: &AHashMap<String, u64>,
        keyer: &dyn PhoneticKey,
    ) -> Self {
        let mut set = Self::new();
        for (word, &frequency) in words {
            set.push_entry(keyer.key(word), word, frequency);
        }
        for (pair, &frequency) in pairs {
            if frequency > 0 {
                set.pairs.insert(pair.clone(), frequency);
            }
        }
        set.sort_buckets();
        set
    }

    /// Record `word` under `key`, replacing any previous frequency.
    pub fn insert(&mut self, key: &str, word: &str, frequency: u64) {
        if frequency == 0 {
            return;
        }

        let bucket = self.buckets.entry(key.to_string()).or_default();
        match bucket.iter_mut().find(|entry| entry.word == word) {
            Some(entry) => entry.frequency = frequency,
            None => bucket.push(ConfusionEntry {
                word: word.to_string(),
                frequency,
            }),
        }
        sort_bucket(bucket);
    }

    /// Append without ordering; callers must run `sort_buckets` afterwards.
    /// Words must be unique per key.
    fn push_entry(&mut self, key: String, word: &str, frequency: u64) {
        if frequency == 0 {
            return;
        }
        self.buckets.entry(key).or_default().push(ConfusionEntry {
            word: word.to_string(),
            frequency,
        });
    }

    fn sort_buckets(&mut self) {
        for bucket in self.buckets.values_mut() {
            sort_bucket(bucket);
        }
    }

    /// Words sharing `key`, most frequent first. Empty when unknown.
    pub fn candidates(&self, key: &str) -> &[ConfusionEntry] {
        self.buckets.get(key).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Frequency of `word` in its own bucket, 0 when unknown.
    pub fn word_frequency(&self, keyer: &dyn PhoneticKey, word: &str) -> u64 {
        self.candidates(&keyer.key(word))
            .iter()
            .find(|entry| entry.word == word)
            .map_or(0, |entry| entry.frequency)
    }

    /// How often `second` directly followed `first`.
    pub fn pair_frequency(&self, first: &str, second: &str) -> u64 {
        self.pairs.get(&pair_key(first, second)).copied().unwrap_or(0)
    }

    /// Number of phonetic keys.
    pub fn len(&self) -> usize {
        self.buckets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }

    /// Number of distinct words across all buckets.
    pub fn word_count(&self) -> usize {
        self.buckets.values().map(Vec::len).sum()
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let parent_dir = match path.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => dir,
            _ => Path::new("."),
        };
        fs::create_dir_all(parent_dir)?;

        let mut file = ConfusionFile::default();
        for (key, bucket) in &self.buckets {
            let words = bucket
                .iter()
                .map(|entry| (entry.word.clone(), entry.frequency as i64))
                .collect();
            file.unigram.insert(key.clone(), words);
        }
        for (pair, &frequency) in &self.pairs {
            file.bigram.insert(pair.clone(), frequency as i64);
        }

        let temp_file = NamedTempFile::new_in(parent_dir)?;
        {
            let mut writer = BufWriter::new(&temp_file);
            serde_json::to_writer(&mut writer, &file)?;
            writer.flush()?;
        }
        temp_file.persist(path)?;

        log::info!(
            "Saved confusion set to {} ({} keys, {} words)",
            path.display(),
            self.len(),
            self.word_count()
        );
        Ok(())
    }

    /// Load a confusion set, degrading to an empty one when the file is missing.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            log::warn!(
                "Confusion set not found at {}; corrections are disabled",
                path.display()
            );
            return Ok(Self::new());
        }

        let reader = BufReader::new(File::open(path)?);
        let file: ConfusionFile = serde_json::from_reader(reader)?;

        let mut set = Self::new();
        for (key, words) in &file.unigram {
            for (word, &frequency) in words {
                if frequency > 0 {
                    set.push_entry(key.clone(), word, frequency as u64);
                }
            }
        }
        set.sort_buckets();
        for (pair, &frequency) in &file.bigram {
            if frequency > 0 {
                set.pairs.insert(pair.clone(), frequency as u64);
            }
        }

        log::info!(
            "Loaded confusion set from {} ({} keys, {} words)",
            path.display(),
            set.len(),
            set.word_count()
        );
        Ok(set)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::text::test_support::TableKey;

    fn keyer() -> TableKey {
        TableKey::new(&[('戏', "xi"), ('细', "xi"), ('言', "yan"), ('研', "yan")])
    }

    #[test]
    fn test_from_tallies_buckets_by_key() {
        let words: AHashMap<String, u64> = [("戏言", 120), ("细研", 8), ("母亲", 50), ("零", 0)]
            .into_iter()
            .map(|(w, f)| (w.to_string(), f))
            .collect();
        let pairs: AHashMap<String, u64> = [(pair_key("深钻", "细研"), 3)].into_iter().collect();

        let set = ConfusionSet::from_tallies(&words, &pairs, &keyer());

        let bucket = set.candidates("xi,yan");
        assert_eq!(bucket.len(), 2);
        assert_eq!(bucket[0].word, "戏言");
        assert_eq!(bucket[1].word, "细研");
        assert_eq!(set.word_count(), 3);
        assert_eq!(set.word_frequency(&keyer(), "细研"), 8);
        assert_eq!(set.word_frequency(&keyer(), "零"), 0);
        assert_eq!(set.pair_frequency("深钻", "细研"), 3);
        assert_eq!(set.pair_frequency("深钻", "戏言"), 0);
    }

    #[test]
    fn test_bucket_order_is_deterministic() {
        let mut set = ConfusionSet::new();
        set.insert("k", "乙", 5);
        set.insert("k", "甲", 5);
        set.insert("k", "丙", 9);

        let words: Vec<&str> = set.candidates("k").iter().map(|e| e.word.as_str()).collect();
        assert_eq!(words, vec!["丙", "乙", "甲"]);
        assert!(set.candidates("missing").is_empty());
    }

    #[test]
    fn test_bulk_load_orders_buckets() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("token_dict.json");
        std::fs::write(
            &path,
            r#"{"unigram": {"k": {"甲": 5, "丙": 9, "乙": 5, "丁": 1}}}"#,
        )
        .unwrap();

        let set = ConfusionSet::load(&path).unwrap();
        let words: Vec<&str> = set.candidates("k").iter().map(|e| e.word.as_str()).collect();
        assert_eq!(words, vec!["丙", "乙", "甲", "丁"]);

        let tallies: AHashMap<String, u64> = [("细言", 2), ("戏研", 2), ("细研", 7)]
            .into_iter()
            .map(|(w, f)| (w.to_string(), f))
            .collect();
        let set = ConfusionSet::from_tallies(&tallies, &AHashMap::new(), &keyer());
        let words: Vec<&str> = set
            .candidates("xi,yan")
            .iter()
            .map(|e| e.word.as_str())
            .collect();
        assert_eq!(words, vec!["细研", "戏研", "细言"]);
    }

    #[test]
    fn test_insert_replaces_frequency() {
        let mut set = ConfusionSet::new();
        set.insert("k", "甲", 1);
        set.insert("k", "乙", 3);
        set.insert("k", "甲", 5);

        let words: Vec<(&str, u64)> = set
            .candidates("k")
            .iter()
            .map(|e| (e.word.as_str(), e.frequency))
            .collect();
        assert_eq!(words, vec![("甲", 5), ("乙", 3)]);
    }

    #[test]
    fn test_missing_artifact_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let set = ConfusionSet::load(&dir.path().join("token_dict.json")).unwrap();
        assert!(set.is_empty());
    }

    #[test]
    fn test_load_drops_non_positive() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("token_dict.json");
        std::fs::write(&path, r#"{"unigram": {"xi,yan": {"戏言": 4, "细研": 0, "系言": -2}}}"#)
            .unwrap();

        let set = ConfusionSet::load(&path).unwrap();
        assert_eq!(set.word_count(), 1);
        assert_eq!(set.candidates("xi,yan")[0].word, "戏言");
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("token_dict.json");
        let mut set = ConfusionSet::new();
        set.insert("xi,yan", "戏言", 120);
        set.insert("xi,yan", "细研", 8);
        set.pairs.insert(pair_key("深钻", "细研"), 3);

        set.save(&path).unwrap();
        let loaded = ConfusionSet::load(&path).unwrap();

        assert_eq!(loaded.candidates("xi,yan"), set.candidates("xi,yan"));
        assert_eq!(loaded.pair_frequency("深钻", "细研"), 3);
    }
}
