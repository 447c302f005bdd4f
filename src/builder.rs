//! Offline statistics building: corpora in, gram store and confusion set out.
//!
//! # Pipeline
//!
//! 1. Each source is read into trimmed lines ([`crate::corpus`]).
//! 2. Lines are split into shards, one per rayon worker, and each shard is
//!    counted independently into a [`ShardCounts`] value.
//! 3. Shard results are summed by a single sequential reducer.
//! 4. Word and pair tallies of secondary sources are rescaled against the
//!    primary source before they are added.
//! 5. Grams of order > 1 seen at most once are pruned, optionally followed
//!    by a cutoff on very short unigrams.
//! 6. Surviving words are bucketed by phonetic key into the confusion set.
//!
//! No line depends on another, so neither shard boundaries nor merge order
//! change the result. A shard that panics contributes nothing and is logged.

use crate::confusion::{pair_key, ConfusionSet};
use crate::corpus::{self, CorpusLine, CorpusSource};
use crate::gram_store::{GramStore, ShortUnigramCutoff};
use crate::text::{PhoneticKey, Tokenizer};
use ahash::AHashMap;
use rayon::prelude::*;
use std::panic::{self, AssertUnwindSafe};

#[derive(Debug, Clone)]
pub struct BuildOptions {
    pub max_order: usize,
    /// Extension of corpus files picked up when a source is a directory.
    pub extension: String,
    /// Tokens shorter than this are left out of word and pair tallies.
    pub min_word_chars: usize,
    pub short_unigram_cutoff: Option<ShortUnigramCutoff>,
}

impl Default for BuildOptions {
    fn default() -> Self {
        Self {
            max_order: 3,
            extension: "txt".to_string(),
            min_word_chars: 2,
            short_unigram_cutoff: None,
        }
    }
}

/// Counts produced from one slice of corpus lines.
#[derive(Debug, Clone, Default)]
pub struct ShardCounts {
    pub grams: GramStore,
    pub words: AHashMap<String, u64>,
    pub pairs: AHashMap<String, u64>,
}

impl ShardCounts {
    /// Sum `other` into `self`.
    pub fn merge(&mut self, other: ShardCounts) {
        self.grams.merge(&other.grams);
        for (word, count) in other.words {
            *self.words.entry(word).or_insert(0) += count;
        }
        for (pair, count) in other.pairs {
            *self.pairs.entry(pair).or_insert(0) += count;
        }
    }

    pub fn word_total(&self) -> u64 {
        self.words.values().sum()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BuildReport {
    pub lines: usize,
    pub failed_shards: usize,
    pub pruned: usize,
}

pub struct BuildOutput {
    pub store: GramStore,
    pub confusion: ConfusionSet,
    pub report: BuildReport,
}

/// Scale applied to a secondary source so that it carries `weight` of the
/// primary's mass regardless of its own size.
pub fn reweight_factor(primary_total: u64, secondary_total: u64, weight: f64) -> f64 {
    (primary_total.max(1) as f64 / secondary_total as f64) * weight
}

/// Add `floor(count * factor)` for every entry of `source` into `target`.
pub fn merge_weighted(
    target: &mut AHashMap<String, u64>,
    source: &AHashMap<String, u64>,
    factor: f64,
) {
    for (key, &count) in source {
        let scaled = (count as f64 * factor).floor() as u64;
        *target.entry(key.clone()).or_insert(0) += scaled;
    }
}

pub struct StatsBuilder<'a> {
    tokenizer: &'a dyn Tokenizer,
    keyer: &'a dyn PhoneticKey,
    options: BuildOptions,
}

impl<'a> StatsBuilder<'a> {
    pub fn new(
        tokenizer: &'a dyn Tokenizer,
        keyer: &'a dyn PhoneticKey,
        options: BuildOptions,
    ) -> Self {
        Self {
            tokenizer,
            keyer,
            options,
        }
    }

    /// Count one shard sequentially.
    pub fn count_shard(&self, lines: &[CorpusLine]) -> ShardCounts {
        let mut counts = ShardCounts::default();

        for line in lines {
            let tokens = self.tokenizer.tokenize(&line.text);

            for i in 0..tokens.len() {
                for order in 1..=self.options.max_order {
                    if i + order > tokens.len() {
                        break;
                    }
                    counts.grams.increment(order, &tokens[i..i + order].concat(), 1);
                }
            }

            if !line.lexicon {
                continue;
            }

            let words: Vec<&String> = tokens
                .iter()
                .filter(|token| token.chars().count() >= self.options.min_word_chars)
                .collect();
            for (j, word) in words.iter().enumerate() {
                *counts.words.entry(word.to_string()).or_insert(0) += 1;
                if j > 0 {
                    *counts.pairs.entry(pair_key(words[j - 1], word)).or_insert(0) += 1;
                }
            }
        }

        counts
    }

    /// Count `lines` across the rayon pool and sum the shard results.
    ///
    /// Returns the merged counts and the number of shards that failed.
    pub fn count_lines(&self, lines: &[CorpusLine]) -> (ShardCounts, usize) {
        if lines.is_empty() {
            return (ShardCounts::default(), 0);
        }

        let shard_size = (lines.len() / rayon::current_num_threads()).max(1);
        let shards: Vec<Option<ShardCounts>> = lines
            .par_chunks(shard_size)
            .map(|shard| {
                panic::catch_unwind(AssertUnwindSafe(|| self.count_shard(shard))).ok()
            })
            .collect();

        let mut merged = ShardCounts::default();
        let mut failed = 0;
        for (index, shard) in shards.into_iter().enumerate() {
            match shard {
                Some(counts) => merged.merge(counts),
                None => {
                    log::warn!("Shard {index} failed; its lines contribute no counts");
                    failed += 1;
                }
            }
        }
        (merged, failed)
    }

    /// Run the full pipeline over `sources`; the first one is primary.
    pub fn build(&self, sources: &[CorpusSource]) -> BuildOutput {
        let corpora: Vec<(f64, Vec<CorpusLine>)> = sources
            .iter()
            .map(|source| {
                (
                    source.weight,
                    corpus::read_source(source, &self.options.extension),
                )
            })
            .collect();
        self.build_from_lines(&corpora)
    }

    /// Pipeline over already-loaded corpora given as `(weight, lines)`.
    pub fn build_from_lines(&self, corpora: &[(f64, Vec<CorpusLine>)]) -> BuildOutput {
        let mut store = GramStore::new();
        let mut words: AHashMap<String, u64> = AHashMap::new();
        let mut pairs: AHashMap<String, u64> = AHashMap::new();
        let mut report = BuildReport::default();
        let mut primary_total = 0u64;

        for (index, (weight, lines)) in corpora.iter().enumerate() {
            let (counts, failed) = self.count_lines(lines);
            report.lines += lines.len();
            report.failed_shards += failed;

            store.merge(&counts.grams);

            let source_total = counts.word_total();
            if index == 0 {
                primary_total = source_total;
                merge_weighted(&mut words, &counts.words, 1.0);
                merge_weighted(&mut pairs, &counts.pairs, 1.0);
                continue;
            }

            if source_total == 0 {
                log::warn!("Corpus {index} has no lexicon words; skipping its tallies");
                continue;
            }
            let factor = reweight_factor(primary_total, source_total, *weight);
            log::info!("Corpus {index}: {source_total} words, reweight factor {factor:.4}");
            merge_weighted(&mut words, &counts.words, factor);
            merge_weighted(&mut pairs, &counts.pairs, factor);
        }

        report.pruned = store.prune_hapax();
        if let Some(cutoff) = self.options.short_unigram_cutoff {
            report.pruned += store.prune_short_unigrams(cutoff);
        }

        // Only words still present as unigrams remain candidates.
        words.retain(|word, _| store.get(1, word) > 0);
        let confusion = ConfusionSet::from_tallies(&words, &pairs, self.keyer);

        log::info!(
            "Built gram store: {} grams ({} pruned), vocab {}; confusion set: {} keys",
            store.len(),
            report.pruned,
            store.vocab_size(),
            confusion.len()
        );

        BuildOutput {
            store,
            confusion,
            report,
        }
    }
}
