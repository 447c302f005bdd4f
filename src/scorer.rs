//! Sentence plausibility scoring with back-off smoothing.
//!
//! # Formula
//!
//! For each token position `i` the scorer tries orders from
//! `min(i + 1, N)` down to 1 and uses the first gram with a positive count:
//!
//! - order 1: `(count + α) / (total_unigrams + α·V)`
//! - order k > 1: `(count + α) / (count(prefix) + α·V)`
//!
//! A match found below the highest order available at that position is
//! discounted by `backoff_base^(available - order)`. A token unseen at every
//! order gets `α / (total_unigrams + α·V) · oov_base^N`.
//!
//! The per-token `log10` probabilities are averaged and combined with lexical
//! coverage and a length bonus:
//!
//! ```text
//! score = (avg_log_prob + shift) · scale · match_ratio² + log10(len) · length_bonus_scale
//! ```
//!
//! `match_ratio` is the share of cleaned characters covered by tokens with a
//! positive unigram count; squaring it punishes sentences full of unknown
//! words even when their raw log-probability is passable.

use crate::config::ScoringParams;
use crate::gram_store::GramStore;
use crate::text::{clean_text, Tokenizer};

/// Intermediate values of one scoring run.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoreBreakdown {
    pub tokens: Vec<String>,
    pub avg_log_prob: f64,
    pub match_ratio: f64,
    pub length_bonus: f64,
    pub score: f64,
}

pub struct Scorer {
    store: GramStore,
    tokenizer: Box<dyn Tokenizer>,
    params: ScoringParams,
    order: usize,
}

impl Scorer {
    pub fn new(
        store: GramStore,
        tokenizer: Box<dyn Tokenizer>,
        params: ScoringParams,
        order: usize,
    ) -> Self {
        Self {
            store,
            tokenizer,
            params,
            order: order.max(1),
        }
    }

    pub fn store(&self) -> &GramStore {
        &self.store
    }

    pub fn tokenizer(&self) -> &dyn Tokenizer {
        self.tokenizer.as_ref()
    }

    pub fn params(&self) -> &ScoringParams {
        &self.params
    }

    pub fn order(&self) -> usize {
        self.order
    }

    /// Score `sentence` at the configured order.
    pub fn score(&self, sentence: &str) -> f64 {
        self.score_with_order(sentence, self.order)
    }

    /// Score `sentence` using grams up to `order`.
    pub fn score_with_order(&self, sentence: &str, order: usize) -> f64 {
        match self.breakdown(sentence, order) {
            Some(breakdown) => breakdown.score,
            None => self.params.unscorable,
        }
    }

    /// Full scoring detail, or `None` when nothing in `sentence` is scorable.
    pub fn breakdown(&self, sentence: &str, order: usize) -> Option<ScoreBreakdown> {
        let line = clean_text(sentence);
        if line.is_empty() {
            return None;
        }

        let tokens = self.tokenizer.tokenize(&line);
        if tokens.is_empty() {
            return None;
        }

        let order = order.max(1);
        let alpha = self.params.alpha;
        let unigram_denominator =
            self.store.total_unigram_count() as f64 + alpha * self.store.vocab_size() as f64;
        let vocab_mass = alpha * self.store.vocab_size() as f64;

        let mut total_log_prob = 0.0;
        let mut match_chars = 0usize;

        for i in 0..tokens.len() {
            let available = (i + 1).min(order);
            let mut prob = None;

            for k in (1..=available).rev() {
                let gram = tokens[i + 1 - k..=i].concat();
                let count = self.store.get(k, &gram);
                if count == 0 {
                    continue;
                }

                let mut p = if k == 1 {
                    (count as f64 + alpha) / unigram_denominator
                } else {
                    let prefix = tokens[i + 1 - k..i].concat();
                    let prev_count = self.store.get(k - 1, &prefix);
                    (count as f64 + alpha) / (prev_count as f64 + vocab_mass)
                };
                if k < available {
                    p *= self.params.backoff_base.powi((available - k) as i32);
                }
                prob = Some(p);
                break;
            }

            let prob = prob.unwrap_or_else(|| {
                alpha / unigram_denominator * self.params.oov_base.powi(order as i32)
            });
            total_log_prob += prob.log10();

            if self.store.get(1, &tokens[i]) > 0 {
                match_chars += tokens[i].chars().count();
            }
        }

        let line_chars = line.chars().count() as f64;
        let avg_log_prob = total_log_prob / tokens.len() as f64;
        let match_ratio = match_chars as f64 / line_chars;
        let length_bonus = line_chars.log10() * self.params.length_bonus_scale;
        let score = (avg_log_prob + self.params.shift) * self.params.scale * match_ratio.powi(2)
            + length_bonus;

        Some(ScoreBreakdown {
            tokens,
            avg_log_prob,
            match_ratio,
            length_bonus,
            score,
        })
    }
}
