//! Greedy homophone correction driven by the scorer.
//!
//! A pass looks at every script character and every window of up to
//! `max_window` characters starting there, swaps the span for each word
//! sharing its phonetic key, and keeps the single best-scoring rewrite. All
//! rewrites in a pass are measured against the pass's input, never against
//! each other. Passes repeat on the previous output until one fails to
//! improve, the threshold is reached, or `max_passes` runs out.

use crate::config::Config;
use crate::confusion::ConfusionSet;
use crate::scorer::Scorer;
use crate::text::{is_script_char, PhoneticKey};

/// Outcome of one top-level correction.
#[derive(Debug, Clone, PartialEq)]
pub struct CorrectionResult {
    pub sentence: String,
    pub score: f64,
    pub changed: bool,
}

/// Outcome of a single scan over a sentence.
#[derive(Debug, Clone, PartialEq)]
pub struct PassOutcome {
    pub sentence: String,
    pub score: f64,
    pub improved: bool,
}

pub struct Corrector {
    scorer: Scorer,
    confusion: ConfusionSet,
    keyer: Box<dyn PhoneticKey>,
    max_window: usize,
    threshold: f64,
    max_passes: usize,
}

impl Corrector {
    pub fn new(scorer: Scorer, confusion: ConfusionSet, keyer: Box<dyn PhoneticKey>) -> Self {
        Self::new_with_settings(scorer, confusion, keyer, 3, 193.0, 3)
    }

    pub fn new_with_config(
        scorer: Scorer,
        confusion: ConfusionSet,
        keyer: Box<dyn PhoneticKey>,
        config: &Config,
    ) -> Self {
        Self::new_with_settings(
            scorer,
            confusion,
            keyer,
            config.max_window,
            config.threshold,
            config.max_passes,
        )
    }

    fn new_with_settings(
        scorer: Scorer,
        confusion: ConfusionSet,
        keyer: Box<dyn PhoneticKey>,
        max_window: usize,
        threshold: f64,
        max_passes: usize,
    ) -> Self {
        Self {
            scorer,
            confusion,
            keyer,
            max_window: max_window.max(1),
            threshold,
            max_passes,
        }
    }

    pub fn scorer(&self) -> &Scorer {
        &self.scorer
    }

    pub fn confusion(&self) -> &ConfusionSet {
        &self.confusion
    }

    pub fn keyer(&self) -> &dyn PhoneticKey {
        self.keyer.as_ref()
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    pub fn max_passes(&self) -> usize {
        self.max_passes
    }

    /// Correct with the configured threshold and pass limit.
    pub fn autocorrect(&self, sentence: &str) -> CorrectionResult {
        self.correct(sentence, self.threshold, self.max_passes)
    }

    /// Rewrite `sentence` until it scores at least `threshold`, a pass stops
    /// improving, or `max_passes` passes have run.
    ///
    /// The returned score is never below the input's score.
    pub fn correct(&self, sentence: &str, threshold: f64, max_passes: usize) -> CorrectionResult {
        let initial_score = self.scorer.score(sentence);
        if initial_score >= threshold {
            return CorrectionResult {
                sentence: sentence.to_string(),
                score: initial_score,
                changed: false,
            };
        }

        let mut current = sentence.to_string();
        let mut best_score = initial_score;
        let mut changed = false;

        for pass in 0..max_passes {
            let outcome = self.scan(&current, best_score);
            if !outcome.improved {
                break;
            }

            log::debug!(
                "Pass {}: '{}' ({:.2}) -> '{}' ({:.2})",
                pass + 1,
                current,
                best_score,
                outcome.sentence,
                outcome.score
            );
            current = outcome.sentence;
            best_score = outcome.score;
            changed = true;

            if best_score >= threshold {
                break;
            }
        }

        CorrectionResult {
            sentence: current,
            score: best_score,
            changed,
        }
    }

    /// Find the single best-scoring substitution in `sentence`.
    pub fn single_correct(&self, sentence: &str) -> PassOutcome {
        let score = self.scorer.score(sentence);
        self.scan(sentence, score)
    }

    fn scan(&self, sentence: &str, start_score: f64) -> PassOutcome {
        let chars: Vec<char> = sentence.chars().collect();
        let n = chars.len();

        let mut best_sentence: Option<String> = None;
        let mut best_score = start_score;

        for i in 0..n {
            if !is_script_char(chars[i]) {
                continue;
            }

            for window in 1..=self.max_window {
                if i + window > n {
                    break;
                }

                let span: String = chars[i..i + window].iter().collect();
                let key = self.keyer.key(&span);

                for entry in self.confusion.candidates(&key) {
                    if entry.word == span {
                        continue;
                    }

                    let mut candidate = String::with_capacity(sentence.len() + entry.word.len());
                    candidate.extend(&chars[..i]);
                    candidate.push_str(&entry.word);
                    candidate.extend(&chars[i + window..]);

                    let score = self.scorer.score(&candidate);
                    if score > best_score {
                        best_score = score;
                        best_sentence = Some(candidate);
                    }
                }
            }
        }

        match best_sentence {
            Some(sentence) => PassOutcome {
                sentence,
                score: best_score,
                improved: true,
            },
            None => PassOutcome {
                sentence: sentence.to_string(),
                score: start_score,
                improved: false,
            },
        }
    }
}
