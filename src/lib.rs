//! Homofix - n-gram plausibility scoring and homophone correction for short
//! Chinese sentences.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────┐
//! │  Corpora        │
//! └────────┬────────┘
//!          │  offline
//!          ▼
//! ┌─────────────────┐
//! │  StatsBuilder   │ ← Parallel shard counts, merge, reweight, prune (builder.rs)
//! └────────┬────────┘
//!          │
//!          ▼
//! ┌─────────────────┐
//! │ GramStore +     │ ← Durable artifacts (gram_store.rs, confusion.rs)
//! │ ConfusionSet    │
//! └────────┬────────┘
//!          │  serving, read-only
//!          ▼
//! ┌─────────────────┐
//! │  Scorer         │ ← Back-off smoothed plausibility (scorer.rs)
//! └────────┬────────┘
//!          │
//!          ▼
//! ┌─────────────────┐
//! │  Corrector      │ ← Greedy homophone substitution search (corrector.rs)
//! └─────────────────┘
//! ```
//!
//! Segmentation and pronunciation keys come from the [`text`] module; the
//! same implementations must be used when building and when serving.

pub mod builder;
pub mod config;
pub mod confusion;
pub mod corpus;
pub mod corrector;
pub mod error;
pub mod gram_store;
pub mod scorer;
#[cfg(unix)]
pub mod server;
pub mod text;

pub use builder::{BuildOptions, BuildOutput, StatsBuilder};
pub use config::{Config, ScoringParams};
pub use confusion::ConfusionSet;
pub use corpus::CorpusSource;
pub use corrector::{CorrectionResult, Corrector};
pub use error::{Error, Result};
pub use gram_store::GramStore;
pub use scorer::Scorer;
pub use text::{JiebaTokenizer, PhoneticKey, PinyinKey, Tokenizer};
