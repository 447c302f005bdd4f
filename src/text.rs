//! Text collaborators: script filtering, word segmentation, and phonetic keys.
//!
//! The builder, scorer, and corrector all go through the [`Tokenizer`] and
//! [`PhoneticKey`] traits, so the same segmenter and the same key function
//! are used at build time and at correction time. A mismatch between the two
//! does not fail loudly; candidate lookups simply miss.

use jieba_rs::Jieba;
use pinyin::ToPinyin;

/// Whether `ch` belongs to the scored script (CJK unified ideographs,
/// U+4E00..=U+9FA5).
pub fn is_script_char(ch: char) -> bool {
    ('\u{4e00}'..='\u{9fa5}').contains(&ch)
}

/// Keep only script characters, dropping punctuation, digits, and latin text.
pub fn clean_text(text: &str) -> String {
    text.chars().filter(|&ch| is_script_char(ch)).collect()
}

/// Splits cleaned text into an ordered token sequence.
pub trait Tokenizer: Send + Sync {
    fn tokenize(&self, text: &str) -> Vec<String>;
}

/// Maps a span of text to a canonical pronunciation key.
pub trait PhoneticKey: Send + Sync {
    fn key(&self, text: &str) -> String;
}

/// Dictionary-based segmenter backed by jieba's bundled dictionary.
pub struct JiebaTokenizer {
    jieba: Jieba,
}

impl JiebaTokenizer {
    pub fn new() -> Self {
        Self { jieba: Jieba::new() }
    }
}

impl Default for JiebaTokenizer {
    fn default() -> Self {
        Self::new()
    }
}

impl Tokenizer for JiebaTokenizer {
    fn tokenize(&self, text: &str) -> Vec<String> {
        self.jieba
            .cut(text, true)
            .into_iter()
            .map(str::to_string)
            .collect()
    }
}

/// One token per character. Useful for character-level stores.
#[derive(Debug, Default, Clone, Copy)]
pub struct CharTokenizer;

impl Tokenizer for CharTokenizer {
    fn tokenize(&self, text: &str) -> Vec<String> {
        text.chars().map(String::from).collect()
    }
}

/// Tone-marked pinyin syllables joined with `,` (e.g. `中国` -> `zhōng,guó`).
///
/// Characters without a reading are kept verbatim, with consecutive ones
/// grouped into a single segment.
#[derive(Debug, Default, Clone, Copy)]
pub struct PinyinKey;

impl PhoneticKey for PinyinKey {
    fn key(&self, text: &str) -> String {
        let mut segments: Vec<String> = Vec::new();
        let mut pending = String::new();

        for ch in text.chars() {
            match ch.to_pinyin() {
                Some(reading) => {
                    if !pending.is_empty() {
                        segments.push(std::mem::take(&mut pending));
                    }
                    segments.push(reading.with_tone().to_string());
                }
                None => pending.push(ch),
            }
        }
        if !pending.is_empty() {
            segments.push(pending);
        }

        segments.join(",")
    }
}
