//! Corpus sources and line ingestion for the statistics builder.
//!
//! A source is a file or a directory tree of cleaned, one-sentence-per-line
//! text files. Files that cannot be opened or are not UTF-8 are skipped with
//! a warning; a bad file never aborts a build.

use crate::error::{Error, Result};
use ahash::AHashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use walkdir::WalkDir;

/// One corpus and its trust coefficient.
///
/// The first source of a build is the primary corpus and its weight is not
/// used; later sources are rescaled against it.
#[derive(Debug, Clone, PartialEq)]
pub struct CorpusSource {
    pub path: PathBuf,
    pub weight: f64,
    /// Shorter lines still feed the gram store but not the lexicon tallies.
    pub min_line_chars: usize,
}

impl CorpusSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            weight: 1.0,
            min_line_chars: 4,
        }
    }

    pub fn with_weight(mut self, weight: f64) -> Self {
        self.weight = weight;
        self
    }

    pub fn with_min_line_chars(mut self, min_line_chars: usize) -> Self {
        self.min_line_chars = min_line_chars;
        self
    }
}

impl FromStr for CorpusSource {
    type Err = Error;

    /// Parse `PATH[:WEIGHT[:MIN_LINE_CHARS]]`.
    fn from_str(input: &str) -> Result<Self> {
        let parts: Vec<&str> = input.split(':').collect();
        let invalid = || Error::InvalidSource(input.to_string());

        let source = match parts.as_slice() {
            [] | [""] => return Err(invalid()),
            [path] => CorpusSource::new(*path),
            [path, weight] => {
                CorpusSource::new(*path).with_weight(weight.parse().map_err(|_| invalid())?)
            }
            [path, weight, min_chars] => CorpusSource::new(*path)
                .with_weight(weight.parse().map_err(|_| invalid())?)
                .with_min_line_chars(min_chars.parse().map_err(|_| invalid())?),
            _ => return Err(invalid()),
        };

        if source.path.as_os_str().is_empty() || source.weight < 0.0 {
            return Err(invalid());
        }
        Ok(source)
    }
}

/// A trimmed corpus line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CorpusLine {
    pub text: String,
    /// Whether the line contributes to word and pair tallies.
    pub lexicon: bool,
}

/// Files under `path` with the given extension, in a stable order.
///
/// A plain file is returned as-is regardless of its extension.
pub fn collect_files(path: &Path, extension: &str) -> Vec<PathBuf> {
    if path.is_file() {
        return vec![path.to_path_buf()];
    }

    let mut files: Vec<PathBuf> = WalkDir::new(path)
        .into_iter()
        .filter_map(|entry| match entry {
            Ok(entry) => Some(entry),
            Err(err) => {
                log::warn!("Skipping unreadable corpus entry: {err}");
                None
            }
        })
        .filter(|entry| entry.file_type().is_file())
        .map(|entry| entry.into_path())
        .filter(|file| file.extension().is_some_and(|ext| ext == extension))
        .collect();
    files.sort();
    files
}

/// Read every line of a source.
///
/// Lexicon lines are those with at least `min_line_chars` characters, counted
/// once per distinct text within the source.
pub fn read_source(source: &CorpusSource, extension: &str) -> Vec<CorpusLine> {
    let mut lines = Vec::new();
    let mut seen: AHashSet<String> = AHashSet::new();

    for file in collect_files(&source.path, extension) {
        let content = match fs::read_to_string(&file) {
            Ok(content) => content,
            Err(err) => {
                log::warn!("Skipping corpus file {}: {err}", file.display());
                continue;
            }
        };

        for raw in content.lines() {
            let text = raw.trim();
            if text.is_empty() {
                continue;
            }

            let lexicon =
                text.chars().count() >= source.min_line_chars && seen.insert(text.to_string());
            lines.push(CorpusLine {
                text: text.to_string(),
                lexicon,
            });
        }
    }

    log::info!(
        "Read {} lines ({} lexicon) from {}",
        lines.len(),
        seen.len(),
        source.path.display()
    );
    lines
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_source_argument() {
        let source: CorpusSource = "corpus/novels:0.1:4".parse().unwrap();
        assert_eq!(source.path, PathBuf::from("corpus/novels"));
        assert_eq!(source.weight, 0.1);
        assert_eq!(source.min_line_chars, 4);

        let plain: CorpusSource = "metadata.txt".parse().unwrap();
        assert_eq!(plain.weight, 1.0);
        assert_eq!(plain.min_line_chars, 4);

        assert!("x:abc".parse::<CorpusSource>().is_err());
        assert!("x:1:2:3".parse::<CorpusSource>().is_err());
        assert!("".parse::<CorpusSource>().is_err());
        assert!("x:-1".parse::<CorpusSource>().is_err());
    }

    #[test]
    fn test_read_source_dedups_lexicon_lines() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("a.txt");
        fs::write(&file, "今天天气很好\n\n  今天天气很好  \n你好\n").unwrap();

        let lines = read_source(&CorpusSource::new(&file), "txt");

        assert_eq!(lines.len(), 3);
        assert!(lines[0].lexicon);
        assert!(!lines[1].lexicon);
        assert_eq!(lines[1].text, "今天天气很好");
        assert!(!lines[2].lexicon);
    }

    #[test]
    fn test_directory_walk_skips_bad_files() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("nested")).unwrap();
        fs::write(dir.path().join("nested").join("b.txt"), "第二行文本\n").unwrap();
        fs::write(dir.path().join("a.txt"), "第一行文本\n").unwrap();
        fs::write(dir.path().join("notes.md"), "不读取这个\n").unwrap();
        fs::write(dir.path().join("broken.txt"), [0xff, 0xfe, 0x00, 0x41]).unwrap();

        let files = collect_files(dir.path(), "txt");
        assert_eq!(files.len(), 3);

        let lines = read_source(&CorpusSource::new(dir.path()), "txt");
        let texts: Vec<&str> = lines.iter().map(|l| l.text.as_str()).collect();
        assert_eq!(texts, vec!["第一行文本", "第二行文本"]);
    }

    #[test]
    fn test_missing_source_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let lines = read_source(&CorpusSource::new(dir.path().join("absent")), "txt");
        assert!(lines.is_empty());
    }
}
