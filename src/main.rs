//! Homofix command line.
//!
//! # Commands
//!
//! - `build`: count corpora into the gram store and confusion set artifacts
//! - `score`: print plausibility scores for sentences
//! - `correct`: run the homophone corrector on sentences
//! - `inspect`: show phonetic keys, lexicon frequencies, and pair counts
//! - `serve`: answer correction requests on a local Unix socket
//!
//! Artifact paths and scoring constants come from the confy-managed config
//! file; flags override them for a single run.

use clap::{ArgAction, Args, Parser, Subcommand};
use env_logger::Env;
use homofix::builder::{BuildOptions, StatsBuilder};
use homofix::gram_store::ShortUnigramCutoff;
use homofix::{
    Config, ConfusionSet, CorpusSource, Corrector, GramStore, JiebaTokenizer, PhoneticKey,
    PinyinKey, Scorer, Tokenizer,
};
use log::LevelFilter;
use rayon::ThreadPoolBuilder;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "homofix")]
#[command(about = "Homophone-aware sentence scoring and correction")]
#[command(version)]
struct Cli {
    /// Increase verbosity (-v, -vv)
    #[arg(short = 'v', long, global = true, action = ArgAction::Count)]
    verbose: u8,

    /// Decrease verbosity (-q, -qq)
    #[arg(short = 'q', long, global = true, action = ArgAction::Count)]
    quiet: u8,

    /// Gram store artifact path
    #[arg(long, global = true, value_name = "PATH")]
    gram_store: Option<PathBuf>,

    /// Confusion set artifact path
    #[arg(long, global = true, value_name = "PATH")]
    confusion: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Build the gram store and confusion set from corpora
    Build(BuildArgs),
    /// Score sentences
    Score(ScoreArgs),
    /// Correct sentences
    Correct(CorrectArgs),
    /// Show lexicon details for words and a sentence
    Inspect(InspectArgs),
    /// Serve corrections over a Unix socket
    #[cfg(unix)]
    Serve(ServeArgs),
}

#[derive(Args, Debug)]
struct BuildArgs {
    /// Corpus as PATH[:WEIGHT[:MIN_LINE_CHARS]]; the first one is primary
    #[arg(short, long = "source", required = true, value_parser = parse_source)]
    sources: Vec<CorpusSource>,

    /// Highest n-gram order to count
    #[arg(long, value_name = "N")]
    order: Option<usize>,

    /// Corpus file extension when walking directories
    #[arg(long, default_value = "txt")]
    extension: String,

    /// Limit rayon worker threads
    #[arg(long, value_name = "N")]
    threads: Option<usize>,

    /// Apply the short-unigram cutoff to unigrams shorter than this
    #[arg(long, value_name = "CHARS", requires = "short_keep_ratio")]
    short_max_chars: Option<usize>,

    /// Fraction of short unigrams to keep, by frequency
    #[arg(long, value_name = "RATIO", requires = "short_max_chars")]
    short_keep_ratio: Option<f64>,
}

#[derive(Args, Debug)]
struct ScoreArgs {
    #[arg(required = true)]
    sentences: Vec<String>,

    /// Score with grams up to this order
    #[arg(long, value_name = "N")]
    order: Option<usize>,
}

#[derive(Args, Debug)]
struct CorrectArgs {
    #[arg(required = true)]
    sentences: Vec<String>,

    /// Scores at or above this are left alone
    #[arg(long)]
    threshold: Option<f64>,

    /// Maximum substitution passes
    #[arg(long)]
    passes: Option<usize>,
}

#[derive(Args, Debug)]
struct InspectArgs {
    /// Words to look up in the confusion set
    #[arg(short, long = "word")]
    words: Vec<String>,

    /// Sentence whose token pairs and score terms are shown
    #[arg(short, long)]
    sentence: Option<String>,
}

#[cfg(unix)]
#[derive(Args, Debug)]
struct ServeArgs {
    /// Socket path
    #[arg(long, value_name = "PATH")]
    socket: Option<PathBuf>,
}

fn parse_source(arg: &str) -> Result<CorpusSource, String> {
    arg.parse().map_err(|err: homofix::Error| err.to_string())
}

/// Level forced by `-v`/`-q`; `None` leaves `RUST_LOG` (default `info`) in charge.
fn verbosity_level(verbose: u8, quiet: u8) -> Option<LevelFilter> {
    match (verbose, quiet) {
        (0, 0) => None,
        (_, 1) => Some(LevelFilter::Warn),
        (_, q) if q > 1 => Some(LevelFilter::Error),
        (1, _) => Some(LevelFilter::Debug),
        _ => Some(LevelFilter::Trace),
    }
}

fn init_logging(verbose: u8, quiet: u8) {
    let mut builder = env_logger::Builder::from_env(Env::default().default_filter_or("info"));
    builder.format_timestamp_millis();
    if let Some(level) = verbosity_level(verbose, quiet) {
        builder.filter_level(level);
    }
    let _ = builder.try_init();
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    init_logging(cli.verbose, cli.quiet);

    let mut config = Config::load()?;

    // Persist defaults so users get a concrete config file on first run.
    if let Err(err) = config.save() {
        log::warn!("Failed to persist config defaults: {err}");
    }

    if let Some(path) = cli.gram_store {
        config.gram_store_path = path;
    }
    if let Some(path) = cli.confusion {
        config.confusion_path = path;
    }

    match cli.command {
        Commands::Build(args) => run_build(&config, args),
        Commands::Score(args) => run_score(&config, args),
        Commands::Correct(args) => run_correct(&config, args),
        Commands::Inspect(args) => run_inspect(&config, args),
        #[cfg(unix)]
        Commands::Serve(args) => run_serve(&config, args),
    }
}

fn run_build(config: &Config, args: BuildArgs) -> Result<(), Box<dyn std::error::Error>> {
    if let Some(threads) = args.threads {
        ThreadPoolBuilder::new()
            .num_threads(threads)
            .build_global()?;
    }

    let short_unigram_cutoff = match (args.short_max_chars, args.short_keep_ratio) {
        (Some(max_chars), Some(keep_ratio)) => Some(ShortUnigramCutoff {
            max_chars,
            keep_ratio,
        }),
        _ => None,
    };
    let options = BuildOptions {
        max_order: args.order.unwrap_or(config.max_order),
        extension: args.extension,
        short_unigram_cutoff,
        ..BuildOptions::default()
    };

    let tokenizer = JiebaTokenizer::new();
    let keyer = PinyinKey;
    let output = StatsBuilder::new(&tokenizer, &keyer, options).build(&args.sources);

    if output.report.failed_shards > 0 {
        log::warn!(
            "{} shard(s) failed and were left out",
            output.report.failed_shards
        );
    }

    output.store.save(&config.gram_store_path)?;
    output.confusion.save(&config.confusion_path)?;
    Ok(())
}

fn load_scorer(config: &Config) -> homofix::Result<Scorer> {
    let store = GramStore::load(&config.gram_store_path)?;
    Ok(Scorer::new(
        store,
        Box::new(JiebaTokenizer::new()),
        config.scoring.clone(),
        config.max_order,
    ))
}

fn load_corrector(config: &Config) -> homofix::Result<Corrector> {
    let scorer = load_scorer(config)?;
    let confusion = ConfusionSet::load(&config.confusion_path)?;
    Ok(Corrector::new_with_config(
        scorer,
        confusion,
        Box::new(PinyinKey),
        config,
    ))
}

fn run_score(config: &Config, args: ScoreArgs) -> Result<(), Box<dyn std::error::Error>> {
    let scorer = load_scorer(config)?;
    let order = args.order.unwrap_or(config.max_order);

    for sentence in &args.sentences {
        println!("{:>9.2} | {}", scorer.score_with_order(sentence, order), sentence);
    }
    Ok(())
}

fn run_correct(config: &Config, args: CorrectArgs) -> Result<(), Box<dyn std::error::Error>> {
    let corrector = load_corrector(config)?;
    let threshold = args.threshold.unwrap_or(config.threshold);
    let passes = args.passes.unwrap_or(config.max_passes);

    for sentence in &args.sentences {
        let result = corrector.correct(sentence, threshold, passes);
        let status = if result.changed { "corrected" } else { "unchanged" };
        println!(
            "{} | {} | {:.2} | {}",
            sentence, result.sentence, result.score, status
        );
    }
    Ok(())
}

fn run_inspect(config: &Config, args: InspectArgs) -> Result<(), Box<dyn std::error::Error>> {
    let confusion = ConfusionSet::load(&config.confusion_path)?;
    let keyer = PinyinKey;

    for word in &args.words {
        println!(
            "{} | {} | {}",
            word,
            keyer.key(word),
            confusion.word_frequency(&keyer, word)
        );
    }

    let Some(sentence) = args.sentence else {
        return Ok(());
    };

    let tokenizer = JiebaTokenizer::new();
    let tokens = tokenizer.tokenize(&homofix::text::clean_text(&sentence));
    println!("tokens: {}", tokens.join(" / "));
    for pair in tokens.windows(2) {
        let count = confusion.pair_frequency(&pair[0], &pair[1]);
        println!("{}\t{} | {}", pair[0], pair[1], count);
    }

    if config.gram_store_path.exists() {
        let scorer = load_scorer(config)?;
        if let Some(breakdown) = scorer.breakdown(&sentence, config.max_order) {
            println!(
                "avg log10 p {:.4} | match ratio {:.3} | length bonus {:.2} | score {:.2}",
                breakdown.avg_log_prob,
                breakdown.match_ratio,
                breakdown.length_bonus,
                breakdown.score
            );
        }
    }
    Ok(())
}

#[cfg(unix)]
fn run_serve(config: &Config, args: ServeArgs) -> Result<(), Box<dyn std::error::Error>> {
    let corrector = std::sync::Arc::new(load_corrector(config)?);
    let socket_path = args.socket.unwrap_or_else(|| config.socket_path.clone());

    let server = homofix::server::Server::bind(&socket_path, corrector, config.max_request_bytes)?;
    server.serve()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_verbosity_flags() {
        assert_eq!(verbosity_level(0, 0), None);
        assert_eq!(verbosity_level(1, 0), Some(LevelFilter::Debug));
        assert_eq!(verbosity_level(3, 0), Some(LevelFilter::Trace));
        assert_eq!(verbosity_level(0, 1), Some(LevelFilter::Warn));
        assert_eq!(verbosity_level(2, 2), Some(LevelFilter::Error));
    }

    #[test]
    fn test_source_argument() {
        let source = parse_source("corpus/novels:0.1").unwrap();
        assert_eq!(source.weight, 0.1);
        assert!(parse_source("corpus:x").is_err());
    }
}
