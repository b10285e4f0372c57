// crates/topiclda-cli/src/main.rs

#![forbid(unsafe_code)]
#![deny(
    rust_2018_idioms,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::todo
)]

use std::path::PathBuf;
use std::time::Instant;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use topiclda_core::rng::{resolve_seed, seeded_rng};
use topiclda_core::DataSet;
use topiclda_hdp::HdpLdaEngine;
use topiclda_lda::LdaEngine;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(
    name = "topiclda",
    about = "Collapsed Gibbs sampling for LDA and HDP-LDA",
    version = env!("CARGO_PKG_VERSION"),
    disable_help_subcommand = true
)]
struct Cli {
    /// Raise the tracing verbosity (repeatable: -v, -vv). Overridden by RUST_LOG when set.
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    cmd: Cmd,
}

#[derive(Subcommand, Debug)]
enum Cmd {
    /// Fixed-K collapsed Gibbs sampling.
    Lda {
        /// Number of topics.
        #[arg(long, default_value_t = 30)]
        topic: usize,

        /// Document-topic Dirichlet prior mass. Defaults to 0.1, or 50/topic
        /// when topic > 50 and this flag is omitted.
        #[arg(long)]
        alpha: Option<f64>,

        /// Topic-word Dirichlet prior mass.
        #[arg(long, default_value_t = 0.01)]
        beta: f64,

        /// PRNG seed. Falls back to OS entropy when omitted.
        #[arg(long)]
        seed: Option<u64>,

        /// Number of inference sweeps.
        #[arg(long, default_value_t = 10)]
        iteration: u32,

        /// Sweeps to run before asymmetric-α updates begin.
        #[arg(long, default_value_t = 0)]
        burn_in: u32,

        /// Training corpus path.
        #[arg(long)]
        train: PathBuf,

        /// Held-out test corpus path.
        #[arg(long)]
        test: PathBuf,

        /// Optional vocabulary file (surface forms for topic dumps).
        #[arg(long)]
        vocab: Option<PathBuf>,

        /// Resample an asymmetric per-topic α after burn-in.
        #[arg(long, default_value_t = false)]
        asymmetry: bool,
    },

    /// Nonparametric collapsed Gibbs sampling via the Chinese Restaurant Franchise.
    HdpLda {
        /// Bottom-level (per-document) concentration parameter. Defaults to
        /// the prior mean alpha_shape * alpha_scale when omitted.
        #[arg(long)]
        alpha: Option<f64>,

        /// Shape parameter of α's Gamma prior.
        #[arg(long, default_value_t = 1.0)]
        alpha_shape: f64,

        /// Scale parameter of α's Gamma prior.
        #[arg(long, default_value_t = 1.0)]
        alpha_scale: f64,

        /// Topic-word Dirichlet prior mass.
        #[arg(long, default_value_t = 0.5)]
        beta: f64,

        /// Top-level (shared) concentration parameter. Defaults to the prior
        /// mean gamma_shape * gamma_scale when omitted.
        #[arg(long)]
        gamma: Option<f64>,

        /// Shape parameter of γ's Gamma prior.
        #[arg(long, default_value_t = 1.0)]
        gamma_shape: f64,

        /// Scale parameter of γ's Gamma prior.
        #[arg(long, default_value_t = 1.0)]
        gamma_scale: f64,

        /// PRNG seed. Falls back to OS entropy when omitted.
        #[arg(long)]
        seed: Option<u64>,

        /// Number of inference sweeps.
        #[arg(long, default_value_t = 10)]
        iteration: u32,

        /// Training corpus path.
        #[arg(long)]
        train: PathBuf,

        /// Held-out test corpus path.
        #[arg(long)]
        test: PathBuf,

        /// Optional vocabulary file (surface forms for topic dumps).
        #[arg(long)]
        vocab: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.cmd {
        Cmd::Lda {
            topic,
            alpha,
            beta,
            seed,
            iteration,
            burn_in,
            train,
            test,
            vocab,
            asymmetry,
        } => run_lda(
            topic, alpha, beta, seed, iteration, burn_in, train, test, vocab, asymmetry,
        ),

        Cmd::HdpLda {
            alpha,
            alpha_shape,
            alpha_scale,
            beta,
            gamma,
            gamma_shape,
            gamma_scale,
            seed,
            iteration,
            train,
            test,
            vocab,
        } => run_hdp_lda(
            alpha,
            alpha_shape,
            alpha_scale,
            beta,
            gamma,
            gamma_shape,
            gamma_scale,
            seed,
            iteration,
            train,
            test,
            vocab,
        ),
    }
}

/// Initialize tracing with an env-driven filter, raised by repeated `-v`.
fn init_tracing(verbose: u8) {
    use tracing_subscriber::{fmt, EnvFilter};

    let default = match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    let fmt_layer = fmt::layer().with_target(false).with_level(true).compact();

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(fmt_layer)
        .try_init();
}

fn load_corpus(path: &PathBuf, vocab: Option<&PathBuf>) -> Result<DataSet> {
    match vocab {
        Some(v) => DataSet::load_with_vocab(path, v)
            .with_context(|| format!("loading corpus {} with vocabulary {}", path.display(), v.display())),
        None => DataSet::load(path).with_context(|| format!("loading corpus {}", path.display())),
    }
}

#[allow(clippy::too_many_arguments)]
fn run_lda(
    topic: usize,
    alpha: Option<f64>,
    beta: f64,
    seed: Option<u64>,
    iteration: u32,
    burn_in: u32,
    train: PathBuf,
    test: PathBuf,
    vocab: Option<PathBuf>,
    asymmetry: bool,
) -> Result<()> {
    let alpha = alpha.unwrap_or(if topic > 50 { 50.0 / topic as f64 } else { 0.1 });
    let seed = resolve_seed(seed);

    info!(topic, alpha, beta, seed, iteration, asymmetry, "starting LDA");

    let train_set = load_corpus(&train, vocab.as_ref())?;
    let test_set = load_corpus(&test, vocab.as_ref())?;

    let mut engine = LdaEngine::new(topic, alpha, beta, train_set, test_set, asymmetry, seeded_rng(seed));

    let start = Instant::now();
    println!("iter\tperplexity");
    for i in 1..=iteration {
        engine.inference();
        if asymmetry && i >= burn_in {
            engine.update_alpha();
        }
        let perplexity = engine.perplexity();
        println!("{i}\t{perplexity:.3}");
    }
    report_elapsed(start);

    for k in 0..engine.k() {
        dump_topic(k, engine.topic_size(k), engine.top_words(k, 10), engine.train());
    }

    Ok(())
}

#[allow(clippy::too_many_arguments)]
fn run_hdp_lda(
    alpha: Option<f64>,
    alpha_shape: f64,
    alpha_scale: f64,
    beta: f64,
    gamma: Option<f64>,
    gamma_shape: f64,
    gamma_scale: f64,
    seed: Option<u64>,
    iteration: u32,
    train: PathBuf,
    test: PathBuf,
    vocab: Option<PathBuf>,
) -> Result<()> {
    let alpha = alpha.unwrap_or(alpha_shape * alpha_scale);
    let gamma = gamma.unwrap_or(gamma_shape * gamma_scale);
    let seed = resolve_seed(seed);

    info!(alpha, gamma, beta, seed, iteration, "starting HDP-LDA");

    let train_set = load_corpus(&train, vocab.as_ref())?;
    let test_set = load_corpus(&test, vocab.as_ref())?;

    let mut engine = HdpLdaEngine::new(
        train_set,
        test_set,
        alpha,
        alpha_shape,
        alpha_scale,
        beta,
        gamma,
        gamma_shape,
        gamma_scale,
        seeded_rng(seed),
    );

    let start = Instant::now();
    println!("iter\talpha\tgamma\ttopics\tperplexity");
    for i in 1..=iteration {
        engine.inference();
        let perplexity = engine.perplexity();
        println!(
            "{i}\t{:.3}\t{:.3}\t{}\t{perplexity:.3}",
            engine.alpha(),
            engine.gamma(),
            engine.count_topics()
        );
    }
    report_elapsed(start);

    for k in engine.active_topics() {
        dump_topic(k, engine.topic_size(k), engine.top_words(k, 10), engine.train());
    }

    Ok(())
}

fn report_elapsed(start: Instant) {
    let elapsed = start.elapsed();
    let total_ms = elapsed.as_millis();
    let h = total_ms / 3_600_000;
    let m = (total_ms / 60_000) % 60;
    let s = (total_ms / 1000) % 60;
    let ms = total_ms % 1000;
    println!("Elapsed time: {h}h {m}m {s}.{ms}s\n");
}

fn dump_topic(k: usize, size: u32, words: Vec<(usize, f64, u32)>, corpus: &DataSet) {
    println!("Topic: {k} ({size} words)");
    for (word, phi, count) in words {
        println!("{}: {phi:.6} ({count})", corpus.word(word));
    }
    println!();
}
