//! dcr CLI: causal rule discovery over a knowledge graph.

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand, ValueEnum};
use miette::{IntoDiagnostic, Result, WrapErr};
use serde::Deserialize;
use serde::de::DeserializeOwned;

use dcr_discovery::config::DiscoveryConfig;
use dcr_discovery::discovery::Discovery;
use dcr_discovery::graph::Entity;
use dcr_discovery::pairs::{MatchedPair, PairingMode};

#[derive(Parser)]
#[command(name = "dcr", version, about = "Embedding-guided causal rule discovery")]
struct Cli {
    /// Triples JSON file.
    #[arg(long, global = true, default_value = "triples.json")]
    triples: PathBuf,

    /// Embeddings JSON file.
    #[arg(long, global = true, default_value = "embeddings.json")]
    embeddings: PathBuf,

    /// Run configuration (TOML).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Structural similarity between two entities.
    Similarity {
        first: String,
        second: String,
    },

    /// Calibrate the distance threshold on a set of instances.
    Calibrate {
        /// JSON array of instance identifiers.
        #[arg(long)]
        instances: PathBuf,

        /// Similarity level the threshold corresponds to.
        #[arg(long)]
        target: Option<f64>,

        /// Polynomial degree of the fitted curve.
        #[arg(long)]
        degree: Option<usize>,

        /// Sampling seed.
        #[arg(long)]
        seed: Option<u64>,
    },

    /// Mine matched pairs between treatment groups.
    Pairs {
        /// JSON array of t0 instances.
        #[arg(long)]
        t0: PathBuf,

        /// JSON array of t1 instances.
        #[arg(long)]
        t1: PathBuf,

        #[arg(long, value_enum)]
        mode: Option<ModeArg>,

        /// Distance threshold; calibrated when neither bound is given.
        #[arg(long, conflicts_with = "proportion")]
        threshold: Option<f64>,

        /// Fraction of all possible pairs to extract.
        #[arg(long)]
        proportion: Option<f64>,

        /// Write the pairs here instead of stdout.
        #[arg(long)]
        output: Option<PathBuf>,
    },

    /// Effect of the configured treatment on the configured outcome.
    Effect {
        /// Pairs JSON, as written by `dcr pairs`.
        #[arg(long)]
        pairs: PathBuf,

        /// Normal quantile of the confidence interval.
        #[arg(long)]
        z: Option<f64>,
    },

    /// Show triple store and configuration statistics.
    Info,
}

#[derive(Clone, Copy, ValueEnum)]
enum ModeArg {
    Free,
    CrossGroup,
}

impl From<ModeArg> for PairingMode {
    fn from(m: ModeArg) -> Self {
        match m {
            ModeArg::Free => PairingMode::Free,
            ModeArg::CrossGroup => PairingMode::CrossGroup,
        }
    }
}

/// Either a full `dcr pairs` result or a bare list of pairs.
#[derive(Deserialize)]
#[serde(untagged)]
enum PairsFile {
    Run { pairs: Vec<MatchedPair> },
    List(Vec<MatchedPair>),
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let content = std::fs::read_to_string(path)
        .into_diagnostic()
        .wrap_err_with(|| format!("failed to read {}", path.display()))?;
    serde_json::from_str(&content)
        .into_diagnostic()
        .wrap_err_with(|| format!("failed to parse {}", path.display()))
}

fn read_instances(path: &Path) -> Result<Vec<Entity>> {
    read_json(path)
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value).into_diagnostic()?);
    Ok(())
}

fn main() -> Result<()> {
    miette::set_hook(Box::new(|_| {
        Box::new(
            miette::MietteHandlerOpts::new()
                .terminal_links(true)
                .unicode(true)
                .context_lines(3)
                .build(),
        )
    }))
    .ok(); // Ignore error if hook already set (e.g., in tests)

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => DiscoveryConfig::from_file(path)?,
        None => DiscoveryConfig::default(),
    };

    // Command-line flags override the configuration file.
    match &cli.command {
        Commands::Calibrate {
            target,
            degree,
            seed,
            ..
        } => {
            if let Some(t) = target {
                config.calibration.target_similarity = *t;
            }
            if let Some(d) = degree {
                config.calibration.degree = *d;
            }
            if seed.is_some() {
                config.calibration.seed = *seed;
            }
        }
        Commands::Pairs {
            mode,
            threshold,
            proportion,
            ..
        } => {
            if let Some(m) = mode {
                config.pairing.mode = (*m).into();
            }
            if threshold.is_some() || proportion.is_some() {
                config.pairing.threshold = *threshold;
                config.pairing.proportion = *proportion;
            }
        }
        Commands::Effect { z: Some(z), .. } => config.metric.z = *z,
        _ => {}
    }

    let run = Discovery::open(config, &cli.triples, &cli.embeddings)?;

    match cli.command {
        Commands::Similarity { first, second } => {
            let score = run.similarity(&Entity::new(first.as_str()), &Entity::new(second.as_str()))?;
            println!("similarity({first}, {second}) = {score:.4}");
        }

        Commands::Calibrate { instances, .. } => {
            let instances = read_instances(&instances)?;
            let calibration = run.calibrate(&instances)?;
            print_json(&calibration)?;
        }

        Commands::Pairs { t0, t1, output, .. } => {
            let t0 = read_instances(&t0)?;
            let t1 = read_instances(&t1)?;
            let mined = run.pairs(&t0, &t1)?;
            match output {
                Some(path) => {
                    let json = serde_json::to_string_pretty(&mined).into_diagnostic()?;
                    std::fs::write(&path, json)
                        .into_diagnostic()
                        .wrap_err_with(|| format!("failed to write {}", path.display()))?;
                    println!("Wrote {} pairs to {}", mined.pairs.len(), path.display());
                }
                None => print_json(&mined)?,
            }
        }

        Commands::Effect { pairs, .. } => {
            let pairs = match read_json::<PairsFile>(&pairs)? {
                PairsFile::Run { pairs } | PairsFile::List(pairs) => pairs,
            };
            let estimate = run.configured_effect(&pairs)?;
            println!("{estimate}");
            print_json(&estimate)?;
        }

        Commands::Info => {
            println!("{}", run.info());
        }
    }

    Ok(())
}
