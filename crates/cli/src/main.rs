//! spdkit CLI - channel selection, clustering and artifact rejection on SPD trial sets

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use ndarray::Array2;
use serde_json::json;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use spdkit_algorithms::clustering::{
    Kmeans, KmeansInit, KmeansParams, KmeansPerClassTransform, Potato, PotatoParams,
};
use spdkit_algorithms::selection::{ElectrodeSelection, ElectrodeSelectionParams};
use spdkit_core::io::{read_dataset, write_dataset, write_json, Dataset};
use spdkit_core::{ClassLabel, Estimator, Metric, MetricSpec, Predictor, Transformer};
use spdkit_parallel::ProcessingMode;

#[derive(Parser)]
#[command(name = "spdkit")]
#[command(author, version, about = "Riemannian tools for sets of SPD matrices", long_about = None)]
struct Cli {
    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Metric flags shared by every estimator command
#[derive(Args)]
struct MetricArgs {
    /// Metric for means and distances (riemann, logeuclid, euclid, logdet,
    /// or "mean=<m>,distance=<m>")
    #[arg(long, default_value = "riemann")]
    metric: MetricSpec,

    /// Override the metric used for means
    #[arg(long)]
    mean_metric: Option<Metric>,

    /// Override the metric used for distances
    #[arg(long)]
    distance_metric: Option<Metric>,
}

impl MetricArgs {
    fn spec(&self) -> MetricSpec {
        match (self.mean_metric, self.distance_metric) {
            (None, None) => self.metric,
            (mean, distance) => MetricSpec::split(
                mean.unwrap_or(self.metric.mean_metric()),
                distance.unwrap_or(self.metric.distance_metric()),
            ),
        }
    }
}

/// Clustering flags shared by `kmeans` and `per-class`
#[derive(Args)]
struct KmeansArgs {
    /// Number of clusters
    #[arg(short = 'k', long, default_value = "2")]
    n_clusters: usize,

    /// Initialization: random or kmeans++
    #[arg(long, default_value = "random")]
    init: String,

    /// Number of restarts with random initialization
    #[arg(long, default_value = "10")]
    n_init: usize,

    /// Maximum iterations per run
    #[arg(long, default_value = "100")]
    max_iter: usize,

    /// Label-stability tolerance
    #[arg(long, default_value = "1e-4")]
    tol: f64,

    /// Random seed (omit for a random one)
    #[arg(long)]
    seed: Option<u64>,

    /// Parallel jobs: 1 sequential, -1 all cores, -k all but k-1
    #[arg(long, default_value = "1", allow_negative_numbers = true)]
    n_jobs: i32,

    #[command(flatten)]
    metric: MetricArgs,
}

impl KmeansArgs {
    fn params(&self) -> Result<KmeansParams> {
        let init = match self.init.to_lowercase().as_str() {
            "random" => KmeansInit::Random,
            "kmeans++" | "k-means++" | "plusplus" => KmeansInit::KMeansPlusPlus,
            other => bail!("Unknown init: {}. Use random or kmeans++.", other),
        };
        Ok(KmeansParams {
            n_clusters: self.n_clusters,
            max_iter: self.max_iter,
            metric: self.metric.spec(),
            seed: self.seed,
            init,
            n_init: self.n_init,
            tol: self.tol,
            mode: ProcessingMode::from_n_jobs(self.n_jobs)?,
        })
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Show information about a dataset file
    Info {
        /// Input dataset (JSON)
        input: PathBuf,
    },
    /// Keep the most discriminative channels by backward elimination
    SelectChannels {
        /// Input dataset (JSON, labelled)
        input: PathBuf,
        /// Reduced dataset (JSON)
        output: PathBuf,
        /// Number of channels to keep
        #[arg(short, long, default_value = "16")]
        n_electrodes: usize,
        /// Also write the subset and distance log here
        #[arg(long)]
        report: Option<PathBuf>,
        /// Parallel jobs: 1 sequential, -1 all cores, -k all but k-1
        #[arg(long, default_value = "1", allow_negative_numbers = true)]
        n_jobs: i32,
        #[command(flatten)]
        metric: MetricArgs,
    },
    /// Riemannian k-means clustering
    Kmeans {
        /// Input dataset (JSON)
        input: PathBuf,
        /// Result file (JSON)
        output: PathBuf,
        #[command(flatten)]
        args: KmeansArgs,
    },
    /// Distances to per-class k-means centroids
    PerClass {
        /// Input dataset (JSON, labelled)
        input: PathBuf,
        /// Result file (JSON)
        output: PathBuf,
        #[command(flatten)]
        args: KmeansArgs,
    },
    /// Potato artifact rejection
    Potato {
        /// Input dataset (JSON)
        input: PathBuf,
        /// Result file (JSON)
        output: PathBuf,
        /// z-score rejection threshold
        #[arg(short, long, default_value = "3.0")]
        threshold: f64,
        /// Maximum rejection rounds
        #[arg(long, default_value = "100")]
        n_iter_max: usize,
        #[command(flatten)]
        metric: MetricArgs,
    },
}

fn setup_logging(verbose: bool) {
    let level = if verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .finish();
    if tracing::subscriber::set_global_default(subscriber).is_err() {
        eprintln!("Logging was already initialized");
    }
}

fn spinner(msg: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::default_spinner().template("{spinner:.green} {msg}") {
        pb.set_style(style);
    }
    pb.set_message(msg.to_string());
    pb.enable_steady_tick(std::time::Duration::from_millis(100));
    pb
}

fn read_input(path: &Path) -> Result<Dataset> {
    let pb = spinner("Reading dataset...");
    let dataset = read_dataset(path)
        .with_context(|| format!("Failed to read dataset {}", path.display()))?;
    pb.finish_and_clear();
    info!(
        "Input: {} trials of {} x {}",
        dataset.n_trials(),
        dataset.n_channels(),
        dataset.n_channels()
    );
    Ok(dataset)
}

fn require_labels(dataset: &Dataset) -> Result<&[ClassLabel]> {
    match dataset.labels.as_deref() {
        Some(labels) => Ok(labels),
        None => bail!("This command needs a labelled dataset"),
    }
}

fn write_output<T: serde::Serialize>(value: &T, path: &Path) -> Result<()> {
    let pb = spinner("Writing output...");
    write_json(value, path).context("Failed to write output")?;
    pb.finish_and_clear();
    Ok(())
}

fn rows(matrix: &Array2<f64>) -> Vec<Vec<f64>> {
    matrix.rows().into_iter().map(|r| r.to_vec()).collect()
}

fn done(name: &str, path: &Path, elapsed: std::time::Duration) {
    println!("{} saved to: {}", name, path.display());
    println!("  Processing time: {:.2?}", elapsed);
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    setup_logging(cli.verbose);

    match cli.command {
        // ── Info ─────────────────────────────────────────────────────
        Commands::Info { input } => {
            let dataset = read_input(&input)?;
            println!("File: {}", input.display());
            println!("Trials: {}", dataset.n_trials());
            println!(
                "Channels: {} ({} x {} matrices)",
                dataset.n_channels(),
                dataset.n_channels(),
                dataset.n_channels()
            );
            match &dataset.labels {
                Some(labels) => {
                    println!("Classes:");
                    for class in dataset.classes() {
                        let count = labels.iter().filter(|&&l| l == class).count();
                        println!("  {}: {} trials", class, count);
                    }
                }
                None => println!("Labels: none"),
            }
        }

        // ── Channel selection ────────────────────────────────────────
        Commands::SelectChannels {
            input,
            output,
            n_electrodes,
            report,
            n_jobs,
            metric,
        } => {
            let dataset = read_input(&input)?;
            let labels = require_labels(&dataset)?;
            let mut selector = ElectrodeSelection::new(ElectrodeSelectionParams {
                n_electrodes,
                metric: metric.spec(),
                mode: ProcessingMode::from_n_jobs(n_jobs)?,
            });

            let start = Instant::now();
            let reduced = selector
                .fit_transform(dataset.trials.view(), Some(labels))
                .context("Failed to select channels")?;
            let elapsed = start.elapsed();

            let subset = selector.subset().unwrap_or_default().to_vec();
            println!("Selected channels: {:?}", subset);

            let out = Dataset::new(reduced, dataset.labels.clone())?;
            write_dataset(&out, &output).context("Failed to write output")?;
            if let Some(report) = report {
                write_output(
                    &json!({
                        "subset": subset,
                        "distance_log": selector.distance_log(),
                    }),
                    &report,
                )?;
            }
            done("Reduced dataset", &output, elapsed);
        }

        // ── K-means ──────────────────────────────────────────────────
        Commands::Kmeans {
            input,
            output,
            args,
        } => {
            let dataset = read_input(&input)?;
            let mut kmeans = Kmeans::new(args.params()?);

            let start = Instant::now();
            kmeans
                .fit(dataset.trials.view(), None)
                .context("Failed to run k-means")?;
            let elapsed = start.elapsed();

            let centroids: Vec<_> = kmeans.centroids()?.iter().map(rows).collect();
            println!(
                "Inertia: {:.6} after {} iterations",
                kmeans.inertia()?,
                kmeans.n_iter()?
            );
            write_output(
                &json!({
                    "labels": kmeans.labels()?,
                    "inertia": kmeans.inertia()?,
                    "n_iter": kmeans.n_iter()?,
                    "restart_inertias": kmeans.restart_inertias(),
                    "centroids": centroids,
                }),
                &output,
            )?;
            done("K-means result", &output, elapsed);
        }

        // ── Per-class k-means ────────────────────────────────────────
        Commands::PerClass {
            input,
            output,
            args,
        } => {
            let dataset = read_input(&input)?;
            let labels = require_labels(&dataset)?;
            let mut transform = KmeansPerClassTransform::new(args.params()?);

            let start = Instant::now();
            let features = transform
                .fit_transform(dataset.trials.view(), Some(labels))
                .context("Failed to fit per-class centroids")?;
            let elapsed = start.elapsed();

            let origins: Vec<_> = transform
                .origins()
                .iter()
                .map(|(class, cluster)| json!({ "class": class, "cluster": cluster }))
                .collect();
            write_output(
                &json!({
                    "features": rows(&features),
                    "origins": origins,
                    "labels": labels,
                }),
                &output,
            )?;
            done("Per-class features", &output, elapsed);
        }

        // ── Potato ───────────────────────────────────────────────────
        Commands::Potato {
            input,
            output,
            threshold,
            n_iter_max,
            metric,
        } => {
            let dataset = read_input(&input)?;
            let mut potato = Potato::new(PotatoParams {
                metric: metric.spec(),
                threshold,
                n_iter_max,
            });

            let start = Instant::now();
            potato
                .fit(dataset.trials.view(), None)
                .context("Failed to fit Potato")?;
            let z_scores = potato.transform(dataset.trials.view())?;
            let clean = potato.predict(dataset.trials.view())?;
            let elapsed = start.elapsed();

            let rejected = clean.iter().filter(|&&c| !c).count();
            println!("Rejected {} of {} trials", rejected, clean.len());
            write_output(
                &json!({
                    "z_scores": z_scores,
                    "clean": clean,
                    "mean": potato.mean()?,
                    "std": potato.std()?,
                    "n_iter": potato.n_iter()?,
                }),
                &output,
            )?;
            done("Potato result", &output, elapsed);
        }
    }

    Ok(())
}
