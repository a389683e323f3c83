use anyhow::Context;
use clap::{Parser, Subcommand};
use compliancecore::records::{
    ComplianceDay, FeatureScaling, RawDay, SpectralDay, StationCatalog, StationReference,
    TrainingExample,
};
use estimator::mixture_file::PrecomputedMixture;
use generator::halfspace::EffectiveHalfSpaceSolver;
use generator::raw::{build_raw_day, RawDayConfig};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::runtime::Builder as TokioBuilder;
use tokio::signal;
use workflow::config::WorkflowConfig;
use workflow::runner::{GeneratedSplit, Runner};
use workflow::store::{read_json, write_json, ArtifactStore};

mod estimator;
mod generator;
mod workflow;

#[derive(Parser)]
#[command(author, version, about = "Offline driver for the OBS compliance pipeline")]
struct Args {
    /// Load a workflow config from YAML
    #[arg(long, global = true)]
    workflow: Option<PathBuf>,
    /// Seed for every randomized stage when no workflow config is given
    #[arg(long, global = true, default_value_t = 0)]
    seed: u64,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Write a synthetic raw station-day
    SynthDay {
        #[arg(long)]
        out: PathBuf,
        #[arg(long, default_value = "SYN01")]
        station: String,
        #[arg(long, default_value = "2012.001")]
        time_key: String,
        #[arg(long, default_value_t = 2000.0)]
        depth: f64,
        /// Start sample of a broadband transient
        #[arg(long)]
        glitch_at: Option<usize>,
    },
    /// Raw days -> daily spectra
    Spectra {
        #[arg(required = true)]
        inputs: Vec<PathBuf>,
        #[arg(long)]
        out_dir: PathBuf,
    },
    /// Daily spectra -> daily compliance and coherence
    Compliance {
        #[arg(required = true)]
        inputs: Vec<PathBuf>,
        #[arg(long)]
        out_dir: PathBuf,
    },
    /// Daily compliance -> station references and catalog
    Aggregate {
        #[arg(required = true)]
        inputs: Vec<PathBuf>,
        #[arg(long)]
        catalog: PathBuf,
    },
    /// Station reference -> train/test training examples (Ctrl+C cancels)
    Generate {
        #[arg(long)]
        catalog: PathBuf,
        #[arg(long)]
        station: String,
        #[arg(long)]
        out_dir: PathBuf,
    },
    /// Training examples -> scaled inputs, targets and feature scaling
    Prep {
        #[arg(long)]
        examples: PathBuf,
        #[arg(long)]
        out: PathBuf,
    },
    /// Measured station signal -> bounded velocity profile
    Invert {
        #[arg(long)]
        catalog: PathBuf,
        #[arg(long)]
        station: String,
        #[arg(long)]
        scaling: PathBuf,
        #[arg(long)]
        mixture: PathBuf,
        #[arg(long)]
        out: PathBuf,
    },
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let args = Args::parse();

    let workflow_config = if let Some(path) = &args.workflow {
        WorkflowConfig::load(path)?
    } else {
        WorkflowConfig::from_args(args.seed)
    };
    let runner = Runner::new(workflow_config);

    match args.command {
        Command::SynthDay {
            out,
            station,
            time_key,
            depth,
            glitch_at,
        } => {
            let config = RawDayConfig {
                station,
                time_key,
                depth,
                samples: runner.config().spectral.expected_samples,
                sample_rate: runner.config().spectral.sample_rate,
                glitch: glitch_at.map(|start| (start, 600)),
                seed: args.seed,
                ..RawDayConfig::default()
            };
            let day = build_raw_day(&config)?;
            write_json(&out, &day)?;
            println!("Synthetic day {} {} -> {}", day.station, day.time_key, out.display());
        }
        Command::Spectra { inputs, out_dir } => {
            let days = read_all::<RawDay>(&inputs)?;
            let report = runner.spectra(days);
            let store = ArtifactStore::new(out_dir);
            for day in &report.outputs {
                store.write(&format!("{}_{}", day.station, day.time_key), day)?;
            }
            println!(
                "Spectra -> kept {}, skipped {}, failed {} (written to {})",
                report.metrics.processed,
                report.metrics.rejected,
                report.metrics.errors,
                store.root().display()
            );
        }
        Command::Compliance { inputs, out_dir } => {
            let days = read_all::<SpectralDay>(&inputs)?;
            let report = runner.compliance(&days);
            let store = ArtifactStore::new(out_dir);
            for day in &report.outputs {
                store.write(&format!("{}_{}", day.station, day.time_key), day)?;
            }
            println!(
                "Compliance -> derived {}, failed {} (written to {})",
                report.metrics.processed,
                report.metrics.errors,
                store.root().display()
            );
        }
        Command::Aggregate { inputs, catalog } => {
            let days = read_all::<ComplianceDay>(&inputs)?;
            let result = runner.aggregate(days)?;
            write_json(&catalog, &result)?;
            for reference in result.iter() {
                println!(
                    "{} -> {} of {} days used",
                    reference.station, reference.days_used, reference.days_total
                );
            }
        }
        Command::Generate {
            catalog,
            station,
            out_dir,
        } => {
            let reference = load_reference(&catalog, &station)?;
            let split = generate_cancellable(runner, reference)?;
            let store = ArtifactStore::new(out_dir);
            store.write(&format!("{station}_train"), &split.train)?;
            store.write(&format!("{station}_test"), &split.test)?;
            println!(
                "Generate -> {} train / {} test, rejection rate {:.3} / {:.3} ({} solver failures)",
                split.train.len(),
                split.test.len(),
                split.train_stats.rejection_rate(),
                split.test_stats.rejection_rate(),
                split.train_stats.solver_failures + split.test_stats.solver_failures
            );
        }
        Command::Prep { examples, out } => {
            let examples: Vec<TrainingExample> = read_json(&examples)?;
            let matrices = runner.prepare(&examples)?;
            write_json(&out, &matrices)?;
            println!(
                "Prep -> {:?} inputs, {:?} targets",
                matrices.inputs.dim(),
                matrices.targets.dim()
            );
        }
        Command::Invert {
            catalog,
            station,
            scaling,
            mixture,
            out,
        } => {
            let reference = load_reference(&catalog, &station)?;
            let scaling: FeatureScaling = read_json(&scaling)?;
            let estimator = PrecomputedMixture::load(&mixture)?;
            let result = runner.invert(&reference, &scaling, &estimator)?;
            write_json(&out, &result)?;
            println!(
                "Invert -> {} samples, surface Vs {:.3} km/s",
                result.coefficients.nrows(),
                result.mean_profile.first().copied().unwrap_or_default()
            );
        }
    }

    Ok(())
}

fn read_all<T: serde::de::DeserializeOwned>(paths: &[PathBuf]) -> anyhow::Result<Vec<T>> {
    paths.iter().map(|path| read_json::<T, _>(path)).collect()
}

fn load_reference(catalog: &Path, station: &str) -> anyhow::Result<StationReference> {
    let catalog: StationCatalog = read_json(catalog)?;
    catalog
        .get(station)
        .cloned()
        .with_context(|| format!("station {station} not in catalog"))
}

/// Runs generation on a blocking worker while Ctrl+C flips the cancel flag.
fn generate_cancellable(
    runner: Runner,
    reference: StationReference,
) -> anyhow::Result<GeneratedSplit> {
    let cancel = Arc::new(AtomicBool::new(false));
    let runtime = TokioBuilder::new_multi_thread()
        .enable_all()
        .build()
        .context("creating runtime for generation")?;
    runtime.block_on(async {
        let flag = cancel.clone();
        let mut task = tokio::task::spawn_blocking(move || {
            runner.generate(&reference, EffectiveHalfSpaceSolver::default, flag)
        });
        tokio::select! {
            joined = &mut task => joined.context("generation task panicked")?,
            interrupt = signal::ctrl_c() => {
                interrupt.context("awaiting Ctrl+C")?;
                log::warn!("Ctrl+C received, cancelling generation");
                cancel.store(true, Ordering::Relaxed);
                task.await.context("generation task panicked")?
            }
        }
    })
}
