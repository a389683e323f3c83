use crate::workflow::config::WorkflowConfig;
use anyhow::Context;
use compliancecore::math::BernsteinBasis;
use compliancecore::prelude::{ComplianceError, DensityEstimator, ForwardSolver};
use compliancecore::processing::{
    ComplianceCoherence, GeneratorStats, InversionResult, Inverter, SpectralEstimator,
    SpectralOutcome, StationAggregator, SyntheticModelGenerator, TrainingMatrices,
};
use compliancecore::records::{
    ComplianceDay, FeatureScaling, RawDay, SpectralDay, StationCatalog, StationReference,
    TrainingExample,
};
use compliancecore::telemetry::{LogManager, MetricsRecorder, MetricsSnapshot};
use std::collections::BTreeMap;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

/// Outputs of a batch together with how many units survived.
pub struct BatchReport<T> {
    pub outputs: Vec<T>,
    pub metrics: MetricsSnapshot,
}

pub struct GeneratedSplit {
    pub train: Vec<TrainingExample>,
    pub test: Vec<TrainingExample>,
    pub train_stats: GeneratorStats,
    pub test_stats: GeneratorStats,
}

/// Applies each stage over a batch: one failing unit is logged and counted,
/// never fatal to the batch.
#[derive(Clone)]
pub struct Runner {
    config: WorkflowConfig,
    logger: LogManager,
}

impl Runner {
    pub fn new(config: WorkflowConfig) -> Self {
        Self {
            config,
            logger: LogManager::for_stage("workflow"),
        }
    }

    pub fn config(&self) -> &WorkflowConfig {
        &self.config
    }

    pub fn spectra(&self, days: Vec<RawDay>) -> BatchReport<SpectralDay> {
        let estimator = SpectralEstimator::new(self.config.spectral.clone());
        let metrics = MetricsRecorder::new();
        let mut outputs = Vec::new();
        for day in days {
            let label = format!("{} {}", day.station, day.time_key);
            match estimator.estimate(day) {
                Ok(SpectralOutcome::Retained(spectral)) => {
                    metrics.record_processed();
                    outputs.push(spectral);
                }
                Ok(SpectralOutcome::InsufficientWindows { retained, required }) => {
                    metrics.record_rejected();
                    self.logger.record(&format!(
                        "{label} skipped: {retained} good windows, {required} required"
                    ));
                }
                Err(err) => {
                    metrics.record_error();
                    self.logger.warn(&format!("{label} failed: {err}"));
                }
            }
        }
        self.report(outputs, metrics, "spectra")
    }

    pub fn compliance(&self, days: &[SpectralDay]) -> BatchReport<ComplianceDay> {
        let derive = ComplianceCoherence::default();
        let metrics = MetricsRecorder::new();
        let mut outputs = Vec::new();
        for day in days {
            match derive.derive(day) {
                Ok(compliance) => {
                    metrics.record_processed();
                    outputs.push(compliance);
                }
                Err(err) => {
                    metrics.record_error();
                    self.logger
                        .warn(&format!("{} {} failed: {err}", day.station, day.time_key));
                }
            }
        }
        self.report(outputs, metrics, "compliance")
    }

    /// Groups days by station and aggregates each station whose days pass
    /// the coherence filter.
    pub fn aggregate(&self, days: Vec<ComplianceDay>) -> anyhow::Result<StationCatalog> {
        let mut by_station: BTreeMap<String, Vec<ComplianceDay>> = BTreeMap::new();
        for day in days {
            by_station.entry(day.station.clone()).or_default().push(day);
        }

        let aggregator = StationAggregator::new(self.config.coherence_threshold);
        let mut references = Vec::new();
        for (station, days) in by_station {
            let band = self.config.band_for(&station)?;
            match aggregator.aggregate(&days, band) {
                Ok(reference) => references.push(reference),
                Err(ComplianceError::EmptyAggregate { total }) => self.logger.warn(&format!(
                    "{station}: no coherent days among {total}, station left out"
                )),
                Err(err) => self.logger.warn(&format!("{station} failed: {err}")),
            }
        }
        let snapshot = aggregator.metrics().snapshot();
        self.logger.record(&format!(
            "aggregate: {} stations, {} of {} days kept",
            references.len(),
            snapshot.processed,
            snapshot.attempted()
        ));
        StationCatalog::from_references(references).context("building station catalog")
    }

    /// Generates independent train and test sets for one station.
    pub fn generate<S, F>(
        &self,
        reference: &StationReference,
        solver: F,
        cancel: Arc<AtomicBool>,
    ) -> anyhow::Result<GeneratedSplit>
    where
        S: ForwardSolver,
        F: Fn() -> S,
    {
        let mut split = Vec::with_capacity(2);
        for (test, count) in [(false, self.config.train_count), (true, self.config.test_count)] {
            let label = if test { "test" } else { "train" };
            let mut generator = SyntheticModelGenerator::new(
                self.config.generator_for_split(test),
                reference,
                solver(),
            )
            .with_context(|| format!("configuring {label} generator for {}", reference.station))?
            .with_cancel_flag(cancel.clone());
            let examples = generator
                .generate(count)
                .with_context(|| format!("generating {label} set for {}", reference.station))?;
            split.push((examples, generator.stats()));
        }
        let (test, test_stats) = split.pop().unwrap_or_default();
        let (train, train_stats) = split.pop().unwrap_or_default();
        Ok(GeneratedSplit {
            train,
            test,
            train_stats,
            test_stats,
        })
    }

    pub fn prepare(&self, examples: &[TrainingExample]) -> anyhow::Result<TrainingMatrices> {
        TrainingMatrices::prepare(examples).context("preparing training matrices")
    }

    /// Inverts the station's measured mean compliance at the inversion
    /// frequencies of its band.
    pub fn invert<E: DensityEstimator + ?Sized>(
        &self,
        reference: &StationReference,
        scaling: &FeatureScaling,
        estimator: &E,
    ) -> anyhow::Result<InversionResult> {
        let generator = &self.config.generator;
        let frequencies = reference.band.linspace(generator.num_freqs);
        let signal = reference
            .compliance_at(&frequencies)
            .with_context(|| format!("sampling measured compliance of {}", reference.station))?;
        let basis = BernsteinBasis::new(generator.bernstein_order, generator.max_depth_m);
        Inverter::new(self.config.inversion)
            .invert(estimator, scaling, &signal, &basis)
            .with_context(|| format!("inverting {}", reference.station))
    }

    fn report<T>(
        &self,
        outputs: Vec<T>,
        metrics: MetricsRecorder,
        stage: &str,
    ) -> BatchReport<T> {
        let snapshot = metrics.snapshot();
        self.logger.record(&format!(
            "{stage}: {} kept, {} rejected, {} failed (survival {:.2})",
            snapshot.processed,
            snapshot.rejected,
            snapshot.errors,
            snapshot.survival_rate()
        ));
        BatchReport {
            outputs,
            metrics: snapshot,
        }
    }
}
