//! Rejection sampler for synthetic (profile, signal) training pairs.
//!
//! Each draw is a vector of Bernstein coefficients. Draws whose profile
//! decreases with depth are discarded before the forward solver runs; draws
//! whose weighted, noisy signal is not strictly positive and finite are
//! discarded after it. Higher Bernstein orders reject far more often, so the
//! sampler keeps counters for every rejection path.

use crate::math::bernstein::{is_non_decreasing, BernsteinBasis};
use crate::math::stats::StatsHelper;
use crate::prelude::{ComplianceError, ComplianceResult, ForwardSolver};
use crate::records::{
    LayeredModel, Petrophysics, StationProfile, StationReference, TrainingExample,
};
use crate::telemetry::log::LogManager;
use crate::telemetry::metrics::MetricsRecorder;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneratorConfig {
    /// Profile depth [m], sampled at 1 m resolution.
    pub max_depth_m: usize,
    pub bernstein_order: usize,
    /// Inversion frequencies spread evenly across the station band.
    pub num_freqs: usize,
    /// Uniform coefficient bounds [km/s].
    pub coeff_low: f64,
    pub coeff_high: f64,
    pub layer_thickness_m: f64,
    pub petrophysics: Petrophysics,
    /// Draws allowed per accepted example before giving up.
    pub max_attempts_per_example: usize,
    pub seed: u64,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            max_depth_m: 2000,
            bernstein_order: 3,
            num_freqs: 6,
            coeff_low: 0.1,
            coeff_high: 3.0,
            layer_thickness_m: 1.0,
            petrophysics: Petrophysics::default(),
            max_attempts_per_example: 100_000,
            seed: 0,
        }
    }
}

impl GeneratorConfig {
    pub fn validate(&self) -> ComplianceResult<()> {
        if self.max_depth_m < 2 || self.num_freqs == 0 {
            return Err(ComplianceError::InvalidInput(
                "generator needs at least two depth samples and one frequency".into(),
            ));
        }
        if !(self.coeff_low > 0.0) || !(self.coeff_high >= self.coeff_low) {
            return Err(ComplianceError::InvalidInput(format!(
                "coefficient bounds [{}, {}] must be positive and ordered",
                self.coeff_low, self.coeff_high
            )));
        }
        if !(self.layer_thickness_m > 0.0) || self.max_attempts_per_example == 0 {
            return Err(ComplianceError::InvalidInput(
                "layer thickness and attempt cap must be positive".into(),
            ));
        }
        Ok(())
    }
}

/// Counters over every draw since the generator was built or restarted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeneratorStats {
    pub attempts: usize,
    pub accepted: usize,
    pub monotonic_rejections: usize,
    pub signal_rejections: usize,
    pub solver_failures: usize,
}

impl GeneratorStats {
    pub fn rejection_rate(&self) -> f64 {
        match self.attempts {
            0 => 0.0,
            n => (n - self.accepted) as f64 / n as f64,
        }
    }
}

enum Draw {
    Accepted(TrainingExample),
    NonMonotonic,
    BadSignal,
    SolverFailed(ComplianceError),
}

pub struct SyntheticModelGenerator<S: ForwardSolver> {
    config: GeneratorConfig,
    solver: S,
    basis: BernsteinBasis,
    station_depth: f64,
    frequencies: Vec<f64>,
    gamma: Vec<f64>,
    sigma: Vec<[f64; 2]>,
    rng: StdRng,
    cancel: Option<Arc<AtomicBool>>,
    stats: GeneratorStats,
    metrics: MetricsRecorder,
    logger: LogManager,
}

impl<S: ForwardSolver> SyntheticModelGenerator<S> {
    /// Samples the station's coherence and noise bounds at the frequencies
    /// closest to the inversion frequencies.
    pub fn new(
        config: GeneratorConfig,
        reference: &StationReference,
        solver: S,
    ) -> ComplianceResult<Self> {
        config.validate()?;
        reference.validate()?;
        let frequencies = reference.band.linspace(config.num_freqs);
        let mut gamma = Vec::with_capacity(frequencies.len());
        let mut sigma = Vec::with_capacity(frequencies.len());
        for &f in &frequencies {
            let idx = StatsHelper::idx_of_closest(f, &reference.frequencies).ok_or_else(|| {
                ComplianceError::InvalidInput(format!(
                    "station {} has no frequency axis",
                    reference.station
                ))
            })?;
            gamma.push(reference.mean_coherence[idx]);
            sigma.push(reference.compliance_bounds[idx]);
        }

        Ok(Self {
            basis: BernsteinBasis::new(config.bernstein_order, config.max_depth_m),
            rng: StdRng::seed_from_u64(config.seed),
            station_depth: reference.depth,
            config,
            solver,
            frequencies,
            gamma,
            sigma,
            cancel: None,
            stats: GeneratorStats::default(),
            metrics: MetricsRecorder::new(),
            logger: LogManager::for_stage("synthetic"),
        })
    }

    /// Flag polled before every draw; setting it stops generation.
    pub fn with_cancel_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.cancel = Some(flag);
        self
    }

    pub fn config(&self) -> &GeneratorConfig {
        &self.config
    }

    pub fn frequencies(&self) -> &[f64] {
        &self.frequencies
    }

    pub fn basis(&self) -> &BernsteinBasis {
        &self.basis
    }

    pub fn stats(&self) -> GeneratorStats {
        self.stats
    }

    pub fn metrics(&self) -> &MetricsRecorder {
        &self.metrics
    }

    /// Reseeds and clears the counters so the same sequence is produced again.
    pub fn restart(&mut self) {
        self.rng = StdRng::seed_from_u64(self.config.seed);
        self.stats = GeneratorStats::default();
        self.metrics = MetricsRecorder::new();
    }

    /// Lazily yields `count` accepted examples.
    pub fn examples(&mut self, count: usize) -> Examples<'_, S> {
        Examples {
            generator: self,
            requested: count,
            produced: 0,
            failed: false,
        }
    }

    pub fn generate(&mut self, count: usize) -> ComplianceResult<Vec<TrainingExample>> {
        let examples = self.examples(count).collect::<ComplianceResult<Vec<_>>>()?;
        let stats = self.stats;
        self.logger.record(&format!(
            "{} examples from {} draws (rejection rate {:.3}, {} non-monotonic, {} bad signal, {} solver failures)",
            examples.len(),
            stats.attempts,
            stats.rejection_rate(),
            stats.monotonic_rejections,
            stats.signal_rejections,
            stats.solver_failures
        ));
        Ok(examples)
    }

    fn next_accepted(
        &mut self,
        produced: usize,
        requested: usize,
    ) -> ComplianceResult<TrainingExample> {
        for _ in 0..self.config.max_attempts_per_example {
            if self
                .cancel
                .as_ref()
                .is_some_and(|flag| flag.load(Ordering::Relaxed))
            {
                return Err(ComplianceError::Cancelled(produced));
            }
            self.stats.attempts += 1;
            match self.draw()? {
                Draw::Accepted(example) => {
                    self.stats.accepted += 1;
                    self.metrics.record_processed();
                    return Ok(example);
                }
                Draw::NonMonotonic => {
                    self.stats.monotonic_rejections += 1;
                    self.metrics.record_rejected();
                }
                Draw::BadSignal => {
                    self.stats.signal_rejections += 1;
                    self.metrics.record_rejected();
                }
                Draw::SolverFailed(err) => {
                    self.stats.solver_failures += 1;
                    self.metrics.record_error();
                    self.logger.warn(&format!("forward solver failed: {err}"));
                }
            }
        }
        self.logger.warn(&format!(
            "gave up after {} draws with {} of {} examples",
            self.stats.attempts, produced, requested
        ));
        Err(ComplianceError::ConstraintUnsatisfied {
            accepted: produced,
            requested,
            attempts: self.stats.attempts,
        })
    }

    fn draw(&mut self) -> ComplianceResult<Draw> {
        let (low, high) = (self.config.coeff_low, self.config.coeff_high);
        let coefficients: Vec<f64> = (0..=self.config.bernstein_order)
            .map(|_| self.rng.gen_range(low..=high))
            .collect();
        let vs = self.basis.evaluate(&coefficients)?;
        if !is_non_decreasing(&vs) {
            return Ok(Draw::NonMonotonic);
        }

        let model =
            LayeredModel::from_profile(&vs, self.config.layer_thickness_m, self.config.petrophysics);
        let eta = match self
            .solver
            .compute(self.station_depth, &self.frequencies, &model)
        {
            Ok(eta) if eta.len() == self.frequencies.len() => eta,
            Ok(eta) => {
                return Ok(Draw::SolverFailed(ComplianceError::Collaborator(format!(
                    "expected {} values, got {}",
                    self.frequencies.len(),
                    eta.len()
                ))))
            }
            Err(err) => return Ok(Draw::SolverFailed(err)),
        };

        let mut signal = Vec::with_capacity(eta.len());
        for ((&value, &gamma), &[lo, hi]) in eta.iter().zip(&self.gamma).zip(&self.sigma) {
            let (lo, hi) = (lo.min(hi), lo.max(hi));
            let noise = if hi > lo {
                self.rng.gen_range(lo..hi)
            } else {
                lo
            };
            signal.push(gamma * value * noise);
        }
        if signal.iter().any(|v| !(v.is_finite() && *v > 0.0)) {
            return Ok(Draw::BadSignal);
        }

        let profile = StationProfile {
            vs,
            dim_y: coefficients.len(),
            coefficients,
            max_depth_m: self.config.max_depth_m,
            inversion_frequencies: self.frequencies.clone(),
            station_depth: self.station_depth,
            dim_x: self.frequencies.len(),
        };
        Ok(Draw::Accepted(TrainingExample { profile, signal }))
    }
}

/// Iterator over accepted examples; fuses after the first error.
pub struct Examples<'g, S: ForwardSolver> {
    generator: &'g mut SyntheticModelGenerator<S>,
    requested: usize,
    produced: usize,
    failed: bool,
}

impl<S: ForwardSolver> Iterator for Examples<'_, S> {
    type Item = ComplianceResult<TrainingExample>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed || self.produced >= self.requested {
            return None;
        }
        let next = self.generator.next_accepted(self.produced, self.requested);
        match next {
            Ok(_) => self.produced += 1,
            Err(_) => self.failed = true,
        }
        Some(next)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::records::FrequencyBand;

    /// Compliance falling off with frequency, scaled by the mean shear
    /// velocity so different profiles give different signals.
    struct SlowSolver;

    impl ForwardSolver for SlowSolver {
        fn compute(
            &self,
            _depth: f64,
            frequencies: &[f64],
            model: &LayeredModel,
        ) -> ComplianceResult<Vec<f64>> {
            let mean_vs =
                model.layers.iter().map(|l| l.vs).sum::<f64>() / model.layers.len() as f64;
            Ok(frequencies.iter().map(|f| 1e-10 / (mean_vs * (1.0 + f))).collect())
        }
    }

    struct NegativeSolver;

    impl ForwardSolver for NegativeSolver {
        fn compute(
            &self,
            _: f64,
            frequencies: &[f64],
            _: &LayeredModel,
        ) -> ComplianceResult<Vec<f64>> {
            Ok(vec![-1.0; frequencies.len()])
        }
    }

    struct FailingSolver;

    impl ForwardSolver for FailingSolver {
        fn compute(&self, _: f64, _: &[f64], _: &LayeredModel) -> ComplianceResult<Vec<f64>> {
            Err(ComplianceError::Collaborator("no convergence".into()))
        }
    }

    fn reference() -> StationReference {
        let band = FrequencyBand::new(0.005, 0.02).unwrap();
        let mut reference = StationReference::synthetic(
            "SYN",
            2000.0,
            band,
            StatsHelper::linspace(0.0, 0.05, 51),
        );
        reference.compliance_bounds = vec![[0.9, 1.1]; 51];
        reference
    }

    fn config() -> GeneratorConfig {
        GeneratorConfig {
            max_depth_m: 200,
            max_attempts_per_example: 500,
            seed: 7,
            ..GeneratorConfig::default()
        }
    }

    #[test]
    fn accepted_examples_are_monotonic_and_positive() {
        let mut generator = SyntheticModelGenerator::new(config(), &reference(), SlowSolver).unwrap();
        let examples = generator.generate(20).unwrap();
        assert_eq!(examples.len(), 20);
        for example in &examples {
            example.validate().unwrap();
            assert!(is_non_decreasing(&example.profile.vs));
            assert_eq!(example.profile.coefficients.len(), 4);
            assert_eq!(example.signal.len(), 6);
            assert!(example.signal.iter().all(|v| v.is_finite() && *v > 0.0));
        }
        let stats = generator.stats();
        assert_eq!(stats.accepted, 20);
        assert_eq!(stats.attempts, 20 + stats.monotonic_rejections);
        assert_eq!(generator.metrics().snapshot().processed, 20);
    }

    #[test]
    fn noise_stays_within_station_bounds() {
        let mut generator = SyntheticModelGenerator::new(config(), &reference(), SlowSolver).unwrap();
        for example in generator.generate(10).unwrap() {
            let clean = SlowSolver
                .compute(
                    2000.0,
                    &example.profile.inversion_frequencies,
                    &LayeredModel::from_profile(&example.profile.vs, 1.0, Petrophysics::default()),
                )
                .unwrap();
            for (noisy, clean) in example.signal.iter().zip(clean) {
                let ratio = noisy / clean;
                assert!((0.9 - 1e-12..1.1 + 1e-12).contains(&ratio), "ratio {ratio}");
            }
        }
    }

    #[test]
    fn zero_count_is_empty() {
        let mut generator = SyntheticModelGenerator::new(config(), &reference(), SlowSolver).unwrap();
        assert!(generator.generate(0).unwrap().is_empty());
        assert_eq!(generator.stats().attempts, 0);
    }

    #[test]
    fn always_rejected_draws_hit_the_attempt_cap() {
        let mut generator =
            SyntheticModelGenerator::new(config(), &reference(), NegativeSolver).unwrap();
        match generator.generate(5) {
            Err(ComplianceError::ConstraintUnsatisfied {
                accepted,
                requested,
                attempts,
            }) => {
                assert_eq!((accepted, requested, attempts), (0, 5, 500));
            }
            other => panic!("expected attempt cap, got {other:?}"),
        }
        let stats = generator.stats();
        assert_eq!(stats.accepted, 0);
        assert_eq!(stats.rejection_rate(), 1.0);
        assert_eq!(stats.monotonic_rejections + stats.signal_rejections, 500);
    }

    #[test]
    fn high_order_profiles_exhaust_the_cap_on_monotonicity() {
        // At order 12 roughly one draw in 700 gives a non-decreasing profile.
        let config = GeneratorConfig {
            bernstein_order: 12,
            max_attempts_per_example: 20,
            ..config()
        };
        let mut generator = SyntheticModelGenerator::new(config, &reference(), SlowSolver).unwrap();
        match generator.generate(3) {
            Err(ComplianceError::ConstraintUnsatisfied {
                accepted,
                requested,
                attempts,
            }) => {
                assert_eq!(requested, 3);
                assert!(accepted < 3);
                assert!(attempts <= (accepted + 1) * 20);
            }
            other => panic!("expected attempt cap, got {other:?}"),
        }
        let stats = generator.stats();
        assert!(stats.monotonic_rejections > 0);
        assert_eq!(stats.signal_rejections + stats.solver_failures, 0);
        assert_eq!(stats.attempts, stats.accepted + stats.monotonic_rejections);
    }

    #[test]
    fn solver_failures_are_counted_not_propagated() {
        let mut generator =
            SyntheticModelGenerator::new(config(), &reference(), FailingSolver).unwrap();
        assert!(matches!(
            generator.generate(1),
            Err(ComplianceError::ConstraintUnsatisfied { .. })
        ));
        assert!(generator.stats().solver_failures > 0);
        assert_eq!(
            generator.metrics().snapshot().errors,
            generator.stats().solver_failures
        );
    }

    #[test]
    fn same_seed_restarts_the_same_sequence() {
        let mut generator = SyntheticModelGenerator::new(config(), &reference(), SlowSolver).unwrap();
        let first = generator.generate(3).unwrap();
        generator.restart();
        let second = generator.generate(3).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn cancel_flag_stops_generation() {
        let flag = Arc::new(AtomicBool::new(true));
        let mut generator = SyntheticModelGenerator::new(config(), &reference(), SlowSolver)
            .unwrap()
            .with_cancel_flag(flag);
        assert!(matches!(generator.generate(3), Err(ComplianceError::Cancelled(0))));
    }

    #[test]
    fn inversion_frequencies_span_the_band() {
        let generator = SyntheticModelGenerator::new(config(), &reference(), SlowSolver).unwrap();
        let freqs = generator.frequencies();
        assert_eq!(freqs.len(), 6);
        assert!((freqs[0] - 0.005).abs() < 1e-15 && (freqs[5] - 0.02).abs() < 1e-15);
    }

    #[test]
    fn inverted_coefficient_bounds_are_rejected() {
        let config = GeneratorConfig {
            coeff_low: 3.0,
            coeff_high: 0.1,
            ..GeneratorConfig::default()
        };
        assert!(SyntheticModelGenerator::new(config, &reference(), SlowSolver).is_err());
    }
}
