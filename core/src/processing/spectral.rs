//! Daily auto- and cross-spectral densities with window-rejection QC.
//!
//! A day is cut into overlapping windows. The log-PSD of every window is
//! smoothed, restricted to the analysis band and demeaned, then windows whose
//! removal shrinks the spread of the remaining ones the most are rejected in
//! rounds, each round confirmed by an F-test. The surviving windows alone
//! enter the daily averaged spectra.

use crate::math::fft::{next_power_of_two, one_sided_frequencies, FftHelper};
use crate::math::ftest::variance_ratio_p_value;
use crate::math::smooth::boxcar_columns;
use crate::math::stats::StatsHelper;
use crate::math::window::{hanning, overlap_taper, segment_count};
use crate::prelude::{ComplianceError, ComplianceResult, SpectralConfig};
use crate::records::{DayTraces, RawDay, SpectralDay};
use crate::telemetry::log::LogManager;
use ndarray::{Array2, Axis};
use num_complex::Complex64;

const CHANNEL_NAMES: [&str; 4] = ["pressure", "horizontal 1", "horizontal 2", "vertical"];

/// Result of estimating one day: either spectra, or a QC rejection that the
/// caller is expected to skip.
#[derive(Debug, Clone, PartialEq)]
pub enum SpectralOutcome {
    Retained(SpectralDay),
    InsufficientWindows { retained: usize, required: usize },
}

/// Windows kept by the rejection loop.
#[derive(Debug, Clone, PartialEq)]
pub struct QcReport {
    pub retained: Vec<usize>,
    pub total: usize,
    pub iterations: usize,
}

pub struct SpectralEstimator {
    config: SpectralConfig,
    logger: LogManager,
}

impl SpectralEstimator {
    pub fn new(config: SpectralConfig) -> Self {
        Self {
            config,
            logger: LogManager::for_stage("spectral"),
        }
    }

    pub fn config(&self) -> &SpectralConfig {
        &self.config
    }

    pub fn estimate(&self, day: RawDay) -> ComplianceResult<SpectralOutcome> {
        let tolerance = f64::EPSILON * self.config.sample_rate;
        if (day.sample_rate - self.config.sample_rate).abs() > tolerance {
            return Err(ComplianceError::InvalidInput(format!(
                "{} {}: sampled at {} Hz, configured for {} Hz",
                day.station, day.time_key, day.sample_rate, self.config.sample_rate
            )));
        }
        let mut traces = day.traces;
        self.normalize_lengths(&mut traces)?;

        let layout = self.layout()?;
        let report = self.quality_with_layout(&traces, &layout)?;
        self.logger.record(&format!(
            "{} {}: {}/{} windows retained after {} QC rounds",
            day.station,
            day.time_key,
            report.retained.len(),
            report.total,
            report.iterations
        ));
        if report.retained.len() < self.config.min_good_windows {
            self.logger.warn(&format!(
                "{} {}: too few good windows for daily spectra",
                day.station, day.time_key
            ));
            return Ok(SpectralOutcome::InsufficientWindows {
                retained: report.retained.len(),
                required: self.config.min_good_windows,
            });
        }

        let spectra = self.averaged_spectra(&traces, &report.retained, &layout);
        let [pp, h1, h2, zz] = &spectra.transforms;
        let spectral_day = SpectralDay {
            station: day.station,
            time_key: day.time_key,
            depth: day.depth,
            frequencies: spectra.frequencies,
            c_pp: auto_spectrum(pp),
            c_11: auto_spectrum(h1),
            c_22: auto_spectrum(h2),
            c_zz: auto_spectrum(zz),
            c_12: cross_spectrum(h1, h2),
            c_1z: cross_spectrum(h1, zz),
            c_2z: cross_spectrum(h2, zz),
            c_1p: cross_spectrum(h1, pp),
            c_2p: cross_spectrum(h2, pp),
            c_zp: cross_spectrum(zz, pp),
            retained_windows: report.retained.len(),
        };
        spectral_day.validate()?;
        Ok(SpectralOutcome::Retained(spectral_day))
    }

    /// Brings every channel to the expected daily length. Off-by-one records
    /// are repaired (last value repeated, or last sample dropped); anything
    /// else is malformed.
    pub fn normalize_lengths(&self, traces: &mut DayTraces) -> ComplianceResult<()> {
        let expected = self.config.expected_samples;
        for (name, trace) in CHANNEL_NAMES.iter().zip(traces.channels_mut()) {
            let len = trace.len();
            if len == expected + 1 {
                trace.truncate(expected);
            } else if len + 1 == expected {
                let last = trace.last().copied().ok_or_else(|| {
                    ComplianceError::InvalidInput(format!("{name} trace is empty"))
                })?;
                trace.push(last);
            } else if len != expected {
                return Err(ComplianceError::InvalidInput(format!(
                    "{name} trace has {len} samples, expected {expected}"
                )));
            }
        }
        Ok(())
    }

    /// Runs the window-rejection loop over length-normalized traces.
    pub fn window_quality(&self, traces: &DayTraces) -> ComplianceResult<QcReport> {
        let layout = self.layout()?;
        self.quality_with_layout(traces, &layout)
    }

    fn quality_with_layout(
        &self,
        traces: &DayTraces,
        layout: &WindowLayout,
    ) -> ComplianceResult<QcReport> {
        let taper = overlap_taper(layout.length, layout.overlap);
        let frequencies = one_sided_frequencies(layout.length, self.config.sample_rate);
        let in_band: Vec<usize> = frequencies
            .iter()
            .enumerate()
            .filter(|(_, f)| **f > self.config.band_low_hz && **f < self.config.band_high_hz)
            .map(|(idx, _)| idx)
            .collect();
        if in_band.is_empty() {
            return Err(ComplianceError::InvalidInput(
                "no frequencies fall inside the QC band".into(),
            ));
        }

        let mut log_psds = Vec::with_capacity(4);
        for (name, trace) in CHANNEL_NAMES.into_iter().zip(traces.channels()) {
            let mut psd = spectrogram(trace, &taper, layout, self.config.sample_rate);
            replace_zeros(&mut psd, name)?;
            let smoothed = boxcar_columns(&psd.mapv(f64::ln), self.config.smoothing_width);
            let mut banded = smoothed.select(Axis(0), &in_band);
            for mut column in banded.axis_iter_mut(Axis(1)) {
                let mean = column.mean().unwrap_or(0.0);
                column.mapv_inplace(|v| v - mean);
            }
            log_psds.push(banded);
        }

        Ok(self.reject_windows(&log_psds, layout.segments))
    }

    fn reject_windows(&self, log_psds: &[Array2<f64>], total: usize) -> QcReport {
        let mut retained: Vec<usize> = (0..total).collect();
        let mut iterations = 0;

        while iterations < self.config.max_qc_iterations && retained.len() > 2 {
            iterations += 1;
            let mut penalty = vec![0.0; retained.len()];
            for psd in log_psds {
                let norms = leave_one_out_norms(psd, &retained);
                let median = StatsHelper::median(&norms);
                for (acc, norm) in penalty.iter_mut().zip(&norms) {
                    *acc += median - norm;
                }
            }

            let threshold = self.config.penalty_sigma * StatsHelper::std(&penalty);
            let kill: Vec<bool> = penalty.iter().map(|&p| p > threshold).collect();
            if !kill.iter().any(|&k| k) {
                break;
            }
            let kept_penalty: Vec<f64> = penalty
                .iter()
                .zip(&kill)
                .filter(|&(_, &k)| !k)
                .map(|(&p, _)| p)
                .collect();
            if variance_ratio_p_value(&penalty, 1, &kept_penalty, 1) >= self.config.ftest_alpha {
                break;
            }
            self.logger.trace(&format!(
                "QC round {iterations}: rejecting {} windows",
                retained.len() - kept_penalty.len()
            ));
            retained = retained
                .into_iter()
                .zip(&kill)
                .filter(|&(_, &k)| !k)
                .map(|(idx, _)| idx)
                .collect();
        }

        QcReport {
            retained,
            total,
            iterations,
        }
    }

    fn averaged_spectra(
        &self,
        traces: &DayTraces,
        retained: &[usize],
        layout: &WindowLayout,
    ) -> WindowTransforms {
        let padded = next_power_of_two(layout.length);
        let mut fft = FftHelper::new(padded);
        let bins = fft.one_sided_len();
        let taper = hanning(layout.length);

        let transforms = traces.channels().map(|trace| {
            let mut rows = Array2::<Complex64>::zeros((retained.len(), bins));
            for (row, &window) in rows.axis_iter_mut(Axis(0)).zip(retained) {
                let start = window * layout.step;
                let segment: Vec<f64> = trace[start..start + layout.length]
                    .iter()
                    .zip(&taper)
                    .map(|(x, w)| x * w)
                    .collect();
                let spectrum = fft.forward(&segment);
                for (target, value) in row.into_iter().zip(spectrum.into_iter().take(bins)) {
                    *target = value;
                }
            }
            rows
        });

        WindowTransforms {
            frequencies: one_sided_frequencies(padded, self.config.sample_rate),
            transforms,
        }
    }

    fn layout(&self) -> ComplianceResult<WindowLayout> {
        let length = self.config.window_samples();
        let overlap = self.config.overlap_samples();
        if length == 0 || overlap >= length || length > self.config.expected_samples {
            return Err(ComplianceError::InvalidInput(format!(
                "window of {length} samples with {overlap} overlap does not fit a {}-sample day",
                self.config.expected_samples
            )));
        }
        let segments = segment_count(self.config.expected_samples, length, overlap);
        Ok(WindowLayout {
            length,
            overlap,
            step: length - overlap,
            segments,
        })
    }
}

struct WindowLayout {
    length: usize,
    overlap: usize,
    step: usize,
    segments: usize,
}

struct WindowTransforms {
    frequencies: Vec<f64>,
    /// Per channel (P, 1, 2, Z): retained windows × one-sided bins.
    transforms: [Array2<Complex64>; 4],
}

/// One-sided PSD density per window (frequencies × windows), each window
/// mean-detrended and tapered before the transform.
fn spectrogram(
    trace: &[f64],
    taper: &[f64],
    layout: &WindowLayout,
    sample_rate: f64,
) -> Array2<f64> {
    let mut fft = FftHelper::new(layout.length);
    let bins = fft.one_sided_len();
    let scale = 1.0 / (sample_rate * taper.iter().map(|w| w * w).sum::<f64>());
    let even = layout.length % 2 == 0;

    let mut psd = Array2::<f64>::zeros((bins, layout.segments));
    for (segment_idx, mut column) in psd.axis_iter_mut(Axis(1)).enumerate() {
        let start = segment_idx * layout.step;
        let segment = &trace[start..start + layout.length];
        let mean = StatsHelper::mean(segment);
        let windowed: Vec<f64> = segment
            .iter()
            .zip(taper)
            .map(|(x, w)| (x - mean) * w)
            .collect();
        let spectrum = fft.forward(&windowed);
        for (bin, target) in column.iter_mut().enumerate() {
            let doubled = bin > 0 && !(even && bin == bins - 1);
            let factor = if doubled { 2.0 } else { 1.0 };
            *target = spectrum[bin].norm_sqr() * scale * factor;
        }
    }
    psd
}

/// Exact zeros would become -inf in log space; they take the smallest
/// non-zero value of the spectrogram instead.
fn replace_zeros(psd: &mut Array2<f64>, channel: &'static str) -> ComplianceResult<()> {
    let smallest = psd
        .iter()
        .copied()
        .filter(|&v| v > 0.0)
        .fold(f64::INFINITY, f64::min);
    if !smallest.is_finite() {
        return Err(ComplianceError::DegenerateSpectrum(channel));
    }
    psd.mapv_inplace(|v| if v == 0.0 { smallest } else { v });
    Ok(())
}

/// For every retained window, the L2 norm over frequency of the standard
/// deviation across all *other* retained windows.
fn leave_one_out_norms(psd: &Array2<f64>, retained: &[usize]) -> Vec<f64> {
    let others = (retained.len() - 1) as f64;
    let mut squared = vec![0.0; retained.len()];
    for row in psd.axis_iter(Axis(0)) {
        let values: Vec<f64> = retained.iter().map(|&w| row[w]).collect();
        let sum: f64 = values.iter().sum();
        let sum_sq: f64 = values.iter().map(|v| v * v).sum();
        for (acc, &x) in squared.iter_mut().zip(&values) {
            let mean = (sum - x) / others;
            let variance = ((sum_sq - x * x) / others - mean * mean).max(0.0);
            *acc += variance;
        }
    }
    squared.into_iter().map(f64::sqrt).collect()
}

fn auto_spectrum(transform: &Array2<Complex64>) -> Vec<f64> {
    transform
        .mapv(|x| x.norm_sqr())
        .mean_axis(Axis(0))
        .map(|mean| mean.to_vec())
        .unwrap_or_default()
}

fn cross_spectrum(a: &Array2<Complex64>, b: &Array2<Complex64>) -> Vec<Complex64> {
    let products = a * &b.mapv(|x| x.conj());
    products
        .mean_axis(Axis(0))
        .map(|mean| mean.to_vec())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use rand_distr::{Distribution, Normal};
    use std::f64::consts::PI;

    fn small_config() -> SpectralConfig {
        SpectralConfig {
            expected_samples: 4000,
            window_length_sec: 400.0,
            min_good_windows: 5,
            smoothing_width: 5,
            ..SpectralConfig::default()
        }
    }

    fn noise(len: usize, seed: u64) -> Vec<f64> {
        let mut rng = StdRng::seed_from_u64(seed);
        let normal = Normal::new(0.0, 1.0).unwrap();
        (0..len).map(|_| normal.sample(&mut rng)).collect()
    }

    fn raw_day(traces: DayTraces) -> RawDay {
        RawDay {
            station: "STN1".into(),
            time_key: "2012.001".into(),
            depth: 2015.0,
            sample_rate: 1.0,
            traces,
        }
    }

    fn coherent_traces(len: usize, gain: f64) -> DayTraces {
        let pressure = noise(len, 1);
        let vertical = pressure.iter().map(|p| gain * p).collect();
        DayTraces {
            pressure,
            horizontal_1: noise(len, 2),
            horizontal_2: noise(len, 3),
            vertical,
        }
    }

    #[test]
    fn off_by_one_traces_are_repaired() {
        let estimator = SpectralEstimator::new(small_config());
        let mut traces = coherent_traces(4000, 1.0);
        traces.pressure.pop();
        traces.vertical.push(9.0);
        let last = traces.pressure[3998];
        estimator.normalize_lengths(&mut traces).unwrap();
        assert_eq!(traces.pressure.len(), 4000);
        assert_eq!(traces.pressure[3999], last);
        assert_eq!(traces.vertical.len(), 4000);
    }

    #[test]
    fn malformed_trace_length_is_fatal() {
        let estimator = SpectralEstimator::new(small_config());
        let mut traces = coherent_traces(4000, 1.0);
        traces.horizontal_2.truncate(3990);
        assert!(matches!(
            estimator.estimate(raw_day(traces)),
            Err(ComplianceError::InvalidInput(_))
        ));
    }

    #[test]
    fn proportional_channels_have_real_cross_spectrum() {
        let estimator = SpectralEstimator::new(small_config());
        let outcome = estimator.estimate(raw_day(coherent_traces(4000, 3.0))).unwrap();
        let day = match outcome {
            SpectralOutcome::Retained(day) => day,
            other => panic!("expected spectra, got {other:?}"),
        };
        assert_eq!(day.frequencies.len(), 257);
        assert_relative_eq!(day.frequencies[256], 0.5);
        assert!(day.retained_windows >= 5);
        for k in 1..day.len() {
            assert_relative_eq!(day.c_zp[k].re, 3.0 * day.c_pp[k], max_relative = 1e-9);
            assert!(day.c_zp[k].im.abs() <= 1e-9 * day.c_pp[k]);
            assert_relative_eq!(day.c_zz[k], 9.0 * day.c_pp[k], max_relative = 1e-9);
        }
    }

    #[test]
    fn narrowband_burst_window_is_rejected() {
        let estimator = SpectralEstimator::new(small_config());
        let mut traces = coherent_traces(4000, 1.0);
        let burst_window = 9;
        let start = burst_window * 200;
        for (i, sample) in traces.pressure[start..start + 400].iter_mut().enumerate() {
            *sample += 50.0 * (2.0 * PI * 0.1 * i as f64).sin();
        }
        let report = estimator.window_quality(&traces).unwrap();
        assert_eq!(report.total, 19);
        assert!(!report.retained.contains(&burst_window));
        assert!(report.retained.len() >= 12);
    }

    #[test]
    fn too_few_windows_is_a_qc_outcome_not_an_error() {
        let config = SpectralConfig {
            min_good_windows: 25,
            ..small_config()
        };
        let outcome = SpectralEstimator::new(config)
            .estimate(raw_day(coherent_traces(4000, 1.0)))
            .unwrap();
        assert!(matches!(
            outcome,
            SpectralOutcome::InsufficientWindows { required: 25, .. }
        ));
    }

    #[test]
    fn silent_channel_is_degenerate() {
        let estimator = SpectralEstimator::new(small_config());
        let mut traces = coherent_traces(4000, 1.0);
        traces.horizontal_1 = vec![0.0; 4000];
        assert!(matches!(
            estimator.window_quality(&traces),
            Err(ComplianceError::DegenerateSpectrum("horizontal 1"))
        ));
    }

    #[test]
    fn leave_one_out_norm_matches_direct_std() {
        let psd = ndarray::array![[1.0, 2.0, 4.0], [0.0, 3.0, -1.0]];
        let norms = leave_one_out_norms(&psd, &[0, 1, 2]);
        // Window 0 left out: rows [2, 4] and [3, -1] -> std 1 and 2.
        assert_relative_eq!(norms[0], 5f64.sqrt(), epsilon = 1e-12);
    }
}
