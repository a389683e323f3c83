use crate::math::stats::StatsHelper;
use crate::prelude::{ComplianceError, ComplianceResult};
use crate::records::{ComplianceDay, FrequencyBand, StationReference};
use crate::telemetry::log::LogManager;
use crate::telemetry::metrics::MetricsRecorder;

pub const COHERENCE_THRESHOLD: f64 = 0.95;
const LOWER_QUANTILE: f64 = 0.025;
const UPPER_QUANTILE: f64 = 0.975;

/// Averages daily compliance curves of one station into a reference signal.
pub struct StationAggregator {
    threshold: f64,
    metrics: MetricsRecorder,
    logger: LogManager,
}

impl Default for StationAggregator {
    fn default() -> Self {
        Self::new(COHERENCE_THRESHOLD)
    }
}

impl StationAggregator {
    pub fn new(threshold: f64) -> Self {
        Self {
            threshold,
            metrics: MetricsRecorder::new(),
            logger: LogManager::for_stage("aggregate"),
        }
    }

    pub fn metrics(&self) -> &MetricsRecorder {
        &self.metrics
    }

    /// Keeps the days whose mean coherence over `band` (edges included)
    /// exceeds the threshold and reduces them to means and 95% bound scales.
    pub fn aggregate(
        &self,
        days: &[ComplianceDay],
        band: FrequencyBand,
    ) -> ComplianceResult<StationReference> {
        let first = days
            .first()
            .ok_or(ComplianceError::EmptyAggregate { total: 0 })?;
        let frequencies = first.frequencies.clone();
        let (low, high) = band.indices(&frequencies)?;

        let mut kept = Vec::new();
        for day in days {
            day.validate()?;
            if day.frequencies.len() != frequencies.len() || day.station != first.station {
                return Err(ComplianceError::InvalidInput(format!(
                    "day {} of {} does not share the frequency axis of {}",
                    day.time_key, day.station, first.station
                )));
            }
            let band_coherence = StatsHelper::mean(&day.coherence[low..=high]);
            if band_coherence > self.threshold {
                self.metrics.record_processed();
                kept.push(day);
            } else {
                self.metrics.record_rejected();
                self.logger.trace(&format!(
                    "{} {} dropped, band coherence {:.3}",
                    day.station, day.time_key, band_coherence
                ));
            }
        }

        if kept.is_empty() {
            self.logger.warn(&format!(
                "{}: none of {} days passed the coherence filter",
                first.station,
                days.len()
            ));
            return Err(ComplianceError::EmptyAggregate { total: days.len() });
        }

        let n = frequencies.len();
        let mut mean_compliance = Vec::with_capacity(n);
        let mut mean_coherence = Vec::with_capacity(n);
        let mut compliance_bounds = Vec::with_capacity(n);
        let mut coherence_bounds = Vec::with_capacity(n);
        for idx in 0..n {
            let compliance: Vec<f64> = kept.iter().map(|day| day.compliance[idx]).collect();
            let coherence: Vec<f64> = kept.iter().map(|day| day.coherence[idx]).collect();
            let (eta, gamma) = (StatsHelper::mean(&compliance), StatsHelper::mean(&coherence));
            mean_compliance.push(eta);
            mean_coherence.push(gamma);
            if idx == 0 {
                compliance_bounds.push([0.0, 0.0]);
                coherence_bounds.push([0.0, 0.0]);
            } else {
                compliance_bounds.push(bound_scales(compliance, eta));
                coherence_bounds.push(bound_scales(coherence, gamma));
            }
        }

        self.logger.record(&format!(
            "{}: {} of {} days kept",
            first.station,
            kept.len(),
            days.len()
        ));

        Ok(StationReference {
            station: first.station.clone(),
            depth: first.depth,
            frequencies,
            band,
            mean_compliance,
            mean_coherence,
            compliance_bounds,
            coherence_bounds,
            days_used: kept.len(),
            days_total: days.len(),
        })
    }
}

fn bound_scales(mut values: Vec<f64>, mean: f64) -> [f64; 2] {
    values.sort_by(f64::total_cmp);
    [
        StatsHelper::interpolated_quantile(&values, LOWER_QUANTILE) / mean,
        StatsHelper::interpolated_quantile(&values, UPPER_QUANTILE) / mean,
    ]
}
