use crate::math::stats::StatsHelper;
use crate::prelude::{ComplianceError, ComplianceResult};
use crate::records::ensure_len;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Frequency window over which compliance is measurable at a station [Hz].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FrequencyBand {
    pub low_hz: f64,
    pub high_hz: f64,
}

impl FrequencyBand {
    pub fn new(low_hz: f64, high_hz: f64) -> ComplianceResult<Self> {
        if !(low_hz >= 0.0) || !(high_hz > low_hz) {
            return Err(ComplianceError::InvalidInput(format!(
                "frequency band [{low_hz}, {high_hz}] is empty or negative"
            )));
        }
        Ok(Self { low_hz, high_hz })
    }

    /// Indices of the frequencies in `axis` closest to each band edge.
    pub fn indices(&self, axis: &[f64]) -> ComplianceResult<(usize, usize)> {
        let low = StatsHelper::idx_of_closest(self.low_hz, axis);
        let high = StatsHelper::idx_of_closest(self.high_hz, axis);
        match (low, high) {
            (Some(low), Some(high)) => Ok((low, high)),
            _ => Err(ComplianceError::InvalidInput(
                "frequency axis is empty".into(),
            )),
        }
    }

    /// `count` frequencies evenly spaced across the band, edges included.
    pub fn linspace(&self, count: usize) -> Vec<f64> {
        StatsHelper::linspace(self.low_hz, self.high_hz, count)
    }
}

/// Station-averaged compliance and coherence with their empirical 95%
/// confidence bounds, expressed as scale factors of the means.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StationReference {
    pub station: String,
    pub depth: f64,
    pub frequencies: Vec<f64>,
    pub band: FrequencyBand,
    pub mean_compliance: Vec<f64>,
    pub mean_coherence: Vec<f64>,
    /// Per frequency `[lower, upper]` as multiples of `mean_compliance`.
    pub compliance_bounds: Vec<[f64; 2]>,
    pub coherence_bounds: Vec<[f64; 2]>,
    pub days_used: usize,
    pub days_total: usize,
}

impl StationReference {
    /// Reference for a hypothetical station with perfect coherence and no
    /// noise, for purely synthetic experiments.
    pub fn synthetic(
        station: impl Into<String>,
        depth: f64,
        band: FrequencyBand,
        frequencies: Vec<f64>,
    ) -> Self {
        let n = frequencies.len();
        Self {
            station: station.into(),
            depth,
            frequencies,
            band,
            mean_compliance: vec![0.0; n],
            mean_coherence: vec![1.0; n],
            compliance_bounds: vec![[1.0, 1.0]; n],
            coherence_bounds: vec![[1.0, 1.0]; n],
            days_used: 0,
            days_total: 0,
        }
    }

    pub fn validate(&self) -> ComplianceResult<()> {
        if !(self.depth > 0.0) {
            return Err(ComplianceError::InvalidInput(format!(
                "station {} depth must be positive, got {}",
                self.station, self.depth
            )));
        }
        let n = self.frequencies.len();
        ensure_len("mean_compliance", self.mean_compliance.len(), n)?;
        ensure_len("mean_coherence", self.mean_coherence.len(), n)?;
        ensure_len("compliance_bounds", self.compliance_bounds.len(), n)?;
        ensure_len("coherence_bounds", self.coherence_bounds.len(), n)
    }

    /// Mean compliance sampled at the frequencies closest to `targets`.
    pub fn compliance_at(&self, targets: &[f64]) -> ComplianceResult<Vec<f64>> {
        targets
            .iter()
            .map(|&f| {
                StatsHelper::idx_of_closest(f, &self.frequencies)
                    .map(|idx| self.mean_compliance[idx])
                    .ok_or_else(|| {
                        ComplianceError::InvalidInput(format!(
                            "station {} has no frequency axis",
                            self.station
                        ))
                    })
            })
            .collect()
    }
}

/// Immutable set of station references keyed by station name.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StationCatalog {
    stations: BTreeMap<String, StationReference>,
}

impl StationCatalog {
    pub fn from_references<I>(references: I) -> ComplianceResult<Self>
    where
        I: IntoIterator<Item = StationReference>,
    {
        let mut stations = BTreeMap::new();
        for reference in references {
            reference.validate()?;
            if stations.contains_key(&reference.station) {
                return Err(ComplianceError::InvalidInput(format!(
                    "duplicate station {}",
                    reference.station
                )));
            }
            stations.insert(reference.station.clone(), reference);
        }
        Ok(Self { stations })
    }

    pub fn get(&self, station: &str) -> Option<&StationReference> {
        self.stations.get(station)
    }

    pub fn iter(&self) -> impl Iterator<Item = &StationReference> {
        self.stations.values()
    }

    pub fn len(&self) -> usize {
        self.stations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stations.is_empty()
    }
}
