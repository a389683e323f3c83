use crate::prelude::{ComplianceError, ComplianceResult};
use crate::records::ensure_len;
use num_complex::Complex64;
use serde::{Deserialize, Serialize};

/// One station-day of pre-cleaned OBS records, all at the same sampling rate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DayTraces {
    pub pressure: Vec<f64>,
    pub horizontal_1: Vec<f64>,
    pub horizontal_2: Vec<f64>,
    pub vertical: Vec<f64>,
}

impl DayTraces {
    /// Channels in the fixed processing order P, 1, 2, Z.
    pub fn channels(&self) -> [&[f64]; 4] {
        [
            &self.pressure,
            &self.horizontal_1,
            &self.horizontal_2,
            &self.vertical,
        ]
    }

    pub(crate) fn channels_mut(&mut self) -> [&mut Vec<f64>; 4] {
        [
            &mut self.pressure,
            &mut self.horizontal_1,
            &mut self.horizontal_2,
            &mut self.vertical,
        ]
    }
}

/// Raw input for one station-day.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawDay {
    pub station: String,
    pub time_key: String,
    /// Station depth, positive down [m].
    pub depth: f64,
    pub sample_rate: f64,
    pub traces: DayTraces,
}

/// Daily-averaged auto- and cross-spectral densities between the four
/// components of one station.
///
/// Cross-spectra follow the `c_xy = mean(X · conj(Y))` convention.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpectralDay {
    pub station: String,
    pub time_key: String,
    /// Station depth, positive down [m].
    pub depth: f64,
    pub frequencies: Vec<f64>,
    pub c_pp: Vec<f64>,
    pub c_11: Vec<f64>,
    pub c_22: Vec<f64>,
    pub c_zz: Vec<f64>,
    pub c_12: Vec<Complex64>,
    pub c_1z: Vec<Complex64>,
    pub c_2z: Vec<Complex64>,
    pub c_1p: Vec<Complex64>,
    pub c_2p: Vec<Complex64>,
    pub c_zp: Vec<Complex64>,
    pub retained_windows: usize,
}

impl SpectralDay {
    pub fn len(&self) -> usize {
        self.frequencies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frequencies.is_empty()
    }

    pub fn validate(&self) -> ComplianceResult<()> {
        if !(self.depth > 0.0) || !self.depth.is_finite() {
            return Err(ComplianceError::InvalidInput(format!(
                "{} {}: depth must be positive, got {}",
                self.station, self.time_key, self.depth
            )));
        }
        let n = self.frequencies.len();
        for (name, values) in [
            ("c_pp", &self.c_pp),
            ("c_11", &self.c_11),
            ("c_22", &self.c_22),
            ("c_zz", &self.c_zz),
        ] {
            ensure_len(name, values.len(), n)?;
        }
        for (name, values) in [
            ("c_12", &self.c_12),
            ("c_1z", &self.c_1z),
            ("c_2z", &self.c_2z),
            ("c_1p", &self.c_1p),
            ("c_2p", &self.c_2p),
            ("c_zp", &self.c_zp),
        ] {
            ensure_len(name, values.len(), n)?;
        }
        Ok(())
    }
}
