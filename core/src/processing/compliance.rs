//! Normalized compliance and coherence from daily spectra.
//!
//! Horizontal-motion noise is conditioned out of the pressure-vertical
//! relationship in a fixed order: first the linear contribution of
//! horizontal 1 is removed from horizontal 2, pressure and vertical, then the
//! contribution of the (already partialled) horizontal 2 is removed from
//! pressure and vertical.

use crate::math::dispersion::DispersionSolver;
use crate::prelude::{ComplianceError, ComplianceResult};
use crate::records::{ComplianceDay, SpectralDay};
use crate::telemetry::log::LogManager;
use num_complex::Complex64;
use std::f64::consts::PI;

/// `|Gxy| / Gxx`, the transfer-function magnitude from x to y.
pub fn admittance(gxy: &[Complex64], gxx: &[f64]) -> ComplianceResult<Vec<f64>> {
    ensure_nonzero_complex(gxy, "cross-spectrum")?;
    ensure_nonzero(gxx, "auto-spectrum")?;
    Ok(gxy.iter().zip(gxx).map(|(xy, xx)| xy.norm() / xx).collect())
}

/// `|Gxy|² / (Gxx·Gyy)`, the squared coherence between x and y.
pub fn coherence(gxy: &[Complex64], gxx: &[f64], gyy: &[f64]) -> ComplianceResult<Vec<f64>> {
    ensure_nonzero_complex(gxy, "cross-spectrum")?;
    ensure_nonzero(gxx, "first auto-spectrum")?;
    ensure_nonzero(gyy, "second auto-spectrum")?;
    Ok(gxy
        .iter()
        .zip(gxx.iter().zip(gyy))
        .map(|(xy, (xx, yy))| xy.norm_sqr() / (xx * yy))
        .collect())
}

/// Phase angle of a cross-spectrum [rad].
pub fn phase(gxy: &[Complex64]) -> ComplianceResult<Vec<f64>> {
    ensure_nonzero_complex(gxy, "cross-spectrum")?;
    Ok(gxy.iter().map(|xy| xy.arg()).collect())
}

fn ensure_nonzero(values: &[f64], name: &'static str) -> ComplianceResult<()> {
    if values.iter().any(|&v| v != 0.0) {
        Ok(())
    } else {
        Err(ComplianceError::DegenerateSpectrum(name))
    }
}

fn ensure_nonzero_complex(values: &[Complex64], name: &'static str) -> ComplianceResult<()> {
    if values.iter().any(|v| v.re != 0.0 || v.im != 0.0) {
        Ok(())
    } else {
        Err(ComplianceError::DegenerateSpectrum(name))
    }
}

pub struct ComplianceCoherence {
    solver: DispersionSolver,
    logger: LogManager,
}

impl Default for ComplianceCoherence {
    fn default() -> Self {
        Self::new(DispersionSolver::new())
    }
}

impl ComplianceCoherence {
    pub fn new(solver: DispersionSolver) -> Self {
        Self {
            solver,
            logger: LogManager::for_stage("compliance"),
        }
    }

    pub fn derive(&self, day: &SpectralDay) -> ComplianceResult<ComplianceDay> {
        day.validate()?;
        let n = day.len();

        // Condition on horizontal 1.
        let coh_12 = coherence(&day.c_12, &day.c_11, &day.c_22)?;
        let coh_1p = coherence(&day.c_1p, &day.c_11, &day.c_pp)?;
        let coh_1z = coherence(&day.c_1z, &day.c_11, &day.c_zz)?;

        let mut g22_1 = Vec::with_capacity(n);
        let mut gpp_1 = Vec::with_capacity(n);
        let mut gzz_1 = Vec::with_capacity(n);
        let mut g2z_1 = Vec::with_capacity(n);
        let mut gpz_1 = Vec::with_capacity(n);
        let mut g2p_1 = Vec::with_capacity(n);
        for i in 0..n {
            let l12 = day.c_12[i].conj() / day.c_11[i];
            let l1p = day.c_1p[i].conj() / day.c_11[i];
            g22_1.push(day.c_22[i] * (1.0 - coh_12[i]));
            gpp_1.push(day.c_pp[i] * (1.0 - coh_1p[i]));
            gzz_1.push(day.c_zz[i] * (1.0 - coh_1z[i]));
            g2z_1.push(day.c_2z[i].conj() - (l12 * day.c_1z[i]).conj());
            gpz_1.push(day.c_zp[i] - (l1p * day.c_1z[i]).conj());
            g2p_1.push(day.c_2p[i].conj() - (l12 * day.c_1p[i]).conj());
        }

        // Condition on horizontal 2.
        let coh_2p_1 = coherence(&g2p_1, &g22_1, &gpp_1)?;
        let coh_2z_1 = coherence(&g2z_1, &g22_1, &gzz_1)?;

        let mut gpp_12 = Vec::with_capacity(n);
        let mut gpz_12 = Vec::with_capacity(n);
        let mut gzz_12 = Vec::with_capacity(n);
        for i in 0..n {
            let l2p_1 = g2p_1[i] / g22_1[i];
            gpp_12.push(gpp_1[i] * (1.0 - coh_2p_1[i]));
            gpz_12.push(gpz_1[i] - l2p_1.conj() * g2z_1[i]);
            gzz_12.push(gzz_1[i] * (1.0 - coh_2z_1[i]));
        }

        let omega: Vec<f64> = day.frequencies.iter().map(|f| 2.0 * PI * f).collect();
        let wavenumbers = self.solver.wavenumbers(&omega, day.depth)?;
        let compliance = admittance(&gpz_12, &gpp_12)?
            .into_iter()
            .zip(&wavenumbers)
            .map(|(adm, k)| adm * k)
            .collect();
        let coherence = coherence(&gpz_12, &gpp_12, &gzz_12)?;

        self.logger
            .trace(&format!("{} {}: derived {} bins", day.station, day.time_key, n));

        Ok(ComplianceDay {
            station: day.station.clone(),
            time_key: day.time_key.clone(),
            depth: day.depth,
            frequencies: day.frequencies.clone(),
            compliance,
            coherence,
        })
    }
}
