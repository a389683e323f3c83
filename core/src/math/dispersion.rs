//! Infragravity-wave dispersion, ω² = g·k·tanh(kH).
//!
//! A (3,2) Padé approximant of tanh turns the relation into a quartic in k
//! with only even powers. It beats the shallow-water approximation
//! everywhere, and the deep-water one only while k·H stays below 2.96, so
//! the deep-water wavenumber wins above that limit.

use crate::prelude::{ComplianceError, ComplianceResult};
use num_complex::Complex64;

/// Gravitational acceleration for oceanic settings [m/s²].
pub const GRAVITY: f64 = 9.79329;

/// k·H above which the deep-water wavenumber replaces the quartic root.
pub const DEEP_WATER_LIMIT: f64 = 2.96;

const IMAGINARY_TOLERANCE: f64 = 1e-12;

#[derive(Debug, Clone, Copy)]
pub struct DispersionSolver {
    gravity: f64,
}

impl Default for DispersionSolver {
    fn default() -> Self {
        Self::new()
    }
}

impl DispersionSolver {
    pub fn new() -> Self {
        Self { gravity: GRAVITY }
    }

    /// Wavenumbers [1/m] for each angular frequency in `omega` at `depth` [m].
    pub fn wavenumbers(&self, omega: &[f64], depth: f64) -> ComplianceResult<Vec<f64>> {
        omega
            .iter()
            .map(|&w| self.wavenumber(w, depth))
            .collect()
    }

    pub fn wavenumber(&self, omega: f64, depth: f64) -> ComplianceResult<f64> {
        if !(depth > 0.0) || !depth.is_finite() {
            return Err(ComplianceError::InvalidInput(format!(
                "water depth must be positive, got {depth}"
            )));
        }
        if !(omega >= 0.0) || !omega.is_finite() {
            return Err(ComplianceError::InvalidInput(format!(
                "angular frequency must be non-negative, got {omega}"
            )));
        }
        if omega == 0.0 {
            return Ok(0.0);
        }

        let k_deep = omega * omega / self.gravity;
        if k_deep * depth > DEEP_WATER_LIMIT {
            return Ok(k_deep);
        }

        select_positive_root(&self.quartic_roots(omega, depth), omega, depth)
    }

    /// Quartic coefficients in ascending order of power of k.
    pub fn quartic_coefficients(&self, omega: f64, depth: f64) -> [f64; 5] {
        let w2 = omega * omega;
        [
            -27.0 * w2 / self.gravity,
            0.0,
            27.0 * depth - 9.0 * w2 * depth * depth / self.gravity,
            0.0,
            depth.powi(3),
        ]
    }

    /// All four roots of the quartic. With no odd terms it is a quadratic in
    /// u = k², whose two roots each contribute ±√u.
    pub fn quartic_roots(&self, omega: f64, depth: f64) -> [Complex64; 4] {
        let [c, _, b, _, a] = self.quartic_coefficients(omega, depth);
        let discriminant = Complex64::new(b * b - 4.0 * a * c, 0.0).sqrt();
        let b = Complex64::new(b, 0.0);
        // Cancellation-free pairing of the quadratic roots.
        let q = if b.re >= 0.0 {
            -0.5 * (b + discriminant)
        } else {
            -0.5 * (b - discriminant)
        };
        let u1 = q / a;
        let u2 = if q.norm() > 0.0 {
            Complex64::new(c, 0.0) / q
        } else {
            Complex64::new(0.0, 0.0)
        };
        let (r1, r2) = (u1.sqrt(), u2.sqrt());
        [r1, -r1, r2, -r2]
    }
}

/// The single positive real root among `roots`.
///
/// The k² roots of the quartic have a negative product, so in exact
/// arithmetic exactly one candidate survives. Rounding near a double root
/// can break that, and then no root is picked.
fn select_positive_root(roots: &[Complex64], omega: f64, depth: f64) -> ComplianceResult<f64> {
    let candidates: Vec<f64> = roots
        .iter()
        .filter(|root| root.re > 0.0 && root.im.abs() <= IMAGINARY_TOLERANCE * root.re)
        .map(|root| root.re)
        .collect();

    match candidates.as_slice() {
        [k] => Ok(*k),
        [] => Err(ComplianceError::NoPositiveRoot { omega, depth }),
        many => Err(ComplianceError::AmbiguousRoot {
            omega,
            depth,
            count: many.len(),
        }),
    }
}

/// Convenience wrapper using standard oceanic gravity.
pub fn wavenumbers(omega: &[f64], depth: f64) -> ComplianceResult<Vec<f64>> {
    DispersionSolver::new().wavenumbers(omega, depth)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn exact_residual(k: f64, omega: f64, depth: f64) -> f64 {
        (GRAVITY * k * (k * depth).tanh() - omega * omega).abs() / (omega * omega)
    }

    #[test]
    fn zero_frequency_has_zero_wavenumber() {
        let k = wavenumbers(&[0.0, 0.0], 2000.0).unwrap();
        assert_eq!(k, vec![0.0, 0.0]);
    }

    #[test]
    fn deep_water_branch_is_exact() {
        let omega = 2.0 * std::f64::consts::PI * 0.05;
        let depth = 4000.0;
        let k_deep = omega * omega / GRAVITY;
        assert!(k_deep * depth > DEEP_WATER_LIMIT);
        assert_eq!(wavenumbers(&[omega], depth).unwrap()[0], k_deep);
    }

    #[test]
    fn quartic_branch_satisfies_dispersion_relation() {
        let depth = 2015.0;
        for f in [0.002, 0.007, 0.015, 0.024] {
            let omega = 2.0 * std::f64::consts::PI * f;
            let k = DispersionSolver::new().wavenumber(omega, depth).unwrap();
            assert!(k > 0.0);
            assert!(k * depth <= DEEP_WATER_LIMIT || k == omega * omega / GRAVITY);
            assert!(exact_residual(k, omega, depth) < 0.01);
        }
    }

    #[test]
    fn quartic_roots_annihilate_polynomial() {
        let solver = DispersionSolver::new();
        let (omega, depth) = (0.05, 1000.0);
        let coeffs = solver.quartic_coefficients(omega, depth);
        for root in solver.quartic_roots(omega, depth) {
            let value = coeffs
                .iter()
                .rev()
                .fold(Complex64::new(0.0, 0.0), |acc, &c| acc * root + c);
            assert!(value.norm() < 1e-9 * coeffs[0].abs().max(1.0));
        }
    }

    #[test]
    fn wavenumbers_are_non_negative_across_depths() {
        for depth in [10.0, 100.0, 1000.0, 5000.0] {
            let omega: Vec<f64> = (0..50).map(|i| i as f64 * 0.01).collect();
            let k = wavenumbers(&omega, depth).unwrap();
            assert!(k.iter().all(|&value| value >= 0.0));
        }
    }

    #[test]
    fn shallow_limit_approaches_long_wave_speed() {
        let depth = 50.0;
        let omega = 1e-3;
        let k = wavenumbers(&[omega], depth).unwrap()[0];
        assert_relative_eq!(k, omega / (GRAVITY * depth).sqrt(), max_relative = 1e-4);
    }

    #[test]
    fn root_selection_keeps_the_single_positive_real_root() {
        let roots = [
            Complex64::new(-2.0e-5, 0.0),
            Complex64::new(2.0e-5, 0.0),
            Complex64::new(0.0, 3.0e-5),
            Complex64::new(0.0, -3.0e-5),
        ];
        assert_eq!(select_positive_root(&roots, 0.1, 1000.0).unwrap(), 2.0e-5);
    }

    #[test]
    fn root_selection_refuses_missing_or_repeated_roots() {
        let imaginary = [Complex64::new(1.0e-5, 1.0e-6), Complex64::new(-1.0e-5, 0.0)];
        assert!(matches!(
            select_positive_root(&imaginary, 0.1, 1000.0),
            Err(ComplianceError::NoPositiveRoot { .. })
        ));

        let twin = [Complex64::new(1.0e-5, 0.0), Complex64::new(1.5e-5, 0.0)];
        assert!(matches!(
            select_positive_root(&twin, 0.1, 1000.0),
            Err(ComplianceError::AmbiguousRoot { count: 2, .. })
        ));
    }

    #[test]
    fn invalid_depth_is_rejected() {
        assert!(matches!(
            wavenumbers(&[0.1], 0.0),
            Err(ComplianceError::InvalidInput(_))
        ));
    }
}
