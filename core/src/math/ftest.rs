use statrs::distribution::{ContinuousCDF, FisherSnedecor};

/// Two-sided F-test comparing the residual variance of two fits.
///
/// `pars1`/`pars2` are the number of fitted parameters consumed by each set
/// of residuals. Returns the p-value of the variance ratio; degenerate inputs
/// (no degrees of freedom left) report 1.0, i.e. no significant difference.
pub fn variance_ratio_p_value(res1: &[f64], pars1: usize, res2: &[f64], pars2: usize) -> f64 {
    if res1.len() <= pars1 || res2.len() <= pars2 {
        return 1.0;
    }
    let dof1 = (res1.len() - pars1) as f64;
    let dof2 = (res2.len() - pars2) as f64;

    let energy1: f64 = res1.iter().map(|r| r * r).sum();
    let energy2: f64 = res2.iter().map(|r| r * r).sum();
    if energy1 == 0.0 && energy2 == 0.0 {
        return 1.0;
    }
    if energy2 == 0.0 {
        return 0.0;
    }

    let f_obs = (energy1 / dof1) / (energy2 / dof2);
    let distribution = match FisherSnedecor::new(dof1, dof2) {
        Ok(distribution) => distribution,
        Err(_) => return 1.0,
    };
    let inverse = if f_obs > 0.0 { 1.0 / f_obs } else { f64::INFINITY };
    1.0 - (cdf_or_limit(&distribution, f_obs) - cdf_or_limit(&distribution, inverse))
}

fn cdf_or_limit(distribution: &FisherSnedecor, x: f64) -> f64 {
    if x.is_infinite() {
        1.0
    } else {
        distribution.cdf(x)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn identical_residuals_are_not_significant() {
        let res = [1.0, -2.0, 0.5, 3.0, -1.5];
        assert_relative_eq!(variance_ratio_p_value(&res, 1, &res, 1), 1.0, epsilon = 1e-12);
    }

    #[test]
    fn large_variance_ratio_is_significant() {
        let wide = [10.0, -10.0, 10.0, -10.0, 10.0, -10.0];
        let narrow = [1.0, -1.0, 1.0, -1.0, 1.0, -1.0];
        assert!(variance_ratio_p_value(&wide, 1, &narrow, 1) < 0.05);
    }

    #[test]
    fn exhausted_degrees_of_freedom_report_no_difference() {
        assert_eq!(variance_ratio_p_value(&[1.0], 1, &[1.0, 2.0], 1), 1.0);
    }
}
