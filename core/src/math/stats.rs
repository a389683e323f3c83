pub struct StatsHelper;

impl StatsHelper {
    pub fn mean(samples: &[f64]) -> f64 {
        if samples.is_empty() {
            return f64::NAN;
        }
        samples.iter().sum::<f64>() / samples.len() as f64
    }

    /// Population standard deviation (divides by `n`).
    pub fn std(samples: &[f64]) -> f64 {
        Self::std_ddof(samples, 0)
    }

    /// Standard deviation with `ddof` delta degrees of freedom.
    pub fn std_ddof(samples: &[f64], ddof: usize) -> f64 {
        if samples.len() <= ddof {
            return f64::NAN;
        }
        let mean = Self::mean(samples);
        let sum_sq: f64 = samples.iter().map(|v| (v - mean) * (v - mean)).sum();
        (sum_sq / (samples.len() - ddof) as f64).sqrt()
    }

    pub fn median(samples: &[f64]) -> f64 {
        if samples.is_empty() {
            return f64::NAN;
        }
        let mut sorted = samples.to_vec();
        sorted.sort_by(f64::total_cmp);
        let mid = sorted.len() / 2;
        if sorted.len() % 2 == 0 {
            0.5 * (sorted[mid - 1] + sorted[mid])
        } else {
            sorted[mid]
        }
    }

    pub fn l2_norm(samples: &[f64]) -> f64 {
        samples.iter().map(|v| v * v).sum::<f64>().sqrt()
    }

    /// Quantile `q` of already sorted observations, linearly interpolating an
    /// empirical CDF whose support is evenly spaced on [0, 1].
    pub fn interpolated_quantile(sorted: &[f64], q: f64) -> f64 {
        match sorted.len() {
            0 => f64::NAN,
            1 => sorted[0],
            n => {
                let position = q.clamp(0.0, 1.0) * (n - 1) as f64;
                let lower = position.floor() as usize;
                let upper = (lower + 1).min(n - 1);
                let frac = position - lower as f64;
                sorted[lower] + frac * (sorted[upper] - sorted[lower])
            }
        }
    }

    /// Index of the element of `values` nearest to `target`; ties go to the first.
    pub fn idx_of_closest(target: f64, values: &[f64]) -> Option<usize> {
        values
            .iter()
            .enumerate()
            .min_by(|(_, a), (_, b)| (target - **a).abs().total_cmp(&(target - **b).abs()))
            .map(|(idx, _)| idx)
    }

    /// `count` evenly spaced values over [start, stop], both ends included.
    pub fn linspace(start: f64, stop: f64, count: usize) -> Vec<f64> {
        match count {
            0 => Vec::new(),
            1 => vec![start],
            _ => {
                let step = (stop - start) / (count - 1) as f64;
                (0..count).map(|i| start + step * i as f64).collect()
            }
        }
    }
}
