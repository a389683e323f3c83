use ndarray::{Array2, Axis};

/// Boxcar moving average of width `width`, keeping the input length and
/// centring the kernel the same way a `same`-mode convolution does.
pub fn boxcar(data: &[f64], width: usize) -> Vec<f64> {
    if width <= 1 || data.is_empty() {
        return data.to_vec();
    }
    let n = data.len() as isize;
    let width_i = width as isize;
    let offset = (width_i - 1) / 2;
    let scale = 1.0 / width as f64;

    let mut prefix = Vec::with_capacity(data.len() + 1);
    prefix.push(0.0);
    for value in data {
        let last = prefix[prefix.len() - 1];
        prefix.push(last + value);
    }

    (0..n)
        .map(|i| {
            let end = (i + offset).min(n - 1);
            let start = (i + offset - (width_i - 1)).max(0);
            (prefix[(end + 1) as usize] - prefix[start as usize]) * scale
        })
        .collect()
}

/// Applies [`boxcar`] independently to every column of `data`.
pub fn boxcar_columns(data: &Array2<f64>, width: usize) -> Array2<f64> {
    let mut smoothed = data.clone();
    for mut column in smoothed.axis_iter_mut(Axis(1)) {
        let values: Vec<f64> = column.iter().copied().collect();
        for (target, value) in column.iter_mut().zip(boxcar(&values, width)) {
            *target = value;
        }
    }
    smoothed
}
