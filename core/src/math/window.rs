use std::f64::consts::PI;

/// Symmetric Hann window of `length` samples (unit peak, zero end points).
pub fn hanning(length: usize) -> Vec<f64> {
    match length {
        0 => Vec::new(),
        1 => vec![1.0],
        _ => {
            let denom = (length - 1) as f64;
            (0..length)
                .map(|i| 0.5 - 0.5 * (2.0 * PI * i as f64 / denom).cos())
                .collect()
        }
    }
}

/// Window that is flat in the middle and Hann-tapered only across the
/// `overlap` samples at each end.
pub fn overlap_taper(length: usize, overlap: usize) -> Vec<f64> {
    let overlap = overlap.min(length / 2);
    let mut window = vec![1.0; length];
    if overlap == 0 {
        return window;
    }
    let hann = hanning(2 * overlap);
    window[..overlap].copy_from_slice(&hann[..overlap]);
    window[length - overlap..].copy_from_slice(&hann[overlap..]);
    window
}

/// Number of full segments of `length` samples, advancing by
/// `length - overlap`, that fit into `total` samples.
pub fn segment_count(total: usize, length: usize, overlap: usize) -> usize {
    if length == 0 || overlap >= length || total < length {
        return 0;
    }
    (total - overlap) / (length - overlap)
}
