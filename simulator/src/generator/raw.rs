use anyhow::Context;
use compliancecore::records::{DayTraces, RawDay};
use rand::{rngs::StdRng, Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

/// Configuration for a synthetic four-channel station-day.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RawDayConfig {
    pub station: String,
    pub time_key: String,
    pub depth: f64,
    pub sample_rate: f64,
    pub samples: usize,
    /// Infragravity wave frequencies present in the pressure record [Hz].
    pub wave_frequencies: Vec<f64>,
    pub pressure_amplitude: f64,
    /// Ratio of vertical to pressure amplitude.
    pub transfer: f64,
    /// Relative noise level on every channel.
    pub noise: f64,
    /// Start sample and length of a broadband transient added to all channels.
    pub glitch: Option<(usize, usize)>,
    pub seed: u64,
}

impl Default for RawDayConfig {
    fn default() -> Self {
        Self {
            station: "SYN01".into(),
            time_key: "2012.001".into(),
            depth: 2000.0,
            sample_rate: 1.0,
            samples: 86_400,
            wave_frequencies: vec![0.006, 0.009, 0.013, 0.017],
            pressure_amplitude: 100.0,
            transfer: 1e-7,
            noise: 0.05,
            glitch: None,
            seed: 0,
        }
    }
}

fn wave_train(
    rng: &mut StdRng,
    frequencies: &[f64],
    amplitude: f64,
    samples: usize,
    sample_rate: f64,
) -> Vec<f64> {
    let phases: Vec<f64> = frequencies
        .iter()
        .map(|_| rng.gen_range(0.0..2.0 * PI))
        .collect();
    (0..samples)
        .map(|i| {
            let t = i as f64 / sample_rate;
            frequencies
                .iter()
                .zip(&phases)
                .map(|(f, phase)| amplitude * (2.0 * PI * f * t + phase).sin())
                .sum()
        })
        .collect()
}

pub fn build_raw_day(config: &RawDayConfig) -> anyhow::Result<RawDay> {
    if config.samples == 0 || !(config.sample_rate > 0.0) {
        anyhow::bail!("synthetic day needs samples and a positive sample rate");
    }
    let mut rng = StdRng::seed_from_u64(config.seed);
    let n = config.samples;
    let amplitude = config.pressure_amplitude;

    let pressure = wave_train(
        &mut rng,
        &config.wave_frequencies,
        amplitude,
        n,
        config.sample_rate,
    );
    let horizontal_1 = wave_train(&mut rng, &[0.011, 0.05], 1.0, n, config.sample_rate);
    let horizontal_2 = wave_train(&mut rng, &[0.007, 0.08], 1.0, n, config.sample_rate);

    let mut jitter = |scale: f64| {
        let bound = config.noise * scale;
        if bound > 0.0 {
            rng.gen_range(-bound..bound)
        } else {
            0.0
        }
    };
    let mut traces = DayTraces {
        vertical: pressure
            .iter()
            .map(|p| config.transfer * p + jitter(config.transfer * amplitude))
            .collect(),
        pressure: pressure.iter().map(|p| p + jitter(amplitude)).collect(),
        horizontal_1: horizontal_1.iter().map(|h| h + jitter(1.0)).collect(),
        horizontal_2: horizontal_2.iter().map(|h| h + jitter(1.0)).collect(),
    };

    if let Some((start, length)) = config.glitch {
        let end = start
            .checked_add(length)
            .filter(|end| *end <= n)
            .context("glitch extends past the end of the day")?;
        for i in start..end {
            let burst = 50.0 * (2.0 * PI * 0.25 * i as f64).sin();
            traces.pressure[i] += burst * amplitude;
            traces.horizontal_1[i] += burst;
            traces.horizontal_2[i] += burst;
            traces.vertical[i] += burst * config.transfer * amplitude;
        }
    }

    Ok(RawDay {
        station: config.station.clone(),
        time_key: config.time_key.clone(),
        depth: config.depth,
        sample_rate: config.sample_rate,
        traces,
    })
}
