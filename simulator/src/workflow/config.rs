use anyhow::Context;
use compliancecore::prelude::SpectralConfig;
use compliancecore::processing::aggregate::COHERENCE_THRESHOLD;
use compliancecore::processing::{GeneratorConfig, InversionConfig};
use compliancecore::records::FrequencyBand;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkflowConfig {
    pub spectral: SpectralConfig,
    pub generator: GeneratorConfig,
    pub inversion: InversionConfig,
    pub coherence_threshold: f64,
    /// Training and test examples generated per station.
    pub train_count: usize,
    pub test_count: usize,
    /// Compliance band per station; stations not listed use `default_band`.
    pub stations: BTreeMap<String, FrequencyBand>,
    pub default_band: FrequencyBand,
}

impl Default for WorkflowConfig {
    fn default() -> Self {
        Self {
            spectral: SpectralConfig::default(),
            generator: GeneratorConfig::default(),
            inversion: InversionConfig::default(),
            coherence_threshold: COHERENCE_THRESHOLD,
            train_count: 1000,
            test_count: 100,
            stations: BTreeMap::new(),
            default_band: FrequencyBand {
                low_hz: 0.004,
                high_hz: 0.02,
            },
        }
    }
}

impl WorkflowConfig {
    pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path_ref = path.as_ref();
        let contents = fs::read_to_string(path_ref)
            .with_context(|| format!("reading workflow config {}", path_ref.display()))?;
        let config: WorkflowConfig = serde_yaml::from_str(&contents)
            .with_context(|| format!("parsing workflow config {}", path_ref.display()))?;
        Ok(config)
    }

    /// Defaults with the command-line seed applied to every randomized stage.
    pub fn from_args(seed: u64) -> Self {
        let mut config = Self::default();
        config.generator.seed = seed;
        config.inversion.seed = seed;
        config
    }

    pub fn band_for(&self, station: &str) -> anyhow::Result<FrequencyBand> {
        let band = self.stations.get(station).copied().unwrap_or(self.default_band);
        FrequencyBand::new(band.low_hz, band.high_hz)
            .with_context(|| format!("compliance band of station {station}"))
    }

    /// Generator settings for the train or test split; the test split uses
    /// the next seed so the two never share draws.
    pub fn generator_for_split(&self, test: bool) -> GeneratorConfig {
        let mut config = self.generator.clone();
        if test {
            config.seed = config.seed.wrapping_add(1);
        }
        config
    }
}
