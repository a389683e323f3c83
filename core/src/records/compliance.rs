use crate::prelude::ComplianceResult;
use crate::records::ensure_len;
use serde::{Deserialize, Serialize};

/// Normalized compliance and coherence for one station-day.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComplianceDay {
    pub station: String,
    pub time_key: String,
    pub depth: f64,
    pub frequencies: Vec<f64>,
    pub compliance: Vec<f64>,
    pub coherence: Vec<f64>,
}

impl ComplianceDay {
    pub fn validate(&self) -> ComplianceResult<()> {
        ensure_len("compliance", self.compliance.len(), self.frequencies.len())?;
        ensure_len("coherence", self.coherence.len(), self.frequencies.len())
    }
}
