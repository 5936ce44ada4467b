use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct StopLossConfig {
    /// Shift applied to the candidate after each overlap, in basis points.
    pub step_bps: u32,
    pub max_iterations: u32,
}

impl Default for StopLossConfig {
    fn default() -> Self { Self { step_bps: 50, max_iterations: 1_000 } }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct SearchConfig {
    pub max_iterations: u32,
    /// Interval width (token base units) at which the search counts as converged.
    pub precision: u64,
}

impl Default for SearchConfig {
    // 0.01 token at 6 decimals
    fn default() -> Self { Self { max_iterations: 15, precision: 10_000 } }
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct SimulatorConfig {
    pub stop_loss: StopLossConfig,
    pub search: SearchConfig,
}

impl SimulatorConfig {
    pub fn from_json(s: &str) -> serde_json::Result<Self> { serde_json::from_str(s) }
}
