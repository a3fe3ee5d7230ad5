use crate::{
    engine::{bridge::BridgeCommand, frame::FrameOptions},
    error::{CapError, CapResult},
    scenario::{
        EmployeeResponse, ScenarioParameters, DEFAULT_CAP, DEFAULT_EMPLOYER_NI_RATE,
        DEFAULT_TARGETED_HAIRCUT_RATE, DEFAULT_YEAR,
    },
    types::{Gbp, Year},
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const DEFAULT_SYNTHETIC_HOUSEHOLDS: usize = 2000;
pub const DEFAULT_SYNTHETIC_SEED: u64 = 42;

/// Which simulation backend to run against.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EngineSpec {
    /// Frame engine over a dataset file.
    Frame { dataset: PathBuf },
    /// Frame engine over a seeded synthetic population.
    Synthetic { households: usize, seed: u64 },
    /// External engine process.
    Bridge(BridgeCommand),
}

impl Default for EngineSpec {
    fn default() -> Self {
        Self::Synthetic {
            households: DEFAULT_SYNTHETIC_HOUSEHOLDS,
            seed:       DEFAULT_SYNTHETIC_SEED,
        }
    }
}

/// Values used when the command line does not give one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScenarioDefaults {
    pub cap:                   Gbp,
    pub year:                  Year,
    pub employer_ni_rate:      f64,
    /// Redirect rate for partial-redirect scenarios run without an
    /// explicit rate. None makes the rate mandatory.
    pub pension_redirect_rate: Option<f64>,
    pub targeted_haircut_rate: f64,
}

impl Default for ScenarioDefaults {
    fn default() -> Self {
        Self {
            cap:                   DEFAULT_CAP,
            year:                  DEFAULT_YEAR,
            employer_ni_rate:      DEFAULT_EMPLOYER_NI_RATE,
            pension_redirect_rate: None,
            targeted_haircut_rate: DEFAULT_TARGETED_HAIRCUT_RATE,
        }
    }
}

impl ScenarioDefaults {
    /// Carry the configured rates onto `params`.
    pub fn apply(&self, params: ScenarioParameters) -> CapResult<ScenarioParameters> {
        params
            .with_employer_ni_rate(self.employer_ni_rate)?
            .with_targeted_haircut_rate(self.targeted_haircut_rate)
    }

    /// Settle the redirect rate: `explicit` wins over the configured one.
    /// Partial redirect must end up with a rate, and no other employee
    /// response may be given one.
    pub fn apply_redirect(
        &self,
        params: ScenarioParameters,
        explicit: Option<f64>,
    ) -> CapResult<ScenarioParameters> {
        match params.employee_response() {
            EmployeeResponse::PartialRedirect => match explicit.or(self.pension_redirect_rate) {
                Some(rate) => params.with_pension_redirect_rate(rate),
                None => Err(CapError::RedirectRateRequired),
            },
            other if explicit.is_some() => Err(CapError::RedirectRateUnused(other.as_str())),
            _ => Ok(params),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    pub defaults:                     ScenarioDefaults,
    pub engine:                       EngineSpec,
    pub output_dir:                   PathBuf,
    pub net_income_includes_pensions: bool,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            defaults:                     ScenarioDefaults::default(),
            engine:                       EngineSpec::default(),
            output_dir:                   PathBuf::from("outputs"),
            net_income_includes_pensions: false,
        }
    }
}

impl AnalysisConfig {
    /// Load from a JSON file. Missing fields take their defaults.
    /// In tests, use AnalysisConfig::default_test().
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("Cannot read {}: {e}", path.display()))?;
        let config: AnalysisConfig = serde_json::from_str(&content)
            .map_err(|e| anyhow::anyhow!("Cannot parse {}: {e}", path.display()))?;
        Ok(config)
    }

    /// Small, fast configuration for tests.
    pub fn default_test() -> Self {
        Self {
            engine: EngineSpec::Synthetic { households: 200, seed: 7 },
            ..Self::default()
        }
    }

    pub fn frame_options(&self) -> FrameOptions {
        FrameOptions {
            net_income_includes_pensions: self.net_income_includes_pensions,
        }
    }
}
