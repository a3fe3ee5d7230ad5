//! Scenario parameter sets — one point in the behavioural matrix.
//!
//! A scenario pairs a cap amount and tax year with two behavioural
//! assumptions:
//!
//!   Employer response (who pays the extra employer NI):
//!     - SpreadCost:      cost spread as a uniform pay haircut on all employees
//!     - AbsorbCost:      employer absorbs the full cost
//!     - TargetedHaircut: haircut on the affected employees' excess only
//!
//!   Employee response (what happens to the excess above the cap):
//!     - MaintainPension: excess redirected to employee pension contributions
//!     - TakeCash:        excess taken as taxable pay
//!     - PartialRedirect: a fixed fraction redirected, the rest taken as pay
//!
//! RULE: parameters are immutable once built. Every `with_*` method
//! validates and returns a new value.

use crate::{
    error::{CapError, CapResult},
    types::{Gbp, Year},
};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

pub const DEFAULT_CAP: Gbp = 2000.0;
pub const DEFAULT_YEAR: Year = 2026;
pub const DEFAULT_EMPLOYER_NI_RATE: f64 = 0.138;
pub const DEFAULT_PENSION_REDIRECT_RATE: f64 = 1.0;
pub const DEFAULT_TARGETED_HAIRCUT_RATE: f64 = 0.13;

/// Years accepted before the engine is consulted. The engine may still
/// reject a year inside this window if it has no rules for it.
pub const MIN_YEAR: Year = 2000;
pub const MAX_YEAR: Year = 2100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmployerResponse {
    SpreadCost,
    AbsorbCost,
    TargetedHaircut,
}

impl EmployerResponse {
    /// Stable snake_case identifier, used in scenario names and exports.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SpreadCost      => "spread_cost",
            Self::AbsorbCost      => "absorb_cost",
            Self::TargetedHaircut => "targeted_haircut",
        }
    }

    fn short_label(&self) -> &'static str {
        match self {
            Self::SpreadCost      => "Spread",
            Self::AbsorbCost      => "Absorb",
            Self::TargetedHaircut => "Targeted",
        }
    }
}

impl fmt::Display for EmployerResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EmployerResponse {
    type Err = CapError;

    /// Accepts the CLI tokens (`spread`, `absorb`, `targeted`) and the
    /// snake_case identifiers.
    fn from_str(s: &str) -> CapResult<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "spread" | "spread_cost"        => Ok(Self::SpreadCost),
            "absorb" | "absorb_cost"        => Ok(Self::AbsorbCost),
            "targeted" | "targeted_haircut" => Ok(Self::TargetedHaircut),
            _ => Err(CapError::UnknownEmployerResponse(s.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmployeeResponse {
    MaintainPension,
    TakeCash,
    PartialRedirect,
}

impl EmployeeResponse {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::MaintainPension => "maintain_pension",
            Self::TakeCash        => "take_cash",
            Self::PartialRedirect => "partial_redirect",
        }
    }

    fn short_label(&self) -> &'static str {
        match self {
            Self::MaintainPension => "Maintain",
            Self::TakeCash        => "TakeCash",
            Self::PartialRedirect => "Partial",
        }
    }
}

impl fmt::Display for EmployeeResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EmployeeResponse {
    type Err = CapError;

    fn from_str(s: &str) -> CapResult<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "maintain" | "maintain_pension" => Ok(Self::MaintainPension),
            "cash" | "take_cash"            => Ok(Self::TakeCash),
            "partial" | "partial_redirect"  => Ok(Self::PartialRedirect),
            _ => Err(CapError::UnknownEmployeeResponse(s.to_string())),
        }
    }
}

/// One fully specified scenario.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScenarioParameters {
    cap:                   Gbp,
    year:                  Year,
    employer_response:     EmployerResponse,
    employee_response:     EmployeeResponse,
    employer_ni_rate:      f64,
    pension_redirect_rate: f64,
    targeted_haircut_rate: f64,
}

impl ScenarioParameters {
    pub fn new(
        cap: Gbp,
        year: Year,
        employer_response: EmployerResponse,
        employee_response: EmployeeResponse,
    ) -> CapResult<Self> {
        validate_cap(cap)?;
        validate_year(year)?;
        Ok(Self {
            cap,
            year,
            employer_response,
            employee_response,
            employer_ni_rate:      DEFAULT_EMPLOYER_NI_RATE,
            pension_redirect_rate: DEFAULT_PENSION_REDIRECT_RATE,
            targeted_haircut_rate: DEFAULT_TARGETED_HAIRCUT_RATE,
        })
    }

    pub fn with_employer_ni_rate(self, rate: f64) -> CapResult<Self> {
        validate_rate("employer_ni_rate", rate)?;
        Ok(Self { employer_ni_rate: rate, ..self })
    }

    pub fn with_pension_redirect_rate(self, rate: f64) -> CapResult<Self> {
        validate_rate("pension_redirect_rate", rate)?;
        Ok(Self { pension_redirect_rate: rate, ..self })
    }

    pub fn with_targeted_haircut_rate(self, rate: f64) -> CapResult<Self> {
        validate_rate("targeted_haircut_rate", rate)?;
        Ok(Self { targeted_haircut_rate: rate, ..self })
    }

    /// Same behaviour, different year. Used when a run spans several years.
    pub fn for_year(self, year: Year) -> CapResult<Self> {
        validate_year(year)?;
        Ok(Self { year, ..self })
    }

    pub fn cap(&self) -> Gbp { self.cap }
    pub fn year(&self) -> Year { self.year }
    pub fn employer_response(&self) -> EmployerResponse { self.employer_response }
    pub fn employee_response(&self) -> EmployeeResponse { self.employee_response }
    pub fn employer_ni_rate(&self) -> f64 { self.employer_ni_rate }
    pub fn pension_redirect_rate(&self) -> f64 { self.pension_redirect_rate }
    pub fn targeted_haircut_rate(&self) -> f64 { self.targeted_haircut_rate }

    /// Descriptive machine-friendly name,
    /// e.g. `cap_2000_spread_cost_maintain_pension`.
    pub fn name(&self) -> String {
        let mut name = format!(
            "cap_{}_{}_{}",
            self.cap, self.employer_response, self.employee_response
        );
        if self.employee_response == EmployeeResponse::PartialRedirect {
            let pct = (self.pension_redirect_rate * 100.0).round() as i64;
            name.push_str(&format!("_redirect_{pct}pct"));
        }
        name
    }

    /// Short matrix label, e.g. `Spread+Maintain`.
    pub fn label(&self) -> String {
        format!(
            "{}+{}",
            self.employer_response.short_label(),
            self.employee_response.short_label()
        )
    }
}

impl Default for ScenarioParameters {
    fn default() -> Self {
        Self {
            cap:                   DEFAULT_CAP,
            year:                  DEFAULT_YEAR,
            employer_response:     EmployerResponse::SpreadCost,
            employee_response:     EmployeeResponse::MaintainPension,
            employer_ni_rate:      DEFAULT_EMPLOYER_NI_RATE,
            pension_redirect_rate: DEFAULT_PENSION_REDIRECT_RATE,
            targeted_haircut_rate: DEFAULT_TARGETED_HAIRCUT_RATE,
        }
    }
}

pub fn validate_cap(cap: Gbp) -> CapResult<()> {
    if cap.is_finite() && cap >= 0.0 {
        Ok(())
    } else {
        Err(CapError::InvalidCap(cap))
    }
}

pub fn validate_year(year: Year) -> CapResult<()> {
    if (MIN_YEAR..=MAX_YEAR).contains(&year) {
        Ok(())
    } else {
        Err(CapError::InvalidYear(year))
    }
}

fn validate_rate(name: &'static str, value: f64) -> CapResult<()> {
    if value.is_finite() && (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(CapError::InvalidRate { name, value })
    }
}

/// Inclusive, validated list of years `from..=through`.
pub fn year_range(from: Year, through: Year) -> CapResult<Vec<Year>> {
    validate_year(from)?;
    validate_year(through)?;
    if through < from {
        return Err(CapError::EmptyYearRange { from, through });
    }
    Ok((from..=through).collect())
}
