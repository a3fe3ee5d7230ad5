//! The simulation engine seam.
//!
//! RULE: nothing outside `engine/` knows how a simulation is computed.
//! Analysis code talks to engines only through `Microsimulation` and
//! `SimulationBackend`, using the variables listed in `Variable`.

use crate::{
    error::{CapError, CapResult},
    types::Year,
};
use serde::{Deserialize, Serialize};
use std::fmt;

/// The unit a variable is measured on. Arrays returned by `calculate`
/// hold one value per entity of this kind, in engine order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Entity {
    Person,
    Household,
}

/// Every engine variable the analysis reads or writes.
/// Names match the engine's own variable names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Variable {
    EmploymentIncome,
    PensionContributionsViaSalarySacrifice,
    EmployeePensionContributions,
    PersonWeight,
    HouseholdWeight,
    HouseholdNetIncome,
    IncomeDecile,
    GovBalance,
}

impl Variable {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::EmploymentIncome                       => "employment_income",
            Self::PensionContributionsViaSalarySacrifice => "pension_contributions_via_salary_sacrifice",
            Self::EmployeePensionContributions           => "employee_pension_contributions",
            Self::PersonWeight                           => "person_weight",
            Self::HouseholdWeight                        => "household_weight",
            Self::HouseholdNetIncome                     => "household_net_income",
            Self::IncomeDecile                           => "income_decile",
            Self::GovBalance                             => "gov_balance",
        }
    }

    pub fn entity(&self) -> Entity {
        match self {
            Self::EmploymentIncome
            | Self::PensionContributionsViaSalarySacrifice
            | Self::EmployeePensionContributions
            | Self::PersonWeight => Entity::Person,
            Self::HouseholdWeight
            | Self::HouseholdNetIncome
            | Self::IncomeDecile
            | Self::GovBalance => Entity::Household,
        }
    }

    /// Variables the reform is allowed to overwrite.
    pub fn is_input(&self) -> bool {
        matches!(
            self,
            Self::EmploymentIncome
                | Self::PensionContributionsViaSalarySacrifice
                | Self::EmployeePensionContributions
        )
    }

    /// The weight variable matching this variable's entity.
    pub fn weight(&self) -> Variable {
        match self.entity() {
            Entity::Person    => Self::PersonWeight,
            Entity::Household => Self::HouseholdWeight,
        }
    }
}

impl fmt::Display for Variable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One simulation instance: a dataset plus any inputs overridden on it.
pub trait Microsimulation {
    /// Compute `variable` for `year`, one value per entity.
    fn calculate(&mut self, variable: Variable, year: Year) -> CapResult<Vec<f64>>;

    /// Override an input variable for `year`. `values` must hold one value
    /// per entity.
    fn set_input(&mut self, variable: Variable, year: Year, values: Vec<f64>) -> CapResult<()>;

    /// Weighted total of `variable` using the matching entity weights.
    fn weighted_sum(&mut self, variable: Variable, year: Year) -> CapResult<f64> {
        let values = self.calculate(variable, year)?;
        let weights = self.calculate(variable.weight(), year)?;
        ensure_len(variable, weights.len(), values.len())?;
        Ok(values.iter().zip(&weights).map(|(v, w)| v * w).sum())
    }
}

/// Creates fresh simulations. Each call returns an independent instance;
/// inputs set on one never leak into another.
pub trait SimulationBackend {
    /// Unique stable name for this backend, used in logs.
    fn name(&self) -> &'static str;

    fn simulation(&self) -> CapResult<Box<dyn Microsimulation>>;
}

pub(crate) fn ensure_len(variable: Variable, expected: usize, actual: usize) -> CapResult<()> {
    if expected == actual {
        Ok(())
    } else {
        Err(CapError::LengthMismatch {
            variable: variable.as_str().to_string(),
            expected,
            actual,
        })
    }
}
