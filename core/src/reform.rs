//! The salary-sacrifice cap reform.
//!
//! The reform is applied by rewriting three person-level inputs on the
//! reformed simulation, once per analysed year:
//!
//!   employment_income                          += excess (less any haircut)
//!   employee_pension_contributions             += redirected excess
//!   pension_contributions_via_salary_sacrifice  = min(ss, cap)
//!
//! Employer responses never map to engine parameters. SpreadCost is a
//! uniform pay haircut sized to fund the employer NI increase; AbsorbCost
//! leaves pay untouched.

use crate::{
    error::CapResult,
    scenario::{EmployeeResponse, EmployerResponse, ScenarioParameters},
    simulation::{ensure_len, Microsimulation, Variable},
    types::Year,
};

/// The rewritten inputs for one year, before they are set on a simulation.
#[derive(Debug, Clone, PartialEq)]
pub struct ReformedInputs {
    pub employment_income:              Vec<f64>,
    pub employee_pension_contributions: Vec<f64>,
    pub salary_sacrifice:               Vec<f64>,
    /// Uniform haircut rate applied to all pay (SpreadCost only, else 0).
    pub broad_haircut_rate:             f64,
}

/// Pure reform arithmetic over aligned person arrays.
pub fn reform_inputs(
    params: &ScenarioParameters,
    salary_sacrifice: &[f64],
    employment_income: &[f64],
    employee_pension: &[f64],
) -> CapResult<ReformedInputs> {
    let n = salary_sacrifice.len();
    ensure_len(Variable::EmploymentIncome, n, employment_income.len())?;
    ensure_len(Variable::EmployeePensionContributions, n, employee_pension.len())?;

    let cap = params.cap();
    let excess: Vec<f64> = salary_sacrifice.iter().map(|ss| (ss - cap).max(0.0)).collect();

    let mut redirect: Vec<f64> = match params.employee_response() {
        EmployeeResponse::MaintainPension => excess.clone(),
        EmployeeResponse::TakeCash        => vec![0.0; n],
        EmployeeResponse::PartialRedirect => excess
            .iter()
            .map(|e| e * params.pension_redirect_rate())
            .collect(),
    };

    let mut broad_haircut_rate = 0.0;
    let new_income: Vec<f64> = match params.employer_response() {
        EmployerResponse::SpreadCost => {
            let ni_increase: f64 = excess.iter().map(|e| e * params.employer_ni_rate()).sum();
            let total_income: f64 = employment_income.iter().sum();
            if total_income > 0.0 {
                broad_haircut_rate = ni_increase / total_income;
            }
            employment_income
                .iter()
                .zip(&excess)
                .map(|(inc, e)| inc * (1.0 - broad_haircut_rate) + e)
                .collect()
        }
        EmployerResponse::AbsorbCost => employment_income
            .iter()
            .zip(&excess)
            .map(|(inc, e)| inc + e)
            .collect(),
        EmployerResponse::TargetedHaircut => {
            // Employer keeps a fixed share of the affected worker's excess.
            // Whatever is left is both paid out and redirected.
            let net: Vec<f64> = excess
                .iter()
                .map(|e| e * (1.0 - params.targeted_haircut_rate()))
                .collect();
            redirect = net.clone();
            employment_income.iter().zip(&net).map(|(inc, c)| inc + c).collect()
        }
    };

    let employee_pension_contributions = employee_pension
        .iter()
        .zip(&redirect)
        .map(|(p, r)| p + r)
        .collect();

    let capped = salary_sacrifice.iter().map(|ss| ss.min(cap)).collect();

    Ok(ReformedInputs {
        employment_income: new_income,
        employee_pension_contributions,
        salary_sacrifice: capped,
        broad_haircut_rate,
    })
}

/// Apply the reform for a single year to `sim`.
pub fn apply_reform_for_year(
    sim: &mut dyn Microsimulation,
    year: Year,
    params: &ScenarioParameters,
) -> CapResult<ReformedInputs> {
    let ss = sim.calculate(Variable::PensionContributionsViaSalarySacrifice, year)?;
    let income = sim.calculate(Variable::EmploymentIncome, year)?;
    let pension = sim.calculate(Variable::EmployeePensionContributions, year)?;

    let reformed = reform_inputs(params, &ss, &income, &pension)?;

    log::debug!(
        "year={year} reform {}: haircut={:.5} affected={}",
        params.name(),
        reformed.broad_haircut_rate,
        ss.iter().filter(|v| **v > params.cap()).count()
    );

    sim.set_input(Variable::EmploymentIncome, year, reformed.employment_income.clone())?;
    sim.set_input(
        Variable::EmployeePensionContributions,
        year,
        reformed.employee_pension_contributions.clone(),
    )?;
    sim.set_input(
        Variable::PensionContributionsViaSalarySacrifice,
        year,
        reformed.salary_sacrifice.clone(),
    )?;
    Ok(reformed)
}

/// A reform bound to a scenario and the years it covers.
#[derive(Debug, Clone)]
pub struct CapReform {
    pub params: ScenarioParameters,
    pub years:  Vec<Year>,
}

impl CapReform {
    pub fn new(params: ScenarioParameters, years: Vec<Year>) -> Self {
        Self { params, years }
    }

    /// Rewrite the inputs of `sim` for every covered year.
    pub fn apply(&self, sim: &mut dyn Microsimulation) -> CapResult<()> {
        for &year in &self.years {
            apply_reform_for_year(sim, year, &self.params)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CapError;

    fn params(employer: EmployerResponse, employee: EmployeeResponse) -> ScenarioParameters {
        ScenarioParameters::new(2000.0, 2026, employer, employee).unwrap()
    }

    #[test]
    fn mismatched_lengths_are_rejected() {
        let p = ScenarioParameters::default();
        let err = reform_inputs(&p, &[1.0, 2.0], &[1.0], &[0.0, 0.0]).unwrap_err();
        assert!(matches!(err, CapError::LengthMismatch { expected: 2, actual: 1, .. }));
    }

    #[test]
    fn partial_redirect_splits_excess() {
        let p = params(EmployerResponse::AbsorbCost, EmployeeResponse::PartialRedirect)
            .with_pension_redirect_rate(0.25)
            .unwrap();
        let out = reform_inputs(&p, &[6000.0], &[40_000.0], &[100.0]).unwrap();
        assert_eq!(out.employee_pension_contributions, vec![1100.0]);
        assert_eq!(out.employment_income, vec![44_000.0]);
        assert_eq!(out.salary_sacrifice, vec![2000.0]);
    }

    #[test]
    fn zero_total_income_means_no_haircut() {
        let p = params(EmployerResponse::SpreadCost, EmployeeResponse::TakeCash);
        let out = reform_inputs(&p, &[5000.0], &[0.0], &[0.0]).unwrap();
        assert_eq!(out.broad_haircut_rate, 0.0);
        assert_eq!(out.employment_income, vec![3000.0]);
    }

    #[test]
    fn empty_population_is_a_no_op() {
        let p = ScenarioParameters::default();
        let out = reform_inputs(&p, &[], &[], &[]).unwrap();
        assert!(out.employment_income.is_empty());
        assert_eq!(out.broad_haircut_rate, 0.0);
    }
}
