//! The 2x2 behavioural scenario matrix.
//!
//! ORDER (fixed, documented, never reordered):
//!   1. Spread + Maintain   broad haircut, pension maintained
//!   2. Spread + TakeCash   broad haircut, lower pension saving
//!   3. Absorb + Maintain   no haircut, pension maintained
//!   4. Absorb + TakeCash   no haircut, maximum take-home

use crate::{
    error::CapResult,
    scenario::{EmployeeResponse, EmployerResponse, ScenarioParameters},
    types::{Gbp, Year},
};

pub const MATRIX_EMPLOYER_RESPONSES: [EmployerResponse; 2] =
    [EmployerResponse::SpreadCost, EmployerResponse::AbsorbCost];

pub const MATRIX_EMPLOYEE_RESPONSES: [EmployeeResponse; 2] =
    [EmployeeResponse::MaintainPension, EmployeeResponse::TakeCash];

/// The four matrix scenarios for one cap and year, in matrix order.
pub fn build_matrix(cap: Gbp, year: Year) -> CapResult<Vec<ScenarioParameters>> {
    let mut scenarios = Vec::with_capacity(4);
    for employer in MATRIX_EMPLOYER_RESPONSES {
        for employee in MATRIX_EMPLOYEE_RESPONSES {
            scenarios.push(ScenarioParameters::new(cap, year, employer, employee)?);
        }
    }
    Ok(scenarios)
}

/// One 2x2 block per cap, caps in input order.
pub fn scenario_matrix(caps: &[Gbp], year: Year) -> CapResult<Vec<ScenarioParameters>> {
    let mut scenarios = Vec::with_capacity(caps.len() * 4);
    for &cap in caps {
        scenarios.extend(build_matrix(cap, year)?);
    }
    Ok(scenarios)
}

/// Append the targeted-haircut comparison scenario for every distinct cap
/// already present, keeping first-seen cap order.
pub fn with_targeted_comparison(
    mut scenarios: Vec<ScenarioParameters>,
) -> CapResult<Vec<ScenarioParameters>> {
    let mut caps: Vec<(Gbp, Year)> = Vec::new();
    for s in &scenarios {
        if !caps.iter().any(|&(c, y)| c == s.cap() && y == s.year()) {
            caps.push((s.cap(), s.year()));
        }
    }
    for (cap, year) in caps {
        scenarios.push(ScenarioParameters::new(
            cap,
            year,
            EmployerResponse::TargetedHaircut,
            EmployeeResponse::MaintainPension,
        )?);
    }
    Ok(scenarios)
}
