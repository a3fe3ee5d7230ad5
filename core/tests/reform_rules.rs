//! Reform arithmetic against a recording simulation.
//!
//! No engine runs here: the mock serves fixed person arrays and records
//! every input the reform writes back.

use salary_sacrifice_core::{
    error::CapResult,
    reform::{apply_reform_for_year, CapReform},
    scenario::{EmployeeResponse, EmployerResponse, ScenarioParameters},
    simulation::{Microsimulation, Variable},
    types::Year,
};
use std::collections::HashMap;

struct MockSimulation {
    data:   HashMap<Variable, Vec<f64>>,
    inputs: HashMap<(Variable, Year), Vec<f64>>,
}

impl MockSimulation {
    fn new(ss: &[f64], income: &[f64], pension: &[f64]) -> Self {
        let data = [
            (Variable::PensionContributionsViaSalarySacrifice, ss.to_vec()),
            (Variable::EmploymentIncome, income.to_vec()),
            (Variable::EmployeePensionContributions, pension.to_vec()),
        ]
        .into_iter()
        .collect();
        Self { data, inputs: HashMap::new() }
    }

    fn get_input(&self, variable: Variable) -> &[f64] {
        &self.inputs[&(variable, 2026)]
    }
}

impl Microsimulation for MockSimulation {
    fn calculate(&mut self, variable: Variable, _year: Year) -> CapResult<Vec<f64>> {
        Ok(self.data.get(&variable).cloned().unwrap_or_default())
    }

    fn set_input(&mut self, variable: Variable, year: Year, values: Vec<f64>) -> CapResult<()> {
        self.inputs.insert((variable, year), values);
        Ok(())
    }
}

fn scenario(employer: EmployerResponse, employee: EmployeeResponse) -> ScenarioParameters {
    ScenarioParameters::new(2000.0, 2026, employer, employee).unwrap()
}

fn assert_close(actual: &[f64], expected: &[f64]) {
    assert_eq!(actual.len(), expected.len());
    for (a, e) in actual.iter().zip(expected) {
        assert!((a - e).abs() < 1e-6, "expected {expected:?}, got {actual:?}");
    }
}

// ── Spread + Maintain (default) ────────────────────────────────────

/// Nobody above the cap: no NI increase, so no haircut and no conversion.
#[test]
fn no_change_when_everyone_under_cap() {
    let mut sim = MockSimulation::new(
        &[1000.0, 1500.0, 500.0],
        &[50_000.0, 60_000.0, 40_000.0],
        &[0.0, 0.0, 0.0],
    );
    apply_reform_for_year(&mut sim, 2026, &ScenarioParameters::default()).unwrap();

    assert_close(sim.get_input(Variable::EmploymentIncome), &[50_000.0, 60_000.0, 40_000.0]);
    assert_close(
        sim.get_input(Variable::PensionContributionsViaSalarySacrifice),
        &[1000.0, 1500.0, 500.0],
    );
    assert_close(sim.get_input(Variable::EmployeePensionContributions), &[0.0, 0.0, 0.0]);
}

/// The excess above the cap moves to employee contributions.
#[test]
fn excess_redirected_to_employee_pension() {
    let mut sim = MockSimulation::new(&[5000.0, 1000.0], &[50_000.0, 50_000.0], &[0.0, 0.0]);
    apply_reform_for_year(&mut sim, 2026, &ScenarioParameters::default()).unwrap();

    let pension = sim.get_input(Variable::EmployeePensionContributions);
    assert_eq!(pension[0], 3000.0);
    assert_eq!(pension[1], 0.0);
}

#[test]
fn salary_sacrifice_capped_at_limit() {
    let mut sim = MockSimulation::new(
        &[5000.0, 8000.0, 1000.0],
        &[50_000.0, 60_000.0, 40_000.0],
        &[0.0, 0.0, 0.0],
    );
    apply_reform_for_year(&mut sim, 2026, &ScenarioParameters::default()).unwrap();

    assert_close(
        sim.get_input(Variable::PensionContributionsViaSalarySacrifice),
        &[2000.0, 2000.0, 1000.0],
    );
}

/// Salary sacrifice plus employee contributions is unchanged per worker.
#[test]
fn total_pension_maintained() {
    let ss = [5000.0, 3000.0, 1000.0];
    let employee = [1000.0, 500.0, 200.0];
    let mut sim = MockSimulation::new(&ss, &[50_000.0, 60_000.0, 40_000.0], &employee);
    apply_reform_for_year(&mut sim, 2026, &ScenarioParameters::default()).unwrap();

    let new_ss = sim.get_input(Variable::PensionContributionsViaSalarySacrifice);
    let new_employee = sim.get_input(Variable::EmployeePensionContributions);
    for i in 0..3 {
        assert!((ss[i] + employee[i] - (new_ss[i] + new_employee[i])).abs() < 1e-9);
    }
}

/// Excess 3000, NI increase 3000 × 0.138 = 414 spread over 100,000 of pay.
#[test]
fn employer_cost_spread_broadly() {
    let mut sim = MockSimulation::new(&[5000.0, 0.0], &[50_000.0, 50_000.0], &[0.0, 0.0]);
    let params = ScenarioParameters::default().with_employer_ni_rate(0.138).unwrap();
    let reformed = apply_reform_for_year(&mut sim, 2026, &params).unwrap();

    let haircut = 3000.0 * 0.138 / 100_000.0;
    assert!((reformed.broad_haircut_rate - haircut).abs() < 1e-12);
    assert_close(
        sim.get_input(Variable::EmploymentIncome),
        &[50_000.0 * (1.0 - haircut) + 3000.0, 50_000.0 * (1.0 - haircut)],
    );
}

/// Pay lost to the haircut equals the employer NI increase.
#[test]
fn total_employer_cost_constant() {
    let income = [50_000.0, 60_000.0, 40_000.0];
    let mut sim = MockSimulation::new(&[5000.0, 3000.0, 1000.0], &income, &[0.0, 0.0, 0.0]);
    apply_reform_for_year(&mut sim, 2026, &ScenarioParameters::default()).unwrap();

    let total_excess = 3000.0 + 1000.0;
    let new_total: f64 = sim.get_input(Variable::EmploymentIncome).iter().sum();
    let reduction = income.iter().sum::<f64>() - (new_total - total_excess);
    assert!((reduction - total_excess * 0.138).abs() < 1.0);
}

// ── Spread + TakeCash ──────────────────────────────────────────────

#[test]
fn take_cash_does_not_redirect_but_still_caps() {
    let mut sim = MockSimulation::new(&[5000.0, 1000.0], &[50_000.0, 50_000.0], &[0.0, 0.0]);
    let params = scenario(EmployerResponse::SpreadCost, EmployeeResponse::TakeCash);
    apply_reform_for_year(&mut sim, 2026, &params).unwrap();

    assert_close(sim.get_input(Variable::EmployeePensionContributions), &[0.0, 0.0]);
    assert_close(
        sim.get_input(Variable::PensionContributionsViaSalarySacrifice),
        &[2000.0, 1000.0],
    );
}

// ── Absorb + Maintain ──────────────────────────────────────────────

#[test]
fn absorb_applies_no_haircut() {
    let mut sim = MockSimulation::new(&[5000.0, 0.0], &[50_000.0, 50_000.0], &[0.0, 0.0]);
    let params = scenario(EmployerResponse::AbsorbCost, EmployeeResponse::MaintainPension);
    let reformed = apply_reform_for_year(&mut sim, 2026, &params).unwrap();

    assert_eq!(reformed.broad_haircut_rate, 0.0);
    assert_close(sim.get_input(Variable::EmploymentIncome), &[53_000.0, 50_000.0]);
    assert_eq!(sim.get_input(Variable::EmployeePensionContributions)[0], 3000.0);
}

// ── Absorb + TakeCash ──────────────────────────────────────────────

/// Best case for take-home pay: full excess as pay, nothing redirected.
#[test]
fn absorb_take_cash_maximises_take_home() {
    let mut sim = MockSimulation::new(&[5000.0], &[50_000.0], &[0.0]);
    let params = scenario(EmployerResponse::AbsorbCost, EmployeeResponse::TakeCash);
    apply_reform_for_year(&mut sim, 2026, &params).unwrap();

    assert_eq!(sim.get_input(Variable::EmploymentIncome)[0], 53_000.0);
    assert_eq!(sim.get_input(Variable::EmployeePensionContributions)[0], 0.0);
}

// ── Targeted haircut comparison ────────────────────────────────────

/// 13% of the 3000 excess is kept; the remaining 2610 is paid and redirected.
#[test]
fn targeted_haircut_applies_to_excess_only() {
    let mut sim = MockSimulation::new(&[5000.0], &[50_000.0], &[0.0]);
    let params = scenario(EmployerResponse::TargetedHaircut, EmployeeResponse::MaintainPension)
        .with_targeted_haircut_rate(0.13)
        .unwrap();
    apply_reform_for_year(&mut sim, 2026, &params).unwrap();

    assert!((sim.get_input(Variable::EmployeePensionContributions)[0] - 2610.0).abs() < 1e-9);
    assert!((sim.get_input(Variable::EmploymentIncome)[0] - 52_610.0).abs() < 1e-9);
}

#[test]
fn targeted_haircut_leaves_unaffected_workers_alone() {
    let mut sim = MockSimulation::new(&[1000.0], &[50_000.0], &[500.0]);
    let params = scenario(EmployerResponse::TargetedHaircut, EmployeeResponse::MaintainPension);
    apply_reform_for_year(&mut sim, 2026, &params).unwrap();

    assert_eq!(sim.get_input(Variable::EmploymentIncome)[0], 50_000.0);
    assert_eq!(sim.get_input(Variable::EmployeePensionContributions)[0], 500.0);
}

// ── Cap levels ─────────────────────────────────────────────────────

#[test]
fn excess_tracks_cap_level() {
    for (cap, expected) in [(2000.0, 3000.0), (3000.0, 2000.0), (5000.0, 0.0), (6000.0, 0.0)] {
        let mut sim = MockSimulation::new(&[5000.0], &[50_000.0], &[0.0]);
        let params = ScenarioParameters::new(
            cap,
            2026,
            EmployerResponse::SpreadCost,
            EmployeeResponse::MaintainPension,
        )
        .unwrap();
        apply_reform_for_year(&mut sim, 2026, &params).unwrap();
        let pension = sim.get_input(Variable::EmployeePensionContributions)[0];
        assert!((pension - expected).abs() < 1e-9, "cap {cap}: got {pension}");
    }
}

/// A multi-year reform writes inputs for every covered year.
#[test]
fn reform_covers_every_year() {
    let mut sim = MockSimulation::new(&[5000.0], &[50_000.0], &[0.0]);
    CapReform::new(ScenarioParameters::default(), vec![2026, 2027, 2028])
        .apply(&mut sim)
        .unwrap();
    for year in 2026..=2028 {
        assert!(sim.inputs.contains_key(&(Variable::EmploymentIncome, year)));
        assert!(sim.inputs.contains_key(&(Variable::PensionContributionsViaSalarySacrifice, year)));
    }
}
