//! Dispatch pipeline: plan -> execute -> report/export.

use salary_sacrifice_core::{
    config::ScenarioDefaults,
    dataset::Dataset,
    dispatch::{execute, OutputOptions, Request},
    engine::frame::{FrameBackend, FrameOptions},
    error::{CapError, CapResult},
    report::Report,
    scenario::{EmployeeResponse, EmployerResponse},
    simulation::{Microsimulation, SimulationBackend},
};
use std::cell::Cell;

/// Counts how many simulations the adapter asks for.
struct CountingBackend {
    inner: FrameBackend,
    built: Cell<usize>,
}

impl CountingBackend {
    fn new() -> Self {
        Self {
            inner: FrameBackend::new(Dataset::synthetic(150, 11), FrameOptions::default()),
            built: Cell::new(0),
        }
    }
}

impl SimulationBackend for CountingBackend {
    fn name(&self) -> &'static str { "counting" }

    fn simulation(&self) -> CapResult<Box<dyn Microsimulation>> {
        self.built.set(self.built.get() + 1);
        self.inner.simulation()
    }
}

fn run(request: Request, output: &OutputOptions) -> (String, salary_sacrifice_core::dispatch::Outcome) {
    let backend = CountingBackend::new();
    let plan = request.plan(&ScenarioDefaults::default()).unwrap();
    let mut out = Vec::new();
    let outcome = execute(&plan, &backend, &mut out, output).unwrap();
    (String::from_utf8(out).unwrap(), outcome)
}

#[test]
fn matrix_prints_all_four_and_saves_csv() {
    let dir = tempfile::tempdir().unwrap();
    let output = OutputOptions { save_dir: Some(dir.path().to_path_buf()), json_path: None };
    let (text, outcome) = run(
        Request::Matrix { caps: vec![2000.0], year: 2026, through: None, with_targeted: false },
        &output,
    );

    assert!(text.starts_with("Running 2x2 scenario matrix for £2,000 cap..."));
    for label in ["Spread+Maintain", "Spread+TakeCash", "Absorb+Maintain", "Absorb+TakeCash"] {
        assert!(text.contains(label), "missing {label} in:\n{text}");
    }
    assert_eq!(outcome.results.len(), 4);

    let csv_path = dir.path().join("scenario_matrix_cap_2000_2026.csv");
    assert_eq!(outcome.files, vec![csv_path.clone()]);
    let csv = std::fs::read_to_string(csv_path).unwrap();
    let mut lines = csv.lines();
    assert_eq!(
        lines.next().unwrap(),
        "scenario,cap_amount,employer_response,employee_response,\
         avg_annual_revenue_bn,affected_workers,total_excess_bn,revenue_2026_bn"
    );
    let first = lines.next().unwrap();
    assert!(first.starts_with("cap_2000_spread_cost_maintain_pension,2000,spread_cost,maintain_pension,"));
    assert_eq!(lines.count(), 3);
}

#[test]
fn single_absorb_maintain_yields_one_result() {
    let (text, outcome) = run(
        Request::Single {
            cap: 2000.0,
            year: 2026,
            through: None,
            employer: EmployerResponse::AbsorbCost,
            employee: EmployeeResponse::MaintainPension,
            redirect_rate: None,
        },
        &OutputOptions::default(),
    );

    assert_eq!(outcome.results.len(), 1);
    let p = &outcome.results[0].parameters;
    assert_eq!(p.employer_response(), EmployerResponse::AbsorbCost);
    assert_eq!(p.employee_response(), EmployeeResponse::MaintainPension);
    assert!(text.contains("Running scenario: cap_2000_absorb_cost_maintain_pension"));
    assert!(text.contains("Revenue impact (2026): £"));
    assert!(text.contains("Affected workers: "));
    assert!(outcome.files.is_empty());
}

#[test]
fn distributional_prints_decile_table_and_exports_json() {
    let dir = tempfile::tempdir().unwrap();
    let json_path = dir.path().join("nested").join("dist.json");
    let output = OutputOptions { save_dir: None, json_path: Some(json_path.clone()) };
    let (text, outcome) = run(
        Request::Distributional {
            cap: 2000.0,
            year: 2026,
            employer: EmployerResponse::SpreadCost,
            employee: EmployeeResponse::MaintainPension,
            redirect_rate: None,
        },
        &output,
    );

    assert!(text.contains("DISTRIBUTIONAL IMPACT BY INCOME DECILE"));
    let rows = outcome.distributional.expect("decile rows");
    assert_eq!(rows.len(), 10);
    assert!(rows.windows(2).all(|w| w[0].decile < w[1].decile));

    let report: Report =
        serde_json::from_str(&std::fs::read_to_string(&json_path).unwrap()).unwrap();
    assert_eq!(report.command, "distributional");
    assert_eq!(report.distributional.unwrap().len(), 10);
    assert!(report.results.is_empty());
}

/// Bad input fails while planning, so the engine is never asked for a
/// simulation.
#[test]
fn invalid_input_never_reaches_the_engine() {
    let backend = CountingBackend::new();
    let request = Request::Single {
        cap: f64::NAN,
        year: 2026,
        through: None,
        employer: EmployerResponse::SpreadCost,
        employee: EmployeeResponse::TakeCash,
        redirect_rate: None,
    };

    let err = request.plan(&ScenarioDefaults::default()).unwrap_err();
    assert!(matches!(err, CapError::InvalidCap(_)));
    assert!(err.is_validation());
    assert_eq!(backend.built.get(), 0);
}

/// Each scenario builds exactly one baseline and one reformed simulation.
#[test]
fn each_scenario_builds_two_simulations() {
    let backend = CountingBackend::new();
    let plan = Request::Matrix { caps: vec![2000.0], year: 2026, through: Some(2027), with_targeted: true }
        .plan(&ScenarioDefaults::default())
        .unwrap();
    assert_eq!(plan.scenarios.len(), 5);

    let mut out = Vec::new();
    execute(&plan, &backend, &mut out, &OutputOptions::default()).unwrap();
    assert_eq!(backend.built.get(), 10);
}
