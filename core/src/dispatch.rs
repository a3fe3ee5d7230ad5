//! Command dispatch — the straight-line pipeline behind every subcommand.
//!
//!   parse (tools) -> plan (validate + build parameters) -> build backend
//!   (tools) -> execute (adapt + report)
//!
//! RULE: `Request::plan` touches no engine. Every input error surfaces
//! there, before a backend exists.

use crate::{
    analysis::{
        calculate_distributional_impact, run_scenario, run_scenario_matrix, DecileImpact,
        ScenarioResult,
    },
    config::ScenarioDefaults,
    error::CapResult,
    matrix::{scenario_matrix, with_targeted_comparison},
    report::{self, Report},
    scenario::{year_range, EmployeeResponse, EmployerResponse, ScenarioParameters},
    simulation::SimulationBackend,
    types::{Gbp, Year},
};
use std::io::Write;
use std::path::PathBuf;

/// A parsed, not yet validated, subcommand.
#[derive(Debug, Clone, PartialEq)]
pub enum Request {
    Matrix {
        caps:          Vec<Gbp>,
        year:          Year,
        through:       Option<Year>,
        with_targeted: bool,
    },
    Single {
        cap:           Gbp,
        year:          Year,
        through:       Option<Year>,
        employer:      EmployerResponse,
        employee:      EmployeeResponse,
        redirect_rate: Option<f64>,
    },
    Distributional {
        cap:           Gbp,
        year:          Year,
        employer:      EmployerResponse,
        employee:      EmployeeResponse,
        redirect_rate: Option<f64>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandKind {
    Matrix,
    Single,
    Distributional,
}

impl CommandKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Matrix         => "matrix",
            Self::Single         => "single",
            Self::Distributional => "distributional",
        }
    }
}

/// A validated request: the exact scenarios and years to run.
#[derive(Debug, Clone, PartialEq)]
pub struct Plan {
    pub kind:      CommandKind,
    pub scenarios: Vec<ScenarioParameters>,
    pub years:     Vec<Year>,
}

impl Request {
    pub fn plan(&self, defaults: &ScenarioDefaults) -> CapResult<Plan> {
        match self {
            Request::Matrix { caps, year, through, with_targeted } => {
                let years = year_range(*year, through.unwrap_or(*year))?;
                let caps: Vec<Gbp> = if caps.is_empty() { vec![defaults.cap] } else { caps.clone() };
                let mut scenarios = scenario_matrix(&caps, *year)?;
                if *with_targeted {
                    scenarios = with_targeted_comparison(scenarios)?;
                }
                let scenarios = scenarios
                    .into_iter()
                    .map(|s| defaults.apply(s))
                    .collect::<CapResult<Vec<_>>>()?;
                Ok(Plan { kind: CommandKind::Matrix, scenarios, years })
            }
            Request::Single { cap, year, through, employer, employee, redirect_rate } => {
                let years = year_range(*year, through.unwrap_or(*year))?;
                let params =
                    defaults.apply(ScenarioParameters::new(*cap, *year, *employer, *employee)?)?;
                let params = defaults.apply_redirect(params, *redirect_rate)?;
                Ok(Plan { kind: CommandKind::Single, scenarios: vec![params], years })
            }
            Request::Distributional { cap, year, employer, employee, redirect_rate } => {
                let params =
                    defaults.apply(ScenarioParameters::new(*cap, *year, *employer, *employee)?)?;
                let params = defaults.apply_redirect(params, *redirect_rate)?;
                Ok(Plan {
                    kind:      CommandKind::Distributional,
                    scenarios: vec![params],
                    years:     vec![*year],
                })
            }
        }
    }
}

/// Where results go besides the console.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OutputOptions {
    /// Directory for CSV exports; None disables them.
    pub save_dir:  Option<PathBuf>,
    /// Path for a full JSON export.
    pub json_path: Option<PathBuf>,
}

#[derive(Debug, Clone, Default)]
pub struct Outcome {
    pub results:        Vec<ScenarioResult>,
    pub distributional: Option<Vec<DecileImpact>>,
    pub files:          Vec<PathBuf>,
}

/// Run a plan against `backend`, report to `out`, export as requested.
pub fn execute(
    plan: &Plan,
    backend: &dyn SimulationBackend,
    out: &mut dyn Write,
    output: &OutputOptions,
) -> CapResult<Outcome> {
    let mut outcome = Outcome::default();
    let first_year = plan.years.first().copied().unwrap_or_default();

    match plan.kind {
        CommandKind::Matrix => {
            let caps = distinct_caps(&plan.scenarios);
            let cap_text: Vec<String> =
                caps.iter().map(|c| format!("£{}", report::group_thousands(*c, 0))).collect();
            writeln!(out, "Running 2x2 scenario matrix for {} cap...", cap_text.join(", "))?;
            writeln!(out)?;

            let results = run_scenario_matrix(backend, &plan.scenarios, &plan.years)?;
            report::write_matrix(out, &results)?;

            if let Some(dir) = &output.save_dir {
                let path = report::save_text(
                    dir,
                    &report::matrix_file_name(&caps, first_year),
                    &report::matrix_csv(&results),
                )?;
                writeln!(out, "Results saved to: {}", path.display())?;
                outcome.files.push(path);
            }
            outcome.results = results;
        }
        CommandKind::Single => {
            for params in &plan.scenarios {
                writeln!(out, "Running scenario: {}", params.name())?;
                writeln!(out)?;
                let result = run_scenario(backend, params, &plan.years)?;
                report::write_single(out, &result)?;
                outcome.results.push(result);
            }
        }
        CommandKind::Distributional => {
            for params in &plan.scenarios {
                writeln!(
                    out,
                    "Calculating distributional impact for £{} cap...",
                    report::group_thousands(params.cap(), 0)
                )?;
                let rows = calculate_distributional_impact(backend, params, params.year())?;
                writeln!(out)?;
                report::write_distributional(out, &rows)?;

                if let Some(dir) = &output.save_dir {
                    let path = report::save_text(
                        dir,
                        &report::distributional_file_name(params.cap(), params.year()),
                        &report::distributional_csv(&rows),
                    )?;
                    writeln!(out, "Results saved to: {}", path.display())?;
                    outcome.files.push(path);
                }
                outcome.distributional = Some(rows);
            }
        }
    }

    if let Some(path) = &output.json_path {
        let mut export = Report::new(plan.kind.as_str(), outcome.results.clone());
        if let Some(rows) = &outcome.distributional {
            export = export.with_distributional(rows.clone());
        }
        report::save_json(path, &export)?;
        writeln!(out, "JSON written to: {}", path.display())?;
        outcome.files.push(path.clone());
    }

    Ok(outcome)
}

fn distinct_caps(scenarios: &[ScenarioParameters]) -> Vec<Gbp> {
    let mut caps: Vec<Gbp> = Vec::new();
    for s in scenarios {
        if !caps.contains(&s.cap()) {
            caps.push(s.cap());
        }
    }
    caps
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CapError;

    #[test]
    fn single_plan_carries_exact_modes() {
        let plan = Request::Single {
            cap: 2000.0,
            year: 2026,
            through: None,
            employer: EmployerResponse::AbsorbCost,
            employee: EmployeeResponse::MaintainPension,
            redirect_rate: None,
        }
        .plan(&ScenarioDefaults::default())
        .unwrap();

        assert_eq!(plan.kind, CommandKind::Single);
        assert_eq!(plan.years, vec![2026]);
        assert_eq!(plan.scenarios.len(), 1);
        assert_eq!(plan.scenarios[0].employer_response(), EmployerResponse::AbsorbCost);
        assert_eq!(plan.scenarios[0].employee_response(), EmployeeResponse::MaintainPension);
    }

    #[test]
    fn matrix_plan_uses_default_cap_when_none_given() {
        let plan = Request::Matrix { caps: vec![], year: 2026, through: Some(2028), with_targeted: false }
            .plan(&ScenarioDefaults { cap: 3000.0, ..Default::default() })
            .unwrap();
        assert_eq!(plan.scenarios.len(), 4);
        assert!(plan.scenarios.iter().all(|s| s.cap() == 3000.0));
        assert_eq!(plan.years, vec![2026, 2027, 2028]);
    }

    #[test]
    fn invalid_inputs_fail_in_plan() {
        let defaults = ScenarioDefaults::default();
        let bad_cap = Request::Distributional {
            cap: -10.0,
            year: 2026,
            employer: EmployerResponse::SpreadCost,
            employee: EmployeeResponse::MaintainPension,
            redirect_rate: None,
        };
        assert!(matches!(bad_cap.plan(&defaults), Err(CapError::InvalidCap(_))));

        let bad_range = Request::Matrix { caps: vec![2000.0], year: 2028, through: Some(2026), with_targeted: false };
        assert!(matches!(bad_range.plan(&defaults), Err(CapError::EmptyYearRange { .. })));

        let bad_rate = Request::Single {
            cap: 2000.0,
            year: 2026,
            through: None,
            employer: EmployerResponse::SpreadCost,
            employee: EmployeeResponse::PartialRedirect,
            redirect_rate: Some(2.0),
        };
        assert!(matches!(bad_rate.plan(&defaults), Err(CapError::InvalidRate { .. })));
    }

    #[test]
    fn partial_redirect_without_a_rate_fails_in_plan() {
        let request = Request::Single {
            cap: 2000.0,
            year: 2026,
            through: None,
            employer: EmployerResponse::AbsorbCost,
            employee: EmployeeResponse::PartialRedirect,
            redirect_rate: None,
        };
        assert!(matches!(
            request.plan(&ScenarioDefaults::default()),
            Err(CapError::RedirectRateRequired)
        ));

        let configured = ScenarioDefaults { pension_redirect_rate: Some(0.5), ..Default::default() };
        let plan = request.plan(&configured).unwrap();
        assert_eq!(plan.scenarios[0].name(), "cap_2000_absorb_cost_partial_redirect_redirect_50pct");
    }

    #[test]
    fn redirect_rate_for_other_responses_fails_in_plan() {
        let request = Request::Distributional {
            cap: 2000.0,
            year: 2026,
            employer: EmployerResponse::SpreadCost,
            employee: EmployeeResponse::TakeCash,
            redirect_rate: Some(0.3),
        };
        assert!(matches!(
            request.plan(&ScenarioDefaults::default()),
            Err(CapError::RedirectRateUnused("take_cash"))
        ));
    }
}
