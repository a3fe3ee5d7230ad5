//! Simulation adapter — runs scenarios against a backend.
//!
//! For every scenario the adapter builds two simulations from the same
//! backend: a baseline, and a reformed one with the cap reform applied for
//! every analysed year. All outputs are differences between the two.
//!
//! Engine errors are returned as-is. Nothing here retries.

use crate::{
    error::CapResult,
    population::{calculate_affected_population, AffectedPopulation},
    reform::CapReform,
    scenario::ScenarioParameters,
    simulation::{ensure_len, Microsimulation, SimulationBackend, Variable},
    types::{Year, BILLION},
};
use serde::{Deserialize, Serialize};

/// Years analysed when a library caller does not choose.
pub const DEFAULT_YEARS: [Year; 4] = [2026, 2027, 2028, 2029];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct YearRevenue {
    pub year:       Year,
    pub revenue_bn: f64,
}

/// Average household outcome in one income decile.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecileImpact {
    pub decile:              u8,
    pub avg_baseline_income: f64,
    pub avg_reformed_income: f64,
    pub avg_change:          f64,
    pub pct_change:          f64,
    pub population:          f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScenarioResult {
    /// Exactly the parameters the scenario was run with.
    pub parameters:           ScenarioParameters,
    /// Average annual change in government balance, GBP bn.
    pub revenue_impact:       f64,
    pub revenue_by_year:      Vec<YearRevenue>,
    pub total_revenue_bn:     f64,
    pub affected_population:  AffectedPopulation,
    /// Decile effects for the first analysed year.
    pub distributional_table: Vec<DecileImpact>,
}

impl ScenarioResult {
    pub fn revenue_for(&self, year: Year) -> Option<f64> {
        self.revenue_by_year
            .iter()
            .find(|r| r.year == year)
            .map(|r| r.revenue_bn)
    }

    pub fn years(&self) -> Vec<Year> {
        self.revenue_by_year.iter().map(|r| r.year).collect()
    }
}

struct SimulationPair {
    baseline: Box<dyn Microsimulation>,
    reformed: Box<dyn Microsimulation>,
}

impl SimulationPair {
    fn build(
        backend: &dyn SimulationBackend,
        params: &ScenarioParameters,
        years: &[Year],
    ) -> CapResult<Self> {
        let baseline = backend.simulation()?;
        let mut reformed = backend.simulation()?;
        CapReform::new(*params, years.to_vec()).apply(reformed.as_mut())?;
        Ok(Self { baseline, reformed })
    }

    fn revenue_bn(&mut self, year: Year) -> CapResult<f64> {
        let before = self.baseline.weighted_sum(Variable::GovBalance, year)?;
        let after = self.reformed.weighted_sum(Variable::GovBalance, year)?;
        Ok((after - before) / BILLION)
    }

    fn decile_table(&mut self, year: Year) -> CapResult<Vec<DecileImpact>> {
        let baseline_income = self.baseline.calculate(Variable::HouseholdNetIncome, year)?;
        let reformed_income = self.reformed.calculate(Variable::HouseholdNetIncome, year)?;
        let deciles = self.baseline.calculate(Variable::IncomeDecile, year)?;
        let weights = self.baseline.calculate(Variable::HouseholdWeight, year)?;
        decile_impacts(&baseline_income, &reformed_income, &deciles, &weights)
    }
}

/// Run one scenario over `years`. An empty slice analyses the scenario's
/// own year. Population statistics and the decile table use the first year.
pub fn run_scenario(
    backend: &dyn SimulationBackend,
    params: &ScenarioParameters,
    years: &[Year],
) -> CapResult<ScenarioResult> {
    let years: Vec<Year> = if years.is_empty() {
        vec![params.year()]
    } else {
        years.to_vec()
    };
    let first_year = years[0];

    log::info!("Running scenario: {} on {}", params.name(), backend.name());

    let mut pair = SimulationPair::build(backend, params, &years)?;

    let mut revenue_by_year = Vec::with_capacity(years.len());
    for &year in &years {
        let revenue_bn = pair.revenue_bn(year)?;
        log::debug!("{} year={year} revenue={revenue_bn:.3}bn", params.name());
        revenue_by_year.push(YearRevenue { year, revenue_bn });
    }

    let affected_population =
        calculate_affected_population(pair.baseline.as_mut(), first_year, params.cap())?;
    let distributional_table = pair.decile_table(first_year)?;

    let total_revenue_bn: f64 = revenue_by_year.iter().map(|r| r.revenue_bn).sum();
    Ok(ScenarioResult {
        parameters: *params,
        revenue_impact: total_revenue_bn / years.len() as f64,
        revenue_by_year,
        total_revenue_bn,
        affected_population,
        distributional_table,
    })
}

/// Run every scenario in order. Stops at the first failure.
pub fn run_scenario_matrix(
    backend: &dyn SimulationBackend,
    scenarios: &[ScenarioParameters],
    years: &[Year],
) -> CapResult<Vec<ScenarioResult>> {
    scenarios
        .iter()
        .map(|s| run_scenario(backend, s, years))
        .collect()
}

/// Decile table for one scenario and year, with the reform applied to
/// that year only.
pub fn calculate_distributional_impact(
    backend: &dyn SimulationBackend,
    params: &ScenarioParameters,
    year: Year,
) -> CapResult<Vec<DecileImpact>> {
    log::info!("Distributional impact: {} year={year}", params.name());
    let mut pair = SimulationPair::build(backend, params, &[year])?;
    pair.decile_table(year)
}

/// Weighted per-decile averages. Households with a decile outside 1..=10
/// are skipped, as are empty deciles.
pub fn decile_impacts(
    baseline_income: &[f64],
    reformed_income: &[f64],
    deciles: &[f64],
    weights: &[f64],
) -> CapResult<Vec<DecileImpact>> {
    let n = baseline_income.len();
    ensure_len(Variable::HouseholdNetIncome, n, reformed_income.len())?;
    ensure_len(Variable::IncomeDecile, n, deciles.len())?;
    ensure_len(Variable::HouseholdWeight, n, weights.len())?;

    let mut rows = Vec::with_capacity(10);
    for decile in 1..=10u8 {
        let mut weighted_baseline = 0.0;
        let mut weighted_reformed = 0.0;
        let mut total_weight = 0.0;
        let mut members = 0usize;

        for i in 0..n {
            if deciles[i] != f64::from(decile) {
                continue;
            }
            members += 1;
            weighted_baseline += baseline_income[i] * weights[i];
            weighted_reformed += reformed_income[i] * weights[i];
            total_weight += weights[i];
        }
        if members == 0 || total_weight <= 0.0 {
            continue;
        }

        let avg_baseline = weighted_baseline / total_weight;
        let avg_reformed = weighted_reformed / total_weight;
        let avg_change = avg_reformed - avg_baseline;
        let pct_change = if avg_baseline != 0.0 {
            100.0 * avg_change / avg_baseline
        } else {
            0.0
        };

        rows.push(DecileImpact {
            decile,
            avg_baseline_income: avg_baseline,
            avg_reformed_income: avg_reformed,
            avg_change,
            pct_change,
            population: total_weight,
        });
    }
    Ok(rows)
}
