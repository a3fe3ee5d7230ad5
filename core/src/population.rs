//! Who the cap touches: weighted counts of workers, contributors and
//! workers above the cap, taken from a baseline simulation.

use crate::{
    error::CapResult,
    simulation::{ensure_len, Microsimulation, Variable},
    types::{Gbp, Year, BILLION},
};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AffectedPopulation {
    pub total_workers:              f64,
    pub ss_contributors:            f64,
    pub ss_contributors_pct:        f64,
    pub affected_workers:           f64,
    pub affected_workers_pct_of_ss: f64,
    pub affected_workers_pct_of_all: f64,
    pub avg_contribution_all_ss:    f64,
    pub avg_contribution_above_cap: f64,
    pub total_excess_bn:            f64,
}

/// Statistics over aligned person arrays.
pub fn affected_population_from(
    salary_sacrifice: &[f64],
    employment_income: &[f64],
    weights: &[f64],
    cap: Gbp,
) -> CapResult<AffectedPopulation> {
    let n = salary_sacrifice.len();
    ensure_len(Variable::EmploymentIncome, n, employment_income.len())?;
    ensure_len(Variable::PersonWeight, n, weights.len())?;

    let mut total_workers = 0.0;
    let mut ss_contributors = 0.0;
    let mut ss_weighted = 0.0;
    let mut affected_workers = 0.0;
    let mut affected_weighted = 0.0;
    let mut total_excess = 0.0;

    for i in 0..n {
        let (ss, w) = (salary_sacrifice[i], weights[i]);
        if employment_income[i] > 0.0 {
            total_workers += w;
        }
        if ss > 0.0 {
            ss_contributors += w;
            ss_weighted += ss * w;
        }
        if ss > cap {
            affected_workers += w;
            affected_weighted += ss * w;
            total_excess += (ss - cap) * w;
        }
    }

    Ok(AffectedPopulation {
        total_workers,
        ss_contributors,
        ss_contributors_pct:         pct(ss_contributors, total_workers),
        affected_workers,
        affected_workers_pct_of_ss:  pct(affected_workers, ss_contributors),
        affected_workers_pct_of_all: pct(affected_workers, total_workers),
        avg_contribution_all_ss:     ratio(ss_weighted, ss_contributors),
        avg_contribution_above_cap:  ratio(affected_weighted, affected_workers),
        total_excess_bn:             total_excess / BILLION,
    })
}

/// Statistics read from a baseline simulation for `year`.
pub fn calculate_affected_population(
    sim: &mut dyn Microsimulation,
    year: Year,
    cap: Gbp,
) -> CapResult<AffectedPopulation> {
    let ss = sim.calculate(Variable::PensionContributionsViaSalarySacrifice, year)?;
    let income = sim.calculate(Variable::EmploymentIncome, year)?;
    let weights = sim.calculate(Variable::PersonWeight, year)?;
    affected_population_from(&ss, &income, &weights, cap)
}

fn ratio(num: f64, den: f64) -> f64 {
    if den > 0.0 { num / den } else { 0.0 }
}

fn pct(num: f64, den: f64) -> f64 {
    100.0 * ratio(num, den)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn basic_statistics() {
        let stats = affected_population_from(
            &[5000.0, 3000.0, 1000.0, 0.0, 0.0],
            &[50_000.0, 60_000.0, 40_000.0, 30_000.0, 0.0],
            &[1000.0; 5],
            2000.0,
        )
        .unwrap();

        assert_eq!(stats.total_workers, 4000.0);
        assert_eq!(stats.ss_contributors, 3000.0);
        assert_eq!(stats.affected_workers, 2000.0);
        assert!((stats.total_excess_bn - 4_000_000.0 / 1e9).abs() < 1e-12);
        assert!((stats.ss_contributors_pct - 75.0).abs() < 1e-9);
        assert!((stats.affected_workers_pct_of_all - 50.0).abs() < 1e-9);
        assert!((stats.avg_contribution_all_ss - 3000.0).abs() < 1e-9);
        assert!((stats.avg_contribution_above_cap - 4000.0).abs() < 1e-9);
    }

    #[test]
    fn nobody_contributing_gives_zero_shares() {
        let stats = affected_population_from(&[0.0, 0.0], &[0.0, 0.0], &[1.0, 1.0], 2000.0).unwrap();
        assert_eq!(stats, AffectedPopulation::default());
    }
}
