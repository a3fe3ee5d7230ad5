//! Household microdata for the in-process frame engine.
//!
//! A dataset is a JSON export of one survey year: households with a
//! grossing-up weight and their members' pay, pension contributions and
//! effective marginal tax/NI rates. Rates come from the exporting engine;
//! nothing here knows a UK rule table.
//!
//! `Dataset::synthetic` builds a deterministic stand-in from a seed for
//! demos and tests.

use crate::{
    error::{CapError, CapResult},
    rng::{DatasetRng, RngStream},
    types::{Gbp, Year},
};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Person {
    pub employment_income:              Gbp,
    #[serde(default)]
    pub salary_sacrifice_contributions: Gbp,
    #[serde(default)]
    pub employee_pension_contributions: Gbp,
    #[serde(default)]
    pub other_income:                   Gbp,
    #[serde(default)]
    pub income_tax_rate:                f64,
    #[serde(default)]
    pub employee_ni_rate:               f64,
    #[serde(default)]
    pub employer_ni_rate:               f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Household {
    pub id:     String,
    pub weight: f64,
    pub people: Vec<Person>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dataset {
    pub base_year:       Year,
    /// Annual growth applied to every monetary field after `base_year`.
    #[serde(default)]
    pub earnings_growth: f64,
    /// Inclusive range of years the data may be projected to.
    pub years:           (Year, Year),
    pub households:      Vec<Household>,
}

impl Dataset {
    pub fn load(path: &Path) -> CapResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            CapError::Dataset(format!("cannot read {}: {e}", path.display()))
        })?;
        let dataset: Dataset = serde_json::from_str(&content)?;
        dataset.validate()?;
        log::info!(
            "Loaded dataset {}: {} households, {} people",
            path.display(),
            dataset.households.len(),
            dataset.person_count()
        );
        Ok(dataset)
    }

    pub fn validate(&self) -> CapResult<()> {
        let (from, through) = self.years;
        if through < from || !(from..=through).contains(&self.base_year) {
            return Err(CapError::Dataset(format!(
                "base year {} outside year range {from}..={through}",
                self.base_year
            )));
        }
        if !self.earnings_growth.is_finite() || self.earnings_growth <= -1.0 {
            return Err(CapError::Dataset(format!(
                "earnings growth {} is not a usable rate",
                self.earnings_growth
            )));
        }

        let mut seen = HashSet::new();
        for hh in &self.households {
            if !seen.insert(hh.id.as_str()) {
                return Err(CapError::Dataset(format!("duplicate household id '{}'", hh.id)));
            }
            if !hh.weight.is_finite() || hh.weight < 0.0 {
                return Err(CapError::Dataset(format!(
                    "household '{}' has invalid weight {}",
                    hh.id, hh.weight
                )));
            }
            for p in &hh.people {
                let amounts = [
                    p.employment_income,
                    p.salary_sacrifice_contributions,
                    p.employee_pension_contributions,
                    p.other_income,
                ];
                if amounts.iter().any(|a| !a.is_finite() || *a < 0.0) {
                    return Err(CapError::Dataset(format!(
                        "household '{}' has a negative or non-finite amount",
                        hh.id
                    )));
                }
                let rates = [p.income_tax_rate, p.employee_ni_rate, p.employer_ni_rate];
                if rates.iter().any(|r| !(0.0..=1.0).contains(r)) {
                    return Err(CapError::Dataset(format!(
                        "household '{}' has a rate outside 0..=1",
                        hh.id
                    )));
                }
            }
        }
        Ok(())
    }

    pub fn person_count(&self) -> usize {
        self.households.iter().map(|h| h.people.len()).sum()
    }

    pub fn covers(&self, year: Year) -> bool {
        (self.years.0..=self.years.1).contains(&year)
    }

    /// Multiplier taking base-year amounts to `year`.
    pub fn uprating(&self, year: Year) -> f64 {
        (1.0 + self.earnings_growth).powi(year - self.base_year)
    }

    /// Deterministic synthetic population. Same seed, same households.
    pub fn synthetic(households: usize, seed: u64) -> Self {
        let mut hh_rng = DatasetRng::new(seed, RngStream::Households);
        let mut pay_rng = DatasetRng::new(seed, RngStream::Earnings);
        let mut pension_rng = DatasetRng::new(seed, RngStream::Pensions);
        let mut other_rng = DatasetRng::new(seed, RngStream::OtherIncome);

        let generated = (0..households)
            .map(|i| {
                let adults = 1 + hh_rng.next_u64_below(2) as usize;
                let weight = hh_rng.uniform(800.0, 1600.0).round();
                let people = (0..adults)
                    .map(|_| synthetic_person(&mut pay_rng, &mut pension_rng, &mut other_rng))
                    .collect();
                Household { id: format!("hh-{i:05}"), weight, people }
            })
            .collect();

        Dataset {
            base_year:       2026,
            earnings_growth: 0.03,
            years:           (2024, 2030),
            households:      generated,
        }
    }
}

fn synthetic_person(
    pay_rng: &mut DatasetRng,
    pension_rng: &mut DatasetRng,
    other_rng: &mut DatasetRng,
) -> Person {
    let employed = pay_rng.chance(0.75);
    let employment_income = if employed {
        pay_rng.log_normal(32_000.0, 0.6).round()
    } else {
        0.0
    };

    // Salary sacrifice take-up rises with pay; higher earners sacrifice
    // a larger share.
    let (salary_sacrifice_contributions, employee_pension_contributions) = if employed {
        let takeup = if employment_income > 50_000.0 { 0.45 } else { 0.2 };
        if pension_rng.chance(takeup) {
            let share = pension_rng.uniform(0.03, 0.15);
            ((employment_income * share).round(), 0.0)
        } else {
            (0.0, (employment_income * pension_rng.uniform(0.0, 0.05)).round())
        }
    } else {
        (0.0, 0.0)
    };

    let other_income = other_rng.log_normal(2_500.0, 1.0).round();

    let (income_tax_rate, employee_ni_rate, employer_ni_rate) = match employment_income {
        x if x <= 12_570.0  => (0.0, 0.0, 0.15),
        x if x <= 50_270.0  => (0.2, 0.08, 0.15),
        x if x <= 100_000.0 => (0.4, 0.02, 0.15),
        x if x <= 125_140.0 => (0.6, 0.02, 0.15),
        _                   => (0.45, 0.02, 0.15),
    };

    Person {
        employment_income,
        salary_sacrifice_contributions,
        employee_pension_contributions,
        other_income,
        income_tax_rate,
        employee_ni_rate,
        employer_ni_rate,
    }
}
