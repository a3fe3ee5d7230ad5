//! Frame engine — an in-process, linearised microsimulation over a
//! `Dataset`.
//!
//! Each person carries effective marginal rates exported by the full engine.
//! Taxes are those rates applied to the (possibly reformed) inputs:
//!
//!   income tax   = income_tax_rate  × max(employment_income − employee_pension, 0)
//!   employee NI  = employee_ni_rate × employment_income
//!   employer NI  = employer_ni_rate × employment_income
//!
//! Household variables sum over members. Persons are ordered household by
//! household, in dataset order.

use crate::{
    dataset::Dataset,
    error::{CapError, CapResult},
    simulation::{ensure_len, Entity, Microsimulation, SimulationBackend, Variable},
    types::Year,
};
use std::collections::HashMap;
use std::rc::Rc;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FrameOptions {
    /// Count pension contributions (employee and salary sacrifice) as part
    /// of household net income, so swapping pension for pay is not an
    /// income gain.
    pub net_income_includes_pensions: bool,
}

pub struct FrameBackend {
    dataset: Rc<Dataset>,
    options: FrameOptions,
}

impl FrameBackend {
    pub fn new(dataset: Dataset, options: FrameOptions) -> Self {
        Self { dataset: Rc::new(dataset), options }
    }
}

impl SimulationBackend for FrameBackend {
    fn name(&self) -> &'static str { "frame" }

    fn simulation(&self) -> CapResult<Box<dyn Microsimulation>> {
        Ok(Box::new(FrameSimulation::new(Rc::clone(&self.dataset), self.options)))
    }
}

pub struct FrameSimulation {
    dataset:      Rc<Dataset>,
    options:      FrameOptions,
    /// Household index of every person.
    person_hh:    Vec<usize>,
    overrides:    HashMap<(Variable, Year), Vec<f64>>,
}

impl FrameSimulation {
    pub fn new(dataset: Rc<Dataset>, options: FrameOptions) -> Self {
        let person_hh = dataset
            .households
            .iter()
            .enumerate()
            .flat_map(|(h, hh)| std::iter::repeat(h).take(hh.people.len()))
            .collect();
        Self { dataset, options, person_hh, overrides: HashMap::new() }
    }

    fn entity_count(&self, entity: Entity) -> usize {
        match entity {
            Entity::Person    => self.person_hh.len(),
            Entity::Household => self.dataset.households.len(),
        }
    }

    fn check_year(&self, year: Year) -> CapResult<()> {
        if self.dataset.covers(year) {
            Ok(())
        } else {
            let (from, through) = self.dataset.years;
            Err(CapError::Engine(format!(
                "No data for year {year}: dataset covers {from}..={through}"
            )))
        }
    }

    fn input(&self, variable: Variable, year: Year) -> Vec<f64> {
        if let Some(values) = self.overrides.get(&(variable, year)) {
            return values.clone();
        }
        let uprating = self.dataset.uprating(year);
        self.people()
            .map(|p| {
                let base = match variable {
                    Variable::EmploymentIncome => p.employment_income,
                    Variable::PensionContributionsViaSalarySacrifice => {
                        p.salary_sacrifice_contributions
                    }
                    Variable::EmployeePensionContributions => p.employee_pension_contributions,
                    _ => unreachable!("{variable} is not an input"),
                };
                base * uprating
            })
            .collect()
    }

    fn people(&self) -> impl Iterator<Item = &crate::dataset::Person> + '_ {
        self.dataset.households.iter().flat_map(|h| h.people.iter())
    }

    fn sum_by_household(&self, person_values: impl Iterator<Item = f64>) -> Vec<f64> {
        let mut totals = vec![0.0; self.dataset.households.len()];
        for (value, &h) in person_values.zip(&self.person_hh) {
            totals[h] += value;
        }
        totals
    }

    fn gov_balance(&self, year: Year) -> Vec<f64> {
        let income = self.input(Variable::EmploymentIncome, year);
        let pension = self.input(Variable::EmployeePensionContributions, year);
        let per_person = self.people().enumerate().map(|(i, p)| {
            let income_tax = p.income_tax_rate * (income[i] - pension[i]).max(0.0);
            let employee_ni = p.employee_ni_rate * income[i];
            let employer_ni = p.employer_ni_rate * income[i];
            income_tax + employee_ni + employer_ni
        });
        self.sum_by_household(per_person)
    }

    fn household_net_income(&self, year: Year) -> Vec<f64> {
        let income = self.input(Variable::EmploymentIncome, year);
        let pension = self.input(Variable::EmployeePensionContributions, year);
        let sacrifice = self.input(Variable::PensionContributionsViaSalarySacrifice, year);
        let uprating = self.dataset.uprating(year);
        let with_pensions = self.options.net_income_includes_pensions;

        let per_person = self.people().enumerate().map(|(i, p)| {
            let income_tax = p.income_tax_rate * (income[i] - pension[i]).max(0.0);
            let employee_ni = p.employee_ni_rate * income[i];
            let mut net = income[i] + p.other_income * uprating
                - income_tax
                - employee_ni
                - pension[i];
            if with_pensions {
                net += pension[i] + sacrifice[i];
            }
            net
        });
        self.sum_by_household(per_person)
    }

    fn income_decile(&self, year: Year) -> Vec<f64> {
        let net = self.household_net_income(year);
        let weights: Vec<f64> = self.dataset.households.iter().map(|h| h.weight).collect();
        weighted_deciles(&net, &weights)
    }
}

impl Microsimulation for FrameSimulation {
    fn calculate(&mut self, variable: Variable, year: Year) -> CapResult<Vec<f64>> {
        self.check_year(year)?;
        log::debug!("frame calculate {variable} year={year}");
        let values = match variable {
            Variable::EmploymentIncome
            | Variable::PensionContributionsViaSalarySacrifice
            | Variable::EmployeePensionContributions => self.input(variable, year),
            Variable::PersonWeight => self
                .person_hh
                .iter()
                .map(|&h| self.dataset.households[h].weight)
                .collect(),
            Variable::HouseholdWeight => {
                self.dataset.households.iter().map(|h| h.weight).collect()
            }
            Variable::HouseholdNetIncome => self.household_net_income(year),
            Variable::IncomeDecile => self.income_decile(year),
            Variable::GovBalance => self.gov_balance(year),
        };
        Ok(values)
    }

    fn set_input(&mut self, variable: Variable, year: Year, values: Vec<f64>) -> CapResult<()> {
        self.check_year(year)?;
        if !variable.is_input() {
            return Err(CapError::Engine(format!(
                "Variable {variable} is computed and cannot be set as an input"
            )));
        }
        ensure_len(variable, self.entity_count(variable.entity()), values.len())?;
        log::debug!("frame set_input {variable} year={year}");
        self.overrides.insert((variable, year), values);
        Ok(())
    }
}

/// Weighted income deciles, 1..=10. Ties keep dataset order. With no
/// positive weight every entity counts equally.
pub fn weighted_deciles(values: &[f64], weights: &[f64]) -> Vec<f64> {
    let n = values.len();
    let mut order: Vec<usize> = (0..n).collect();
    order.sort_by(|&a, &b| values[a].total_cmp(&values[b]));

    let total: f64 = weights.iter().sum();
    let (weights, total): (Vec<f64>, f64) = if total > 0.0 {
        (weights.to_vec(), total)
    } else {
        (vec![1.0; n], n as f64)
    };

    let mut deciles = vec![0.0; n];
    let mut cumulative = 0.0;
    for idx in order {
        let decile = (cumulative * 10.0 / total).floor() as i64 + 1;
        deciles[idx] = decile.clamp(1, 10) as f64;
        cumulative += weights[idx];
    }
    deciles
}
