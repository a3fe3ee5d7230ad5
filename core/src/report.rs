//! Result reporting — console text, CSV and JSON exports.
//!
//! RULE: reporting never runs a simulation and never changes a result.
//! Console writers take any `io::Write` so tests can capture output.

use crate::{
    analysis::{DecileImpact, ScenarioResult},
    error::CapResult,
    types::{Gbp, Year},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt::Write as _;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

const WIDE_RULE: usize = 70;
const NARROW_RULE: usize = 50;

/// Everything a JSON export carries.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Report {
    pub generated_at:   DateTime<Utc>,
    pub command:        String,
    pub results:        Vec<ScenarioResult>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub distributional: Option<Vec<DecileImpact>>,
}

impl Report {
    pub fn new(command: &str, results: Vec<ScenarioResult>) -> Self {
        Self {
            generated_at: Utc::now(),
            command: command.to_string(),
            results,
            distributional: None,
        }
    }

    pub fn with_distributional(mut self, rows: Vec<DecileImpact>) -> Self {
        self.distributional = Some(rows);
        self
    }
}

// ── Console ────────────────────────────────────────────────────────

pub fn write_matrix(out: &mut dyn Write, results: &[ScenarioResult]) -> io::Result<()> {
    writeln!(out, "{}", "=".repeat(WIDE_RULE))?;
    writeln!(out, "RESULTS: 2x2 Scenario Matrix")?;
    writeln!(out, "{}", "=".repeat(WIDE_RULE))?;
    writeln!(out)?;

    for r in results {
        let p = &r.parameters;
        writeln!(
            out,
            "{:<17} Employer: {:<16} | Employee: {:<16}",
            p.label(),
            p.employer_response().as_str(),
            p.employee_response().as_str()
        )?;
        writeln!(out, "  Cap:     £{}", group_thousands(p.cap(), 0))?;
        writeln!(out, "  Revenue: £{:.2}bn", r.revenue_impact)?;
        if r.revenue_by_year.len() > 1 {
            for y in &r.revenue_by_year {
                writeln!(out, "    {}: £{:.2}bn", y.year, y.revenue_bn)?;
            }
        }
        writeln!(out)?;
    }
    Ok(())
}

pub fn write_single(out: &mut dyn Write, result: &ScenarioResult) -> io::Result<()> {
    writeln!(out, "{}", "=".repeat(NARROW_RULE))?;
    writeln!(out, "Scenario: {} ({})", result.parameters.name(), result.parameters.label())?;
    for y in &result.revenue_by_year {
        writeln!(out, "Revenue impact ({}): £{:.2}bn", y.year, y.revenue_bn)?;
    }
    if result.revenue_by_year.len() > 1 {
        writeln!(out, "Average annual revenue: £{:.2}bn", result.revenue_impact)?;
    }
    let pop = &result.affected_population;
    writeln!(out, "Affected workers: {}", group_thousands(pop.affected_workers, 0))?;
    writeln!(
        out,
        "  {:.1}% of salary sacrificers, {:.1}% of all workers",
        pop.affected_workers_pct_of_ss, pop.affected_workers_pct_of_all
    )?;
    writeln!(out, "Excess above cap: £{:.2}bn", pop.total_excess_bn)?;
    writeln!(out, "{}", "=".repeat(NARROW_RULE))?;
    Ok(())
}

pub fn write_distributional(out: &mut dyn Write, rows: &[DecileImpact]) -> io::Result<()> {
    writeln!(out, "{}", "=".repeat(WIDE_RULE))?;
    writeln!(out, "DISTRIBUTIONAL IMPACT BY INCOME DECILE")?;
    writeln!(out, "{}", "=".repeat(WIDE_RULE))?;
    writeln!(out, "{:<10} {:>15} {:>12}", "Decile", "Avg Change", "% Change")?;
    writeln!(out, "{}", "-".repeat(WIDE_RULE))?;
    for row in rows {
        writeln!(
            out,
            "{:<10} £{:>14} {:>11.3}%",
            row.decile,
            group_thousands(row.avg_change, 2),
            row.pct_change
        )?;
    }
    Ok(())
}

// ── CSV ────────────────────────────────────────────────────────────

/// One row per scenario. Yearly revenue columns follow the years of the
/// first result.
pub fn matrix_csv(results: &[ScenarioResult]) -> String {
    let years: Vec<Year> = results.first().map(|r| r.years()).unwrap_or_default();

    let mut csv = String::from(
        "scenario,cap_amount,employer_response,employee_response,\
         avg_annual_revenue_bn,affected_workers,total_excess_bn",
    );
    for year in &years {
        let _ = write!(csv, ",revenue_{year}_bn");
    }
    csv.push('\n');

    for r in results {
        let p = &r.parameters;
        let _ = write!(
            csv,
            "{},{},{},{},{},{},{}",
            p.name(),
            p.cap(),
            p.employer_response(),
            p.employee_response(),
            r.revenue_impact,
            r.affected_population.affected_workers,
            r.affected_population.total_excess_bn
        );
        for &year in &years {
            match r.revenue_for(year) {
                Some(v) => { let _ = write!(csv, ",{v}"); }
                None    => csv.push(','),
            }
        }
        csv.push('\n');
    }
    csv
}

pub fn distributional_csv(rows: &[DecileImpact]) -> String {
    let mut csv = String::from(
        "decile,avg_baseline_income,avg_reformed_income,avg_change,pct_change,population\n",
    );
    for r in rows {
        let _ = writeln!(
            csv,
            "{},{},{},{},{},{}",
            r.decile,
            r.avg_baseline_income,
            r.avg_reformed_income,
            r.avg_change,
            r.pct_change,
            r.population
        );
    }
    csv
}

// ── Files ──────────────────────────────────────────────────────────

/// Caps are written the way scenario names write them, so distinct caps
/// never share a file.
pub fn matrix_file_name(caps: &[Gbp], year: Year) -> String {
    let caps: Vec<String> = caps.iter().map(|c| c.to_string()).collect();
    format!("scenario_matrix_cap_{}_{year}.csv", caps.join("-"))
}

pub fn distributional_file_name(cap: Gbp, year: Year) -> String {
    format!("distributional_cap_{cap}_{year}.csv")
}

/// Write `contents` to `dir/name`, creating `dir` if needed.
pub fn save_text(dir: &Path, name: &str, contents: &str) -> CapResult<PathBuf> {
    std::fs::create_dir_all(dir)?;
    let path = dir.join(name);
    std::fs::write(&path, contents)?;
    log::info!("Wrote {}", path.display());
    Ok(path)
}

pub fn save_json(path: &Path, report: &Report) -> CapResult<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    let json = serde_json::to_string_pretty(report)?;
    std::fs::write(path, json)?;
    log::info!("Wrote {}", path.display());
    Ok(())
}

/// `1234567.891` with 2 decimals -> `1,234,567.89`.
pub fn group_thousands(value: f64, decimals: usize) -> String {
    let formatted = format!("{:.*}", decimals, value.abs());
    let (int_part, frac_part) = match formatted.split_once('.') {
        Some((i, f)) => (i, Some(f)),
        None         => (formatted.as_str(), None),
    };

    let mut grouped = String::with_capacity(int_part.len() + int_part.len() / 3);
    for (i, ch) in int_part.chars().enumerate() {
        if i > 0 && (int_part.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }

    let negative = value < 0.0 && formatted.chars().any(|c| c.is_ascii_digit() && c != '0');
    let mut out = String::new();
    if negative {
        out.push('-');
    }
    out.push_str(&grouped);
    if let Some(f) = frac_part {
        out.push('.');
        out.push_str(f);
    }
    out
}
