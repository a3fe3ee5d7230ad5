//! Shared primitive types used across the analysis.

/// A tax year, identified by the calendar year it starts in (2026 = 2026-27).
pub type Year = i32;

/// An amount of money in pounds sterling.
pub type Gbp = f64;

/// One pound-billion, the unit revenue figures are reported in.
pub const BILLION: f64 = 1e9;
