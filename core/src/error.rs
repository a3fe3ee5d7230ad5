use thiserror::Error;

#[derive(Error, Debug)]
pub enum CapError {
    #[error("Invalid cap amount: {0} (must be a finite, non-negative number of pounds)")]
    InvalidCap(f64),

    #[error("Invalid year: {0}")]
    InvalidYear(i32),

    #[error("Invalid rate for {name}: {value} (must be between 0 and 1)")]
    InvalidRate { name: &'static str, value: f64 },

    #[error("Unknown employer response '{0}' (expected spread, absorb or targeted)")]
    UnknownEmployerResponse(String),

    #[error("Unknown employee response '{0}' (expected maintain, cash or partial)")]
    UnknownEmployeeResponse(String),

    #[error("Partial redirect needs a pension redirect rate")]
    RedirectRateRequired,

    #[error("A pension redirect rate only applies to partial redirect, not {0}")]
    RedirectRateUnused(&'static str),

    #[error("Empty year range: {from}..={through}")]
    EmptyYearRange { from: i32, through: i32 },

    #[error("Length mismatch for '{variable}': expected {expected} values, got {actual}")]
    LengthMismatch {
        variable: String,
        expected: usize,
        actual:   usize,
    },

    #[error("Invalid dataset: {0}")]
    Dataset(String),

    /// An error reported by the simulation engine itself. The message is
    /// passed through untouched.
    #[error("{0}")]
    Engine(String),

    #[error("Engine bridge error: {0}")]
    Bridge(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl CapError {
    /// True for errors caused by bad user input rather than by the engine.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            Self::InvalidCap(_)
                | Self::InvalidYear(_)
                | Self::InvalidRate { .. }
                | Self::UnknownEmployerResponse(_)
                | Self::UnknownEmployeeResponse(_)
                | Self::RedirectRateRequired
                | Self::RedirectRateUnused(_)
                | Self::EmptyYearRange { .. }
        )
    }
}

pub type CapResult<T> = Result<T, CapError>;
