use thiserror::Error;

/// Domain failures of a CPI run. Everything except `MalformedObservation`
/// aborts the run before any artifact is written.
#[derive(Debug, Error)]
pub enum CpiError {
    #[error("monthly table has no `{column}` column")]
    Schema { column: String },
    #[error("monthly table has no numeric value to anchor on")]
    EmptyTable,
    #[error("remote fetch failed for {start_year}-{end_year} after {attempts} attempts: {message}")]
    RemoteFetch {
        start_year: i32,
        end_year: i32,
        attempts: u32,
        message: String,
    },
    #[error("malformed observation year={year} period={period}: {reason}")]
    MalformedObservation {
        year: String,
        period: String,
        reason: String,
    },
    #[error("daily value before {date} is exactly zero; refusing to compute multiplier")]
    ZeroBaseline { date: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CpiErrorCode {
    E001Schema,
    E002EmptyTable,
    E003RemoteFetch,
    E004MalformedObservation,
    E005ZeroBaseline,
}

impl CpiErrorCode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::E001Schema => "E001_SCHEMA",
            Self::E002EmptyTable => "E002_EMPTY_TABLE",
            Self::E003RemoteFetch => "E003_REMOTE_FETCH",
            Self::E004MalformedObservation => "E004_MALFORMED_OBSERVATION",
            Self::E005ZeroBaseline => "E005_ZERO_BASELINE",
        }
    }
}

impl CpiError {
    pub fn code(&self) -> CpiErrorCode {
        match self {
            Self::Schema { .. } => CpiErrorCode::E001Schema,
            Self::EmptyTable => CpiErrorCode::E002EmptyTable,
            Self::RemoteFetch { .. } => CpiErrorCode::E003RemoteFetch,
            Self::MalformedObservation { .. } => CpiErrorCode::E004MalformedObservation,
            Self::ZeroBaseline { .. } => CpiErrorCode::E005ZeroBaseline,
        }
    }
}
