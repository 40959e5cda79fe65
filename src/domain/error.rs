//! Domain error types.

use chrono::NaiveDate;

/// Top-level error type for trendsim.
///
/// Every data-bound variant names the symbol and the requested window so the
/// caller can tell which part of a multi-symbol run failed.
#[derive(Debug, thiserror::Error)]
pub enum TrendsimError {
    #[error("config parse error in {file}: {reason}")]
    ConfigParse { file: String, reason: String },

    #[error("missing config key [{section}] {key}")]
    ConfigMissing { section: String, key: String },

    #[error("invalid config value [{section}] {key}: {reason}")]
    ConfigInvalid {
        section: String,
        key: String,
        reason: String,
    },

    #[error("invalid parameter {name}: {reason}")]
    InvalidParameter { name: String, reason: String },

    #[error("{symbol} is not a known symbol ({start} to {end})")]
    SymbolNotFound {
        symbol: String,
        start: NaiveDate,
        end: NaiveDate,
    },

    #[error("no data for {symbol} from {start} to {end}: {reason}")]
    DataUnavailable {
        symbol: String,
        start: NaiveDate,
        end: NaiveDate,
        reason: String,
    },

    #[error(
        "insufficient data for {symbol} from {start} to {end}: have {bars} bars, need {required}"
    )]
    InsufficientData {
        symbol: String,
        start: NaiveDate,
        end: NaiveDate,
        bars: usize,
        required: usize,
    },

    #[error("computation failed for {symbol} from {start} to {end}: {reason}")]
    Computation {
        symbol: String,
        start: NaiveDate,
        end: NaiveDate,
        reason: String,
    },

    #[error("operation cancelled")]
    Cancelled,

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl TrendsimError {
    pub fn invalid_parameter(name: &str, reason: impl Into<String>) -> Self {
        TrendsimError::InvalidParameter {
            name: name.to_string(),
            reason: reason.into(),
        }
    }

    /// True for the variants that describe missing or short market data.
    pub fn is_data_error(&self) -> bool {
        matches!(
            self,
            TrendsimError::SymbolNotFound { .. }
                | TrendsimError::DataUnavailable { .. }
                | TrendsimError::InsufficientData { .. }
        )
    }
}

impl From<&TrendsimError> for std::process::ExitCode {
    fn from(err: &TrendsimError) -> Self {
        let code: u8 = match err {
            TrendsimError::Io(_) => 1,
            TrendsimError::ConfigParse { .. }
            | TrendsimError::ConfigMissing { .. }
            | TrendsimError::ConfigInvalid { .. }
            | TrendsimError::InvalidParameter { .. } => 2,
            TrendsimError::SymbolNotFound { .. }
            | TrendsimError::DataUnavailable { .. }
            | TrendsimError::InsufficientData { .. } => 5,
            TrendsimError::Computation { .. } => 6,
            TrendsimError::Cancelled => 130,
        };
        std::process::ExitCode::from(code)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn data_errors_name_symbol_and_window() {
        let err = TrendsimError::DataUnavailable {
            symbol: "NVDA".into(),
            start: date(2023, 1, 1),
            end: date(2023, 9, 30),
            reason: "no bars returned".into(),
        };
        let msg = err.to_string();
        assert!(msg.contains("NVDA"));
        assert!(msg.contains("2023-01-01"));
        assert!(msg.contains("2023-09-30"));
    }

    #[test]
    fn symbol_not_found_message() {
        let err = TrendsimError::SymbolNotFound {
            symbol: "ZZZZ".into(),
            start: date(2021, 3, 15),
            end: date(2024, 11, 15),
        };
        assert_eq!(
            err.to_string(),
            "ZZZZ is not a known symbol (2021-03-15 to 2024-11-15)"
        );
    }

    #[test]
    fn is_data_error_classification() {
        let data = TrendsimError::InsufficientData {
            symbol: "A".into(),
            start: date(2024, 1, 1),
            end: date(2024, 2, 1),
            bars: 3,
            required: 34,
        };
        assert!(data.is_data_error());
        assert!(!TrendsimError::Cancelled.is_data_error());
        assert!(!TrendsimError::invalid_parameter("fast", "must be positive").is_data_error());
    }
}
