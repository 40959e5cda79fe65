//! Symbol lists and skipped-symbol bookkeeping.
//!
//! Parses symbol lists from configuration and records why a symbol was left
//! out of a run.

use serde::Serialize;
use std::collections::HashSet;
use std::fmt;

use crate::domain::error::TrendsimError;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum UniverseError {
    #[error("empty token in symbol list")]
    EmptyToken,

    #[error("duplicate symbol: {0}")]
    DuplicateSymbol(String),
}

pub fn parse_symbols(input: &str) -> Result<Vec<String>, UniverseError> {
    let mut symbols = Vec::new();
    let mut seen = HashSet::new();

    for token in input.split(',') {
        let trimmed = token.trim();
        if trimmed.is_empty() {
            return Err(UniverseError::EmptyToken);
        }
        let symbol = trimmed.to_uppercase();
        if !seen.insert(symbol.clone()) {
            return Err(UniverseError::DuplicateSymbol(symbol));
        }
        symbols.push(symbol);
    }

    Ok(symbols)
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SkippedSymbol {
    pub symbol: String,
    pub reason: SkipReason,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SkipReason {
    NotFound,
    NoData,
    InsufficientBars { bars: usize, required: usize },
    InvalidData { reason: String },
    Computation { reason: String },
}

impl SkipReason {
    pub fn from_error(err: &TrendsimError) -> Self {
        match err {
            TrendsimError::SymbolNotFound { .. } => SkipReason::NotFound,
            TrendsimError::InsufficientData { bars: 0, .. } => SkipReason::NoData,
            TrendsimError::InsufficientData { bars, required, .. } => {
                SkipReason::InsufficientBars {
                    bars: *bars,
                    required: *required,
                }
            }
            TrendsimError::DataUnavailable { reason, .. } => SkipReason::InvalidData {
                reason: reason.clone(),
            },
            TrendsimError::Computation { reason, .. } => SkipReason::Computation {
                reason: reason.clone(),
            },
            other => SkipReason::Computation {
                reason: other.to_string(),
            },
        }
    }
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::NotFound => write!(f, "symbol not found"),
            SkipReason::NoData => write!(f, "no data in window"),
            SkipReason::InsufficientBars { bars, required } => {
                write!(f, "only {} bars, {} required", bars, required)
            }
            SkipReason::InvalidData { reason } => write!(f, "invalid data: {}", reason),
            SkipReason::Computation { reason } => write!(f, "computation failed: {}", reason),
        }
    }
}
