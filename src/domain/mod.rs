//! Core domain types and logic.

pub mod price_bar;
pub mod indicator;
pub mod parameters;
pub mod frame;
pub mod strategy;
pub mod position;
pub mod regime;
pub mod simulator;
pub mod portfolio;
pub mod metrics;
pub mod universe;
pub mod benchmark;
pub mod backtest;
pub mod optimizer;
pub mod config_validation;
pub mod settings;
pub mod cancel;
pub mod error;
