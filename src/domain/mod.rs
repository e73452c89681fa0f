//! Core domain types and logic.

pub mod ohlcv;
pub mod position;
pub mod portfolio;
pub mod execution;
pub mod indicator;
pub mod strategy;
pub mod strategies;
pub mod backtest;
pub mod metrics;
pub mod regime;
pub mod adaptive;
pub mod decision;
pub mod technical_signal;
pub mod config_validation;
pub mod error;
