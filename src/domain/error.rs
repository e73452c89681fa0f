//! Domain error types.

use chrono::NaiveDateTime;

/// Failure raised from inside a strategy callback.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum StrategyError {
    #[error("indicator {indicator} unavailable: {reason}")]
    Indicator { indicator: String, reason: String },

    #[error("invalid strategy parameter {name}: {reason}")]
    InvalidParameter { name: String, reason: String },

    #[error("{0}")]
    Other(String),
}

/// Top-level error type for sigtrader.
#[derive(Debug, thiserror::Error)]
pub enum SigtraderError {
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

    #[error("data error in {source_name}: {reason}")]
    Data { source_name: String, reason: String },

    #[error("bars out of order at index {index}: {current} follows {previous}")]
    UnsortedBars {
        index: usize,
        previous: NaiveDateTime,
        current: NaiveDateTime,
    },

    #[error("duplicate bar timestamp {timestamp} at index {index}")]
    DuplicateTimestamp {
        index: usize,
        timestamp: NaiveDateTime,
    },

    #[error("invalid bar at index {index}: {reason}")]
    InvalidBar { index: usize, reason: String },

    #[error("invalid {field}: {reason}")]
    InvalidInput { field: String, reason: String },

    #[error("invalid decision thresholds: need 0 <= medium ({medium}) < strong ({strong}) <= 1")]
    InvalidThresholds { medium: f64, strong: f64 },

    #[error("unknown strategy '{name}'")]
    UnknownStrategy { name: String },

    #[error("strategy {strategy} failed at bar {index} ({timestamp}): {source}")]
    Strategy {
        strategy: String,
        index: usize,
        timestamp: NaiveDateTime,
        #[source]
        source: StrategyError,
    },

    #[error("a position is already open")]
    PositionAlreadyOpen,

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl From<&SigtraderError> for std::process::ExitCode {
    fn from(err: &SigtraderError) -> Self {
        let code: u8 = match err {
            SigtraderError::Io(_) | SigtraderError::Json(_) => 1,
            SigtraderError::ConfigParse { .. }
            | SigtraderError::ConfigMissing { .. }
            | SigtraderError::ConfigInvalid { .. }
            | SigtraderError::UnknownStrategy { .. } => 2,
            SigtraderError::Data { .. }
            | SigtraderError::UnsortedBars { .. }
            | SigtraderError::DuplicateTimestamp { .. }
            | SigtraderError::InvalidBar { .. } => 3,
            SigtraderError::Strategy { .. } | SigtraderError::PositionAlreadyOpen => 4,
            SigtraderError::InvalidInput { .. } | SigtraderError::InvalidThresholds { .. } => 5,
        };
        std::process::ExitCode::from(code)
    }
}
