//! Domain error types.
//!
//! Configuration problems are fatal and abort a run before it starts.
//! Per-signal problems never surface here; see
//! [`SignalRejection`](crate::domain::portfolio::SignalRejection).

/// A strategy definition that cannot be executed.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConfigurationError {
    #[error("undefined constant: @{name}")]
    UnresolvedConstant { name: String },

    #[error("unknown indicator type '{kind}' (indicator '{indicator}')")]
    UnknownIndicator { indicator: String, kind: String },

    #[error("invalid parameter '{param}' for indicator '{indicator}': {reason}")]
    InvalidParameter {
        indicator: String,
        param: String,
        reason: String,
    },

    #[error("unknown instrument '{name}' referenced by {context}")]
    UnknownInstrument { name: String, context: String },

    #[error("unknown series '{name}' in rule '{rule}'")]
    UnknownSeries { name: String, rule: String },

    #[error("invalid condition in rule '{rule}': {reason}")]
    InvalidCondition { rule: String, reason: String },

    #[error("output column '{column}' is produced more than once")]
    DuplicateColumn { column: String },
}

/// Top-level error type for optrader.
#[derive(Debug, thiserror::Error)]
pub enum OptraderError {
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

    #[error("strategy parse error in {file}: {reason}")]
    StrategyParse { file: String, reason: String },

    #[error(transparent)]
    Configuration(#[from] ConfigurationError),

    #[error("no data for {symbol}")]
    NoData { symbol: String },

    #[error("data format error: {reason}")]
    DataFormat { reason: String },

    #[error("timestamp gap at bar {index}: {previous} -> {current}")]
    DataGap {
        index: usize,
        previous: chrono::NaiveDateTime,
        current: chrono::NaiveDateTime,
    },

    #[error("report error: {reason}")]
    Report { reason: String },

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl From<&OptraderError> for std::process::ExitCode {
    fn from(err: &OptraderError) -> Self {
        let code: u8 = match err {
            OptraderError::Io(_) | OptraderError::Report { .. } | OptraderError::Json(_) => 1,
            OptraderError::ConfigParse { .. }
            | OptraderError::ConfigMissing { .. }
            | OptraderError::ConfigInvalid { .. } => 2,
            OptraderError::StrategyParse { .. } | OptraderError::Configuration(_) => 4,
            OptraderError::NoData { .. }
            | OptraderError::DataFormat { .. }
            | OptraderError::DataGap { .. } => 5,
        };
        std::process::ExitCode::from(code)
    }
}
