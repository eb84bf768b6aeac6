//! Ошибки уровня крейта.
//!
//! Ошибки pub/sub ядра живут в крейте `zsub-error` и переэкспортируются
//! отсюда; здесь - ошибки конфигурации и инициализации логирования.

use std::any::Any;

use thiserror::Error;

pub use zsub_error::{
    ErrorExt, LogLevel, PubSubError, PubSubResult, StatusCode, SubjectError,
};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Error)]
pub enum LoggingError {
    #[error("invalid log filter directive '{directive}': {reason}")]
    InvalidDirective { directive: String, reason: String },

    #[error("global tracing subscriber is already set: {0}")]
    AlreadyInitialized(#[from] tracing_subscriber::util::TryInitError),
}

impl ErrorExt for ConfigError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::Invalid(_) => StatusCode::InvalidArgs,
            Self::Load(_) => StatusCode::Internal,
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl ErrorExt for LoggingError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidDirective { .. } => StatusCode::InvalidArgs,
            Self::AlreadyInitialized(_) => StatusCode::Internal,
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
