pub mod config;
mod filters;
mod formatter;

pub use config::{LogFormat, LoggingConfig};
pub use filters::build_filter_from_config;
pub use formatter::{build_formatter_from_config, build_formatter_with_writer};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::error::LoggingError;

/// Устанавливает глобальный tracing-подписчик по конфигурации.
///
/// Библиотека сама ничего не инициализирует: вызывать это должно
/// приложение, встраивающее брокер. Повторный вызов возвращает
/// [`LoggingError::AlreadyInitialized`].
pub fn init_logging(config: &LoggingConfig) -> Result<(), LoggingError> {
    let env_filter = build_filter_from_config(config)?;
    let fmt_layer = build_formatter_from_config(config);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .try_init()?;

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        commit = env!("GIT_COMMIT"),
        built = env!("BUILD_TIME"),
        log_level = %config.level,
        format = ?config.format,
        "Logging system initialized"
    );

    Ok(())
}
