use std::path::Path;

use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};

use super::BrokerConfig;
use crate::{error::ConfigError, logging::LoggingConfig, pubsub::DEFAULT_INBOX_PREFIX};

/// Полный набор настроек встраиваемого брокера.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub broker: BrokerConfig,
    pub logging: LoggingConfig,
}

impl Settings {
    /// Загружает настройки: значения по умолчанию, затем файл (если указан),
    /// затем переменные окружения с префиксом `ZSUB_`.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut builder = Config::builder()
            // Добавляем значения по умолчанию
            .set_default("broker.inbox_prefix", DEFAULT_INBOX_PREFIX)?
            .set_default("logging.level", "info")?;

        if let Some(path) = path {
            builder = builder.add_source(File::from(path));
        }

        // Переменные окружения с префиксом ZSUB_, вложенность через "__"
        let cfg = builder
            .add_source(
                Environment::with_prefix("ZSUB")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let settings: Settings = cfg.try_deserialize()?;
        settings.broker.validate()?;
        Ok(settings)
    }
}
