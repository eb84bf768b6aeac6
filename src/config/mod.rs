//! Конфигурация брокера и логирования.
//!
//! Источники (по возрастанию приоритета): значения по умолчанию, TOML-файл,
//! переменные окружения `ZSUB_*` (вложенность через `__`, например
//! `ZSUB_BROKER__MAILBOX__CAPACITY=1024`).

mod broker;
mod settings;

pub use broker::BrokerConfig;
pub use settings::Settings;
