use serde::{Deserialize, Serialize};

/// Формат вывода событий.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    #[default]
    Compact,
    Pretty,
    Json,
}

/// Настройки логирования.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Уровень или директива `EnvFilter` (`"info"`, `"zsub=debug"`).
    /// `RUST_LOG` имеет приоритет.
    pub level: String,
    pub format: LogFormat,
    pub with_target: bool,
    pub with_ansi: bool,
    pub with_thread_ids: bool,
    pub with_line_numbers: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::default(),
            with_target: true,
            with_ansi: true,
            with_thread_ids: false,
            with_line_numbers: false,
        }
    }
}

impl LoggingConfig {
    /// Директива для `EnvFilter`.
    pub fn build_filter_directive(&self) -> String {
        if self.level.trim().is_empty() {
            "info".to_string()
        } else {
            self.level.trim().to_string()
        }
    }
}
