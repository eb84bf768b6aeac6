use serde::{Deserialize, Serialize};

use crate::{
    error::ConfigError,
    pubsub::{DistributionPolicy, MailboxConfig, Subject, DEFAULT_INBOX_PREFIX},
};

/// Настройки брокера.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BrokerConfig {
    /// Размер и политика переполнения mailbox каждой подписки.
    pub mailbox: MailboxConfig,
    /// Политика выбора участника queue group.
    pub distribution: DistributionPolicy,
    /// Префикс reply-subject для request-reply.
    pub inbox_prefix: String,
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            mailbox: MailboxConfig::default(),
            distribution: DistributionPolicy::default(),
            inbox_prefix: DEFAULT_INBOX_PREFIX.to_string(),
        }
    }
}

impl BrokerConfig {
    /// Проверяет согласованность настроек.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.mailbox.capacity == Some(0) {
            return Err(ConfigError::Invalid(
                "mailbox.capacity must be greater than zero".to_string(),
            ));
        }
        Subject::parse(&self.inbox_prefix).map_err(|e| {
            ConfigError::Invalid(format!("inbox_prefix '{}': {e}", self.inbox_prefix))
        })?;
        Ok(())
    }
}
