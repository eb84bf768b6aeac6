use std::any::Any;

use thiserror::Error;

use crate::{ErrorExt, StatusCode, SubjectError};

/// Ошибки операций pub/sub ядра.
///
/// `Timeout` и `Cancelled` - терминальные исходы ожидания ответа.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PubSubError {
    #[error("invalid subscription pattern '{pattern}': {source}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: SubjectError,
    },

    #[error("invalid subject '{subject}': {source}")]
    InvalidSubject {
        subject: String,
        #[source]
        source: SubjectError,
    },

    #[error("unknown subscription {id}")]
    UnknownSubscription { id: u64 },

    #[error("no reply on '{subject}' within {timeout_ms} ms")]
    Timeout { subject: String, timeout_ms: u64 },

    #[error("request on '{subject}' was cancelled")]
    Cancelled { subject: String },
}

impl ErrorExt for PubSubError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidPattern { source, .. } => match source {
                SubjectError::InvalidQueueGroup { .. } => StatusCode::InvalidQueueGroup,
                _ => StatusCode::InvalidPattern,
            },
            Self::InvalidSubject { .. } => StatusCode::InvalidSubject,
            Self::UnknownSubscription { .. } => StatusCode::NotFound,
            Self::Timeout { .. } => StatusCode::Timeout,
            Self::Cancelled { .. } => StatusCode::Cancelled,
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn client_message(&self) -> String {
        match self {
            Self::InvalidPattern { .. } => "Invalid subscription pattern".to_string(),
            Self::InvalidSubject { .. } => "Invalid subject".to_string(),
            Self::UnknownSubscription { id } => format!("Unknown subscription: {id}"),
            Self::Timeout { .. } => "Request timeout".to_string(),
            Self::Cancelled { .. } => "Request cancelled".to_string(),
        }
    }
}

impl PubSubError {
    /// Истина для таймаута ожидания ответа.
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }
}

#[cfg(test)]
mod tests {
    use std::error::Error;

    use super::*;

    #[test]
    fn test_pubsub_error_display() {
        let err = PubSubError::Timeout {
            subject: "_INBOX.x.1".into(),
            timeout_ms: 200,
        };
        assert_eq!(err.to_string(), "no reply on '_INBOX.x.1' within 200 ms");
        assert!(err.is_timeout());
        assert_eq!(
            PubSubError::UnknownSubscription { id: 7 }.to_string(),
            "unknown subscription 7"
        );
    }

    /// Тест проверяет, что причина ошибки шаблона доступна через `source()`.
    #[test]
    fn test_invalid_pattern_keeps_source() {
        let err = PubSubError::InvalidPattern {
            pattern: "foo.>.bar".into(),
            source: SubjectError::FullWildcardNotLast { position: 1 },
        };
        let source = err.source().expect("source must be set");
        assert_eq!(
            source.to_string(),
            SubjectError::FullWildcardNotLast { position: 1 }.to_string()
        );
        assert_eq!(err.status_code(), StatusCode::InvalidPattern);
        assert_eq!(err.client_message(), "Invalid subscription pattern");
    }

    #[test]
    fn test_status_codes() {
        assert_eq!(
            PubSubError::UnknownSubscription { id: 1 }.status_code(),
            StatusCode::NotFound
        );
        assert_eq!(
            PubSubError::Cancelled {
                subject: "s".into()
            }
            .status_code(),
            StatusCode::Cancelled
        );
        let group = PubSubError::InvalidPattern {
            pattern: "foo".into(),
            source: SubjectError::InvalidQueueGroup { name: "".into() },
        };
        assert_eq!(group.status_code(), StatusCode::InvalidQueueGroup);
    }
}
