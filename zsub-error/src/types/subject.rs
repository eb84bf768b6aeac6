use std::any::Any;

use thiserror::Error;

use crate::{ErrorExt, StatusCode};

/// Ошибки разбора subject, шаблона подписки или имени queue group.
///
/// `position` - номер токена (с нуля), на котором обнаружена проблема.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SubjectError {
    #[error("subject is empty")]
    Empty,

    #[error("empty token at position {position}")]
    EmptyToken { position: usize },

    #[error("whitespace in token at position {position}")]
    Whitespace { position: usize },

    #[error("'>' wildcard must be the last token, found at position {position}")]
    FullWildcardNotLast { position: usize },

    #[error("wildcard token at position {position} is not allowed in a publish subject")]
    WildcardInSubject { position: usize },

    #[error("invalid queue group name '{name}'")]
    InvalidQueueGroup { name: String },
}

impl ErrorExt for SubjectError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::WildcardInSubject { .. } => StatusCode::InvalidSubject,
            Self::InvalidQueueGroup { .. } => StatusCode::InvalidQueueGroup,
            _ => StatusCode::InvalidPattern,
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
