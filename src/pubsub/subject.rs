use std::{fmt, str::FromStr, sync::Arc};

use zsub_error::SubjectError;

/// Разделитель токенов subject.
pub const TOKEN_SEPARATOR: char = '.';
/// Wildcard ровно на один токен.
pub const WILDCARD_SINGLE: &str = "*";
/// Wildcard на один и более хвостовых токенов.
pub const WILDCARD_FULL: &str = ">";

/// Subject публикации: непустые токены через `.`, без пробелов и wildcard.
///
/// Строка хранится в `Arc<str>`, поэтому клонирование дешёвое - одно и то
/// же сообщение расходится по многим подпискам.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Subject(Arc<str>);

/// Токен шаблона подписки.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PatternToken {
    /// Точное совпадение токена.
    Literal(Box<str>),
    /// `*` - ровно один токен.
    Single,
    /// `>` - один и более токенов, всегда последний.
    Full,
}

/// Шаблон подписки (`foo.*`, `foo.>`, `foo.bar`).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Pattern {
    tokens: Vec<PatternToken>,
    original: Arc<str>,
}

////////////////////////////////////////////////////////////////////////////////
// Собственные методы
////////////////////////////////////////////////////////////////////////////////

impl Subject {
    /// Разбирает subject публикации.
    ///
    /// # Ошибки
    /// - `SubjectError::Empty`, `EmptyToken`, `Whitespace` - нарушена форма;
    /// - `SubjectError::WildcardInSubject` - в subject есть `*` или `>`.
    pub fn parse(subject: &str) -> Result<Self, SubjectError> {
        for (position, token) in split_tokens(subject)?.enumerate() {
            if token == WILDCARD_SINGLE || token == WILDCARD_FULL {
                return Err(SubjectError::WildcardInSubject { position });
            }
        }
        Ok(Self(Arc::from(subject)))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Токены subject слева направо.
    pub fn tokens(&self) -> impl Iterator<Item = &str> {
        self.0.split(TOKEN_SEPARATOR)
    }

    pub fn token_count(&self) -> usize {
        self.tokens().count()
    }
}

impl Pattern {
    /// Разбирает шаблон подписки.
    ///
    /// `>` допускается только последним токеном. Токен, в котором wildcard
    /// смешан с другими символами (`foo*`), считается литералом.
    pub fn parse(pattern: &str) -> Result<Self, SubjectError> {
        let raw: Vec<&str> = split_tokens(pattern)?.collect();
        let last = raw.len() - 1;

        let mut tokens = Vec::with_capacity(raw.len());
        for (position, token) in raw.into_iter().enumerate() {
            let token = match token {
                WILDCARD_SINGLE => PatternToken::Single,
                WILDCARD_FULL if position == last => PatternToken::Full,
                WILDCARD_FULL => return Err(SubjectError::FullWildcardNotLast { position }),
                literal => PatternToken::Literal(literal.into()),
            };
            tokens.push(token);
        }

        Ok(Self {
            tokens,
            original: Arc::from(pattern),
        })
    }

    pub fn as_str(&self) -> &str {
        &self.original
    }

    pub fn tokens(&self) -> &[PatternToken] {
        &self.tokens
    }

    /// Шаблон без wildcard-токенов совпадает ровно с одним subject.
    pub fn is_literal(&self) -> bool {
        self.tokens
            .iter()
            .all(|t| matches!(t, PatternToken::Literal(_)))
    }

    /// Проверяет, подходит ли subject под этот шаблон.
    pub fn matches(
        &self,
        subject: &Subject,
    ) -> bool {
        matches(subject, self)
    }
}

/// Сопоставляет subject с шаблоном.
///
/// Чистая функция: `>` на позиции `i` совпадает, если у subject есть хотя бы
/// `i + 1` токенов; `*` поглощает ровно один токен; литералы сравниваются
/// побайтно.
pub fn matches(
    subject: &Subject,
    pattern: &Pattern,
) -> bool {
    let mut subject_tokens = subject.tokens();

    for token in pattern.tokens() {
        let Some(next) = subject_tokens.next() else {
            return false;
        };
        match token {
            PatternToken::Full => return true,
            PatternToken::Single => {}
            PatternToken::Literal(literal) => {
                if literal.as_ref() != next {
                    return false;
                }
            }
        }
    }

    subject_tokens.next().is_none()
}

/// Проверяет имя queue group: один непустой токен без пробелов и точек.
pub fn validate_queue_group(name: &str) -> Result<(), SubjectError> {
    if name.is_empty() || name.contains(TOKEN_SEPARATOR) || name.chars().any(char::is_whitespace)
    {
        return Err(SubjectError::InvalidQueueGroup {
            name: name.to_string(),
        });
    }
    Ok(())
}

fn split_tokens(raw: &str) -> Result<std::str::Split<'_, char>, SubjectError> {
    if raw.is_empty() {
        return Err(SubjectError::Empty);
    }
    for (position, token) in raw.split(TOKEN_SEPARATOR).enumerate() {
        if token.is_empty() {
            return Err(SubjectError::EmptyToken { position });
        }
        if token.chars().any(char::is_whitespace) {
            return Err(SubjectError::Whitespace { position });
        }
    }
    Ok(raw.split(TOKEN_SEPARATOR))
}

////////////////////////////////////////////////////////////////////////////////
// Общие реализации трейтов
////////////////////////////////////////////////////////////////////////////////

impl fmt::Display for Subject {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Display for Pattern {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        f.write_str(&self.original)
    }
}

impl AsRef<str> for Subject {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl AsRef<str> for Pattern {
    fn as_ref(&self) -> &str {
        &self.original
    }
}

impl FromStr for Subject {
    type Err = SubjectError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl FromStr for Pattern {
    type Err = SubjectError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

////////////////////////////////////////////////////////////////////////////////
// Тесты
////////////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    fn subject(s: &str) -> Subject {
        Subject::parse(s).unwrap()
    }

    fn pattern(s: &str) -> Pattern {
        Pattern::parse(s).unwrap()
    }

    /// Тест проверяет таблицу совпадений для литералов и обоих wildcard.
    #[rstest]
    #[case("foo.bar", "foo.bar", true)]
    #[case("foo.bar", "foo.baz", false)]
    #[case("foo.bar", "foo", false)]
    #[case("foo", "foo.bar", false)]
    #[case("foo.star", "foo.*", true)]
    #[case("foo.bar.plop", "foo.*", false)]
    #[case("foo", "foo.*", false)]
    #[case("foo.bar.plop", "foo.>", true)]
    #[case("foo.greater.than", "foo.>", true)]
    #[case("foo", "foo.>", false)]
    #[case("a.b.c", "*.b.*", true)]
    #[case("a.x.c", "*.b.*", false)]
    #[case("a", ">", true)]
    #[case("a.b.c.d", ">", true)]
    #[case("a.b.c.d", "a.*.>", true)]
    #[case("a.b", "a.*.>", false)]
    #[case("foo*", "foo*", true)]
    #[case("fooX", "foo*", false)]
    fn test_matches_table(
        #[case] s: &str,
        #[case] p: &str,
        #[case] expected: bool,
    ) {
        assert_eq!(
            matches(&subject(s), &pattern(p)),
            expected,
            "subject={s} pattern={p}"
        );
    }

    /// Тест проверяет, что некорректные шаблоны отклоняются с нужной ошибкой.
    #[rstest]
    #[case("", SubjectError::Empty)]
    #[case("foo..bar", SubjectError::EmptyToken { position: 1 })]
    #[case(".foo", SubjectError::EmptyToken { position: 0 })]
    #[case("foo.", SubjectError::EmptyToken { position: 1 })]
    #[case("foo. bar", SubjectError::Whitespace { position: 1 })]
    #[case("foo.>.bar", SubjectError::FullWildcardNotLast { position: 1 })]
    #[case(">.foo", SubjectError::FullWildcardNotLast { position: 0 })]
    fn test_invalid_patterns(
        #[case] p: &str,
        #[case] expected: SubjectError,
    ) {
        assert_eq!(Pattern::parse(p).unwrap_err(), expected);
    }

    /// Тест проверяет, что subject публикации не может содержать wildcard.
    #[test]
    fn test_subject_rejects_wildcards() {
        assert_eq!(
            Subject::parse("foo.*").unwrap_err(),
            SubjectError::WildcardInSubject { position: 1 }
        );
        assert_eq!(
            Subject::parse(">").unwrap_err(),
            SubjectError::WildcardInSubject { position: 0 }
        );
        assert!(Subject::parse("foo.bar*").is_ok());
    }

    #[test]
    fn test_pattern_tokens_and_literal_flag() {
        let p = pattern("foo.*.>");
        assert_eq!(
            p.tokens(),
            &[
                PatternToken::Literal("foo".into()),
                PatternToken::Single,
                PatternToken::Full
            ]
        );
        assert!(!p.is_literal());
        assert!(pattern("foo.bar").is_literal());
        assert_eq!(p.to_string(), "foo.*.>");
    }

    #[test]
    fn test_subject_accessors() {
        let s: Subject = "requestSubject.part".parse().unwrap();
        assert_eq!(s.as_str(), "requestSubject.part");
        assert_eq!(s.token_count(), 2);
        assert_eq!(
            s.tokens().collect::<Vec<_>>(),
            vec!["requestSubject", "part"]
        );
    }

    #[test]
    fn test_validate_queue_group() {
        assert!(validate_queue_group("myQueue").is_ok());
        assert!(validate_queue_group("").is_err());
        assert!(validate_queue_group("my.queue").is_err());
        assert!(validate_queue_group("my queue").is_err());
    }
}
