use std::collections::BTreeMap;

use bytes::Bytes;

use super::Subject;

/// Заголовки сообщения: ключ → несколько значений, ключи упорядочены.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Headers(BTreeMap<String, Vec<String>>);

/// Сообщение pub/sub.
///
/// После публикации сообщение неизменяемо: брокер раздаёт подписчикам один и
/// тот же `Arc<Message>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub subject: Subject,
    pub reply_to: Option<Subject>,
    pub payload: Bytes,
    pub headers: Option<Headers>,
}

impl Headers {
    pub fn new() -> Self {
        Self::default()
    }

    /// Заменяет все значения ключа одним значением.
    pub fn insert(
        &mut self,
        key: impl Into<String>,
        value: impl Into<String>,
    ) {
        self.0.insert(key.into(), vec![value.into()]);
    }

    /// Добавляет ещё одно значение к ключу.
    pub fn append(
        &mut self,
        key: impl Into<String>,
        value: impl Into<String>,
    ) {
        self.0.entry(key.into()).or_default().push(value.into());
    }

    /// Первое значение ключа.
    pub fn get(
        &self,
        key: &str,
    ) -> Option<&str> {
        self.0
            .get(key)
            .and_then(|values| values.first())
            .map(String::as_str)
    }

    pub fn get_all(
        &self,
        key: &str,
    ) -> &[String] {
        self.0.get(key).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_slice()))
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Headers {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut headers = Headers::new();
        for (k, v) in iter {
            headers.append(k, v);
        }
        headers
    }
}

impl Message {
    pub fn new(
        subject: Subject,
        payload: impl Into<Bytes>,
    ) -> Self {
        Self {
            subject,
            reply_to: None,
            payload: payload.into(),
            headers: None,
        }
    }

    pub fn with_reply_to(
        mut self,
        reply_to: Subject,
    ) -> Self {
        self.reply_to = Some(reply_to);
        self
    }

    pub fn with_headers(
        mut self,
        headers: Headers,
    ) -> Self {
        self.headers = Some(headers);
        self
    }

    /// Добавляет значение заголовка, создавая набор заголовков при первом
    /// вызове.
    pub fn with_header(
        mut self,
        key: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        self.headers.get_or_insert_with(Headers::new).append(key, value);
        self
    }

    /// Payload как UTF-8 строка (с заменой некорректных байтов).
    pub fn payload_str(&self) -> std::borrow::Cow<'_, str> {
        String::from_utf8_lossy(&self.payload)
    }
}
