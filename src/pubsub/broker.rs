use std::{
    sync::Arc,
    time::Duration,
};

use bytes::Bytes;
use tracing::{debug, trace};
use zsub_error::{PubSubError, PubSubResult};

use super::{
    request::Correlator, subject::validate_queue_group, BrokerMetrics, BrokerStats, Dispatcher,
    Message, Pattern, PendingRequest, PublishOutcome, Registry, Subject, Subscription,
    SubscriptionId,
};
use crate::{config::BrokerConfig, error::ConfigError};

/// Брокер pub/sub сообщений по subject.
///
/// Поддерживает:
/// - Подписки по шаблонам с wildcard `*` и `>`
/// - Queue group: каждое сообщение получает один участник группы
/// - Request-reply через одноразовые inbox-подписки
/// - Статистику публикаций и доставок
///
/// `Broker` - явный контекст, который создаёт и владеет встраивающее
/// приложение. Клонирование дешёвое: клоны разделяют одно состояние.
#[derive(Debug, Clone)]
pub struct Broker {
    inner: Arc<BrokerInner>,
}

#[derive(Debug)]
pub(crate) struct BrokerInner {
    config: BrokerConfig,
    registry: Registry,
    dispatcher: Dispatcher,
    correlator: Correlator,
    pub(crate) stats: BrokerStats,
}

impl Broker {
    /// Создаёт брокер с настройками по умолчанию.
    pub fn new() -> Self {
        Self::from_valid_config(BrokerConfig::default())
    }

    /// Создаёт брокер с заданной конфигурацией после её проверки.
    pub fn with_config(config: BrokerConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self::from_valid_config(config))
    }

    fn from_valid_config(config: BrokerConfig) -> Self {
        let inner = BrokerInner {
            registry: Registry::new(),
            dispatcher: Dispatcher::new(config.distribution),
            correlator: Correlator::new(&config.inbox_prefix),
            stats: BrokerStats::default(),
            config,
        };
        Self {
            inner: Arc::new(inner),
        }
    }

    pub fn config(&self) -> &BrokerConfig {
        &self.inner.config
    }

    /// Подписка по шаблону, например `"foo.*"` или `"foo.>"`.
    ///
    /// Подписка видна всем публикациям, начатым после возврата.
    pub fn subscribe(
        &self,
        pattern: &str,
    ) -> PubSubResult<Subscription> {
        self.subscribe_inner(pattern, None)
    }

    /// Подписка в составе queue group: каждое сообщение получает ровно один
    /// участник группы среди совпавших подписок.
    pub fn queue_subscribe(
        &self,
        pattern: &str,
        queue_group: &str,
    ) -> PubSubResult<Subscription> {
        self.subscribe_inner(pattern, Some(queue_group))
    }

    /// Отписка по идентификатору. Повторный вызов - не ошибка, вернёт
    /// `false`.
    pub fn unsubscribe(
        &self,
        id: SubscriptionId,
    ) -> bool {
        self.inner.remove_subscription(id)
    }

    /// Публикация payload в subject.
    pub fn publish(
        &self,
        subject: &str,
        payload: impl Into<Bytes>,
    ) -> PubSubResult<PublishOutcome> {
        let message = Message::new(parse_subject(subject)?, payload);
        Ok(self.publish_message(message))
    }

    /// Публикация с адресом для ответа.
    pub fn publish_with_reply(
        &self,
        subject: &str,
        reply_to: &str,
        payload: impl Into<Bytes>,
    ) -> PubSubResult<PublishOutcome> {
        let message =
            Message::new(parse_subject(subject)?, payload).with_reply_to(parse_subject(reply_to)?);
        Ok(self.publish_message(message))
    }

    /// Публикация готового сообщения (например, с заголовками).
    ///
    /// Никогда не ждёт подписчиков: сообщение кладётся в mailbox.
    pub fn publish_message(
        &self,
        message: Message,
    ) -> PublishOutcome {
        self.inner.publish(Arc::new(message))
    }

    /// Следующее сообщение подписки `id`, не дольше `timeout`.
    ///
    /// # Возвращает
    /// - `Ok(None)`, если за `timeout` ничего не пришло;
    /// - `Err(PubSubError::UnknownSubscription)`, если подписки нет.
    pub fn next_message(
        &self,
        id: SubscriptionId,
        timeout: Duration,
    ) -> PubSubResult<Option<Arc<Message>>> {
        let core = self
            .inner
            .registry
            .get(id)
            .ok_or(PubSubError::UnknownSubscription { id: id.0 })?;
        Ok(core.mailbox().pop_timeout(timeout))
    }

    /// Отправляет запрос и возвращает ожидающий ответа [`PendingRequest`].
    ///
    /// Сообщение публикуется сразу; дедлайн отсчитывается от этого момента.
    pub fn request(
        &self,
        subject: &str,
        payload: impl Into<Bytes>,
        timeout: Duration,
    ) -> PubSubResult<PendingRequest> {
        let message = Message::new(parse_subject(subject)?, payload);
        self.request_message(message, timeout)
    }

    /// Запрос готовым сообщением. Поле `reply_to` заменяется новым inbox.
    pub fn request_message(
        &self,
        message: Message,
        timeout: Duration,
    ) -> PubSubResult<PendingRequest> {
        let (correlation_id, inbox) = self.next_inbox()?;
        let subscription = self.subscribe(inbox.as_str())?;
        self.inner.stats.record_request();

        let subject = message.subject.clone();
        let pending = PendingRequest::new(
            correlation_id,
            subject.clone(),
            subscription,
            inbox.clone(),
            timeout,
        );

        debug!(subject = %subject, reply = %inbox, "request sent");
        self.publish_message(message.with_reply_to(inbox));
        Ok(pending)
    }

    /// Новый уникальный inbox для ручной организации ответов.
    pub fn new_inbox(&self) -> PubSubResult<Subject> {
        self.next_inbox().map(|(_, inbox)| inbox)
    }

    /// Есть ли подписчики на `subject`. Некорректный subject - `false`.
    pub fn has_interest(
        &self,
        subject: &str,
    ) -> bool {
        Subject::parse(subject)
            .map(|s| self.inner.registry.has_interest(&s))
            .unwrap_or(false)
    }

    pub fn subscription_count(&self) -> usize {
        self.inner.registry.len()
    }

    /// Количество участников queue group.
    pub fn queue_group_size(
        &self,
        queue_group: &str,
    ) -> usize {
        self.inner.registry.group_size(queue_group)
    }

    /// Глобальные метрики брокера.
    pub fn metrics(&self) -> BrokerMetrics {
        self.inner.stats.snapshot(self.inner.registry.len())
    }

    fn next_inbox(&self) -> PubSubResult<(u64, Subject)> {
        self.inner
            .correlator
            .next_inbox()
            .map_err(|source| PubSubError::InvalidSubject {
                subject: self.inner.config.inbox_prefix.clone(),
                source,
            })
    }

    fn subscribe_inner(
        &self,
        pattern: &str,
        queue_group: Option<&str>,
    ) -> PubSubResult<Subscription> {
        let invalid = |source| PubSubError::InvalidPattern {
            pattern: pattern.to_string(),
            source,
        };

        let parsed = Pattern::parse(pattern).map_err(invalid)?;
        if let Some(group) = queue_group {
            validate_queue_group(group).map_err(invalid)?;
        }

        let core = self.inner.registry.insert(
            parsed,
            queue_group.map(Arc::from),
            self.inner.config.mailbox,
        );
        debug!(
            subscription = %core.id(),
            pattern,
            queue_group = ?queue_group,
            "subscribed"
        );

        Ok(Subscription::new(core, Arc::downgrade(&self.inner)))
    }
}

impl Default for Broker {
    fn default() -> Self {
        Self::new()
    }
}

impl BrokerInner {
    pub(crate) fn remove_subscription(
        &self,
        id: SubscriptionId,
    ) -> bool {
        let Some(removed) = self.registry.remove(id) else {
            return false;
        };
        if let Some(group) = removed.emptied_group {
            self.dispatcher.selector().forget(&group);
            debug!(queue_group = %group, "queue group emptied");
        }
        debug!(subscription = %id, "unsubscribed");
        true
    }

    fn publish(
        &self,
        message: Arc<Message>,
    ) -> PublishOutcome {
        let snapshot = self.registry.find_matching(&message.subject);
        let outcome = self.dispatcher.dispatch(&snapshot, &message);
        self.stats.record_publish(&outcome);

        trace!(
            subject = %message.subject,
            matched = outcome.matched,
            delivered = outcome.delivered,
            dropped = outcome.dropped,
            "published"
        );
        outcome
    }
}

fn parse_subject(subject: &str) -> PubSubResult<Subject> {
    Subject::parse(subject).map_err(|source| PubSubError::InvalidSubject {
        subject: subject.to_string(),
        source,
    })
}
