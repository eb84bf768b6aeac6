use std::{
    sync::{Arc, Weak},
    time::Duration,
};

use zsub_error::{PubSubError, PubSubResult};

use super::{broker::BrokerInner, Message, Pattern, SubscriptionCore, SubscriptionId};

/// Подписка на шаблон subject (опционально - в составе queue group).
///
/// Предоставляет чтение из mailbox подписки: блокирующее с таймаутом
/// (`next_message`), асинхронное (`recv`) и без ожидания (`try_next`).
///
/// Отписка происходит автоматически при `Drop`.
#[derive(Debug)]
pub struct Subscription {
    core: Arc<SubscriptionCore>,
    broker: Weak<BrokerInner>,
}

impl Subscription {
    pub(crate) fn new(
        core: Arc<SubscriptionCore>,
        broker: Weak<BrokerInner>,
    ) -> Self {
        Self { core, broker }
    }

    pub fn id(&self) -> SubscriptionId {
        self.core.id()
    }

    pub fn pattern(&self) -> &Pattern {
        self.core.pattern()
    }

    pub fn queue_group(&self) -> Option<&str> {
        self.core.queue_group().map(|g| g.as_ref())
    }

    /// Ждёт следующее сообщение не дольше `timeout`, блокируя поток.
    ///
    /// # Возвращает
    /// - `Ok(Some(msg))` - сообщение получено;
    /// - `Ok(None)` - за `timeout` ничего не пришло;
    /// - `Err(PubSubError::UnknownSubscription)` - подписка уже отменена.
    pub fn next_message(
        &self,
        timeout: Duration,
    ) -> PubSubResult<Option<Arc<Message>>> {
        self.ensure_active()?;
        Ok(self.core.mailbox().pop_timeout(timeout))
    }

    /// Асинхронный вариант [`next_message`](Self::next_message).
    pub async fn recv(
        &self,
        timeout: Duration,
    ) -> PubSubResult<Option<Arc<Message>>> {
        self.ensure_active()?;
        let mailbox = self.core.mailbox();
        // Слишком большой timeout не представим как дедлайн: ждём без него.
        let message = match tokio::time::Instant::now().checked_add(timeout) {
            Some(deadline) => mailbox.recv_until(deadline).await,
            None => mailbox.recv().await,
        };
        Ok(message)
    }

    /// Пытается получить сообщение без ожидания.
    pub fn try_next(&self) -> PubSubResult<Option<Arc<Message>>> {
        self.ensure_active()?;
        Ok(self.core.mailbox().try_pop())
    }

    /// Количество сообщений в очереди на получение.
    pub fn pending(&self) -> usize {
        self.core.mailbox().len()
    }

    /// Сколько сообщений потеряно из-за переполнения mailbox.
    pub fn dropped(&self) -> u64 {
        self.core.mailbox().dropped()
    }

    pub fn is_active(&self) -> bool {
        self.core.is_active()
    }

    /// Явно отписаться. Повторный вызов ничего не делает и возвращает
    /// `false`.
    pub fn unsubscribe(&self) -> bool {
        match self.broker.upgrade() {
            Some(broker) => broker.remove_subscription(self.core.id()),
            None => false,
        }
    }

    pub(crate) fn core(&self) -> &SubscriptionCore {
        &self.core
    }

    pub(crate) fn broker(&self) -> Option<Arc<BrokerInner>> {
        self.broker.upgrade()
    }

    fn ensure_active(&self) -> PubSubResult<()> {
        if self.core.is_active() {
            Ok(())
        } else {
            Err(PubSubError::UnknownSubscription {
                id: self.core.id().0,
            })
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.unsubscribe();
    }
}

#[cfg(test)]
mod tests {
    use std::time::Instant;

    use bytes::Bytes;

    use crate::Broker;

    /// Тест проверяет, что поле `pattern` содержит исходный шаблон, и что
    /// подписка переживает брокер.
    #[test]
    fn test_subscription_pattern_outlives_broker() {
        let sub = {
            let broker = Broker::new();
            let sub = broker.subscribe("my.chan").unwrap();
            assert_eq!(sub.pattern().as_str(), "my.chan");
            sub
        };
        assert_eq!(sub.pattern().as_str(), "my.chan");
        // Брокер закрыл mailbox - подписка больше не активна.
        assert!(!sub.is_active());
        assert!(!sub.unsubscribe());
    }

    /// Тест проверяет, что опубликованное сообщение приходит подписчику.
    #[test]
    fn test_receive_message_via_subscription() {
        let broker = Broker::new();
        let sub = broker.subscribe("test.chan").unwrap();
        broker
            .publish("test.chan", Bytes::from_static(b"hello"))
            .unwrap();
        assert_eq!(sub.pending(), 1);
        let msg = sub
            .next_message(std::time::Duration::from_millis(100))
            .unwrap()
            .expect("no message");
        assert_eq!(msg.subject.as_str(), "test.chan");
        assert_eq!(msg.payload, Bytes::from_static(b"hello"));
    }

    /// Тест проверяет, что дроп подписки удаляет её из брокера.
    #[test]
    fn test_drop_unsubscribes() {
        let broker = Broker::new();
        let sub = broker.subscribe("foo").unwrap();
        assert_eq!(broker.subscription_count(), 1);
        drop(sub);
        assert_eq!(broker.subscription_count(), 0);
        assert!(!broker.has_interest("foo"));
    }

    /// Тест проверяет идемпотентность явной отписки и ошибку при чтении
    /// из отменённой подписки.
    #[test]
    fn test_explicit_unsubscribe_is_idempotent() {
        let broker = Broker::new();
        let sub = broker.subscribe("bar").unwrap();
        assert!(sub.unsubscribe());
        assert!(!sub.unsubscribe());
        assert!(sub.next_message(std::time::Duration::ZERO).is_err());
        assert!(sub.try_next().is_err());
    }

    /// Тест проверяет, что отписка будит поток, ждущий сообщение.
    #[test]
    fn test_unsubscribe_wakes_blocked_reader() {
        let broker = Broker::new();
        let sub = std::sync::Arc::new(broker.subscribe("wake").unwrap());
        let reader = {
            let sub = sub.clone();
            std::thread::spawn(move || {
                let started = Instant::now();
                let res = sub.next_message(std::time::Duration::from_secs(5));
                (res, started.elapsed())
            })
        };
        std::thread::sleep(std::time::Duration::from_millis(20));
        broker.unsubscribe(sub.id());
        let (res, elapsed) = reader.join().unwrap();
        assert!(matches!(res, Ok(None)));
        assert!(elapsed < std::time::Duration::from_secs(4));
    }

    /// Тест проверяет, что `recv` с `Duration::MAX` не паникует и
    /// отдаёт уже пришедшее сообщение.
    #[tokio::test]
    async fn test_recv_with_unbounded_timeout() {
        let broker = Broker::new();
        let sub = broker.subscribe("forever").unwrap();
        broker.publish("forever", "first").unwrap();
        broker.publish("forever", "second").unwrap();

        let msg = sub
            .next_message(std::time::Duration::MAX)
            .unwrap()
            .unwrap();
        assert_eq!(msg.payload_str(), "first");

        let msg = sub.recv(std::time::Duration::MAX).await.unwrap().unwrap();
        assert_eq!(msg.payload_str(), "second");
    }

    /// Тест проверяет асинхронное получение.
    #[tokio::test]
    async fn test_recv_async() {
        let broker = Broker::new();
        let sub = broker.subscribe("async.*").unwrap();
        broker.publish("async.one", "payload").unwrap();
        let msg = sub
            .recv(std::time::Duration::from_millis(100))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(msg.payload_str(), "payload");
        assert!(sub
            .recv(std::time::Duration::from_millis(10))
            .await
            .unwrap()
            .is_none());
    }
}
