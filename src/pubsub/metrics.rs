use std::sync::atomic::{AtomicU64, Ordering};

use super::PublishOutcome;

/// Счётчики брокера (обновляются без блокировок).
#[derive(Debug, Default)]
pub(crate) struct BrokerStats {
    published: AtomicU64,
    delivered: AtomicU64,
    dropped: AtomicU64,
    no_interest: AtomicU64,
    requests: AtomicU64,
    request_timeouts: AtomicU64,
}

/// Снимок метрик брокера.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BrokerMetrics {
    /// Общее количество вызовов `publish`.
    pub published: u64,
    /// Сколько раз сообщение легло в mailbox.
    pub delivered: u64,
    /// Потери из-за переполненных mailbox.
    pub dropped: u64,
    /// Публикации, на которые не нашлось ни одной подписки.
    pub no_interest: u64,
    pub requests: u64,
    pub request_timeouts: u64,
    pub active_subscriptions: usize,
}

impl BrokerStats {
    pub(crate) fn record_publish(
        &self,
        outcome: &PublishOutcome,
    ) {
        self.published.fetch_add(1, Ordering::Relaxed);
        self.delivered
            .fetch_add(outcome.delivered as u64, Ordering::Relaxed);
        self.dropped
            .fetch_add(outcome.dropped as u64, Ordering::Relaxed);
        if outcome.no_interest() {
            self.no_interest.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub(crate) fn record_request(&self) {
        self.requests.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_request_timeout(&self) {
        self.request_timeouts.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn snapshot(
        &self,
        active_subscriptions: usize,
    ) -> BrokerMetrics {
        BrokerMetrics {
            published: self.published.load(Ordering::Relaxed),
            delivered: self.delivered.load(Ordering::Relaxed),
            dropped: self.dropped.load(Ordering::Relaxed),
            no_interest: self.no_interest.load(Ordering::Relaxed),
            requests: self.requests.load(Ordering::Relaxed),
            request_timeouts: self.request_timeouts.load(Ordering::Relaxed),
            active_subscriptions,
        }
    }
}
