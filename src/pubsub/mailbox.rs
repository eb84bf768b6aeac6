use std::{
    collections::VecDeque,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
    time::{Duration, Instant},
};

use parking_lot::{Condvar, Mutex};
use serde::{Deserialize, Serialize};
use tokio::sync::Notify;

use super::Message;

/// Что делать, когда ограниченный mailbox заполнен.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverflowPolicy {
    /// Вытеснить самое старое сообщение.
    #[default]
    DropOldest,
    /// Отклонить входящее сообщение; издатель видит это в
    /// `PublishOutcome::dropped`.
    DropNewest,
}

/// Настройки mailbox подписки.
///
/// `capacity: None` - очередь без ограничения: память растёт вместе с
/// непрочитанными сообщениями медленного подписчика.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MailboxConfig {
    pub capacity: Option<usize>,
    pub overflow: OverflowPolicy,
}

/// Результат попытки положить сообщение в mailbox.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PushOutcome {
    Enqueued,
    /// Сообщение принято, самое старое вытеснено.
    EvictedOldest,
    /// Сообщение отклонено (`OverflowPolicy::DropNewest`).
    Rejected,
    /// Mailbox закрыт отпиской.
    Closed,
}

#[derive(Debug, Default)]
struct MailboxState {
    queue: VecDeque<Arc<Message>>,
    closed: bool,
}

enum Take {
    Message(Arc<Message>),
    Empty,
    Closed,
}

/// FIFO входящих сообщений одной подписки.
///
/// Писатель (брокер) никогда не блокируется дольше короткой критической
/// секции. Читатель может ждать синхронно (`pop_timeout`, `Condvar`) или
/// асинхронно (`recv_until`, `Notify`).
#[derive(Debug)]
pub struct Mailbox {
    state: Mutex<MailboxState>,
    available: Condvar,
    notify: Notify,
    config: MailboxConfig,
    dropped: AtomicU64,
}

////////////////////////////////////////////////////////////////////////////////
// Собственные методы
////////////////////////////////////////////////////////////////////////////////

impl Mailbox {
    /// `config` должен пройти `BrokerConfig::validate` (ёмкость не ноль).
    pub(crate) fn new(config: MailboxConfig) -> Self {
        Self {
            state: Mutex::new(MailboxState::default()),
            available: Condvar::new(),
            notify: Notify::new(),
            config,
            dropped: AtomicU64::new(0),
        }
    }

    /// Кладёт сообщение в конец очереди согласно политике переполнения.
    pub fn push(
        &self,
        message: Arc<Message>,
    ) -> PushOutcome {
        let outcome = {
            let mut state = self.state.lock();
            if state.closed {
                return PushOutcome::Closed;
            }

            let full = self
                .config
                .capacity
                .is_some_and(|cap| state.queue.len() >= cap);

            if !full {
                state.queue.push_back(message);
                PushOutcome::Enqueued
            } else {
                match self.config.overflow {
                    OverflowPolicy::DropNewest => PushOutcome::Rejected,
                    OverflowPolicy::DropOldest => {
                        state.queue.pop_front();
                        state.queue.push_back(message);
                        PushOutcome::EvictedOldest
                    }
                }
            }
        };

        match outcome {
            PushOutcome::Rejected => {
                self.dropped.fetch_add(1, Ordering::Relaxed);
            }
            PushOutcome::EvictedOldest => {
                self.dropped.fetch_add(1, Ordering::Relaxed);
                self.wake();
            }
            _ => self.wake(),
        }
        outcome
    }

    /// Забирает сообщение без ожидания.
    pub fn try_pop(&self) -> Option<Arc<Message>> {
        self.state.lock().queue.pop_front()
    }

    /// Блокирует текущий поток до появления сообщения, закрытия mailbox или
    /// истечения `timeout`. По таймауту возвращает `None`.
    pub fn pop_timeout(
        &self,
        timeout: Duration,
    ) -> Option<Arc<Message>> {
        let deadline = Instant::now().checked_add(timeout);
        let mut state = self.state.lock();
        loop {
            if let Some(message) = state.queue.pop_front() {
                return Some(message);
            }
            if state.closed {
                return None;
            }
            match deadline {
                Some(deadline) => {
                    if self.available.wait_until(&mut state, deadline).timed_out() {
                        return state.queue.pop_front();
                    }
                }
                None => self.available.wait(&mut state),
            }
        }
    }

    /// Асинхронно ждёт сообщение до `deadline`. По таймауту возвращает `None`.
    pub async fn recv_until(
        &self,
        deadline: tokio::time::Instant,
    ) -> Option<Arc<Message>> {
        tokio::time::timeout_at(deadline, self.recv())
            .await
            .ok()
            .flatten()
    }

    /// Асинхронно ждёт сообщение, пока mailbox не закрыт.
    pub async fn recv(&self) -> Option<Arc<Message>> {
        loop {
            // Notified создаётся до проверки очереди, чтобы не потерять
            // notify_waiters между проверкой и ожиданием.
            let notified = self.notify.notified();
            match self.take() {
                Take::Message(message) => return Some(message),
                Take::Closed => return None,
                Take::Empty => notified.await,
            }
        }
    }

    /// Закрывает mailbox и выбрасывает недочитанные сообщения.
    ///
    /// Возвращает количество выброшенных сообщений; повторный вызов вернёт 0.
    pub fn close(&self) -> usize {
        let drained = {
            let mut state = self.state.lock();
            state.closed = true;
            let drained = state.queue.len();
            state.queue.clear();
            drained
        };
        self.wake();
        drained
    }

    pub fn is_closed(&self) -> bool {
        self.state.lock().closed
    }

    pub fn len(&self) -> usize {
        self.state.lock().queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state.lock().queue.is_empty()
    }

    /// Сколько сообщений потеряно из-за переполнения.
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    fn take(&self) -> Take {
        let mut state = self.state.lock();
        match state.queue.pop_front() {
            Some(message) => Take::Message(message),
            None if state.closed => Take::Closed,
            None => Take::Empty,
        }
    }

    fn wake(&self) {
        self.available.notify_all();
        self.notify.notify_waiters();
    }
}
