use std::{
    future::{Future, IntoFuture},
    pin::Pin,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
    time::{Duration, Instant},
};

use tracing::debug;
use uuid::Uuid;
use zsub_error::{PubSubError, PubSubResult, SubjectError};

use super::{Message, Subject, Subscription};

/// Префикс reply-subject по умолчанию.
pub const DEFAULT_INBOX_PREFIX: &str = "_INBOX";

/// Верхняя граница ожидания ответа.
pub const MAX_REQUEST_TIMEOUT: Duration = Duration::from_secs(24 * 60 * 60);

/// Генератор уникальных reply-subject вида `<prefix>.<token>.<n>`.
///
/// `token` случаен для каждого брокера, `n` монотонно растёт, поэтому два
/// живых запроса никогда не получат один и тот же inbox.
#[derive(Debug)]
pub(crate) struct Correlator {
    prefix: String,
    token: String,
    counter: AtomicU64,
}

/// Состояние ожидающего запроса.
///
/// Из `Pending` возможен ровно один переход в терминальное состояние.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestState {
    Pending,
    Fulfilled,
    TimedOut,
    /// Запрос брошен без ожидания или брокер закрылся раньше дедлайна.
    Cancelled,
}

/// Запрос, ожидающий ответа на свой reply-subject.
///
/// Одноразовая подписка на inbox снимается при любом исходе: ответ,
/// таймаут или `Drop` без ожидания.
///
/// ```no_run
/// # async fn demo(broker: zsub::Broker) -> zsub::PubSubResult<()> {
/// use std::time::Duration;
///
/// let reply = broker
///     .request("service.echo", "ping", Duration::from_millis(200))?
///     .await?;
/// println!("{}", reply.payload_str());
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct PendingRequest {
    correlation_id: u64,
    subject: Subject,
    reply_subject: Subject,
    subscription: Subscription,
    timeout: Duration,
    deadline: Instant,
    state: RequestState,
}

impl Correlator {
    pub(crate) fn new(prefix: &str) -> Self {
        Self {
            prefix: prefix.to_string(),
            token: Uuid::new_v4().simple().to_string(),
            counter: AtomicU64::new(0),
        }
    }

    /// Следующий inbox и его номер (correlation id).
    pub(crate) fn next_inbox(&self) -> Result<(u64, Subject), SubjectError> {
        let id = self.counter.fetch_add(1, Ordering::Relaxed) + 1;
        let inbox = Subject::parse(&format!("{}.{}.{id}", self.prefix, self.token))?;
        Ok((id, inbox))
    }
}

impl PendingRequest {
    pub(crate) fn new(
        correlation_id: u64,
        subject: Subject,
        subscription: Subscription,
        reply_subject: Subject,
        timeout: Duration,
    ) -> Self {
        let timeout = timeout.min(MAX_REQUEST_TIMEOUT);
        Self {
            correlation_id,
            subject,
            reply_subject,
            subscription,
            timeout,
            deadline: Instant::now() + timeout,
            state: RequestState::Pending,
        }
    }

    pub fn correlation_id(&self) -> u64 {
        self.correlation_id
    }

    /// Subject, на который ушёл запрос.
    pub fn subject(&self) -> &Subject {
        &self.subject
    }

    /// Inbox, на который должен прийти ответ.
    pub fn reply_subject(&self) -> &Subject {
        &self.reply_subject
    }

    pub fn state(&self) -> RequestState {
        self.state
    }

    /// Дедлайн отсчитывается от момента отправки запроса.
    pub fn deadline(&self) -> Instant {
        self.deadline
    }

    /// Асинхронно ждёт ответ до дедлайна.
    pub async fn response(mut self) -> PubSubResult<Arc<Message>> {
        let deadline = tokio::time::Instant::from_std(self.deadline);
        let reply = self
            .subscription
            .core()
            .mailbox()
            .recv_until(deadline)
            .await;
        self.resolve(reply)
    }

    /// Блокирует поток до ответа или дедлайна.
    pub fn wait(mut self) -> PubSubResult<Arc<Message>> {
        let remaining = self.deadline.saturating_duration_since(Instant::now());
        let reply = self.subscription.core().mailbox().pop_timeout(remaining);
        self.resolve(reply)
    }

    fn resolve(
        &mut self,
        reply: Option<Arc<Message>>,
    ) -> PubSubResult<Arc<Message>> {
        let closed_early = reply.is_none() && self.subscription.core().mailbox().is_closed();
        self.subscription.unsubscribe();

        match reply {
            Some(message) => {
                self.transition(RequestState::Fulfilled);
                Ok(message)
            }
            None if closed_early => {
                self.transition(RequestState::Cancelled);
                Err(PubSubError::Cancelled {
                    subject: self.subject.to_string(),
                })
            }
            None => {
                self.transition(RequestState::TimedOut);
                if let Some(broker) = self.subscription.broker() {
                    broker.stats.record_request_timeout();
                }
                debug!(
                    subject = %self.subject,
                    reply = %self.reply_subject,
                    timeout_ms = self.timeout.as_millis() as u64,
                    "request timed out"
                );
                Err(PubSubError::Timeout {
                    subject: self.subject.to_string(),
                    timeout_ms: self.timeout.as_millis() as u64,
                })
            }
        }
    }

    fn transition(
        &mut self,
        next: RequestState,
    ) -> bool {
        if self.state != RequestState::Pending {
            return false;
        }
        self.state = next;
        true
    }
}

impl Drop for PendingRequest {
    fn drop(&mut self) {
        if self.transition(RequestState::Cancelled) {
            self.subscription.unsubscribe();
            debug!(reply = %self.reply_subject, "pending request dropped");
        }
    }
}

impl IntoFuture for PendingRequest {
    type Output = PubSubResult<Arc<Message>>;
    type IntoFuture = Pin<Box<dyn Future<Output = Self::Output> + Send>>;

    fn into_future(self) -> Self::IntoFuture {
        Box::pin(self.response())
    }
}
