//! Подсистема Publish–Subscribe по subject.
//!
//! Встраиваемое ядро обмена сообщениями:
//!
//! - `subject`: разбор subject и шаблонов, сопоставление с wildcard `*`/`>`.
//! - `registry`: реестр подписок, индекс по токенам.
//! - `dispatch`: доставка сообщения и выбор участника queue group.
//! - `mailbox`: очередь входящих сообщений подписки.
//! - `request`: request-reply через одноразовые inbox-подписки.
//! - `broker`: фасад, через который работает транспортный слой.
//! - `subscriber`: пользовательский дескриптор подписки.
//! - `message`: сообщение и заголовки.
//! - `metrics`: счётчики брокера.
//!
//! Публичный API переэкспортирует все вложенные модули.

pub mod broker;
pub mod dispatch;
pub mod mailbox;
pub mod message;
mod metrics;
pub mod registry;
pub mod request;
pub mod subject;
pub mod subscriber;

pub use broker::*;
pub use dispatch::*;
pub use mailbox::*;
pub use message::*;
pub(crate) use metrics::BrokerStats;
pub use metrics::BrokerMetrics;
pub use registry::*;
pub use request::{PendingRequest, RequestState, DEFAULT_INBOX_PREFIX, MAX_REQUEST_TIMEOUT};
pub use subject::*;
pub use subscriber::*;
