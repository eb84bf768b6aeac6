/// Configuration: broker tuning and layered settings loading.
pub mod config;
/// Common error types: subject validation, pub/sub, configuration, logging.
pub mod error;
/// Structured logging setup (filters, formatters).
pub mod logging;
/// Pub/Sub core: subjects, registry, delivery, request-reply.
pub mod pubsub;

// -----------------------------------------------------------------------------
//  Frequently used public types
// -----------------------------------------------------------------------------

/// config
pub use config::{BrokerConfig, Settings};
/// Operation errors and result types.
pub use error::{
    ConfigError, ErrorExt, LoggingError, PubSubError, PubSubResult, StatusCode, SubjectError,
};
/// Logging initialization.
pub use logging::{init_logging, LogFormat, LoggingConfig};
/// Pub/Sub API.
pub use pubsub::{
    matches, Broker, BrokerMetrics, DistributionPolicy, Headers, MailboxConfig, Message,
    OverflowPolicy, Pattern, PendingRequest, PublishOutcome, RequestState, Subject, Subscription,
    SubscriptionId,
};
