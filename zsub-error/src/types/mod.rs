pub mod pubsub;
pub mod subject;

pub use pubsub::*;
pub use subject::*;
