pub mod broker;
pub mod error;
pub mod topology;

pub use broker::{ack, nack, retry_count, Broker};
pub use error::BrokerError;
pub use topology::{QueueSpec, Topology};
