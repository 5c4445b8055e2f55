mod error;
mod merge;
mod pipeline;
mod retry;
mod serializer;

pub use error::{DeliveryError, Result};
pub use pipeline::{DeliveryConfig, DeliveryPipeline};
pub use retry::backoff_secs;
