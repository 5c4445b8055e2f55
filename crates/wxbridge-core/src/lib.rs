pub mod config;
pub mod counters;
pub mod error;
pub mod reload;
pub mod types;

pub use config::BridgeConfig;
pub use counters::{CounterSnapshot, PipelineCounters};
pub use error::{BridgeError, Result};
pub use reload::{EventBus, ReloadEvent};
pub use types::{InstanceId, ListenerKey, PlatformId, RuleId};
