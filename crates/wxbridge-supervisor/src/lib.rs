mod error;
mod fingerprint;
mod ingest;
mod supervisor;

pub use error::{Result, SupervisorError};
pub use fingerprint::fingerprint;
pub use ingest::ingest_batch;
pub use supervisor::{InstanceSupervisor, SupervisorSettings};
