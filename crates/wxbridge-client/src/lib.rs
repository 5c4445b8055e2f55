pub mod client;
pub mod error;
pub mod types;

pub use client::{CallOutcome, RemoteClient};
pub use error::{ClientError, Result};
pub use types::{AddListenerOptions, ConnectionState, MainWindowChat, RemoteMessage};
