pub mod bookkeeping;
pub mod dify;
pub mod error;
pub mod keyword;
pub mod openai;
pub mod platform;
pub mod registry;

pub use error::{PlatformError, Result};
pub use platform::{InboundUnit, OutboundReply, Platform, SendMode};
pub use registry::PlatformRegistry;
