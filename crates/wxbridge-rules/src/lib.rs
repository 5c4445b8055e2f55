pub mod engine;
pub mod error;
pub mod pattern;

pub use engine::{CompiledRule, RuleEngine};
pub use error::{Result, RuleError};
pub use pattern::ChatPattern;
