pub mod config;
pub mod error;
pub mod event;
pub mod protocol;
pub mod traits;
pub mod types;

pub use config::AppConfig;
pub use error::{GraphValidationError, NodeExecutionError, Result, TrellisError};
pub use event::StreamEvent;
pub use traits::{LlmClient, Worker};
pub use types::*;
