pub mod audio;
pub mod config;
pub mod error;
pub mod http;
pub mod observability;
pub mod output;
pub mod session;
pub mod stt;
pub mod summarizer;
pub mod transcript;

pub use config::{Config, RuntimeMode};
pub use error::{EngineError, Result};
pub use http::{create_router, AppState};
pub use session::{Session, SessionConfig, SessionRegistry, SessionStatus};
