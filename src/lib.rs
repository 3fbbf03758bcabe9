pub mod models;
pub mod config;
pub mod api;
pub mod session;
pub mod engine;
pub mod scheduler;
pub mod utils;

pub use models::{Account, Profile, RewardBotError, Result, Session, TokenRecord};
pub use config::Settings;

// Re-export commonly used types
pub use tokio_util::sync::CancellationToken;
