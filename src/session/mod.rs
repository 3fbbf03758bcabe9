pub mod manager;
pub mod token_store;

pub use manager::{inspect_token, SessionManager, TokenExpiry};
pub use token_store::{fingerprint, TokenStore};
