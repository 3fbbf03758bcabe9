pub mod account;
pub mod error;
pub mod rewards;
pub mod session;

pub use account::*;
pub use error::*;
pub use rewards::*;
pub use session::*;
