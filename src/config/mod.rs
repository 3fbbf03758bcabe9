pub mod settings;

pub use settings::{AnswerPolicyKind, Settings};
