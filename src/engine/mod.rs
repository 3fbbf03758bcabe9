pub mod quiz;
pub mod tasks;

pub use quiz::{AnswerPolicy, FixedAnswer, QuizEngine, QuizOutcome, QuizState, UniformRandom};
pub use tasks::{TaskEngine, TaskReport};
