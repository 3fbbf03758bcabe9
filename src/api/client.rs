use async_trait::async_trait;

use crate::models::{
    LoginGrant, LoginRequest, Profile, QuizQuestion, QuizResult, Result, Session, TaskDescriptor,
};

/// Remote operations of the rewards service.
///
/// Every authenticated call carries the session's bearer token and fingerprint.
/// A transport failure or a non-zero application code is returned as an error.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait RewardApi: Send + Sync {
    /// Exchange a raw seed for an access token
    async fn login(&self, request: &LoginRequest) -> Result<LoginGrant>;

    async fn get_profile(&self, session: &Session) -> Result<Profile>;

    /// Fetch the task catalog, in server order
    async fn list_tasks(&self, session: &Session) -> Result<Vec<TaskDescriptor>>;

    /// Ask the server to verify (and reward) a task
    async fn check_task(&self, session: &Session, task_type: &str) -> Result<()>;

    async fn get_question(&self, session: &Session) -> Result<QuizQuestion>;

    async fn submit_answer(&self, session: &Session, choice: usize) -> Result<QuizResult>;
}
