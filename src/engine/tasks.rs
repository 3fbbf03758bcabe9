use std::collections::HashSet;
use std::sync::Arc;
use tracing::{info, warn};

use crate::{
    api::RewardApi,
    engine::quiz::{QuizEngine, QuizOutcome},
    models::{Account, Profile, Result, Session, TaskSummary},
    utils::Pacer,
};

/// What a single pass over the task catalog did.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct TaskReport {
    pub completed_before: usize,
    pub checked: Vec<String>,
    pub failed: Vec<String>,
    pub skipped: Vec<String>,
    pub points_reward: f64,
    pub chances_reward: u32,
    pub before: Profile,
    /// Profile re-fetched after the pass, if that call succeeded
    pub after: Option<Profile>,
    pub quiz: Option<QuizOutcome>,
}

impl TaskReport {
    pub fn points_delta(&self) -> Option<f64> {
        self.after.as_ref().map(|after| after.points - self.before.points)
    }
}

pub struct TaskEngine {
    api: Arc<dyn RewardApi>,
    quiz: QuizEngine,
    pacer: Pacer,
    excluded: HashSet<String>,
}

impl TaskEngine {
    pub fn new<I>(api: Arc<dyn RewardApi>, quiz: QuizEngine, pacer: Pacer, excluded: I) -> Self
    where
        I: IntoIterator<Item = String>,
    {
        Self {
            api,
            quiz,
            pacer,
            excluded: excluded.into_iter().collect(),
        }
    }

    /// Complete every outstanding task once, then spend any quiz chances.
    ///
    /// Failing to fetch the catalog or the profile aborts the run; a task that
    /// fails its check is skipped until the next pass.
    pub async fn process_all(&self, account: &Account, session: &Session) -> Result<TaskReport> {
        let catalog = self.api.list_tasks(session).await?;
        let profile = self.api.get_profile(session).await?;

        let completed = profile.completed_tasks();
        info!("{} has completed {} tasks", account.display_name, completed.len());
        info!("Points: {} | Chances: {}", profile.points, profile.chances);

        let mut report = TaskReport {
            completed_before: completed.len(),
            ..Default::default()
        };

        for task in &catalog {
            if self.excluded.contains(&task.task_type) {
                info!("Skipping excluded task {}", task.task_type);
                report.skipped.push(task.task_type.clone());
                continue;
            }

            if completed.contains(task.task_type.as_str()) {
                info!("Task {} already completed", task.task_type);
                continue;
            }

            info!("Checking task {}", task.task_type);
            match self.api.check_task(session, &task.task_type).await {
                Ok(()) => {
                    info!(
                        "Task {} done | Reward: {} points, {} chances",
                        task.task_type, task.points_reward, task.chances_reward
                    );
                    report.checked.push(task.task_type.clone());
                    report.points_reward += task.points_reward;
                    report.chances_reward += task.chances_reward;
                    self.pacer.pause().await;
                }
                Err(e) => {
                    warn!("Task {} failed: {}", task.task_type, e);
                    report.failed.push(task.task_type.clone());
                }
            }
        }

        report.before = profile;

        match self.api.get_profile(session).await {
            Ok(updated) => {
                info!("=== After tasks ===");
                info!(
                    "Points: {} ({:+}) | Chances: {}",
                    updated.points,
                    updated.points - report.before.points,
                    updated.chances
                );
                info!(
                    "Rank: {} | Month points: {}",
                    updated.rank.map(|r| r.to_string()).unwrap_or_else(|| "-".to_string()),
                    updated.month_points
                );

                if updated.chances > 0 {
                    report.quiz = Some(self.quiz.run(session, updated.chances).await);
                }
                report.after = Some(updated);
            }
            Err(e) => warn!("Could not refresh profile after tasks: {}", e),
        }

        Ok(report)
    }

    pub async fn summary(&self, session: &Session) -> Result<TaskSummary> {
        let profile = self.api.get_profile(session).await?;
        Ok(TaskSummary::from(profile))
    }
}
