use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::{
    api::RewardApi,
    config::settings::ScheduleSettings,
    engine::{TaskEngine, TaskReport},
    models::Account,
    session::SessionManager,
    utils::Clock,
};

/// Where the scheduler is within a pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    ProcessAccount(usize),
    AccountPause(usize),
    PassPause,
    Stopped,
}

impl Phase {
    fn first(account_count: usize) -> Self {
        if account_count == 0 {
            Phase::PassPause
        } else {
            Phase::ProcessAccount(0)
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScheduleConfig {
    pub account_pause: Duration,
    pub pass_pause: Duration,
}

impl From<&ScheduleSettings> for ScheduleConfig {
    fn from(settings: &ScheduleSettings) -> Self {
        Self {
            account_pause: Duration::from_secs(settings.account_pause_seconds),
            pass_pause: Duration::from_secs(settings.pass_pause_seconds),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum VisitStatus {
    Completed(TaskReport),
    InvalidSeed(String),
    SessionFailed(String),
    TasksFailed(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct AccountVisit {
    pub index: usize,
    pub account_id: Option<String>,
    pub status: VisitStatus,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct PassReport {
    pub visits: Vec<AccountVisit>,
    pub cancelled: bool,
}

impl PassReport {
    pub fn completed(&self) -> usize {
        self.visits
            .iter()
            .filter(|v| matches!(v.status, VisitStatus::Completed(_)))
            .count()
    }
}

/// Walks every account in order, once per pass, until cancelled.
pub struct Scheduler {
    api: Arc<dyn RewardApi>,
    sessions: SessionManager,
    tasks: TaskEngine,
    clock: Arc<dyn Clock>,
    config: ScheduleConfig,
}

impl Scheduler {
    pub fn new(
        api: Arc<dyn RewardApi>,
        sessions: SessionManager,
        tasks: TaskEngine,
        clock: Arc<dyn Clock>,
        config: ScheduleConfig,
    ) -> Self {
        Self {
            api,
            sessions,
            tasks,
            clock,
            config,
        }
    }

    /// Run passes forever, pausing `pass_pause` between them. Returns the number of
    /// passes finished once `cancel` fires.
    pub async fn run(&self, seeds: &[String], cancel: CancellationToken) -> u64 {
        let mut passes = 0;

        loop {
            let report = self.run_pass(seeds, &cancel).await;
            if report.cancelled {
                break;
            }

            passes += 1;
            info!(
                "Pass {} finished: {}/{} accounts completed",
                passes,
                report.completed(),
                seeds.len()
            );

            if self.advance(Phase::PassPause, seeds, &cancel, &mut PassReport::default()).await
                == Phase::Stopped
            {
                break;
            }
        }

        info!("Scheduler stopped after {} passes", passes);
        passes
    }

    /// Visit every account once, in input order.
    pub async fn run_pass(&self, seeds: &[String], cancel: &CancellationToken) -> PassReport {
        let mut report = PassReport::default();
        let mut phase = Phase::first(seeds.len());

        loop {
            match phase {
                Phase::PassPause => return report,
                Phase::Stopped => {
                    report.cancelled = true;
                    return report;
                }
                _ => phase = self.advance(phase, seeds, cancel, &mut report).await,
            }
        }
    }

    async fn advance(
        &self,
        phase: Phase,
        seeds: &[String],
        cancel: &CancellationToken,
        report: &mut PassReport,
    ) -> Phase {
        match phase {
            Phase::ProcessAccount(index) => {
                if cancel.is_cancelled() {
                    return Phase::Stopped;
                }
                let visit = self.process_account(index, &seeds[index]).await;
                report.visits.push(visit);
                Phase::AccountPause(index)
            }
            Phase::AccountPause(index) => {
                if !self.pause(self.config.account_pause, cancel).await {
                    Phase::Stopped
                } else if index + 1 < seeds.len() {
                    Phase::ProcessAccount(index + 1)
                } else {
                    Phase::PassPause
                }
            }
            Phase::PassPause => {
                info!("All accounts processed, next pass in {:?}", self.config.pass_pause);
                if self.pause(self.config.pass_pause, cancel).await {
                    Phase::first(seeds.len())
                } else {
                    Phase::Stopped
                }
            }
            Phase::Stopped => Phase::Stopped,
        }
    }

    /// Returns false if cancelled before the pause elapsed.
    async fn pause(&self, duration: Duration, cancel: &CancellationToken) -> bool {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => false,
            _ = self.clock.sleep(duration) => true,
        }
    }

    /// One account's full cycle: session, profile snapshot, tasks and quiz.
    pub async fn process_account(&self, index: usize, seed: &str) -> AccountVisit {
        let account = match Account::from_seed(seed) {
            Ok(account) => account,
            Err(e) => {
                error!("Account {}: invalid seed: {}", index + 1, e);
                return AccountVisit {
                    index,
                    account_id: None,
                    status: VisitStatus::InvalidSeed(e.to_string()),
                };
            }
        };

        info!("========== Account {} | {} ==========", index + 1, account.display_name);

        let visit = |status| AccountVisit {
            index,
            account_id: Some(account.id.clone()),
            status,
        };

        let cached = self.sessions.store().get(&account.id);
        let session = match self.sessions.ensure_session(&account, cached.as_ref()).await {
            Ok(session) => session,
            Err(e) => {
                error!("Login failed for {}: {}", account.display_name, e);
                return visit(VisitStatus::SessionFailed(e.to_string()));
            }
        };

        match self.api.get_profile(&session).await {
            Ok(profile) => info!(
                "Points: {} | Correct: {} | Wrong: {}",
                profile.points, profile.correct, profile.wrong
            ),
            Err(e) => warn!("Could not fetch profile snapshot: {}", e),
        }

        match self.tasks.process_all(&account, &session).await {
            Ok(report) => {
                if let Some(delta) = report.points_delta() {
                    info!("{} earned {:+} points this pass", account.display_name, delta);
                }
                visit(VisitStatus::Completed(report))
            }
            Err(e) => {
                error!("Task processing failed for {}: {}", account.display_name, e);
                visit(VisitStatus::TasksFailed(e.to_string()))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::client::MockRewardApi;
    use crate::engine::{FixedAnswer, QuizEngine};
    use crate::models::{LoginGrant, LoginRequest, Profile};
    use crate::session::TokenStore;
    use crate::utils::{ManualClock, Pacer};

    fn seed(id: u32) -> String {
        let user = urlencoding::encode(&format!(r#"{{"id":{},"first_name":"User{}"}}"#, id, id)).into_owned();
        format!("user={}&start_param=ref", user)
    }

    fn scheduler(api: MockRewardApi, clock: Arc<ManualClock>) -> (tempfile::TempDir, Scheduler) {
        let dir = tempfile::tempdir().expect("tempdir");
        let api: Arc<dyn RewardApi> = Arc::new(api);
        let clock: Arc<dyn Clock> = clock;
        let pacer = Pacer::new(clock.clone(), 1_000, 3_000);
        let quiz = QuizEngine::new(api.clone(), Arc::new(FixedAnswer(0)), pacer.clone());
        let tasks = TaskEngine::new(api.clone(), quiz, pacer, Vec::new());
        let sessions = SessionManager::new(
            api.clone(),
            TokenStore::new(dir.path().join("token.json")),
            clock.clone(),
        );
        let config = ScheduleConfig {
            account_pause: Duration::from_secs(2),
            pass_pause: Duration::from_secs(86_400),
        };
        (dir, Scheduler::new(api, sessions, tasks, clock, config))
    }

    fn quiet_api() -> MockRewardApi {
        let mut api = MockRewardApi::new();
        api.expect_get_profile().returning(|_| Ok(Profile::default()));
        api.expect_list_tasks().returning(|_| Ok(vec![]));
        api
    }

    #[tokio::test]
    async fn test_pass_visits_accounts_in_order() {
        let mut api = quiet_api();
        let mut seq = mockall::Sequence::new();
        for id in [3, 1, 2] {
            let expected = seed(id);
            api.expect_login()
                .withf(move |request: &LoginRequest| request.init_data == expected)
                .times(1)
                .in_sequence(&mut seq)
                .returning(|_| {
                    Ok(LoginGrant {
                        token: "h.e30.s".to_string(),
                        is_new: false,
                    })
                });
        }
        let clock = Arc::new(ManualClock::at_timestamp(0));
        let (_dir, scheduler) = scheduler(api, clock.clone());

        let seeds = vec![seed(3), seed(1), seed(2)];
        let report = scheduler.run_pass(&seeds, &CancellationToken::new()).await;

        let ids: Vec<_> = report.visits.iter().map(|v| v.account_id.clone().unwrap()).collect();
        assert_eq!(ids, vec!["3", "1", "2"]);
        assert_eq!(report.completed(), 3);
        assert!(!report.cancelled);
        assert_eq!(clock.sleeps(), vec![Duration::from_secs(2); 3]);
    }

    #[tokio::test]
    async fn test_invalid_seed_only_skips_that_account() {
        let mut api = quiet_api();
        api.expect_login().times(1).returning(|_| {
            Ok(LoginGrant {
                token: "h.e30.s".to_string(),
                is_new: true,
            })
        });
        let (_dir, scheduler) = scheduler(api, Arc::new(ManualClock::at_timestamp(0)));

        let seeds = vec!["garbage-line".to_string(), seed(9)];
        let report = scheduler.run_pass(&seeds, &CancellationToken::new()).await;

        assert_eq!(report.visits.len(), 2);
        assert!(matches!(report.visits[0].status, VisitStatus::InvalidSeed(_)));
        assert!(matches!(report.visits[1].status, VisitStatus::Completed(_)));
    }

    #[tokio::test]
    async fn test_cancelled_before_start_visits_nothing() {
        let mut api = MockRewardApi::new();
        api.expect_login().times(0);
        let (_dir, scheduler) = scheduler(api, Arc::new(ManualClock::at_timestamp(0)));

        let cancel = CancellationToken::new();
        cancel.cancel();

        let passes = scheduler.run(&[seed(1), seed(2)], cancel).await;
        assert_eq!(passes, 0);
    }

    /// Fires `cancel` as soon as the account pause starts.
    struct CancelOnAccountPause {
        inner: ManualClock,
        cancel: CancellationToken,
    }

    #[async_trait::async_trait]
    impl Clock for CancelOnAccountPause {
        fn now(&self) -> chrono::DateTime<chrono::Utc> {
            self.inner.now()
        }

        async fn sleep(&self, duration: Duration) {
            if duration == Duration::from_secs(2) {
                self.cancel.cancel();
            }
            self.inner.sleep(duration).await;
        }
    }

    #[tokio::test]
    async fn test_cancel_during_account_pause_stops_the_pass() {
        let mut api = quiet_api();
        api.expect_login().times(1).returning(|_| {
            Ok(LoginGrant {
                token: "h.e30.s".to_string(),
                is_new: false,
            })
        });

        let cancel = CancellationToken::new();
        let dir = tempfile::tempdir().expect("tempdir");
        let api: Arc<dyn RewardApi> = Arc::new(api);
        let clock: Arc<dyn Clock> = Arc::new(CancelOnAccountPause {
            inner: ManualClock::at_timestamp(0),
            cancel: cancel.clone(),
        });
        let pacer = Pacer::new(clock.clone(), 1_000, 3_000);
        let quiz = QuizEngine::new(api.clone(), Arc::new(FixedAnswer(0)), pacer.clone());
        let tasks = TaskEngine::new(api.clone(), quiz, pacer, Vec::new());
        let sessions = SessionManager::new(
            api.clone(),
            TokenStore::new(dir.path().join("token.json")),
            clock.clone(),
        );
        let config = ScheduleConfig {
            account_pause: Duration::from_secs(2),
            pass_pause: Duration::from_secs(86_400),
        };
        let scheduler = Scheduler::new(api, sessions, tasks, clock, config);

        let report = scheduler.run_pass(&[seed(1), seed(2), seed(3)], &cancel).await;

        assert!(report.cancelled);
        assert_eq!(report.visits.len(), 1);
        assert_eq!(report.visits[0].account_id.as_deref(), Some("1"));
    }

    #[test]
    fn test_schedule_config_from_settings() {
        let settings = ScheduleSettings {
            account_pause_seconds: 2,
            pass_pause_seconds: 86_400,
            min_delay_ms: 1_000,
            max_delay_ms: 3_000,
        };
        let config = ScheduleConfig::from(&settings);
        assert_eq!(config.account_pause, Duration::from_secs(2));
        assert_eq!(config.pass_pause, Duration::from_secs(86_400));
    }
}
