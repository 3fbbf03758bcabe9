use anyhow::Context;
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use reward_bot::{
    api::{HttpRewardApi, RewardApi},
    config::Settings,
    engine::{quiz::policy_from_settings, QuizEngine, TaskEngine},
    models::{load_seeds, Account},
    scheduler::{ScheduleConfig, Scheduler},
    session::{inspect_token, SessionManager, TokenExpiry, TokenStore},
    utils::{Clock, Pacer, SystemClock},
    CancellationToken,
};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[clap(name = "reward-bot")]
#[clap(about = "Keep reward accounts logged in, complete their tasks and spend quiz chances", long_about = None)]
struct Cli {
    /// Settings file (otherwise config/default, config/local and REWARD_BOT__* env)
    #[clap(long, global = true)]
    config: Option<PathBuf>,

    /// Seed file, one account per line
    #[clap(long, global = true)]
    seeds: Option<PathBuf>,

    /// Token store file
    #[clap(long, global = true)]
    tokens: Option<PathBuf>,

    #[clap(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Process every account, then repeat daily (default)
    Run,

    /// Print each account's task progress and stats
    Summary,

    /// List cached tokens and their expiry
    Tokens,

    /// Decode a token and report whether it has expired
    CheckToken {
        token: String,
    },
}

struct Components {
    api: Arc<dyn RewardApi>,
    clock: Arc<dyn Clock>,
    sessions: SessionManager,
    tasks: TaskEngine,
}

impl Components {
    fn build(settings: &Settings) -> anyhow::Result<Self> {
        let api: Arc<dyn RewardApi> = Arc::new(HttpRewardApi::new(settings)?);
        let clock: Arc<dyn Clock> = Arc::new(SystemClock);
        let pacer = Pacer::new(
            clock.clone(),
            settings.schedule.min_delay_ms,
            settings.schedule.max_delay_ms,
        );

        let quiz = QuizEngine::new(api.clone(), policy_from_settings(&settings.quiz), pacer.clone());
        let tasks = TaskEngine::new(api.clone(), quiz, pacer, settings.tasks.excluded_types.clone());
        let sessions = SessionManager::new(
            api.clone(),
            TokenStore::new(settings.files.token_file.clone()),
            clock.clone(),
        );

        Ok(Self {
            api,
            clock,
            sessions,
            tasks,
        })
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let loaded = match &cli.config {
        Some(path) => Settings::from_file(path),
        None => Settings::new(),
    };
    let (mut settings, load_error) = match loaded {
        Ok(settings) => (settings, None),
        Err(e) => (Settings::default(), Some(e)),
    };

    // Initialize logging
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&settings.app.log_level));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    // Layered files are optional; an error means one is broken or --config is missing.
    if let Some(e) = load_error {
        error!("Failed to load settings: {}", e);
        return Err(e.into());
    }

    if let Some(seeds) = cli.seeds {
        settings.files.seed_file = seeds;
    }
    if let Some(tokens) = cli.tokens {
        settings.files.token_file = tokens;
    }

    if let Err(e) = settings.validate() {
        error!("Invalid settings: {}", e);
        return Err(anyhow::anyhow!(e));
    }

    match cli.command.unwrap_or(Commands::Run) {
        Commands::Run => {
            let seeds = read_seeds(&settings)?;
            let components = Components::build(&settings)?;
            let scheduler = Scheduler::new(
                components.api,
                components.sessions,
                components.tasks,
                components.clock,
                ScheduleConfig::from(&settings.schedule),
            );

            let cancel = CancellationToken::new();
            let shutdown = cancel.clone();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    info!("Shutdown requested, finishing current step");
                    shutdown.cancel();
                }
            });

            info!("{} v{} managing {} accounts", settings.app.name, settings.app.version, seeds.len());
            scheduler.run(&seeds, cancel).await;
        }

        Commands::Summary => {
            let seeds = read_seeds(&settings)?;
            let components = Components::build(&settings)?;

            for (index, seed) in seeds.iter().enumerate() {
                let account = match Account::from_seed(seed) {
                    Ok(account) => account,
                    Err(e) => {
                        error!("Account {}: invalid seed: {}", index + 1, e);
                        continue;
                    }
                };

                let cached = components.sessions.store().get(&account.id);
                let session = match components.sessions.ensure_session(&account, cached.as_ref()).await {
                    Ok(session) => session,
                    Err(e) => {
                        error!("{}", e);
                        continue;
                    }
                };

                match components.tasks.summary(&session).await {
                    Ok(summary) => {
                        println!("\n=== {} ({}) ===", account.display_name, account.id);
                        println!("Points: {}", summary.stats.points);
                        println!("Chances: {}", summary.stats.chances);
                        if let Some(rank) = summary.stats.rank {
                            println!("Rank: {}", rank);
                        }
                        println!("Month points: {}", summary.stats.month_points);
                        println!("Correct / wrong: {} / {}", summary.stats.correct, summary.stats.wrong);
                        println!("Daily tasks done: {}", summary.daily_tasks.join(", "));
                        println!("Tasks done: {}", summary.regular_tasks.join(", "));
                    }
                    Err(e) => error!("Failed to fetch summary for {}: {}", account.display_name, e),
                }
            }
        }

        Commands::Tokens => {
            let store = TokenStore::new(settings.files.token_file.clone());
            let records = store.load();
            if records.is_empty() {
                println!("No tokens stored in {}", store.path().display());
            }

            let now = Utc::now();
            for (account_id, record) in &records {
                println!("{}: {}", account_id, describe_expiry(&inspect_token(&record.token), now));
            }
        }

        Commands::CheckToken { token } => {
            let expiry = inspect_token(&token);
            println!("{}", describe_expiry(&expiry, Utc::now()));
        }
    }

    Ok(())
}

fn read_seeds(settings: &Settings) -> anyhow::Result<Vec<String>> {
    let path = &settings.files.seed_file;
    let seeds = load_seeds(path)
        .with_context(|| format!("Failed to read seed file {}", path.display()))?;

    if seeds.is_empty() {
        warn!("Seed file {} contains no accounts", path.display());
    }

    Ok(seeds)
}

fn describe_expiry(expiry: &TokenExpiry, now: DateTime<Utc>) -> String {
    match expiry {
        TokenExpiry::ExpiresAt(exp) => {
            let at = DateTime::from_timestamp(*exp, 0)
                .map(|t| t.format("%Y-%m-%d %H:%M:%S UTC").to_string())
                .unwrap_or_else(|| exp.to_string());
            if expiry.is_expired_at(now.timestamp()) {
                format!("expired at {}", at)
            } else {
                format!("valid until {}", at)
            }
        }
        TokenExpiry::NonExpiring => "valid, no expiry claim".to_string(),
        TokenExpiry::Undecodable(reason) => format!("unreadable ({}), treated as expired", reason),
    }
}
