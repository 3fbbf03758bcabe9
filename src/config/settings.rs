use serde::{Deserialize, Serialize};
use config::{Config, ConfigError, File};
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    pub app: AppSettings,
    pub api: ApiSettings,
    pub files: FileSettings,
    pub schedule: ScheduleSettings,
    pub tasks: TaskSettings,
    pub quiz: QuizSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppSettings {
    pub name: String,
    pub version: String,
    pub log_level: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiSettings {
    pub base_url: String,
    pub origin: String,
    pub referer: String,
    pub user_agent: String,
    pub accept_language: String,
    pub timeout_seconds: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileSettings {
    pub seed_file: PathBuf,
    pub token_file: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleSettings {
    pub account_pause_seconds: u64,
    pub pass_pause_seconds: u64,
    pub min_delay_ms: u64,
    pub max_delay_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskSettings {
    /// Task types that can never be completed automatically.
    pub excluded_types: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuizSettings {
    pub answer_policy: AnswerPolicyKind,
    pub fixed_choice: usize,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AnswerPolicyKind {
    Fixed,
    Random,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            app: AppSettings {
                name: "Reward Bot".to_string(),
                version: env!("CARGO_PKG_VERSION").to_string(),
                log_level: "info".to_string(),
            },
            api: ApiSettings {
                base_url: "https://api.uniquid.io/mainnet".to_string(),
                origin: "https://miniapp.uniquid.io".to_string(),
                referer: "https://miniapp.uniquid.io/".to_string(),
                user_agent: "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
                    (KHTML, like Gecko) Chrome/115.0.0.0 Safari/537.36"
                    .to_string(),
                accept_language: "en-US,en;q=0.9".to_string(),
                timeout_seconds: 30,
            },
            files: FileSettings {
                seed_file: PathBuf::from("data.txt"),
                token_file: PathBuf::from("token.json"),
            },
            schedule: ScheduleSettings {
                account_pause_seconds: 2,
                pass_pause_seconds: 86_400, // 1 day
                min_delay_ms: 1_000,
                max_delay_ms: 3_000,
            },
            tasks: TaskSettings {
                excluded_types: vec!["ConnectOkx".to_string()],
            },
            quiz: QuizSettings {
                answer_policy: AnswerPolicyKind::Fixed,
                fixed_choice: 0,
            },
        }
    }
}

impl Settings {
    pub fn new() -> Result<Self, ConfigError> {
        Self::from_dir(".")
    }

    /// Layer `<root>/config/default` and `<root>/config/local` (any supported format,
    /// both optional) and the environment over the defaults.
    pub fn from_dir<P: AsRef<Path>>(root: P) -> Result<Self, ConfigError> {
        let config_dir = root.as_ref().join("config");
        let s = Config::builder()
            .add_source(Config::try_from(&Settings::default())?)
            .add_source(File::from(config_dir.join("default")).required(false))
            .add_source(File::from(config_dir.join("local")).required(false))
            .add_source(config::Environment::with_prefix("REWARD_BOT").separator("__"))
            .build()?;

        s.try_deserialize()
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let s = Config::builder()
            .add_source(Config::try_from(&Settings::default())?)
            .add_source(File::from(path.as_ref()))
            .add_source(config::Environment::with_prefix("REWARD_BOT").separator("__"))
            .build()?;

        s.try_deserialize()
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.api.timeout_seconds)
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.api.base_url.trim().is_empty() {
            return Err("API base URL must not be empty".to_string());
        }

        if self.api.timeout_seconds == 0 {
            return Err("API timeout must be at least one second".to_string());
        }

        if self.schedule.min_delay_ms > self.schedule.max_delay_ms {
            return Err(format!(
                "min_delay_ms ({}) must not exceed max_delay_ms ({})",
                self.schedule.min_delay_ms, self.schedule.max_delay_ms
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_settings_are_valid() {
        let settings = Settings::default();
        assert!(settings.validate().is_ok());
        assert_eq!(settings.schedule.pass_pause_seconds, 86_400);
        assert_eq!(settings.tasks.excluded_types, vec!["ConnectOkx".to_string()]);
        assert_eq!(settings.quiz.answer_policy, AnswerPolicyKind::Fixed);
    }

    #[test]
    fn test_inverted_delay_range_rejected() {
        let mut settings = Settings::default();
        settings.schedule.min_delay_ms = 5_000;
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_from_file_overrides_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bot.toml");
        std::fs::write(
            &path,
            "[quiz]\nanswer_policy = \"random\"\nfixed_choice = 1\n\n[files]\nseed_file = \"accounts.txt\"\n",
        )
        .unwrap();

        let settings = Settings::from_file(&path).unwrap();
        assert_eq!(settings.quiz.answer_policy, AnswerPolicyKind::Random);
        assert_eq!(settings.files.seed_file, PathBuf::from("accounts.txt"));
        assert_eq!(settings.files.token_file, PathBuf::from("token.json"));
        assert_eq!(settings.api.timeout_seconds, 30);
    }

    #[test]
    fn test_missing_config_dir_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let settings = Settings::from_dir(dir.path()).unwrap();
        assert_eq!(settings.files.seed_file, PathBuf::from("data.txt"));
    }

    #[test]
    fn test_broken_local_config_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("config")).unwrap();
        std::fs::write(dir.path().join("config").join("local.toml"), "[schedule\nmin_delay_ms = ").unwrap();

        assert!(Settings::from_dir(dir.path()).is_err());
    }
}
