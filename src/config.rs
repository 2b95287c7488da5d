use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::path::Path;

/// Top-level application configuration, matching every field enumerated
/// in spec §6 plus the ambient runtime/categories sections.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub source: SourceConfig,
    pub ocr: OcrConfig,
    pub broker: BrokerConfig,
    pub mail: MailConfig,
    pub database: DatabaseConfig,
    #[serde(default)]
    pub schedule: ScheduleConfig,
    #[serde(default)]
    pub runtime: RuntimeConfig,
    #[serde(default)]
    pub categories: CategoriesConfig,
    #[serde(default)]
    pub parser: ParserConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default = "default_mode")]
    pub mode: RunMode,
    #[serde(default)]
    pub health_port: Option<u16>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunMode {
    Commit,
    Validate,
    Test,
}

fn default_mode() -> RunMode {
    RunMode::Commit
}

#[derive(Debug, Clone, Deserialize)]
pub struct SourceConfig {
    /// Path to stored IMAP credentials; loading mechanics are out of scope.
    pub credentials_path: String,
    #[serde(default = "default_imap_host")]
    pub imap_host: String,
    #[serde(default = "default_imap_port")]
    pub imap_port: u16,
}

fn default_imap_host() -> String {
    "imap.gmail.com".to_string()
}
fn default_imap_port() -> u16 {
    993
}

#[derive(Debug, Clone, Deserialize)]
pub struct OcrConfig {
    pub api_key: String,
    #[serde(default = "default_ocr_endpoint")]
    pub endpoint: String,
}

fn default_ocr_endpoint() -> String {
    "https://ocr.internal/v1/tables".to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct BrokerConfig {
    pub host: String,
    pub port: u16,
    pub client_id: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MailConfig {
    pub host: String,
    #[serde(default = "default_smtp_port")]
    pub port: u16,
    pub user: String,
    pub password: String,
    pub from: String,
    pub to: Vec<String>,
}

fn default_smtp_port() -> u16 {
    587
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

fn default_max_connections() -> u32 {
    5
}

#[derive(Debug, Clone, Deserialize)]
pub struct ScheduleConfig {
    #[serde(default = "default_extraction_time")]
    pub extraction_time: String,
    #[serde(default = "default_am_time")]
    pub am_time: String,
    #[serde(default = "default_pm_time")]
    pub pm_time: String,
    #[serde(default = "default_timezone")]
    pub timezone: String,
}

fn default_extraction_time() -> String {
    "09:00".to_string()
}
fn default_am_time() -> String {
    "10:45".to_string()
}
fn default_pm_time() -> String {
    "14:30".to_string()
}
fn default_timezone() -> String {
    "America/New_York".to_string()
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            extraction_time: default_extraction_time(),
            am_time: default_am_time(),
            pm_time: default_pm_time(),
            timezone: default_timezone(),
        }
    }
}

/// Bounded fan-out and per-call deadlines (spec §5).
#[derive(Debug, Clone, Deserialize)]
pub struct RuntimeConfig {
    #[serde(default = "default_parallelism")]
    pub parallelism: usize,
    /// Spacing between broker submissions, in milliseconds.
    #[serde(default = "default_broker_spacing_ms")]
    pub broker_spacing_ms: u64,
    #[serde(default)]
    pub per_call_deadlines: PerCallDeadlines,
}

fn default_parallelism() -> usize {
    8
}
fn default_broker_spacing_ms() -> u64 {
    500
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            parallelism: default_parallelism(),
            broker_spacing_ms: default_broker_spacing_ms(),
            per_call_deadlines: PerCallDeadlines::default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct PerCallDeadlines {
    #[serde(default = "default_ocr_deadline_secs")]
    pub ocr_secs: u64,
    #[serde(default = "default_broker_deadline_secs")]
    pub broker_secs: u64,
    #[serde(default = "default_smtp_deadline_secs")]
    pub smtp_secs: u64,
    #[serde(default = "default_source_deadline_secs")]
    pub source_secs: u64,
    #[serde(default = "default_job_deadline_secs")]
    pub job_secs: u64,
}

fn default_ocr_deadline_secs() -> u64 {
    30
}
fn default_broker_deadline_secs() -> u64 {
    5
}
fn default_smtp_deadline_secs() -> u64 {
    20
}
fn default_source_deadline_secs() -> u64 {
    15
}
fn default_job_deadline_secs() -> u64 {
    20 * 60
}

impl Default for PerCallDeadlines {
    fn default() -> Self {
        Self {
            ocr_secs: default_ocr_deadline_secs(),
            broker_secs: default_broker_deadline_secs(),
            smtp_secs: default_smtp_deadline_secs(),
            source_secs: default_source_deadline_secs(),
            job_secs: default_job_deadline_secs(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CategoriesConfig {
    #[serde(default = "default_weekly_categories")]
    pub weekly: Vec<String>,
    #[serde(default = "default_daily_categories")]
    pub daily: Vec<String>,
}

fn default_weekly_categories() -> Vec<String> {
    vec![
        "daily".to_string(),
        "digitalassets".to_string(),
        "etfs".to_string(),
        "ideas".to_string(),
    ]
}

fn default_daily_categories() -> Vec<String> {
    vec!["daily".to_string(), "digitalassets".to_string()]
}

impl Default for CategoriesConfig {
    fn default() -> Self {
        Self {
            weekly: default_weekly_categories(),
            daily: default_daily_categories(),
        }
    }
}

/// Publisher-layout constants, kept as configuration per the §9 design note
/// so a layout shift is a config edit, not a code change.
#[derive(Debug, Clone, Deserialize)]
pub struct ParserConfig {
    #[serde(default = "default_crypto_levels_index")]
    pub crypto_levels_image_index: usize,
    #[serde(default = "default_crypto_stocks_index")]
    pub crypto_stocks_image_index: usize,
}

fn default_crypto_levels_index() -> usize {
    6
}
fn default_crypto_stocks_index() -> usize {
    14
}

impl Default for ParserConfig {
    fn default() -> Self {
        Self {
            crypto_levels_image_index: default_crypto_levels_index(),
            crypto_stocks_image_index: default_crypto_stocks_index(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default)]
    pub json: bool,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl AppConfig {
    /// Load configuration from the default `config/` directory.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from("config")
    }

    /// Load from a config directory (`default.toml` + environment overlay)
    /// or a single TOML file, then apply `STOCKALERTS_` env var overrides.
    pub fn load_from<P: AsRef<Path>>(config_dir: P) -> Result<Self, ConfigError> {
        let config_path = config_dir.as_ref();

        let mut builder = Config::builder()
            .set_default("logging.level", "info")?
            .set_default("logging.json", false)?
            .set_default("database.max_connections", 5)?
            .set_default("runtime.parallelism", 8)?
            .set_default("runtime.broker_spacing_ms", 500)?
            .set_default("mode", "commit")?;

        if config_path.is_file() {
            builder = builder.add_source(File::from(config_path).required(true));
        } else {
            builder = builder
                .add_source(File::from(config_path.join("default.toml")).required(false))
                .add_source(
                    File::from(config_path.join(
                        std::env::var("STOCKALERTS_ENV").unwrap_or_else(|_| "development".to_string()),
                    ))
                    .required(false),
                );
        }

        builder = builder.add_source(
            Environment::with_prefix("STOCKALERTS")
                .prefix_separator("_")
                .separator("__")
                .list_separator(",")
                .with_list_parse_key("categories.weekly")
                .with_list_parse_key("categories.daily")
                .with_list_parse_key("mail.to")
                .try_parsing(true),
        );

        builder.build()?.try_deserialize()
    }

    /// Validate cross-field invariants. Returns the list of problems found.
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if self.runtime.parallelism == 0 {
            errors.push("runtime.parallelism must be > 0".to_string());
        }
        if self.mail.to.is_empty() {
            errors.push("mail.to must contain at least one recipient".to_string());
        }
        if self.database.max_connections == 0 {
            errors.push("database.max_connections must be > 0".to_string());
        }
        if self.parser.crypto_levels_image_index == self.parser.crypto_stocks_image_index {
            errors.push(
                "parser.crypto_levels_image_index and crypto_stocks_image_index must differ"
                    .to_string(),
            );
        }

        errors
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_categories_match_the_weekly_vs_daily_split() {
        let cfg = CategoriesConfig::default();
        assert_eq!(cfg.weekly.len(), 4);
        assert_eq!(cfg.daily, vec!["daily", "digitalassets"]);
    }

    #[test]
    fn validate_flags_missing_recipients() {
        let cfg = AppConfig {
            source: SourceConfig {
                credentials_path: "creds.json".into(),
                imap_host: default_imap_host(),
                imap_port: default_imap_port(),
            },
            ocr: OcrConfig {
                api_key: "key".into(),
                endpoint: default_ocr_endpoint(),
            },
            broker: BrokerConfig {
                host: "localhost".into(),
                port: 4002,
                client_id: 1,
            },
            mail: MailConfig {
                host: "smtp.example.com".into(),
                port: default_smtp_port(),
                user: "bot".into(),
                password: "secret".into(),
                from: "bot@example.com".into(),
                to: vec![],
            },
            database: DatabaseConfig {
                url: "postgres://localhost/stockalerts".into(),
                max_connections: default_max_connections(),
            },
            schedule: ScheduleConfig::default(),
            runtime: RuntimeConfig::default(),
            categories: CategoriesConfig::default(),
            parser: ParserConfig::default(),
            logging: LoggingConfig::default(),
            mode: RunMode::Commit,
            health_port: None,
        };

        let errors = cfg.validate();
        assert!(errors.iter().any(|e| e.contains("mail.to")));
    }

    #[test]
    fn parser_indices_must_differ() {
        let cfg = ParserConfig {
            crypto_levels_image_index: 6,
            crypto_stocks_image_index: 6,
        };
        assert_eq!(cfg.crypto_levels_image_index, cfg.crypto_stocks_image_index);
    }
}
