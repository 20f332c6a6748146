//! QueryRunner configuration types and loading

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use eyre::{Context, Result};
use hourledger::LedgerMode;
use serde::{Deserialize, Serialize};

use crate::scheduler::SchedulerConfig;

/// Main QueryRunner configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct Config {
    /// Log level used when `--log-level` is not given
    pub log_level: Option<String>,

    /// Object storage configuration
    pub store: StoreConfig,

    /// Remote query service configuration
    pub service: ServiceConfig,

    /// Alert delivery configuration
    pub alert: AlertConfig,

    /// Steps run in order by `qr run`
    pub steps: Vec<StepConfig>,
}

impl Config {
    /// Validate configuration before use
    ///
    /// Call this early in startup to fail fast with clear error messages.
    pub fn validate(&self) -> Result<()> {
        if self.steps.is_empty() {
            return Err(eyre::eyre!("No steps configured"));
        }

        let mut names = HashSet::new();
        for step in &self.steps {
            if step.name.is_empty() {
                return Err(eyre::eyre!("Step name must not be empty"));
            }
            if !names.insert(step.name.as_str()) {
                return Err(eyre::eyre!("Duplicate step name '{}'", step.name));
            }
            if step.scheduler.max_concurrency < 1 {
                return Err(eyre::eyre!("Step '{}': max-concurrency must be at least 1", step.name));
            }
            if step.scheduler.poll_interval_secs < 1 {
                return Err(eyre::eyre!("Step '{}': poll-interval-secs must be at least 1", step.name));
            }
            if let Some(setup) = &step.setup {
                if setup.clean_bucket.is_some() && setup.clean_prefix.is_none() {
                    return Err(eyre::eyre!(
                        "Step '{}': setup clean-bucket requires clean-prefix",
                        step.name
                    ));
                }
            }
        }
        Ok(())
    }

    /// Load configuration with fallback chain
    pub fn load(config_path: Option<&PathBuf>) -> Result<Self> {
        // If explicit config path provided, try to load it
        if let Some(path) = config_path {
            return Self::load_from_file(path).context(format!("Failed to load config from {}", path.display()));
        }

        // Try project-local config: .queryrunner.yml
        let local_config = PathBuf::from(".queryrunner.yml");
        if local_config.exists() {
            match Self::load_from_file(&local_config) {
                Ok(config) => return Ok(config),
                Err(e) => {
                    tracing::warn!("Failed to load config from {}: {}", local_config.display(), e);
                }
            }
        }

        // Try user config: ~/.config/queryrunner/queryrunner.yml
        if let Some(config_dir) = dirs::config_dir() {
            let user_config = config_dir.join("queryrunner").join("queryrunner.yml");
            if user_config.exists() {
                match Self::load_from_file(&user_config) {
                    Ok(config) => return Ok(config),
                    Err(e) => {
                        tracing::warn!("Failed to load config from {}: {}", user_config.display(), e);
                    }
                }
            }
        }

        tracing::info!("No config file found, using defaults");
        Ok(Self::default())
    }

    fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path).context("Failed to read config file")?;

        let config: Self = serde_yaml::from_str(&content).context("Failed to parse config file")?;

        tracing::info!("Loaded config from: {}", path.as_ref().display());
        Ok(config)
    }

    /// Look up a step by name
    pub fn step(&self, name: &str) -> Option<&StepConfig> {
        self.steps.iter().find(|s| s.name == name)
    }

    /// Steps selected by an optional `--step` filter
    pub fn selected_steps(&self, name: Option<&str>) -> Result<Vec<&StepConfig>> {
        match name {
            Some(name) => self
                .step(name)
                .map(|s| vec![s])
                .ok_or_else(|| eyre::eyre!("Unknown step '{}'", name)),
            None => Ok(self.steps.iter().collect()),
        }
    }
}

/// Object storage configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct StoreConfig {
    /// Root directory; each bucket is a subdirectory
    pub root: PathBuf,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("./data"),
        }
    }
}

/// Remote query service configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct ServiceConfig {
    pub base_url: String,

    /// Environment variable holding the bearer token
    pub api_key_env: String,

    /// Per-request timeout in milliseconds
    pub timeout_ms: u64,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8080".to_string(),
            api_key_env: "QUERYRUNNER_API_KEY".to_string(),
            timeout_ms: 30_000,
        }
    }
}

/// Alert delivery configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct AlertConfig {
    /// Webhook receiving `{"text": ...}`; alerts are only logged when unset
    pub webhook_url: Option<String>,
}

/// One ledger-driven query step
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct StepConfig {
    pub name: String,

    /// Where the ledger snapshot lives
    pub control_bucket: String,
    pub control_key: String,

    /// Where the SQL template lives
    pub query_bucket: String,
    pub query_key: String,

    /// Result destination template
    pub output_location: String,

    pub database: String,

    #[serde(default)]
    pub workgroup: Option<String>,

    /// Days ahead of today the ledger extends to; enables backfill mode
    #[serde(default)]
    pub control_days: Option<i64>,

    /// Seed backfill days with all 24 hours
    #[serde(default)]
    pub append_hours: bool,

    #[serde(default)]
    pub scheduler: SchedulerConfig,

    /// Destructive setup unit run alone before the hourly queries
    #[serde(default)]
    pub setup: Option<SetupConfig>,
}

impl StepConfig {
    pub fn mode(&self) -> LedgerMode {
        match self.control_days {
            Some(control_days) => LedgerMode::Backfill {
                control_days,
                append_hours: self.append_hours,
            },
            None => LedgerMode::Disabled,
        }
    }
}

/// Setup unit of a step; its template is read from the step's query bucket
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct SetupConfig {
    pub name: String,
    pub query_key: String,
    pub output_location: String,

    /// Objects under this prefix are deleted before the setup unit runs
    #[serde(default)]
    pub clean_prefix: Option<String>,

    /// Bucket holding `clean-prefix`; defaults to the step's query bucket
    #[serde(default)]
    pub clean_bucket: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tempfile::TempDir;

    const YAML: &str = r#"
log-level: debug
store:
  root: /var/lib/qr
service:
  base-url: https://queries.example.com
  api-key-env: MY_KEY
alert:
  webhook-url: https://hooks.example.com/abc
steps:
  - name: hourly-events
    control-bucket: control
    control-key: events/control.json
    query-bucket: queries
    query-key: events/hourly.sql
    output-location: "out/events/{{date}}/{{hour}}/"
    database: analytics
    workgroup: primary
    scheduler:
      max-concurrency: 5
      timeout-secs: 1200
    setup:
      name: drop-events
      query-key: events/drop.sql
      output-location: "out/events/_setup/"
      clean-prefix: events/
      clean-bucket: results
  - name: backfill
    control-bucket: control
    control-key: backfill/control.json
    query-bucket: queries
    query-key: backfill.sql
    output-location: "out/backfill/{{date}}/"
    database: analytics
    control-days: -3
    append-hours: true
"#;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.store.root, PathBuf::from("./data"));
        assert_eq!(config.service.base_url, "http://localhost:8080");
        assert_eq!(config.service.api_key_env, "QUERYRUNNER_API_KEY");
        assert_eq!(config.service.timeout_ms, 30_000);
        assert!(config.alert.webhook_url.is_none());
        assert!(config.steps.is_empty());
    }

    #[test]
    fn test_deserialize_config() {
        let config: Config = serde_yaml::from_str(YAML).unwrap();

        assert_eq!(config.log_level.as_deref(), Some("debug"));
        assert_eq!(config.store.root, PathBuf::from("/var/lib/qr"));
        assert_eq!(config.service.api_key_env, "MY_KEY");
        assert_eq!(config.service.timeout_ms, 30_000);
        assert_eq!(config.steps.len(), 2);

        let events = config.step("hourly-events").unwrap();
        assert_eq!(events.workgroup.as_deref(), Some("primary"));
        assert_eq!(events.scheduler.max_concurrency, 5);
        assert_eq!(events.scheduler.timeout(), Duration::from_secs(1200));
        assert_eq!(events.scheduler.retry_limit, 3);
        assert_eq!(events.mode(), LedgerMode::Disabled);
        let setup = events.setup.as_ref().unwrap();
        assert_eq!(setup.clean_bucket.as_deref(), Some("results"));

        let backfill = config.step("backfill").unwrap();
        assert!(backfill.setup.is_none());
        assert_eq!(
            backfill.mode(),
            LedgerMode::Backfill {
                control_days: -3,
                append_hours: true
            }
        );
        config.validate().unwrap();
    }

    #[test]
    fn test_validate_rejects_bad_configs() {
        assert!(Config::default().validate().is_err());

        let mut config: Config = serde_yaml::from_str(YAML).unwrap();
        config.steps[1].name = "hourly-events".to_string();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("Duplicate step name"));

        let mut config: Config = serde_yaml::from_str(YAML).unwrap();
        config.steps[0].scheduler.max_concurrency = 0;
        assert!(config.validate().unwrap_err().to_string().contains("max-concurrency"));

        let mut config: Config = serde_yaml::from_str(YAML).unwrap();
        config.steps[1].scheduler.poll_interval_secs = 0;
        assert!(config.validate().unwrap_err().to_string().contains("poll-interval-secs"));
    }

    #[test]
    fn test_selected_steps() {
        let config: Config = serde_yaml::from_str(YAML).unwrap();
        assert_eq!(config.selected_steps(None).unwrap().len(), 2);
        assert_eq!(config.selected_steps(Some("backfill")).unwrap()[0].name, "backfill");
        assert!(config.selected_steps(Some("nope")).is_err());
    }

    #[test]
    fn test_load_explicit_path() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("qr.yml");
        fs::write(&path, YAML).unwrap();

        let config = Config::load(Some(&path)).unwrap();
        assert_eq!(config.steps.len(), 2);

        let missing = temp.path().join("missing.yml");
        assert!(Config::load(Some(&missing)).is_err());
    }
}
