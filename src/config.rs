use anyhow::Result;
use clap::{Parser, Subcommand};
use serde::Deserialize;
use std::env;
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(name = "archiver")]
#[command(about = "Stores bookmarks and hands out crawl work", long_about = None)]
pub struct Cli {
    #[arg(short = 'c', long = "config")]
    pub config_path: Option<String>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Run the HTTP service (default)
    Serve,
    /// Add a key to the api key allowlist
    AddKey { key: String },
}

pub fn default_config_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".archiver")
}

pub fn default_config_path() -> PathBuf {
    default_config_dir().join("config.yaml")
}

#[derive(Debug, Deserialize, Default, Clone)]
pub struct App {
    database: String,
    port: i32,
    #[serde(default = "default_env")]
    env: String,
    #[serde(default)]
    pub turso_url: Option<String>,
    #[serde(default)]
    pub turso_auth_token: Option<String>,
    #[serde(default = "default_sync_interval")]
    pub sync_interval_seconds: u64,
}

fn default_env() -> String {
    "development".to_string()
}

fn default_sync_interval() -> u64 {
    60
}

impl App {
    pub fn get_db(&self) -> &str {
        &self.database
    }

    pub fn get_port(&self) -> i32 {
        self.port
    }

    pub fn is_production(&self) -> bool {
        self.env == "production"
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct Queue {
    #[serde(default = "default_lease_batch_size")]
    pub lease_batch_size: usize,
    #[serde(default = "default_lease_staleness")]
    pub lease_staleness_seconds: u64,
}

fn default_lease_batch_size() -> usize {
    5
}

fn default_lease_staleness() -> u64 {
    24 * 60 * 60
}

impl Default for Queue {
    fn default() -> Self {
        Queue {
            lease_batch_size: default_lease_batch_size(),
            lease_staleness_seconds: default_lease_staleness(),
        }
    }
}

impl Queue {
    pub fn staleness(&self) -> Duration {
        Duration::from_secs(self.lease_staleness_seconds)
    }
}

#[derive(Debug, Deserialize)]
pub struct Config {
    pub app: App,
    #[serde(default)]
    pub queue: Queue,
}

impl Config {
    pub fn new(path: &str) -> Result<Self> {
        let cfg = Config::load_config(path)?;
        Ok(cfg)
    }

    fn load_config(path: &str) -> Result<Config> {
        let yaml_str = fs::read_to_string(path)?;
        Config::from_yaml(&yaml_str)
    }

    pub fn from_yaml(yaml_str: &str) -> Result<Config> {
        let yaml_with_env = Config::substitute_env_vars(yaml_str)?;
        let config: Config = serde_yaml::from_str(&yaml_with_env)?;
        Ok(config)
    }

    fn substitute_env_vars(yaml_str: &str) -> Result<String> {
        let mut result = yaml_str.to_string();
        let mut offset = 0;

        while let Some(start) = result[offset..].find("${") {
            let actual_start = offset + start;
            if let Some(end) = result[actual_start..].find("}") {
                let var_name = &result[actual_start + 2..actual_start + end];

                // ${VAR:-default}
                let env_value = if let Some(default_start) = var_name.find(":-") {
                    let actual_var = &var_name[..default_start];
                    let default_val = &var_name[default_start + 2..];
                    env::var(actual_var).unwrap_or_else(|_| default_val.to_string())
                } else {
                    env::var(var_name).unwrap_or_else(|_| {
                        tracing::warn!("environment variable '{}' not found", var_name);
                        String::new()
                    })
                };

                result.replace_range(actual_start..actual_start + end + 1, &env_value);
                offset = actual_start + env_value.len();
            } else {
                break;
            }
        }

        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_fill_queue_section() {
        let cfg = Config::from_yaml("app:\n  database: archiver.db\n  port: 8080\n").unwrap();
        assert_eq!(cfg.app.get_db(), "archiver.db");
        assert_eq!(cfg.app.get_port(), 8080);
        assert!(!cfg.app.is_production());
        assert_eq!(cfg.queue.lease_batch_size, 5);
        assert_eq!(cfg.queue.staleness(), Duration::from_secs(86_400));
    }

    #[test]
    fn test_env_default_substitution() {
        let yaml = "app:\n  database: ${ARCHIVER_TEST_UNSET_DB:-fallback.db}\n  port: 9000\n  env: production\nqueue:\n  lease_staleness_seconds: 60\n";
        let cfg = Config::from_yaml(yaml).unwrap();
        assert_eq!(cfg.app.get_db(), "fallback.db");
        assert!(cfg.app.is_production());
        assert_eq!(cfg.queue.staleness(), Duration::from_secs(60));
        assert_eq!(cfg.queue.lease_batch_size, 5);
    }

    #[test]
    fn test_cli_subcommands() {
        let cli = Cli::parse_from(["archiver", "-c", "/tmp/cfg.yaml", "add-key", "secret"]);
        assert_eq!(cli.config_path.as_deref(), Some("/tmp/cfg.yaml"));
        assert_eq!(cli.command, Some(Command::AddKey { key: "secret".to_string() }));

        let cli = Cli::parse_from(["archiver"]);
        assert_eq!(cli.command, None);
    }
}
