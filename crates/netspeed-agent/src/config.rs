//! Agent configuration

use anyhow::{Context, Result};
use netspeed_lib::Settings;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Environment variable naming an optional configuration file
pub const CONFIG_PATH_ENV: &str = "NETSPEED_CONFIG";

/// Agent configuration
///
/// Keys are kebab-case in files. Environment variables use the `NETSPEED_`
/// prefix with underscores (`NETSPEED_UPDATE_INTERVAL`).
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct AgentConfig {
    /// Host name used in structured logs
    #[serde(default = "default_host_name")]
    pub host_name: String,

    /// Monitor settings, defaults from [`Settings::default`]
    #[serde(flatten)]
    pub settings: Settings,

    /// Counter report location
    #[serde(default = "default_net_dev_path")]
    pub net_dev_path: PathBuf,

    /// Uptime report location
    #[serde(default = "default_uptime_path")]
    pub uptime_path: PathBuf,

    /// Where the usage baseline is kept between runs
    #[serde(default = "default_state_path")]
    pub state_path: PathBuf,

    /// Prometheus textfile written after every tick
    #[serde(default)]
    pub metrics_textfile: Option<PathBuf>,
}

fn default_host_name() -> String {
    std::env::var("HOSTNAME").unwrap_or_else(|_| "localhost".to_string())
}

fn default_net_dev_path() -> PathBuf {
    PathBuf::from("/proc/net/dev")
}

fn default_uptime_path() -> PathBuf {
    PathBuf::from("/proc/uptime")
}

fn default_state_path() -> PathBuf {
    dirs_next::home_dir()
        .map(|home| home.join(".local").join("state").join("netspeed"))
        .unwrap_or_else(|| PathBuf::from("."))
        .join("state.json")
}

impl AgentConfig {
    /// Load configuration from the optional config file and environment
    pub fn load() -> Result<Self> {
        let file = std::env::var(CONFIG_PATH_ENV).ok().map(PathBuf::from);
        Self::load_from(file.as_deref(), None)
    }

    /// Load from an explicit file and environment map (for testing)
    pub fn load_from(file: Option<&Path>, env: Option<HashMap<String, String>>) -> Result<Self> {
        let mut builder = config::Config::builder();
        if let Some(path) = file {
            builder = builder.add_source(config::File::from(path));
        }

        let config = builder
            .add_source(
                config::Environment::with_prefix("NETSPEED")
                    .convert_case(config::Case::Kebab)
                    .try_parsing(true)
                    .list_separator(",")
                    .with_list_parse_key("interfaces")
                    .source(env),
            )
            .build()
            .context("Failed to read configuration")?;

        let agent: AgentConfig = config
            .try_deserialize()
            .context("Invalid configuration")?;
        agent.settings.validate()?;

        Ok(agent)
    }

    /// Settings snapshot for the sampling loop
    pub fn settings(&self) -> Settings {
        self.settings.clone()
    }
}
