use replicas::config::Config as ReplicasConfig;
use serde::Deserialize;
use std::fs::File;

#[derive(Deserialize, Debug)]
pub struct MetricsConfig {
    pub statsd_host: String,
    pub statsd_port: u16,
}

#[derive(Deserialize, Debug)]
pub struct LoggingConfig {
    pub sentry_dsn: String,
}

#[derive(Deserialize, Debug, Default)]
pub struct CommonConfig {
    pub metrics: Option<MetricsConfig>,
    pub logging: Option<LoggingConfig>,
}

/// Where the SSH tunnel is opened and which hosts it forwards to.
#[derive(Deserialize, Debug, PartialEq)]
#[serde(default)]
pub struct SshConfig {
    pub login_host: String,
    /// Appended to "{slice}.{service}" and "tools" to form replica hostnames
    pub host_suffix: String,
    pub remote_port: u16,
}

impl Default for SshConfig {
    fn default() -> Self {
        SshConfig {
            login_host: "login.toolforge.org".into(),
            host_suffix: ".db.svc.eqiad.wmflabs".into(),
            remote_port: 3306,
        }
    }
}

#[derive(Deserialize, Debug)]
pub struct Config {
    #[serde(flatten)]
    pub common: CommonConfig,
    #[serde(default)]
    pub replicas: ReplicasConfig,
    #[serde(default)]
    pub ssh: SshConfig,
}

impl Config {
    pub fn from_file(path: &std::path::Path) -> Result<Self, ConfigError> {
        let file = File::open(path)?;
        let data: Config = serde_yaml::from_reader(file)?;
        data.replicas.validate()?;

        Ok(data)
    }
}

#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("could not load config from file: {0}")]
    LoadError(#[from] std::io::Error),
    #[error("could not parse config: {0}")]
    ParseError(#[from] serde_yaml::Error),
    #[error("invalid replicas config: {0}")]
    ValidationError(#[from] replicas::config::ValidationError),
}
