use crate::dblist::MAX_SLICES;
use serde::Deserialize;
use std::collections::HashMap;
use thiserror::Error;
use url::Url;

pub const DEFAULT_DBLISTS_URL: &str = "https://noc.wikimedia.org/conf/dblists/";
pub const DEFAULT_CACHE_TTL_SECS: u64 = 60 * 60 * 24 * 7;
pub const DEFAULT_CONNECTION_PREFIX: &str = "toolforge";

#[derive(Error, Debug)]
pub enum ValidationError {
    #[error("invalid dblists URL: {0}")]
    InvalidDbListsUrl(#[from] url::ParseError),

    #[error("max_slices must be between 1 and 50, got {0}")]
    InvalidMaxSlices(u32),

    #[error("cache_ttl_secs cannot be 0")]
    InvalidCacheTtl,

    #[error("connection {0} has port 0")]
    InvalidPort(String),

    #[error("connection {0} has an empty host")]
    EmptyHost(String),
}

#[derive(Clone, Deserialize, Debug, PartialEq, Default)]
#[serde(rename_all = "lowercase")]
#[serde(tag = "type")]
pub enum CacheStoreType {
    #[default]
    Memory,
    Filesystem {
        path: String,
    },
}

/// Parameters of one replica connection, keyed by connection name
/// (e.g. "toolforge_s1").
#[derive(Clone, Deserialize, Debug, PartialEq)]
pub struct ConnectionConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Clone, Deserialize, Debug, PartialEq)]
pub struct Config {
    /// Prefix of the `s{n}.dblist` files
    #[serde(default = "default_dblists_url")]
    pub dblists_url: String,
    /// Upper bound on the number of dblists fetched per rebuild
    #[serde(default = "default_max_slices")]
    pub max_slices: u32,
    /// How long a fetched dblist stays fresh
    #[serde(default = "default_cache_ttl_secs")]
    pub cache_ttl_secs: u64,
    #[serde(default)]
    pub cache: CacheStoreType,
    /// Connections are looked up as "{connection_prefix}_{slice}"
    #[serde(default = "default_connection_prefix")]
    pub connection_prefix: String,
    #[serde(default)]
    pub connections: HashMap<String, ConnectionConfig>,
}

fn default_dblists_url() -> String {
    DEFAULT_DBLISTS_URL.into()
}

fn default_max_slices() -> u32 {
    MAX_SLICES
}

fn default_cache_ttl_secs() -> u64 {
    DEFAULT_CACHE_TTL_SECS
}

fn default_connection_prefix() -> String {
    DEFAULT_CONNECTION_PREFIX.into()
}

impl Default for Config {
    fn default() -> Self {
        Config {
            dblists_url: default_dblists_url(),
            max_slices: default_max_slices(),
            cache_ttl_secs: default_cache_ttl_secs(),
            cache: CacheStoreType::default(),
            connection_prefix: default_connection_prefix(),
            connections: HashMap::new(),
        }
    }
}

impl Config {
    pub fn validate(&self) -> Result<(), ValidationError> {
        Url::parse(&self.dblists_url)?;

        if self.max_slices == 0 || self.max_slices > MAX_SLICES {
            return Err(ValidationError::InvalidMaxSlices(self.max_slices));
        }

        if self.cache_ttl_secs == 0 {
            return Err(ValidationError::InvalidCacheTtl);
        }

        for (name, connection) in &self.connections {
            if connection.host.is_empty() {
                return Err(ValidationError::EmptyHost(name.clone()));
            }
            if connection.port == 0 {
                return Err(ValidationError::InvalidPort(name.clone()));
            }
        }

        Ok(())
    }
}
