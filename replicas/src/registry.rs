use crate::config::ConnectionConfig;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;

#[derive(thiserror::Error, Debug, PartialEq)]
pub enum ConnectionError {
    #[error("unsupported statement: {0}")]
    Unsupported(String),
    #[error("connection failed: {0}")]
    Failed(String),
}

#[derive(thiserror::Error, Debug, PartialEq)]
pub enum RegistryError {
    #[error("no connection configured with name {0}")]
    UnknownConnection(String),
    #[error("could not open connection {name}: {source}")]
    Open {
        name: String,
        source: ConnectionError,
    },
}

/// A connection to one slice. Every database hosted on the slice shares the
/// same instance, so `USE` changes the selected database for all holders.
#[async_trait]
pub trait ShardConnection: Send + Sync {
    fn port(&self) -> u16;
    async fn execute(&self, statement: &str) -> Result<(), ConnectionError>;
}

/// Hands out connections by name (e.g. "toolforge_s1").
pub trait ConnectionRegistry: Send + Sync {
    fn connection(&self, name: &str) -> Result<Arc<dyn ShardConnection>, RegistryError>;
}

/// Connection descriptor built from configuration. It tracks the database
/// selected with `USE` but does not speak the MySQL protocol itself.
#[derive(Debug)]
pub struct ReplicaConnection {
    host: String,
    port: u16,
    database: Mutex<Option<String>>,
}

impl ReplicaConnection {
    pub fn new(config: &ConnectionConfig) -> Self {
        ReplicaConnection {
            host: config.host.clone(),
            port: config.port,
            database: Mutex::new(None),
        }
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn database(&self) -> Option<String> {
        self.database.lock().clone()
    }
}

#[async_trait]
impl ShardConnection for ReplicaConnection {
    fn port(&self) -> u16 {
        self.port
    }

    async fn execute(&self, statement: &str) -> Result<(), ConnectionError> {
        let mut words = statement.split_whitespace();
        match (words.next(), words.next(), words.next()) {
            (Some(keyword), Some(database), None) if keyword.eq_ignore_ascii_case("use") => {
                *self.database.lock() = Some(database.trim_end_matches(';').to_string());
                Ok(())
            }
            _ => Err(ConnectionError::Unsupported(statement.to_string())),
        }
    }
}

/// Registry over the `connections` config section. Connections are created on
/// first use and then shared.
pub struct ConfiguredRegistry {
    configs: HashMap<String, ConnectionConfig>,
    connections: Mutex<HashMap<String, Arc<ReplicaConnection>>>,
}

impl ConfiguredRegistry {
    pub fn new(configs: HashMap<String, ConnectionConfig>) -> Self {
        ConfiguredRegistry {
            configs,
            connections: Mutex::new(HashMap::new()),
        }
    }

    pub fn replica_connection(&self, name: &str) -> Result<Arc<ReplicaConnection>, RegistryError> {
        let config = self
            .configs
            .get(name)
            .ok_or_else(|| RegistryError::UnknownConnection(name.to_string()))?;

        let mut connections = self.connections.lock();
        let connection = connections
            .entry(name.to_string())
            .or_insert_with(|| Arc::new(ReplicaConnection::new(config)));

        Ok(connection.clone())
    }
}

impl ConnectionRegistry for ConfiguredRegistry {
    fn connection(&self, name: &str) -> Result<Arc<dyn ShardConnection>, RegistryError> {
        let connection: Arc<dyn ShardConnection> = self.replica_connection(name)?;
        Ok(connection)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn get_registry() -> ConfiguredRegistry {
        ConfiguredRegistry::new(HashMap::from([
            (
                "toolforge_s1".into(),
                ConnectionConfig {
                    host: "127.0.0.1".into(),
                    port: 4711,
                },
            ),
            (
                "toolforge_s2".into(),
                ConnectionConfig {
                    host: "127.0.0.1".into(),
                    port: 4712,
                },
            ),
        ]))
    }

    #[test]
    fn test_connections_are_shared() {
        let registry = get_registry();

        let first = registry.replica_connection("toolforge_s1").unwrap();
        let second = registry.replica_connection("toolforge_s1").unwrap();
        let other = registry.replica_connection("toolforge_s2").unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        assert!(!Arc::ptr_eq(&first, &other));
        assert_eq!(first.host(), "127.0.0.1");
        assert_eq!(registry.connection("toolforge_s2").unwrap().port(), 4712);
    }

    #[test]
    fn test_unknown_connection() {
        let registry = get_registry();
        assert_eq!(
            registry.connection("toolforge_s9").err(),
            Some(RegistryError::UnknownConnection("toolforge_s9".into()))
        );
    }

    #[tokio::test]
    async fn test_use_statement() {
        let registry = get_registry();
        let connection = registry.replica_connection("toolforge_s1").unwrap();
        assert_eq!(connection.database(), None);

        connection.execute("USE enwiki_p").await.unwrap();
        assert_eq!(connection.database(), Some("enwiki_p".into()));

        // Visible through every handle to the same slice.
        registry
            .connection("toolforge_s1")
            .unwrap()
            .execute("use ptwiki_p;")
            .await
            .unwrap();
        assert_eq!(connection.database(), Some("ptwiki_p".into()));

        assert_eq!(
            connection.execute("SELECT 1").await,
            Err(ConnectionError::Unsupported("SELECT 1".into()))
        );
    }
}
