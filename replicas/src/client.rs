use crate::cache::{CacheStore, get_cache_store};
use crate::clock::{Clock, SystemClock};
use crate::config::Config;
use crate::dblist::DbListSource;
use crate::errors::{ReplicasError, Result};
use crate::metrics_defs::{
    DBLIST_CACHE_HIT, DBLIST_CACHE_MISS, DBLIST_DATABASES, DBLIST_FETCH_FAILURE,
    DBLIST_STALE_SERVED,
};
use crate::registry::{ConnectionRegistry, RegistryError, ShardConnection};
use crate::types::{CacheEntry, DbList, SliceId};
use crate::{counter, gauge};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

pub const DBLIST_CACHE_KEY: &str = "toolforge.dblists";

struct ReplicasClientInner {
    source: DbListSource,
    cache: Arc<dyn CacheStore>,
    registry: Arc<dyn ConnectionRegistry>,
    clock: Arc<dyn Clock>,
    ttl: Duration,
    connection_prefix: String,
    // Held for the duration of a rebuild so callers in this process wait for
    // the running fetch instead of starting their own.
    rebuild_lock: Mutex<()>,
}

/// Resolves which slice hosts a database and hands out the shared
/// connection for that slice.
#[derive(Clone)]
pub struct ReplicasClient {
    inner: Arc<ReplicasClientInner>,
}

impl ReplicasClient {
    pub fn new(config: &Config, registry: Arc<dyn ConnectionRegistry>) -> Self {
        Self::with_parts(
            config,
            get_cache_store(&config.cache),
            registry,
            Arc::new(SystemClock),
        )
    }

    pub fn with_parts(
        config: &Config,
        cache: Arc<dyn CacheStore>,
        registry: Arc<dyn ConnectionRegistry>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        ReplicasClient {
            inner: Arc::new(ReplicasClientInner {
                source: DbListSource::new(&config.dblists_url, config.max_slices),
                cache,
                registry,
                clock,
                ttl: Duration::from_secs(config.cache_ttl_secs),
                connection_prefix: config.connection_prefix.clone(),
                rebuild_lock: Mutex::new(()),
            }),
        }
    }

    /// Returns the database → slice mapping, rebuilding it from the dblists
    /// source once the cached copy has expired.
    ///
    /// If the rebuild fails and an expired copy exists, the expired copy is
    /// returned and nothing is stored, so the next call tries again.
    pub async fn db_list(&self) -> Result<DbList> {
        if let Some(entry) = self.fresh_entry().await {
            counter!(DBLIST_CACHE_HIT).increment(1);
            return Ok(entry.db_list);
        }

        let _guard = self.inner.rebuild_lock.lock().await;

        // Another caller may have finished a rebuild while we waited.
        let cached = self.load_entry().await;
        if let Some(entry) = &cached
            && entry.is_fresh(self.inner.clock.now())
        {
            counter!(DBLIST_CACHE_HIT).increment(1);
            return Ok(entry.db_list.clone());
        }

        counter!(DBLIST_CACHE_MISS).increment(1);

        match self.inner.source.fetch().await {
            Ok(db_list) => {
                let entry = CacheEntry {
                    db_list: db_list.clone(),
                    expires_at: self.inner.clock.now() + self.inner.ttl,
                };
                self.store_entry(entry).await;
                gauge!(DBLIST_DATABASES).set(db_list.len() as f64);
                Ok(db_list)
            }
            Err(err) => {
                counter!(DBLIST_FETCH_FAILURE).increment(1);
                match cached {
                    Some(stale) => {
                        tracing::warn!(error = %err, "Dblist rebuild failed, serving expired copy");
                        counter!(DBLIST_STALE_SERVED).increment(1);
                        Ok(stale.db_list)
                    }
                    None => Err(err.into()),
                }
            }
        }
    }

    /// Returns the connection serving `database`, which may carry the `_p`
    /// suffix. Databases on the same slice share one connection.
    ///
    /// With `use_database` the connection is switched to `{database}_p`
    /// first. This costs a round trip, so cross-wiki callers should prefer
    /// qualifying table names and pass `false`.
    pub async fn connection(
        &self,
        database: &str,
        use_database: bool,
    ) -> Result<Arc<dyn ShardConnection>> {
        let slice = self.slice(database).await?;
        let connection = self
            .inner
            .registry
            .connection(&self.connection_name(&slice))?;

        if use_database {
            let database = normalize_database(database);
            connection.execute(&format!("USE {database}_p")).await?;
        }

        Ok(connection)
    }

    /// Slice hosting `database`, with or without the `_p` suffix.
    pub async fn slice(&self, database: &str) -> Result<SliceId> {
        let database = normalize_database(database);
        self.db_list()
            .await?
            .slice(database)
            .map(SliceId::from)
            .ok_or_else(|| ReplicasError::UnknownDatabase(database.to_string()))
    }

    /// Port of the connection configured for `slice` ("s1", "toolsdb", ...).
    pub fn port_for_slice(&self, slice: &str) -> Result<u16> {
        match self.inner.registry.connection(&self.connection_name(slice)) {
            Ok(connection) => Ok(connection.port()),
            Err(RegistryError::UnknownConnection(_)) => {
                Err(ReplicasError::UnknownShard(slice.to_string()))
            }
            Err(err) => Err(err.into()),
        }
    }

    fn connection_name(&self, slice: &str) -> String {
        format!("{}_{slice}", self.inner.connection_prefix)
    }

    async fn fresh_entry(&self) -> Option<CacheEntry> {
        self.load_entry()
            .await
            .filter(|entry| entry.is_fresh(self.inner.clock.now()))
    }

    // Stores may block on file I/O, so they run on the blocking pool. Failures
    // are logged and treated as a miss.
    async fn load_entry(&self) -> Option<CacheEntry> {
        let cache = self.inner.cache.clone();
        match tokio::task::spawn_blocking(move || cache.load(DBLIST_CACHE_KEY)).await {
            Ok(Ok(entry)) => entry,
            Ok(Err(err)) => {
                tracing::warn!(error = %err, "Failed to load dblist from cache");
                None
            }
            Err(err) => {
                tracing::warn!(error = %err, "Dblist cache load task failed");
                None
            }
        }
    }

    async fn store_entry(&self, entry: CacheEntry) {
        let cache = self.inner.cache.clone();
        match tokio::task::spawn_blocking(move || cache.store(DBLIST_CACHE_KEY, &entry)).await {
            Ok(Ok(())) => {}
            Ok(Err(err)) => tracing::warn!(error = %err, "Failed to store dblist in cache"),
            Err(err) => tracing::warn!(error = %err, "Dblist cache store task failed"),
        }
    }
}

fn normalize_database(database: &str) -> &str {
    database.strip_suffix("_p").unwrap_or(database)
}
