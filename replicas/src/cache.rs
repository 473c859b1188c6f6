//! Stores for the resolved dblist. The client decides freshness from the
//! entry's expiry; stores only persist whole entries.
use crate::config::CacheStoreType;
use crate::types::CacheEntry;
use moka::sync::Cache;
use std::fs::{self, File};
use std::io::{self, Read, Write};
use std::path::PathBuf;
use std::sync::Arc;
use tempfile::NamedTempFile;

#[derive(thiserror::Error, Debug)]
pub enum CacheError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("encode error: {0}")]
    Encode(#[from] bincode::error::EncodeError),

    #[error("decode error: {0}")]
    Decode(#[from] bincode::error::DecodeError),
}

pub trait CacheStore: Send + Sync {
    fn load(&self, key: &str) -> Result<Option<CacheEntry>, CacheError>;
    fn store(&self, key: &str, entry: &CacheEntry) -> Result<(), CacheError>;
}

pub fn get_cache_store(store_type: &CacheStoreType) -> Arc<dyn CacheStore> {
    match store_type {
        CacheStoreType::Memory => Arc::new(MemoryCacheStore::new()),
        CacheStoreType::Filesystem { path } => Arc::new(FilesystemCacheStore::new(path)),
    }
}

const MEMORY_CAPACITY: u64 = 16;

/// Process-wide store. Entries are kept past their expiry so a stale copy
/// remains available when a rebuild fails.
pub struct MemoryCacheStore {
    cache: Cache<String, CacheEntry>,
}

impl MemoryCacheStore {
    pub fn new() -> Self {
        MemoryCacheStore {
            cache: Cache::builder().max_capacity(MEMORY_CAPACITY).build(),
        }
    }
}

impl Default for MemoryCacheStore {
    fn default() -> Self {
        Self::new()
    }
}

impl CacheStore for MemoryCacheStore {
    fn load(&self, key: &str) -> Result<Option<CacheEntry>, CacheError> {
        Ok(self.cache.get(key))
    }

    fn store(&self, key: &str, entry: &CacheEntry) -> Result<(), CacheError> {
        self.cache.insert(key.to_string(), entry.clone());
        Ok(())
    }
}

/// bincode (serde mode) wrapped in a zstd stream.
struct Codec {
    level: i32,
    config: bincode::config::Configuration,
}

impl Codec {
    fn new(level: i32) -> Self {
        Codec {
            level,
            config: bincode::config::standard(),
        }
    }

    fn write<W: Write>(&self, writer: &mut W, entry: &CacheEntry) -> Result<usize, CacheError> {
        let mut encoder = zstd::stream::write::Encoder::new(writer, self.level)?;
        let size = bincode::serde::encode_into_std_write(entry, &mut encoder, self.config)?;
        encoder.finish()?.flush()?;
        Ok(size)
    }

    fn read<R: Read>(&self, reader: R) -> Result<CacheEntry, CacheError> {
        let mut decoder = zstd::stream::read::Decoder::new(reader)?;
        Ok(bincode::serde::decode_from_std_read(
            &mut decoder,
            self.config,
        )?)
    }
}

/// Keeps one file per key under a directory, so the dblist survives process
/// restarts and can be shared by tools on the same host.
///
/// Both operations block on file I/O; the client runs them on the blocking
/// thread pool.
pub struct FilesystemCacheStore {
    dir: PathBuf,
    codec: Codec,
}

impl FilesystemCacheStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        FilesystemCacheStore {
            dir: dir.into(),
            codec: Codec::new(1),
        }
    }

    fn path(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{key}.bin"))
    }
}

impl CacheStore for FilesystemCacheStore {
    fn load(&self, key: &str) -> Result<Option<CacheEntry>, CacheError> {
        let file = match File::open(self.path(key)) {
            Ok(file) => file,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(err.into()),
        };

        self.codec.read(io::BufReader::new(file)).map(Some)
    }

    fn store(&self, key: &str, entry: &CacheEntry) -> Result<(), CacheError> {
        fs::create_dir_all(&self.dir)?;

        // Each writer gets its own temp file, renamed over the target once
        // complete. Dropping it on error removes it.
        let path = self.path(key);
        let mut tmp = NamedTempFile::new_in(&self.dir)?;
        let size = {
            let mut writer = io::BufWriter::new(&mut tmp);
            let size = self.codec.write(&mut writer, entry)?;
            writer.flush()?;
            size
        };
        tmp.persist(&path).map_err(|err| err.error)?;
        tracing::debug!(path = %path.display(), bytes = size, "Stored dblist cache entry");

        Ok(())
    }
}
