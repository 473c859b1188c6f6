use crate::dblist::FetchError;
use crate::registry::{ConnectionError, RegistryError};
use thiserror::Error;

pub type Result<T, E = ReplicasError> = std::result::Result<T, E>;

#[derive(Error, Debug)]
pub enum ReplicasError {
    #[error("no slice found for database {0}")]
    UnknownDatabase(String),

    #[error("no connection configured for slice {0}")]
    UnknownShard(String),

    #[error("could not fetch dblists: {0}")]
    UpstreamFetch(#[from] FetchError),

    #[error("connection error: {0}")]
    Connection(#[from] ConnectionError),
}

impl From<RegistryError> for ReplicasError {
    fn from(err: RegistryError) -> Self {
        match err {
            RegistryError::UnknownConnection(name) => {
                ReplicasError::Connection(ConnectionError::Failed(format!(
                    "no connection configured with name {name}"
                )))
            }
            RegistryError::Open { source, .. } => ReplicasError::Connection(source),
        }
    }
}
