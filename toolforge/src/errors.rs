use std::process::ExitStatus;

#[derive(thiserror::Error, Debug)]
pub enum CliError {
    #[error(transparent)]
    Replicas(#[from] replicas::ReplicasError),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("could not set up metrics: {0}")]
    Metrics(String),
    #[error("no username given and $USER is not set")]
    MissingUsername,
    #[error("ssh exited with {0}")]
    SshFailed(ExitStatus),
}
