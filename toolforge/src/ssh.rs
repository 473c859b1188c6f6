//! `toolforge ssh`: tunnels every replica slice to a local port so tools can
//! be developed against the replicas from outside the cluster.
use crate::config::SshConfig;
use crate::errors::CliError;
use clap::{Args, ValueEnum};
use replicas::ReplicasClient;
use std::process::Stdio;
use tokio::process::Command;

const TOOLSDB_SLICE: &str = "toolsdb";

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum Service {
    Web,
    Analytics,
}

impl Service {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Service::Web => "web",
            Service::Analytics => "analytics",
        }
    }
}

#[derive(Args, Debug)]
pub struct SshArgs {
    /// Toolforge shell username, if different from the local username
    pub username: Option<String>,
    #[arg(long, value_enum, default_value_t = Service::Web)]
    pub service: Service,
    /// Local address the tunnel binds to. Docker setups may need 0.0.0.0
    #[arg(short, long)]
    pub bind_address: Option<String>,
    /// Also tunnel to the tools database
    #[arg(long)]
    pub toolsdb: bool,
}

/// One `-L` forward of the tunnel.
#[derive(Debug, PartialEq)]
pub struct Forward {
    pub local_port: u16,
    pub remote_host: String,
}

/// Arguments for `ssh`, in order: `-N`, one `-L` per forward, then the login.
pub fn tunnel_args(
    config: &SshConfig,
    username: &str,
    bind_address: Option<&str>,
    forwards: &[Forward],
) -> Vec<String> {
    let mut args = vec!["-N".to_string()];

    for forward in forwards {
        let mut spec = format!(
            "{}:{}:{}",
            forward.local_port, forward.remote_host, config.remote_port
        );
        if let Some(bind) = bind_address {
            spec = format!("{bind}:{spec}");
        }
        args.push("-L".into());
        args.push(spec);
    }

    args.push(format!("{username}@{}", config.login_host));
    args
}

async fn forwards(
    client: &ReplicasClient,
    config: &SshConfig,
    args: &SshArgs,
) -> Result<Vec<Forward>, CliError> {
    let host = format!("{}{}", args.service.as_str(), config.host_suffix);
    let db_list = client.db_list().await?;

    let mut forwards = db_list
        .slices()
        .into_iter()
        .map(|slice| -> Result<Forward, CliError> {
            Ok(Forward {
                local_port: client.port_for_slice(slice)?,
                remote_host: format!("{slice}.{host}"),
            })
        })
        .collect::<Result<Vec<_>, _>>()?;

    if args.toolsdb {
        forwards.push(Forward {
            local_port: client.port_for_slice(TOOLSDB_SLICE)?,
            remote_host: format!("tools{}", config.host_suffix),
        });
    }

    Ok(forwards)
}

pub async fn run(client: &ReplicasClient, config: &SshConfig, args: SshArgs) -> Result<(), CliError> {
    let username = match args.username.clone() {
        Some(username) => username,
        None => std::env::var("USER").map_err(|_| CliError::MissingUsername)?,
    };

    let forwards = forwards(client, config, &args).await?;
    let ssh_args = tunnel_args(config, &username, args.bind_address.as_deref(), &forwards);

    tracing::info!(
        login = %format!("{username}@{}", config.login_host),
        service = args.service.as_str(),
        toolsdb = args.toolsdb,
        forwards = forwards.len(),
        "Opening SSH tunnel to the replicas, use ^C to terminate"
    );

    let status = Command::new("ssh")
        .args(&ssh_args)
        .stdin(Stdio::inherit())
        .stdout(Stdio::inherit())
        .stderr(Stdio::inherit())
        .status()
        .await?;

    if !status.success() {
        return Err(CliError::SshFailed(status));
    }

    Ok(())
}
