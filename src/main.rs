use anyhow::Result;
use clap::Parser;
use ferrumkv::aof::SyncPolicy;
use ferrumkv::store::EvictionPolicy;
use ferrumkv::{Config, Server};
use std::path::PathBuf;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

/// Single-threaded in-memory key/value server speaking RESP2
#[derive(Parser, Debug)]
#[command(name = "ferrumkv", version, about)]
struct Cli {
    /// JSON configuration file; flags override its values
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[arg(long)]
    host: Option<String>,

    #[arg(short, long)]
    port: Option<u16>,

    /// Number of logical databases
    #[arg(long)]
    databases: Option<usize>,

    /// Memory ceiling in bytes (0 = unlimited)
    #[arg(long)]
    maxmemory: Option<usize>,

    /// noeviction, allkeys-lru, allkeys-random or volatile-ttl
    #[arg(long)]
    maxmemory_policy: Option<EvictionPolicy>,

    #[arg(long)]
    appendonly: Option<bool>,

    #[arg(long)]
    appendfilename: Option<PathBuf>,

    /// always, everysec or no
    #[arg(long)]
    appendfsync: Option<SyncPolicy>,

    /// Expiry sweeps per second
    #[arg(long)]
    hz: Option<u32>,
}

impl Cli {
    /// Build the configuration: defaults, then the file, then flags
    fn into_config(self) -> Result<Config> {
        let mut config = match &self.config {
            Some(path) => Config::load(path)?,
            None => Config::default(),
        };

        if let Some(host) = self.host {
            config.host = host;
        }
        if let Some(port) = self.port {
            config.port = port;
        }
        if let Some(databases) = self.databases {
            config.databases = databases;
        }
        if let Some(maxmemory) = self.maxmemory {
            config.maxmemory = maxmemory;
        }
        if let Some(policy) = self.maxmemory_policy {
            config.maxmemory_policy = policy;
        }
        if let Some(appendonly) = self.appendonly {
            config.appendonly = appendonly;
        }
        if let Some(path) = self.appendfilename {
            config.appendfilename = path;
        }
        if let Some(policy) = self.appendfsync {
            config.appendfsync = policy;
        }
        if let Some(hz) = self.hz {
            config.hz = hz;
        }
        Ok(config)
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = Cli::parse().into_config()?;
    info!("FerrumKV starting...");

    // One thread: the engine and every connection share it
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;

    runtime.block_on(async move {
        let server = Server::bind(config).await?;
        let shutdown = CancellationToken::new();

        let signal = shutdown.clone();
        tokio::spawn(async move {
            match tokio::signal::ctrl_c().await {
                Ok(()) => info!("Received Ctrl-C, shutting down"),
                Err(e) => {
                    error!("Failed to listen for Ctrl-C: {}", e);
                    return;
                }
            }
            signal.cancel();
        });

        server.run(shutdown).await
    })
}
