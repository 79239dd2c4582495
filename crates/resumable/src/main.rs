use std::fs::File;
use std::io::Read;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use clap::Parser;

use resumable_core::{Coordinator, MemorySessionStore, SessionStore};
use resumable_http::ResumableUploads;
use resumable_objectstore::LazyGateway;

mod config;
use crate::config::{Config, SessionBackend};

#[derive(Parser)]
struct Cli {
    #[arg(short, long)]
    config_file: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_target(true)
        .compact()
        .init();

    // load configuration
    let mut dev_config = File::open(cli.config_file.unwrap_or("./dev-config.yml".into()))?;
    let mut s = String::new();
    dev_config.read_to_string(&mut s)?;
    let config: Config = serde_yaml::from_str(&s)?;
    config.limits.validate()?;

    // initialize persistence layer
    let sessions: Arc<dyn SessionStore> = match config.sessions {
        SessionBackend::Postgres(cfg) => Arc::new(cfg.new_store().await?),
        SessionBackend::Memory => {
            tracing::warn!("sessions are kept in memory and will not survive a restart");
            Arc::new(MemorySessionStore::new())
        }
    };

    // the object store client is built on first use
    let objects = Arc::new(LazyGateway::s3(config.objects));

    let coordinator = Coordinator::new(sessions, objects, config.limits);
    let router = ResumableUploads::new(coordinator).router(&config.http);

    // run HTTP server
    tracing::info!("listening on {}", config.listen);
    axum::Server::bind(&config.listen)
        .serve(router.into_make_service())
        .await?;

    Ok(())
}
