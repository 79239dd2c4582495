use std::net::SocketAddr;

use serde::Deserialize;

use resumable_backend_postgres::PostgresConfig;
use resumable_core::Limits;
use resumable_http::RouterOptions;
use resumable_objectstore::S3Config;

#[derive(Clone, Deserialize)]
pub struct Config {
    #[serde(default = "default_listen")]
    pub listen: SocketAddr,
    pub sessions: SessionBackend,
    pub objects: S3Config,
    #[serde(default)]
    pub limits: Limits,
    #[serde(flatten)]
    pub http: RouterOptions,
}

fn default_listen() -> SocketAddr {
    SocketAddr::from(([0, 0, 0, 0], 13030))
}

#[derive(Clone, Deserialize)]
#[serde(tag = "type")]
pub enum SessionBackend {
    Postgres(PostgresConfig),
    Memory,
}
