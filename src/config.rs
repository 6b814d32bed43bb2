use std::net::SocketAddr;
use std::path::PathBuf;

use color_eyre::eyre::{bail, Result, WrapErr};

pub const DEFAULT_MAX_BODY_BYTES: usize = 50 * 1024 * 1024;
pub const DEFAULT_MAX_RESULTS: usize = 100;

/// Which store client to wire up at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
    Postgres,
    Memory,
}

/// Service configuration, read once from the environment at startup.
#[derive(Debug, Clone)]
pub struct Config {
    pub bind_addr: SocketAddr,
    pub store_backend: StoreBackend,
    /// Required for the postgres backend.
    pub database_url: Option<String>,
    /// Directory holding the two grammar-definition files.
    pub grammar_dir: PathBuf,
    /// Upload ceiling for track documents.
    pub max_body_bytes: usize,
    /// Cap on nearest-query result sets.
    pub max_results: usize,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let bind_addr = env_or("TRACKNEAR_BIND", "0.0.0.0:3000")
            .parse()
            .wrap_err("TRACKNEAR_BIND is not a socket address")?;
        let store_backend = match env_or("TRACKNEAR_STORE", "postgres").as_str() {
            "postgres" => StoreBackend::Postgres,
            "memory" => StoreBackend::Memory,
            other => bail!("TRACKNEAR_STORE must be postgres or memory, got {other}"),
        };
        let database_url = std::env::var("DATABASE_URL").ok();
        let grammar_dir = PathBuf::from(env_or("TRACKNEAR_GRAMMAR_DIR", "schemas"));
        let max_body_bytes = parse_env("TRACKNEAR_MAX_BODY_BYTES", DEFAULT_MAX_BODY_BYTES)?;
        let max_results = parse_env("TRACKNEAR_MAX_RESULTS", DEFAULT_MAX_RESULTS)?;
        Ok(Config {
            bind_addr,
            store_backend,
            database_url,
            grammar_dir,
            max_body_bytes,
            max_results,
        })
    }
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn parse_env(key: &str, default: usize) -> Result<usize> {
    match std::env::var(key) {
        Ok(value) => value
            .parse()
            .wrap_err_with(|| format!("{key} must be a positive integer")),
        Err(_) => Ok(default),
    }
}
