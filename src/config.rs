//! Process configuration, read once from `HOTELBOOK_*` environment
//! variables at startup.

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::engine::EngineConfig;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{var}={value:?} is not a valid value")]
    Invalid { var: &'static str, value: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub bind: String,
    pub port: u16,
    pub data_dir: PathBuf,
    pub seed_file: Option<PathBuf>,
    pub lock_timeout: Duration,
    pub compact_threshold: u64,
    pub metrics_port: Option<u16>,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Build from any variable source. Unset and blank values take the
    /// default; malformed numbers are an error.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |var: &str| lookup(var).filter(|v| !v.trim().is_empty());

        Ok(Self {
            bind: get("HOTELBOOK_BIND").unwrap_or_else(|| "0.0.0.0".into()),
            port: parse(&get, "HOTELBOOK_PORT")?.unwrap_or(8080),
            data_dir: get("HOTELBOOK_DATA_DIR").map_or_else(|| PathBuf::from("./data"), PathBuf::from),
            seed_file: get("HOTELBOOK_SEED_FILE").map(PathBuf::from),
            lock_timeout: Duration::from_millis(parse(&get, "HOTELBOOK_LOCK_TIMEOUT_MS")?.unwrap_or(3000)),
            compact_threshold: parse(&get, "HOTELBOOK_COMPACT_THRESHOLD")?.unwrap_or(1000),
            metrics_port: parse(&get, "HOTELBOOK_METRICS_PORT")?,
        })
    }

    pub fn wal_path(&self) -> PathBuf {
        self.data_dir.join("calendar.wal")
    }

    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.bind, self.port)
    }

    pub fn engine(&self) -> EngineConfig {
        EngineConfig {
            lock_timeout: self.lock_timeout,
        }
    }
}

fn parse<T: FromStr>(
    get: &impl Fn(&str) -> Option<String>,
    var: &'static str,
) -> Result<Option<T>, ConfigError> {
    get(var)
        .map(|value| {
            value
                .trim()
                .parse()
                .map_err(|_| ConfigError::Invalid { var, value })
        })
        .transpose()
}
