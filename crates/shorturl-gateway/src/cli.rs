use clap::{Parser, ValueEnum};
use shorturl_core::shortener::validate_url;
use shorturl_core::ShortenerError;
use shorturl_storage::StorageConfig;
use std::fmt::{Display, Formatter};
use std::net::SocketAddr;
use std::path::PathBuf;
use thiserror::Error;

pub const LISTEN_ADDR_ENV: &str = "SERVER_ADDRESS";
pub const BASE_URL_ENV: &str = "BASE_URL";
pub const STORAGE_PATH_ENV: &str = "FILE_STORAGE_PATH";
pub const DATABASE_DSN_ENV: &str = "DATABASE_DSN";
pub const LOG_FORMAT_ENV: &str = "LOG_FORMAT";

pub const DEFAULT_LISTEN_ADDR: &str = "127.0.0.1:8080";
pub const DEFAULT_BASE_URL: &str = "http://localhost:8080";
pub const DEFAULT_STORAGE_PATH: &str = "/tmp/short-url-db.json";

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    #[value(name = "text")]
    Text,
    #[value(name = "json")]
    Json,
}

impl Display for LogFormat {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            LogFormat::Text => write!(f, "text"),
            LogFormat::Json => write!(f, "json"),
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid base url {url:?}: {source}")]
    BaseUrl {
        url: String,
        #[source]
        source: ShortenerError,
    },
}

#[derive(Debug, Parser)]
#[command(name = "shorturl", version)]
pub struct CLI {
    /// Address the HTTP server binds to.
    #[arg(short = 'a', long, env = LISTEN_ADDR_ENV, default_value = DEFAULT_LISTEN_ADDR)]
    pub listen_addr: SocketAddr,

    /// Prefix of every issued short URL.
    #[arg(short = 'b', long, env = BASE_URL_ENV, default_value = DEFAULT_BASE_URL)]
    pub base_url: String,

    /// Journal file. An empty value keeps everything in memory.
    #[arg(short = 'f', long, env = STORAGE_PATH_ENV, default_value = DEFAULT_STORAGE_PATH)]
    pub storage_path: String,

    /// Database DSN. Takes precedence over the journal file.
    #[arg(short = 'd', long, env = DATABASE_DSN_ENV, default_value = "")]
    pub database_dsn: String,

    #[arg(long, env = LOG_FORMAT_ENV, value_enum, default_value_t = LogFormat::Text)]
    pub log_format: LogFormat,
}

impl CLI {
    /// Storage selection derived from the flags. Empty values mean unset.
    pub fn storage_config(&self) -> StorageConfig {
        let storage_path = (!self.storage_path.is_empty()).then(|| PathBuf::from(&self.storage_path));
        let database_dsn = (!self.database_dsn.is_empty()).then(|| self.database_dsn.clone());

        StorageConfig::builder()
            .storage_path(storage_path)
            .database_dsn(database_dsn)
            .build()
    }

    pub fn validated_base_url(&self) -> Result<&str, ConfigError> {
        validate_url(&self.base_url).map_err(|source| ConfigError::BaseUrl {
            url: self.base_url.clone(),
            source,
        })?;
        Ok(&self.base_url)
    }
}
