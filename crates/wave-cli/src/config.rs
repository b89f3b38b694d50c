//! Configuration file management for wave.
//!
//! Provides a TOML-based config file at `~/.config/wave/config.toml` and a
//! resolution chain: CLI flag > env var > config file > default.

use std::path::PathBuf;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use wave_db::config::DbConfig;

/// Bind address used by `wave serve` when nothing else is configured.
pub const DEFAULT_BIND: &str = "127.0.0.1";

/// Port used by `wave serve` when nothing else is configured.
pub const DEFAULT_PORT: u16 = 3000;

// -----------------------------------------------------------------------
// Config file types
// -----------------------------------------------------------------------

#[derive(Debug, Serialize, Deserialize)]
pub struct ConfigFile {
    pub database: DatabaseSection,
    #[serde(default)]
    pub server: ServerSection,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct DatabaseSection {
    pub url: String,
}

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct ServerSection {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bind: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,
}

// -----------------------------------------------------------------------
// Paths
// -----------------------------------------------------------------------

/// Return the wave config directory: `$XDG_CONFIG_HOME/wave` or
/// `~/.config/wave`, on every platform.
pub fn config_dir() -> PathBuf {
    if let Ok(xdg) = std::env::var("XDG_CONFIG_HOME") {
        return PathBuf::from(xdg).join("wave");
    }
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".config")
        .join("wave")
}

pub fn config_path() -> PathBuf {
    config_dir().join("config.toml")
}

// -----------------------------------------------------------------------
// Read / write
// -----------------------------------------------------------------------

/// Load and parse the config file. Returns an error if it does not exist.
pub fn load_config() -> Result<ConfigFile> {
    let path = config_path();
    let contents = std::fs::read_to_string(&path)
        .with_context(|| format!("failed to read config file at {}", path.display()))?;
    let config: ConfigFile = toml::from_str(&contents).context("failed to parse config file")?;
    Ok(config)
}

/// Serialize and write the config file, creating parent dirs as needed.
/// Sets file permissions to 0600 on Unix.
pub fn save_config(config: &ConfigFile) -> Result<()> {
    let path = config_path();
    let dir = config_dir();
    std::fs::create_dir_all(&dir)
        .with_context(|| format!("failed to create config directory {}", dir.display()))?;

    let contents = toml::to_string_pretty(config).context("failed to serialize config")?;
    std::fs::write(&path, &contents)
        .with_context(|| format!("failed to write config file at {}", path.display()))?;

    // The database URL may carry a password.
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let perms = std::fs::Permissions::from_mode(0o600);
        std::fs::set_permissions(&path, perms)
            .with_context(|| format!("failed to set permissions on {}", path.display()))?;
    }

    Ok(())
}

// -----------------------------------------------------------------------
// Resolved config
// -----------------------------------------------------------------------

/// CLI-flag overrides fed into [`WaveConfig::resolve`].
#[derive(Debug, Default)]
pub struct Overrides<'a> {
    pub db_url: Option<&'a str>,
    pub bind: Option<&'a str>,
    pub port: Option<u16>,
}

/// Fully resolved configuration, ready for use.
#[derive(Debug)]
pub struct WaveConfig {
    pub db_config: DbConfig,
    pub bind: String,
    pub port: u16,
}

impl WaveConfig {
    /// Resolve configuration using the chain: CLI flag > env var > config file > default.
    ///
    /// - DB URL: `--database-url` > `WAVE_DATABASE_URL` > `database.url` > `DbConfig::DEFAULT_URL`
    /// - Bind: `--bind` > `WAVE_BIND` > `server.bind` > [`DEFAULT_BIND`]
    /// - Port: `--port` > `WAVE_PORT` > `server.port` > [`DEFAULT_PORT`]
    pub fn resolve(overrides: Overrides<'_>) -> Result<Self> {
        let file_config = load_config().ok();

        let db_url = if let Some(url) = overrides.db_url {
            url.to_owned()
        } else if let Ok(url) = std::env::var("WAVE_DATABASE_URL") {
            url
        } else if let Some(ref cfg) = file_config {
            cfg.database.url.clone()
        } else {
            DbConfig::DEFAULT_URL.to_owned()
        };
        let mut db_config = DbConfig::from_env();
        db_config.database_url = db_url;

        let bind = if let Some(bind) = overrides.bind {
            bind.to_owned()
        } else if let Ok(bind) = std::env::var("WAVE_BIND") {
            bind
        } else if let Some(bind) = file_config.as_ref().and_then(|c| c.server.bind.clone()) {
            bind
        } else {
            DEFAULT_BIND.to_owned()
        };

        let port = if let Some(port) = overrides.port {
            port
        } else if let Ok(raw) = std::env::var("WAVE_PORT") {
            raw.parse()
                .with_context(|| format!("WAVE_PORT is not a valid port: {raw:?}"))?
        } else if let Some(port) = file_config.as_ref().and_then(|c| c.server.port) {
            port
        } else {
            DEFAULT_PORT
        };

        Ok(Self {
            db_config,
            bind,
            port,
        })
    }
}

// -----------------------------------------------------------------------
// Tests
// -----------------------------------------------------------------------
