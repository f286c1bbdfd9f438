//! INI configuration file.
//!
//! Located at `<config dir>/rapid/config.ini`:
//!
//! ```ini
//! [server]
//! url = http://localhost:9999
//! stream_url = ws://localhost:9999/ws/cli
//! client_id = cli
//! timeout_secs = 30
//!
//! [download]
//! provider = default
//! keepalive_secs = 15
//! close_timeout_ms = 2000
//!
//! [logging]
//! directory = /var/tmp/rapid
//! ```
//!
//! Every key is optional. Unknown sections and keys are ignored.

use std::path::{Path, PathBuf};
use std::str::FromStr;

use ini::{Ini, Properties};

use super::ConfigError;

/// `[server]` section.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ServerSection {
    pub url: Option<String>,
    pub stream_url: Option<String>,
    pub client_id: Option<String>,
    pub timeout_secs: Option<u64>,
}

/// `[download]` section.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DownloadSection {
    pub provider: Option<String>,
    pub keepalive_secs: Option<u64>,
    pub close_timeout_ms: Option<u64>,
}

/// `[logging]` section.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LoggingSection {
    pub directory: Option<PathBuf>,
}

/// Parsed configuration file.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConfigFile {
    pub server: ServerSection,
    pub download: DownloadSection,
    pub logging: LoggingSection,
}

/// Default location of the configuration file, if a config dir exists.
pub fn config_file_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("rapid").join("config.ini"))
}

impl ConfigFile {
    /// Load from the default location. A missing file yields defaults.
    pub fn load() -> Result<Self, ConfigError> {
        match config_file_path() {
            Some(path) => Self::load_from(&path),
            None => Ok(Self::default()),
        }
    }

    /// Load from `path`. A missing file yields defaults.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let ini = Ini::load_from_file(path).map_err(|e| ConfigError::Read {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        Self::from_ini(&ini)
    }

    /// Parse INI text.
    pub fn parse(text: &str) -> Result<Self, ConfigError> {
        let ini = Ini::load_from_str(text).map_err(|e| ConfigError::Read {
            path: PathBuf::from("<string>"),
            reason: e.to_string(),
        })?;
        Self::from_ini(&ini)
    }

    fn from_ini(ini: &Ini) -> Result<Self, ConfigError> {
        let mut file = Self::default();

        if let Some(section) = ini.section(Some("server")) {
            file.server.url = string(section, "url");
            file.server.stream_url = string(section, "stream_url");
            file.server.client_id = string(section, "client_id");
            file.server.timeout_secs = number(section, "server", "timeout_secs")?;
        }

        if let Some(section) = ini.section(Some("download")) {
            file.download.provider = string(section, "provider");
            file.download.keepalive_secs = number(section, "download", "keepalive_secs")?;
            file.download.close_timeout_ms = number(section, "download", "close_timeout_ms")?;
        }

        if let Some(section) = ini.section(Some("logging")) {
            file.logging.directory = string(section, "directory").map(PathBuf::from);
        }

        Ok(file)
    }
}

fn string(section: &Properties, key: &str) -> Option<String> {
    section
        .get(key)
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

fn number<T: FromStr>(
    section: &Properties,
    section_name: &str,
    key: &str,
) -> Result<Option<T>, ConfigError>
where
    T::Err: std::fmt::Display,
{
    match string(section, key) {
        None => Ok(None),
        Some(value) => value
            .parse::<T>()
            .map(Some)
            .map_err(|e| ConfigError::InvalidValue {
                key: format!("{}.{}", section_name, key),
                value,
                reason: e.to_string(),
            }),
    }
}
