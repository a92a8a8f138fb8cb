//! Key/value configuration file reader.
//!
//! The file holds one `key: value` pair per line; blank lines and lines
//! starting with `#` are ignored. See [`Config`] for the recognized keys.

use std::collections::HashMap;
use std::error::Error;
use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use bytesize::ByteSize;

use crate::delays::Delays;

/// Configuration error. Surfaced at startup; always fatal.
#[derive(Debug)]
pub enum ConfigError {
    /// The configuration file could not be read.
    Io { path: PathBuf, source: io::Error },
    /// A required key is absent.
    MissingKey(String),
    /// A value does not parse for its key.
    BadValue { key: String, value: String },
}

impl Error for ConfigError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            ConfigError::Io { source, .. } => Some(source),
            ConfigError::MissingKey(_) => None,
            ConfigError::BadValue { .. } => None,
        }
    }
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Io { path, source } => {
                write!(f, "cannot read config file {}: {}", path.display(), source)
            }
            ConfigError::MissingKey(key) => write!(f, "missing config key {:?}", key),
            ConfigError::BadValue { key, value } => {
                write!(f, "bad value for config key {:?}: {:?}", key, value)
            }
        }
    }
}

/// Sort job configuration.
///
/// | Key | Meaning |
/// |---|---|
/// | `N` | number of cells on the input tape |
/// | `M` | RAM budget in bytes (plain integer or human-readable, e.g. `64KB`) |
/// | `delay_for_read` | read latency, milliseconds |
/// | `delay_for_write` | write latency, milliseconds |
/// | `delay_for_shift` | shift latency, milliseconds |
/// | `path_in` | input tape file |
/// | `path_out` | output tape file |
#[derive(Debug, Clone)]
pub struct Config {
    pub size: usize,
    pub memory: usize,
    pub delays: Delays,
    pub path_in: PathBuf,
    pub path_out: PathBuf,
}

impl Config {
    pub fn from_file(path: &Path) -> Result<Config, ConfigError> {
        let contents = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_str_contents(&contents)
    }

    fn from_str_contents(contents: &str) -> Result<Config, ConfigError> {
        let mut pairs = HashMap::new();
        for line in contents.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            if let Some((key, value)) = line.split_once(':') {
                pairs.insert(key.trim().to_string(), value.trim().to_string());
            }
        }

        Ok(Config {
            size: parse_value(&pairs, "N")?,
            memory: parse_memory(&pairs, "M")?,
            delays: Delays::from_millis(
                parse_value(&pairs, "delay_for_read")?,
                parse_value(&pairs, "delay_for_write")?,
                parse_value(&pairs, "delay_for_shift")?,
            ),
            path_in: PathBuf::from(raw_value(&pairs, "path_in")?),
            path_out: PathBuf::from(raw_value(&pairs, "path_out")?),
        })
    }
}

fn raw_value<'a>(pairs: &'a HashMap<String, String>, key: &str) -> Result<&'a str, ConfigError> {
    pairs
        .get(key)
        .map(String::as_str)
        .ok_or_else(|| ConfigError::MissingKey(key.to_string()))
}

fn parse_value<T: std::str::FromStr>(
    pairs: &HashMap<String, String>,
    key: &str,
) -> Result<T, ConfigError> {
    let raw = raw_value(pairs, key)?;
    raw.parse().map_err(|_| ConfigError::BadValue {
        key: key.to_string(),
        value: raw.to_string(),
    })
}

fn parse_memory(pairs: &HashMap<String, String>, key: &str) -> Result<usize, ConfigError> {
    let raw = raw_value(pairs, key)?;
    let size = raw.parse::<ByteSize>().map_err(|_| ConfigError::BadValue {
        key: key.to_string(),
        value: raw.to_string(),
    })?;
    Ok(size.as_u64() as usize)
}
