use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

pub const DEFAULT_DATA_FILE: &str = "accountBook.csv";

/// Optional on-disk settings, `<config dir>/account-book/config.json`.
#[derive(Debug, Default, Clone, Deserialize)]
#[serde(default)]
pub struct FileConfig {
    pub data_file: Option<PathBuf>,
    pub log_file: Option<PathBuf>,
}

impl FileConfig {
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("account-book").join("config.json"))
    }

    /// Reads the config at `path`; a missing file gives the defaults.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = fs::read(path)
            .with_context(|| format!("Failed to read config {}", path.display()))?;
        serde_json::from_slice(&content)
            .with_context(|| format!("Failed to parse config {}", path.display()))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub data_file: PathBuf,
    pub log_file: Option<PathBuf>,
}

impl Settings {
    /// Command-line values win over the config file, which wins over defaults.
    pub fn resolve(
        file_flag: Option<PathBuf>,
        log_flag: Option<PathBuf>,
        config: FileConfig,
    ) -> Self {
        Self {
            data_file: file_flag
                .or(config.data_file)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_DATA_FILE)),
            log_file: log_flag.or(config.log_file),
        }
    }

    pub fn from_args(file_flag: Option<PathBuf>, log_flag: Option<PathBuf>) -> Result<Self> {
        let config = match FileConfig::default_path() {
            Some(path) => FileConfig::load(&path)?,
            None => FileConfig::default(),
        };
        Ok(Self::resolve(file_flag, log_flag, config))
    }
}
