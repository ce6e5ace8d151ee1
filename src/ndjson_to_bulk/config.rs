use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

use feedkit::timestamp::DEFAULT_FIELD;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    #[serde(default)]
    pub global: GlobalConfig,
    pub files: Vec<FileConfig>,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct GlobalConfig {
    pub offset_minutes: i64,
    pub timestamp_field: String,
    pub es_url: Option<String>,
    pub index: Option<String>,
}

impl Default for GlobalConfig {
    fn default() -> Self {
        Self {
            offset_minutes: 0,
            timestamp_field: DEFAULT_FIELD.to_string(),
            es_url: None,
            index: None,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct FileConfig {
    pub input: PathBuf,
    pub output: PathBuf,
}

impl Config {
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path).context("Failed to read config file")?;
        Self::parse(&content)
    }

    pub fn parse(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content).context("Failed to parse config file")?;
        Ok(config)
    }
}
