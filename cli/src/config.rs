use std::path::PathBuf;

use anyhow::Result;
use serde::Deserialize;

#[derive(Debug, Default, Deserialize)]
pub struct HoursConfig {
    pub user: Option<String>,
    pub author_id: Option<String>,
    pub token: Option<String>,
    pub endpoint: Option<String>,
    #[serde(default)]
    pub repositories: Vec<String>,
    #[serde(default)]
    pub exclude_owners: Vec<String>,
    pub gap: Option<String>,
    pub lookback: Option<String>,
    pub max_pages: Option<usize>,
    /// Commits requested per history page, at most 100.
    pub page_size: Option<u32>,
    pub cache: Option<PathBuf>,
    pub color: Option<bool>,
}

pub fn load() -> HoursConfig {
    match try_load() {
        Ok(cfg) => cfg,
        Err(err) => {
            tracing::warn!(error = %err, "ignoring unreadable config");
            HoursConfig::default()
        }
    }
}

fn try_load() -> Result<HoursConfig> {
    let home = std::env::var_os("HOME")
        .map(PathBuf::from)
        .ok_or_else(|| anyhow::anyhow!("HOME not set"))?;
    let config_path = home.join(".commit-hours.toml");
    if !config_path.exists() {
        return Ok(HoursConfig::default());
    }
    let content = std::fs::read_to_string(&config_path)?;
    let config: HoursConfig = toml::from_str(&content)?;
    Ok(config)
}
