use std::{
    fs,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::i18n::FALLBACK_LANGUAGE;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", default)]
pub struct TrackerConfig {
    pub db_name: String,
    pub data_dir: PathBuf,
    pub cache_dir: PathBuf,
    pub export_dir: PathBuf,
    pub language: String,
    /// Extra `<code>.json` translation catalogs.
    pub i18n_dir: Option<PathBuf>,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            db_name: "trackerDB".to_string(),
            data_dir: PathBuf::from("data"),
            cache_dir: PathBuf::from(".tracker-cache"),
            export_dir: PathBuf::from("exports"),
            language: FALLBACK_LANGUAGE.to_string(),
            i18n_dir: None,
        }
    }
}

impl TrackerConfig {
    pub fn from_yaml_file(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("failed to read config: {}", path.display()))?;
        Self::from_yaml_str(&text)
            .with_context(|| format!("failed to parse config: {}", path.display()))
    }

    pub fn from_yaml_str(text: &str) -> Result<Self> {
        if text.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yaml::from_str(text)?)
    }

    pub fn file_name(&self) -> String {
        format!("{}.json", self.db_name)
    }

    /// `<data_dir>/<db_name>.json`
    pub fn default_db_path(&self) -> PathBuf {
        self.data_dir.join(self.file_name())
    }

    pub fn cache_path(&self) -> PathBuf {
        self.cache_dir.join(self.file_name())
    }

    /// File remembering the last location the database was saved to.
    pub fn handle_path(&self) -> PathBuf {
        self.cache_dir.join(format!("{}.handle", self.db_name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_yaml_keeps_defaults() {
        let cfg = TrackerConfig::from_yaml_str("db_name: campaign\nlanguage: en\n").unwrap();
        assert_eq!(cfg.db_name, "campaign");
        assert_eq!(cfg.language, "en");
        assert_eq!(cfg.data_dir, PathBuf::from("data"));
        assert_eq!(cfg.default_db_path(), PathBuf::from("data/campaign.json"));
        assert_eq!(cfg.handle_path(), PathBuf::from(".tracker-cache/campaign.handle"));
    }

    #[test]
    fn empty_yaml_is_the_default() {
        assert_eq!(TrackerConfig::from_yaml_str("").unwrap(), TrackerConfig::default());
    }

    #[test]
    fn unknown_types_are_rejected() {
        assert!(TrackerConfig::from_yaml_str("db_name: [1, 2]").is_err());
    }
}
