//! Key-based translations with a fallback language.

use std::{
    collections::HashMap,
    path::Path,
    sync::{PoisonError, RwLock},
};

use indexmap::IndexMap;
use serde::Serialize;
use thiserror::Error;
use tokio::sync::broadcast;
use tracing::{debug, warn};

use crate::content::{builtin_catalogs, language_label};

pub const FALLBACK_LANGUAGE: &str = "fr";

const EVENT_CAPACITY: usize = 16;

#[derive(Debug, Error)]
pub enum I18nError {
    #[error("language not supported: {0}")]
    UnsupportedLanguage(String),
}

/// Broadcast to subscribers whenever the current language switches.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LanguageChanged {
    pub language: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LanguageInfo {
    pub code: String,
    pub name: String,
    pub country: String,
}

type Catalog = HashMap<String, String>;

pub struct Translator {
    catalogs: RwLock<IndexMap<String, Catalog>>,
    current: RwLock<String>,
    events: broadcast::Sender<LanguageChanged>,
}

impl Translator {
    /// A translator with no catalogs; every lookup returns the key.
    pub fn new(language: impl Into<String>) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            catalogs: RwLock::new(IndexMap::new()),
            current: RwLock::new(language.into()),
            events,
        }
    }

    /// The bundled `fr` and `en` catalogs, starting in the fallback language.
    pub fn builtin() -> Self {
        let translator = Self::new(FALLBACK_LANGUAGE);
        for (code, text) in builtin_catalogs() {
            if let Err(e) = translator.add_catalog_json(code, text) {
                warn!(language = code, error = %e, "bundled catalog is not valid JSON");
            }
        }
        translator
    }

    pub fn add_catalog(&self, code: impl Into<String>, entries: HashMap<String, String>) {
        self.catalogs
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(code.into(), entries);
    }

    pub fn add_catalog_json(&self, code: &str, text: &str) -> Result<(), serde_json::Error> {
        let entries: Catalog = serde_json::from_str(text)?;
        self.add_catalog(code, entries);
        Ok(())
    }

    /// Load every `<code>.json` file in `dir`. Files that fail to parse are skipped.
    pub async fn load_dir(&self, dir: &Path) -> std::io::Result<Vec<String>> {
        let mut loaded = Vec::new();
        let mut entries = tokio::fs::read_dir(dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let Some(code) = path.file_stem().and_then(|s| s.to_str()).map(str::to_string) else {
                continue;
            };
            let text = match tokio::fs::read_to_string(&path).await {
                Ok(text) => text,
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "failed to read translations");
                    continue;
                }
            };
            match self.add_catalog_json(&code, &text) {
                Ok(()) => {
                    debug!(language = %code, "translations loaded");
                    loaded.push(code);
                }
                Err(e) => warn!(path = %path.display(), error = %e, "failed to parse translations"),
            }
        }
        loaded.sort();
        Ok(loaded)
    }

    /// Current language, then the fallback language, then the key itself.
    pub fn t(&self, key: &str) -> String {
        let catalogs = self.catalogs.read().unwrap_or_else(PoisonError::into_inner);
        let current = self.current.read().unwrap_or_else(PoisonError::into_inner);
        [current.as_str(), FALLBACK_LANGUAGE]
            .into_iter()
            .filter_map(|code| catalogs.get(code))
            .find_map(|catalog| catalog.get(key).filter(|v| !v.is_empty()))
            .cloned()
            .unwrap_or_else(|| key.to_string())
    }

    pub fn language(&self) -> String {
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn set_language(&self, code: &str) -> Result<(), I18nError> {
        if !self
            .catalogs
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(code)
        {
            return Err(I18nError::UnsupportedLanguage(code.to_string()));
        }
        *self.current.write().unwrap_or_else(PoisonError::into_inner) = code.to_string();
        // Nobody listening is fine.
        let _ = self.events.send(LanguageChanged {
            language: code.to_string(),
        });
        Ok(())
    }

    pub fn subscribe(&self) -> broadcast::Receiver<LanguageChanged> {
        self.events.subscribe()
    }

    pub fn available(&self) -> Vec<LanguageInfo> {
        self.catalogs
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .map(|code| {
                let (name, country) = language_label(code).unwrap_or((code.as_str(), code.as_str()));
                LanguageInfo {
                    code: code.clone(),
                    name: name.to_string(),
                    country: country.to_string(),
                }
            })
            .collect()
    }
}

impl Default for Translator {
    fn default() -> Self {
        Self::builtin()
    }
}

impl std::fmt::Debug for Translator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Translator")
            .field("language", &self.language())
            .finish_non_exhaustive()
    }
}
