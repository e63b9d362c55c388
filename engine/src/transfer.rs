use std::{
    path::{Path, PathBuf},
    sync::Arc,
};

use async_trait::async_trait;
use chrono::NaiveDate;
use encoding_rs::Encoding;
use tokio::sync::Mutex;

/// `<db_name>_<YYYY-MM-DD>.json`
pub fn export_file_name(db_name: &str, date: NaiveDate) -> String {
    format!("{}_{}.json", db_name, date.format("%Y-%m-%d"))
}

/// Where user-facing exports end up.
#[async_trait]
pub trait ExportSink: Send + Sync {
    async fn deliver(&self, file_name: &str, contents: &str) -> std::io::Result<PathBuf>;
}

/// Writes exports into a directory, creating it on first use.
#[derive(Debug, Clone)]
pub struct DirectorySink {
    dir: PathBuf,
}

impl DirectorySink {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }
}

#[async_trait]
impl ExportSink for DirectorySink {
    async fn deliver(&self, file_name: &str, contents: &str) -> std::io::Result<PathBuf> {
        tokio::fs::create_dir_all(&self.dir).await?;
        let path = self.dir.join(file_name);
        tokio::fs::write(&path, contents).await?;
        Ok(path)
    }
}

/// Keeps every delivered export in memory. Clones share the same list.
#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    delivered: Arc<Mutex<Vec<(String, String)>>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// `(file_name, contents)` pairs in delivery order.
    pub async fn delivered(&self) -> Vec<(String, String)> {
        self.delivered.lock().await.clone()
    }
}

#[async_trait]
impl ExportSink for MemorySink {
    async fn deliver(&self, file_name: &str, contents: &str) -> std::io::Result<PathBuf> {
        self.delivered
            .lock()
            .await
            .push((file_name.to_string(), contents.to_string()));
        Ok(PathBuf::from(file_name))
    }
}

/// Read a text file, honouring a UTF-8 or UTF-16 byte order mark.
pub async fn read_text_auto(path: &Path) -> anyhow::Result<String> {
    let bytes = tokio::fs::read(path).await?;
    decode_text(bytes)
}

fn decode_text(bytes: Vec<u8>) -> anyhow::Result<String> {
    if let Some((enc, bom_len)) = Encoding::for_bom(&bytes) {
        let (cow, _, _) = enc.decode(&bytes[bom_len..]);
        Ok(cow.into_owned())
    } else {
        Ok(String::from_utf8(bytes)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn export_name_uses_iso_date() {
        let date = NaiveDate::from_ymd_opt(2024, 3, 7).unwrap();
        assert_eq!(export_file_name("trackerDB", date), "trackerDB_2024-03-07.json");
    }

    #[test]
    fn boms_are_stripped() {
        let mut utf8 = vec![0xEF, 0xBB, 0xBF];
        utf8.extend_from_slice(b"{\"npcs\":[]}");
        assert_eq!(decode_text(utf8).unwrap(), "{\"npcs\":[]}");

        let mut utf16 = vec![0xFF, 0xFE];
        for unit in "{}".encode_utf16() {
            utf16.extend_from_slice(&unit.to_le_bytes());
        }
        assert_eq!(decode_text(utf16).unwrap(), "{}");
    }

    #[test]
    fn invalid_utf8_without_bom_is_an_error() {
        assert!(decode_text(vec![0xC3, 0x28]).is_err());
    }
}
