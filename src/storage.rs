use anyhow::{Context, Result};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

use crate::config::ProviderSettings;
use crate::conversation::Conversation;

/// Record holding the full conversation list
pub const CONVERSATIONS_RECORD: &str = "conversations.json";

/// Record holding provider credentials and selection
pub const SETTINGS_RECORD: &str = "settings.toml";

/// Reads and writes the two persisted records under one data directory.
///
/// Every save rewrites the whole record; there is no incremental update.
#[derive(Debug, Clone)]
pub struct StorageManager {
    data_dir: PathBuf,
}

impl StorageManager {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
        }
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    pub fn ensure_directories(&self) -> Result<()> {
        fs::create_dir_all(&self.data_dir).with_context(|| {
            format!(
                "Failed to create data directory {}",
                self.data_dir.display()
            )
        })
    }

    fn record_path(&self, record: &str) -> PathBuf {
        self.data_dir.join(record)
    }

    /// Load every conversation, oldest record order preserved. A missing record is an empty list.
    pub fn load_conversations(&self) -> Result<Vec<Conversation>> {
        let path = self.record_path(CONVERSATIONS_RECORD);
        if !path.exists() {
            return Ok(Vec::new());
        }

        let content = fs::read_to_string(&path).context("Failed to read conversations")?;
        serde_json::from_str(&content).context("Failed to parse conversations")
    }

    pub fn save_conversations(&self, conversations: &[Conversation]) -> Result<()> {
        self.ensure_directories()?;

        let content = serde_json::to_string_pretty(conversations)
            .context("Failed to serialize conversations")?;
        write_atomically(&self.record_path(CONVERSATIONS_RECORD), &content)
            .context("Failed to write conversations")
    }

    /// Load provider settings, falling back to defaults when nothing was saved yet
    pub fn load_settings(&self) -> Result<ProviderSettings> {
        let path = self.record_path(SETTINGS_RECORD);
        if !path.exists() {
            return Ok(ProviderSettings::default());
        }

        let content = fs::read_to_string(&path).context("Failed to read settings file")?;
        toml::from_str(&content).context("Failed to parse settings file")
    }

    pub fn save_settings(&self, settings: &ProviderSettings) -> Result<()> {
        self.ensure_directories()?;

        let content = toml::to_string_pretty(settings).context("Failed to serialize settings")?;
        write_atomically(&self.record_path(SETTINGS_RECORD), &content)
            .context("Failed to write settings file")
    }
}

/// Write to a uniquely named sibling temp file, then move it over `path`.
/// The temp file is removed when any step fails.
fn write_atomically(path: &Path, content: &str) -> Result<()> {
    let mut temp_file = match path.parent().filter(|dir| !dir.as_os_str().is_empty()) {
        Some(dir) => NamedTempFile::new_in(dir)?,
        None => NamedTempFile::new()?,
    };

    temp_file.write_all(content.as_bytes())?;
    temp_file.as_file_mut().sync_all()?;
    temp_file.persist(path).map_err(|err| err.error)?;
    Ok(())
}
