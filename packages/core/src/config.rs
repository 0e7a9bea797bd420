//! Runtime configuration
//!
//! `RubixConfig` is read from an optional JSON file and then overridden from
//! the environment. Every field has a serde default, so an older or partial
//! file keeps loading as new fields are added.
//!
//! ```json
//! {
//!   "dataDir": "/home/me/.local/share/rubix",
//!   "ingest": { "previewWidth": 1080, "thumbnailQuality": 70 },
//!   "autosaveDebounceMs": 750
//! }
//! ```

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::fs;

/// Environment variable overriding `data_dir`
pub const DATA_DIR_ENV: &str = "RUBIX_DATA_DIR";

const DEFAULT_DATABASE_FILE: &str = "rubix.db";

/// Rendition sizes and JPEG qualities used by the ingestion pipeline
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct IngestConfig {
    /// Maximum preview width in pixels (never upscaled)
    pub preview_width: u32,

    /// Preview JPEG quality (1-100)
    pub preview_quality: u8,

    /// Maximum thumbnail width in pixels (never upscaled for images)
    pub thumbnail_width: u32,

    /// Thumbnail JPEG quality (1-100)
    pub thumbnail_quality: u8,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            preview_width: 1080,
            preview_quality: 80,
            thumbnail_width: 300,
            thumbnail_quality: 70,
        }
    }
}

impl IngestConfig {
    /// Validate configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.preview_width == 0 {
            return Err("preview_width must be greater than 0".to_string());
        }

        if self.thumbnail_width == 0 {
            return Err("thumbnail_width must be greater than 0".to_string());
        }

        for (name, quality) in [
            ("preview_quality", self.preview_quality),
            ("thumbnail_quality", self.thumbnail_quality),
        ] {
            if !(1..=100).contains(&quality) {
                return Err(format!("{} must be between 1 and 100", name));
            }
        }

        Ok(())
    }
}

/// Top-level configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RubixConfig {
    /// Root of the database file and the asset directories
    pub data_dir: PathBuf,

    /// Database file name inside `data_dir`
    pub database_file: String,

    pub ingest: IngestConfig,

    /// Quiet period before the note editor persists an edit
    pub autosave_debounce_ms: u64,

    /// Upper bound on parent hops during an ancestor walk
    pub max_ancestor_depth: usize,

    /// Undelivered snapshots buffered per live query
    pub live_query_buffer: usize,
}

impl Default for RubixConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            database_file: DEFAULT_DATABASE_FILE.to_string(),
            ingest: IngestConfig::default(),
            autosave_debounce_ms: 750,
            max_ancestor_depth: 1024,
            live_query_buffer: 16,
        }
    }
}

/// Platform data directory (`~/.local/share/rubix` on Linux), or `./.rubix`
/// when the platform has none
fn default_data_dir() -> PathBuf {
    dirs::data_dir()
        .map(|dir| dir.join("rubix"))
        .unwrap_or_else(|| PathBuf::from(".rubix"))
}

impl RubixConfig {
    /// Defaults rooted at a specific data directory
    pub fn with_data_dir(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            ..Self::default()
        }
    }

    /// Load configuration from a JSON file
    ///
    /// # Returns
    /// * `Ok(RubixConfig)` - Parsed configuration, or defaults if the file doesn't exist
    /// * `Err(String)` - If the file exists but cannot be read or parsed
    pub async fn load(path: &Path) -> Result<Self, String> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(path)
            .await
            .map_err(|e| format!("Failed to read config {}: {}", path.display(), e))?;

        serde_json::from_str(&contents)
            .map_err(|e| format!("Failed to parse config {}: {}", path.display(), e))
    }

    /// Save configuration as pretty JSON
    ///
    /// Writes to a temp file first, then renames it over the target.
    pub async fn save(&self, path: &Path) -> Result<(), String> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)
                    .await
                    .map_err(|e| format!("Failed to create config directory: {}", e))?;
            }
        }

        let serialized = serde_json::to_string_pretty(self)
            .map_err(|e| format!("Failed to serialize config: {}", e))?;

        let temp_file = path.with_extension("json.tmp");
        fs::write(&temp_file, serialized)
            .await
            .map_err(|e| format!("Failed to write config: {}", e))?;

        fs::rename(&temp_file, path)
            .await
            .map_err(|e| format!("Failed to save config: {}", e))?;

        Ok(())
    }

    /// Apply environment overrides (`RUBIX_DATA_DIR`)
    pub fn apply_env(mut self) -> Self {
        if let Some(dir) = std::env::var_os(DATA_DIR_ENV) {
            if !dir.is_empty() {
                self.data_dir = PathBuf::from(dir);
            }
        }
        self
    }

    /// Full path of the database file
    pub fn database_path(&self) -> PathBuf {
        self.data_dir.join(&self.database_file)
    }

    pub fn autosave_debounce(&self) -> Duration {
        Duration::from_millis(self.autosave_debounce_ms)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.data_dir.as_os_str().is_empty() {
            return Err("data_dir cannot be empty".to_string());
        }

        if self.database_file.trim().is_empty() {
            return Err("database_file cannot be empty".to_string());
        }

        if self.max_ancestor_depth == 0 {
            return Err("max_ancestor_depth must be greater than 0".to_string());
        }

        if self.live_query_buffer == 0 {
            return Err("live_query_buffer must be greater than 0".to_string());
        }

        self.ingest.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_config() {
        let config = RubixConfig::default();
        assert_eq!(config.database_file, "rubix.db");
        assert_eq!(config.ingest.preview_width, 1080);
        assert_eq!(config.ingest.preview_quality, 80);
        assert_eq!(config.ingest.thumbnail_width, 300);
        assert_eq!(config.ingest.thumbnail_quality, 70);
        assert_eq!(config.autosave_debounce(), Duration::from_millis(750));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_validation() {
        let mut config = RubixConfig::with_data_dir("/tmp/rubix");
        assert!(config.validate().is_ok());

        config.database_file = " ".to_string();
        assert!(config.validate().is_err());

        config.database_file = "rubix.db".to_string();
        config.max_ancestor_depth = 0;
        assert!(config.validate().is_err());

        config.max_ancestor_depth = 8;
        config.ingest.thumbnail_quality = 0;
        assert!(config.validate().is_err());

        config.ingest.thumbnail_quality = 101;
        assert!(config.validate().is_err());

        config.ingest.thumbnail_quality = 70;
        config.ingest.preview_width = 0;
        assert!(config.validate().is_err());
    }

    #[tokio::test]
    async fn test_load_missing_file_uses_defaults() {
        let temp_dir = TempDir::new().unwrap();
        let config = RubixConfig::load(&temp_dir.path().join("absent.json"))
            .await
            .unwrap();
        assert_eq!(config, RubixConfig::default());
    }

    #[tokio::test]
    async fn test_partial_file_keeps_other_defaults() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("rubix.json");
        tokio::fs::write(
            &path,
            r#"{ "dataDir": "/srv/rubix", "ingest": { "thumbnailWidth": 200 } }"#,
        )
        .await
        .unwrap();

        let config = RubixConfig::load(&path).await.unwrap();
        assert_eq!(config.data_dir, PathBuf::from("/srv/rubix"));
        assert_eq!(config.ingest.thumbnail_width, 200);
        assert_eq!(config.ingest.preview_width, 1080);
        assert_eq!(config.database_path(), PathBuf::from("/srv/rubix/rubix.db"));
    }

    #[tokio::test]
    async fn test_save_then_load() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("conf").join("rubix.json");

        let mut config = RubixConfig::with_data_dir(temp_dir.path());
        config.autosave_debounce_ms = 100;
        config.save(&path).await.unwrap();

        assert_eq!(RubixConfig::load(&path).await.unwrap(), config);
    }

    #[tokio::test]
    async fn test_invalid_json_is_an_error() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("broken.json");
        tokio::fs::write(&path, "{ not json").await.unwrap();

        assert!(RubixConfig::load(&path).await.is_err());
    }

    #[test]
    fn test_env_override() {
        std::env::set_var(DATA_DIR_ENV, "/env/rubix");
        let config = RubixConfig::default().apply_env();
        std::env::remove_var(DATA_DIR_ENV);

        assert_eq!(config.data_dir, PathBuf::from("/env/rubix"));
    }
}
