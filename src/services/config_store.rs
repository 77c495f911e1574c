// Configuration Storage Service
// Handles config file read/write and version backup

use crate::models::{DetectionConfig, KeywordTable};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct AppConfig {
    pub version: String,
    pub detection: DetectionConfig,
    /// Path to a keyword table JSON file; built-in table when absent.
    pub keyword_table_path: Option<String>,
    #[serde(default)]
    pub providers: HashMap<String, ProviderConfig>,
    #[serde(default)]
    pub api_keys: HashMap<String, String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct ProviderConfig {
    pub enabled: bool,
    pub model: Option<String>,
    pub base_url: Option<String>,
}

pub struct ConfigStore {
    config_dir: PathBuf,
    config_file: PathBuf,
}

impl ConfigStore {
    pub fn new(config_dir: PathBuf) -> Self {
        let config_file = config_dir.join("config.json");
        Self { config_dir, config_file }
    }

    /// Get default config directory
    pub fn default_config_dir() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("sponsorskip"))
    }

    /// Ensure config directory exists
    pub fn ensure_dir(&self) -> Result<(), String> {
        fs::create_dir_all(&self.config_dir)
            .map_err(|e| format!("Failed to create config dir: {}", e))
    }

    /// Load configuration from file
    pub fn load(&self) -> Result<AppConfig, String> {
        if !self.config_file.exists() {
            return Ok(AppConfig::default());
        }

        let content = fs::read_to_string(&self.config_file)
            .map_err(|e| format!("Failed to read config: {}", e))?;

        serde_json::from_str(&content)
            .map_err(|e| format!("Failed to parse config: {}", e))
    }

    /// Save configuration to file
    pub fn save(&self, config: &AppConfig) -> Result<(), String> {
        self.ensure_dir()?;

        // Create backup if file exists
        if self.config_file.exists() {
            self.create_backup()?;
        }

        let content = serde_json::to_string_pretty(config)
            .map_err(|e| format!("Failed to serialize config: {}", e))?;

        fs::write(&self.config_file, content)
            .map_err(|e| format!("Failed to write config: {}", e))
    }

    /// Create a backup of current config
    fn create_backup(&self) -> Result<(), String> {
        let backup_dir = self.config_dir.join("backups");
        fs::create_dir_all(&backup_dir)
            .map_err(|e| format!("Failed to create backup dir: {}", e))?;

        let timestamp = chrono::Utc::now().format("%Y%m%d_%H%M%S");
        let backup_file = backup_dir.join(format!("config_{}.json", timestamp));

        fs::copy(&self.config_file, &backup_file)
            .map_err(|e| format!("Failed to create backup: {}", e))?;

        // Keep only last 10 backups
        self.cleanup_old_backups(&backup_dir, 10)?;

        Ok(())
    }

    /// Remove old backups, keeping only the most recent N
    fn cleanup_old_backups(&self, backup_dir: &PathBuf, keep: usize) -> Result<(), String> {
        let mut entries: Vec<_> = fs::read_dir(backup_dir)
            .map_err(|e| format!("Failed to read backup dir: {}", e))?
            .filter_map(|e| e.ok())
            .filter(|e| e.path().extension().map_or(false, |ext| ext == "json"))
            .collect();

        if entries.len() <= keep {
            return Ok(());
        }

        // Sort by modification time (oldest first)
        entries.sort_by_key(|e| {
            e.metadata()
                .and_then(|m| m.modified())
                .unwrap_or(std::time::SystemTime::UNIX_EPOCH)
        });

        // Remove oldest entries
        for entry in entries.iter().take(entries.len() - keep) {
            let _ = fs::remove_file(entry.path());
        }

        Ok(())
    }

    /// Get provider API key from config file
    pub fn get_api_key(&self, provider: &str) -> Result<Option<String>, String> {
        let config = self.load()?;
        Ok(config.api_keys.get(provider).cloned())
    }

    /// Store provider API key in config file
    pub fn set_api_key(&self, provider: &str, key: &str) -> Result<(), String> {
        let mut config = self.load()?;
        config.api_keys.insert(provider.to_string(), key.to_string());
        self.save(&config)
    }

    /// Delete provider API key from config file
    pub fn delete_api_key(&self, provider: &str) -> Result<(), String> {
        let mut config = self.load()?;
        config.api_keys.remove(provider);
        self.save(&config)
    }

    /// Get provider settings from config file
    pub fn get_provider(&self, provider: &str) -> Result<Option<ProviderConfig>, String> {
        let config = self.load()?;
        Ok(config.providers.get(provider).cloned())
    }

    /// Get provider base URL from config file
    pub fn get_provider_url(&self, provider: &str) -> Result<Option<String>, String> {
        let config = self.load()?;
        Ok(config.providers.get(provider).and_then(|p| p.base_url.clone()))
    }

    /// Set provider base URL in config file
    pub fn set_provider_url(&self, provider: &str, url: &str) -> Result<(), String> {
        let mut config = self.load()?;
        let provider_config = config.providers.entry(provider.to_string()).or_default();
        provider_config.base_url = Some(url.to_string());
        self.save(&config)
    }

    /// Load the keyword table named by the config, or the built-in default.
    pub fn load_keyword_table(&self) -> Result<KeywordTable, String> {
        let config = self.load()?;
        match config.keyword_table_path {
            Some(path) => {
                let content = fs::read_to_string(&path)
                    .map_err(|e| format!("Failed to read keyword table {}: {}", path, e))?;
                serde_json::from_str(&content)
                    .map_err(|e| format!("Failed to parse keyword table {}: {}", path, e))
            }
            None => Ok(KeywordTable::default()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.detection.default_threshold, 0.3);
        assert!(config.keyword_table_path.is_none());
    }

    #[test]
    fn test_config_serialization() {
        let config = AppConfig {
            version: "1.0.0".to_string(),
            detection: DetectionConfig::default(),
            keyword_table_path: None,
            providers: HashMap::new(),
            api_keys: HashMap::new(),
        };

        let json = serde_json::to_string(&config).unwrap();
        let parsed: AppConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.version, "1.0.0");
        assert_eq!(parsed.detection.window_size_seconds, 30.0);
    }

    #[test]
    fn test_provider_url_roundtrip() {
        let dir = std::env::temp_dir().join(format!("sponsorskip-test-{}", uuid::Uuid::new_v4()));
        let store = ConfigStore::new(dir.clone());
        assert!(store.get_provider_url("deepseek").unwrap().is_none());

        store
            .set_provider_url("deepseek", "http://localhost:9999/chat/completions")
            .unwrap();
        assert_eq!(
            store.get_provider_url("deepseek").unwrap().as_deref(),
            Some("http://localhost:9999/chat/completions")
        );
        let provider = store.get_provider("deepseek").unwrap().unwrap();
        assert!(provider.base_url.is_some());

        let _ = fs::remove_dir_all(dir);
    }

    #[test]
    fn test_missing_file_yields_default() {
        let store = ConfigStore::new(PathBuf::from("/nonexistent/sponsorskip-test"));
        let config = store.load().unwrap();
        assert_eq!(config.detection.default_threshold, 0.3);
        let table = store.load_keyword_table().unwrap();
        assert!(!table.phrases.is_empty());
    }
}
