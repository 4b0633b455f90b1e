use std::path::PathBuf;

use anyhow::Result;
use tokio::sync::RwLock;
use tracing::warn;

use crate::models::{AppConfig, PersistedAppConfig};

pub struct SettingsManager {
    path: PathBuf,
    data: RwLock<PersistedAppConfig>,
}

impl SettingsManager {
    pub async fn new(path: PathBuf) -> Result<Self> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let initial = match tokio::fs::read(&path).await {
            Ok(bytes) if !bytes.is_empty() => serde_json::from_slice::<PersistedAppConfig>(&bytes)
                .unwrap_or_else(|e| {
                    warn!("配置文件解析失败，使用默认配置: {}", e);
                    PersistedAppConfig::default()
                }),
            _ => {
                let default = PersistedAppConfig::default();
                let json = serde_json::to_string_pretty(&default)?;
                tokio::fs::write(&path, json).await?;
                default
            }
        };

        Ok(Self {
            path,
            data: RwLock::new(initial),
        })
    }

    pub async fn get(&self) -> PersistedAppConfig {
        self.data.read().await.clone()
    }

    pub async fn update(&self, update: AppConfig) -> Result<PersistedAppConfig> {
        let mut config = self.data.write().await;

        if let Some(upload) = update.upload {
            config.upload = upload;
        }
        if let Some(capture) = update.capture {
            config.capture = capture;
        }
        if let Some(policy) = update.permission_policy {
            config.permission_policy = policy;
        }

        self.save(&config).await?;
        Ok(config.clone())
    }

    async fn save(&self, config: &PersistedAppConfig) -> Result<()> {
        let json = serde_json::to_string_pretty(config)?;
        tokio::fs::write(&self.path, json).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{PermissionPolicy, UploadSettings};
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_creates_default_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("config.json");
        let settings = SettingsManager::new(path.clone()).await.unwrap();

        assert!(path.exists());
        assert_eq!(settings.get().await, PersistedAppConfig::default());
    }

    #[tokio::test]
    async fn test_partial_update_is_persisted() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");
        let settings = SettingsManager::new(path.clone()).await.unwrap();

        let upload = UploadSettings {
            endpoint: "http://127.0.0.1:8080/upload".to_string(),
            ..UploadSettings::default()
        };
        settings
            .update(AppConfig {
                upload: Some(upload.clone()),
                ..AppConfig::default()
            })
            .await
            .unwrap();

        let reloaded = SettingsManager::new(path).await.unwrap().get().await;
        assert_eq!(reloaded.upload, upload);
        assert_eq!(reloaded.permission_policy, PermissionPolicy::EveryEntry);
    }

    #[tokio::test]
    async fn test_corrupt_file_falls_back_to_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, "{not json").unwrap();

        let settings = SettingsManager::new(path).await.unwrap();
        assert_eq!(settings.get().await, PersistedAppConfig::default());
    }
}
