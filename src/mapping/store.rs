use super::{ButtonMapping, MappingError};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

pub const MAPPING_FILE: &str = "gamepad-config.json";

/// JSON file backing the button mapping.
#[derive(Debug, Clone)]
pub struct MappingStore {
    path: PathBuf,
}

impl MappingStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Reads the mapping, falling back to [`ButtonMapping::default`] when the
    /// file is missing or cannot be parsed.
    pub async fn load(&self) -> ButtonMapping {
        match self.try_load().await {
            Ok(mapping) => {
                info!("Loaded gamepad mapping from {}", self.path.display());
                mapping
            }
            Err(MappingError::Io(e)) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(
                    "No mapping file at {}, using default mapping",
                    self.path.display()
                );
                ButtonMapping::default()
            }
            Err(e) => {
                warn!(
                    "Could not load mapping from {}: {}, using default mapping",
                    self.path.display(),
                    e
                );
                ButtonMapping::default()
            }
        }
    }

    async fn try_load(&self) -> Result<ButtonMapping, MappingError> {
        let content = tokio::fs::read_to_string(&self.path).await?;
        let mapping: ButtonMapping = serde_json::from_str(&content)?;
        mapping.validate()?;
        Ok(mapping)
    }

    /// Writes the mapping, creating the parent directory if needed.
    pub async fn save(&self, mapping: &ButtonMapping) -> Result<(), MappingError> {
        mapping.validate()?;
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }
        let content = serde_json::to_string_pretty(mapping)?;
        tokio::fs::write(&self.path, content).await?;
        info!("Saved gamepad mapping to {}", self.path.display());
        Ok(())
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::time::{SystemTime, UNIX_EPOCH};

    pub(crate) fn scratch_dir(tag: &str) -> PathBuf {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_nanos())
            .unwrap_or_default();
        std::env::temp_dir().join(format!(
            "rc-relay-{}-{}-{}",
            tag,
            std::process::id(),
            nanos
        ))
    }

    #[tokio::test]
    async fn missing_file_falls_back_to_default() {
        let store = MappingStore::new(scratch_dir("missing").join(MAPPING_FILE));
        assert_eq!(store.load().await, ButtonMapping::default());
    }

    #[tokio::test]
    async fn corrupt_file_falls_back_to_default() {
        let dir = scratch_dir("corrupt");
        tokio::fs::create_dir_all(&dir).await.unwrap();
        let path = dir.join(MAPPING_FILE);
        tokio::fs::write(&path, "{ \"throttleIndex\": ").await.unwrap();

        let store = MappingStore::new(&path);
        assert_eq!(store.load().await, ButtonMapping::default());
        let _ = tokio::fs::remove_dir_all(&dir).await;
    }

    #[tokio::test]
    async fn saved_mapping_is_loaded_back() {
        let dir = scratch_dir("saved");
        let store = MappingStore::new(dir.join("nested").join(MAPPING_FILE));
        let mapping = ButtonMapping {
            throttle_index: 5,
            reverse_index: 4,
            steering_index: 2,
            steer_offset_right_index: 15,
            steer_offset_left_index: 14,
        };

        store.save(&mapping).await.unwrap();
        assert_eq!(store.load().await, mapping);
        let _ = tokio::fs::remove_dir_all(&dir).await;
    }

    #[tokio::test]
    async fn reads_files_written_by_hand() {
        let dir = scratch_dir("hand");
        tokio::fs::create_dir_all(&dir).await.unwrap();
        let path = dir.join(MAPPING_FILE);
        tokio::fs::write(
            &path,
            r#"{"throttleIndex":1,"reverseIndex":0,"steeringIndex":3,"steerOffsetRightIndex":12,"steerOffsetLeftIndex":13}"#,
        )
        .await
        .unwrap();

        let mapping = MappingStore::new(&path).load().await;
        assert_eq!(mapping.throttle_index, 1);
        assert_eq!(mapping.steering_index, 3);
        let _ = tokio::fs::remove_dir_all(&dir).await;
    }
}
