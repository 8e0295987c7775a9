use anyhow::{bail, Context, Result};
use std::path::{Path, PathBuf};
use uuid::Uuid;

/// URL prefix under which stored recordings are served
pub const AUDIO_ROUTE_PREFIX: &str = "/api/audio/";

/// Stores recorded audio blobs on the local filesystem.
#[derive(Debug, Clone)]
pub struct AudioStorage {
    root: PathBuf,
}

impl AudioStorage {
    /// Create the storage directory if it does not exist
    pub fn new(root: impl AsRef<Path>) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        std::fs::create_dir_all(&root)
            .context(format!("Could not initialize upload folder {}", root.display()))?;
        Ok(Self { root })
    }

    /// Save a blob under a fresh unique name and return its retrieval URL
    pub async fn save(&self, original_name: &str, data: &[u8]) -> Result<String> {
        let filename = format!("{}_{}", Uuid::new_v4(), sanitize_name(original_name));
        let path = self.root.join(&filename);

        tokio::fs::write(&path, data)
            .await
            .context(format!("Could not store the file {}", filename))?;

        Ok(format!("{}{}", AUDIO_ROUTE_PREFIX, filename))
    }

    /// Load a previously stored blob by file name
    pub async fn load(&self, filename: &str) -> Result<Vec<u8>> {
        validate_name(filename)?;
        tokio::fs::read(self.root.join(filename))
            .await
            .context(format!("Could not read audio file {}", filename))
    }

    /// Delete a blob given the URL returned by [`AudioStorage::save`]
    pub async fn remove(&self, audio_url: &str) -> Result<()> {
        let filename = audio_url
            .strip_prefix(AUDIO_ROUTE_PREFIX)
            .unwrap_or(audio_url);
        validate_name(filename)?;
        tokio::fs::remove_file(self.root.join(filename))
            .await
            .context(format!("Could not remove audio file {}", filename))
    }
}

fn validate_name(filename: &str) -> Result<()> {
    if filename.is_empty()
        || filename.contains('/')
        || filename.contains('\\')
        || filename.contains("..")
    {
        bail!("Invalid audio file name: '{}'", filename);
    }
    Ok(())
}

// Uploaded names are client-controlled; keep only the final path component
// and characters that are safe in a URL path segment.
fn sanitize_name(original_name: &str) -> String {
    let base = original_name
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or_default();
    let cleaned: String = base
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect();
    let cleaned = cleaned.replace("..", "_");

    if cleaned.is_empty() {
        "recording.webm".to_string()
    } else {
        cleaned
    }
}
