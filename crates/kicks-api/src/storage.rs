use anyhow::Result;
use sha2::{Digest, Sha256};
use std::path::PathBuf;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{info, warn};

/// On-disk image storage.
///
/// Each image is stored as a single flat file at `{dir}/{image_id}`. Writes go
/// to `{image_id}.part` first and are renamed into place once flushed, so a
/// reader never observes a half-written image.
pub struct ImageStore {
    dir: PathBuf,
}

impl ImageStore {
    pub async fn new(dir: PathBuf) -> Result<Self> {
        fs::create_dir_all(&dir).await?;
        info!("Image storage directory: {}", dir.display());
        Ok(Self { dir })
    }

    /// Path to the file for a given image. Callers pass ids that already
    /// parsed as UUIDs.
    pub fn file_path(&self, image_id: &str) -> PathBuf {
        self.dir.join(image_id)
    }

    /// Write image bytes. Returns the SHA-256 hex digest.
    pub async fn write(&self, image_id: &str, data: &[u8]) -> Result<String> {
        let digest = sha256_hex(data);

        let path = self.file_path(image_id);
        let tmp = self.dir.join(format!("{}.part", image_id));
        let mut file = fs::File::create(&tmp).await?;
        file.write_all(data).await?;
        file.flush().await?;
        file.sync_all().await?;
        drop(file);
        fs::rename(&tmp, &path).await?;

        Ok(digest)
    }

    pub async fn read(&self, image_id: &str) -> Result<Vec<u8>> {
        Ok(fs::read(self.file_path(image_id)).await?)
    }

    /// Delete an image's file from disk. Missing files are not an error.
    pub async fn delete(&self, image_id: &str) -> Result<()> {
        let path = self.file_path(image_id);
        match fs::remove_file(&path).await {
            Ok(()) => {
                info!("Deleted image {}", image_id);
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                warn!("Image {} already gone", image_id);
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }
}

pub fn sha256_hex(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}
