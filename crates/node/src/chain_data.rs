//! Chain-data directory removal for the wipe-and-restart path.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tracing::{debug, info};

use orchestrator::subsystems::{ChainData, WipeError};

/// The node's on-disk chain data. Wiping an already-absent directory is
/// a success, so the wipe path stays idempotent.
pub struct ChainDataDir {
    path: PathBuf,
}

impl ChainDataDir {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl ChainData for ChainDataDir {
    async fn wipe(&self) -> Result<(), WipeError> {
        match tokio::fs::remove_dir_all(&self.path).await {
            Ok(()) => {
                info!(path = %self.path.display(), "chain data removed");
                Ok(())
            }
            Err(cause) if cause.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "chain data already absent");
                Ok(())
            }
            Err(cause) => Err(WipeError(format!(
                "failed to remove {}: {}",
                self.path.display(),
                cause
            ))),
        }
    }
}
