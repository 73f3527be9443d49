use super::{StagedFile, StagingError};
use bytes::Bytes;
use dashmap::DashMap;
use std::path::PathBuf;
use tempfile::TempDir;
use uuid::Uuid;

/// Token for a temporary, locally served copy of a not-yet-uploaded image.
///
/// Not `Clone`, and only minted by `PreviewStore`: releasing consumes the handle, so it is
/// released at most once.
#[derive(Debug, PartialEq, Eq, Hash)]
pub struct PreviewHandle(Uuid);

impl PreviewHandle {
    pub(crate) fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn id(&self) -> Uuid {
        self.0
    }

    pub fn url(&self) -> String {
        format!("/previews/{}", self.0)
    }
}

/// Allocates and releases preview handles for staged files
pub trait PreviewProvider: Send + Sync {
    fn create_preview(&self, owner_id: &str, file: &StagedFile)
    -> Result<PreviewHandle, StagingError>;
    fn release_preview(&self, handle: PreviewHandle);
}

struct PreviewEntry {
    owner_id: String,
    path: PathBuf,
    content_type: String,
}

/// Temp-directory backed previews, served by `GET /previews/{id}`
pub struct PreviewStore {
    dir: TempDir,
    entries: DashMap<Uuid, PreviewEntry>,
}

impl PreviewStore {
    pub fn new() -> anyhow::Result<Self> {
        let dir = tempfile::Builder::new()
            .prefix("showroom-previews-")
            .tempdir()?;
        tracing::info!("🖼️  Preview directory: {}", dir.path().display());
        Ok(Self {
            dir,
            entries: DashMap::new(),
        })
    }

    /// Number of live (unreleased) previews
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Preview bytes and content type, or `None` once released or when staged by someone else
    pub async fn read(&self, id: Uuid, owner_id: &str) -> Option<(Bytes, String)> {
        let (path, content_type) = {
            let entry = self.entries.get(&id)?;
            if entry.owner_id != owner_id {
                tracing::warn!("{} asked for preview {} staged by another user", owner_id, id);
                return None;
            }
            (entry.path.clone(), entry.content_type.clone())
        };

        match tokio::fs::read(&path).await {
            Ok(data) => Some((Bytes::from(data), content_type)),
            Err(e) => {
                tracing::debug!("Preview {} vanished while reading: {}", id, e);
                None
            }
        }
    }
}

impl PreviewProvider for PreviewStore {
    fn create_preview(
        &self,
        owner_id: &str,
        file: &StagedFile,
    ) -> Result<PreviewHandle, StagingError> {
        let handle = PreviewHandle::new();
        let path = self.dir.path().join(handle.id().to_string());

        std::fs::write(&path, &file.data).map_err(|e| StagingError::Preview(e.to_string()))?;

        self.entries.insert(
            handle.id(),
            PreviewEntry {
                owner_id: owner_id.to_string(),
                path,
                content_type: file.content_type.clone(),
            },
        );
        Ok(handle)
    }

    fn release_preview(&self, handle: PreviewHandle) {
        match self.entries.remove(&handle.id()) {
            Some((_, entry)) => {
                if let Err(e) = std::fs::remove_file(&entry.path) {
                    tracing::warn!("Failed to delete preview file {:?}: {}", entry.path, e);
                }
            }
            None => tracing::warn!("Release of unknown preview {}", handle.id()),
        }
    }
}
