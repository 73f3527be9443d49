use super::{PreviewHandle, PreviewProvider, StagedFile, StagingError, UploadTarget};
use crate::services::storage::ObjectStorage;
use std::sync::Arc;

/// One image of an open form, in display order
#[derive(Debug)]
pub enum StagedImage {
    /// Already uploaded; belongs to the record being edited
    Remote { url: String },
    /// Picked in this session, not uploaded yet
    Local(LocalImage),
}

#[derive(Debug)]
pub struct LocalImage {
    file: StagedFile,
    preview: PreviewHandle,
}

impl LocalImage {
    pub fn file(&self) -> &StagedFile {
        &self.file
    }

    pub fn preview(&self) -> &PreviewHandle {
        &self.preview
    }
}

/// Ordered images of one record while its form is open.
///
/// Holds at most `max_images` entries and never the same remote URL twice. Every local
/// preview handle is released exactly once: on `remove_at`, or when the set is dropped.
pub struct AttachmentSet {
    owner_id: String,
    max_images: usize,
    entries: Vec<StagedImage>,
    previews: Arc<dyn PreviewProvider>,
}

impl AttachmentSet {
    /// Empty set for a new record; previews are staged on behalf of `owner_id`
    pub fn new(owner_id: &str, max_images: usize, previews: Arc<dyn PreviewProvider>) -> Self {
        Self {
            owner_id: owner_id.to_string(),
            max_images,
            entries: Vec::new(),
            previews,
        }
    }

    /// Set seeded from a persisted record's URL list
    pub fn seeded<I>(
        owner_id: &str,
        max_images: usize,
        urls: I,
        previews: Arc<dyn PreviewProvider>,
    ) -> Self
    where
        I: IntoIterator<Item = String>,
    {
        let mut set = Self::new(owner_id, max_images, previews);
        for url in urls {
            if url.is_empty() {
                continue;
            }
            if set.remote_urls().any(|existing| existing == url) {
                tracing::debug!("Skipping duplicate persisted image {}", url);
                continue;
            }
            if set.entries.len() == max_images {
                tracing::warn!(
                    "Record holds more than {} images, ignoring the rest (from {})",
                    max_images,
                    url
                );
                break;
            }
            set.entries.push(StagedImage::Remote { url });
        }
        set
    }

    pub fn max_images(&self) -> usize {
        self.max_images
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn remaining(&self) -> usize {
        self.max_images.saturating_sub(self.entries.len())
    }

    pub fn entries(&self) -> &[StagedImage] {
        &self.entries
    }

    pub fn local_count(&self) -> usize {
        self.entries
            .iter()
            .filter(|entry| matches!(entry, StagedImage::Local(_)))
            .count()
    }

    pub fn remote_urls(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().filter_map(|entry| match entry {
            StagedImage::Remote { url } => Some(url.as_str()),
            StagedImage::Local(_) => None,
        })
    }

    /// All-or-nothing capacity check for a batch of `requested` files
    pub fn check_capacity(&self, requested: usize) -> Result<(), StagingError> {
        let remaining = self.remaining();
        if requested > remaining {
            return Err(StagingError::CapacityExceeded {
                max: self.max_images,
                remaining,
            });
        }
        Ok(())
    }

    /// Appends the whole batch, or nothing.
    ///
    /// A batch larger than the remaining capacity is rejected as a unit. If a preview cannot be
    /// created midway, the previews already made for this batch are released before returning.
    pub fn add_files(&mut self, files: Vec<StagedFile>) -> Result<(), StagingError> {
        self.check_capacity(files.len())?;

        let mut staged = Vec::with_capacity(files.len());
        for file in files {
            match self.previews.create_preview(&self.owner_id, &file) {
                Ok(preview) => staged.push(LocalImage { file, preview }),
                Err(e) => {
                    for local in staged {
                        self.previews.release_preview(local.preview);
                    }
                    return Err(e);
                }
            }
        }

        tracing::debug!(
            "Staged {} image(s), {} of {} slots used",
            staged.len(),
            self.entries.len() + staged.len(),
            self.max_images
        );
        self.entries.extend(staged.into_iter().map(StagedImage::Local));
        Ok(())
    }

    /// Removes one entry, keeping the order of the rest. A local entry's preview is released now.
    pub fn remove_at(&mut self, index: usize) -> Result<(), StagingError> {
        if index >= self.entries.len() {
            return Err(StagingError::IndexOutOfRange {
                index,
                len: self.entries.len(),
            });
        }

        match self.entries.remove(index) {
            StagedImage::Remote { url } => {
                tracing::debug!("Unlinked existing image {}", url);
            }
            StagedImage::Local(local) => {
                self.previews.release_preview(local.preview);
            }
        }
        Ok(())
    }

    /// Snapshot of what a submit has to do; leaves the set untouched
    pub fn submission(&self) -> Submission {
        let mut remote = Vec::new();
        let mut uploads = Vec::new();
        for entry in &self.entries {
            match entry {
                StagedImage::Remote { url } => remote.push(url.clone()),
                StagedImage::Local(local) => uploads.push(local.file.clone()),
            }
        }
        Submission { remote, uploads }
    }

    /// Uploads every local file and returns the record's final URL list
    pub async fn resolve_for_submit(
        &self,
        storage: &dyn ObjectStorage,
        target: &UploadTarget,
    ) -> Result<Vec<String>, StagingError> {
        self.submission().resolve(storage, target).await
    }
}

impl Drop for AttachmentSet {
    fn drop(&mut self) {
        let mut released = 0;
        for entry in self.entries.drain(..) {
            if let StagedImage::Local(local) = entry {
                self.previews.release_preview(local.preview);
                released += 1;
            }
        }
        if released > 0 {
            tracing::debug!("Released {} preview(s) on teardown", released);
        }
    }
}

/// Detached copy of an attachment set's submit work.
///
/// Cloning file data is cheap (`Bytes`), which lets a submit upload without holding the form.
#[derive(Debug, Clone)]
pub struct Submission {
    remote: Vec<String>,
    uploads: Vec<StagedFile>,
}

impl Submission {
    pub fn remote_urls(&self) -> &[String] {
        &self.remote
    }

    pub fn upload_count(&self) -> usize {
        self.uploads.len()
    }

    /// Uploads sequentially, stopping at the first failure.
    ///
    /// Returns the remaining remote URLs followed by the new uploads' public URLs. Objects
    /// stored before a failing upload stay in storage; no URL list is returned for them.
    pub async fn resolve(
        self,
        storage: &dyn ObjectStorage,
        target: &UploadTarget,
    ) -> Result<Vec<String>, StagingError> {
        let total = self.uploads.len();
        let mut uploaded = Vec::with_capacity(total);

        for file in self.uploads {
            let path = target.object_path(&file.extension);
            if let Err(e) = storage
                .upload(target.bucket(), &path, file.data, &file.content_type)
                .await
            {
                tracing::error!(
                    "Image upload failed for {} ({} of {} already stored): {:#}",
                    path,
                    uploaded.len(),
                    total,
                    e
                );
                return Err(StagingError::UploadFailure {
                    path,
                    reason: e.to_string(),
                });
            }
            uploaded.push(storage.public_url(target.bucket(), &path));
        }

        if total > 0 {
            tracing::info!(
                "Uploaded {} image(s) to {} for {}",
                total,
                target.bucket(),
                target.owner_id()
            );
        }

        let mut urls = self.remote;
        urls.extend(uploaded);
        Ok(urls)
    }
}
