//! Image staging for open edit forms.
//!
//! An [`AttachmentSet`] holds the images of one record while its form is open: images already
//! stored remotely plus files picked in this session, each of the latter with a preview handle.
//! On submit the local files are uploaded and the set resolves to the record's final URL list.

pub mod attachment_set;
pub mod error;
pub mod naming;
pub mod preview;

pub use attachment_set::{AttachmentSet, LocalImage, StagedImage, Submission};
pub use error::StagingError;
pub use naming::UploadTarget;
pub use preview::{PreviewHandle, PreviewProvider, PreviewStore};

use crate::utils::validation::file_extension;
use bytes::Bytes;

/// A file picked for upload, already read into memory
#[derive(Clone)]
pub struct StagedFile {
    pub filename: String,
    pub content_type: String,
    /// Lowercase, without the dot; empty when unknown
    pub extension: String,
    pub data: Bytes,
    pub dimensions: Option<(u32, u32)>,
}

impl StagedFile {
    pub fn new(filename: &str, content_type: &str, data: Bytes) -> Self {
        Self {
            filename: filename.to_string(),
            content_type: content_type.to_string(),
            extension: file_extension(filename).unwrap_or_default(),
            data,
            dimensions: None,
        }
    }

    pub fn size(&self) -> usize {
        self.data.len()
    }
}

impl std::fmt::Debug for StagedFile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StagedFile")
            .field("filename", &self.filename)
            .field("content_type", &self.content_type)
            .field("extension", &self.extension)
            .field("size", &self.data.len())
            .field("dimensions", &self.dimensions)
            .finish()
    }
}
