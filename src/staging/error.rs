use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StagingError {
    #[error("You can only upload up to {max} images. {remaining} slot(s) remaining.")]
    CapacityExceeded { max: usize, remaining: usize },

    #[error("No image at position {index} (form holds {len})")]
    IndexOutOfRange { index: usize, len: usize },

    #[error("Invalid image: {0}")]
    InvalidFile(String),

    #[error("Could not create preview: {0}")]
    Preview(String),

    #[error("Failed to upload one or more images. Please try again.")]
    UploadFailure { path: String, reason: String },

    #[error("You must be logged in to upload images")]
    MissingOwner,
}
