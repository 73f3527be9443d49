use crate::staging::StagedFile;
use bytes::Bytes;
use image::ImageFormat;
use std::io::Cursor;
use std::path::Path;

/// Longest extension taken from a filename as-is
const MAX_EXTENSION_LEN: usize = 5;

#[derive(Debug, Clone)]
pub struct ValidationError {
    pub code: &'static str,
    pub message: String,
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

impl std::error::Error for ValidationError {}

/// Validates file size against maximum limit
pub fn validate_file_size(size: usize, max_size: usize) -> Result<(), ValidationError> {
    if size == 0 {
        return Err(ValidationError {
            code: "EMPTY_FILE",
            message: "File appears to be empty".to_string(),
        });
    }
    if size > max_size {
        return Err(ValidationError {
            code: "FILE_TOO_LARGE",
            message: format!(
                "File size {} bytes exceeds maximum allowed {} bytes ({} MB)",
                size,
                max_size,
                max_size / 1024 / 1024
            ),
        });
    }
    Ok(())
}

/// Reduces a client-supplied filename to a safe final component
pub fn sanitize_filename(filename: &str) -> Result<String, ValidationError> {
    // Browsers on Windows may send the full path with backslashes
    let last = filename.rsplit(['/', '\\']).next().unwrap_or("");
    let name = Path::new(last)
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("");

    if name.is_empty() || name == "." || name == ".." {
        return Err(ValidationError {
            code: "INVALID_FILENAME",
            message: "Filename cannot be empty".to_string(),
        });
    }

    let sanitized: String = name
        .chars()
        .map(|c| {
            if c.is_control() || matches!(c, ':' | '*' | '?' | '"' | '<' | '>' | '|' | ';') {
                '_'
            } else {
                c
            }
        })
        .collect();

    // Limit length safely for UTF-8
    let sanitized = if sanitized.len() > 255 {
        let mut end = 255;
        while !sanitized.is_char_boundary(end) {
            end -= 1;
        }
        sanitized[..end].to_string()
    } else {
        sanitized
    };

    Ok(sanitized)
}

/// Lowercased extension when it is a short alphanumeric token
pub fn file_extension(filename: &str) -> Option<String> {
    let (stem, ext) = filename.rsplit_once('.')?;
    if stem.is_empty() || ext.is_empty() || ext.len() > MAX_EXTENSION_LEN {
        return None;
    }
    if !ext.chars().all(|c| c.is_ascii_alphanumeric()) {
        return None;
    }
    Some(ext.to_ascii_lowercase())
}

/// Sniffs the content; only images pass
pub fn detect_image_type(data: &[u8]) -> Result<infer::Type, ValidationError> {
    if data.is_empty() {
        return Err(ValidationError {
            code: "EMPTY_FILE",
            message: "File appears to be empty".to_string(),
        });
    }

    match infer::get(data) {
        Some(kind) if kind.matcher_type() == infer::MatcherType::Image => Ok(kind),
        Some(kind) => Err(ValidationError {
            code: "NOT_AN_IMAGE",
            message: format!("Content is '{}', only images are allowed", kind.mime_type()),
        }),
        None => Err(ValidationError {
            code: "NOT_AN_IMAGE",
            message: "Content is not a recognised image format".to_string(),
        }),
    }
}

/// Reads width and height for formats this build can decode; `None` for the rest
pub fn read_dimensions(data: &[u8]) -> Result<Option<(u32, u32)>, ValidationError> {
    let reader = image::io::Reader::new(Cursor::new(data))
        .with_guessed_format()
        .map_err(|e| ValidationError {
            code: "CORRUPT_IMAGE",
            message: e.to_string(),
        })?;

    match reader.format() {
        Some(ImageFormat::Png | ImageFormat::Jpeg | ImageFormat::Gif | ImageFormat::WebP) => reader
            .into_dimensions()
            .map(Some)
            .map_err(|e| ValidationError {
                code: "CORRUPT_IMAGE",
                message: format!("Image header could not be read: {}", e),
            }),
        _ => Ok(None),
    }
}

/// Full intake pipeline for one picked file
pub fn inspect_image(
    filename: &str,
    declared_type: Option<&str>,
    data: Bytes,
    max_size: usize,
) -> Result<StagedFile, ValidationError> {
    // 1. Size check
    validate_file_size(data.len(), max_size)?;

    // 2. Sanitize filename
    let filename = sanitize_filename(filename)?;

    // 3. Content sniffing; the declared type is advisory only
    let kind = detect_image_type(&data)?;
    if let Some(declared) = declared_type {
        let matches = declared
            .parse::<mime::Mime>()
            .map(|m| m.type_() == mime::IMAGE)
            .unwrap_or(false);
        if !matches {
            tracing::debug!(
                "Declared type '{}' for {} disagrees with sniffed '{}'",
                declared,
                filename,
                kind.mime_type()
            );
        }
    }

    // 4. Header decode for dimensions
    let dimensions = read_dimensions(&data)?;

    let extension = file_extension(&filename).unwrap_or_else(|| kind.extension().to_string());

    Ok(StagedFile {
        filename,
        content_type: kind.mime_type().to_string(),
        extension,
        data,
        dimensions,
    })
}
