//! Request-scoped storage for the question image.

use std::io;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

/// Where a task finds the question image
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageInput {
    /// Location of the image on disk
    pub path: PathBuf,
    /// MIME type forwarded to the vision providers
    pub mime_type: String,
}

/// The question image, written to a uniquely named temporary file.
///
/// The file lives exactly as long as this value: it is removed by
/// [`ScopedImage::remove`] or, on any other exit path, when dropped.
#[derive(Debug)]
pub struct ScopedImage {
    file: NamedTempFile,
    mime_type: String,
}

impl ScopedImage {
    /// Write `bytes` to a fresh temporary file
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be created or written.
    pub async fn persist(bytes: &[u8], mime_type: &str) -> io::Result<Self> {
        let file = tempfile::Builder::new()
            .prefix("mcq-")
            .suffix(extension_for(mime_type))
            .tempfile()?;
        tokio::fs::write(file.path(), bytes).await?;

        Ok(Self {
            file,
            mime_type: mime_type.to_string(),
        })
    }

    /// Path of the temporary file
    #[must_use]
    pub fn path(&self) -> &Path {
        self.file.path()
    }

    /// Descriptor handed to the provider tasks
    #[must_use]
    pub fn input(&self) -> ImageInput {
        ImageInput {
            path: self.path().to_path_buf(),
            mime_type: self.mime_type.clone(),
        }
    }

    /// Delete the file now and report the outcome
    ///
    /// # Errors
    ///
    /// Returns an error if the file could not be deleted.
    pub fn remove(self) -> io::Result<()> {
        self.file.close()
    }
}

fn extension_for(mime_type: &str) -> &'static str {
    match mime_type {
        "image/png" => ".png",
        "image/webp" => ".webp",
        "image/gif" => ".gif",
        "image/bmp" => ".bmp",
        _ => ".jpg",
    }
}
