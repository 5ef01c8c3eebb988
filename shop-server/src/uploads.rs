//! Uploaded image storage
//!
//! Files live under `<root>/profile` and `<root>/products`, named
//! `<uuid>.<ext>`. The same directories are served statically.

use std::path::{Path, PathBuf};

use shared::error::{AppError, ErrorCode};
use uuid::Uuid;

/// Maximum file size (5MB)
pub const MAX_FILE_SIZE: usize = 5 * 1024 * 1024;

/// Maximum number of images per product request
pub const MAX_PRODUCT_IMAGES: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadKind {
    Profile,
    Product,
}

impl UploadKind {
    /// Directory name under the upload root, also the public URL prefix
    pub fn dir(&self) -> &'static str {
        match self {
            UploadKind::Profile => "profile",
            UploadKind::Product => "products",
        }
    }

    /// Multipart field the files arrive in
    pub fn field(&self) -> &'static str {
        match self {
            UploadKind::Profile => "photo",
            UploadKind::Product => "images",
        }
    }
}

#[derive(Debug, Clone)]
pub struct UploadStorage {
    root: PathBuf,
}

impl UploadStorage {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn dir(&self, kind: UploadKind) -> PathBuf {
        self.root.join(kind.dir())
    }

    /// Validate and write an uploaded image, returning the stored file name
    pub async fn save(
        &self,
        kind: UploadKind,
        original_name: Option<&str>,
        content_type: Option<&str>,
        bytes: &[u8],
    ) -> Result<String, AppError> {
        let ext = check_image(kind, original_name, content_type, bytes)?;

        let dir = self.dir(kind);
        tokio::fs::create_dir_all(&dir).await.map_err(|e| {
            tracing::error!(dir = %dir.display(), error = %e, "Failed to create upload directory");
            AppError::new(ErrorCode::StorageError)
        })?;

        let name = match ext {
            Some(ext) => format!("{}.{}", Uuid::new_v4(), ext),
            None => Uuid::new_v4().to_string(),
        };
        let path = dir.join(&name);
        tokio::fs::write(&path, bytes).await.map_err(|e| {
            tracing::error!(path = %path.display(), error = %e, "Failed to write upload");
            AppError::new(ErrorCode::StorageError)
        })?;

        tracing::debug!(kind = kind.dir(), file = %name, size = bytes.len(), "Stored upload");
        Ok(name)
    }

    /// Best-effort delete; failures are logged, never returned
    pub async fn remove(&self, kind: UploadKind, name: &str) {
        // stored names never contain separators; refuse anything else
        if name.is_empty() || name.contains(['/', '\\']) || name.contains("..") {
            tracing::warn!(file = %name, "Refusing to delete suspicious upload name");
            return;
        }
        let path = self.dir(kind).join(name);
        match tokio::fs::remove_file(&path).await {
            Ok(()) => tracing::debug!(path = %path.display(), "Removed upload"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::warn!(path = %path.display(), "Upload already gone");
            }
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "Failed to remove upload");
            }
        }
    }

    pub async fn remove_all<S: AsRef<str>>(&self, kind: UploadKind, names: &[S]) {
        for name in names {
            self.remove(kind, name.as_ref()).await;
        }
    }
}

/// Accept only `image/*`, by declared type or by extension; returns the extension to keep
fn check_image(
    kind: UploadKind,
    original_name: Option<&str>,
    content_type: Option<&str>,
    bytes: &[u8],
) -> Result<Option<String>, AppError> {
    let field = kind.field();

    if bytes.is_empty() {
        return Err(AppError::field(field, "Empty file provided"));
    }
    if bytes.len() > MAX_FILE_SIZE {
        return Err(AppError::with_message(
            ErrorCode::FileTooLarge,
            format!("File too large. Maximum size is {}MB", MAX_FILE_SIZE / 1024 / 1024),
        )
        .with_field_error(field, "File too large"));
    }

    let declared = content_type
        .map(str::trim)
        .filter(|ct| !ct.is_empty() && *ct != "application/octet-stream")
        .map(str::to_ascii_lowercase);
    let mime = declared.or_else(|| {
        original_name
            .and_then(|n| mime_guess::from_path(n).first())
            .map(|m| m.essence_str().to_string())
    });

    let Some(mime) = mime.filter(|m| m.starts_with("image/")) else {
        return Err(AppError::with_message(
            ErrorCode::UnsupportedFileFormat,
            "Only image files are allowed",
        )
        .with_field_error(field, "Only image files are allowed"));
    };

    let ext = original_name
        .and_then(|n| Path::new(n).extension())
        .and_then(|e| e.to_str())
        .filter(|e| !e.is_empty() && e.chars().all(|c| c.is_ascii_alphanumeric()))
        .map(str::to_ascii_lowercase)
        .or_else(|| {
            mime.strip_prefix("image/")
                .map(|sub| sub.split(['+', ';']).next().unwrap_or(sub).to_string())
        });

    Ok(ext)
}
