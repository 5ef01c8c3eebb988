//! Multipart form reading
//!
//! Files are buffered and written to disk only after the whole form parsed,
//! so a malformed request never leaves files behind.

use std::collections::HashMap;

use axum::body::Bytes;
use axum::extract::Multipart;
use axum::extract::multipart::MultipartError;
use http::StatusCode;
use shared::error::{AppError, ErrorCode};

use crate::uploads::{MAX_FILE_SIZE, UploadKind, UploadStorage};

/// Body limit for routes that accept up to `files` images
pub const fn body_limit(files: usize) -> usize {
    files * MAX_FILE_SIZE + 1024 * 1024
}

#[derive(Debug)]
pub struct FilePart {
    pub file_name: Option<String>,
    pub content_type: Option<String>,
    pub bytes: Bytes,
}

/// Parsed form: text fields (last value wins) and file parts by field name
#[derive(Debug, Default)]
pub struct Form {
    pub fields: HashMap<String, String>,
    pub files: Vec<(String, FilePart)>,
}

impl Form {
    pub async fn read(mut multipart: Multipart) -> Result<Self, AppError> {
        let mut form = Form::default();
        while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
            let name = field.name().unwrap_or_default().to_string();
            if let Some(file_name) = field.file_name().map(str::to_string) {
                let content_type = field.content_type().map(str::to_string);
                let bytes = field.bytes().await.map_err(multipart_error)?;
                // browsers send an empty part for an untouched file input
                if bytes.is_empty() && file_name.is_empty() {
                    continue;
                }
                form.files.push((
                    name,
                    FilePart {
                        file_name: Some(file_name),
                        content_type,
                        bytes,
                    },
                ));
            } else {
                let text = field.text().await.map_err(multipart_error)?;
                form.fields.insert(name, text);
            }
        }
        Ok(form)
    }

    /// Non-empty, trimmed text field
    pub fn text(&self, name: &str) -> Option<String> {
        self.fields
            .get(name)
            .map(|v| v.trim())
            .filter(|v| !v.is_empty())
            .map(str::to_string)
    }

    /// Parse an optional field, reporting failures under its name
    pub fn parse<T: std::str::FromStr>(
        &self,
        name: &str,
        message: &str,
    ) -> Result<Option<T>, AppError> {
        self.text(name)
            .map(|v| v.parse::<T>().map_err(|_| AppError::field(name, message)))
            .transpose()
    }

    pub fn flag(&self, name: &str) -> bool {
        self.text(name)
            .is_some_and(|v| v.eq_ignore_ascii_case("true") || v == "1")
    }

    /// File parts sent as `name` or `name[]`
    pub fn take_files(&mut self, name: &str) -> Vec<FilePart> {
        let array_name = format!("{name}[]");
        let (matched, rest): (Vec<_>, Vec<_>) = std::mem::take(&mut self.files)
            .into_iter()
            .partition(|(field, _)| field == name || *field == array_name);
        self.files = rest;
        matched.into_iter().map(|(_, part)| part).collect()
    }
}

/// Write every part to storage; on failure the files already written are removed
pub async fn store_files(
    uploads: &UploadStorage,
    kind: UploadKind,
    parts: Vec<FilePart>,
) -> Result<Vec<String>, AppError> {
    let mut saved = Vec::with_capacity(parts.len());
    for part in parts {
        match uploads
            .save(
                kind,
                part.file_name.as_deref(),
                part.content_type.as_deref(),
                &part.bytes,
            )
            .await
        {
            Ok(name) => saved.push(name),
            Err(e) => {
                uploads.remove_all(kind, &saved).await;
                return Err(e);
            }
        }
    }
    Ok(saved)
}

fn multipart_error(e: MultipartError) -> AppError {
    if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
        return AppError::with_message(
            ErrorCode::FileTooLarge,
            format!("File too large. Maximum size is {}MB", MAX_FILE_SIZE / 1024 / 1024),
        );
    }
    AppError::validation(e.body_text())
}
