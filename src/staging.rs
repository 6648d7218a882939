//! Temporary-upload staging.
//!
//! Uploaded bytes are written to a uniquely-named file in the staging
//! directory for the duration of one pipeline run. Removal happens in
//! `Drop`, so the file is cleaned up on every exit path, including errors
//! partway through analysis.

use std::path::{Path, PathBuf};

use uuid::Uuid;

/// A staged upload that removes its backing file when dropped.
#[derive(Debug)]
pub struct StagedUpload {
    path: PathBuf,
}

impl StagedUpload {
    /// Write `bytes` to a fresh file under `staging_dir`.
    ///
    /// The filename is prefixed with a UUID, so concurrent uploads of the
    /// same file never collide.
    pub fn stage(staging_dir: &Path, original_name: &str, bytes: &[u8]) -> std::io::Result<Self> {
        std::fs::create_dir_all(staging_dir)?;
        let path = staging_dir.join(format!(
            "{}_{}",
            Uuid::new_v4(),
            sanitize_filename(original_name)
        ));
        std::fs::write(&path, bytes)?;
        Ok(Self { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for StagedUpload {
    fn drop(&mut self) {
        if let Err(e) = std::fs::remove_file(&self.path) {
            tracing::debug!(path = %self.path.display(), error = %e, "Staged file already gone");
        }
    }
}

/// Sanitize a client-supplied filename: strips path separators and null
/// bytes, replaces other special characters, collapses `..`, caps length.
pub fn sanitize_filename(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .filter(|&c| c != '/' && c != '\\' && c != '\0')
        .map(|c| {
            if c.is_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect();

    let cleaned = cleaned.replace("..", "");
    let cleaned: String = cleaned.chars().take(100).collect();

    if cleaned.is_empty() {
        "upload".into()
    } else {
        cleaned
    }
}

/// Best-effort MIME detection from magic bytes.
///
/// Used for logging only — the upload endpoint deliberately accepts any
/// file type and lets the OCR step fail (and fall back to the demo
/// payload) on things it cannot read.
pub fn detect_mime_from_bytes(bytes: &[u8]) -> &'static str {
    if bytes.starts_with(&[0xFF, 0xD8, 0xFF]) {
        return "image/jpeg";
    }
    if bytes.starts_with(&[0x89, 0x50, 0x4E, 0x47]) {
        return "image/png";
    }
    if bytes.len() >= 12 && bytes[..4] == *b"RIFF" && bytes[8..12] == *b"WEBP" {
        return "image/webp";
    }
    if bytes.len() >= 12 && bytes[4..8] == *b"ftyp" && (bytes[8..12] == *b"heic" || bytes[8..12] == *b"heif") {
        return "image/heic";
    }
    if bytes.starts_with(b"%PDF") {
        return "application/pdf";
    }
    "application/octet-stream"
}
