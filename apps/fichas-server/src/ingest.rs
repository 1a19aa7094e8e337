//! Upload normalization
//!
//! Every file entering the pipeline (scans from the client, re-encoded bands
//! on their way to the object store) goes through one canonical
//! representation, `UploadFile`.

use axum::body::Bytes;

use crate::error::FichaError;

/// Upload as received: name and MIME type may be missing
#[derive(Debug, Clone)]
pub struct RawUpload {
    pub bytes: Bytes,
    pub file_name: Option<String>,
    pub mime_type: Option<String>,
}

/// Canonical uploadable file
#[derive(Debug, Clone)]
pub struct UploadFile {
    pub bytes: Bytes,
    pub file_name: String,
    pub mime_type: String,
}

impl RawUpload {
    pub fn new(bytes: impl Into<Bytes>, file_name: Option<String>, mime_type: Option<String>) -> Self {
        Self {
            bytes: bytes.into(),
            file_name,
            mime_type,
        }
    }

    /// Resolve name and MIME type into an `UploadFile`.
    ///
    /// MIME resolution order: declared type, extension of the file name,
    /// then sniffing the leading bytes. Anything that is not `image/*` is
    /// rejected.
    pub fn normalize(self, position: usize) -> Result<UploadFile, FichaError> {
        if self.bytes.is_empty() {
            return Err(FichaError::Validation(format!(
                "Upload #{} is empty",
                position + 1
            )));
        }

        let file_name = self
            .file_name
            .map(|n| n.trim().to_string())
            .filter(|n| !n.is_empty())
            .unwrap_or_else(|| format!("upload-{}", position + 1));

        let mime_type = self
            .mime_type
            .filter(|m| !m.is_empty() && m != "application/octet-stream")
            .or_else(|| {
                mime_guess::from_path(&file_name)
                    .first()
                    .map(|m| m.essence_str().to_string())
            })
            .filter(|m| m.starts_with("image/"))
            .or_else(|| {
                image::guess_format(&self.bytes)
                    .ok()
                    .map(|f| f.to_mime_type().to_string())
            })
            .unwrap_or_else(|| "application/octet-stream".to_string());

        if !mime_type.starts_with("image/") {
            return Err(FichaError::Validation(format!(
                "{} is not an image ({})",
                file_name, mime_type
            )));
        }

        Ok(UploadFile {
            bytes: self.bytes,
            file_name,
            mime_type,
        })
    }
}

impl UploadFile {
    pub fn new(bytes: impl Into<Bytes>, file_name: impl Into<String>, mime_type: impl Into<String>) -> Self {
        Self {
            bytes: bytes.into(),
            file_name: file_name.into(),
            mime_type: mime_type.into(),
        }
    }

    pub fn size(&self) -> usize {
        self.bytes.len()
    }
}

/// Normalize a whole batch; the first invalid file aborts the batch
pub fn normalize_all(uploads: Vec<RawUpload>) -> Result<Vec<UploadFile>, FichaError> {
    uploads
        .into_iter()
        .enumerate()
        .map(|(position, upload)| upload.normalize(position))
        .collect()
}
