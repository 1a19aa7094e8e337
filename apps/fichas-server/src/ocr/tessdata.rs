//! Tesseract language data
//!
//! Makes sure `<lang>.traineddata` is present in the tessdata directory,
//! downloading missing files from the configured repository.

use std::path::{Path, PathBuf};

use tokio::sync::Mutex;

use super::types::OcrError;

/// Tessdata directory with on-demand downloads
pub struct TessdataStore {
    dir: PathBuf,
    base_url: String,
    client: reqwest::Client,
    /// Serializes downloads so concurrent OCR units fetch a file once
    download_lock: Mutex<()>,
}

/// Reject anything that is not a plain tesseract language code
/// (`por`, `chi_sim`, `por+eng`)
pub fn validate_language(lang: &str) -> Result<(), OcrError> {
    if lang.is_empty() || lang.len() > 32 {
        return Err(OcrError::InvalidLanguage(format!(
            "Invalid language code length: {}",
            lang.len()
        )));
    }
    if let Some(c) = lang
        .chars()
        .find(|c| !c.is_ascii_alphanumeric() && *c != '+' && *c != '_')
    {
        return Err(OcrError::InvalidLanguage(format!(
            "Invalid character in language code: {}",
            c
        )));
    }
    if lang.split('+').any(str::is_empty) {
        return Err(OcrError::InvalidLanguage(lang.to_string()));
    }
    Ok(())
}

impl TessdataStore {
    pub fn new(dir: impl Into<PathBuf>, base_url: impl Into<String>) -> Self {
        Self {
            dir: dir.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client: reqwest::Client::new(),
            download_lock: Mutex::new(()),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn traineddata_path(&self, lang: &str) -> PathBuf {
        self.dir.join(format!("{}.traineddata", lang))
    }

    /// Ensure data for every language in `lang` is on disk and return the
    /// tessdata directory
    pub async fn ensure(&self, lang: &str) -> Result<&Path, OcrError> {
        validate_language(lang)?;

        let _guard = self.download_lock.lock().await;

        for code in lang.split('+') {
            let path = self.traineddata_path(code);
            if tokio::fs::try_exists(&path).await.unwrap_or(false) {
                continue;
            }
            self.download(code, &path).await?;
        }

        Ok(&self.dir)
    }

    async fn download(&self, code: &str, path: &Path) -> Result<(), OcrError> {
        let url = format!("{}/{}.traineddata", self.base_url, code);
        tracing::info!(language = code, %url, "Downloading language data");

        tokio::fs::create_dir_all(&self.dir).await.map_err(|e| {
            OcrError::LanguageData(format!("Failed to create {}: {}", self.dir.display(), e))
        })?;

        let response = self
            .client
            .get(&url)
            .header("User-Agent", "fichas-server")
            .send()
            .await
            .map_err(|e| OcrError::LanguageData(format!("Failed to fetch {}: {}", url, e)))?;

        if !response.status().is_success() {
            return Err(OcrError::LanguageData(format!(
                "Failed to download {}.traineddata: HTTP {}",
                code,
                response.status()
            )));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| OcrError::LanguageData(format!("Failed to read {}: {}", url, e)))?;

        // Write beside the target and rename so a partial file is never picked up
        let partial = path.with_extension("traineddata.part");
        tokio::fs::write(&partial, &bytes)
            .await
            .map_err(|e| OcrError::LanguageData(format!("Failed to write language data: {}", e)))?;
        tokio::fs::rename(&partial, path)
            .await
            .map_err(|e| OcrError::LanguageData(format!("Failed to install language data: {}", e)))?;

        tracing::info!(language = code, size = bytes.len(), "Language data installed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{routing::get, Router};

    #[test]
    fn test_validate_language() {
        assert!(validate_language("por").is_ok());
        assert!(validate_language("chi_sim+eng").is_ok());
        assert!(validate_language("").is_err());
        assert!(validate_language("por+").is_err());
        assert!(validate_language("../etc").is_err());
        assert!(validate_language("por --psm").is_err());
    }

    #[tokio::test]
    async fn test_existing_data_is_not_downloaded() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("por.traineddata"), b"data").unwrap();

        // Unroutable base URL: any download attempt would fail
        let store = TessdataStore::new(dir.path(), "http://127.0.0.1:9");
        let resolved = store.ensure("por").await.unwrap();
        assert_eq!(resolved, dir.path());
    }

    #[tokio::test]
    async fn test_missing_data_is_downloaded() {
        let app = Router::new().route("/por.traineddata", get(|| async { "trained" }));
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        let dir = tempfile::tempdir().unwrap();
        let store = TessdataStore::new(dir.path().join("tessdata"), format!("http://{}/", addr));
        store.ensure("por").await.unwrap();

        let written = std::fs::read(store.traineddata_path("por")).unwrap();
        assert_eq!(written, b"trained");
    }

    #[tokio::test]
    async fn test_failed_download_is_language_data_error() {
        let app = Router::new();
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        let dir = tempfile::tempdir().unwrap();
        let store = TessdataStore::new(dir.path(), format!("http://{}", addr));
        let result = store.ensure("xyz").await;
        assert!(matches!(result, Err(OcrError::LanguageData(_))));
        assert!(!store.traineddata_path("xyz").exists());
    }
}
