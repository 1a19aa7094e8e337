//! OCR Service
//!
//! Orchestrates OCR providers for ficha information bands.

use std::sync::Arc;

use super::{
    extract::extract_fields,
    provider::{OcrProviderTrait, OllamaProvider, TesseractProvider},
    tessdata::TessdataStore,
    types::{ExtractedFields, OcrError, OcrProvider, OcrResult},
};
use crate::config::OcrConfig;

/// OCR service configuration
pub struct OcrServiceConfig {
    /// Preferred provider order
    pub providers: Vec<OcrProvider>,
    /// Tesseract executable
    pub tesseract_path: std::path::PathBuf,
    /// Tessdata directory and download source
    pub tessdata_dir: std::path::PathBuf,
    pub tessdata_url: String,
    /// Ollama base URL
    pub ollama_url: String,
    /// Ollama model name
    pub ollama_model: String,
    /// Default OCR language
    pub default_language: String,
}

impl OcrServiceConfig {
    pub fn from_config(config: &OcrConfig) -> Self {
        let providers = config
            .providers
            .iter()
            .filter_map(|name| match name.parse::<OcrProvider>() {
                Ok(provider) => Some(provider),
                Err(e) => {
                    tracing::warn!("Ignoring OCR provider '{}': {}", name, e);
                    None
                }
            })
            .collect();

        Self {
            providers,
            tesseract_path: config.tesseract_path.clone(),
            tessdata_dir: config.tessdata_dir.clone(),
            tessdata_url: config.tessdata_url.clone(),
            ollama_url: config.ollama_url.clone(),
            ollama_model: config.ollama_model.clone(),
            default_language: config.language.clone(),
        }
    }
}

/// Text recognition plus field extraction
pub struct OcrService {
    default_language: String,
    providers: Vec<Arc<dyn OcrProviderTrait>>,
}

/// Recognized text with the fields extracted from it
#[derive(Debug, Clone)]
pub struct Recognition {
    pub result: OcrResult,
    pub fields: ExtractedFields,
}

impl OcrService {
    /// Create a new OCR service
    pub fn new(config: OcrServiceConfig) -> Self {
        let mut providers: Vec<Arc<dyn OcrProviderTrait>> = Vec::new();
        let tessdata = Arc::new(TessdataStore::new(
            config.tessdata_dir.clone(),
            config.tessdata_url.clone(),
        ));

        for provider in &config.providers {
            match provider {
                OcrProvider::Tesseract => providers.push(Arc::new(
                    TesseractProvider::new(config.tesseract_path.clone())
                        .with_tessdata(tessdata.clone()),
                )),
                OcrProvider::Ollama => providers.push(Arc::new(OllamaProvider::new(
                    &config.ollama_url,
                    &config.ollama_model,
                ))),
            }
        }

        Self {
            default_language: config.default_language,
            providers,
        }
    }

    /// Build a service over explicit providers
    pub fn with_providers(
        providers: Vec<Arc<dyn OcrProviderTrait>>,
        default_language: &str,
    ) -> Self {
        Self {
            default_language: default_language.to_string(),
            providers,
        }
    }

    pub fn default_language(&self) -> &str {
        &self.default_language
    }

    /// Get available providers
    pub async fn available_providers(&self) -> Vec<OcrProvider> {
        let mut available = Vec::new();
        for provider in &self.providers {
            if provider.is_available().await {
                available.push(provider.provider_type());
            }
        }
        available
    }

    /// Perform OCR, trying providers in configured order
    pub async fn recognize(
        &self,
        image_data: &[u8],
        language: Option<&str>,
    ) -> Result<OcrResult, OcrError> {
        let lang = language.unwrap_or(&self.default_language);
        let mut last_error = None;

        for provider in &self.providers {
            if !provider.is_available().await {
                tracing::debug!("OCR provider {:?} not available, skipping", provider.provider_type());
                continue;
            }

            match provider.recognize(image_data, lang).await {
                Ok(result) => return Ok(result),
                Err(e) => {
                    tracing::warn!(
                        "OCR provider {:?} failed: {}, trying next",
                        provider.provider_type(),
                        e
                    );
                    last_error = Some(e);
                }
            }
        }

        Err(last_error.unwrap_or_else(|| {
            OcrError::ProviderNotAvailable("No OCR providers available".to_string())
        }))
    }

    /// Recognize an information band and extract its fields
    pub async fn recognize_fields(
        &self,
        image_data: &[u8],
        language: Option<&str>,
    ) -> Result<Recognition, OcrError> {
        let result = self.recognize(image_data, language).await?;
        let fields = extract_fields(&result.text);
        Ok(Recognition { result, fields })
    }
}
