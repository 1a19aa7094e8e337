//! OCR Module
//!
//! Reads the information band of each ficha and pulls out `nome` and
//! `registro`.
//!
//! Supports multiple backends, tried in configured order:
//! - Tesseract (local CLI, language data fetched on demand)
//! - Ollama vision models (local LLM)

mod extract;
mod provider;
mod service;
mod tessdata;
mod types;

pub use extract::extract_fields;
pub use provider::{OcrProviderTrait, OllamaProvider, TesseractProvider};
pub use service::{OcrService, OcrServiceConfig, Recognition};
pub use tessdata::{validate_language, TessdataStore};
pub use types::{ExtractedFields, OcrError, OcrProvider, OcrResult};

#[cfg(test)]
pub use provider::MockProvider;
