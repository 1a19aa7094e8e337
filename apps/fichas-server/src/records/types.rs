//! Record types

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Record API errors
#[derive(Error, Debug)]
pub enum RecordError {
    #[error("Record rejected ({status}): {message}")]
    Rejected { status: u16, message: String },

    #[error("Record request failed: {0}")]
    Transport(String),

    #[error("Invalid record response: {0}")]
    InvalidResponse(String),
}

/// Fields sent to the record-create endpoint
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NewFichaRecord {
    pub nome: String,
    pub registro: String,
    pub ocr_ficha: String,
    /// URL of the information band
    pub imagem_frente_ficha: String,
    /// URL of the fingerprint band
    pub imagem_verso_ficha: String,
    pub class_polegar_esq: String,
    pub class_polegar_dir: String,
    pub frente_object_name: String,
    pub verso_object_name: String,
}

impl NewFichaRecord {
    /// Form fields in the order the endpoint documents them
    pub fn form_fields(&self) -> [(&'static str, &str); 9] {
        [
            ("nome", self.nome.as_str()),
            ("registro", self.registro.as_str()),
            ("ocr_ficha", self.ocr_ficha.as_str()),
            ("imagem_frente_ficha", self.imagem_frente_ficha.as_str()),
            ("imagem_verso_ficha", self.imagem_verso_ficha.as_str()),
            ("class_polegar_esq", self.class_polegar_esq.as_str()),
            ("class_polegar_dir", self.class_polegar_dir.as_str()),
            ("frente_object_name", self.frente_object_name.as_str()),
            ("verso_object_name", self.verso_object_name.as_str()),
        ]
    }
}

/// Summary of the record the endpoint created
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreatedFicha {
    #[serde(default)]
    pub id_ficha: Option<i64>,
    pub nome: String,
    pub registro: String,
}

/// Destination for ficha records
#[async_trait]
pub trait RecordSink: Send + Sync {
    async fn create(&self, record: NewFichaRecord) -> Result<CreatedFicha, RecordError>;
}

#[cfg(test)]
pub use mock::MockSink;
