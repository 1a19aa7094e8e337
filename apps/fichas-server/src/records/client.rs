//! HTTP client for the record-create endpoint

use async_trait::async_trait;
use reqwest::multipart::Form;
use serde::Deserialize;

use super::types::{CreatedFicha, NewFichaRecord, RecordError, RecordSink};
use crate::storage::ErrorBody;

/// Posts records as multipart form data
pub struct RecordApiClient {
    url: String,
    client: reqwest::Client,
}

#[derive(Debug, Deserialize)]
struct CreateResponse {
    #[serde(default)]
    success: Option<bool>,
    ficha: Option<CreatedFicha>,
}

impl RecordApiClient {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl RecordSink for RecordApiClient {
    async fn create(&self, record: NewFichaRecord) -> Result<CreatedFicha, RecordError> {
        let form = record
            .form_fields()
            .into_iter()
            .fold(Form::new(), |form, (name, value)| {
                form.text(name, value.to_string())
            });

        let response = self
            .client
            .post(&self.url)
            .multipart(form)
            .send()
            .await
            .map_err(|e| RecordError::Transport(e.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| RecordError::Transport(e.to_string()))?;

        if !status.is_success() {
            return Err(RecordError::Rejected {
                status: status.as_u16(),
                message: ErrorBody::message_from(&body),
            });
        }

        let parsed: CreateResponse = serde_json::from_str(&body)
            .map_err(|e| RecordError::InvalidResponse(e.to_string()))?;

        if parsed.success == Some(false) {
            return Err(RecordError::Rejected {
                status: status.as_u16(),
                message: ErrorBody::message_from(&body),
            });
        }

        // Some deployments answer with an empty body; echo what was sent
        Ok(parsed.ficha.unwrap_or(CreatedFicha {
            id_ficha: None,
            nome: record.nome,
            registro: record.registro,
        }))
    }
}
