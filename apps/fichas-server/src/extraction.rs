//! OCR over composites
//!
//! Single-ficha extraction plus the batched "extract all" run. The workspace
//! lock is never held while a provider is working; each unit snapshots its
//! band, recognizes, then writes back to its own composite by id.

use serde::Serialize;

use crate::error::FichaError;
use crate::notify::Notifier;
use crate::ocr::OcrService;
use crate::progress::{run_in_batches, BatchRun, Operation, ProgressSlot};
use crate::workspace::{CompositeSummary, ProcessingState, SharedWorkspace};

/// Result of an extract-all run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractReport {
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
}

/// Run OCR on one composite's information band and store text and fields
pub async fn extract_ficha(
    workspace: &SharedWorkspace,
    ocr: &OcrService,
    notifier: &Notifier,
    id: &str,
    language: Option<&str>,
) -> Result<CompositeSummary, FichaError> {
    let band = {
        let mut guard = workspace.write().await;
        match guard.composite(id) {
            None => {
                return Err(FichaError::Validation(format!("Ficha {} does not exist", id)));
            }
            Some(composite) if composite.is_saved() => {
                return Err(FichaError::Validation(format!("Ficha {} is already saved", id)));
            }
            Some(_) => {}
        }
        guard
            .update_composite(id, |composite| {
                composite.processing_state = ProcessingState::Extracting;
                composite.information_band.clone()
            })
            .ok_or_else(|| FichaError::Validation(format!("Ficha {} does not exist", id)))?
    };

    tracing::debug!(ficha_id = %id, "Extracting text");

    match ocr.recognize_fields(&band, language).await {
        Ok(recognition) => {
            let summary = workspace.write().await.update_composite(id, |composite| {
                composite.recognized_text = Some(recognition.result.text);
                composite.extracted_name = recognition.fields.nome;
                composite.extracted_registration = recognition.fields.registro;
                composite.processing_state = ProcessingState::Idle;
                composite.summary()
            });

            // A reset while OCR was running removes the composite
            let summary = summary
                .ok_or_else(|| FichaError::Validation(format!("Ficha {} was removed", id)))?;

            tracing::info!(
                ficha_id = %id,
                provider = ?recognition.result.provider,
                has_nome = summary.nome.is_some(),
                has_registro = summary.registro.is_some(),
                "Text extracted"
            );
            notifier.ficha_success(id, format!("Ficha {} processed", id));
            Ok(summary)
        }
        Err(source) => {
            workspace.write().await.update_composite(id, |composite| {
                composite.processing_state = ProcessingState::Idle;
            });
            notifier.ficha_error(id, format!("Failed to extract text from {}: {}", id, source));
            Err(FichaError::Extraction {
                id: id.to_string(),
                source,
            })
        }
    }
}

/// Extract every unsaved composite in concurrent batches of `batch_size`.
///
/// A failing unit is counted and reported; its siblings carry on.
pub async fn extract_all(
    workspace: &SharedWorkspace,
    ocr: &OcrService,
    progress: &ProgressSlot,
    notifier: &Notifier,
    batch_size: usize,
) -> ExtractReport {
    let ids: Vec<String> = workspace
        .read()
        .await
        .composites()
        .iter()
        .filter(|c| !c.is_saved())
        .map(|c| c.id.clone())
        .collect();

    let total = ids.len();
    if total == 0 {
        notifier.info("No fichas to extract");
        return ExtractReport::default();
    }

    let run = BatchRun::start(progress, Operation::Extract, total);

    let outcomes = run_in_batches(
        ids,
        batch_size,
        &run,
        |id| async move { extract_ficha(workspace, ocr, notifier, &id, None).await },
        |p| {
            notifier.info(format!(
                "Processed batch {} of {} ({}/{} fichas)",
                p.batch, p.total_batches, p.completed, total
            ))
        },
    )
    .await;

    let elapsed = run.finish();
    let succeeded = outcomes.iter().filter(|o| o.is_ok()).count();
    let report = ExtractReport {
        total,
        succeeded,
        failed: total - succeeded,
    };

    tracing::info!(
        total,
        succeeded,
        failed = report.failed,
        elapsed = ?elapsed,
        "Extraction finished"
    );

    if report.succeeded > 0 {
        notifier.success(format!("Text extracted from {} fichas", report.succeeded));
    }
    if report.failed > 0 {
        notifier.error(format!("{} fichas could not be read", report.failed));
    }

    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ocr::{MockProvider, OcrProviderTrait};
    use crate::workspace::{Composite, Workspace};
    use axum::body::Bytes;
    use std::sync::Arc;

    fn shared_with(count: usize) -> SharedWorkspace {
        let mut workspace = Workspace::new();
        let composites = (0..count)
            .map(|i| Composite::new(i / 3, i % 3, Bytes::new(), Bytes::from_static(b"band")))
            .collect();
        workspace.replace_composites(composites, std::time::Duration::ZERO);
        Arc::new(tokio::sync::RwLock::new(workspace))
    }

    fn service(provider: MockProvider) -> (OcrService, Arc<MockProvider>) {
        let provider = Arc::new(provider);
        let service = OcrService::with_providers(
            vec![provider.clone() as Arc<dyn OcrProviderTrait>],
            "por",
        );
        (service, provider)
    }

    #[tokio::test]
    async fn test_extract_fills_fields() {
        let workspace = shared_with(1);
        let (ocr, _) = service(MockProvider::returning("Nome: JOAO SILVA\nRegistro: 12345\n"));
        let notifier = Notifier::new();

        let summary = extract_ficha(&workspace, &ocr, &notifier, "ficha-0-0", None)
            .await
            .unwrap();

        assert_eq!(summary.nome.as_deref(), Some("JOAO SILVA"));
        assert_eq!(summary.registro.as_deref(), Some("12345"));
        assert_eq!(summary.processing_state, ProcessingState::Idle);
        let guard = workspace.read().await;
        assert!(guard.composite("ficha-0-0").unwrap().has_required_fields());

        let feed = notifier.drain();
        assert_eq!(feed.len(), 1);
        assert_eq!(feed[0].level, crate::notify::NotificationLevel::Success);
        assert_eq!(feed[0].ficha_id.as_deref(), Some("ficha-0-0"));
    }

    #[tokio::test]
    async fn test_missing_label_leaves_field_empty() {
        let workspace = shared_with(1);
        let (ocr, _) = service(MockProvider::returning("Registro: 9\n"));

        let summary = extract_ficha(&workspace, &ocr, &Notifier::new(), "ficha-0-0", None)
            .await
            .unwrap();

        assert_eq!(summary.nome, None);
        assert_eq!(summary.registro.as_deref(), Some("9"));
    }

    #[tokio::test]
    async fn test_reprocess_replaces_previous_values() {
        let workspace = shared_with(1);
        workspace.write().await.update_composite("ficha-0-0", |c| {
            c.recognized_text = Some("old".into());
            c.extracted_name = Some("OLD".into());
            c.extracted_registration = Some("1".into());
        });
        let (ocr, _) = service(MockProvider::returning("Nome: NEW\n"));

        let summary = extract_ficha(&workspace, &ocr, &Notifier::new(), "ficha-0-0", None)
            .await
            .unwrap();

        assert_eq!(summary.nome.as_deref(), Some("NEW"));
        assert_eq!(summary.registro, None);
    }

    #[tokio::test]
    async fn test_failure_resets_state_and_notifies() {
        let workspace = shared_with(1);
        let (ocr, _) = service(MockProvider::failing());
        let notifier = Notifier::new();

        let result = extract_ficha(&workspace, &ocr, &notifier, "ficha-0-0", None).await;

        assert!(matches!(result, Err(FichaError::Extraction { ref id, .. }) if id == "ficha-0-0"));
        let guard = workspace.read().await;
        assert_eq!(
            guard.composite("ficha-0-0").unwrap().processing_state,
            ProcessingState::Idle
        );
        let feed = notifier.drain();
        assert_eq!(feed[0].ficha_id.as_deref(), Some("ficha-0-0"));
    }

    #[tokio::test]
    async fn test_unknown_ficha() {
        let workspace = shared_with(1);
        let (ocr, provider) = service(MockProvider::returning("x"));

        let result = extract_ficha(&workspace, &ocr, &Notifier::new(), "ficha-9-9", None).await;

        assert!(matches!(result, Err(FichaError::Validation(_))));
        assert_eq!(provider.call_count(), 0);
    }

    #[tokio::test]
    async fn test_extract_all_processes_every_composite() {
        let workspace = shared_with(7);
        let (ocr, provider) = service(MockProvider::returning("Nome: A\nRegistro: 1\n"));
        let slot = ProgressSlot::new();
        let notifier = Notifier::new();

        let report = extract_all(&workspace, &ocr, &slot, &notifier, 5).await;

        assert_eq!(
            report,
            ExtractReport {
                total: 7,
                succeeded: 7,
                failed: 0
            }
        );
        assert_eq!(provider.call_count(), 7);
        assert!(slot.snapshot().is_none());
        assert!(workspace
            .read()
            .await
            .composites()
            .iter()
            .all(|c| c.has_required_fields()));

        let batches = notifier
            .drain()
            .into_iter()
            .filter(|n| n.message.starts_with("Processed batch"))
            .count();
        assert_eq!(batches, 2);
    }

    #[tokio::test]
    async fn test_saved_fichas_keep_their_fields() {
        let workspace = shared_with(2);
        {
            let mut guard = workspace.write().await;
            guard.update_composite("ficha-0-0", |c| {
                c.extracted_name = Some("FIRST".into());
                c.extracted_registration = Some("1".into());
            });
            guard.mark_saved("ficha-0-0");
        }
        let (ocr, provider) = service(MockProvider::returning("Nome: SECOND\nRegistro: 2\n"));
        let notifier = Notifier::new();

        let single = extract_ficha(&workspace, &ocr, &notifier, "ficha-0-0", None).await;
        assert!(matches!(single, Err(FichaError::Validation(_))));

        let report = extract_all(&workspace, &ocr, &ProgressSlot::new(), &notifier, 5).await;
        assert_eq!(report.total, 1);
        assert_eq!(provider.call_count(), 1);

        let guard = workspace.read().await;
        let saved = guard.composite("ficha-0-0").unwrap();
        assert_eq!(saved.extracted_name.as_deref(), Some("FIRST"));
        assert_eq!(saved.extracted_registration.as_deref(), Some("1"));
        let other = guard.composite("ficha-0-1").unwrap();
        assert_eq!(other.extracted_name.as_deref(), Some("SECOND"));
    }

    #[tokio::test]
    async fn test_extract_all_counts_failures() {
        let workspace = shared_with(3);
        let (ocr, _) = service(MockProvider::failing());
        let slot = ProgressSlot::new();

        let report = extract_all(&workspace, &ocr, &slot, &Notifier::new(), 5).await;

        assert_eq!(report.failed, 3);
        assert_eq!(report.succeeded, 0);
        assert!(workspace
            .read()
            .await
            .composites()
            .iter()
            .all(|c| c.processing_state == ProcessingState::Idle));
    }
}
