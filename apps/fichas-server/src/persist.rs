//! Persistence Orchestrator
//!
//! Saves composites one at a time: re-encode both bands, upload them, then
//! create the record. Each composite succeeds or fails on its own and a
//! saved composite is never uploaded again, so a save can simply be re-run
//! after fixing whatever failed.

use serde::Serialize;

use crate::error::FichaError;
use crate::imaging::{reencode_in_background, StorageEncoding};
use crate::ingest::UploadFile;
use crate::notify::Notifier;
use crate::progress::{BatchRun, Operation, ProgressSlot};
use crate::records::{CreatedFicha, NewFichaRecord, RecordSink};
use crate::storage::ObjectStore;
use crate::workspace::{Classification, Composite, SharedWorkspace};

/// Reason recorded for composites without both fields
pub const MISSING_FIELDS_REASON: &str = "missing name or registration";

/// Collaborators of a save run
pub struct SaveContext<'a> {
    pub store: &'a dyn ObjectStore,
    pub records: &'a dyn RecordSink,
    pub encoding: StorageEncoding,
    pub progress: &'a ProgressSlot,
    pub notifier: &'a Notifier,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SaveFailure {
    pub ficha_id: String,
    pub reason: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SaveReport {
    pub total: usize,
    /// Includes composites that were already saved
    pub succeeded: usize,
    pub failed: usize,
    /// Already saved before this run
    pub skipped: usize,
    pub failures: Vec<SaveFailure>,
    pub workspace_cleared: bool,
}

/// Save every composite of the workspace, in order
pub async fn save_all(workspace: &SharedWorkspace, ctx: &SaveContext<'_>) -> SaveReport {
    let (composites, classification) = {
        let guard = workspace.read().await;
        (
            guard.composites().to_vec(),
            guard.settings().classification.clone(),
        )
    };

    let mut report = SaveReport {
        total: composites.len(),
        ..SaveReport::default()
    };

    if composites.is_empty() {
        ctx.notifier.info("No fichas to save");
        return report;
    }

    let run = BatchRun::start(ctx.progress, Operation::Save, composites.len());

    for composite in &composites {
        if composite.is_saved() {
            report.succeeded += 1;
            report.skipped += 1;
            run.record_completion();
            continue;
        }

        if !composite.has_required_fields() {
            ctx.notifier.ficha_error(
                &composite.id,
                format!("Ficha {}: {}", composite.id, MISSING_FIELDS_REASON),
            );
            report.failed += 1;
            report.failures.push(SaveFailure {
                ficha_id: composite.id.clone(),
                reason: MISSING_FIELDS_REASON.to_string(),
            });
            run.record_completion();
            continue;
        }

        match save_one(composite, &classification, ctx).await {
            Ok(created) => {
                workspace.write().await.mark_saved(&composite.id);
                tracing::info!(
                    ficha_id = %composite.id,
                    record_id = ?created.id_ficha,
                    "Ficha saved"
                );
                report.succeeded += 1;
            }
            Err(e) => {
                tracing::error!(ficha_id = %composite.id, "Failed to save ficha: {}", e);
                report.failed += 1;
                report.failures.push(SaveFailure {
                    ficha_id: composite.id.clone(),
                    reason: e.to_string(),
                });
            }
        }
        run.record_completion();
    }

    let elapsed = run.finish();
    tracing::info!(
        total = report.total,
        succeeded = report.succeeded,
        failed = report.failed,
        skipped = report.skipped,
        elapsed = ?elapsed,
        "Save finished"
    );

    if report.succeeded > 0 {
        ctx.notifier
            .success(format!("{} fichas saved", report.succeeded));
    }
    if report.failed > 0 {
        ctx.notifier
            .error(format!("{} fichas could not be saved", report.failed));
    }

    if report.succeeded == report.total {
        workspace.write().await.reset();
        report.workspace_cleared = true;
    }

    report
}

/// Upload both bands of one composite and create its record
async fn save_one(
    composite: &Composite,
    classification: &Classification,
    ctx: &SaveContext<'_>,
) -> Result<CreatedFicha, FichaError> {
    let encoding = ctx.encoding;

    let frente = reencode_in_background(composite.information_band.clone(), encoding).await?;
    let verso = reencode_in_background(composite.fingerprint_band.clone(), encoding).await?;

    let frente = ctx
        .store
        .put_object(band_file(&composite.id, "frente", frente, encoding))
        .await?;
    let verso = ctx
        .store
        .put_object(band_file(&composite.id, "verso", verso, encoding))
        .await?;

    let record = NewFichaRecord {
        nome: trimmed(&composite.extracted_name),
        registro: trimmed(&composite.extracted_registration),
        ocr_ficha: composite.recognized_text.clone().unwrap_or_default(),
        imagem_frente_ficha: frente.file_url,
        imagem_verso_ficha: verso.file_url,
        class_polegar_esq: classification.class_polegar_esq.clone(),
        class_polegar_dir: classification.class_polegar_dir.clone(),
        frente_object_name: frente.object_name,
        verso_object_name: verso.object_name,
    };

    Ok(ctx.records.create(record).await?)
}

fn band_file(id: &str, side: &str, data: Vec<u8>, encoding: StorageEncoding) -> UploadFile {
    UploadFile::new(
        data,
        format!("{}-{}.{}", id, side, encoding.extension()),
        encoding.content_type(),
    )
}

fn trimmed(value: &Option<String>) -> String {
    value.as_deref().map(str::trim).unwrap_or_default().to_string()
}
