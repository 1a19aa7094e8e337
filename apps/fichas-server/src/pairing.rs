//! Pairing & Composite Builder
//!
//! Uploads are taken two at a time. Both scans of a pair are split into
//! bands and bands at the same index are combined into one composite, so a
//! pair yields up to three fichas.

use std::time::Duration;

use crate::error::FichaError;
use crate::imaging::split_in_background;
use crate::notify::Notifier;
use crate::progress::{format_duration, BatchRun, Operation, ProgressSlot};
use crate::workspace::{Composite, ScanType, SharedWorkspace, UploadedImage, Workspace};

/// Outcome of a finished split
#[derive(Debug, Clone)]
pub struct SplitSummary {
    pub pairs: usize,
    pub composites: usize,
    pub elapsed: Duration,
}

/// Check batch preconditions: an even, non-zero number of uploads and one
/// scan of each type per pair
pub fn validate_pairs(images: &[UploadedImage]) -> Result<(), FichaError> {
    if images.is_empty() {
        return Err(FichaError::Validation("No images to process".to_string()));
    }
    if images.len() % 2 != 0 {
        return Err(FichaError::Validation(format!(
            "Uploads must come in pairs; got {} images",
            images.len()
        )));
    }

    for (pair_index, pair) in images.chunks(2).enumerate() {
        if let [a, b] = pair {
            if a.scan_type == b.scan_type {
                return Err(FichaError::Validation(format!(
                    "Pair {} has two {:?} scans ({}, {})",
                    pair_index + 1,
                    a.scan_type,
                    a.file_name,
                    b.file_name
                )));
            }
        }
    }

    Ok(())
}

/// Clone the uploads out of the workspace and validate them
pub fn snapshot_for_split(workspace: &Workspace) -> Result<Vec<UploadedImage>, FichaError> {
    let images = workspace.images().to_vec();
    validate_pairs(&images)?;
    Ok(images)
}

/// Split every pair and zip same-index bands into composites.
///
/// Pairs run one after another; each finished pair counts once towards
/// `run`. A decode failure aborts the whole build.
pub async fn build_composites(
    images: Vec<UploadedImage>,
    quality: u8,
    run: &BatchRun,
    notifier: &Notifier,
) -> Result<Vec<Composite>, FichaError> {
    validate_pairs(&images)?;

    let total_pairs = images.len() / 2;
    let mut composites = Vec::with_capacity(total_pairs * crate::imaging::BAND_COUNT);

    for (pair_index, pair) in images.chunks(2).enumerate() {
        let [first, second] = pair else {
            continue;
        };

        // The scan type decides which side is which, not the upload order
        let (fingerprint, information) = if first.scan_type == ScanType::Fingerprint {
            (first, second)
        } else {
            (second, first)
        };

        let fingerprint_bands = split_in_background(fingerprint.data.clone(), quality).await?;
        let information_bands = split_in_background(information.data.clone(), quality).await?;

        composites.extend(
            fingerprint_bands
                .into_iter()
                .zip(information_bands)
                .enumerate()
                .map(|(band_index, (fp, info))| {
                    Composite::new(pair_index, band_index, fp.data, info.data)
                }),
        );

        run.record_completion();
        notifier.info(format!(
            "Processed image pair {} of {}",
            pair_index + 1,
            total_pairs
        ));
    }

    Ok(composites)
}

/// Build composites from a validated snapshot and install them in the
/// workspace
pub async fn run_split(
    images: Vec<UploadedImage>,
    workspace: &SharedWorkspace,
    progress: &ProgressSlot,
    notifier: &Notifier,
    quality: u8,
) -> Result<SplitSummary, FichaError> {
    let pairs = images.len() / 2;
    let run = BatchRun::start(progress, Operation::Split, pairs);

    let composites = match build_composites(images, quality, &run, notifier).await {
        Ok(composites) => composites,
        Err(e) => {
            tracing::error!("Image split failed: {}", e);
            notifier.error(format!("Failed to process images: {}", e));
            return Err(e);
        }
    };
    let elapsed = run.finish();

    let count = composites.len();
    workspace.write().await.replace_composites(composites, elapsed);

    tracing::info!(pairs, fichas = count, elapsed = ?elapsed, "Split finished");
    notifier.success(format!(
        "{} fichas created in {}",
        count,
        format_duration(elapsed)
    ));

    Ok(SplitSummary {
        pairs,
        composites: count,
        elapsed,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::imaging::split_tests::{dominant_channel, striped_png};
    use crate::ingest::UploadFile;
    use crate::workspace::{Workspace, WorkspaceStage};

    fn upload(name: &str, bytes: Vec<u8>) -> UploadFile {
        UploadFile::new(bytes, name, "image/png")
    }

    /// Fingerprint scans are 20px wide, information scans 40px
    fn workspace_with(types: &[ScanType]) -> Workspace {
        let mut workspace = Workspace::new();
        workspace.set_first_scan_type(types[0]);
        let files = types
            .iter()
            .enumerate()
            .map(|(i, t)| {
                let width = if *t == ScanType::Fingerprint { 20 } else { 40 };
                upload(&format!("scan-{}.png", i), striped_png(width, 30))
            })
            .collect();
        workspace.add_uploads(files);
        workspace
    }

    fn band_width(jpeg: &[u8]) -> u32 {
        image::load_from_memory(jpeg).unwrap().width()
    }

    #[tokio::test]
    async fn test_one_pair_yields_three_composites() {
        let workspace = workspace_with(&[ScanType::Fingerprint, ScanType::Information]);
        let images = snapshot_for_split(&workspace).unwrap();
        let slot = ProgressSlot::new();
        let run = BatchRun::start(&slot, Operation::Split, 1);
        let notifier = Notifier::new();

        let composites = build_composites(images, 92, &run, &notifier).await.unwrap();

        assert_eq!(composites.len(), 3);
        for (index, composite) in composites.iter().enumerate() {
            assert_eq!(composite.id, format!("ficha-0-{}", index));
            assert_eq!(band_width(&composite.fingerprint_band), 20);
            assert_eq!(band_width(&composite.information_band), 40);
            // Both bands come from the same stripe
            assert_eq!(dominant_channel(&composite.fingerprint_band), index);
            assert_eq!(dominant_channel(&composite.information_band), index);
        }
        assert_eq!(slot.snapshot().unwrap().processed_count, 1);
        assert_eq!(notifier.drain()[0].message, "Processed image pair 1 of 1");
    }

    #[tokio::test]
    async fn test_information_first_is_still_paired_by_type() {
        let workspace = workspace_with(&[ScanType::Information, ScanType::Fingerprint]);
        let images = snapshot_for_split(&workspace).unwrap();
        let slot = ProgressSlot::new();
        let run = BatchRun::start(&slot, Operation::Split, 1);

        let composites = build_composites(images, 92, &run, &Notifier::new())
            .await
            .unwrap();

        assert_eq!(band_width(&composites[0].fingerprint_band), 20);
        assert_eq!(band_width(&composites[0].information_band), 40);
    }

    #[test]
    fn test_odd_count_rejected() {
        let mut workspace = workspace_with(&[ScanType::Fingerprint, ScanType::Information]);
        workspace.add_uploads(vec![upload("extra.png", striped_png(20, 30))]);
        assert!(matches!(
            snapshot_for_split(&workspace),
            Err(FichaError::Validation(_))
        ));
    }

    #[test]
    fn test_empty_rejected() {
        assert!(matches!(
            snapshot_for_split(&Workspace::new()),
            Err(FichaError::Validation(_))
        ));
    }

    #[test]
    fn test_same_type_pair_rejected() {
        let mut images = snapshot_for_split(&workspace_with(&[
            ScanType::Fingerprint,
            ScanType::Information,
        ]))
        .unwrap();
        images[1].scan_type = ScanType::Fingerprint;
        assert!(matches!(validate_pairs(&images), Err(FichaError::Validation(_))));
    }

    #[tokio::test]
    async fn test_validation_happens_before_any_decode() {
        // Garbage bytes would be a Decode error if anything got decoded
        let mut workspace = Workspace::new();
        workspace.add_uploads(vec![
            upload("a.png", b"garbage".to_vec()),
            upload("b.png", b"garbage".to_vec()),
            upload("c.png", b"garbage".to_vec()),
        ]);
        let images = workspace.images().to_vec();
        let slot = ProgressSlot::new();
        let run = BatchRun::start(&slot, Operation::Split, 1);

        let result = build_composites(images, 92, &run, &Notifier::new()).await;
        assert!(matches!(result, Err(FichaError::Validation(_))));
    }

    #[tokio::test]
    async fn test_run_split_installs_composites() {
        let workspace = workspace_with(&[
            ScanType::Fingerprint,
            ScanType::Information,
            ScanType::Fingerprint,
            ScanType::Information,
        ]);
        let images = snapshot_for_split(&workspace).unwrap();
        let shared = SharedWorkspace::new(tokio::sync::RwLock::new(workspace));
        let slot = ProgressSlot::new();
        let notifier = Notifier::new();

        let summary = run_split(images, &shared, &slot, &notifier, 92).await.unwrap();

        assert_eq!(summary.pairs, 2);
        assert_eq!(summary.composites, 6);
        let guard = shared.read().await;
        assert_eq!(guard.stage(), WorkspaceStage::Process);
        assert_eq!(guard.composites()[5].id, "ficha-1-2");
        assert!(guard.last_split_duration().is_some());
        assert!(slot.snapshot().is_none());
    }

    #[tokio::test]
    async fn test_decode_failure_leaves_workspace_untouched() {
        let mut workspace = Workspace::new();
        workspace.add_uploads(vec![
            upload("a.png", b"garbage".to_vec()),
            upload("b.png", striped_png(20, 30)),
        ]);
        let images = snapshot_for_split(&workspace).unwrap();
        let shared = SharedWorkspace::new(tokio::sync::RwLock::new(workspace));
        let slot = ProgressSlot::new();
        let notifier = Notifier::new();

        let result = run_split(images, &shared, &slot, &notifier, 92).await;

        assert!(matches!(result, Err(FichaError::Decode(_))));
        assert!(shared.read().await.composites().is_empty());
        assert_eq!(shared.read().await.stage(), WorkspaceStage::Upload);
        assert!(slot.snapshot().is_none());
    }
}
