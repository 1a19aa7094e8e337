//! Workspace types

use axum::body::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ingest::UploadFile;

// ============================================================================
// Uploaded scans
// ============================================================================

/// What a scanned sheet contains
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScanType {
    /// Sheet of fingerprint boxes (the "verso" of a ficha)
    Fingerprint,
    /// Sheet with the printed identity fields (the "frente")
    Information,
}

impl Default for ScanType {
    fn default() -> Self {
        Self::Fingerprint
    }
}

impl ScanType {
    pub fn other(self) -> Self {
        match self {
            Self::Fingerprint => Self::Information,
            Self::Information => Self::Fingerprint,
        }
    }

    /// Type of the upload at `position`, alternating from `first`
    pub fn for_position(first: ScanType, position: usize) -> Self {
        if position % 2 == 0 {
            first
        } else {
            first.other()
        }
    }
}

/// One uploaded scan
#[derive(Debug, Clone)]
pub struct UploadedImage {
    pub id: String,
    pub file_name: String,
    pub mime_type: String,
    pub data: Bytes,
    pub scan_type: ScanType,
    pub uploaded_at: DateTime<Utc>,
}

impl UploadedImage {
    pub fn new(id: String, file: UploadFile, scan_type: ScanType) -> Self {
        Self {
            id,
            file_name: file.file_name,
            mime_type: file.mime_type,
            data: file.bytes,
            scan_type,
            uploaded_at: Utc::now(),
        }
    }

    pub fn summary(&self) -> ImageSummary {
        ImageSummary {
            id: self.id.clone(),
            file_name: self.file_name.clone(),
            mime_type: self.mime_type.clone(),
            size: self.data.len(),
            scan_type: self.scan_type,
            uploaded_at: self.uploaded_at,
        }
    }
}

/// Uploaded scan without its bytes
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageSummary {
    pub id: String,
    pub file_name: String,
    pub mime_type: String,
    pub size: usize,
    pub scan_type: ScanType,
    pub uploaded_at: DateTime<Utc>,
}

// ============================================================================
// Composites
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProcessingState {
    Idle,
    Extracting,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SavedState {
    Unsaved,
    Saved,
}

/// Which band of a composite
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BandKind {
    Fingerprint,
    Information,
}

/// A ficha candidate: one fingerprint band and one information band taken
/// from the same band index of an image pair
#[derive(Debug, Clone)]
pub struct Composite {
    pub id: String,
    pub pair_index: usize,
    pub band_index: usize,
    pub fingerprint_band: Bytes,
    pub information_band: Bytes,
    pub recognized_text: Option<String>,
    pub extracted_name: Option<String>,
    pub extracted_registration: Option<String>,
    pub processing_state: ProcessingState,
    saved_state: SavedState,
}

impl Composite {
    pub fn new(
        pair_index: usize,
        band_index: usize,
        fingerprint_band: Bytes,
        information_band: Bytes,
    ) -> Self {
        Self {
            id: format!("ficha-{}-{}", pair_index, band_index),
            pair_index,
            band_index,
            fingerprint_band,
            information_band,
            recognized_text: None,
            extracted_name: None,
            extracted_registration: None,
            processing_state: ProcessingState::Idle,
            saved_state: SavedState::Unsaved,
        }
    }

    pub fn saved_state(&self) -> SavedState {
        self.saved_state
    }

    pub fn is_saved(&self) -> bool {
        self.saved_state == SavedState::Saved
    }

    /// One-way transition; there is no way back to `Unsaved`
    pub fn mark_saved(&mut self) {
        self.saved_state = SavedState::Saved;
    }

    pub fn band(&self, kind: BandKind) -> &Bytes {
        match kind {
            BandKind::Fingerprint => &self.fingerprint_band,
            BandKind::Information => &self.information_band,
        }
    }

    /// Both fields needed to create a record are present and non-blank
    pub fn has_required_fields(&self) -> bool {
        let filled = |v: &Option<String>| v.as_deref().map_or(false, |s| !s.trim().is_empty());
        filled(&self.extracted_name) && filled(&self.extracted_registration)
    }

    pub fn summary(&self) -> CompositeSummary {
        CompositeSummary {
            id: self.id.clone(),
            pair_index: self.pair_index,
            band_index: self.band_index,
            ocr_text: self.recognized_text.clone(),
            nome: self.extracted_name.clone(),
            registro: self.extracted_registration.clone(),
            processing_state: self.processing_state,
            saved_state: self.saved_state,
            extract_action: if self.recognized_text.is_some() {
                ExtractAction::Reprocess
            } else {
                ExtractAction::Extract
            },
            fingerprint_band_size: self.fingerprint_band.len(),
            information_band_size: self.information_band.len(),
        }
    }
}

/// Label for the extraction control of a composite
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExtractAction {
    Extract,
    Reprocess,
}

/// Composite without band bytes
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompositeSummary {
    pub id: String,
    pub pair_index: usize,
    pub band_index: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ocr_text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nome: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub registro: Option<String>,
    pub processing_state: ProcessingState,
    pub saved_state: SavedState,
    pub extract_action: ExtractAction,
    pub fingerprint_band_size: usize,
    pub information_band_size: usize,
}

// ============================================================================
// Settings
// ============================================================================

/// Which step of the flow the workspace is in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WorkspaceStage {
    /// Collecting scans
    Upload,
    /// Composites built; extracting and saving
    Process,
}

/// Thumb classification sent with every record of the batch
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Classification {
    #[serde(default, alias = "class_polegar_esq")]
    pub class_polegar_esq: String,
    #[serde(default, alias = "class_polegar_dir")]
    pub class_polegar_dir: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scan_type_alternation() {
        let first = ScanType::Information;
        assert_eq!(ScanType::for_position(first, 0), ScanType::Information);
        assert_eq!(ScanType::for_position(first, 1), ScanType::Fingerprint);
        assert_eq!(ScanType::for_position(first, 4), ScanType::Information);
    }

    #[test]
    fn test_composite_id_and_required_fields() {
        let mut composite = Composite::new(2, 1, Bytes::new(), Bytes::new());
        assert_eq!(composite.id, "ficha-2-1");
        assert!(!composite.has_required_fields());

        composite.extracted_name = Some("JOAO".into());
        composite.extracted_registration = Some("   ".into());
        assert!(!composite.has_required_fields());

        composite.extracted_registration = Some("12345".into());
        assert!(composite.has_required_fields());
    }

    #[test]
    fn test_extract_action_label() {
        let mut composite = Composite::new(0, 0, Bytes::new(), Bytes::new());
        assert_eq!(composite.summary().extract_action, ExtractAction::Extract);
        composite.recognized_text = Some(String::new());
        assert_eq!(composite.summary().extract_action, ExtractAction::Reprocess);
    }

    #[test]
    fn test_saved_is_terminal() {
        let mut composite = Composite::new(0, 0, Bytes::new(), Bytes::new());
        assert_eq!(composite.saved_state(), SavedState::Unsaved);
        composite.mark_saved();
        composite.mark_saved();
        assert!(composite.is_saved());
    }
}
