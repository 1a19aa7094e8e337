//! Fichas Server Library
//!
//! Batch processing of scanned identity-record cards ("fichas"): uploads are
//! paired and split into bands, OCR pulls out name and registration, and
//! finished fichas are saved to object storage and the record API.
//!
//! # Modules
//!
//! - `imaging`: band splitting and storage re-encoding
//! - `pairing`: pairs uploads and builds composites
//! - `ocr`: text recognition and field extraction
//! - `progress`: batch timing and concurrent batching
//! - `persist`: saving composites
//! - `routes`: HTTP surface over the workspace

pub mod config;
pub mod error;
pub mod extraction;
pub mod imaging;
pub mod ingest;
pub mod notify;
pub mod ocr;
pub mod pairing;
pub mod persist;
pub mod progress;
pub mod records;
pub mod routes;
pub mod state;
pub mod storage;
pub mod workspace;
