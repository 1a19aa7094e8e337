//! Object storage for band images
//!
//! Two backends behind one trait:
//! - the remote upload API (multipart POST), used by default
//! - direct writes to an S3-compatible bucket (MinIO, R2, AWS S3)

mod api_client;
mod s3_store;
mod types;

pub use api_client::UploadApiClient;
pub(crate) use api_client::ErrorBody;
pub use s3_store::S3ObjectStore;
pub use types::*;
