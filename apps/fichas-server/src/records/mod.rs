//! Record-create API
//!
//! Once both bands of a ficha are in object storage, its metadata is
//! registered through the external record-create endpoint.

mod client;
mod types;

pub use client::RecordApiClient;
pub use types::*;
