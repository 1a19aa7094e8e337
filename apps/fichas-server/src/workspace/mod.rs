//! Workspace Module
//!
//! The in-memory state of one processing session: uploaded scans, the
//! composites built from them, and user settings. All mutation goes through
//! `Workspace` methods; the server shares it as `SharedWorkspace`.

mod store;
mod types;

pub use store::{SharedWorkspace, Workspace, WorkspaceSettings};
pub use types::*;
