//! Google Drive and Docs access for docsgate.
//!
//! This module provides:
//! - A Drive/Docs REST client that obtains bearer tokens from the
//!   token lifecycle manager on every request
//! - Folder-permission based role resolution
//! - Sign-in completion (code exchange followed by role assignment)

pub mod access;
pub mod client;
pub mod types;

pub use access::{complete_sign_in, resolve_role, role_for, DriveConfig};
pub use client::DriveClient;
pub use types::{
    Document, DriveFile, ExportedDocument, FolderContents, Permission, SubfolderContents,
};
