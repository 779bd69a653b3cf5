//! Common utilities and types shared across docsgate crates.
//!
//! This module provides the error taxonomy and the identifier types that the
//! auth and drive layers agree on.

pub mod error;
pub mod types;

pub use error::{Error, Result};
pub use types::{AccountId, Role};
