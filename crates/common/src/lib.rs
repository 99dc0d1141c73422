//! AssetOps Common Library
//!
//! Domain model shared by the end-to-end harness: asset classes and their
//! subtype domains, parent/child linkage rules, and the identifiers used to
//! address screens, controls, fields and list queries of the mobile app.

pub mod error;
pub mod types;

pub use error::{Error, Result};
pub use types::*;

/// AssetOps version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
