//! Error types for the AssetOps domain model

use thiserror::Error;

/// Result type alias using the domain Error
pub type Result<T> = std::result::Result<T, Error>;

/// Domain error types
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    #[error("Unknown asset class: {0}")]
    UnknownClass(String),

    #[error("Subtype '{subtype}' is not valid for asset class {class}")]
    InvalidSubtype { class: String, subtype: String },

    #[error("Asset class {child} cannot be linked under {parent}")]
    NotLinkable { parent: String, child: String },

    #[error("Asset {child} is already linked under {parent}")]
    AlreadyLinked { child: String, parent: String },

    #[error("Asset {0} is not linked to any parent")]
    NotLinked(String),

    #[error("Resource not found: {kind} with name {name}")]
    NotFound { kind: String, name: String },

    #[error("Resource already exists: {kind} with name {name}")]
    AlreadyExists { kind: String, name: String },

    #[error("Asset name must not be empty")]
    EmptyName,
}
