//! Error types for the index bridge.
//!
//! Only hard contract violations surface here. Shape mismatches inside
//! predicates, settings and records degrade silently instead.

use thiserror::Error;

/// Errors that can occur when resolving models, indexes or configuration.
#[derive(Debug, Error)]
pub enum BridgeError {
    /// The model was never registered with the connector.
    #[error("unknown model '{model}'")]
    UnknownModel { model: String },

    /// The requested index is not one the model may address.
    #[error("invalid index '{index}' for model '{model}'")]
    InvalidIndex { model: String, index: String },

    /// A delete-by request carried neither a query nor any filter.
    #[error("cannot destroy records of '{model}' without a valid query")]
    UnguardedDestroy { model: String },

    /// Serialization left nothing to write.
    #[error("no data to index for '{model}'")]
    EmptyRecord { model: String },

    /// Configuration or filter could not be decoded from JSON.
    #[error("invalid JSON input: {0}")]
    Json(#[from] serde_json::Error),

    /// Configuration could not be decoded from YAML.
    #[error("invalid YAML input: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

/// Result type for index bridge operations.
pub type Result<T> = std::result::Result<T, BridgeError>;
