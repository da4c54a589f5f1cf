//! Error types for topology and parameter-table construction

use thiserror::Error;

/// Result type alias for model operations
pub type Result<T> = std::result::Result<T, ModelError>;

/// Errors that can occur while building a topology or parameter set
#[derive(Debug, Error)]
pub enum ModelError {
    /// A topology must contain at least one layer
    #[error("Topology has no layers")]
    EmptyTopology,

    /// The configuration address space reserves eight bits for the field id
    #[error("Topology has {count} layers, device supports at most {max}")]
    TooManyLayers {
        /// Requested layer count
        count: usize,
        /// Device limit
        max: usize,
    },

    /// A layer descriptor is inconsistent with its kind
    #[error("Invalid layer {index}: {reason}")]
    InvalidLayer {
        /// Zero-based layer index
        index: usize,
        /// Reason for failure
        reason: String,
    },

    /// Two parameter tables claim overlapping device memory
    #[error("Parameter tables '{first}' and '{second}' overlap in device memory")]
    TableOverlap {
        /// First table name
        first: String,
        /// Second table name
        second: String,
    },
}

impl ModelError {
    /// Create an invalid layer error
    pub fn invalid_layer(index: usize, reason: impl Into<String>) -> Self {
        Self::InvalidLayer {
            index,
            reason: reason.into(),
        }
    }
}
