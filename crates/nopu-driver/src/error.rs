//! Error types for coprocessor driver operations

use std::net::SocketAddr;
use thiserror::Error;

/// Result type alias for driver operations
pub type Result<T> = std::result::Result<T, CopError>;

/// Errors that can occur while driving the coprocessor
///
/// The bare-metal firmware surfaces none of these: a hung device blocks
/// forever and bad packets are dropped silently. Both stay the default
/// here; the variants below only occur under the opt-in policies that make
/// those faults observable.
#[derive(Debug, Error)]
pub enum CopError {
    /// Status never cleared within the configured poll bound
    #[error("Device hang: status still busy after {polls} polls")]
    DeviceHang {
        /// Busy polls observed before giving up
        polls: u64,
    },

    /// Transport-level I/O failure
    #[error("Transport error: {source}")]
    Transport {
        /// Underlying I/O error
        #[from]
        source: std::io::Error,
    },

    /// A mid-round packet arrived from a sender other than the latched one
    /// (strict sender policy only)
    #[error("Stale sender: transfer latched to {latched}, packet from {got}")]
    StaleSender {
        /// Sender latched at round start
        latched: SocketAddr,
        /// Offending packet's source
        got: SocketAddr,
    },
}
