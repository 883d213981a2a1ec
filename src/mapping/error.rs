//! Error definitions for the mapping store

use thiserror::Error;

/// Ways persisting a [`ButtonMapping`](super::ButtonMapping) can fail.
///
/// Loading never surfaces these to callers, a broken file falls back to the
/// default mapping instead. Saving reports them so the UI can tell the
/// operator the settings were not written.
#[derive(Debug, Error)]
pub enum MappingError {
    /// Reading or writing the mapping file failed
    #[error("Mapping file I/O failed: {0}")]
    Io(#[from] std::io::Error),

    /// The mapping file does not contain a valid mapping
    #[error("Mapping file is malformed: {0}")]
    Json(#[from] serde_json::Error),

    /// An index is outside the range the gamepad layout offers
    #[error("{field} index {index} is out of range (0..{limit})")]
    OutOfRange {
        field: &'static str,
        index: usize,
        limit: usize,
    },
}
