//! Error types for the RV-C decoder library.

use std::path::PathBuf;

/// Result type for decoder operations.
pub type Result<T> = std::result::Result<T, DecoderError>;

/// Errors that can occur while loading or using the RV-C message spec.
///
/// Mapping-document defects are deliberately not represented here: per-entry
/// mapping problems are logged as warnings and the entry is skipped, they
/// never propagate as an error (see `mapping::MappingTables::load`).
#[derive(Debug, thiserror::Error)]
pub enum DecoderError {
    #[error("failed to read RV-C spec file {path:?}: {source}")]
    SpecIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse RV-C spec document: {0}")]
    SpecParse(#[from] serde_json::Error),

    #[error("duplicate message id 0x{0:08X} in RV-C spec document")]
    DuplicateMessageId(u32),
}
