//! Binary-boundary error type.
//!
//! `rvc-decoder` propagates `DecoderError` internally; at the application
//! boundary we fold that plus our own I/O and CAN-socket failures into one
//! type, matching the teacher's use of `anyhow::Result` wrapping a
//! `thiserror` enum from the library crate.

use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum ConsoleError {
    #[error("failed to load RV-C spec at {path:?}")]
    SpecLoad {
        path: PathBuf,
        #[source]
        source: rvc_decoder::DecoderError,
    },

    #[error("failed to open CAN interface {interface}: {source}")]
    InterfaceOpen {
        interface: String,
        #[source]
        source: std::io::Error,
    },

    #[error("terminal error: {0}")]
    Terminal(#[from] std::io::Error),
}
