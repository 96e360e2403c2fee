//! RV-C message decoding and device-mapping resolution.
//!
//! A stateless, reusable library: given an RV-C spec document and a CAN
//! payload it decodes signals; given a device mapping document it resolves
//! decoded frames to user-facing entities. It does not open CAN sockets,
//! track entity state over time, or render anything — that belongs to the
//! application layer (`rvc-console`).
//!
//! # Example
//!
//! ```no_run
//! use rvc_decoder::{SpecRegistry, MappingTables, message};
//! use std::path::Path;
//!
//! let registry = SpecRegistry::load(Path::new("rvc.json")).unwrap();
//! let mapping = MappingTables::load(Path::new("device_mapping.yaml"));
//!
//! let payload = [0x21, 0xFF, 0xC8, 0xFC, 0x00, 0xFF, 0xFF, 0xFF];
//! if let Some(spec) = registry.get(0x19FEDA99) {
//!     let signals = message::decode_message(&payload, spec);
//!     for signal in &signals {
//!         println!("{} = {}", signal.name, signal.formatted);
//!     }
//! }
//! ```

pub mod bits;
pub mod error;
pub mod mapping;
pub mod message;
pub mod registry;
pub mod signal;

pub use error::{DecoderError, Result};
pub use mapping::{LightCommandInfo, MappingEntry, MappingTables};
pub use message::MessageSpec;
pub use registry::SpecRegistry;
pub use signal::{DecodedSignal, SignalSpec};

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_registry_has_no_messages() {
        let registry = SpecRegistry::load_str(r#"{"messages": []}"#).unwrap();
        assert_eq!(registry.len(), 0);
        assert!(registry.is_empty());
    }
}
