//! RV-C spec registry: loads the message spec document and keys entries by
//! 29-bit arbitration id.
//!
//! Mirrors the teacher's `SignalDatabase` in shape (a `HashMap` for lookup
//! plus an order-preserving side index) but is keyed by the single 29-bit id
//! instead of supporting multiple definitions per id, since the RV-C spec
//! document treats `id` as unique.

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use serde::Deserialize;
use serde_json::Value;

use crate::error::{DecoderError, Result};
use crate::message::MessageSpec;
use crate::signal::SignalSpec;

#[derive(Debug, Deserialize)]
struct RawSpecDocument {
    messages: Vec<Value>,
}

#[derive(Debug, Deserialize)]
struct RawMessageSpec {
    id: Value,
    name: String,
    #[serde(default)]
    signals: Vec<SignalSpec>,
}

/// The loaded RV-C message spec, keyed by 29-bit arbitration id.
///
/// Iteration order matches the order messages appeared in the source
/// document, which the Raw tab relies on for a stable display order.
#[derive(Debug)]
pub struct SpecRegistry {
    messages: HashMap<u32, MessageSpec>,
    order: Vec<u32>,
}

impl SpecRegistry {
    /// Load the spec document at `path`. A missing or unreadable file, or a
    /// document that isn't valid JSON, is fatal. Individual bad message
    /// entries are skipped with a warning.
    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path).map_err(|source| DecoderError::SpecIo {
            path: path.to_path_buf(),
            source,
        })?;
        Self::load_str(&text)
    }

    /// Parse a spec document already read into memory. Split out of `load`
    /// so tests don't need a real file on disk for the common case.
    pub fn load_str(text: &str) -> Result<Self> {
        let doc: RawSpecDocument = serde_json::from_str(text)?;

        let mut messages = HashMap::with_capacity(doc.messages.len());
        let mut order = Vec::with_capacity(doc.messages.len());

        for entry in doc.messages {
            let raw: RawMessageSpec = match serde_json::from_value(entry) {
                Ok(raw) => raw,
                Err(err) => {
                    log::warn!("skipping malformed RV-C message entry: {}", err);
                    continue;
                }
            };

            let id = match parse_id(&raw.id) {
                Some(id) => id,
                None => {
                    log::warn!("skipping message '{}' with unparseable id {:?}", raw.name, raw.id);
                    continue;
                }
            };

            if let Some(bad) = raw.signals.iter().find(|s| !s.fits_in_frame()) {
                log::warn!(
                    "skipping message '{}' (0x{:08X}): signal '{}' has start_bit + length > 64",
                    raw.name,
                    id,
                    bad.name
                );
                continue;
            }

            if messages.contains_key(&id) {
                return Err(DecoderError::DuplicateMessageId(id));
            }

            order.push(id);
            messages.insert(id, MessageSpec::new(id, raw.name, raw.signals));
        }

        Ok(Self { messages, order })
    }

    pub fn get(&self, id: u32) -> Option<&MessageSpec> {
        self.messages.get(&id)
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Iterate messages in the order they appeared in the source document.
    pub fn iter_in_order(&self) -> impl Iterator<Item = &MessageSpec> {
        self.order.iter().filter_map(move |id| self.messages.get(id))
    }
}

fn parse_id(value: &Value) -> Option<u32> {
    match value {
        Value::Number(n) => n.as_u64().map(|v| v as u32),
        Value::String(s) => {
            let trimmed = s.trim().trim_start_matches("0x").trim_start_matches("0X");
            u32::from_str_radix(trimmed, 16).ok()
        }
        _ => None,
    }
}
