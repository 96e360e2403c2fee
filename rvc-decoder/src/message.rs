//! Message specification and whole-message decoding.

use serde::Serialize;

use crate::signal::{decode_signal, DecodedSignal, SignalSpec};

/// One RV-C message definition: a 29-bit arbitration id, a name, and an
/// ordered list of signals.
///
/// `dgn_hex` is derived at load time as the upper-hex of the 18-bit PGN
/// `(id >> 8) & 0x3FFFF`, which includes the Data Page bit. Serializable so
/// the Raw tab can pretty-print a selected message's spec.
#[derive(Debug, Clone, Serialize)]
pub struct MessageSpec {
    pub id: u32,
    pub name: String,
    pub dgn_hex: String,
    pub signals: Vec<SignalSpec>,
}

impl MessageSpec {
    pub fn new(id: u32, name: String, signals: Vec<SignalSpec>) -> Self {
        let dgn_hex = format!("{:X}", (id >> 8) & 0x3FFFF);
        Self {
            id,
            name,
            dgn_hex,
            signals,
        }
    }

    /// True for placeholder entries the original spec admits but that must
    /// stay out of user-visible raw views and never resolve to an entity.
    pub fn is_unknown(&self) -> bool {
        self.name.starts_with("UNKNOWN")
    }
}

/// Decode every signal of `spec` out of `payload`, in declaration order.
pub fn decode_message(payload: &[u8], spec: &MessageSpec) -> Vec<DecodedSignal> {
    spec.signals
        .iter()
        .map(|signal| decode_signal(payload, signal))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dgn_hex_includes_data_page_bit() {
        let spec = MessageSpec::new(0x19FEDA99, "DC_DIMMER_STATUS".to_string(), vec![]);
        assert_eq!(spec.dgn_hex, "1FEDA");
    }

    #[test]
    fn decodes_signals_in_declaration_order() {
        let signals = vec![
            SignalSpec {
                name: "instance".to_string(),
                start_bit: 0,
                length: 8,
                scale: 1.0,
                offset: 0.0,
                unit: String::new(),
                enum_values: None,
            },
            SignalSpec {
                name: "operating_status".to_string(),
                start_bit: 16,
                length: 8,
                scale: 0.5,
                offset: 0.0,
                unit: "%".to_string(),
                enum_values: None,
            },
        ];
        let spec = MessageSpec::new(0x19FEDA99, "DC_DIMMER_STATUS".to_string(), signals);
        let payload = [0x21, 0xFF, 0xC8, 0xFC, 0x00, 0xFF, 0xFF, 0xFF];
        let decoded = decode_message(&payload, &spec);

        assert_eq!(decoded.len(), 2);
        assert_eq!(decoded[0].name, "instance");
        assert_eq!(decoded[0].raw, 0x21);
        assert_eq!(decoded[1].name, "operating_status");
        assert_eq!(decoded[1].raw, 200);
    }

    #[test]
    fn unknown_prefixed_names_are_flagged() {
        let spec = MessageSpec::new(0x1, "UNKNOWN_19FEDA99".to_string(), vec![]);
        assert!(spec.is_unknown());

        let spec = MessageSpec::new(0x1, "DC_DIMMER_STATUS".to_string(), vec![]);
        assert!(!spec.is_unknown());
    }
}
