//! Signal specification and per-signal formatting.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::bits;

fn default_scale() -> f64 {
    1.0
}

/// One field within a message, as described by the RV-C spec document.
///
/// Invariant: `start_bit + length <= 64`, checked when the owning
/// `MessageSpec` is loaded by the spec registry. Serializable so the Raw
/// tab can pretty-print the spec of a selected message.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SignalSpec {
    pub name: String,
    pub start_bit: u8,
    pub length: u8,
    #[serde(default = "default_scale")]
    pub scale: f64,
    #[serde(default)]
    pub offset: f64,
    #[serde(default)]
    pub unit: String,
    #[serde(default, rename = "enum")]
    pub enum_values: Option<HashMap<String, String>>,
}



impl SignalSpec {
    pub fn fits_in_frame(&self) -> bool {
        self.start_bit as u16 + self.length as u16 <= 64
    }
}

/// A decoded signal: the raw extracted integer plus its formatted display
/// string, produced in the declaration order of the owning message.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedSignal {
    pub name: String,
    pub raw: u64,
    pub formatted: String,
}

/// Decode a single signal out of an 8-byte (or shorter, zero-extended)
/// payload, applying the scale/offset/enum/unit formatting rules.
pub fn decode_signal(payload: &[u8], spec: &SignalSpec) -> DecodedSignal {
    let raw = bits::extract_bits(payload, spec.start_bit, spec.length);
    let scaled = raw as f64 * spec.scale + spec.offset;

    let formatted = if let Some(table) = &spec.enum_values {
        table
            .get(&raw.to_string())
            .cloned()
            .unwrap_or_else(|| format!("UNKNOWN ({})", raw))
    } else if spec.scale != 1.0 || spec.offset != 0.0 || scaled.fract() != 0.0 {
        format!("{:.2}{}", scaled, spec.unit)
    } else {
        format!("{}{}", scaled as i64, spec.unit)
    };

    DecodedSignal {
        name: spec.name.clone(),
        raw,
        formatted,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec(name: &str, start_bit: u8, length: u8) -> SignalSpec {
        SignalSpec {
            name: name.to_string(),
            start_bit,
            length,
            scale: 1.0,
            offset: 0.0,
            unit: String::new(),
            enum_values: None,
        }
    }

    #[test]
    fn plain_integer_formatting() {
        let payload = [0x21, 0, 0, 0, 0, 0, 0, 0];
        let decoded = decode_signal(&payload, &spec("instance", 0, 8));
        assert_eq!(decoded.raw, 0x21);
        assert_eq!(decoded.formatted, "33");
    }

    #[test]
    fn scaled_value_formats_with_two_decimals_and_unit() {
        let mut s = spec("operating_status", 16, 8);
        s.scale = 0.5;
        s.unit = "%".to_string();
        let payload = [0, 0, 200, 0, 0, 0, 0, 0];
        let decoded = decode_signal(&payload, &s);
        assert_eq!(decoded.raw, 200);
        assert_eq!(decoded.formatted, "100.00%");
    }

    #[test]
    fn enum_hit_and_miss() {
        let mut s = spec("state", 0, 2);
        let mut table = HashMap::new();
        table.insert("1".to_string(), "ON".to_string());
        s.enum_values = Some(table);

        let payload_on = [0b01, 0, 0, 0, 0, 0, 0, 0];
        assert_eq!(decode_signal(&payload_on, &s).formatted, "ON");

        let payload_unknown = [0b10, 0, 0, 0, 0, 0, 0, 0];
        assert_eq!(decode_signal(&payload_unknown, &s).formatted, "UNKNOWN (2)");
    }

    #[test]
    fn decoding_is_deterministic() {
        let s = spec("x", 8, 8);
        let payload = [0, 0x7F, 0, 0, 0, 0, 0, 0];
        let a = decode_signal(&payload, &s);
        let b = decode_signal(&payload, &s);
        assert_eq!(a, b);
    }

    #[test]
    fn non_integral_scaled_value_uses_fixed_point_even_without_unit() {
        let mut s = spec("ratio", 0, 8);
        s.scale = 1.0 / 3.0;
        let payload = [3, 0, 0, 0, 0, 0, 0, 0];
        let decoded = decode_signal(&payload, &s);
        assert!(decoded.formatted.contains('.'));
    }
}
