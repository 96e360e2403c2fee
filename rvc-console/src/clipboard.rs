//! Clipboard transport: the terminal is an external collaborator, so all
//! this does is emit the OSC-52 escape sequence and let the terminal
//! emulator handle the rest.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;

/// Build the OSC-52 sequence (`ESC ] 52 ; c ; <base64> BEL`) that asks the
/// controlling terminal to place `text` on the system clipboard.
pub fn osc52_sequence(text: &str) -> String {
    format!("\x1b]52;c;{}\x07", STANDARD.encode(text))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wraps_base64_payload_in_osc52_escape() {
        let seq = osc52_sequence("hello");
        assert!(seq.starts_with("\x1b]52;c;"));
        assert!(seq.ends_with('\x07'));
        assert!(seq.contains(&STANDARD.encode("hello")));
    }
}
