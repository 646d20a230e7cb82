//! User-composed outbound data.

use crate::encoding::TextEncoding;
use crate::error::ValidationError;

/// Something the user asked to send verbatim.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ManualPayload {
    /// Raw bytes, sent untouched.
    Bytes(Vec<u8>),
    /// Hex digits; whitespace between them is ignored.
    Hex(String),
    /// Text encoded with the connection's encoding.
    Text { text: String, append_newline: bool },
}

impl ManualPayload {
    pub fn text(text: impl Into<String>, append_newline: bool) -> Self {
        ManualPayload::Text {
            text: text.into(),
            append_newline,
        }
    }

    /// Produce the exact bytes to transmit.
    pub fn to_bytes(&self, encoding: TextEncoding) -> Result<Vec<u8>, ValidationError> {
        match self {
            ManualPayload::Bytes(bytes) => Ok(bytes.clone()),
            ManualPayload::Hex(digits) => decode_hex(digits),
            ManualPayload::Text {
                text,
                append_newline,
            } => {
                let mut bytes = encoding.encode(text);
                if *append_newline {
                    bytes.extend_from_slice(&encoding.encode("\r\n"));
                }
                Ok(bytes)
            }
        }
    }
}

fn decode_hex(digits: &str) -> Result<Vec<u8>, ValidationError> {
    let compact: String = digits.chars().filter(|c| !c.is_whitespace()).collect();
    hex::decode(&compact).map_err(|e| ValidationError::InvalidHex(e.to_string()))
}

/// Render text as space-separated upper-case hex of its UTF-8 bytes.
pub fn text_to_hex(text: &str) -> String {
    text.as_bytes()
        .iter()
        .map(|b| format!("{b:02X}"))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Reverse of [`text_to_hex`]. Invalid UTF-8 becomes U+FFFD.
///
/// Input that is not valid hex yields an empty string; the toggle is a
/// display convenience and never fails.
pub fn hex_to_text(digits: &str) -> String {
    match decode_hex(digits) {
        Ok(bytes) => String::from_utf8_lossy(&bytes).into_owned(),
        Err(_) => String::new(),
    }
}

/// The last manual input, remembered in the mode it was typed in so the
/// hex/text toggle converts only when the view actually changes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InputView {
    input: String,
    hex: bool,
}

impl InputView {
    pub fn new(input: impl Into<String>, hex: bool) -> Self {
        Self {
            input: input.into(),
            hex,
        }
    }

    pub fn as_hex(&self) -> String {
        if self.hex {
            self.input.clone()
        } else {
            text_to_hex(&self.input)
        }
    }

    pub fn as_text(&self) -> String {
        if self.hex {
            hex_to_text(&self.input)
        } else {
            self.input.clone()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hex_payload_ignores_whitespace() {
        let payload = ManualPayload::Hex("68 69\n70".into());
        assert_eq!(payload.to_bytes(TextEncoding::Utf8).unwrap(), b"hip".to_vec());
    }

    #[test]
    fn test_malformed_hex_rejected() {
        for digits in ["6", "zz", "0x41"] {
            let payload = ManualPayload::Hex(digits.into());
            assert!(matches!(
                payload.to_bytes(TextEncoding::Utf8),
                Err(ValidationError::InvalidHex(_))
            ));
        }
    }

    #[test]
    fn test_text_payload_appends_crlf() {
        let payload = ManualPayload::text("hipump", true);
        assert_eq!(
            payload.to_bytes(TextEncoding::Ascii).unwrap(),
            b"hipump\r\n".to_vec()
        );
        let payload = ManualPayload::text("A", true);
        assert_eq!(
            payload.to_bytes(TextEncoding::Utf16Le).unwrap(),
            vec![0x41, 0, 0x0D, 0, 0x0A, 0]
        );
    }

    #[test]
    fn test_empty_payload_is_allowed() {
        let payload = ManualPayload::text("", false);
        assert!(payload.to_bytes(TextEncoding::Utf8).unwrap().is_empty());
    }

    #[test]
    fn test_hex_view_toggle() {
        assert_eq!(text_to_hex("key 3"), "6B 65 79 20 33");
        assert_eq!(hex_to_text("6B 65 79 20 33"), "key 3");
        assert_eq!(hex_to_text("not hex"), "");
    }

    #[test]
    fn test_input_view_keeps_text_typed_as_text() {
        let view = InputView::new("pump", false);
        assert_eq!(view.as_text(), "pump");
        assert_eq!(view.as_hex(), "70 75 6D 70");
    }

    #[test]
    fn test_input_view_converts_hex_typed_as_hex() {
        let view = InputView::new("70 75 6D 70", true);
        assert_eq!(view.as_text(), "pump");
        assert_eq!(view.as_hex(), "70 75 6D 70");
    }
}
