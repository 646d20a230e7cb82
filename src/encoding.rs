//! Text encodings spoken by pump controllers.
//!
//! Inbound bytes are decoded incrementally: a multi-byte sequence split across
//! two reads is completed on the next call instead of being replaced. Invalid
//! input turns into U+FFFD and is never an error.

use encoding_rs::CoderResult;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Encodings selectable for a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum TextEncoding {
    #[default]
    #[serde(rename = "utf-8", alias = "UTF-8")]
    Utf8,
    #[serde(rename = "ascii", alias = "ASCII")]
    Ascii,
    /// UTF-16 little endian ("Unicode" in Windows terminology).
    #[serde(rename = "utf-16le", alias = "Unicode")]
    Utf16Le,
    /// UTF-16 big endian ("BigEndianUnicode").
    #[serde(rename = "utf-16be", alias = "BigEndianUnicode")]
    Utf16Be,
    /// UTF-32 little endian.
    #[serde(rename = "utf-32", alias = "UTF-32")]
    Utf32,
    #[serde(rename = "gbk", alias = "GBK")]
    Gbk,
    /// Handled as GBK, which is a strict superset.
    #[serde(rename = "gb2312", alias = "GB2312")]
    Gb2312,
}

impl TextEncoding {
    pub const ALL: [TextEncoding; 7] = [
        TextEncoding::Utf8,
        TextEncoding::Ascii,
        TextEncoding::Utf16Le,
        TextEncoding::Utf16Be,
        TextEncoding::Utf32,
        TextEncoding::Gbk,
        TextEncoding::Gb2312,
    ];

    /// Canonical label, as written to the settings file.
    pub fn label(self) -> &'static str {
        match self {
            TextEncoding::Utf8 => "utf-8",
            TextEncoding::Ascii => "ascii",
            TextEncoding::Utf16Le => "utf-16le",
            TextEncoding::Utf16Be => "utf-16be",
            TextEncoding::Utf32 => "utf-32",
            TextEncoding::Gbk => "gbk",
            TextEncoding::Gb2312 => "gb2312",
        }
    }

    /// Start a fresh incremental decoder.
    pub fn decoder(self) -> TextDecoder {
        let inner = match self {
            TextEncoding::Ascii => DecoderKind::Ascii,
            TextEncoding::Utf32 => DecoderKind::Utf32 { carry: Vec::new() },
            TextEncoding::Utf8 => whatwg(encoding_rs::UTF_8),
            TextEncoding::Utf16Le => whatwg(encoding_rs::UTF_16LE),
            TextEncoding::Utf16Be => whatwg(encoding_rs::UTF_16BE),
            TextEncoding::Gbk | TextEncoding::Gb2312 => whatwg(encoding_rs::GBK),
        };
        TextDecoder {
            encoding: self,
            inner,
        }
    }

    /// Encode outbound text. Characters the encoding cannot represent are
    /// replaced (`?` for ASCII, numeric references for GBK).
    pub fn encode(self, text: &str) -> Vec<u8> {
        match self {
            TextEncoding::Utf8 => text.as_bytes().to_vec(),
            TextEncoding::Ascii => text
                .chars()
                .map(|c| if c.is_ascii() { c as u8 } else { b'?' })
                .collect(),
            TextEncoding::Utf16Le => text.encode_utf16().flat_map(u16::to_le_bytes).collect(),
            TextEncoding::Utf16Be => text.encode_utf16().flat_map(u16::to_be_bytes).collect(),
            TextEncoding::Utf32 => text.chars().flat_map(|c| (c as u32).to_le_bytes()).collect(),
            TextEncoding::Gbk | TextEncoding::Gb2312 => {
                let (bytes, _, _) = encoding_rs::GBK.encode(text);
                bytes.into_owned()
            }
        }
    }
}

impl fmt::Display for TextEncoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Error for an encoding label nobody recognises.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown text encoding '{0}'")]
pub struct UnknownEncoding(pub String);

impl FromStr for TextEncoding {
    type Err = UnknownEncoding;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase().replace('_', "-");
        let encoding = match normalized.as_str() {
            "utf-8" | "utf8" => TextEncoding::Utf8,
            "ascii" | "us-ascii" => TextEncoding::Ascii,
            "unicode" | "utf-16" | "utf-16le" | "utf16le" => TextEncoding::Utf16Le,
            "bigendianunicode" | "utf-16be" | "utf16be" => TextEncoding::Utf16Be,
            "utf-32" | "utf32" | "utf-32le" => TextEncoding::Utf32,
            "gbk" | "cp936" => TextEncoding::Gbk,
            "gb2312" => TextEncoding::Gb2312,
            _ => return Err(UnknownEncoding(s.to_string())),
        };
        Ok(encoding)
    }
}

fn whatwg(encoding: &'static encoding_rs::Encoding) -> DecoderKind {
    DecoderKind::Whatwg(encoding.new_decoder_without_bom_handling())
}

enum DecoderKind {
    Whatwg(encoding_rs::Decoder),
    Ascii,
    Utf32 { carry: Vec<u8> },
}

/// Incremental decoder bound to one encoding.
pub struct TextDecoder {
    encoding: TextEncoding,
    inner: DecoderKind,
}

impl TextDecoder {
    pub fn encoding(&self) -> TextEncoding {
        self.encoding
    }

    /// Decode `bytes`, appending the text to `out`. Incomplete trailing
    /// sequences are held back until the next call.
    pub fn decode_into(&mut self, bytes: &[u8], out: &mut String) {
        match &mut self.inner {
            DecoderKind::Whatwg(decoder) => {
                let mut remaining = bytes;
                loop {
                    let needed = decoder
                        .max_utf8_buffer_length(remaining.len())
                        .unwrap_or(remaining.len() * 3 + 16);
                    out.reserve(needed);
                    let (result, read, _) = decoder.decode_to_string(remaining, out, false);
                    remaining = &remaining[read..];
                    if let CoderResult::InputEmpty = result {
                        break;
                    }
                }
            }
            DecoderKind::Ascii => out.extend(bytes.iter().map(|&b| {
                if b.is_ascii() {
                    b as char
                } else {
                    char::REPLACEMENT_CHARACTER
                }
            })),
            DecoderKind::Utf32 { carry } => {
                carry.extend_from_slice(bytes);
                let whole = carry.len() - carry.len() % 4;
                for unit in carry[..whole].chunks_exact(4) {
                    let code = u32::from_le_bytes([unit[0], unit[1], unit[2], unit[3]]);
                    out.push(char::from_u32(code).unwrap_or(char::REPLACEMENT_CHARACTER));
                }
                carry.drain(..whole);
            }
        }
    }

    /// Convenience wrapper returning the decoded text.
    pub fn decode(&mut self, bytes: &[u8]) -> String {
        let mut out = String::new();
        self.decode_into(bytes, &mut out);
        out
    }
}

impl fmt::Debug for TextDecoder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TextDecoder")
            .field("encoding", &self.encoding)
            .finish()
    }
}
