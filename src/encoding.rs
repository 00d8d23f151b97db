//! Character set detection and decoding for legacy HTML exports.
//!
//! WinCHM exports declare their charset in a `<meta>` tag near the top of
//! each page. The declared label is resolved through the WHATWG label table,
//! which maps `gb2312` (the label the export tool writes) to the GBK
//! superset decoder, so pages containing characters outside GB2312 proper
//! still decode.

use encoding_rs::{Encoding, UTF_8};
use regex::bytes::Regex;

/// Only the head of the file is scanned for a charset declaration.
const META_SCAN_LIMIT: usize = 4096;

/// A decoded source document.
pub struct DecodedHtml {
    pub text: String,
    /// The encoding actually used for the decode (after BOM sniffing).
    pub encoding: &'static Encoding,
    /// Whether malformed byte sequences were replaced during the decode.
    pub had_errors: bool,
}

/// Pick the encoding for a raw HTML byte stream.
///
/// Looks for `charset=...` within the first 4 KiB and resolves the label via
/// [`Encoding::for_label`]. Falls back to UTF-8 when no label is present or
/// the label is unknown.
pub fn detect_encoding(bytes: &[u8]) -> &'static Encoding {
    let head = &bytes[..bytes.len().min(META_SCAN_LIMIT)];

    let charset_re = Regex::new(r#"(?i)charset\s*=\s*["']?([A-Za-z0-9_\-]+)"#).unwrap();
    if let Some(caps) = charset_re.captures(head) {
        if let Some(encoding) = Encoding::for_label(&caps[1]) {
            return encoding;
        }
    }

    UTF_8
}

/// Decode a source document into UTF-8 text.
///
/// BOM sniffing takes precedence over the declared charset. The decode never
/// fails outright; callers decide what to do when `had_errors` is set.
pub fn decode_html(bytes: &[u8]) -> DecodedHtml {
    let declared = detect_encoding(bytes);
    let (text, encoding, had_errors) = declared.decode(bytes);

    DecodedHtml {
        text: text.into_owned(),
        encoding,
        had_errors,
    }
}
