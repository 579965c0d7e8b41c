//! Deployment payload codec
//!
//! Wire format of `TxData::src`:
//! - always base64 (standard alphabet, padded)
//! - raw-byte modes (wasm): the base64 body is the module itself
//! - every other mode: the base64 body is ASCII text holding the
//!   URI-component-escaped source, percent escapes decoding to UTF-8

use base64::{engine::general_purpose::STANDARD as BASE64_STANDARD, Engine as _};

use lib_types::ExecutionMode;

use crate::errors::{VmError, VmResult};

/// Decode a deploy payload into the bytes handed to the mode's compiler
pub fn decode_deploy_payload(mode: ExecutionMode, payload: &str) -> VmResult<Vec<u8>> {
    let raw = BASE64_STANDARD
        .decode(payload.trim())
        .map_err(|e| VmError::InvalidPayload(format!("base64: {}", e)))?;

    if mode.carries_raw_bytes() {
        return Ok(raw);
    }

    if !raw.is_ascii() {
        return Err(VmError::InvalidPayload(
            "escaped source must be ASCII".to_string(),
        ));
    }
    if let Some(offset) = malformed_escape(&raw) {
        return Err(VmError::InvalidPayload(format!(
            "malformed escape at offset {}",
            offset
        )));
    }
    String::from_utf8(urlencoding::decode_binary(&raw).into_owned())
        .map(String::into_bytes)
        .map_err(|_| VmError::InvalidPayload("escaped source is not valid UTF-8".to_string()))
}

/// Produce the wire payload a submitter sends for `source`
pub fn encode_deploy_payload(mode: ExecutionMode, source: &[u8]) -> String {
    if mode.carries_raw_bytes() {
        return BASE64_STANDARD.encode(source);
    }

    let mut escaped = urlencoding::encode_binary(source).into_owned();
    for (escape, mark) in URI_COMPONENT_MARKS {
        escaped = escaped.replace(escape, mark);
    }
    BASE64_STANDARD.encode(escaped)
}

/// Marks `encodeURIComponent` leaves unescaped
const URI_COMPONENT_MARKS: [(&str, &str); 5] = [
    ("%21", "!"),
    ("%27", "'"),
    ("%28", "("),
    ("%29", ")"),
    ("%2A", "*"),
];

/// Offset of the first `%` not followed by two hex digits
fn malformed_escape(escaped: &[u8]) -> Option<usize> {
    escaped
        .iter()
        .enumerate()
        .filter(|(_, byte)| **byte == b'%')
        .map(|(i, _)| i)
        .find(|&i| {
            !escaped
                .get(i + 1..i + 3)
                .map_or(false, |pair| pair.iter().all(u8::is_ascii_hexdigit))
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escaped_text_payload() {
        // encodeURIComponent('{"a": "é"}') then base64
        let payload = BASE64_STANDARD.encode("%7B%22a%22%3A%20%22%C3%A9%22%7D");
        let decoded = decode_deploy_payload(ExecutionMode::SCRIPT, &payload).unwrap();
        assert_eq!(decoded, "{\"a\": \"é\"}".as_bytes());
    }

    #[test]
    fn test_encoder_matches_uri_component_rules() {
        let payload = encode_deploy_payload(ExecutionMode::SCRIPT, b"a b(c)!~*'_-.");
        let body = BASE64_STANDARD.decode(payload).unwrap();
        assert_eq!(body, b"a%20b(c)!~*'_-.");
    }

    #[test]
    fn test_encoded_text_decodes_back() {
        let source = "{\"note\": \"50% (max) ~ é!\"}";
        let payload = encode_deploy_payload(ExecutionMode::SCRIPT, source.as_bytes());
        let body = BASE64_STANDARD.decode(&payload).unwrap();
        assert!(body.iter().all(|b| !b" \"{}".contains(b)));
        assert_eq!(
            decode_deploy_payload(ExecutionMode::SCRIPT, &payload).unwrap(),
            source.as_bytes()
        );
    }

    #[test]
    fn test_raw_mode_keeps_bytes() {
        let module = [0x00, 0x61, 0x73, 0x6d, 0x01, 0x00, 0x00, 0x00];
        let payload = encode_deploy_payload(ExecutionMode::WASM, &module);
        assert_eq!(
            decode_deploy_payload(ExecutionMode::WASM, &payload).unwrap(),
            module
        );
        // the same bytes are not valid escaped text
        assert!(decode_deploy_payload(ExecutionMode::SCRIPT, &BASE64_STANDARD.encode([0xff])).is_err());
    }

    #[test]
    fn test_malformed_payloads() {
        assert!(matches!(
            decode_deploy_payload(ExecutionMode::SCRIPT, "not base64!"),
            Err(VmError::InvalidPayload(_))
        ));
        let truncated = BASE64_STANDARD.encode("abc%2");
        assert!(matches!(
            decode_deploy_payload(ExecutionMode::SCRIPT, &truncated),
            Err(VmError::InvalidPayload(_))
        ));
        let bad_utf8 = BASE64_STANDARD.encode("%FF");
        assert!(decode_deploy_payload(ExecutionMode::SCRIPT, &bad_utf8).is_err());
    }
}
