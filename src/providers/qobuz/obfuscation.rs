//! Payload de-obfuscation for the alternate mirror.
//!
//! Each character of the UTF-8 body is XORed with `253` and a
//! position-dependent key `(i * 17) % 128`. The operation is its own
//! inverse.

/// Decode an obfuscated body into its JSON text.
///
/// Invalid UTF-8 sequences are dropped before decoding.
pub fn decode_xor(data: &[u8]) -> String {
    String::from_utf8_lossy(data)
        .chars()
        .filter(|&c| c != char::REPLACEMENT_CHARACTER)
        .enumerate()
        .filter_map(|(i, c)| {
            let key = ((i * 17) % 128) as u32;
            char::from_u32(c as u32 ^ 253 ^ key)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encode(text: &str) -> Vec<u8> {
        decode_xor(text.as_bytes()).into_bytes()
    }

    #[test]
    fn test_decode_reverses_encode() {
        let json = r#"{"url":"https://cdn.example/track.flac?token=abc"}"#;
        assert_eq!(decode_xor(&encode(json)), json);
    }

    #[test]
    fn test_first_char_key() {
        // i = 0 -> key 0, so only the 253 mask applies
        assert_eq!(decode_xor(&encode("{")), "{");
        let c = char::from_u32('{' as u32 ^ 253).unwrap();
        assert_eq!(decode_xor(c.to_string().as_bytes()), "{");
    }

    #[test]
    fn test_decoded_payload_parses() {
        let json = r#"{"url":"https://x/y.flac"}"#;
        let parsed: serde_json::Value = serde_json::from_str(&decode_xor(&encode(json))).unwrap();
        assert_eq!(parsed["url"], "https://x/y.flac");
    }
}
