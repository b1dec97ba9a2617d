/// Decode as UTF-8, replacing invalid sequences with U+FFFD.
pub(super) fn decode_lossy(bytes: Vec<u8>) -> String {
    match String::from_utf8(bytes) {
        Ok(s) => s,
        Err(e) => String::from_utf8_lossy(e.as_bytes()).into_owned(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn valid_utf8_passes_through() {
        assert_eq!(decode_lossy("héllo wörld".as_bytes().to_vec()), "héllo wörld");
    }

    #[test]
    fn invalid_bytes_are_replaced() {
        let decoded = decode_lossy(vec![b'a', 0xff, b'b']);
        assert_eq!(decoded, "a\u{fffd}b");
    }

    #[test]
    fn truncated_multibyte_sequence() {
        let mut bytes = "ok ".as_bytes().to_vec();
        bytes.extend_from_slice(&[0xe2, 0x82]);
        assert_eq!(decode_lossy(bytes), "ok \u{fffd}");
    }
}
