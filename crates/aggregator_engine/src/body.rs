use chardetng::EncodingDetector;
use encoding_rs::Encoding;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedBody {
    pub text: String,
    pub encoding_label: String,
    /// True when some bytes were not valid in the chosen encoding and were replaced.
    pub lossy: bool,
}

/// Decode a response body: BOM, then the Content-Type charset, then chardetng.
///
/// Malformed sequences are replaced rather than rejected; a chapter with a
/// stray bad byte is still worth keeping.
pub fn decode_body(bytes: &[u8], content_type: Option<&str>) -> DecodedBody {
    if let Some((encoding, _)) = Encoding::for_bom(bytes) {
        return decode_with(bytes, encoding);
    }

    if let Some(encoding) = content_type
        .and_then(charset_param)
        .and_then(|label| Encoding::for_label(label.as_bytes()))
    {
        return decode_with(bytes, encoding);
    }

    let mut detector = EncodingDetector::new();
    detector.feed(bytes, true);
    decode_with(bytes, detector.guess(None, true))
}

fn charset_param(content_type: &str) -> Option<String> {
    content_type.split(';').skip(1).find_map(|part| {
        let (name, value) = part.split_once('=')?;
        if !name.trim().eq_ignore_ascii_case("charset") {
            return None;
        }
        let value = value.trim().trim_matches(['"', '\'']);
        (!value.is_empty()).then(|| value.to_string())
    })
}

fn decode_with(bytes: &[u8], encoding: &'static Encoding) -> DecodedBody {
    let (text, actual, lossy) = encoding.decode(bytes);
    DecodedBody {
        text: text.into_owned(),
        encoding_label: actual.name().to_string(),
        lossy,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn charset_header_wins_over_detection() {
        let decoded = decode_body(b"caf\xe9", Some("text/html; Charset=\"ISO-8859-1\""));
        assert_eq!(decoded.text, "café");
        assert_eq!(decoded.encoding_label, "windows-1252");
        assert!(!decoded.lossy);
    }

    #[test]
    fn bom_is_stripped() {
        let decoded = decode_body(b"\xEF\xBB\xBF<p>hi</p>", Some("text/html"));
        assert_eq!(decoded.text, "<p>hi</p>");
        assert_eq!(decoded.encoding_label, "UTF-8");
    }

    #[test]
    fn invalid_utf8_is_replaced_not_rejected() {
        let decoded = decode_body(b"ok \xff done", Some("text/html; charset=utf-8"));
        assert!(decoded.lossy);
        assert!(decoded.text.starts_with("ok "));
        assert!(decoded.text.ends_with(" done"));
    }
}
