// ═══════════════════════════════════════════════════════════════
// JSAPI handshake signature
// ═══════════════════════════════════════════════════════════════
//
// The client SDK verifies that the page it runs on was authorised
// by our app. It recomputes:
//
//   SHA1("jsapi_ticket=<ticket>&noncestr=<nonce>&timestamp=<ms>&url=<url>")
//
// and compares against what we hand back. Field order is fixed and
// nothing is URL-encoded, so the url must be byte-identical to the
// page's location.href.

use serde::Serialize;
use sha1::{Digest, Sha1};

/// What `/api/get_sign_parameters` returns to the browser.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SignParameters {
    pub app_id: String,
    pub signature: String,
    pub noncestr: String,
    /// Milliseconds since the Unix epoch.
    pub timestamp: i64,
}

/// The exact text that gets hashed.
pub fn canonical_string(ticket: &str, nonce: &str, timestamp: i64, url: &str) -> String {
    format!(
        "jsapi_ticket={}&noncestr={}&timestamp={}&url={}",
        ticket, nonce, timestamp, url
    )
}

/// Lower-case hex SHA-1 of the canonical string. Pure.
pub fn compute_signature(ticket: &str, url: &str, nonce: &str, timestamp: i64) -> String {
    let mut hasher = Sha1::new();
    hasher.update(canonical_string(ticket, nonce, timestamp, url).as_bytes());
    hex::encode(hasher.finalize())
}

pub fn sign_parameters(
    app_id: &str,
    ticket: &str,
    url: &str,
    nonce: &str,
    timestamp: i64,
) -> SignParameters {
    SignParameters {
        app_id: app_id.to_string(),
        signature: compute_signature(ticket, url, nonce, timestamp),
        noncestr: nonce.to_string(),
        timestamp,
    }
}

/// Undo a double `encodeURIComponent(location.href)`.
///
/// The query extractor has already decoded once. Only a value that still
/// looks like an encoded absolute URL is decoded again, so escapes that are
/// part of the page URL itself (`?q=a%20b`) reach the hash untouched. Falls
/// back to the input when the second decode does not yield valid UTF-8.
pub fn decode_page_url(raw: &str) -> String {
    if !is_encoded_absolute_url(raw) {
        return raw.to_string();
    }
    match urlencoding::decode(raw) {
        Ok(decoded) => decoded.into_owned(),
        Err(_) => raw.to_string(),
    }
}

fn is_encoded_absolute_url(raw: &str) -> bool {
    let head = raw.get(..8).unwrap_or(raw).to_ascii_lowercase();
    head.starts_with("http%3a") || head.starts_with("https%3a")
}

#[cfg(test)]
mod tests {
    use super::*;

    const NONCE: &str = "njrktx6WakWFcdnQAmQ7RDFwJpABKmrb";

    #[test]
    fn test_canonical_string_order() {
        assert_eq!(
            canonical_string("t1", NONCE, 1700000000000, "https://example.com/page"),
            "jsapi_ticket=t1&noncestr=njrktx6WakWFcdnQAmQ7RDFwJpABKmrb&timestamp=1700000000000&url=https://example.com/page"
        );
    }

    #[test]
    fn test_known_digest() {
        let sig = compute_signature("t1", "https://example.com/page", NONCE, 1700000000000);
        assert_eq!(sig, "da2b9ab64e818c6697de1dccbfaba99df06dad0c");
    }

    #[test]
    fn test_signature_is_deterministic() {
        let a = compute_signature("t1", "https://example.com/a?x=1", NONCE, 42);
        let b = compute_signature("t1", "https://example.com/a?x=1", NONCE, 42);
        assert_eq!(a, b);
        assert_ne!(a, compute_signature("t1", "https://example.com/a?x=1", NONCE, 43));
    }

    #[test]
    fn test_sign_parameters_shape() {
        let p = sign_parameters("cli_app", "t1", "https://example.com/page", NONCE, 1700000000000);
        assert_eq!(p.app_id, "cli_app");
        assert_eq!(p.noncestr, NONCE);
        assert_eq!(p.signature, "da2b9ab64e818c6697de1dccbfaba99df06dad0c");
        let json = serde_json::to_value(&p).unwrap();
        assert_eq!(json["timestamp"], 1700000000000i64);
    }

    #[test]
    fn test_decode_page_url() {
        assert_eq!(
            decode_page_url("https%3A%2F%2Fexample.com%2Fpage%3Fa%3D1%26b%3D2"),
            "https://example.com/page?a=1&b=2"
        );
        assert_eq!(
            decode_page_url("http%3a%2f%2fexample.com%2F"),
            "http://example.com/"
        );
        assert_eq!(decode_page_url("https://example.com/page"), "https://example.com/page");
        // %FF alone is not UTF-8; keep the raw value.
        assert_eq!(decode_page_url("https%3A%2F%2Fx.test%2F%FF"), "https%3A%2F%2Fx.test%2F%FF");
    }

    #[test]
    fn test_escapes_inside_page_url_survive() {
        assert_eq!(
            decode_page_url("https://leads.example.com/search?q=a%20b"),
            "https://leads.example.com/search?q=a%20b"
        );
        assert_eq!(decode_page_url("/relative%20path"), "/relative%20path");
        assert_eq!(decode_page_url(""), "");
    }
}
