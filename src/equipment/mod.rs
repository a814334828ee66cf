//! Equipment id extraction from scanned codes.
//!
//! Codes usually carry a URL whose last path segment ends in the id, e.g.
//! `https://host/d/AB1234`. Older stickers use `?qr=<id>` instead.

use std::sync::OnceLock;

use regex::Regex;
use url::Url;

/// Two letters then four digits at the end of the path.
fn trailing_id() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"([A-Za-z]{2}[0-9]{4})/*$").expect("valid pattern"))
}

/// Extract the equipment id from the decoded text of a code.
///
/// Order: trailing `AA0000` token of the path, then the `qr` query parameter,
/// then the last non-empty path segment.
pub fn extract_equipment_id(raw: &str) -> Option<String> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }

    let (path, qr_param) = match Url::parse(raw) {
        Ok(url) => {
            let qr = url
                .query_pairs()
                .find(|(key, _)| key == "qr")
                .map(|(_, value)| value.trim().to_string())
                .filter(|value| !value.is_empty());
            (url.path().to_string(), qr)
        }
        // Not a URL: treat the text as a bare path, ignoring any query part.
        Err(_) => (raw.split(['?', '#']).next().unwrap_or("").to_string(), None),
    };

    if let Some(caps) = trailing_id().captures(&path) {
        return Some(caps[1].to_uppercase());
    }
    if qr_param.is_some() {
        return qr_param;
    }

    path.trim_matches('/')
        .rsplit('/')
        .next()
        .filter(|segment| !segment.is_empty())
        .map(str::to_string)
}

/// Resolve the id from the `url` and `qr` request parameters, in that order.
pub fn resolve_equipment_id(url: Option<&str>, qr: Option<&str>) -> Option<String> {
    url.and_then(extract_equipment_id).or_else(|| {
        qr.map(str::trim)
            .filter(|value| !value.is_empty())
            .map(str::to_string)
    })
}
