//! Absence sentinels used by the upstream services.
//!
//! The registry and record endpoints encode "no value" as `"N/A"`, `"NULL"`
//! or an empty string. These are folded into `None` while decoding so nothing
//! past the wire layer ever compares against them.

const SENTINELS: &[&str] = &["n/a", "null", "none"];

/// Returns `true` if `raw` is one of the upstream "no value" markers.
pub fn is_sentinel(raw: &str) -> bool {
    let trimmed = raw.trim();
    trimmed.is_empty() || SENTINELS.iter().any(|s| trimmed.eq_ignore_ascii_case(s))
}

/// Drop sentinel values, trimming whatever remains.
pub fn present(value: Option<String>) -> Option<String> {
    value.and_then(|v| {
        if is_sentinel(&v) {
            None
        } else {
            Some(v.trim().to_string())
        }
    })
}
