//! Attribute access for single-line Firehose XML tags
//!
//! Firehose tags are flat `<name key="value" ... />` elements, one per line,
//! so attributes are located by text search instead of a full XML parser.

use std::ops::Range;

/// Byte range of the value of `key` inside `fragment`
fn value_span(fragment: &str, key: &str) -> Option<Range<usize>> {
    let needle = format!("{}=\"", key);
    let bytes = fragment.as_bytes();
    let mut from = 0;

    while let Some(pos) = fragment[from..].find(&needle) {
        let start = from + pos;
        // Must not match the tail of a longer attribute name
        let at_boundary = start == 0 || matches!(bytes[start - 1], b' ' | b'\t' | b'<');
        if at_boundary {
            let value_start = start + needle.len();
            let value_len = fragment[value_start..].find('"')?;
            return Some(value_start..value_start + value_len);
        }
        from = start + needle.len();
    }
    None
}

/// Value of attribute `key`
pub fn attr<'a>(fragment: &'a str, key: &str) -> Option<&'a str> {
    value_span(fragment, key).map(|span| &fragment[span])
}

/// Replace the value of attribute `key` in place
///
/// Returns false when the attribute is not present.
pub fn set_attr(fragment: &mut String, key: &str, value: &str) -> bool {
    match value_span(fragment, key) {
        Some(span) => {
            fragment.replace_range(span, value);
            true
        }
        None => false,
    }
}

/// Parse a decimal or `0x` hexadecimal attribute value
///
/// Returns `None` for symbolic values such as `NUM_DISK_SECTORS-33.`.
pub fn parse_number(value: &str) -> Option<u64> {
    let value = value.trim();
    let value = value.strip_suffix('.').unwrap_or(value);
    if let Some(hex) = value.strip_prefix("0x").or_else(|| value.strip_prefix("0X")) {
        u64::from_str_radix(hex, 16).ok()
    } else {
        value.parse().ok()
    }
}

/// Numeric attribute, `None` when missing or symbolic
pub fn number_attr(fragment: &str, key: &str) -> Option<u64> {
    attr(fragment, key).and_then(parse_number)
}

/// Boolean attribute, true only for `"true"`
pub fn bool_attr(fragment: &str, key: &str) -> bool {
    attr(fragment, key).is_some_and(|v| v.eq_ignore_ascii_case("true"))
}
