//! Parsing of raw sensor readings.

use std::borrow::Cow;

use crate::walker::{LeafValue, RawLeaf};

/// Parse one walked leaf into a temperature reading.
///
/// The device reports each sensor as text. An unconnected probe reads as
/// "--" and is skipped; so is anything that fails to parse. Readings use
/// European decimal notation ("19,8"), normalized here. A skip never aborts
/// the scrape and never shifts the indices of later sensors.
pub fn parse_reading(leaf: &RawLeaf) -> Option<f32> {
    let text: Cow<'_, str> = match &leaf.value {
        LeafValue::Text(s) => Cow::Borrowed(s.as_str()),
        LeafValue::Bytes(b) => String::from_utf8_lossy(b),
    };

    // "--" means no probe connected on this slot.
    if text.contains("--") {
        return None;
    }

    text.trim().replace(',', ".").parse::<f32>().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text_leaf(position: usize, s: &str) -> RawLeaf {
        RawLeaf {
            position,
            value: LeafValue::Text(s.to_string()),
        }
    }

    #[test]
    fn test_parse_decimal_comma() {
        assert_eq!(parse_reading(&text_leaf(0, "19,8")), Some(19.8));
    }

    #[test]
    fn test_parse_decimal_point() {
        assert_eq!(parse_reading(&text_leaf(0, "21.5")), Some(21.5));
    }

    #[test]
    fn test_parse_surrounding_whitespace() {
        assert_eq!(parse_reading(&text_leaf(0, "  -3,2 \t")), Some(-3.2));
    }

    #[test]
    fn test_no_probe_sentinel() {
        assert_eq!(parse_reading(&text_leaf(0, "--")), None);
        assert_eq!(parse_reading(&text_leaf(0, " ---- ")), None);
    }

    #[test]
    fn test_malformed_text() {
        assert_eq!(parse_reading(&text_leaf(0, "bad")), None);
        assert_eq!(parse_reading(&text_leaf(0, "")), None);
        assert_eq!(parse_reading(&text_leaf(0, "21,5C")), None);
    }

    #[test]
    fn test_bytes_reading() {
        let leaf = RawLeaf {
            position: 2,
            value: LeafValue::Bytes(b"24,1".to_vec()),
        };
        assert_eq!(parse_reading(&leaf), Some(24.1));
    }

    #[test]
    fn test_non_utf8_bytes() {
        let leaf = RawLeaf {
            position: 0,
            value: LeafValue::Bytes(vec![0xff, 0xfe]),
        };
        assert_eq!(parse_reading(&leaf), None);
    }
}
