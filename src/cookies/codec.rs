//! Transport encoding for cookie values and the cookie name check.
//!
//! Cookie stores reject separators, whitespace and non-ASCII bytes in values,
//! so values are percent-encoded on write and decoded on read. Names are
//! never encoded; they must already be RFC 6265 tokens.

use std::borrow::Cow;

const NAME_SEPARATORS: &[u8] = b"()<>@,;:\\\"/[]?={}";

/// Whether `name` is a cookie-name token: visible ASCII with no separators.
#[must_use]
pub fn is_valid_name(name: &str) -> bool {
    !name.is_empty()
        && name
            .bytes()
            .all(|b| b.is_ascii_graphic() && !NAME_SEPARATORS.contains(&b))
}

/// Percent-encodes every byte outside `[A-Za-z0-9-_.~]`.
#[must_use]
pub fn encode_value(value: &str) -> String {
    urlencoding::encode(value).into_owned()
}

/// Reverses [`encode_value`].
///
/// Values written by servers are not necessarily percent-encoded; when the
/// decoded bytes are not valid UTF-8 the raw value is returned unchanged.
#[must_use]
pub fn decode_value(raw: &str) -> String {
    urlencoding::decode(raw).map_or_else(|_| raw.to_string(), Cow::into_owned)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_escapes_cookie_separators() {
        assert_eq!(encode_value("a=b;c"), "a%3Db%3Bc");
        assert_eq!(encode_value("two words"), "two%20words");
        assert_eq!(encode_value("plain-value_1.~"), "plain-value_1.~");
    }

    #[test]
    fn test_round_trip_printable_and_reserved_characters() {
        let samples = [
            "",
            "a=b;c",
            "100%",
            "%41 not an escape",
            "\"quoted\", comma",
            "!#$&'()*+,/:;=?@[]",
            "tab\tnewline\n",
            "emoji 🍪 and ünïcödé",
            "plus+sign stays plus",
        ];
        for value in samples {
            assert_eq!(decode_value(&encode_value(value)), value, "round trip of {value:?}");
        }
    }

    #[test]
    fn test_round_trip_all_ascii_printables() {
        let value: String = (0x20_u8..0x7f).map(char::from).collect();
        assert_eq!(decode_value(&encode_value(&value)), value);
    }

    #[test]
    fn test_decode_leaves_invalid_utf8_escapes_untouched() {
        assert_eq!(decode_value("%FF%FE"), "%FF%FE");
    }

    #[test]
    fn test_valid_names() {
        for name in ["session", "__Host-id", "a.b_c~1", "X!#$%&'*+-.^`|"] {
            assert!(is_valid_name(name), "{name:?} should be valid");
        }
    }

    #[test]
    fn test_names_with_separators_or_controls_are_invalid() {
        for name in ["", "x=1; admin", "a b", "a;b", "bad\nname", "tab\there", "quo\"te", "ünï"] {
            assert!(!is_valid_name(name), "{name:?} should be invalid");
        }
    }

    #[test]
    fn test_decode_plain_server_value() {
        assert_eq!(decode_value("deadbeef"), "deadbeef");
    }
}
