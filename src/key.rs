//! Cache key codec.
//!
//! Application keys and tag names may contain `:`, which backends reserve as
//! a namespace separator. The codec replaces it with a fixed escape sequence
//! before a key reaches an adapter, and reverses the substitution on the way
//! back out.
//!
//! A key that already contains the literal escape sequence cannot be told
//! apart from an encoded key that originally contained `:`. This ambiguity is
//! a known limitation of the substitution scheme and is preserved as-is.

const RESERVED: char = ':';
const ESCAPE: &str = "_colon_";

/// Encode an application key into an adapter-safe identifier.
pub fn encode(key: &str) -> String {
    key.replace(RESERVED, ESCAPE)
}

/// Decode an adapter identifier back into the application key.
pub fn decode(key: &str) -> String {
    key.replace(ESCAPE, &RESERVED.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_replaces_separator() {
        assert_eq!(encode("user:123"), "user_colon_123");
        assert_eq!(encode("a:b:c"), "a_colon_b_colon_c");
    }

    #[test]
    fn test_encode_leaves_plain_keys_alone() {
        assert_eq!(encode("plain-key"), "plain-key");
        assert_eq!(encode(""), "");
    }

    #[test]
    fn test_round_trip() {
        for key in ["user:123", "a:b:c", "no-separator", "", "trailing:"] {
            assert_eq!(decode(&encode(key)), key);
        }
    }

    #[test]
    fn test_known_ambiguity() {
        // A key containing the literal escape sequence decodes to a different
        // key. Documented limitation, not a bug.
        let key = "already_colon_escaped";
        assert_eq!(decode(&encode(key)), "already:escaped");
    }
}
