//! Admin token generation and validation.

use rand::RngCore;

use crate::limits::{TOKEN_BYTES, TOKEN_HEX_LEN};

/// Generate a fresh 128-bit admin token, encoded as 32 lowercase hex chars.
pub fn generate_token() -> String {
    let mut bytes = [0u8; TOKEN_BYTES];
    rand::rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}

/// Returns true if `s` looks like a well-formed token: the right length and
/// all lowercase hex digits.
pub fn is_well_formed(s: &str) -> bool {
    s.len() == TOKEN_HEX_LEN && s.bytes().all(|b| b.is_ascii_hexdigit() && !b.is_ascii_uppercase())
}

#[cfg(test)]
// OK to panic in test-only code -- assertion failures should fail loudly.
#[allow(clippy::unwrap_used, clippy::panic)]
mod tests {
    use super::*;

    #[test]
    fn generated_tokens_are_well_formed() {
        for _ in 0..32 {
            let t = generate_token();
            assert!(is_well_formed(&t), "bad token: {t}");
        }
    }

    #[test]
    fn generated_tokens_are_distinct() {
        let a = generate_token();
        let b = generate_token();
        assert_ne!(a, b);
    }

    #[test]
    fn rejects_wrong_length() {
        assert!(!is_well_formed("abcd"));
        assert!(!is_well_formed(""));
    }

    #[test]
    fn rejects_uppercase() {
        let upper = "A".repeat(TOKEN_HEX_LEN);
        assert!(!is_well_formed(&upper));
    }

    #[test]
    fn rejects_non_hex() {
        let bad = "g".repeat(TOKEN_HEX_LEN);
        assert!(!is_well_formed(&bad));
    }
}
