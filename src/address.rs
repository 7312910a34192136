use serde::{
    Deserialize,
    Serialize,
};
use std::fmt;

pub const ADDRESS_PREFIX: &str = "0x";
pub const ADDRESS_LENGTH: usize = 42;

/// A wallet address as text.
///
/// Addresses coming back from the game service are kept as-is; only addresses the
/// player types in are checked with [`is_valid`] before they reach the network.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Address(String);

impl Address {
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    /// Parses player input, rejecting anything [`is_valid`] refuses.
    pub fn parse(candidate: &str) -> Option<Self> {
        is_valid(candidate).then(|| Self(candidate.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_well_formed(&self) -> bool {
        is_valid(&self.0)
    }

    /// `0x1234...abcd` form used by the transaction feed.
    pub fn shortened(&self) -> String {
        shorten(&self.0)
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Address {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl From<&str> for Address {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

/// Prefix and length only: hex digits and checksums are not inspected.
pub fn is_valid(candidate: &str) -> bool {
    candidate.starts_with(ADDRESS_PREFIX) && candidate.chars().count() == ADDRESS_LENGTH
}

pub fn shorten(addr: &str) -> String {
    let chars: Vec<char> = addr.chars().collect();
    if chars.len() <= 10 {
        return addr.to_string();
    }
    let head: String = chars[..6].iter().collect();
    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("{head}...{tail}")
}

#[cfg(test)]
mod tests {
    #![allow(non_snake_case)]
    use super::*;
    use proptest::prelude::*;

    const GOOD: &str = "0xC9C14dF451f31FF882Af20ab1C0fC48Bb853e3Cc";

    #[test]
    fn is_valid__prefixed_42_chars__accepted() {
        assert!(is_valid(GOOD));
        assert!(Address::parse(GOOD).is_some());
    }

    #[test]
    fn is_valid__wrong_prefix_or_length__rejected() {
        assert!(!is_valid(""));
        assert!(!is_valid("0x"));
        assert!(!is_valid(&GOOD[..41]));
        assert!(!is_valid(&format!("{GOOD}0")));
        assert!(!is_valid(&format!("1x{}", &GOOD[2..])));
        assert!(!is_valid(&format!("0X{}", &GOOD[2..])));
    }

    #[test]
    fn is_valid__non_hex_body__still_accepted() {
        // given
        let candidate = format!("0x{}", "z".repeat(40));

        // then
        assert!(is_valid(&candidate));
    }

    #[test]
    fn shortened__long_address__keeps_head_and_tail() {
        let address = Address::new(GOOD);

        assert_eq!(address.shortened(), "0xC9C1...e3Cc");
    }

    #[test]
    fn shortened__short_text__unchanged() {
        assert_eq!(shorten("0xabc"), "0xabc");
    }

    proptest! {
        #[test]
        fn is_valid__matches_prefix_and_length_rule(s in "\\PC{0,60}") {
            let expected = s.starts_with("0x") && s.chars().count() == 42;
            prop_assert_eq!(is_valid(&s), expected);
        }

        #[test]
        fn is_valid__any_prefixed_40_char_body__accepted(body in "[0-9a-zA-Z]{40}") {
            let candidate = format!("0x{body}");
            prop_assert!(is_valid(&candidate));
        }
    }
}
