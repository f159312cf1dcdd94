//! Country Normalization
//!
//! One lookup table shared by the shipping and billing entry points.

/// Canonical code for United States variants
pub const UNITED_STATES: &str = "US";

/// Canonical name for Canada variants
pub const CANADA: &str = "Canada";

/// Variant spellings (normalized: lowercase, single spaces) to canonical form
const COUNTRY_VARIANTS: &[(&str, &str)] = &[
    ("us", UNITED_STATES),
    ("usa", UNITED_STATES),
    ("united states", UNITED_STATES),
    ("united states of america", UNITED_STATES),
    ("ca", CANADA),
    ("can", CANADA),
    ("canada", CANADA),
];

fn fold(input: &str) -> String {
    input
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// Normalize a country string to `US`, `Canada`, or the trimmed input
pub fn normalize_country(input: &str) -> String {
    let key = fold(input);
    COUNTRY_VARIANTS
        .iter()
        .find(|(variant, _)| *variant == key)
        .map_or_else(|| input.trim().to_string(), |(_, canonical)| (*canonical).to_string())
}

/// Whether the country is a United States variant
pub fn is_united_states(input: &str) -> bool {
    normalize_country(input) == UNITED_STATES
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_us_variants() {
        for variant in ["US", "usa", " United   States ", "UNITED STATES OF AMERICA", "us"] {
            assert!(is_united_states(variant), "{variant} should be US");
            assert_eq!(normalize_country(variant), "US");
        }
    }

    #[test]
    fn test_canada_and_passthrough() {
        assert_eq!(normalize_country("canada"), "Canada");
        assert_eq!(normalize_country("CA"), "Canada");
        assert_eq!(normalize_country("  Mexico "), "Mexico");
        assert!(!is_united_states("Canada"));
        assert!(!is_united_states(""));
    }
}
