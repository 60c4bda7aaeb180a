//! Jurisdiction code enumeration: the fixed set of two-letter codes the
//! registry may be keyed by. 50 states plus DC, plus FED for federal-level
//! sources (DEA, FDA, USDA pages).

/// Every valid jurisdiction code, sorted. `FED` is the only non-postal entry.
pub const STATE_CODES: [&str; 52] = [
    "AK", "AL", "AR", "AZ", "CA", "CO", "CT", "DC", "DE", "FED", "FL", "GA",
    "HI", "IA", "ID", "IL", "IN", "KS", "KY", "LA", "MA", "MD", "ME", "MI",
    "MN", "MO", "MS", "MT", "NC", "ND", "NE", "NH", "NJ", "NM", "NV", "NY",
    "OH", "OK", "OR", "PA", "RI", "SC", "SD", "TN", "TX", "UT", "VA", "VT",
    "WA", "WI", "WV", "WY",
];

/// True if `code` is a known jurisdiction code (case-sensitive; the registry
/// schema stores codes uppercase).
pub fn is_valid_code(code: &str) -> bool {
    STATE_CODES.binary_search(&code).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_are_sorted_for_binary_search() {
        let mut sorted = STATE_CODES;
        sorted.sort_unstable();
        assert_eq!(sorted, STATE_CODES);
    }

    #[test]
    fn known_and_unknown_codes() {
        assert!(is_valid_code("AR"));
        assert!(is_valid_code("DC"));
        assert!(is_valid_code("FED"));
        assert!(!is_valid_code("ar"));
        assert!(!is_valid_code("ZZ"));
        assert!(!is_valid_code(""));
    }
}
