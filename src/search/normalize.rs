// Query normalization
//
// *La Normalisation* - Fold raw user text into the canonical form every rule matches against

use unicode_normalization::UnicodeNormalization;

/// Normalize a raw query.
///
/// Lowercases, composes to Unicode NFC, trims and collapses every run of
/// whitespace to a single space. Applying it twice yields the same string.
pub fn normalize(raw: &str) -> String {
    fold(raw).split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Case and composition folding without whitespace handling.
///
/// Used for case-insensitive comparisons against stored text (names, tags).
pub fn fold(text: &str) -> String {
    text.to_lowercase().nfc().collect()
}
