//! English pluralization for envelope keys and route segments

/// Plural form of a resource name, keeping its casing
pub fn pluralize(word: &str) -> String {
    pluralizer::pluralize(word, 2, false)
}
