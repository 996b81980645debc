//! Word normalization: NFKD decomposition followed by removal of every
//! character outside `[A-Za-z0-9-]`, lowercased.

use unicode_normalization::UnicodeNormalization;

/// Normalize a single word for indexing/lookup.
pub fn normalize(word: &str) -> String {
    word.nfkd()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '-')
        .flat_map(|c| c.to_lowercase())
        .collect()
}

/// Split `text` on whitespace, normalize each fragment, drop tokens of
/// length <= 1, dedupe, and return them in sorted order (§4.5 step 4: the
/// ordering has no semantic effect but makes flush-time unions cheaper and
/// deterministic).
pub fn tokenize(text: &str) -> Vec<String> {
    let mut tokens: Vec<String> = text
        .split_whitespace()
        .map(normalize)
        .filter(|t| t.len() > 1)
        .collect();
    tokens.sort();
    tokens.dedup();
    tokens
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_accents_and_punctuation() {
        assert_eq!(normalize("café!"), "cafe");
        assert_eq!(normalize("Hello, World"), "helloworld");
    }

    #[test]
    fn keeps_hyphen() {
        assert_eq!(normalize("well-known"), "well-known");
    }

    #[test]
    fn tokenize_sorts_dedupes_and_drops_short() {
        let tokens = tokenize("Hello hello a world WORLD!");
        assert_eq!(tokens, vec!["hello", "world"]);
    }
}
