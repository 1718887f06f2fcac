//! Content analysis helpers
//!
//! Pure functions used by the aggregator: tokenization for word statistics
//! and inline pictographic symbol detection. Both operate on a single
//! message's content and carry no state.

use once_cell::sync::Lazy;
use regex::Regex;

/// Minimum token length (in characters) for the word-frequency map.
/// Shorter tokens still count toward the token total.
pub const MIN_WORD_LEN: usize = 3;

/// Matches a single codepoint with the Unicode `Extended_Pictographic`
/// property, the same class the emoji scan is defined over.
static PICTOGRAPHIC: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\p{Extended_Pictographic}").unwrap());

/// Tokenize message content for word statistics.
///
/// Lower-cases the text, strips every character that is not a basic Latin
/// letter, one of the extended letters `ğ ü ş ö ç ı`, or a space, then
/// splits on whitespace. Punctuation-only content produces no tokens.
pub fn tokenize(content: &str) -> Vec<String> {
    let cleaned: String = content
        .to_lowercase()
        .chars()
        .filter(|c| matches!(c, 'a'..='z' | ' ' | 'ğ' | 'ü' | 'ş' | 'ö' | 'ç' | 'ı'))
        .collect();

    cleaned.split_whitespace().map(str::to_string).collect()
}

/// Iterate over the inline pictographic symbols of the raw content, one
/// item per occurrence.
pub fn inline_emojis(content: &str) -> impl Iterator<Item = &str> {
    PICTOGRAPHIC.find_iter(content).map(|m| m.as_str())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tokenize_lowercases_and_strips() {
        assert_eq!(tokenize("Hello, World!"), vec!["hello", "world"]);
    }

    #[test]
    fn test_tokenize_keeps_extended_letters() {
        assert_eq!(tokenize("çiğ köfte"), vec!["çiğ", "köfte"]);
    }

    #[test]
    fn test_tokenize_punctuation_only_yields_nothing() {
        assert!(tokenize("???!!!").is_empty());
    }

    #[test]
    fn test_tokenize_digits_are_stripped() {
        // Digits vanish, letters on either side merge into one token
        assert_eq!(tokenize("top10 list"), vec!["top", "list"]);
    }

    #[test]
    fn test_tokenize_collapses_whitespace_runs() {
        assert_eq!(tokenize("a  b\t c"), vec!["a", "b", "c"]);
    }

    #[test]
    fn test_inline_emojis_finds_each_occurrence() {
        let found: Vec<&str> = inline_emojis("good 😀 job 😀🔥").collect();
        assert_eq!(found, vec!["😀", "😀", "🔥"]);
    }

    #[test]
    fn test_inline_emojis_ignores_plain_text() {
        assert_eq!(inline_emojis("no symbols here").count(), 0);
    }

    #[test]
    fn test_inline_emojis_common_ranges() {
        // A sample across the common pictographic blocks
        for symbol in ["❤", "🎉", "🚀", "🤔", "☀"] {
            assert_eq!(inline_emojis(symbol).count(), 1, "missed {symbol}");
        }
    }
}
