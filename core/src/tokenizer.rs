use lazy_static::lazy_static;
use regex::Regex;
use std::collections::HashSet;

pub type Position = u32;

lazy_static! {
    static ref PUNCTUATION: Regex = Regex::new(r#"[-~`!@#$%^&*()+={}\[\]|\\:;"',<.>/?]"#).expect("valid regex");
    static ref CONTROL_CHARS: Regex = Regex::new(r"[\t\n\r\x0C\x0B]").expect("valid regex");
    static ref MULTIPLE_SPACES: Regex = Regex::new(r"\s{2,}").expect("valid regex");
    static ref STOPWORDS: HashSet<&'static str> = {
        let words: &[&str] = &[
            // english
            "a","an","and","are","as","at","be","but","by","for","if","in","into","is","it",
            "no","not","of","on","or","s","such","t","that","the","their","then","there","these",
            "they","this","to","was","will","with",
            // french
            "le","la","les","est","et","à","un","une","des","pour","par",
        ];
        words.iter().copied().collect()
    };
}

fn is_stopword(token: &str) -> bool { STOPWORDS.contains(token) }

/// Tokenize text into (token, position) pairs.
///
/// Positions index the whitespace-split words of the lower-cased input, so every
/// sub-token produced by punctuation stripping shares the position of its word:
/// `l'avoir` yields `("l", 0)` and `("avoir", 0)`.
pub fn tokenize_with_positions(text: &str) -> Vec<(String, Position)> {
    let lowered = text.to_lowercase();
    let mut tokens = Vec::new();
    for (pos, word) in lowered.split_whitespace().enumerate() {
        let stripped = PUNCTUATION.replace_all(word, " ");
        for token in stripped.split_whitespace() {
            let token = token.trim();
            if token.is_empty() || is_stopword(token) { continue; }
            tokens.push((token.to_string(), pos as Position));
        }
    }
    tokens
}

/// Same as [`tokenize_with_positions`] without the positions.
pub fn tokenize(text: &str) -> Vec<String> {
    tokenize_with_positions(text).into_iter().map(|(t, _)| t).collect()
}

/// Replace control whitespace (`\t\n\r\f\v`) and runs of whitespace with single spaces.
pub fn normalize(text: &str) -> String {
    let text = CONTROL_CHARS.replace_all(text, " ");
    MULTIPLE_SPACES.replace_all(&text, " ").into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn basic_tokenize() {
        let t = tokenize("The quick, brown fox.");
        assert_eq!(t, vec!["quick", "brown", "fox"]);
    }

    #[test]
    fn contraction_shares_position() {
        let t = tokenize_with_positions("Pour l'avoir");
        assert_eq!(t, vec![("l".to_string(), 1), ("avoir".to_string(), 1)]);
    }

    #[test]
    fn normalize_collapses_whitespace() {
        assert_eq!(normalize("a\tb\n\n  c"), "a b c");
    }
}
