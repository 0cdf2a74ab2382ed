//! Greedy sub-word tokenizer over a [`Vocabulary`].
//!
//! Encoding splits the prompt on single spaces and covers each word with the
//! longest vocabulary entries it can find, scanning left to right. Characters
//! that match nothing are dropped. Words are joined by a separator token.

use crate::vocab::Vocabulary;
use serde::Deserialize;

/// Id of the newline token in the bundled vocabulary.
pub const DEFAULT_SEPARATOR_ID: u32 = 13;

/// Marker substituted for ids missing from the vocabulary.
pub const UNKNOWN_TOKEN: &str = "<UNK>";

pub struct Tokenizer<'v> {
    vocab: &'v Vocabulary,
    separator_id: u32,
    unknown: String,
}

impl<'v> Tokenizer<'v> {
    pub fn new(vocab: &'v Vocabulary) -> Self {
        Self {
            vocab,
            separator_id: DEFAULT_SEPARATOR_ID,
            unknown: UNKNOWN_TOKEN.to_string(),
        }
    }

    pub fn with_separator(mut self, id: u32) -> Self {
        self.separator_id = id;
        self
    }

    pub fn with_unknown_marker(mut self, marker: impl Into<String>) -> Self {
        self.unknown = marker.into();
        self
    }

    /// Encode text into token ids.
    ///
    /// Trailing empty pieces (from trailing spaces) are ignored; leading or
    /// repeated spaces yield empty words that contribute only a separator.
    pub fn encode(&self, text: &str) -> Vec<u32> {
        let mut words: Vec<&str> = text.split(' ').collect();
        while words.last().map_or(false, |w| w.is_empty()) {
            words.pop();
        }

        let mut tokens = Vec::new();
        for (i, word) in words.iter().enumerate() {
            self.encode_word(word, &mut tokens);
            if i + 1 < words.len() {
                tokens.push(self.separator_id);
            }
        }
        tokens
    }

    fn encode_word(&self, word: &str, out: &mut Vec<u32>) {
        // Byte offsets of every char boundary, including the end of the word.
        let bounds: Vec<usize> = word
            .char_indices()
            .map(|(i, _)| i)
            .chain(std::iter::once(word.len()))
            .collect();

        let mut start = 0;
        while start + 1 < bounds.len() {
            let matched = (start + 1..bounds.len()).rev().find_map(|end| {
                self.vocab
                    .id_of(&word[bounds[start]..bounds[end]])
                    .map(|id| (id, end))
            });
            match matched {
                Some((id, end)) => {
                    out.push(id);
                    start = end;
                }
                None => {
                    log::trace!("no vocabulary entry at {:?}", &word[bounds[start]..]);
                    start += 1;
                }
            }
        }
    }

    /// Concatenate the text of each token. No separators are inserted.
    pub fn decode(&self, tokens: &[u32]) -> String {
        tokens
            .iter()
            .map(|&id| self.vocab.token(id).unwrap_or(self.unknown.as_str()))
            .collect()
    }
}

/// One literal substitution applied to decoded text.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Replacement {
    pub from: String,
    pub to: String,
}

impl Replacement {
    pub fn new(from: impl Into<String>, to: impl Into<String>) -> Self {
        Self {
            from: from.into(),
            to: to.into(),
        }
    }
}

/// Ordered substitution table for the artifacts a sub-word vocabulary leaves
/// in decoded text (escaped newlines, word-boundary glyphs).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cleanup {
    rules: Vec<Replacement>,
}

impl Cleanup {
    pub fn new(rules: Vec<Replacement>) -> Self {
        Self { rules }
    }

    pub fn none() -> Self {
        Self { rules: Vec::new() }
    }

    pub fn rules(&self) -> &[Replacement] {
        &self.rules
    }

    pub fn apply(&self, text: &str) -> String {
        self.rules
            .iter()
            .fold(text.to_string(), |acc, r| acc.replace(&r.from, &r.to))
    }
}

impl Default for Cleanup {
    fn default() -> Self {
        // Order matters: "<0x0A>" first loses its hex digits, leaving "< >".
        Self::new(vec![
            Replacement::new("0x0A", " "),
            Replacement::new("\u{010A}", " "),
            Replacement::new("\u{0120}", " "),
            Replacement::new("< >", " "),
        ])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vocab() -> Vocabulary {
        Vocabulary::from_pairs([("ab", 5u32), ("a", 1), ("b", 2), ("c", 3), ("\n", 13)]).unwrap()
    }

    #[test]
    fn test_longest_match_wins() {
        let vocab = vocab();
        let tok = Tokenizer::new(&vocab);
        assert_eq!(tok.encode("abc"), vec![5, 3]);
        assert_eq!(tok.encode("cab"), vec![3, 5]);
    }

    #[test]
    fn test_repeated_spaces_keep_empty_words() {
        let vocab = vocab();
        let tok = Tokenizer::new(&vocab);
        assert_eq!(tok.encode("a  b"), vec![1, 13, 13, 2]);
        assert_eq!(tok.encode(" a"), vec![13, 1]);
        assert_eq!(tok.encode("a   "), vec![1]);
        assert_eq!(tok.encode(" "), Vec::<u32>::new());
    }

    #[test]
    fn test_multibyte_characters_are_scanned_by_char() {
        let vocab = Vocabulary::from_pairs([("é", 7u32), ("x", 8)]).unwrap();
        let tok = Tokenizer::new(&vocab);
        assert_eq!(tok.encode("xéüx"), vec![8, 7, 8]);
    }

    #[test]
    fn test_custom_separator_and_marker() {
        let vocab = vocab();
        let tok = Tokenizer::new(&vocab)
            .with_separator(3)
            .with_unknown_marker("?");
        assert_eq!(tok.encode("a b"), vec![1, 3, 2]);
        assert_eq!(tok.decode(&[1, 99]), "a?");
    }

    #[test]
    fn test_default_cleanup_table() {
        let cleanup = Cleanup::default();
        assert_eq!(cleanup.apply("Hello<0x0A>world"), "Hello world");
        assert_eq!(cleanup.apply("\u{0120}Hello\u{0120}there\u{010A}"), " Hello there ");
        assert_eq!(Cleanup::none().apply("<0x0A>"), "<0x0A>");
    }
}
