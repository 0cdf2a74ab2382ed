//! Token vocabulary loaded from a `vocab.json` table.
//!
//! The table maps token text to its integer id. Both directions are kept in
//! hash maps so encoding and decoding are single lookups.

use crate::error::LoadError;
use std::collections::HashMap;
use std::path::Path;

/// Immutable bidirectional token table.
#[derive(Debug, Clone, Default)]
pub struct Vocabulary {
    ids: HashMap<String, u32>,
    tokens: HashMap<u32, String>,
}

impl Vocabulary {
    /// Load a vocabulary from a JSON object of `token -> id`.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, LoadError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(LoadError::NotFound(path.to_path_buf()));
        }
        let text = std::fs::read_to_string(path).map_err(|source| LoadError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let vocab = Self::parse(&text, &path.display().to_string())?;
        log::info!("loaded {} tokens from {}", vocab.len(), path.display());
        Ok(vocab)
    }

    pub fn from_json_str(text: &str) -> Result<Self, LoadError> {
        Self::parse(text, "vocabulary")
    }

    /// Build a vocabulary from `(token, id)` pairs. Tokens and ids must both
    /// be unique; repeating an identical pair is accepted.
    pub fn from_pairs<I, S>(pairs: I) -> Result<Self, LoadError>
    where
        I: IntoIterator<Item = (S, u32)>,
        S: Into<String>,
    {
        let mut ids: HashMap<String, u32> = HashMap::new();
        let mut tokens: HashMap<u32, String> = HashMap::new();
        for (token, id) in pairs {
            let token = token.into();
            if let Some(first) = tokens.get(&id) {
                if *first != token {
                    return Err(LoadError::DuplicateId {
                        id,
                        first: first.clone(),
                        second: token,
                    });
                }
            }
            if let Some(&first) = ids.get(&token) {
                if first != id {
                    return Err(LoadError::DuplicateToken {
                        token,
                        first,
                        second: id,
                    });
                }
            }
            tokens.insert(id, token.clone());
            ids.insert(token, id);
        }
        Ok(Self { ids, tokens })
    }

    fn parse(text: &str, what: &str) -> Result<Self, LoadError> {
        let raw: HashMap<String, u32> =
            serde_json::from_str(text).map_err(|source| LoadError::Parse {
                what: what.to_string(),
                source,
            })?;
        // Sort so a duplicate id is reported the same way on every run.
        let mut pairs: Vec<(String, u32)> = raw.into_iter().collect();
        pairs.sort_by(|a, b| a.1.cmp(&b.1).then_with(|| a.0.cmp(&b.0)));
        Self::from_pairs(pairs)
    }

    pub fn id_of(&self, token: &str) -> Option<u32> {
        self.ids.get(token).copied()
    }

    pub fn token(&self, id: u32) -> Option<&str> {
        self.tokens.get(&id).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_load_inverts_table() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, r#"{{"hello": 1, "world": 2, "<0x0A>": 13}}"#).unwrap();

        let vocab = Vocabulary::load(file.path()).unwrap();
        assert_eq!(vocab.len(), 3);
        assert_eq!(vocab.token(1), Some("hello"));
        assert_eq!(vocab.token(13), Some("<0x0A>"));
        assert_eq!(vocab.id_of("world"), Some(2));
        assert_eq!(vocab.id_of("<0x0A>"), Some(13));
    }

    #[test]
    fn test_missing_file_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("vocab.json");
        match Vocabulary::load(&path) {
            Err(LoadError::NotFound(p)) => assert_eq!(p, path),
            other => panic!("expected NotFound, got {:?}", other),
        }
    }

    #[test]
    fn test_malformed_content_is_parse_error() {
        assert!(matches!(
            Vocabulary::from_json_str("[1, 2, 3]"),
            Err(LoadError::Parse { .. })
        ));
        assert!(matches!(
            Vocabulary::from_json_str(r#"{"a": -1}"#),
            Err(LoadError::Parse { .. })
        ));
        assert!(matches!(
            Vocabulary::from_json_str(r#"{"a": "one"}"#),
            Err(LoadError::Parse { .. })
        ));
    }

    #[test]
    fn test_duplicate_ids_rejected() {
        let err = Vocabulary::from_json_str(r#"{"a": 4, "b": 4}"#).unwrap_err();
        match err {
            LoadError::DuplicateId { id, first, second } => {
                assert_eq!(id, 4);
                assert_eq!(first, "a");
                assert_eq!(second, "b");
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_duplicate_tokens_rejected() {
        match Vocabulary::from_pairs([("a", 1u32), ("a", 2)]) {
            Err(LoadError::DuplicateToken {
                token,
                first,
                second,
            }) => {
                assert_eq!(token, "a");
                assert_eq!(first, 1);
                assert_eq!(second, 2);
            }
            other => panic!("expected DuplicateToken, got {:?}", other),
        }

        let vocab = Vocabulary::from_pairs([("a", 1u32), ("a", 1), ("b", 2)]).unwrap();
        assert_eq!(vocab.len(), 2);
        assert_eq!(vocab.id_of("a"), Some(1));
    }

    #[test]
    fn test_unknown_id_lookup() {
        let vocab = Vocabulary::from_pairs([("x", 0u32)]).unwrap();
        assert_eq!(vocab.token(7), None);
        assert_eq!(vocab.id_of("y"), None);
        assert!(!vocab.is_empty());
    }
}
