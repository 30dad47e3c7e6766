//! VITS character tokenizer.
//!
//! MMS-TTS checkpoints ship a character vocabulary (`vocab.json`) and a small
//! `tokenizer_config.json`. Encoding is:
//!
//! ```text
//! text → normalize (lowercase anything not already a vocab token)
//!      → drop characters outside the vocabulary → trim
//!      → one id per character → intersperse blank (id 0) if add_blank
//! ```

use std::collections::HashMap;

use serde::Deserialize;
use thiserror::Error;

/// Id interspersed between characters when `add_blank` is set.
pub const BLANK_ID: i64 = 0;

#[derive(Debug, Error)]
pub enum TokenizerError {
    #[error("invalid vocab.json: {0}")]
    Vocab(#[source] serde_json::Error),
    #[error("invalid tokenizer_config.json: {0}")]
    Config(#[source] serde_json::Error),
    #[error("vocabulary is empty")]
    EmptyVocab,
    #[error("phonemized checkpoints are not supported")]
    PhonemizeUnsupported,
}

/// Flags read from `tokenizer_config.json`. Missing keys take the defaults
/// transformers uses for `VitsTokenizer`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct TokenizerConfig {
    pub add_blank: bool,
    pub normalize: bool,
    pub phonemize: bool,
    pub is_uroman: bool,
    pub language: Option<String>,
}

impl Default for TokenizerConfig {
    fn default() -> Self {
        Self {
            add_blank: true,
            normalize: true,
            phonemize: false,
            is_uroman: false,
            language: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct VitsTokenizer {
    /// Tokens in vocabulary file order; normalization matches in this order.
    tokens: Vec<String>,
    ids: HashMap<char, i64>,
    config: TokenizerConfig,
}

impl VitsTokenizer {
    /// Build from the raw contents of `vocab.json` and, if present,
    /// `tokenizer_config.json`.
    pub fn from_json(vocab: &str, config: Option<&str>) -> Result<Self, TokenizerError> {
        let vocab: serde_json::Map<String, serde_json::Value> =
            serde_json::from_str(vocab).map_err(TokenizerError::Vocab)?;
        let config = match config {
            Some(raw) => serde_json::from_str(raw).map_err(TokenizerError::Config)?,
            None => TokenizerConfig::default(),
        };

        let mut entries = Vec::with_capacity(vocab.len());
        for (token, id) in vocab {
            let id: i64 = serde_json::from_value(id).map_err(TokenizerError::Vocab)?;
            entries.push((token, id));
        }
        Self::new(entries, config)
    }

    /// Build from `(token, id)` pairs in vocabulary order.
    pub fn new(
        entries: impl IntoIterator<Item = (String, i64)>,
        config: TokenizerConfig,
    ) -> Result<Self, TokenizerError> {
        if config.phonemize {
            return Err(TokenizerError::PhonemizeUnsupported);
        }

        let mut tokens = Vec::new();
        let mut ids = HashMap::new();
        for (token, id) in entries {
            // Only single characters survive filtering, so only they need ids.
            let mut chars = token.chars();
            if let (Some(c), None) = (chars.next(), chars.next()) {
                ids.entry(c).or_insert(id);
            }
            tokens.push(token);
        }
        if tokens.is_empty() {
            return Err(TokenizerError::EmptyVocab);
        }

        Ok(Self {
            tokens,
            ids,
            config,
        })
    }

    pub fn config(&self) -> &TokenizerConfig {
        &self.config
    }

    /// Lowercase every character that does not start a vocabulary token.
    fn normalize(&self, text: &str) -> String {
        let mut out = String::with_capacity(text.len());
        let mut rest = text;
        while let Some(c) = rest.chars().next() {
            match self
                .tokens
                .iter()
                .find(|t| !t.is_empty() && rest.starts_with(t.as_str()))
            {
                Some(token) => {
                    out.push_str(token);
                    rest = &rest[token.len()..];
                }
                None => {
                    out.extend(c.to_lowercase());
                    rest = &rest[c.len_utf8()..];
                }
            }
        }
        out
    }

    /// Normalized text as the model will see it, before blanks are added.
    pub fn prepare(&self, text: &str) -> String {
        let mut text = if self.config.normalize {
            self.normalize(text)
        } else {
            text.to_string()
        };
        if self.config.language.as_deref() == Some("ron") {
            text = text.replace('ţ', "ț");
        }
        let kept: String = text.chars().filter(|c| self.ids.contains_key(c)).collect();
        kept.trim().to_string()
    }

    /// Encode text into model input ids.
    pub fn encode(&self, text: &str) -> Vec<i64> {
        let chars: Vec<i64> = self
            .prepare(text)
            .chars()
            .filter_map(|c| self.ids.get(&c).copied())
            .collect();
        if !self.config.add_blank {
            return chars;
        }
        let mut ids = Vec::with_capacity(chars.len() * 2 + 1);
        ids.push(BLANK_ID);
        for id in chars {
            ids.push(id);
            ids.push(BLANK_ID);
        }
        ids
    }
}
