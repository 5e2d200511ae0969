use std::collections::HashSet;
use std::path::Path;

use anyhow::{Error, Result};
use tokenizers::tokenizer::Tokenizer as HfTokenizer;

use super::traits::{Decoder, TokenIdType, TokenPiece, Tokenizer as TokenizerTrait};

/// HuggingFace tokenizer wrapper
pub struct HuggingFaceTokenizer {
    tokenizer: HfTokenizer,
    special_ids: HashSet<TokenIdType>,
}

impl HuggingFaceTokenizer {
    /// Create a tokenizer from a `tokenizer.json` file, or a model directory containing one
    pub fn from_file(file_path: &str) -> Result<Self> {
        let path = Path::new(file_path);
        let path = if path.is_dir() {
            path.join("tokenizer.json")
        } else {
            path.to_path_buf()
        };

        let tokenizer = HfTokenizer::from_file(&path).map_err(|e| {
            Error::msg(format!(
                "Failed to load tokenizer from {}: {}",
                path.display(),
                e
            ))
        })?;

        Ok(Self::from_tokenizer(tokenizer))
    }

    /// Create from an existing HuggingFace tokenizer
    pub fn from_tokenizer(tokenizer: HfTokenizer) -> Self {
        let special_ids = tokenizer
            .get_added_tokens_decoder()
            .iter()
            .filter(|(_, token)| token.special)
            .map(|(id, _)| *id)
            .collect();

        HuggingFaceTokenizer {
            tokenizer,
            special_ids,
        }
    }

    fn decode_plain(&self, token_ids: &[TokenIdType], skip_special_tokens: bool) -> Result<String> {
        self.tokenizer
            .decode(token_ids, skip_special_tokens)
            .map_err(|e| Error::msg(format!("Decoding failed: {}", e)))
    }
}

impl Decoder for HuggingFaceTokenizer {
    fn decode(
        &self,
        token_ids: &[TokenIdType],
        skip_special_tokens: bool,
        spaces_between_special_tokens: bool,
    ) -> Result<String> {
        // the library silently drops unknown ids
        if let Some(id) = token_ids
            .iter()
            .find(|&&id| self.tokenizer.id_to_token(id).is_none())
        {
            return Err(Error::msg(format!("Decoding failed: unknown token id {}", id)));
        }

        let has_special = token_ids.iter().any(|id| self.special_ids.contains(id));
        if skip_special_tokens || spaces_between_special_tokens || !has_special {
            return self.decode_plain(token_ids, skip_special_tokens);
        }

        // Glue special tokens directly to the neighbouring text runs.
        let mut text = String::new();
        let mut run_start = 0;
        for (i, id) in token_ids.iter().enumerate() {
            if self.special_ids.contains(id) {
                if run_start < i {
                    text.push_str(&self.decode_plain(&token_ids[run_start..i], false)?);
                }
                text.push_str(&self.decode_plain(&token_ids[i..=i], false)?);
                run_start = i + 1;
            }
        }
        if run_start < token_ids.len() {
            text.push_str(&self.decode_plain(&token_ids[run_start..], false)?);
        }
        Ok(text)
    }
}

impl TokenizerTrait for HuggingFaceTokenizer {
    fn vocab_size(&self) -> usize {
        self.tokenizer.get_vocab_size(true)
    }

    fn token_to_piece(&self, id: TokenIdType) -> Option<TokenPiece> {
        self.tokenizer.id_to_token(id).map(TokenPiece::Text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    const TOKENIZER_JSON: &str = r#"{
        "version": "1.0",
        "truncation": null,
        "padding": null,
        "added_tokens": [
            {"id": 3, "content": "<s>", "single_word": false, "lstrip": false, "rstrip": false, "normalized": false, "special": true},
            {"id": 4, "content": "</s>", "single_word": false, "lstrip": false, "rstrip": false, "normalized": false, "special": true}
        ],
        "normalizer": null,
        "pre_tokenizer": null,
        "post_processor": null,
        "decoder": null,
        "model": {
            "type": "WordLevel",
            "vocab": {"<unk>": 0, "▁Hello": 1, "▁world": 2, "<s>": 3, "</s>": 4},
            "unk_token": "<unk>"
        }
    }"#;

    fn tokenizer() -> HuggingFaceTokenizer {
        HuggingFaceTokenizer::from_tokenizer(HfTokenizer::from_str(TOKENIZER_JSON).unwrap())
    }

    #[test]
    fn test_token_to_piece_returns_raw_vocab_entry() {
        let tokenizer = tokenizer();
        assert_eq!(
            tokenizer.token_to_piece(1),
            Some(TokenPiece::Text("▁Hello".to_string()))
        );
        assert_eq!(tokenizer.token_to_piece(42), None);
    }

    #[test]
    fn test_decode_skip_special_tokens() {
        let tokenizer = tokenizer();
        let text = tokenizer.decode(&[3, 1, 2, 4], true, true).unwrap();
        assert_eq!(text, "▁Hello ▁world");
    }

    #[test]
    fn test_decode_without_spaces_between_special_tokens() {
        let tokenizer = tokenizer();
        let glued = tokenizer.decode(&[3, 1, 2, 4], false, false).unwrap();
        assert_eq!(glued, "<s>▁Hello ▁world</s>");

        let spaced = tokenizer.decode(&[3, 1, 2, 4], false, true).unwrap();
        assert_eq!(spaced, "<s> ▁Hello ▁world </s>");
    }

    #[test]
    fn test_decode_unknown_id_fails() {
        let tokenizer = tokenizer();
        assert!(tokenizer.decode(&[1, 99], true, true).is_err());
    }

    #[test]
    fn test_missing_file_fails() {
        assert!(HuggingFaceTokenizer::from_file("/nonexistent/tokenizer.json").is_err());
    }
}
