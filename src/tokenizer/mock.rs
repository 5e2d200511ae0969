//! Mock tokenizer implementation for testing

use std::collections::{HashMap, HashSet};

use anyhow::{Result, anyhow};

use super::traits::{Decoder, TokenIdType, TokenPiece, Tokenizer as TokenizerTrait};
use super::SPIECE_UNDERLINE;

/// SentencePiece-flavoured mock: `▁` marks word starts and a leading marker is
/// dropped on decode, like real Llama-style tokenizers do.
pub struct MockTokenizer {
    vocab: HashMap<TokenIdType, TokenPiece>,
    special_ids: HashSet<TokenIdType>,
}

impl Default for MockTokenizer {
    fn default() -> Self {
        Self::new()
    }
}

impl MockTokenizer {
    pub fn new() -> Self {
        let text_tokens = [
            (1, "<s>"),
            (2, "</s>"),
            (15043, "▁Hello"),
            (3186, "▁world"),
            (1738, "!"),
            (17356, "▁STOP"),
            (3057, "▁test"),
            (292, "ing"),
            (29892, ","),
        ];
        let byte_tokens: [(TokenIdType, &[u8]); 2] = [
            // "▁hi" as raw UTF-8
            (300, &[0xE2, 0x96, 0x81, b'h', b'i']),
            // invalid lead byte followed by "a"
            (301, &[0xFF, b'a']),
        ];

        let mut vocab = HashMap::new();
        for (id, token) in text_tokens {
            vocab.insert(id, TokenPiece::Text(token.to_string()));
        }
        for (id, bytes) in byte_tokens {
            vocab.insert(id, TokenPiece::Bytes(bytes.to_vec()));
        }

        Self {
            vocab,
            special_ids: HashSet::from([1, 2]),
        }
    }

    fn piece(&self, id: TokenIdType) -> Result<String> {
        self.vocab
            .get(&id)
            .cloned()
            .map(TokenPiece::into_text_lossy)
            .ok_or_else(|| anyhow!("token id {} is out of range", id))
    }

    fn decode_run(&self, run: &[TokenIdType]) -> Result<String> {
        let mut text = String::new();
        for &id in run {
            text.push_str(&self.piece(id)?);
        }
        let text = text.replace(SPIECE_UNDERLINE, " ");
        Ok(text.strip_prefix(' ').map(str::to_string).unwrap_or(text))
    }
}

impl Decoder for MockTokenizer {
    fn decode(
        &self,
        token_ids: &[TokenIdType],
        skip_special_tokens: bool,
        spaces_between_special_tokens: bool,
    ) -> Result<String> {
        let mut sub_texts = Vec::new();
        let mut run = Vec::new();
        for &id in token_ids {
            if self.special_ids.contains(&id) {
                if skip_special_tokens {
                    continue;
                }
                if !run.is_empty() {
                    sub_texts.push(self.decode_run(&run)?);
                    run.clear();
                }
                sub_texts.push(self.piece(id)?);
            } else {
                run.push(id);
            }
        }
        if !run.is_empty() {
            sub_texts.push(self.decode_run(&run)?);
        }

        let separator = if spaces_between_special_tokens { " " } else { "" };
        Ok(sub_texts.join(separator))
    }
}

impl TokenizerTrait for MockTokenizer {
    fn vocab_size(&self) -> usize {
        self.vocab.len()
    }

    fn token_to_piece(&self, id: TokenIdType) -> Option<TokenPiece> {
        self.vocab.get(&id).cloned()
    }
}
