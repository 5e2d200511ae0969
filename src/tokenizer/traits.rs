use anyhow::Result;

/// Type alias for token IDs
pub type TokenIdType = u32;

/// Surface form of a single vocabulary entry.
///
/// Most tokenizers hand back text, byte-level vocabularies may hand back raw bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenPiece {
    Text(String),
    Bytes(Vec<u8>),
}

impl TokenPiece {
    /// Text form of the piece, replacing invalid UTF-8 sequences.
    pub fn into_text_lossy(self) -> String {
        match self {
            TokenPiece::Text(text) => text,
            TokenPiece::Bytes(bytes) => String::from_utf8_lossy(&bytes).into_owned(),
        }
    }
}

/// Core decoding trait
pub trait Decoder: Send + Sync {
    fn decode(
        &self,
        token_ids: &[TokenIdType],
        skip_special_tokens: bool,
        spaces_between_special_tokens: bool,
    ) -> Result<String>;

    /// Decode many sequences with the same options.
    fn batch_decode(
        &self,
        sequences: &[Vec<TokenIdType>],
        skip_special_tokens: bool,
        spaces_between_special_tokens: bool,
    ) -> Result<Vec<String>> {
        sequences
            .iter()
            .map(|ids| self.decode(ids, skip_special_tokens, spaces_between_special_tokens))
            .collect()
    }
}

/// Combined tokenizer trait
pub trait Tokenizer: Decoder {
    fn vocab_size(&self) -> usize;

    /// Vocabulary entry for a single id, `None` when the id is out of range.
    fn token_to_piece(&self, id: TokenIdType) -> Option<TokenPiece>;
}
