use anyhow::Result;
use std::sync::Arc;

pub mod huggingface;
pub mod mock;
pub mod traits;


pub use traits::{Decoder, TokenIdType, TokenPiece, Tokenizer as TokenizerTrait};

/// SentencePiece word-boundary marker (U+2581)
pub const SPIECE_UNDERLINE: char = '\u{2581}';

/// Main tokenizer wrapper that provides a unified interface for different tokenizer implementations
#[derive(Clone)]
pub struct Tokenizer(Arc<dyn traits::Tokenizer>);

impl Tokenizer {
    /// Load a HuggingFace tokenizer from a `tokenizer.json` file or model directory
    pub fn from_file(file_path: &str) -> Result<Tokenizer> {
        let tokenizer = huggingface::HuggingFaceTokenizer::from_file(file_path)?;
        Ok(Tokenizer(Arc::new(tokenizer)))
    }

    /// Create a tokenizer from an Arc<dyn Tokenizer>
    pub fn from_arc(tokenizer: Arc<dyn traits::Tokenizer>) -> Self {
        Tokenizer(tokenizer)
    }

    pub fn decode(
        &self,
        token_ids: &[TokenIdType],
        skip_special_tokens: bool,
        spaces_between_special_tokens: bool,
    ) -> Result<String> {
        self.0
            .decode(token_ids, skip_special_tokens, spaces_between_special_tokens)
    }

    pub fn batch_decode(
        &self,
        sequences: &[Vec<TokenIdType>],
        skip_special_tokens: bool,
        spaces_between_special_tokens: bool,
    ) -> Result<Vec<String>> {
        self.0
            .batch_decode(sequences, skip_special_tokens, spaces_between_special_tokens)
    }

    pub fn vocab_size(&self) -> usize {
        self.0.vocab_size()
    }

    pub fn token_to_piece(&self, id: TokenIdType) -> Option<TokenPiece> {
        self.0.token_to_piece(id)
    }
}
