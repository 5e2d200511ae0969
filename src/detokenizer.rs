//! Turns one batch of cumulative token ids into cumulative text.

use log::debug;

use crate::error::{DetokenizerError, DetokenizerResult};
use crate::io_struct::{BatchStrOut, BatchTokenIdOut};
use crate::tokenizer::{SPIECE_UNDERLINE, TokenIdType, Tokenizer};

/// Decode options applied to a whole batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecodeOptions {
    pub skip_special_tokens: bool,
    pub spaces_between_special_tokens: bool,
}

impl Default for DecodeOptions {
    fn default() -> Self {
        Self {
            skip_special_tokens: true,
            spaces_between_special_tokens: true,
        }
    }
}

impl DecodeOptions {
    /// Only the first request's options are honored for the whole batch.
    // TODO: honor skip_special_tokens / spaces_between_special_tokens per request
    pub fn from_batch(batch: &BatchTokenIdOut) -> Self {
        let defaults = Self::default();
        Self {
            skip_special_tokens: batch
                .skip_special_tokens
                .first()
                .copied()
                .unwrap_or(defaults.skip_special_tokens),
            spaces_between_special_tokens: batch
                .spaces_between_special_tokens
                .first()
                .copied()
                .unwrap_or(defaults.spaces_between_special_tokens),
        }
    }
}

/// Cuts `text` just before the first occurrence of `matched`.
///
/// Returns false when the stop string is absent, which happens when token and
/// text boundaries disagree; the text is then left alone.
pub fn trim_stop_str(text: &mut String, matched: &str) -> bool {
    match text.find(matched) {
        Some(pos) => {
            text.truncate(pos);
            true
        }
        None => false,
    }
}

/// Stateless batch detokenizer; the tokenizer is only read.
#[derive(Clone)]
pub struct BatchDetokenizer {
    tokenizer: Tokenizer,
}

impl BatchDetokenizer {
    pub fn new(tokenizer: Tokenizer) -> Self {
        Self { tokenizer }
    }

    pub fn tokenizer(&self) -> &Tokenizer {
        &self.tokenizer
    }

    /// Decode every item's full token sequence and restore dropped word boundaries.
    pub fn decode_batch(
        &self,
        token_sequences: &[Vec<TokenIdType>],
        options: DecodeOptions,
    ) -> DetokenizerResult<Vec<String>> {
        let mut deltas = self
            .tokenizer
            .batch_decode(
                token_sequences,
                options.skip_special_tokens,
                options.spaces_between_special_tokens,
            )
            .map_err(DetokenizerError::Decode)?;

        for (index, (ids, delta)) in token_sequences.iter().zip(deltas.iter_mut()).enumerate() {
            if self.starts_new_word(ids, index)? {
                delta.insert(0, ' ');
            }
        }
        Ok(deltas)
    }

    /// Whether the first token carries the word-boundary marker that decode drops.
    fn starts_new_word(&self, ids: &[TokenIdType], index: usize) -> DetokenizerResult<bool> {
        let Some(&first) = ids.first() else {
            return Ok(false);
        };
        let piece = self
            .tokenizer
            .token_to_piece(first)
            .ok_or(DetokenizerError::UnknownToken { id: first, index })?;
        Ok(piece.into_text_lossy().starts_with(SPIECE_UNDERLINE))
    }

    /// Process one inbound batch into its outbound record, index for index.
    pub fn process(&self, batch: BatchTokenIdOut) -> DetokenizerResult<BatchStrOut> {
        batch.validate().map_err(DetokenizerError::protocol)?;

        let options = DecodeOptions::from_batch(&batch);
        let deltas = self.decode_batch(&batch.token_sequences, options)?;

        let BatchTokenIdOut {
            request_ids,
            previous_text,
            finish_status,
            meta_info,
            ..
        } = batch;

        let output_text = previous_text
            .into_iter()
            .zip(deltas)
            .zip(&finish_status)
            .zip(&request_ids)
            .map(|(((mut text, delta), finish), rid)| {
                text.push_str(&delta);
                if let Some(matched) = finish.matched_stop() {
                    if !trim_stop_str(&mut text, matched) {
                        debug!("Stop string {:?} not found in output of {}", matched, rid);
                    }
                }
                text
            })
            .collect();

        Ok(BatchStrOut {
            request_ids,
            output_text,
            meta_info,
            finish_status,
        })
    }
}
