use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::tokenizer::traits::TokenIdType;

/// Version stamped on every record crossing the inbound/outbound channels.
pub const WIRE_VERSION: u32 = 1;

/// Why (or whether) generation ended for one request.
///
/// Computed upstream; this crate only reacts to it.
#[derive(Debug, Clone, PartialEq, Default, Deserialize, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FinishReason {
    #[default]
    NotFinished,
    /// Generation hit a caller-supplied stop string.
    MatchedStop { matched: String },
    /// Any other finish kind (length, matched token, abort, ...), passed through untouched.
    Other {
        #[serde(default)]
        payload: Value,
    },
}

impl FinishReason {
    /// The stop string to trim at, if this item finished on one.
    pub fn matched_stop(&self) -> Option<&str> {
        match self {
            FinishReason::MatchedStop { matched } => Some(matched),
            _ => None,
        }
    }
}

/// One generation step across many concurrent requests, index-aligned per item.
#[derive(Debug, Clone, PartialEq, Default, Deserialize, Serialize)]
pub struct BatchTokenIdOut {
    pub request_ids: Vec<String>,
    /// Cumulative tokens produced so far for each request.
    pub token_sequences: Vec<Vec<TokenIdType>>,
    pub skip_special_tokens: Vec<bool>,
    pub spaces_between_special_tokens: Vec<bool>,
    /// Text already emitted for each request before this batch.
    pub previous_text: Vec<String>,
    pub finish_status: Vec<FinishReason>,
    pub meta_info: Vec<Value>,
}

impl BatchTokenIdOut {
    pub fn len(&self) -> usize {
        self.request_ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.request_ids.is_empty()
    }

    /// Checks that every per-item field carries exactly one entry per request.
    pub fn validate(&self) -> Result<(), String> {
        let expected = self.len();
        let fields = [
            ("token_sequences", self.token_sequences.len()),
            ("skip_special_tokens", self.skip_special_tokens.len()),
            (
                "spaces_between_special_tokens",
                self.spaces_between_special_tokens.len(),
            ),
            ("previous_text", self.previous_text.len()),
            ("finish_status", self.finish_status.len()),
            ("meta_info", self.meta_info.len()),
        ];
        for (name, len) in fields {
            if len != expected {
                return Err(format!(
                    "field '{}' has {} entries but batch has {} request ids",
                    name, len, expected
                ));
            }
        }
        Ok(())
    }
}

/// Detokenized text for one batch, index-aligned 1:1 with the inbound record.
#[derive(Debug, Clone, PartialEq, Default, Deserialize, Serialize)]
pub struct BatchStrOut {
    pub request_ids: Vec<String>,
    pub output_text: Vec<String>,
    pub meta_info: Vec<Value>,
    pub finish_status: Vec<FinishReason>,
}

/// Versioned envelope around a record on the wire.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct WireRecord<T> {
    pub version: u32,
    pub record: T,
}

impl<T> WireRecord<T> {
    pub fn new(record: T) -> Self {
        Self {
            version: WIRE_VERSION,
            record,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample_batch() -> BatchTokenIdOut {
        BatchTokenIdOut {
            request_ids: vec!["a".to_string(), "b".to_string()],
            token_sequences: vec![vec![1, 2], vec![3]],
            skip_special_tokens: vec![true, false],
            spaces_between_special_tokens: vec![true, true],
            previous_text: vec![String::new(), "Hi".to_string()],
            finish_status: vec![
                FinishReason::NotFinished,
                FinishReason::MatchedStop {
                    matched: "STOP".to_string(),
                },
            ],
            meta_info: vec![json!({"prompt_tokens": 3}), json!(null)],
        }
    }

    #[test]
    fn test_finish_reason_wire_format() {
        let value = serde_json::to_value(FinishReason::MatchedStop {
            matched: "</s>".to_string(),
        })
        .unwrap();
        assert_eq!(value, json!({"type": "matched_stop", "matched": "</s>"}));

        let parsed: FinishReason = serde_json::from_value(json!({"type": "not_finished"})).unwrap();
        assert_eq!(parsed, FinishReason::NotFinished);
    }

    #[test]
    fn test_other_finish_reason_keeps_payload() {
        let raw = json!({"type": "other", "payload": {"type": "length", "length": 128}});
        let parsed: FinishReason = serde_json::from_value(raw.clone()).unwrap();
        assert_eq!(
            parsed,
            FinishReason::Other {
                payload: json!({"type": "length", "length": 128})
            }
        );
        assert_eq!(parsed.matched_stop(), None);
        assert_eq!(serde_json::to_value(&parsed).unwrap(), raw);
    }

    #[test]
    fn test_validate_accepts_aligned_batch() {
        let batch = sample_batch();
        assert_eq!(batch.len(), 2);
        assert!(batch.validate().is_ok());
        assert!(BatchTokenIdOut::default().validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_misaligned_batch() {
        let mut batch = sample_batch();
        batch.previous_text.pop();
        let err = batch.validate().unwrap_err();
        assert!(err.contains("previous_text"));
    }

    #[test]
    fn test_wire_record_is_versioned() {
        let wire = WireRecord::new(sample_batch());
        let value = serde_json::to_value(&wire).unwrap();
        assert_eq!(value["version"], json!(WIRE_VERSION));
        assert_eq!(value["record"]["request_ids"], json!(["a", "b"]));
    }
}
