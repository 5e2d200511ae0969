use crate::tokenizer::TokenIdType;

/// Fatal conditions of the detokenizer. None of them is retried; the supervisor restarts us.
#[derive(Debug, thiserror::Error)]
pub enum DetokenizerError {
    #[error("Initialization failed: {0:#}")]
    Init(anyhow::Error),

    #[error("Protocol violation: {reason}")]
    ProtocolViolation { reason: String },

    #[error("Decode failed: {0:#}")]
    Decode(anyhow::Error),

    /// A backend decoded the sequence but has no vocabulary entry for its first id.
    /// The bundled backends already fail in `decode`; this catches backends that don't.
    #[error("Unknown token id {id} at batch index {index}")]
    UnknownToken { id: TokenIdType, index: usize },

    #[error("Transport error: {0}")]
    Transport(#[from] std::io::Error),

    #[error("Inbound channel closed")]
    ChannelClosed,
}

impl DetokenizerError {
    pub fn protocol(reason: impl Into<String>) -> Self {
        DetokenizerError::ProtocolViolation {
            reason: reason.into(),
        }
    }
}

pub type DetokenizerResult<T> = Result<T, DetokenizerError>;
