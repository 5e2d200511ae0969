use std::time::Duration;

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for field '{field}': {value} - {reason}")]
    InvalidValue {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Missing required field: {field}")]
    MissingRequired { field: String },
}

/// Result type for configuration operations
pub type ConfigResult<T> = Result<T, ConfigError>;

pub const DEFAULT_HOST: &str = "127.0.0.1";
pub const DEFAULT_CHANNEL_CAPACITY: usize = 16;
pub const DEFAULT_MAX_FRAME_SIZE: usize = 256 * 1024 * 1024;
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 30;

#[derive(Debug, Clone, PartialEq)]
pub struct DetokenizerConfig {
    /// Local address both channel endpoints use
    pub host: String,
    /// Port we bind to receive token batches on
    pub detokenizer_port: u16,
    /// Port of the downstream consumer we push text batches to
    pub tokenizer_port: u16,
    /// `tokenizer.json` file or model directory
    pub tokenizer_path: String,
    /// Inbound batches buffered before producers are pushed back
    pub channel_capacity: usize,
    pub max_frame_size: usize,
    pub connect_timeout_secs: u64,
}

impl Default for DetokenizerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            detokenizer_port: 0,
            tokenizer_port: 0,
            tokenizer_path: String::new(),
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
            max_frame_size: DEFAULT_MAX_FRAME_SIZE,
            connect_timeout_secs: DEFAULT_CONNECT_TIMEOUT_SECS,
        }
    }
}

impl DetokenizerConfig {
    pub fn inbound_addr(&self) -> String {
        format!("{}:{}", self.host, self.detokenizer_port)
    }

    pub fn outbound_addr(&self) -> String {
        format!("{}:{}", self.host, self.tokenizer_port)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    pub fn validate(&self) -> ConfigResult<()> {
        if self.host.is_empty() {
            return Err(ConfigError::MissingRequired {
                field: "host".to_string(),
            });
        }
        if self.tokenizer_path.is_empty() {
            return Err(ConfigError::MissingRequired {
                field: "tokenizer_path".to_string(),
            });
        }
        if self.tokenizer_port == 0 {
            return Err(ConfigError::InvalidValue {
                field: "tokenizer_port".to_string(),
                value: "0".to_string(),
                reason: "consumer port must be set".to_string(),
            });
        }
        if self.detokenizer_port != 0 && self.detokenizer_port == self.tokenizer_port {
            return Err(ConfigError::InvalidValue {
                field: "detokenizer_port".to_string(),
                value: self.detokenizer_port.to_string(),
                reason: "must differ from tokenizer_port".to_string(),
            });
        }
        if self.channel_capacity == 0 {
            return Err(ConfigError::InvalidValue {
                field: "channel_capacity".to_string(),
                value: "0".to_string(),
                reason: "must be at least 1".to_string(),
            });
        }
        if self.max_frame_size == 0 || self.max_frame_size > u32::MAX as usize {
            return Err(ConfigError::InvalidValue {
                field: "max_frame_size".to_string(),
                value: self.max_frame_size.to_string(),
                reason: format!("must be between 1 and {}", u32::MAX),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid() -> DetokenizerConfig {
        DetokenizerConfig {
            detokenizer_port: 30001,
            tokenizer_port: 30002,
            tokenizer_path: "/models/llama".to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_valid_config() {
        let config = valid();
        assert!(config.validate().is_ok());
        assert_eq!(config.inbound_addr(), "127.0.0.1:30001");
        assert_eq!(config.outbound_addr(), "127.0.0.1:30002");
        assert_eq!(config.connect_timeout(), Duration::from_secs(30));
    }

    #[test]
    fn test_missing_tokenizer_path() {
        let config = DetokenizerConfig {
            tokenizer_path: String::new(),
            ..valid()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::MissingRequired { field }) if field == "tokenizer_path"
        ));
    }

    #[test]
    fn test_port_clash() {
        let config = DetokenizerConfig {
            detokenizer_port: 30002,
            ..valid()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidValue { field, .. }) if field == "detokenizer_port"
        ));
    }

    #[test]
    fn test_zero_capacity() {
        let config = DetokenizerConfig {
            channel_capacity: 0,
            ..valid()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_ephemeral_inbound_port_allowed() {
        let config = DetokenizerConfig {
            detokenizer_port: 0,
            ..valid()
        };
        assert!(config.validate().is_ok());
    }
}
