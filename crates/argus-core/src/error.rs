use thiserror::Error;

/// Application-wide error types for Argus.
#[derive(Error, Debug)]
pub enum AppError {
    /// Transient fetch failure (timeout, connection reset, malformed body).
    #[error("transient fetch failure: {0}")]
    Transient(String),

    /// The site served a bot challenge instead of real content.
    #[error("bot challenge served for {0}")]
    BotDetected(String),

    /// Invalid or missing configuration. Fatal at startup, never mid-run.
    #[error("configuration error: {0}")]
    Config(String),

    /// The downstream sink rejected the record set.
    #[error("sink error: {0}")]
    Sink(String),
}

impl AppError {
    /// Returns true if this error is worth retrying with a fresh proxy.
    pub fn is_retryable(&self) -> bool {
        matches!(self, AppError::Transient(_) | AppError::BotDetected(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_errors() {
        assert!(AppError::Transient("timeout".into()).is_retryable());
        assert!(AppError::BotDetected("https://example.com/p/1".into()).is_retryable());
        assert!(!AppError::Config("empty proxy pool".into()).is_retryable());
        assert!(!AppError::Sink("disk full".into()).is_retryable());
    }
}
