use thiserror::Error;

pub type Result<T, E = CheckoutError> = std::result::Result<T, E>;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CheckoutError {
    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    InsufficientStock(String),

    #[error("Invalid payload: {0}")]
    BadPayload(String),

    #[error("Decryption failed: {0}")]
    Decryption(String),

    #[error("Payment gateway error: {0}")]
    Gateway(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl CheckoutError {
    pub fn storage(err: impl std::fmt::Display) -> Self {
        CheckoutError::Storage(err.to_string())
    }

    pub fn gateway(err: impl std::fmt::Display) -> Self {
        CheckoutError::Gateway(err.to_string())
    }

    /// Caused by the caller's input; carries a message safe to show them.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            CheckoutError::Validation(_)
                | CheckoutError::NotFound(_)
                | CheckoutError::InsufficientStock(_)
                | CheckoutError::BadPayload(_)
        )
    }

    /// Safe to re-run the same request: every mutating path is conditional.
    pub fn is_retryable(&self) -> bool {
        matches!(self, CheckoutError::Storage(_) | CheckoutError::Gateway(_))
    }
}
