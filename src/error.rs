use thiserror::Error;

#[derive(Error, Debug)]
pub enum KotizError {
    #[error("Validation error: {0}")]
    Validation(String),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Invalid state: {0}")]
    InvalidState(String),
    #[error("Payment initiation failed ({code}): {message}")]
    PaymentInitiation { code: String, message: String },
    #[error("Invalid webhook: {0}")]
    InvalidWebhook(String),
    #[error("Forbidden: {0}")]
    Forbidden(String),
    #[error("Gateway error: {0}")]
    Gateway(String),
    #[error("Storage error: {0}")]
    Storage(String),
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Configuration error: {0}")]
    Config(String),
}

impl KotizError {
    /// Stable machine-readable code, suitable for client-side handling.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Validation(_) => "validation_error",
            Self::NotFound(_) => "not_found",
            Self::InvalidState(_) => "invalid_state",
            Self::PaymentInitiation { .. } => "payment_initiation_failed",
            Self::InvalidWebhook(_) => "invalid_webhook",
            Self::Forbidden(_) => "forbidden",
            _ => "internal_error",
        }
    }
}

#[cfg(feature = "storage-rocksdb")]
impl From<rocksdb::Error> for KotizError {
    fn from(e: rocksdb::Error) -> Self {
        Self::Storage(e.to_string())
    }
}

impl From<reqwest::Error> for KotizError {
    fn from(e: reqwest::Error) -> Self {
        Self::Gateway(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, KotizError>;
