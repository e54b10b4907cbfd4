//! Payment settings loaded from environment variables.

use crate::error::{KotizError, Result};
use std::time::Duration;

const DEFAULT_TIMEOUT_SECS: u64 = 30;
const SANDBOX_SECRET: &str = "kotiz-sandbox-secret";

#[derive(Debug, Clone)]
pub struct PaymentConfig {
    /// Provider API root. `None` selects the in-process sandbox gateway.
    pub base_url: Option<String>,
    pub api_key: String,
    pub merchant_id: String,
    /// Shared secret used to verify webhook signatures.
    pub secret_key: String,
    /// Where the provider posts payment notifications.
    pub callback_url: Option<String>,
    /// Where the payer is sent back after completing payment.
    pub return_url: Option<String>,
    /// Upper bound on any single provider call.
    pub timeout: Duration,
}

impl Default for PaymentConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            api_key: String::new(),
            merchant_id: String::new(),
            secret_key: SANDBOX_SECRET.to_string(),
            callback_url: None,
            return_url: None,
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        }
    }
}

impl PaymentConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the config from any key lookup; `from_env` passes the process environment.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let base_url = var("PAYMENT_API_BASE_URL").map(|u| u.trim_end_matches('/').to_string());

        let secret_key = match (&base_url, var("PAYMENT_SECRET_KEY")) {
            (_, Some(secret)) => secret,
            (None, None) => SANDBOX_SECRET.to_string(),
            (Some(_), None) => {
                return Err(KotizError::Config(
                    "PAYMENT_SECRET_KEY is required when PAYMENT_API_BASE_URL is set".to_string(),
                ));
            }
        };

        let timeout_secs = match var("PAYMENT_TIMEOUT_SECS") {
            Some(raw) => raw
                .parse::<u64>()
                .ok()
                .filter(|secs| *secs > 0)
                .ok_or_else(|| KotizError::Config("Invalid PAYMENT_TIMEOUT_SECS".to_string()))?,
            None => DEFAULT_TIMEOUT_SECS,
        };

        Ok(Self {
            base_url,
            api_key: var("PAYMENT_API_KEY").unwrap_or_default(),
            merchant_id: var("PAYMENT_MERCHANT_ID").unwrap_or_default(),
            secret_key,
            callback_url: var("PAYMENT_CALLBACK_URL"),
            return_url: var("PAYMENT_RETURN_URL"),
            timeout: Duration::from_secs(timeout_secs),
        })
    }

    pub fn is_sandbox(&self) -> bool {
        self.base_url.is_none()
    }
}
