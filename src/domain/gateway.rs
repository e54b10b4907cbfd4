//! Types exchanged with a payment provider through [`PaymentGateway`].
//!
//! Amounts here are integer minor units. Provider statuses are a closed enum with
//! an `Unrecognized` fallback so callers match exhaustively instead of poking at
//! free-form strings.
//!
//! [`PaymentGateway`]: crate::domain::ports::PaymentGateway

use super::contribution::{PaymentMethod, PaymentReference, PaymentStatus};
use super::money::Currency;
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PaymentRequest {
    pub amount_minor: i64,
    pub currency: Currency,
    pub phone_number: String,
    pub payment_method: PaymentMethod,
    pub reference: PaymentReference,
    pub description: String,
    pub callback_url: Option<String>,
    pub return_url: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderStatus {
    #[serde(alias = "PENDING", alias = "initiated")]
    Pending,
    #[serde(alias = "PROCESSING")]
    Processing,
    #[serde(alias = "SUCCESS", alias = "successful")]
    Success,
    #[serde(alias = "COMPLETED")]
    Completed,
    #[serde(alias = "FAILED")]
    Failed,
    #[serde(alias = "CANCELLED", alias = "canceled")]
    Cancelled,
    #[serde(other)]
    Unrecognized,
}

impl ProviderStatus {
    /// Terminal ledger status this provider status maps to, if any.
    pub fn outcome(&self) -> Option<PaymentStatus> {
        match self {
            ProviderStatus::Success | ProviderStatus::Completed => Some(PaymentStatus::Completed),
            ProviderStatus::Failed | ProviderStatus::Cancelled => Some(PaymentStatus::Failed),
            ProviderStatus::Pending | ProviderStatus::Processing | ProviderStatus::Unrecognized => {
                None
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InitiatedPayment {
    pub transaction_id: Option<String>,
    pub payment_url: Option<String>,
    pub status: ProviderStatus,
    pub reference: Option<String>,
    pub provider_response: Value,
}

/// A payment method as offered to payers.
///
/// `id` is kept as the provider's string so methods the crate has no variant
/// for can still be listed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentMethodInfo {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub icon: Option<String>,
}

impl From<PaymentMethod> for PaymentMethodInfo {
    fn from(method: PaymentMethod) -> Self {
        Self {
            id: method.as_str().to_string(),
            name: method.display_name().to_string(),
            icon: Some(method.icon().to_string()),
        }
    }
}

/// Every method the crate knows, in display order.
pub fn method_catalogue() -> Vec<PaymentMethodInfo> {
    PaymentMethod::ALL.into_iter().map(Into::into).collect()
}

/// Result of asking the provider to start a payment.
#[derive(Debug, Clone, PartialEq)]
pub enum PaymentInitiation {
    Accepted(InitiatedPayment),
    Declined { error: String, code: String },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PaymentStatusReport {
    pub status: ProviderStatus,
    pub amount: Option<i64>,
    pub currency: Option<String>,
    pub provider_response: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RefundReceipt {
    pub refund_id: Option<String>,
    pub status: ProviderStatus,
    pub amount: Option<i64>,
    pub provider_response: Value,
}

/// A webhook call exactly as received: raw body plus the signature header.
#[derive(Debug, Clone, PartialEq)]
pub struct WebhookDelivery {
    pub body: Vec<u8>,
    pub signature: Option<String>,
}

impl WebhookDelivery {
    pub fn new(body: impl Into<Vec<u8>>, signature: Option<String>) -> Self {
        Self {
            body: body.into(),
            signature,
        }
    }
}

/// An authenticated, decoded provider notification.
#[derive(Debug, Clone, PartialEq)]
pub struct WebhookNotice {
    pub reference: PaymentReference,
    pub status: ProviderStatus,
    pub provider_transaction_id: Option<String>,
    pub amount: Option<i64>,
    /// The body as received, kept for the transaction's audit trail.
    pub raw: String,
}
