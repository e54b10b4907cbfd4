//! Wire shapes of the payment provider's JSON payloads.
//!
//! Every payload is decoded into a closed set of known shapes with an
//! `Unrecognized` fallback, then converted into the gateway types in
//! [`crate::domain::gateway`].

use super::signature::WebhookSigner;
use crate::domain::contribution::PaymentReference;
use crate::domain::gateway::{
    InitiatedPayment, PaymentInitiation, PaymentMethodInfo, PaymentStatusReport, ProviderStatus,
    RefundReceipt, WebhookDelivery, WebhookNotice, method_catalogue,
};
use crate::error::{KotizError, Result};
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use serde::de::{self, Deserializer};
use serde::Deserialize;
use serde_json::Value;
use std::str::FromStr;

fn pending() -> ProviderStatus {
    ProviderStatus::Pending
}

/// Identifier sent either as a JSON string or a number.
fn string_or_number<'de, D>(deserializer: D) -> std::result::Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<Value>::deserialize(deserializer)? {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s)),
        Some(Value::Number(n)) => Ok(Some(n.to_string())),
        Some(other) => Err(de::Error::custom(format!(
            "expected a string or a number, got {}",
            other
        ))),
    }
}

/// Whole minor units sent as an integer, an integral float or a numeric string.
fn minor_units<'de, D>(deserializer: D) -> std::result::Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = match Option::<Value>::deserialize(deserializer)? {
        None | Some(Value::Null) => return Ok(None),
        Some(Value::Number(n)) => n.to_string(),
        Some(Value::String(s)) => s.trim().to_string(),
        Some(other) => {
            return Err(de::Error::custom(format!("expected an amount, got {}", other)));
        }
    };
    Decimal::from_str(&raw)
        .ok()
        .filter(|d| d.fract().is_zero())
        .and_then(|d| d.to_i64())
        .map(Some)
        .ok_or_else(|| de::Error::custom(format!("{} is not a whole amount", raw)))
}

#[derive(Debug, Deserialize)]
pub struct InitiateBody {
    pub transaction_id: String,
    #[serde(default)]
    pub payment_url: Option<String>,
    #[serde(default = "pending")]
    pub status: ProviderStatus,
    #[serde(default)]
    pub reference: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct StatusBody {
    pub status: ProviderStatus,
    #[serde(default, deserialize_with = "minor_units")]
    pub amount: Option<i64>,
    #[serde(default)]
    pub currency: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct RefundBody {
    #[serde(default)]
    pub refund_id: Option<String>,
    pub status: ProviderStatus,
    #[serde(default, deserialize_with = "minor_units")]
    pub amount: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct MethodsBody {
    #[serde(default)]
    pub methods: Option<Vec<PaymentMethodInfo>>,
}

#[derive(Debug, Deserialize)]
pub struct ErrorBody {
    pub message: String,
    #[serde(default)]
    pub code: Option<Value>,
}

/// Any reply from the provider's REST API.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum ProviderReply<T> {
    Ok(T),
    Error(ErrorBody),
    Unrecognized(Value),
}

impl<T: for<'de> Deserialize<'de>> ProviderReply<T> {
    pub fn parse(body: &[u8]) -> Self {
        serde_json::from_slice(body).unwrap_or(ProviderReply::Unrecognized(Value::Null))
    }
}

#[derive(Debug, Deserialize)]
pub struct PaymentEvent {
    pub reference: String,
    pub status: ProviderStatus,
    #[serde(default, deserialize_with = "string_or_number")]
    pub transaction_id: Option<String>,
    #[serde(default, deserialize_with = "minor_units")]
    pub amount: Option<i64>,
}

/// Known webhook body layouts.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum WebhookBody {
    Flat(PaymentEvent),
    Enveloped { data: PaymentEvent },
    Unrecognized(Value),
}

fn error_code(code: Option<Value>, http_status: u16) -> String {
    match code {
        Some(Value::String(s)) => s,
        Some(Value::Number(n)) => n.to_string(),
        _ => http_status.to_string(),
    }
}

/// Interprets the reply to `POST /payments/initiate`.
pub fn interpret_initiation(http_status: u16, body: &[u8]) -> PaymentInitiation {
    let raw: Value = serde_json::from_slice(body).unwrap_or(Value::Null);
    let success = (200..300).contains(&http_status);
    match ProviderReply::<InitiateBody>::parse(body) {
        ProviderReply::Ok(reply) if success => PaymentInitiation::Accepted(InitiatedPayment {
            transaction_id: Some(reply.transaction_id),
            payment_url: reply.payment_url,
            status: reply.status,
            reference: reply.reference,
            provider_response: raw,
        }),
        ProviderReply::Error(err) => PaymentInitiation::Declined {
            error: err.message,
            code: error_code(err.code, http_status),
        },
        ProviderReply::Ok(_) | ProviderReply::Unrecognized(_) if success => {
            PaymentInitiation::Declined {
                error: "Unrecognized provider response".to_string(),
                code: "unrecognized_response".to_string(),
            }
        }
        _ => PaymentInitiation::Declined {
            error: "Payment initiation failed".to_string(),
            code: http_status.to_string(),
        },
    }
}

/// Interprets the reply to `GET /payments/{id}/status`.
pub fn interpret_status(http_status: u16, body: &[u8]) -> Result<PaymentStatusReport> {
    let raw: Value = serde_json::from_slice(body).unwrap_or(Value::Null);
    match ProviderReply::<StatusBody>::parse(body) {
        ProviderReply::Ok(reply) if (200..300).contains(&http_status) => Ok(PaymentStatusReport {
            status: reply.status,
            amount: reply.amount,
            currency: reply.currency,
            provider_response: raw,
        }),
        ProviderReply::Error(err) => Err(KotizError::Gateway(format!(
            "Status check failed ({}): {}",
            error_code(err.code, http_status),
            err.message
        ))),
        _ => Err(KotizError::Gateway(format!(
            "Status check returned an unrecognized response (HTTP {})",
            http_status
        ))),
    }
}

/// Interprets the reply to `GET /payment-methods`. A reply without a method
/// list stands for the full catalogue.
pub fn interpret_methods(http_status: u16, body: &[u8]) -> Result<Vec<PaymentMethodInfo>> {
    match ProviderReply::<MethodsBody>::parse(body) {
        ProviderReply::Ok(reply) if (200..300).contains(&http_status) => {
            Ok(reply.methods.unwrap_or_else(method_catalogue))
        }
        ProviderReply::Error(err) => Err(KotizError::Gateway(format!(
            "Payment method listing failed ({}): {}",
            error_code(err.code, http_status),
            err.message
        ))),
        _ => Err(KotizError::Gateway(format!(
            "Payment method listing returned an unrecognized response (HTTP {})",
            http_status
        ))),
    }
}

/// Interprets the reply to `POST /payments/{id}/refund`.
pub fn interpret_refund(http_status: u16, body: &[u8]) -> Result<RefundReceipt> {
    let raw: Value = serde_json::from_slice(body).unwrap_or(Value::Null);
    match ProviderReply::<RefundBody>::parse(body) {
        ProviderReply::Ok(reply) if (200..300).contains(&http_status) => Ok(RefundReceipt {
            refund_id: reply.refund_id,
            status: reply.status,
            amount: reply.amount,
            provider_response: raw,
        }),
        ProviderReply::Error(err) => Err(KotizError::Gateway(format!(
            "Refund failed ({}): {}",
            error_code(err.code, http_status),
            err.message
        ))),
        _ => Err(KotizError::Gateway(format!(
            "Refund returned an unrecognized response (HTTP {})",
            http_status
        ))),
    }
}

/// Authenticates a webhook delivery and decodes it into a notice.
pub fn decode_webhook(signer: &WebhookSigner, delivery: &WebhookDelivery) -> Result<WebhookNotice> {
    signer.verify(&delivery.body, delivery.signature.as_deref())?;

    let body: WebhookBody = serde_json::from_slice(&delivery.body)
        .map_err(|e| KotizError::InvalidWebhook(format!("Malformed payload: {}", e)))?;
    let event = match body {
        WebhookBody::Flat(event) | WebhookBody::Enveloped { data: event } => event,
        WebhookBody::Unrecognized(_) => {
            return Err(KotizError::InvalidWebhook(
                "Unrecognized payload shape".to_string(),
            ));
        }
    };
    let reference = PaymentReference::parse(&event.reference)
        .map_err(|e| KotizError::InvalidWebhook(e.to_string()))?;

    Ok(WebhookNotice {
        reference,
        status: event.status,
        provider_transaction_id: event.transaction_id,
        amount: event.amount,
        raw: String::from_utf8_lossy(&delivery.body).into_owned(),
    })
}
