//! REST client for the mobile-money provider.

use super::provider::{self, decode_webhook};
use super::signature::WebhookSigner;
use crate::config::PaymentConfig;
use crate::domain::gateway::{
    PaymentInitiation, PaymentMethodInfo, PaymentRequest, PaymentStatusReport, RefundReceipt,
    WebhookDelivery, WebhookNotice,
};
use crate::domain::ports::PaymentGateway;
use crate::error::{KotizError, Result};
use async_trait::async_trait;
use chrono::Utc;
use reqwest::Client;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, HeaderMap, HeaderValue};
use serde_json::json;
use tracing::{debug, warn};

/// Talks to the provider over HTTPS.
///
/// Every request carries the bearer API key and `X-Merchant-ID`, and is bounded
/// by the configured timeout.
#[derive(Clone)]
pub struct HttpPaymentGateway {
    client: Client,
    base_url: String,
    merchant_id: String,
    signer: WebhookSigner,
}

impl HttpPaymentGateway {
    pub fn new(config: &PaymentConfig) -> Result<Self> {
        let base_url = config
            .base_url
            .clone()
            .ok_or_else(|| KotizError::Config("PAYMENT_API_BASE_URL is not set".to_string()))?;

        let mut headers = HeaderMap::new();
        let bearer = HeaderValue::from_str(&format!("Bearer {}", config.api_key))
            .map_err(|_| KotizError::Config("Invalid PAYMENT_API_KEY".to_string()))?;
        headers.insert(AUTHORIZATION, bearer);
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(
            "x-merchant-id",
            HeaderValue::from_str(&config.merchant_id)
                .map_err(|_| KotizError::Config("Invalid PAYMENT_MERCHANT_ID".to_string()))?,
        );

        let client = Client::builder()
            .timeout(config.timeout)
            .default_headers(headers)
            .build()?;

        Ok(Self {
            client,
            base_url,
            merchant_id: config.merchant_id.clone(),
            signer: WebhookSigner::new(&config.secret_key)?,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn read(response: reqwest::Response) -> Result<(u16, Vec<u8>)> {
        let status = response.status().as_u16();
        let body = response.bytes().await?;
        Ok((status, body.to_vec()))
    }
}

#[async_trait]
impl PaymentGateway for HttpPaymentGateway {
    async fn initiate_payment(&self, request: &PaymentRequest) -> Result<PaymentInitiation> {
        debug!(reference = %request.reference, "initiating payment");
        let payload = json!({
            "merchant_id": self.merchant_id,
            "amount": request.amount_minor,
            "currency": request.currency,
            "phone_number": request.phone_number,
            "payment_method": request.payment_method,
            "reference": request.reference,
            "description": request.description,
            "callback_url": request.callback_url,
            "return_url": request.return_url,
            "timestamp": Utc::now().to_rfc3339(),
        });

        let response = self
            .client
            .post(self.url("/payments/initiate"))
            .json(&payload)
            .send()
            .await?;
        let (status, body) = Self::read(response).await?;

        let outcome = provider::interpret_initiation(status, &body);
        if let PaymentInitiation::Declined { error, code } = &outcome {
            warn!(reference = %request.reference, %code, %error, "provider declined payment");
        }
        Ok(outcome)
    }

    async fn check_payment_status(&self, transaction_id: &str) -> Result<PaymentStatusReport> {
        let response = self
            .client
            .get(self.url(&format!("/payments/{}/status", transaction_id)))
            .send()
            .await?;
        let (status, body) = Self::read(response).await?;
        provider::interpret_status(status, &body)
    }

    async fn refund_payment(
        &self,
        transaction_id: &str,
        amount_minor: Option<i64>,
        reason: &str,
    ) -> Result<RefundReceipt> {
        let payload = json!({
            "transaction_id": transaction_id,
            "amount": amount_minor,
            "reason": reason,
            "timestamp": Utc::now().to_rfc3339(),
        });
        let response = self
            .client
            .post(self.url(&format!("/payments/{}/refund", transaction_id)))
            .json(&payload)
            .send()
            .await?;
        let (status, body) = Self::read(response).await?;
        provider::interpret_refund(status, &body)
    }

    async fn process_webhook(&self, delivery: &WebhookDelivery) -> Result<WebhookNotice> {
        decode_webhook(&self.signer, delivery)
    }

    async fn available_methods(&self, country: &str) -> Result<Vec<PaymentMethodInfo>> {
        let response = self
            .client
            .get(self.url("/payment-methods"))
            .query(&[("country", country)])
            .send()
            .await?;
        let (status, body) = Self::read(response).await?;
        provider::interpret_methods(status, &body)
    }
}
