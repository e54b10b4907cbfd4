use super::provider::decode_webhook;
use super::signature::WebhookSigner;
use crate::domain::contribution::PaymentReference;
use crate::domain::gateway::{
    InitiatedPayment, PaymentInitiation, PaymentRequest, PaymentStatusReport, ProviderStatus,
    RefundReceipt, WebhookDelivery, WebhookNotice,
};
use crate::domain::ports::PaymentGateway;
use crate::error::{KotizError, Result};
use async_trait::async_trait;
use serde_json::json;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::info;
use uuid::Uuid;

#[derive(Debug, Clone)]
struct SandboxPayment {
    reference: PaymentReference,
    amount_minor: i64,
    currency: String,
    status: ProviderStatus,
}

/// In-process stand-in for the payment provider.
///
/// Approves every payment (or declines every payment when built with
/// [`SandboxGateway::declining`]) and signs its notifications with the same
/// HMAC scheme as the real provider, so webhooks go through full verification.
#[derive(Clone)]
pub struct SandboxGateway {
    signer: WebhookSigner,
    decline: bool,
    payments: Arc<RwLock<HashMap<String, SandboxPayment>>>,
}

impl SandboxGateway {
    pub fn new(secret: impl AsRef<[u8]>) -> Result<Self> {
        Ok(Self {
            signer: WebhookSigner::new(secret)?,
            decline: false,
            payments: Arc::default(),
        })
    }

    pub fn declining(mut self) -> Self {
        self.decline = true;
        self
    }

    /// Marks a sandbox payment as finished and returns the signed webhook the
    /// provider would send for it.
    pub async fn finish(&self, transaction_id: &str, status: ProviderStatus) -> Result<WebhookDelivery> {
        let mut payments = self.payments.write().await;
        let payment = payments.get_mut(transaction_id).ok_or_else(|| {
            KotizError::NotFound(format!("Sandbox payment {} not found", transaction_id))
        })?;
        payment.status = status;
        Ok(self.notification(
            &payment.reference,
            status,
            Some(transaction_id),
            Some(payment.amount_minor),
        ))
    }

    /// Builds a signed webhook delivery.
    pub fn notification(
        &self,
        reference: &PaymentReference,
        status: ProviderStatus,
        transaction_id: Option<&str>,
        amount_minor: Option<i64>,
    ) -> WebhookDelivery {
        let body = json!({
            "reference": reference,
            "status": status,
            "transaction_id": transaction_id,
            "amount": amount_minor,
        })
        .to_string();
        let signature = self.signer.sign(body.as_bytes());
        WebhookDelivery::new(body, Some(signature))
    }
}

#[async_trait]
impl PaymentGateway for SandboxGateway {
    async fn initiate_payment(&self, request: &PaymentRequest) -> Result<PaymentInitiation> {
        if self.decline {
            return Ok(PaymentInitiation::Declined {
                error: "Sandbox is configured to decline payments".to_string(),
                code: "sandbox_declined".to_string(),
            });
        }

        let transaction_id = format!("SBX-{}", Uuid::new_v4().simple());
        self.payments.write().await.insert(
            transaction_id.clone(),
            SandboxPayment {
                reference: request.reference.clone(),
                amount_minor: request.amount_minor,
                currency: request.currency.code().to_string(),
                status: ProviderStatus::Pending,
            },
        );
        info!(%transaction_id, reference = %request.reference, "sandbox payment opened");

        let payment_url = format!("https://sandbox.kotiz.local/pay/{}", transaction_id);
        Ok(PaymentInitiation::Accepted(InitiatedPayment {
            transaction_id: Some(transaction_id.clone()),
            payment_url: Some(payment_url.clone()),
            status: ProviderStatus::Pending,
            reference: Some(request.reference.to_string()),
            provider_response: json!({
                "transaction_id": transaction_id,
                "payment_url": payment_url,
                "status": "pending",
                "reference": request.reference,
            }),
        }))
    }

    async fn check_payment_status(&self, transaction_id: &str) -> Result<PaymentStatusReport> {
        let payments = self.payments.read().await;
        let payment = payments.get(transaction_id).ok_or_else(|| {
            KotizError::Gateway(format!("Unknown sandbox transaction {}", transaction_id))
        })?;
        Ok(PaymentStatusReport {
            status: payment.status,
            amount: Some(payment.amount_minor),
            currency: Some(payment.currency.clone()),
            provider_response: json!({
                "transaction_id": transaction_id,
                "status": payment.status,
                "amount": payment.amount_minor,
                "currency": payment.currency,
            }),
        })
    }

    async fn refund_payment(
        &self,
        transaction_id: &str,
        amount_minor: Option<i64>,
        reason: &str,
    ) -> Result<RefundReceipt> {
        let payments = self.payments.read().await;
        let payment = payments.get(transaction_id).ok_or_else(|| {
            KotizError::Gateway(format!("Unknown sandbox transaction {}", transaction_id))
        })?;
        if payment.status.outcome().is_none() {
            return Err(KotizError::Gateway(format!(
                "Sandbox transaction {} is not settled",
                transaction_id
            )));
        }
        let amount = amount_minor.unwrap_or(payment.amount_minor);
        let refund_id = format!("SBX-RF-{}", Uuid::new_v4().simple());
        Ok(RefundReceipt {
            refund_id: Some(refund_id.clone()),
            status: ProviderStatus::Success,
            amount: Some(amount),
            provider_response: json!({
                "refund_id": refund_id,
                "status": "success",
                "amount": amount,
                "reason": reason,
            }),
        })
    }

    async fn process_webhook(&self, delivery: &WebhookDelivery) -> Result<WebhookNotice> {
        decode_webhook(&self.signer, delivery)
    }
}
