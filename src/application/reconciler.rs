use crate::domain::contribution::{ContributionId, PaymentStatus};
use crate::domain::gateway::WebhookDelivery;
use crate::domain::ports::{LedgerStoreBox, PaymentGatewayBox};
use crate::domain::settlement::{SettleOutcome, Settlement};
use crate::error::{KotizError, Result};
use chrono::Utc;
use serde::Serialize;
use tracing::{info, warn};

/// What a webhook did to the ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WebhookEffect {
    /// Contribution completed and the pool credited.
    Credited,
    /// Contribution and transaction marked failed.
    MarkedFailed,
    /// Contribution was already terminal.
    AlreadySettled,
    /// Provider status is not terminal.
    Ignored,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WebhookAck {
    pub accepted: bool,
    pub effect: WebhookEffect,
    pub contribution_id: ContributionId,
}

/// Single writer of terminal payment state.
///
/// Every delivery is authenticated by the gateway, then applied through
/// [`crate::domain::ports::LedgerStore::settle`], whose compare-and-set makes
/// duplicate and concurrent deliveries harmless.
pub struct WebhookReconciler {
    store: LedgerStoreBox,
    gateway: PaymentGatewayBox,
}

impl WebhookReconciler {
    pub fn new(store: LedgerStoreBox, gateway: PaymentGatewayBox) -> Self {
        Self { store, gateway }
    }

    pub async fn handle_webhook(&self, delivery: &WebhookDelivery) -> Result<WebhookAck> {
        let notice = self.gateway.process_webhook(delivery).await.inspect_err(|e| {
            warn!(error = %e, "webhook rejected");
        })?;

        let Some(contribution) = self.store.find_by_reference(&notice.reference).await? else {
            warn!(reference = %notice.reference, "webhook for unknown payment reference");
            return Err(KotizError::NotFound(format!(
                "No contribution for reference {}",
                notice.reference
            )));
        };

        let ack = |effect| WebhookAck {
            accepted: true,
            effect,
            contribution_id: contribution.id,
        };

        // Redeliveries for a settled contribution are acknowledged as-is
        if contribution.status.is_terminal() {
            info!(
                contribution = %contribution.id,
                status = ?contribution.status,
                "duplicate webhook for settled contribution"
            );
            return Ok(ack(WebhookEffect::AlreadySettled));
        }

        if let Some(reported) = notice.amount {
            let currency = self
                .store
                .transaction_for(contribution.id)
                .await?
                .map(|tx| tx.currency)
                .ok_or_else(|| {
                    KotizError::Storage(format!("Transaction missing for {}", contribution.id))
                })?;
            let expected = currency.to_minor_units(contribution.amount)?;
            if reported != expected {
                warn!(
                    reference = %notice.reference,
                    expected,
                    reported,
                    "webhook amount does not match contribution"
                );
                return Err(KotizError::InvalidWebhook(format!(
                    "Amount {} does not match contribution amount {}",
                    reported, expected
                )));
            }
        }

        let Some(status) = notice.status.outcome() else {
            info!(reference = %notice.reference, status = ?notice.status, "non-terminal webhook ignored");
            return Ok(ack(WebhookEffect::Ignored));
        };

        let settlement = Settlement {
            reference: notice.reference.clone(),
            status,
            provider_transaction_id: notice.provider_transaction_id,
            provider_payload: notice.raw,
            settled_at: Utc::now(),
        };
        match self.store.settle(settlement).await? {
            SettleOutcome::Applied(settled) => {
                info!(
                    contribution = %settled.id,
                    reference = %settled.payment_reference,
                    status = ?settled.status,
                    "payment settled"
                );
                Ok(ack(match status {
                    PaymentStatus::Completed => WebhookEffect::Credited,
                    _ => WebhookEffect::MarkedFailed,
                }))
            }
            SettleOutcome::AlreadySettled(existing) => {
                info!(
                    contribution = %existing.id,
                    status = ?existing.status,
                    "duplicate webhook for settled contribution"
                );
                Ok(ack(WebhookEffect::AlreadySettled))
            }
            SettleOutcome::UnknownReference => Err(KotizError::NotFound(format!(
                "No contribution for reference {}",
                notice.reference
            ))),
        }
    }
}
