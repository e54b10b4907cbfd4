use super::contribution::{Contribution, ContributionId, PaymentReference, PaymentStatus};
use super::money::{Amount, Currency};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Provider-facing record paired 1:1 with a contribution.
///
/// `provider_response` is the provider's payload as received, kept verbatim for
/// audit. It is never parsed back.
#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
#[serde(rename_all = "camelCase")]
pub struct Transaction {
    pub id: Uuid,
    pub contribution_id: ContributionId,
    pub amount: Amount,
    pub currency: Currency,
    pub payment_reference: PaymentReference,
    pub provider_transaction_id: Option<String>,
    pub provider_response: Option<String>,
    pub status: PaymentStatus,
    pub created_at: DateTime<Utc>,
    pub settled_at: Option<DateTime<Utc>>,
}

impl Transaction {
    /// Mirrors a freshly created contribution.
    pub fn pending_for(
        contribution: &Contribution,
        currency: Currency,
        provider_transaction_id: Option<String>,
        provider_response: Option<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            contribution_id: contribution.id,
            amount: contribution.amount,
            currency,
            payment_reference: contribution.payment_reference.clone(),
            provider_transaction_id,
            provider_response,
            status: PaymentStatus::Pending,
            created_at: contribution.created_at,
            settled_at: None,
        }
    }

    pub fn settle(
        &mut self,
        status: PaymentStatus,
        at: DateTime<Utc>,
        provider_transaction_id: Option<String>,
        provider_response: String,
    ) {
        self.status = status;
        self.settled_at = Some(at);
        if provider_transaction_id.is_some() {
            self.provider_transaction_id = provider_transaction_id;
        }
        self.provider_response = Some(provider_response);
    }
}
