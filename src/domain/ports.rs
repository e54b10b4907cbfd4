use super::UserId;
use super::contribution::{Contribution, ContributionId, PaymentReference};
use super::gateway::{
    PaymentInitiation, PaymentMethodInfo, PaymentRequest, PaymentStatusReport, RefundReceipt,
    WebhookDelivery, WebhookNotice, method_catalogue,
};
use super::pool::{Pool, PoolId, PoolStatus};
use super::settlement::{SettleOutcome, Settlement};
use super::transaction::Transaction;
use crate::error::Result;
use async_trait::async_trait;
use std::sync::Arc;

/// Persistent store for pools, contributions and transactions.
///
/// Multi-record writes (`record_pending`, `settle`) must be atomic: a concurrent
/// reader sees either none or all of their effects.
#[async_trait]
pub trait LedgerStore: Send + Sync {
    /// Inserts a new pool. Fails if the id is taken.
    async fn insert_pool(&self, pool: Pool) -> Result<()>;
    async fn get_pool(&self, id: PoolId) -> Result<Option<Pool>>;
    async fn all_pools(&self) -> Result<Vec<Pool>>;
    /// Changes only the pool's lifecycle status; the collected amount is left to `settle`.
    async fn set_pool_status(&self, id: PoolId, status: PoolStatus) -> Result<Option<Pool>>;

    async fn get_contribution(&self, id: ContributionId) -> Result<Option<Contribution>>;
    async fn find_by_reference(
        &self,
        reference: &PaymentReference,
    ) -> Result<Option<Contribution>>;
    async fn contributions_for_pool(&self, pool: PoolId) -> Result<Vec<Contribution>>;
    async fn contributions_by_user(&self, user: UserId) -> Result<Vec<Contribution>>;
    async fn transaction_for(&self, contribution: ContributionId) -> Result<Option<Transaction>>;

    /// Persists a pending contribution together with its transaction.
    /// Fails with a storage error if the payment reference is already known.
    async fn record_pending(
        &self,
        contribution: Contribution,
        transaction: Transaction,
    ) -> Result<()>;

    /// Applies a terminal outcome, compare-and-set from `pending`.
    async fn settle(&self, settlement: Settlement) -> Result<SettleOutcome>;
}

/// Capability surface of a payment provider.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    async fn initiate_payment(&self, request: &PaymentRequest) -> Result<PaymentInitiation>;
    async fn check_payment_status(&self, transaction_id: &str) -> Result<PaymentStatusReport>;
    async fn refund_payment(
        &self,
        transaction_id: &str,
        amount_minor: Option<i64>,
        reason: &str,
    ) -> Result<RefundReceipt>;
    /// Authenticates and decodes a webhook. Fails with `InvalidWebhook`.
    async fn process_webhook(&self, delivery: &WebhookDelivery) -> Result<WebhookNotice>;

    /// Methods payers can use in `country` (ISO 3166 alpha-2).
    async fn available_methods(&self, _country: &str) -> Result<Vec<PaymentMethodInfo>> {
        Ok(method_catalogue())
    }
}

pub type LedgerStoreBox = Arc<dyn LedgerStore>;
pub type PaymentGatewayBox = Arc<dyn PaymentGateway>;
