use crate::domain::UserId;
use crate::domain::contribution::{Contribution, ContributionId, PaymentReference};
use crate::domain::pool::{Pool, PoolId, PoolStatus};
use crate::domain::ports::LedgerStore;
use crate::domain::settlement::{self, SettleOutcome, Settlement};
use crate::domain::transaction::Transaction;
use crate::error::{KotizError, Result};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

#[derive(Default)]
struct Tables {
    pools: HashMap<PoolId, Pool>,
    contributions: HashMap<ContributionId, Contribution>,
    transactions: HashMap<ContributionId, Transaction>,
    references: HashMap<PaymentReference, ContributionId>,
}

/// A thread-safe in-memory ledger.
///
/// All tables sit behind a single `RwLock`, so every multi-record write happens
/// under one write guard and readers never see half of it.
/// Ideal for testing or local runs where persistence is not required.
#[derive(Default, Clone)]
pub struct InMemoryLedgerStore {
    tables: Arc<RwLock<Tables>>,
}

impl InMemoryLedgerStore {
    /// Creates a new, empty in-memory ledger.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl LedgerStore for InMemoryLedgerStore {
    async fn insert_pool(&self, pool: Pool) -> Result<()> {
        let mut tables = self.tables.write().await;
        if tables.pools.contains_key(&pool.id) {
            return Err(KotizError::Storage(format!("Pool {} already exists", pool.id)));
        }
        tables.pools.insert(pool.id, pool);
        Ok(())
    }

    async fn get_pool(&self, id: PoolId) -> Result<Option<Pool>> {
        let tables = self.tables.read().await;
        Ok(tables.pools.get(&id).cloned())
    }

    async fn all_pools(&self) -> Result<Vec<Pool>> {
        let tables = self.tables.read().await;
        Ok(tables.pools.values().cloned().collect())
    }

    async fn set_pool_status(&self, id: PoolId, status: PoolStatus) -> Result<Option<Pool>> {
        let mut tables = self.tables.write().await;
        match tables.pools.get_mut(&id) {
            Some(pool) => {
                pool.transition(status)?;
                Ok(Some(pool.clone()))
            }
            None => Ok(None),
        }
    }

    async fn get_contribution(&self, id: ContributionId) -> Result<Option<Contribution>> {
        let tables = self.tables.read().await;
        Ok(tables.contributions.get(&id).cloned())
    }

    async fn find_by_reference(
        &self,
        reference: &PaymentReference,
    ) -> Result<Option<Contribution>> {
        let tables = self.tables.read().await;
        Ok(tables
            .references
            .get(reference)
            .and_then(|id| tables.contributions.get(id))
            .cloned())
    }

    async fn contributions_for_pool(&self, pool: PoolId) -> Result<Vec<Contribution>> {
        let tables = self.tables.read().await;
        Ok(tables
            .contributions
            .values()
            .filter(|c| c.pool_id == pool)
            .cloned()
            .collect())
    }

    async fn contributions_by_user(&self, user: UserId) -> Result<Vec<Contribution>> {
        let tables = self.tables.read().await;
        Ok(tables
            .contributions
            .values()
            .filter(|c| c.belongs_to(user))
            .cloned()
            .collect())
    }

    async fn transaction_for(&self, contribution: ContributionId) -> Result<Option<Transaction>> {
        let tables = self.tables.read().await;
        Ok(tables.transactions.get(&contribution).cloned())
    }

    async fn record_pending(
        &self,
        contribution: Contribution,
        transaction: Transaction,
    ) -> Result<()> {
        let mut tables = self.tables.write().await;
        if tables.references.contains_key(&contribution.payment_reference) {
            return Err(KotizError::Storage(format!(
                "Payment reference {} already recorded",
                contribution.payment_reference
            )));
        }
        let pool = tables.pools.get(&contribution.pool_id).ok_or_else(|| {
            KotizError::NotFound(format!("Pool {} not found", contribution.pool_id))
        })?;
        // The pool may have closed or filled up while the provider was answering
        pool.admit(
            contribution.contributor,
            &contribution.phone_number,
            tables.contributions.values(),
            contribution.created_at,
        )?;
        tables
            .references
            .insert(contribution.payment_reference.clone(), contribution.id);
        tables.transactions.insert(contribution.id, transaction);
        tables.contributions.insert(contribution.id, contribution);
        Ok(())
    }

    async fn settle(&self, settlement: Settlement) -> Result<SettleOutcome> {
        let mut guard = self.tables.write().await;
        let tables = &mut *guard;

        let Some(id) = tables.references.get(&settlement.reference).copied() else {
            return Ok(SettleOutcome::UnknownReference);
        };
        let missing = || {
            KotizError::Storage(format!("Ledger rows missing for {}", settlement.reference))
        };

        // Work on copies so a failed apply leaves the tables untouched
        let mut contribution = tables.contributions.get(&id).cloned().ok_or_else(missing)?;
        let mut transaction = tables.transactions.get(&id).cloned().ok_or_else(missing)?;
        let mut pool = tables
            .pools
            .get(&contribution.pool_id)
            .cloned()
            .ok_or_else(missing)?;

        if !settlement::apply(&settlement, &mut contribution, &mut transaction, &mut pool)? {
            return Ok(SettleOutcome::AlreadySettled(contribution));
        }

        tables.pools.insert(pool.id, pool);
        tables.transactions.insert(id, transaction);
        tables.contributions.insert(id, contribution.clone());
        Ok(SettleOutcome::Applied(contribution))
    }
}
