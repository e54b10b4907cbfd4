use crate::domain::contribution::{Contribution, ContributionId, PaymentStatus};
use crate::domain::money::{Amount, Balance, Currency};
use crate::domain::pool::{NewPool, Pool, PoolId, PoolStatus, Visibility};
use crate::domain::ports::LedgerStoreBox;
use crate::domain::{Caller, UserId};
use crate::error::{KotizError, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{info, warn};

/// A contribution as shown on a pool's public page.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicContribution {
    pub id: ContributionId,
    pub amount: Amount,
    /// `None` for anonymous and guest contributions.
    pub contributor: Option<UserId>,
    pub anonymous: bool,
    pub message: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl From<Contribution> for PublicContribution {
    fn from(c: Contribution) -> Self {
        Self {
            id: c.id,
            amount: c.amount,
            contributor: if c.anonymous { None } else { c.contributor },
            anonymous: c.anonymous,
            message: c.message,
            created_at: c.created_at,
        }
    }
}

/// Collected amount of a pool checked against its settled contributions.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PoolAudit {
    pub pool_id: PoolId,
    pub title: String,
    pub status: PoolStatus,
    pub currency: Currency,
    pub current_amount: Balance,
    pub settled_total: Balance,
    pub completed: usize,
    pub pending: usize,
    pub failed: usize,
}

impl PoolAudit {
    fn of(pool: Pool, contributions: &[Contribution]) -> Self {
        let mut audit = Self {
            pool_id: pool.id,
            title: pool.title,
            status: pool.status,
            currency: pool.currency,
            current_amount: pool.current_amount,
            settled_total: Balance::ZERO,
            completed: 0,
            pending: 0,
            failed: 0,
        };
        for c in contributions {
            match c.status {
                PaymentStatus::Completed => {
                    audit.completed += 1;
                    audit.settled_total += c.amount.into();
                }
                PaymentStatus::Pending => audit.pending += 1,
                PaymentStatus::Failed => audit.failed += 1,
            }
        }
        audit
    }

    /// Whether the collected amount equals the sum of completed contributions.
    pub fn is_consistent(&self) -> bool {
        self.current_amount == self.settled_total
    }
}

/// Pool lifecycle and read models.
pub struct PoolService {
    store: LedgerStoreBox,
}

impl PoolService {
    pub fn new(store: LedgerStoreBox) -> Self {
        Self { store }
    }

    /// Opens a pool owned by the caller. It waits in `pending` for an admin.
    pub async fn create_pool(&self, caller: &Caller, new: NewPool) -> Result<Pool> {
        let pool = Pool::open(caller.user_id, new, Utc::now())?;
        self.store.insert_pool(pool.clone()).await?;
        info!(pool = %pool.id, owner = %pool.owner, "pool created");
        Ok(pool)
    }

    /// Fetches a pool. Private pools are hidden from everyone but their owner
    /// and admins.
    pub async fn get_pool(&self, id: PoolId, caller: Option<&Caller>) -> Result<Pool> {
        let pool = self.load(id).await?;
        let can_see = pool.visibility == Visibility::Public
            || caller.is_some_and(|c| c.is_admin() || c.user_id == pool.owner);
        if !can_see {
            return Err(KotizError::NotFound(format!("Pool {} not found", id)));
        }
        Ok(pool)
    }

    pub async fn approve_pool(&self, caller: &Caller, id: PoolId) -> Result<Pool> {
        if !caller.is_admin() {
            return Err(KotizError::Forbidden(
                "Only administrators can approve pools".to_string(),
            ));
        }
        let pool = self.transition(id, PoolStatus::Active).await?;
        info!(pool = %id, admin = %caller.user_id, "pool approved");
        Ok(pool)
    }

    pub async fn close_pool(&self, caller: &Caller, id: PoolId) -> Result<Pool> {
        let pool = self.load(id).await?;
        if !caller.is_admin() && caller.user_id != pool.owner {
            return Err(KotizError::Forbidden(format!(
                "Pool {} can only be closed by its owner",
                id
            )));
        }
        let pool = self.transition(id, PoolStatus::Closed).await?;
        info!(pool = %id, by = %caller.user_id, "pool closed");
        Ok(pool)
    }

    /// Completed contributions of a pool, newest first, anonymity applied.
    pub async fn public_contributions(
        &self,
        id: PoolId,
        caller: Option<&Caller>,
    ) -> Result<Vec<PublicContribution>> {
        self.get_pool(id, caller).await?;
        let mut contributions: Vec<Contribution> = self
            .store
            .contributions_for_pool(id)
            .await?
            .into_iter()
            .filter(|c| c.status == PaymentStatus::Completed)
            .collect();
        contributions.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(contributions.into_iter().map(Into::into).collect())
    }

    /// All of the caller's contributions, newest first.
    pub async fn my_contributions(&self, caller: &Caller) -> Result<Vec<Contribution>> {
        let mut contributions = self.store.contributions_by_user(caller.user_id).await?;
        contributions.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(contributions)
    }

    pub async fn audit_pool(&self, caller: &Caller, id: PoolId) -> Result<PoolAudit> {
        if !caller.is_admin() {
            return Err(KotizError::Forbidden(
                "Only administrators can audit pools".to_string(),
            ));
        }
        let pool = self.load(id).await?;
        let contributions = self.store.contributions_for_pool(id).await?;
        Ok(PoolAudit::of(pool, &contributions))
    }

    /// Audits every pool, ordered by creation time.
    pub async fn audit_all(&self) -> Result<Vec<PoolAudit>> {
        let mut pools = self.store.all_pools().await?;
        pools.sort_by(|a, b| a.created_at.cmp(&b.created_at));

        let mut audits = Vec::with_capacity(pools.len());
        for pool in pools {
            let contributions = self.store.contributions_for_pool(pool.id).await?;
            let audit = PoolAudit::of(pool, &contributions);
            if !audit.is_consistent() {
                warn!(
                    pool = %audit.pool_id,
                    current = %audit.current_amount,
                    settled = %audit.settled_total,
                    "pool balance does not match settled contributions"
                );
            }
            audits.push(audit);
        }
        Ok(audits)
    }

    async fn load(&self, id: PoolId) -> Result<Pool> {
        self.store
            .get_pool(id)
            .await?
            .ok_or_else(|| KotizError::NotFound(format!("Pool {} not found", id)))
    }

    async fn transition(&self, id: PoolId, to: PoolStatus) -> Result<Pool> {
        self.store
            .set_pool_status(id, to)
            .await?
            .ok_or_else(|| KotizError::NotFound(format!("Pool {} not found", id)))
    }
}
