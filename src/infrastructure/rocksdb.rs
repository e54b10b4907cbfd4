use crate::domain::UserId;
use crate::domain::contribution::{Contribution, ContributionId, PaymentReference};
use crate::domain::pool::{Pool, PoolId, PoolStatus};
use crate::domain::ports::LedgerStore;
use crate::domain::settlement::{self, SettleOutcome, Settlement};
use crate::domain::transaction::Transaction;
use crate::error::{KotizError, Result};
use async_trait::async_trait;
use rocksdb::{ColumnFamily, ColumnFamilyDescriptor, DB, IteratorMode, Options, WriteBatch};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Column Family for pools, keyed by pool id.
pub const CF_POOLS: &str = "pools";
/// Column Family for contributions, keyed by contribution id.
pub const CF_CONTRIBUTIONS: &str = "contributions";
/// Column Family for transactions, keyed by the owning contribution's id.
pub const CF_TRANSACTIONS: &str = "transactions";
/// Column Family mapping payment reference to contribution id.
pub const CF_REFERENCES: &str = "references";

/// A persistent ledger using RocksDB.
///
/// Each entity lives in its own Column Family. Multi-record writes go through a
/// single `WriteBatch`, and read-check-write sequences hold `write_lock`, so
/// settlement is a compare-and-set on the contribution status.
///
/// This struct is thread-safe (`Clone` shares the underlying `Arc<DB>`).
#[derive(Clone)]
pub struct RocksDBStore {
    db: Arc<DB>,
    write_lock: Arc<Mutex<()>>,
}

impl RocksDBStore {
    /// Opens or creates a RocksDB instance at the specified path.
    ///
    /// Ensures that every ledger column family exists.
    ///
    /// # Arguments
    ///
    /// * `path` - The filesystem path where the database will be stored.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);

        let descriptors = [CF_POOLS, CF_CONTRIBUTIONS, CF_TRANSACTIONS, CF_REFERENCES]
            .into_iter()
            .map(|name| ColumnFamilyDescriptor::new(name, Options::default()))
            .collect::<Vec<_>>();

        let db = DB::open_cf_descriptors(&opts, path, descriptors)?;

        Ok(Self {
            db: Arc::new(db),
            write_lock: Arc::new(Mutex::new(())),
        })
    }

    fn cf(&self, name: &str) -> Result<&ColumnFamily> {
        self.db
            .cf_handle(name)
            .ok_or_else(|| KotizError::Storage(format!("Column family {} not found", name)))
    }

    fn read<T: DeserializeOwned>(&self, cf: &str, key: &[u8]) -> Result<Option<T>> {
        match self.db.get_cf(self.cf(cf)?, key)? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    fn scan<T: DeserializeOwned>(&self, cf: &str) -> Result<Vec<T>> {
        let mut rows = Vec::new();
        for item in self.db.iterator_cf(self.cf(cf)?, IteratorMode::Start) {
            let (_key, value) = item?;
            rows.push(serde_json::from_slice(&value)?);
        }
        Ok(rows)
    }

    fn stage<T: Serialize>(
        &self,
        batch: &mut WriteBatch,
        cf: &str,
        key: &[u8],
        value: &T,
    ) -> Result<()> {
        batch.put_cf(self.cf(cf)?, key, serde_json::to_vec(value)?);
        Ok(())
    }

    fn contribution_id_for(&self, reference: &PaymentReference) -> Result<Option<ContributionId>> {
        self.read(CF_REFERENCES, reference.as_str().as_bytes())
    }
}

#[async_trait]
impl LedgerStore for RocksDBStore {
    async fn insert_pool(&self, pool: Pool) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        let key = pool.id.0.as_bytes();
        if self.db.get_pinned_cf(self.cf(CF_POOLS)?, key)?.is_some() {
            return Err(KotizError::Storage(format!("Pool {} already exists", pool.id)));
        }
        let mut batch = WriteBatch::default();
        self.stage(&mut batch, CF_POOLS, key, &pool)?;
        self.db.write(batch)?;
        Ok(())
    }

    async fn get_pool(&self, id: PoolId) -> Result<Option<Pool>> {
        self.read(CF_POOLS, id.0.as_bytes())
    }

    async fn all_pools(&self) -> Result<Vec<Pool>> {
        self.scan(CF_POOLS)
    }

    async fn set_pool_status(&self, id: PoolId, status: PoolStatus) -> Result<Option<Pool>> {
        let _guard = self.write_lock.lock().await;
        let Some(mut pool) = self.read::<Pool>(CF_POOLS, id.0.as_bytes())? else {
            return Ok(None);
        };
        pool.transition(status)?;
        let mut batch = WriteBatch::default();
        self.stage(&mut batch, CF_POOLS, id.0.as_bytes(), &pool)?;
        self.db.write(batch)?;
        Ok(Some(pool))
    }

    async fn get_contribution(&self, id: ContributionId) -> Result<Option<Contribution>> {
        self.read(CF_CONTRIBUTIONS, id.0.as_bytes())
    }

    async fn find_by_reference(
        &self,
        reference: &PaymentReference,
    ) -> Result<Option<Contribution>> {
        match self.contribution_id_for(reference)? {
            Some(id) => self.read(CF_CONTRIBUTIONS, id.0.as_bytes()),
            None => Ok(None),
        }
    }

    async fn contributions_for_pool(&self, pool: PoolId) -> Result<Vec<Contribution>> {
        let all: Vec<Contribution> = self.scan(CF_CONTRIBUTIONS)?;
        Ok(all.into_iter().filter(|c| c.pool_id == pool).collect())
    }

    async fn contributions_by_user(&self, user: UserId) -> Result<Vec<Contribution>> {
        let all: Vec<Contribution> = self.scan(CF_CONTRIBUTIONS)?;
        Ok(all.into_iter().filter(|c| c.belongs_to(user)).collect())
    }

    async fn transaction_for(&self, contribution: ContributionId) -> Result<Option<Transaction>> {
        self.read(CF_TRANSACTIONS, contribution.0.as_bytes())
    }

    async fn record_pending(
        &self,
        contribution: Contribution,
        transaction: Transaction,
    ) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        let reference = contribution.payment_reference.as_str().as_bytes();
        if self
            .db
            .get_pinned_cf(self.cf(CF_REFERENCES)?, reference)?
            .is_some()
        {
            return Err(KotizError::Storage(format!(
                "Payment reference {} already recorded",
                contribution.payment_reference
            )));
        }
        let pool: Pool = self
            .read(CF_POOLS, contribution.pool_id.0.as_bytes())?
            .ok_or_else(|| {
                KotizError::NotFound(format!("Pool {} not found", contribution.pool_id))
            })?;
        let existing: Vec<Contribution> = match pool.participant_limit {
            Some(_) => self.scan(CF_CONTRIBUTIONS)?,
            None => Vec::new(),
        };
        pool.admit(
            contribution.contributor,
            &contribution.phone_number,
            &existing,
            contribution.created_at,
        )?;

        let key = contribution.id.0.as_bytes();
        let mut batch = WriteBatch::default();
        self.stage(&mut batch, CF_CONTRIBUTIONS, key, &contribution)?;
        self.stage(&mut batch, CF_TRANSACTIONS, key, &transaction)?;
        self.stage(&mut batch, CF_REFERENCES, reference, &contribution.id)?;
        self.db.write(batch)?;
        Ok(())
    }

    async fn settle(&self, settlement: Settlement) -> Result<SettleOutcome> {
        let _guard = self.write_lock.lock().await;

        let Some(id) = self.contribution_id_for(&settlement.reference)? else {
            return Ok(SettleOutcome::UnknownReference);
        };
        let missing = || {
            KotizError::Storage(format!("Ledger rows missing for {}", settlement.reference))
        };
        let mut contribution: Contribution = self
            .read(CF_CONTRIBUTIONS, id.0.as_bytes())?
            .ok_or_else(missing)?;
        let mut transaction: Transaction = self
            .read(CF_TRANSACTIONS, id.0.as_bytes())?
            .ok_or_else(missing)?;
        let mut pool: Pool = self
            .read(CF_POOLS, contribution.pool_id.0.as_bytes())?
            .ok_or_else(missing)?;

        if !settlement::apply(&settlement, &mut contribution, &mut transaction, &mut pool)? {
            return Ok(SettleOutcome::AlreadySettled(contribution));
        }

        let mut batch = WriteBatch::default();
        self.stage(&mut batch, CF_CONTRIBUTIONS, id.0.as_bytes(), &contribution)?;
        self.stage(&mut batch, CF_TRANSACTIONS, id.0.as_bytes(), &transaction)?;
        self.stage(&mut batch, CF_POOLS, pool.id.0.as_bytes(), &pool)?;
        self.db.write(batch)?;
        Ok(SettleOutcome::Applied(contribution))
    }
}
