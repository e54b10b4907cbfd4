use super::UserId;
use super::contribution::{Contribution, PaymentStatus};
use super::money::{Amount, Balance, Currency};
use crate::error::KotizError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PoolId(pub Uuid);

impl PoolId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for PoolId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for PoolId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone, Copy)]
#[serde(rename_all = "lowercase")]
pub enum PoolStatus {
    Pending,
    Active,
    Closed,
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone, Copy, Default)]
#[serde(rename_all = "lowercase")]
pub enum Visibility {
    #[default]
    Public,
    Private,
}

/// Fields a user supplies when opening a pool.
#[derive(Debug, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct NewPool {
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    pub goal_amount: Amount,
    #[serde(default)]
    pub currency: Currency,
    #[serde(default)]
    pub deadline: Option<DateTime<Utc>>,
    #[serde(default)]
    pub visibility: Visibility,
    #[serde(default)]
    pub participant_limit: Option<u32>,
}

/// A fundraising campaign.
///
/// `current_amount` is only ever raised by settling a completed contribution,
/// see [`crate::domain::settlement::apply`].
#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
#[serde(rename_all = "camelCase")]
pub struct Pool {
    pub id: PoolId,
    pub title: String,
    pub description: Option<String>,
    pub goal_amount: Amount,
    pub current_amount: Balance,
    pub currency: Currency,
    pub deadline: Option<DateTime<Utc>>,
    pub visibility: Visibility,
    pub participant_limit: Option<u32>,
    pub status: PoolStatus,
    pub owner: UserId,
    pub created_at: DateTime<Utc>,
}

impl Pool {
    /// Builds a pool in `pending` state owned by `owner`.
    pub fn open(owner: UserId, new: NewPool, now: DateTime<Utc>) -> Result<Self, KotizError> {
        let title = new.title.trim();
        if title.is_empty() {
            return Err(KotizError::Validation("Pool title is required".to_string()));
        }
        if let Some(deadline) = new.deadline
            && deadline <= now
        {
            return Err(KotizError::Validation(
                "Pool deadline must be in the future".to_string(),
            ));
        }
        if new.participant_limit == Some(0) {
            return Err(KotizError::Validation(
                "Participant limit must be at least 1".to_string(),
            ));
        }

        Ok(Self {
            id: PoolId::new(),
            title: title.to_string(),
            description: new.description,
            goal_amount: new.goal_amount,
            current_amount: Balance::ZERO,
            currency: new.currency,
            deadline: new.deadline,
            visibility: new.visibility,
            participant_limit: new.participant_limit,
            status: PoolStatus::Pending,
            owner,
            created_at: now,
        })
    }

    /// Moves the pool along `pending -> active -> closed`.
    pub fn transition(&mut self, to: PoolStatus) -> Result<(), KotizError> {
        let allowed = matches!(
            (self.status, to),
            (PoolStatus::Pending, PoolStatus::Active)
                | (PoolStatus::Pending, PoolStatus::Closed)
                | (PoolStatus::Active, PoolStatus::Closed)
        );
        if !allowed {
            return Err(KotizError::InvalidState(format!(
                "Pool {} cannot move from {:?} to {:?}",
                self.id, self.status, to
            )));
        }
        self.status = to;
        Ok(())
    }

    /// Checks that the pool can take a new contribution at `now`.
    pub fn ensure_accepting(&self, now: DateTime<Utc>) -> Result<(), KotizError> {
        if self.status != PoolStatus::Active {
            return Err(KotizError::InvalidState(format!(
                "Pool {} is not accepting contributions (status {:?})",
                self.id, self.status
            )));
        }
        if let Some(deadline) = self.deadline
            && deadline <= now
        {
            return Err(KotizError::InvalidState(format!(
                "Pool {} passed its deadline",
                self.id
            )));
        }
        Ok(())
    }

    /// Checks that a contribution from `contributor`, or from the guest paying
    /// with `phone_number`, fits the pool at `at`.
    ///
    /// The participant limit counts distinct members and guest phone numbers
    /// over the pool's live contributions, pending and completed. A returning
    /// participant is always admitted. Stores run this again under their write
    /// lock, so the limit holds against concurrent requests.
    pub fn admit<'a>(
        &self,
        contributor: Option<UserId>,
        phone_number: &str,
        existing: impl IntoIterator<Item = &'a Contribution>,
        at: DateTime<Utc>,
    ) -> Result<(), KotizError> {
        self.ensure_accepting(at)?;
        let Some(limit) = self.participant_limit else {
            return Ok(());
        };

        let participants: HashSet<Participant> = existing
            .into_iter()
            .filter(|c| c.pool_id == self.id && c.status != PaymentStatus::Failed)
            .map(|c| Participant::of(c.contributor, &c.phone_number))
            .collect();
        let newcomer = Participant::of(contributor, phone_number);
        if !participants.contains(&newcomer) && participants.len() >= limit as usize {
            return Err(KotizError::InvalidState(format!(
                "Pool {} reached its limit of {} participants",
                self.id, limit
            )));
        }
        Ok(())
    }

    pub fn credit(&mut self, amount: Amount) {
        self.current_amount += amount.into();
    }
}

/// Identity used to count distinct participants of a pool.
#[derive(Debug, PartialEq, Eq, Hash)]
enum Participant {
    Member(UserId),
    Guest(String),
}

impl Participant {
    fn of(contributor: Option<UserId>, phone_number: &str) -> Self {
        match contributor {
            Some(user) => Participant::Member(user),
            None => Participant::Guest(phone_number.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::contribution::{ContributionId, PaymentMethod, PaymentReference};
    use chrono::Duration;
    use rust_decimal_macros::dec;

    fn new_pool() -> NewPool {
        NewPool {
            title: "Mariage de Awa".to_string(),
            description: None,
            goal_amount: Amount::new(dec!(500000)).unwrap(),
            currency: Currency::Xof,
            deadline: None,
            visibility: Visibility::Public,
            participant_limit: None,
        }
    }

    #[test]
    fn test_open_pool_starts_pending_and_empty() {
        let pool = Pool::open(UserId(1), new_pool(), Utc::now()).unwrap();
        assert_eq!(pool.status, PoolStatus::Pending);
        assert_eq!(pool.current_amount, Balance::ZERO);
        assert_eq!(pool.owner, UserId(1));
    }

    #[test]
    fn test_open_pool_rejects_blank_title_and_past_deadline() {
        let now = Utc::now();
        let mut blank = new_pool();
        blank.title = "   ".to_string();
        assert!(matches!(
            Pool::open(UserId(1), blank, now),
            Err(KotizError::Validation(_))
        ));

        let mut late = new_pool();
        late.deadline = Some(now - Duration::days(1));
        assert!(matches!(
            Pool::open(UserId(1), late, now),
            Err(KotizError::Validation(_))
        ));
    }

    #[test]
    fn test_lifecycle_transitions() {
        let mut pool = Pool::open(UserId(1), new_pool(), Utc::now()).unwrap();
        pool.transition(PoolStatus::Active).unwrap();
        assert!(pool.transition(PoolStatus::Pending).is_err());
        pool.transition(PoolStatus::Closed).unwrap();
        assert!(matches!(
            pool.transition(PoolStatus::Active),
            Err(KotizError::InvalidState(_))
        ));
    }

    #[test]
    fn test_ensure_accepting() {
        let now = Utc::now();
        let mut pool = Pool::open(UserId(1), new_pool(), now).unwrap();
        assert!(pool.ensure_accepting(now).is_err());

        pool.transition(PoolStatus::Active).unwrap();
        assert!(pool.ensure_accepting(now).is_ok());

        pool.deadline = Some(now + Duration::hours(1));
        assert!(matches!(
            pool.ensure_accepting(now + Duration::hours(2)),
            Err(KotizError::InvalidState(_))
        ));
    }

    fn live(pool: &Pool, contributor: Option<u64>, phone: &str, status: PaymentStatus) -> Contribution {
        let now = Utc::now();
        Contribution {
            id: ContributionId::new(),
            pool_id: pool.id,
            contributor: contributor.map(UserId),
            amount: Amount::new(dec!(1000)).unwrap(),
            message: None,
            anonymous: false,
            payment_reference: PaymentReference::generate(now),
            status,
            phone_number: phone.to_string(),
            payment_method: PaymentMethod::Wave,
            created_at: now,
            settled_at: None,
        }
    }

    #[test]
    fn test_admit_counts_distinct_live_participants() {
        let now = Utc::now();
        let mut limited = new_pool();
        limited.participant_limit = Some(2);
        let mut pool = Pool::open(UserId(1), limited, now).unwrap();
        pool.transition(PoolStatus::Active).unwrap();

        let existing = vec![
            live(&pool, Some(2), "+22890000001", PaymentStatus::Completed),
            live(&pool, Some(2), "+22890000001", PaymentStatus::Pending),
            live(&pool, None, "+22890000002", PaymentStatus::Pending),
            live(&pool, Some(3), "+22890000003", PaymentStatus::Failed),
        ];

        // Returning member and returning guest
        assert!(pool.admit(Some(UserId(2)), "+22899999999", &existing, now).is_ok());
        assert!(pool.admit(None, "+22890000002", &existing, now).is_ok());
        // A failed attempt does not hold a seat, but the pool is full
        assert!(matches!(
            pool.admit(Some(UserId(3)), "+22890000003", &existing, now),
            Err(KotizError::InvalidState(_))
        ));
        assert!(pool.admit(Some(UserId(4)), "+22890000004", &existing[..1], now).is_ok());

        pool.transition(PoolStatus::Closed).unwrap();
        assert!(matches!(
            pool.admit(Some(UserId(2)), "+22890000001", &existing, now),
            Err(KotizError::InvalidState(_))
        ));
    }

    #[test]
    fn test_credit_accumulates() {
        let mut pool = Pool::open(UserId(1), new_pool(), Utc::now()).unwrap();
        pool.credit(Amount::new(dec!(25000)).unwrap());
        pool.credit(Amount::new(dec!(5000)).unwrap());
        assert_eq!(pool.current_amount, Balance::new(dec!(30000)));
    }
}
