//! Terminal-state transition shared by every ledger store.
//!
//! Stores load the three records under their own write lock and hand them to
//! [`apply`]; whatever `apply` leaves in the records is what they persist, in one
//! write.

use super::contribution::{Contribution, PaymentReference, PaymentStatus};
use super::pool::Pool;
use super::transaction::Transaction;
use crate::error::{KotizError, Result};
use chrono::{DateTime, Utc};

/// A terminal outcome to record against one payment reference.
#[derive(Debug, Clone, PartialEq)]
pub struct Settlement {
    pub reference: PaymentReference,
    pub status: PaymentStatus,
    pub provider_transaction_id: Option<String>,
    pub provider_payload: String,
    pub settled_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SettleOutcome {
    /// The contribution moved from `pending` to the settlement's status.
    Applied(Contribution),
    /// The contribution was already terminal; nothing changed.
    AlreadySettled(Contribution),
    UnknownReference,
}

/// Applies `settlement` to the contribution, its transaction and its pool.
///
/// Returns `false` without touching anything when the contribution is already
/// terminal. The pool is credited only for `completed`.
pub fn apply(
    settlement: &Settlement,
    contribution: &mut Contribution,
    transaction: &mut Transaction,
    pool: &mut Pool,
) -> Result<bool> {
    if contribution.pool_id != pool.id || transaction.contribution_id != contribution.id {
        return Err(KotizError::Storage(format!(
            "Ledger records for {} are inconsistent",
            settlement.reference
        )));
    }

    if !contribution.settle(settlement.status, settlement.settled_at)? {
        return Ok(false);
    }
    if settlement.status == PaymentStatus::Completed {
        pool.credit(contribution.amount);
    }
    transaction.settle(
        settlement.status,
        settlement.settled_at,
        settlement.provider_transaction_id.clone(),
        settlement.provider_payload.clone(),
    );
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::UserId;
    use crate::domain::contribution::{ContributionId, PaymentMethod};
    use crate::domain::money::{Amount, Balance, Currency};
    use crate::domain::pool::{NewPool, PoolStatus, Visibility};
    use rust_decimal_macros::dec;

    fn records() -> (Contribution, Transaction, Pool) {
        let now = Utc::now();
        let mut pool = Pool::open(
            UserId(1),
            NewPool {
                title: "Cotisation".to_string(),
                description: None,
                goal_amount: Amount::new(dec!(500000)).unwrap(),
                currency: Currency::Xof,
                deadline: None,
                visibility: Visibility::Public,
                participant_limit: None,
            },
            now,
        )
        .unwrap();
        pool.transition(PoolStatus::Active).unwrap();

        let contribution = Contribution {
            id: ContributionId::new(),
            pool_id: pool.id,
            contributor: Some(UserId(2)),
            amount: Amount::new(dec!(25000)).unwrap(),
            message: None,
            anonymous: false,
            payment_reference: PaymentReference::generate(now),
            status: PaymentStatus::Pending,
            phone_number: "+22890000000".to_string(),
            payment_method: PaymentMethod::OrangeMoney,
            created_at: now,
            settled_at: None,
        };
        let tx = Transaction::pending_for(&contribution, pool.currency, None, None);
        (contribution, tx, pool)
    }

    fn settlement(c: &Contribution, status: PaymentStatus) -> Settlement {
        Settlement {
            reference: c.payment_reference.clone(),
            status,
            provider_transaction_id: Some("PRV-9".to_string()),
            provider_payload: "{\"status\":\"success\"}".to_string(),
            settled_at: Utc::now(),
        }
    }

    #[test]
    fn test_completed_settlement_credits_pool() {
        let (mut c, mut tx, mut pool) = records();
        let s = settlement(&c, PaymentStatus::Completed);

        assert!(apply(&s, &mut c, &mut tx, &mut pool).unwrap());
        assert_eq!(c.status, PaymentStatus::Completed);
        assert_eq!(tx.status, PaymentStatus::Completed);
        assert_eq!(tx.provider_transaction_id.as_deref(), Some("PRV-9"));
        assert_eq!(tx.settled_at, Some(s.settled_at));
        assert_eq!(pool.current_amount, Balance::new(dec!(25000)));
    }

    #[test]
    fn test_failed_settlement_leaves_pool_alone() {
        let (mut c, mut tx, mut pool) = records();
        let s = settlement(&c, PaymentStatus::Failed);

        assert!(apply(&s, &mut c, &mut tx, &mut pool).unwrap());
        assert_eq!(c.status, PaymentStatus::Failed);
        assert_eq!(tx.status, PaymentStatus::Failed);
        assert_eq!(pool.current_amount, Balance::ZERO);
    }

    #[test]
    fn test_second_settlement_is_noop() {
        let (mut c, mut tx, mut pool) = records();
        let s = settlement(&c, PaymentStatus::Completed);
        apply(&s, &mut c, &mut tx, &mut pool).unwrap();

        let tx_before = tx.clone();
        assert!(!apply(&s, &mut c, &mut tx, &mut pool).unwrap());
        assert_eq!(pool.current_amount, Balance::new(dec!(25000)));
        assert_eq!(tx, tx_before);
    }

    #[test]
    fn test_mismatched_records_are_rejected() {
        let (mut c, mut tx, _) = records();
        let (_, _, mut other_pool) = records();
        let s = settlement(&c, PaymentStatus::Completed);
        assert!(matches!(
            apply(&s, &mut c, &mut tx, &mut other_pool),
            Err(KotizError::Storage(_))
        ));
        assert_eq!(c.status, PaymentStatus::Pending);
    }
}
