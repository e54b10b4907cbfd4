use super::money::Amount;
use super::pool::PoolId;
use super::UserId;
use crate::error::KotizError;
use chrono::{DateTime, Utc};
use rand::distributions::Alphanumeric;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

const REFERENCE_PREFIX: &str = "KOTIZ";
const REFERENCE_SUFFIX_LEN: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContributionId(pub Uuid);

impl ContributionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ContributionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ContributionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Idempotency token joining a contribution to the provider's callbacks.
///
/// Format: `KOTIZ-<unix millis>-<10 alphanumerics>`. The suffix comes from the
/// thread-local CSPRNG, so two references minted in the same millisecond still
/// differ.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PaymentReference(String);

impl PaymentReference {
    pub fn generate(now: DateTime<Utc>) -> Self {
        let suffix: String = rand::thread_rng()
            .sample_iter(&Alphanumeric)
            .take(REFERENCE_SUFFIX_LEN)
            .map(|b| char::from(b).to_ascii_uppercase())
            .collect();
        Self(format!(
            "{}-{}-{}",
            REFERENCE_PREFIX,
            now.timestamp_millis(),
            suffix
        ))
    }

    /// Wraps a reference received from outside (webhooks, lookups).
    pub fn parse(raw: &str) -> Result<Self, KotizError> {
        let raw = raw.trim();
        if raw.is_empty() {
            return Err(KotizError::Validation(
                "Payment reference is empty".to_string(),
            ));
        }
        Ok(Self(raw.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PaymentReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone, Copy, Default)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    #[default]
    OrangeMoney,
    MtnMoney,
    MoovMoney,
    Wave,
}

impl PaymentMethod {
    pub const ALL: [PaymentMethod; 4] = [
        PaymentMethod::OrangeMoney,
        PaymentMethod::MtnMoney,
        PaymentMethod::MoovMoney,
        PaymentMethod::Wave,
    ];

    pub fn display_name(&self) -> &'static str {
        match self {
            PaymentMethod::OrangeMoney => "Orange Money",
            PaymentMethod::MtnMoney => "MTN Mobile Money",
            PaymentMethod::MoovMoney => "Moov Money",
            PaymentMethod::Wave => "Wave",
        }
    }

    pub fn icon(&self) -> &'static str {
        match self {
            PaymentMethod::OrangeMoney => "orange-money.png",
            PaymentMethod::MtnMoney => "mtn-money.png",
            PaymentMethod::MoovMoney => "moov-money.png",
            PaymentMethod::Wave => "wave.png",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentMethod::OrangeMoney => "orange_money",
            PaymentMethod::MtnMoney => "mtn_money",
            PaymentMethod::MoovMoney => "moov_money",
            PaymentMethod::Wave => "wave",
        }
    }
}

/// Lifecycle shared by contributions and their transactions.
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone, Copy)]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    Pending,
    Completed,
    Failed,
}

impl PaymentStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, PaymentStatus::Pending)
    }
}

/// A single payment attempt toward a pool.
#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
#[serde(rename_all = "camelCase")]
pub struct Contribution {
    pub id: ContributionId,
    pub pool_id: PoolId,
    /// `None` for guest contributions.
    pub contributor: Option<UserId>,
    pub amount: Amount,
    pub message: Option<String>,
    pub anonymous: bool,
    pub payment_reference: PaymentReference,
    pub status: PaymentStatus,
    pub phone_number: String,
    pub payment_method: PaymentMethod,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub settled_at: Option<DateTime<Utc>>,
}

impl Contribution {
    /// Moves a pending contribution to a terminal status.
    ///
    /// Returns `Ok(false)` when the contribution was already terminal, leaving it
    /// untouched.
    pub fn settle(&mut self, status: PaymentStatus, at: DateTime<Utc>) -> Result<bool, KotizError> {
        if !status.is_terminal() {
            return Err(KotizError::InvalidState(format!(
                "Cannot settle contribution {} as {:?}",
                self.id, status
            )));
        }
        if self.status.is_terminal() {
            return Ok(false);
        }
        self.status = status;
        self.settled_at = Some(at);
        Ok(true)
    }

    pub fn belongs_to(&self, user: UserId) -> bool {
        self.contributor == Some(user)
    }
}
