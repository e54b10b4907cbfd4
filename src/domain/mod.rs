//! Ledger entities and the ports the application layer depends on.

pub mod contribution;
pub mod gateway;
pub mod money;
pub mod pool;
pub mod ports;
pub mod settlement;
pub mod transaction;

use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier of a user, as issued by the authentication service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(pub u64);

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    #[default]
    User,
    Admin,
}

/// An already-authenticated caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Caller {
    pub user_id: UserId,
    pub role: Role,
}

impl Caller {
    pub fn user(id: u64) -> Self {
        Self {
            user_id: UserId(id),
            role: Role::User,
        }
    }

    pub fn admin(id: u64) -> Self {
        Self {
            user_id: UserId(id),
            role: Role::Admin,
        }
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}
