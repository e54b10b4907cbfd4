use crate::error::KotizError;
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Add, AddAssign};
use std::str::FromStr;

/// Money collected by a pool.
///
/// Wraps `rust_decimal::Decimal` so the collected total cannot be confused with
/// a single contribution amount.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default, Serialize, Deserialize)]
pub struct Balance(pub Decimal);

/// A strictly positive monetary amount.
///
/// Used for pool goals and contribution amounts. Deserialization goes through
/// `Amount::new`, so a zero or negative value is rejected at the boundary.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
#[serde(try_from = "Decimal", into = "Decimal")]
pub struct Amount(Decimal);

impl Amount {
    pub fn new(value: Decimal) -> Result<Self, KotizError> {
        if value > Decimal::ZERO {
            Ok(Self(value))
        } else {
            Err(KotizError::Validation("Amount must be positive".to_string()))
        }
    }

    pub fn value(&self) -> Decimal {
        self.0
    }
}

impl TryFrom<Decimal> for Amount {
    type Error = KotizError;

    fn try_from(value: Decimal) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Amount> for Decimal {
    fn from(amount: Amount) -> Self {
        amount.0
    }
}

impl From<Amount> for Balance {
    fn from(amount: Amount) -> Self {
        Self(amount.0)
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.normalize())
    }
}

impl Balance {
    pub const ZERO: Self = Self(Decimal::ZERO);

    pub fn new(amount: Decimal) -> Self {
        Self(amount)
    }
}

impl Add for Balance {
    type Output = Self;
    fn add(self, rhs: Self) -> Self::Output {
        Self(self.0 + rhs.0)
    }
}

impl AddAssign for Balance {
    fn add_assign(&mut self, rhs: Self) {
        self.0 += rhs.0;
    }
}

impl fmt::Display for Balance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.normalize())
    }
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone, Copy, Default, Hash)]
#[serde(rename_all = "UPPERCASE")]
pub enum Currency {
    #[default]
    Xof,
    Eur,
    Usd,
}

impl Currency {
    /// Number of decimal digits in the currency's minor unit.
    pub fn exponent(&self) -> u32 {
        match self {
            Currency::Xof => 0,
            Currency::Eur | Currency::Usd => 2,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            Currency::Xof => "XOF",
            Currency::Eur => "EUR",
            Currency::Usd => "USD",
        }
    }

    /// Converts an amount into integer minor units (centimes for EUR/USD).
    ///
    /// Fails when the amount carries more precision than the currency allows;
    /// the gateway only accepts whole minor units.
    pub fn to_minor_units(&self, amount: Amount) -> Result<i64, KotizError> {
        let too_large = || KotizError::Validation(format!("Amount {} is too large", amount));
        let scaled = amount
            .value()
            .checked_mul(Decimal::from(10_i64.pow(self.exponent())))
            .ok_or_else(too_large)?;
        if scaled.fract() != Decimal::ZERO {
            return Err(KotizError::Validation(format!(
                "Amount {} has too many decimal places for {}",
                amount,
                self.code()
            )));
        }
        scaled.to_i64().ok_or_else(too_large)
    }
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for Currency {
    type Err = KotizError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "XOF" => Ok(Currency::Xof),
            "EUR" => Ok(Currency::Eur),
            "USD" => Ok(Currency::Usd),
            other => Err(KotizError::Validation(format!(
                "Unsupported currency: {}",
                other
            ))),
        }
    }
}
