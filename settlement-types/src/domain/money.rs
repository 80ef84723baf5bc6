//! Monetary value with embedded currency.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Currencies accepted by the portal's payment provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "UPPERCASE")]
pub enum Currency {
    ARS,
    USD,
    EUR,
}

impl Currency {
    /// Returns the number of minor units per major unit.
    pub fn minor_per_major(&self) -> i64 {
        match self {
            Currency::ARS | Currency::USD | Currency::EUR => 100,
        }
    }
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

/// Money in the smallest unit of its currency (cents, centavos) to avoid
/// floating-point precision issues.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, utoipa::ToSchema)]
pub struct Money {
    amount: i64,
    currency: Currency,
}

impl Money {
    /// Creates a new Money value. Settlement amounts are always positive.
    pub fn new(amount: i64, currency: Currency) -> Option<Self> {
        if amount <= 0 {
            return None;
        }
        Some(Self { amount, currency })
    }

    /// Returns the amount in the smallest currency unit.
    pub fn amount(&self) -> i64 {
        self.amount
    }

    /// Returns the currency.
    pub fn currency(&self) -> Currency {
        self.currency
    }

    /// Returns the amount in major units as a decimal, the form the
    /// provider's session API expects.
    pub fn as_major_units(&self) -> f64 {
        self.amount as f64 / self.currency.minor_per_major() as f64
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let per_major = self.currency.minor_per_major();
        write!(
            f,
            "{}.{:02} {}",
            self.amount / per_major,
            (self.amount % per_major).abs(),
            self.currency
        )
    }
}
