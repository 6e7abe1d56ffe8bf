//! Amount type for monetary magnitudes.
//!
//! An `Amount` is always a non-negative magnitude; the direction of money
//! movement is carried by [`crate::model::TransactionKind`], never by a sign
//! on the amount. Sign conventions only exist at the wire boundary (see
//! `store::record`).

use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// A non-negative monetary magnitude.
///
/// Constructed from any `Decimal`; negative inputs are folded to their
/// absolute value, so the invariant holds by construction.
///
/// ```
/// # use pocketsheet::model::Amount;
/// # use rust_decimal::Decimal;
/// # use std::str::FromStr;
/// let a = Amount::new(Decimal::from_str("-60.00").unwrap());
/// assert_eq!(a.to_string(), "60.00");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Amount(Decimal);

impl Amount {
    /// Creates an `Amount` from a `Decimal`, taking the absolute value.
    pub fn new(value: Decimal) -> Self {
        Self(value.abs())
    }

    /// The underlying non-negative value.
    pub fn value(&self) -> Decimal {
        self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    /// The value with the wire sign convention applied: expenses are sent
    /// as negative numbers.
    pub fn signed(&self, negative: bool) -> Decimal {
        if negative {
            -self.0
        } else {
            self.0
        }
    }
}

impl FromStr for Amount {
    type Err = rust_decimal::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            return Ok(Amount::default());
        }
        Decimal::from_str(trimmed).map(Amount::new)
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<Decimal> for Amount {
    fn from(value: Decimal) -> Self {
        Amount::new(value)
    }
}

impl From<Amount> for Decimal {
    fn from(amount: Amount) -> Self {
        amount.value()
    }
}

impl Serialize for Amount {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.0.to_string())
    }
}

impl<'de> Deserialize<'de> for Amount {
    /// Accepts either a JSON string or a JSON number; either way the result
    /// is coerced to a magnitude.
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Text(String),
            Number(f64),
        }

        match Raw::deserialize(deserializer)? {
            Raw::Text(s) => Amount::from_str(&s).map_err(serde::de::Error::custom),
            Raw::Number(n) => Decimal::try_from(n)
                .map(Amount::new)
                .map_err(serde::de::Error::custom),
        }
    }
}
