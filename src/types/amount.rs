use serde::{Deserialize, Serialize};
use std::fmt;

use crate::core::{KeystoneError, KnownType, Result, Value};
use crate::mapper::ValueMarshaler;
use crate::schema::ValueType;

/// Currency code reported when amounts in different currencies are summed.
pub const MIXED_CURRENCY: &str = "mixed";

/// Money as a currency code and an integer count of minor units.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Amount {
    pub currency: String,
    pub units: i64,
}

impl Amount {
    pub fn new(currency: impl Into<String>, units: i64) -> Self {
        Self {
            currency: currency.into(),
            units,
        }
    }

    pub fn is_mixed(&self) -> bool {
        self.currency == MIXED_CURRENCY
    }

    /// Adds two amounts; differing currencies collapse to [`MIXED_CURRENCY`].
    /// Fails when the units overflow.
    pub fn add(&self, other: &Amount) -> Result<Amount> {
        Ok(Amount {
            currency: merge_currency(&self.currency, &other.currency),
            units: self.units.checked_add(other.units).ok_or_else(overflow)?,
        })
    }

    pub fn sub(&self, other: &Amount) -> Result<Amount> {
        Ok(Amount {
            currency: merge_currency(&self.currency, &other.currency),
            units: self.units.checked_sub(other.units).ok_or_else(overflow)?,
        })
    }

    pub fn negate(&self) -> Result<Amount> {
        Ok(Amount {
            currency: self.currency.clone(),
            units: self.units.checked_neg().ok_or_else(overflow)?,
        })
    }

    pub fn is_zero(&self) -> bool {
        self.currency.is_empty() && self.units == 0
    }
}

fn overflow() -> KeystoneError {
    KeystoneError::invalid_value("units", "amount overflows i64")
}

fn merge_currency(a: &str, b: &str) -> String {
    match (a.is_empty(), b.is_empty()) {
        (true, _) => b.to_string(),
        (_, true) => a.to_string(),
        _ if a == b => a.to_string(),
        _ => MIXED_CURRENCY.to_string(),
    }
}

/// Sums a list of amounts.
///
/// `[USD 100, USD 200]` sums to `USD 300`; `[USD 100, GBP 100]` to `mixed 200`.
pub fn sum_amounts<'a>(amounts: impl IntoIterator<Item = &'a Amount>) -> Result<Amount> {
    amounts
        .into_iter()
        .try_fold(Amount::default(), |total, amount| total.add(amount))
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.currency, self.units)
    }
}

impl ValueMarshaler for Amount {
    fn marshal_value(&self) -> Result<Value> {
        Ok(Value {
            text: self.currency.clone(),
            int: self.units,
            known_type: KnownType::Amount,
            ..Value::default()
        })
    }

    fn unmarshal_value(&mut self, value: &Value) -> Result<()> {
        self.currency = value.text.clone();
        self.units = value.int;
        Ok(())
    }

    fn value_type() -> ValueType {
        ValueType::of(KnownType::Amount)
    }

    fn is_zero(&self) -> bool {
        Amount::is_zero(self)
    }
}

crate::value_field!(Amount);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sum_same_currency() {
        let total = sum_amounts(&[Amount::new("USD", 100), Amount::new("USD", 200)]).unwrap();
        assert_eq!(total, Amount::new("USD", 300));
    }

    #[test]
    fn sum_mixed_currency() {
        let total = sum_amounts(&[Amount::new("USD", 100), Amount::new("GBP", 100)]).unwrap();
        assert_eq!(total, Amount::new(MIXED_CURRENCY, 200));
        assert!(total.is_mixed());
    }

    #[test]
    fn sum_of_nothing_is_zero() {
        assert!(sum_amounts(&Vec::<Amount>::new()).unwrap().is_zero());
    }

    #[test]
    fn overflow_is_an_error() {
        let err = sum_amounts(&[Amount::new("USD", i64::MAX), Amount::new("USD", 1)]).unwrap_err();
        assert!(matches!(err, KeystoneError::InvalidValue { .. }));
        assert!(Amount::new("USD", i64::MIN).sub(&Amount::new("USD", 1)).is_err());
        assert!(Amount::new("USD", i64::MIN).negate().is_err());
        assert_eq!(
            Amount::new("USD", 5).sub(&Amount::new("USD", 7)).unwrap(),
            Amount::new("USD", -2)
        );
    }

    #[test]
    fn wire_round_trip() {
        let amount = Amount::new("EUR", -4250);
        let wire = amount.marshal_value().unwrap();
        assert_eq!(wire.text, "EUR");
        assert_eq!(wire.int, -4250);

        let mut decoded = Amount::default();
        decoded.unmarshal_value(&wire).unwrap();
        assert_eq!(decoded, amount);
    }
}
