// canteen-server/src/models/money.rs

//! Amounts are integer cents internally and decimal numbers on the wire.

/// Minor currency units (piasters for EGP).
pub type Cents = i64;

/// Rounds a decimal amount to the nearest cent. `None` for NaN, infinities
/// and values outside the `i64` range.
pub fn to_cents(amount: f64) -> Option<Cents> {
  if !amount.is_finite() {
    return None;
  }
  let scaled = (amount * 100.0).round();
  if scaled > i64::MAX as f64 || scaled < i64::MIN as f64 {
    return None;
  }
  Some(scaled as Cents)
}

pub fn from_cents(cents: Cents) -> f64 {
  cents as f64 / 100.0
}

/// serde adapter: `#[serde(with = "money::decimal")]` on a `Cents` field.
pub mod decimal {
  use super::{from_cents, to_cents, Cents};
  use serde::{de::Error, Deserialize, Deserializer, Serializer};

  pub fn serialize<S: Serializer>(cents: &Cents, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_f64(from_cents(*cents))
  }

  pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Cents, D::Error> {
    let amount = f64::deserialize(deserializer)?;
    to_cents(amount).ok_or_else(|| D::Error::custom("amount is not a representable number"))
  }
}

/// Same as [`decimal`] for optional amounts.
pub mod decimal_opt {
  use super::{from_cents, Cents};
  use serde::Serializer;

  pub fn serialize<S: Serializer>(cents: &Option<Cents>, serializer: S) -> Result<S::Ok, S::Error> {
    match cents {
      Some(c) => serializer.serialize_some(&from_cents(*c)),
      None => serializer.serialize_none(),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn rounds_to_nearest_cent() {
    assert_eq!(to_cents(20.0), Some(2000));
    assert_eq!(to_cents(0.1 + 0.2), Some(30));
    assert_eq!(to_cents(12.345), Some(1235));
    assert_eq!(to_cents(-1.5), Some(-150));
    assert_eq!(to_cents(f64::NAN), None);
    assert_eq!(to_cents(1e30), None);
  }

  #[test]
  fn decimal_adapter_round_trips_cents() {
    #[derive(serde::Serialize, serde::Deserialize)]
    struct Price {
      #[serde(with = "decimal")]
      amount: Cents,
    }
    let parsed: Price = serde_json::from_str(r#"{"amount": 19.99}"#).unwrap();
    assert_eq!(parsed.amount, 1999);
    assert_eq!(serde_json::to_string(&Price { amount: 6000 }).unwrap(), r#"{"amount":60.0}"#);
  }
}
