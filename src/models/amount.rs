//! Serde glue for monetary amounts.
//!
//! Amounts are written as decimal strings so the scale survives a
//! round-trip (`"16.00"` stays `"16.00"`). Ingesters emit either JSON
//! numbers or numeric strings, so both are accepted on input.

use crate::service::normalizer::normalize_amount;
use bigdecimal::BigDecimal;
use serde::{de, Deserialize, Deserializer, Serializer};

#[derive(Deserialize)]
#[serde(untagged)]
enum RawAmount {
    Text(String),
    Number(serde_json::Number),
}

pub fn serialize<S>(value: &BigDecimal, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.serialize_str(&value.to_string())
}

pub fn deserialize<'de, D>(deserializer: D) -> Result<BigDecimal, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = match RawAmount::deserialize(deserializer)? {
        RawAmount::Text(s) => s,
        RawAmount::Number(n) => n.to_string(),
    };
    normalize_amount(&raw).ok_or_else(|| de::Error::custom(format!("invalid amount: {raw:?}")))
}

#[cfg(test)]
mod tests {
    use bigdecimal::BigDecimal;
    use serde::{Deserialize, Serialize};
    use std::str::FromStr;

    #[derive(Serialize, Deserialize)]
    struct Wrapper {
        #[serde(with = "super")]
        amount: BigDecimal,
    }

    #[test]
    fn accepts_numbers_and_strings() {
        let a: Wrapper = serde_json::from_str(r#"{"amount": 16.5}"#).unwrap();
        assert_eq!(a.amount, BigDecimal::from_str("16.5").unwrap());

        let b: Wrapper = serde_json::from_str(r#"{"amount": "16.00"}"#).unwrap();
        assert_eq!(serde_json::to_string(&b).unwrap(), r#"{"amount":"16.00"}"#);
    }

    #[test]
    fn negative_amounts_become_positive() {
        let a: Wrapper = serde_json::from_str(r#"{"amount": "-4.25"}"#).unwrap();
        assert_eq!(a.amount, BigDecimal::from_str("4.25").unwrap());
    }

    #[test]
    fn garbage_is_rejected() {
        assert!(serde_json::from_str::<Wrapper>(r#"{"amount": "n/a"}"#).is_err());
        assert!(serde_json::from_str::<Wrapper>(r#"{"amount": true}"#).is_err());
    }
}
