//! Exact text encoding for `U256` values kept on disk.
//!
//! Values are written as plain decimal strings. Reading also accepts the
//! `"<digits>n"` form written by the browser client and `0x` hex, so records
//! imported from older clients keep their exact values.

use anyhow::{
    Context,
    bail,
};
use ethers::types::U256;
use serde::{
    Deserialize,
    Deserializer,
    Serializer,
    de::Error as _,
};
use serde_json::Value;

pub fn encode(value: &U256) -> String {
    value.to_string()
}

pub fn parse(text: &str) -> anyhow::Result<U256> {
    let trimmed = text.trim();
    let digits = trimmed.strip_suffix('n').unwrap_or(trimmed);
    if digits.is_empty() {
        bail!("empty integer");
    }
    if let Some(hex) = digits
        .strip_prefix("0x")
        .or_else(|| digits.strip_prefix("0X"))
    {
        return U256::from_str_radix(hex, 16)
            .with_context(|| format!("`{text}` is not a hex integer"));
    }
    if !digits.bytes().all(|b| b.is_ascii_digit()) {
        bail!("`{text}` is not a decimal integer");
    }
    U256::from_dec_str(digits).with_context(|| format!("`{text}` does not fit in 256 bits"))
}

/// Accepts a JSON string in any supported form, or a non-negative JSON number.
pub fn from_json(value: &Value) -> anyhow::Result<U256> {
    match value {
        Value::String(text) => parse(text),
        Value::Number(number) => match number.as_u64() {
            Some(n) => Ok(U256::from(n)),
            None => bail!("`{number}` is not a non-negative integer"),
        },
        other => bail!("expected an integer, found `{other}`"),
    }
}

pub fn serialize<S>(value: &U256, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.serialize_str(&encode(value))
}

pub fn deserialize<'de, D>(deserializer: D) -> Result<U256, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    from_json(&value).map_err(|e| D::Error::custom(format!("{e:#}")))
}

#[cfg(test)]
mod tests {
    #![allow(non_snake_case)]

    use proptest::prelude::*;
    use serde::Serialize;

    use super::*;

    #[derive(Serialize, Deserialize, Debug, PartialEq)]
    struct Wrapper {
        #[serde(with = "super")]
        value: U256,
    }

    #[test]
    fn parse__accepts_legacy_bigint_suffix() {
        let value = parse("123456789012345678901234567890n").unwrap();
        assert_eq!(
            value,
            U256::from_dec_str("123456789012345678901234567890").unwrap()
        );
    }

    #[test]
    fn parse__accepts_hex() {
        assert_eq!(parse("0xff").unwrap(), U256::from(255));
    }

    #[test]
    fn parse__rejects_signs_and_empty_input() {
        assert!(parse("-1").is_err());
        assert!(parse("n").is_err());
        assert!(parse("").is_err());
        assert!(parse("1.5").is_err());
    }

    #[test]
    fn parse__rejects_values_wider_than_256_bits() {
        let too_big = format!("{}0", U256::MAX);
        assert!(parse(&too_big).is_err());
    }

    #[test]
    fn deserialize__accepts_json_numbers() {
        // given
        let json = r#"{"value": 42}"#;

        // when
        let wrapper: Wrapper = serde_json::from_str(json).unwrap();

        // then
        assert_eq!(wrapper.value, U256::from(42));
    }

    #[test]
    fn serialize__writes_decimal_string() {
        let json = serde_json::to_string(&Wrapper {
            value: U256::from(7),
        })
        .unwrap();
        assert_eq!(json, r#"{"value":"7"}"#);
    }

    fn any_u256() -> impl Strategy<Value = U256> {
        any::<[u64; 4]>().prop_map(U256)
    }

    proptest! {
        #[test]
        fn encoding__round_trips_every_u256(value in any_u256()) {
            let json = serde_json::to_string(&Wrapper { value }).unwrap();
            let back: Wrapper = serde_json::from_str(&json).unwrap();
            prop_assert_eq!(back.value, value);
        }

        #[test]
        fn parse__legacy_form_matches_decimal_form(value in any_u256()) {
            let legacy = format!("{value}n");
            prop_assert_eq!(parse(&legacy).unwrap(), value);
        }
    }
}
