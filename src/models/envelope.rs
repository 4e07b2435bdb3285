//! Typed view of a `sui_getTransactionBlock` response.
//!
//! Every field is optional on the wire. Absent, null or mistyped values
//! decode to their defaults instead of failing, so any JSON object yields
//! an envelope.

use serde::de::{DeserializeOwned, Error as _, Unexpected};
use serde::{Deserialize, Deserializer};
use serde_json::Value;

/// Lenient field decoders
mod lenient {
    use super::*;

    /// A record decoded from a JSON object. Arrays are refused so that
    /// serde cannot fill a struct by position.
    fn record<T: DeserializeOwned>(value: Value) -> Option<T> {
        if value.is_object() {
            T::deserialize(value).ok()
        } else {
            None
        }
    }

    /// Nested record, falling back to `T::default()` on null or a shape mismatch
    pub fn object<'de, D, T>(deserializer: D) -> Result<T, D::Error>
    where
        D: Deserializer<'de>,
        T: DeserializeOwned + Default,
    {
        Ok(record(Value::deserialize(deserializer)?).unwrap_or_default())
    }

    /// List of records. Elements that do not decode are skipped one by one;
    /// anything other than an array is an empty list.
    pub fn vec<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
    where
        D: Deserializer<'de>,
        T: DeserializeOwned,
    {
        Ok(match Value::deserialize(deserializer)? {
            Value::Array(items) => items.into_iter().filter_map(record).collect(),
            _ => Vec::new(),
        })
    }

    /// Strings, with numbers rendered as text
    pub fn string<'de, D>(deserializer: D) -> Result<String, D::Error>
    where
        D: Deserializer<'de>,
    {
        Ok(match Value::deserialize(deserializer)? {
            Value::String(s) => s,
            Value::Number(n) => n.to_string(),
            Value::Bool(b) => b.to_string(),
            _ => String::new(),
        })
    }

    /// Optional string; empty strings count as absent
    pub fn opt_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = string(deserializer)?;
        Ok(if s.is_empty() { None } else { Some(s) })
    }

    /// Integers given as JSON numbers or decimal strings
    pub fn opt_i64<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
    where
        D: Deserializer<'de>,
    {
        Ok(coerce_i64(&Value::deserialize(deserializer)?))
    }

    /// Gas amounts are u64 on chain; i128 holds them and their sums
    pub fn i128_or_zero<'de, D>(deserializer: D) -> Result<i128, D::Error>
    where
        D: Deserializer<'de>,
    {
        Ok(coerce_i128(&Value::deserialize(deserializer)?).unwrap_or(0))
    }
}

/// Read an integer out of a JSON number or a decimal string. Fractions and
/// values outside i128 yield `None`.
pub fn coerce_i128(value: &Value) -> Option<i128> {
    match value {
        Value::Number(n) => n
            .as_i64()
            .map(i128::from)
            .or_else(|| n.as_u64().map(i128::from)),
        Value::String(s) => s.trim().parse::<i128>().ok(),
        _ => None,
    }
}

/// Like [`coerce_i128`], but `None` when the value does not fit in an i64.
/// Out-of-range values are never clamped.
pub fn coerce_i64(value: &Value) -> Option<i64> {
    coerce_i128(value).and_then(|n| i64::try_from(n).ok())
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RawTransactionEnvelope {
    #[serde(deserialize_with = "lenient::string")]
    pub digest: String,
    #[serde(deserialize_with = "lenient::object")]
    pub transaction: RawTransaction,
    #[serde(deserialize_with = "lenient::object")]
    pub effects: RawEffects,
    #[serde(deserialize_with = "lenient::vec")]
    pub events: Vec<RawEvent>,
    #[serde(deserialize_with = "lenient::opt_i64")]
    pub timestamp_ms: Option<i64>,
    #[serde(deserialize_with = "lenient::opt_i64")]
    pub checkpoint: Option<i64>,
    /// Full nodes report object changes next to `effects` rather than in it
    #[serde(deserialize_with = "lenient::vec")]
    pub object_changes: Vec<RawObjectChange>,
}

impl RawTransactionEnvelope {
    /// Decode an RPC result. Fails only when `value` is not a JSON object.
    pub fn from_value(value: Value) -> Result<Self, serde_json::Error> {
        if value.is_object() {
            return serde_json::from_value(value);
        }
        let unexpected = match &value {
            Value::Object(_) => Unexpected::Map,
            Value::Array(_) => Unexpected::Seq,
            Value::String(s) => Unexpected::Str(s),
            Value::Bool(b) => Unexpected::Bool(*b),
            Value::Number(_) => Unexpected::Other("number"),
            Value::Null => Unexpected::Unit,
        };
        Err(serde_json::Error::invalid_type(unexpected, &"a JSON object"))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct RawTransaction {
    #[serde(deserialize_with = "lenient::object")]
    pub data: RawTransactionData,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct RawTransactionData {
    #[serde(deserialize_with = "lenient::string")]
    pub sender: String,
    #[serde(deserialize_with = "lenient::object")]
    pub transaction: Option<RawTransactionKind>,
}

/// `transaction.data.transaction`: the kind plus, for programmable
/// transactions, the ordered command list
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct RawTransactionKind {
    #[serde(deserialize_with = "lenient::opt_string")]
    pub kind: Option<String>,
    #[serde(alias = "transactions", deserialize_with = "lenient::vec")]
    pub commands: Vec<RawCommand>,
}

/// A single programmable-transaction command, kept as raw JSON because the
/// node emits several shapes
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(transparent)]
pub struct RawCommand(pub Value);

/// Target of a `MoveCall` command
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MoveCallTarget {
    pub package: String,
    pub module: String,
    pub function: String,
}

impl RawCommand {
    /// The call target if this command is a `MoveCall`.
    ///
    /// Accepts `{"type": "MoveCall", "package": .., ..}` as well as the
    /// externally tagged `{"MoveCall": {"package": .., ..}}`.
    pub fn as_move_call(&self) -> Option<MoveCallTarget> {
        let object = self.0.as_object()?;

        let body = if object.get("type").and_then(Value::as_str) == Some("MoveCall") {
            object
        } else {
            object.get("MoveCall")?.as_object()?
        };

        let field = |name: &str| {
            body.get(name)
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string()
        };

        Some(MoveCallTarget {
            package: field("package"),
            module: field("module"),
            function: field("function"),
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RawEffects {
    #[serde(deserialize_with = "lenient::object")]
    pub status: RawExecutionStatus,
    #[serde(deserialize_with = "lenient::object")]
    pub gas_used: RawGasUsed,
    #[serde(deserialize_with = "lenient::vec")]
    pub object_changes: Vec<RawObjectChange>,
    #[serde(deserialize_with = "lenient::vec")]
    pub deleted: Vec<RawObjectRef>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct RawExecutionStatus {
    #[serde(deserialize_with = "lenient::opt_string")]
    pub status: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RawGasUsed {
    #[serde(deserialize_with = "lenient::i128_or_zero")]
    pub computation_cost: i128,
    #[serde(deserialize_with = "lenient::i128_or_zero")]
    pub storage_cost: i128,
    #[serde(deserialize_with = "lenient::i128_or_zero")]
    pub storage_rebate: i128,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RawObjectChange {
    #[serde(rename = "type", deserialize_with = "lenient::string")]
    pub change_type: String,
    #[serde(deserialize_with = "lenient::string")]
    pub object_id: String,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RawObjectRef {
    #[serde(deserialize_with = "lenient::string")]
    pub object_id: String,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RawEvent {
    #[serde(rename = "type", deserialize_with = "lenient::string")]
    pub event_type: String,
    #[serde(deserialize_with = "lenient::string")]
    pub sender: String,
    #[serde(deserialize_with = "lenient::string")]
    pub package_id: String,
    #[serde(deserialize_with = "lenient::string")]
    pub transaction_module: String,
    pub parsed_json: Option<Value>,
}
