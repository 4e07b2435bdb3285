use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Flat, query-friendly record of one transaction. `digest` is the key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CanonicalTransaction {
    pub digest: String,
    pub sender: String,
    pub timestamp: DateTime<Utc>,
    pub checkpoint: i64,
    pub transaction_type: String,
    pub status: TransactionStatus,
    pub package_id: Option<String>,
    pub function: Option<String>,
    /// computation + storage - rebate; negative when the rebate dominates
    pub total_gas_used: i64,
    pub created_objects: Vec<String>,
    pub deleted_objects: Vec<String>,
    pub modified_objects: Vec<String>,
    pub events: Vec<EventRecord>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionStatus {
    Success,
    Failure,
    Unknown,
}

impl TransactionStatus {
    /// Map the effects status string; anything unrecognised is `Unknown`
    pub fn from_effects(status: Option<&str>) -> Self {
        match status.map(str::to_ascii_lowercase).as_deref() {
            Some("success") => TransactionStatus::Success,
            Some("failure") => TransactionStatus::Failure,
            _ => TransactionStatus::Unknown,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionStatus::Success => "success",
            TransactionStatus::Failure => "failure",
            TransactionStatus::Unknown => "unknown",
        }
    }
}

impl std::fmt::Display for TransactionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventRecord {
    #[serde(rename = "type")]
    pub event_type: String,
    pub sender: String,
    pub package_id: String,
    pub module: String,
    pub parsed_payload: Value,
}
