//! Raw envelope to [`CanonicalTransaction`].
//!
//! All defaulting happens here. The conversion is pure: the only outside
//! input is the ingestion instant, used when the envelope has no timestamp.

use chrono::{DateTime, Utc};
use serde_json::Value;

use crate::error::ProcessingError;
use crate::models::envelope::{RawEvent, RawGasUsed, RawTransactionEnvelope};
use crate::models::transaction::{CanonicalTransaction, EventRecord, TransactionStatus};

const PROGRAMMABLE_TRANSACTION: &str = "ProgrammableTransaction";
const UNKNOWN_TRANSACTION_TYPE: &str = "unknown";

/// Decode an RPC result and normalize it
pub fn normalize_value(
    value: Value,
    requested_digest: &str,
    ingested_at: DateTime<Utc>,
) -> Result<CanonicalTransaction, ProcessingError> {
    let envelope = RawTransactionEnvelope::from_value(value).map_err(|source| {
        ProcessingError::EnvelopeDecode {
            digest: requested_digest.to_string(),
            source,
        }
    })?;
    Ok(normalize(&envelope, ingested_at))
}

/// Build the canonical record for one envelope. Never fails.
pub fn normalize(envelope: &RawTransactionEnvelope, ingested_at: DateTime<Utc>) -> CanonicalTransaction {
    let data = &envelope.transaction.data;
    let effects = &envelope.effects;

    let mut call_site = CallSite::default();

    // Events take precedence over commands for package and function.
    let events: Vec<EventRecord> = envelope.events.iter().map(event_record).collect();
    for event in &events {
        call_site.offer_package(&event.package_id);
        // The event's module name stands in for the function here.
        call_site.offer_function(&event.module);
    }

    let mut transaction_type = UNKNOWN_TRANSACTION_TYPE.to_string();
    if let Some(kind) = &data.transaction {
        transaction_type = kind
            .kind
            .clone()
            .unwrap_or_else(|| UNKNOWN_TRANSACTION_TYPE.to_string());

        if transaction_type == PROGRAMMABLE_TRANSACTION && call_site.package_id.is_none() {
            // First MoveCall wins, even if its fields are empty.
            if let Some(target) = kind.commands.iter().find_map(|command| command.as_move_call()) {
                call_site.offer_package(&target.package);
                if !target.module.is_empty() && !target.function.is_empty() {
                    call_site.offer_function(&format!("{}::{}", target.module, target.function));
                }
            }
        }
    }

    let total_gas_used = total_gas(&envelope.digest, &effects.gas_used);

    let mut created_objects = ObjectIdList::default();
    let mut deleted_objects = ObjectIdList::default();
    let mut modified_objects = ObjectIdList::default();

    for change in effects.object_changes.iter().chain(&envelope.object_changes) {
        match change.change_type.to_ascii_lowercase().as_str() {
            "created" => created_objects.push(&change.object_id),
            "deleted" => deleted_objects.push(&change.object_id),
            "modified" | "mutated" => modified_objects.push(&change.object_id),
            _ => {}
        }
    }
    for reference in &effects.deleted {
        deleted_objects.push(&reference.object_id);
    }

    let timestamp = envelope
        .timestamp_ms
        .and_then(DateTime::<Utc>::from_timestamp_millis)
        .unwrap_or_else(|| truncate_to_millis(ingested_at));

    CanonicalTransaction {
        digest: envelope.digest.clone(),
        sender: data.sender.clone(),
        timestamp,
        checkpoint: envelope.checkpoint.unwrap_or(0),
        transaction_type,
        status: TransactionStatus::from_effects(effects.status.status.as_deref()),
        package_id: call_site.package_id,
        function: call_site.function,
        total_gas_used,
        created_objects: created_objects.into_inner(),
        deleted_objects: deleted_objects.into_inner(),
        modified_objects: modified_objects.into_inner(),
        events,
    }
}

/// computation + storage - rebate, exact. A total outside i64 is logged
/// and stored as 0.
fn total_gas(digest: &str, gas: &RawGasUsed) -> i64 {
    let total = gas
        .computation_cost
        .checked_add(gas.storage_cost)
        .and_then(|cost| cost.checked_sub(gas.storage_rebate))
        .and_then(|total| i64::try_from(total).ok());

    total.unwrap_or_else(|| {
        log::warn!(
            "Gas total of transaction {} does not fit in i64 (computation {}, storage {}, rebate {}), storing 0",
            digest,
            gas.computation_cost,
            gas.storage_cost,
            gas.storage_rebate
        );
        0
    })
}

fn event_record(event: &RawEvent) -> EventRecord {
    EventRecord {
        event_type: event.event_type.clone(),
        sender: event.sender.clone(),
        package_id: event.package_id.clone(),
        module: event.transaction_module.clone(),
        parsed_payload: event
            .parsed_json
            .clone()
            .unwrap_or_else(|| Value::Object(Default::default())),
    }
}

/// The stored timestamp has millisecond precision
fn truncate_to_millis(instant: DateTime<Utc>) -> DateTime<Utc> {
    DateTime::<Utc>::from_timestamp_millis(instant.timestamp_millis()).unwrap_or(instant)
}

/// Package and function, each set once by the first non-empty offer
#[derive(Default)]
struct CallSite {
    package_id: Option<String>,
    function: Option<String>,
}

impl CallSite {
    fn offer_package(&mut self, package_id: &str) {
        if self.package_id.is_none() && !package_id.is_empty() {
            self.package_id = Some(package_id.to_string());
        }
    }

    fn offer_function(&mut self, function: &str) {
        if self.function.is_none() && !function.is_empty() {
            self.function = Some(function.to_string());
        }
    }
}

/// Object ids in first-seen order without duplicates
#[derive(Default)]
struct ObjectIdList(Vec<String>);

impl ObjectIdList {
    fn push(&mut self, object_id: &str) {
        if !object_id.is_empty() && !self.0.iter().any(|id| id == object_id) {
            self.0.push(object_id.to_string());
        }
    }

    fn into_inner(self) -> Vec<String> {
        self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    fn ingest_time() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap()
    }

    fn normalize_json(value: Value) -> CanonicalTransaction {
        normalize_value(value, "requested", ingest_time()).expect("object envelopes always decode")
    }

    fn sample_envelope() -> Value {
        json!({
            "digest": "8Yx1Vq2aDigest",
            "timestampMs": "1714564800000",
            "checkpoint": "31245678",
            "transaction": {
                "data": {
                    "sender": "0xsender",
                    "transaction": {
                        "kind": "ProgrammableTransaction",
                        "commands": [
                            {"SplitCoins": ["GasCoin", [{"Input": 0}]]},
                            {"MoveCall": {"package": "0xdee9", "module": "clob_v2", "function": "place_limit_order"}},
                            {"MoveCall": {"package": "0x2", "module": "coin", "function": "join"}}
                        ]
                    }
                }
            },
            "effects": {
                "status": {"status": "success"},
                "gasUsed": {"computationCost": "1000", "storageCost": "500", "storageRebate": "300"},
                "objectChanges": [
                    {"type": "created", "objectId": "0xc1"},
                    {"type": "Modified", "objectId": "0xm1"},
                    {"type": "DELETED", "objectId": "0xd1"},
                    {"type": "wrapped", "objectId": "0xw1"}
                ],
                "deleted": [{"objectId": "0xd2"}]
            },
            "events": []
        })
    }

    #[test]
    fn test_full_envelope() {
        let record = normalize_json(sample_envelope());

        assert_eq!(record.digest, "8Yx1Vq2aDigest");
        assert_eq!(record.sender, "0xsender");
        assert_eq!(record.timestamp, Utc.timestamp_millis_opt(1_714_564_800_000).unwrap());
        assert_eq!(record.checkpoint, 31_245_678);
        assert_eq!(record.transaction_type, "ProgrammableTransaction");
        assert_eq!(record.status, TransactionStatus::Success);
        assert_eq!(record.package_id.as_deref(), Some("0xdee9"));
        assert_eq!(record.function.as_deref(), Some("clob_v2::place_limit_order"));
        assert_eq!(record.total_gas_used, 1200);
        assert_eq!(record.created_objects, vec!["0xc1"]);
        assert_eq!(record.modified_objects, vec!["0xm1"]);
        assert_eq!(record.deleted_objects, vec!["0xd1", "0xd2"]);
        assert!(record.events.is_empty());
    }

    #[test]
    fn test_empty_envelope_uses_defaults() {
        let record = normalize_json(json!({}));

        assert_eq!(record.digest, "");
        assert_eq!(record.sender, "");
        assert_eq!(record.timestamp, ingest_time());
        assert_eq!(record.checkpoint, 0);
        assert_eq!(record.transaction_type, "unknown");
        assert_eq!(record.status, TransactionStatus::Unknown);
        assert_eq!(record.package_id, None);
        assert_eq!(record.function, None);
        assert_eq!(record.total_gas_used, 0);
        assert!(record.created_objects.is_empty());
        assert!(record.deleted_objects.is_empty());
        assert!(record.modified_objects.is_empty());
        assert!(record.events.is_empty());
    }

    #[test]
    fn test_non_object_result_is_a_processing_error() {
        let result = normalize_value(json!(null), "D9", ingest_time());
        match result {
            Err(ProcessingError::EnvelopeDecode { digest, .. }) => assert_eq!(digest, "D9"),
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn test_event_takes_precedence_over_move_call() {
        let record = normalize_json(json!({
            "transaction": {"data": {"transaction": {
                "kind": "ProgrammableTransaction",
                "commands": [{"type": "MoveCall", "package": "0xB", "module": "m2", "function": "f"}]
            }}},
            "events": [
                {"type": "0xA::m1::Ev", "sender": "0xs", "packageId": "0xA", "transactionModule": "m1", "parsedJson": {"x": 1}}
            ]
        }));

        assert_eq!(record.package_id.as_deref(), Some("0xA"));
        assert_eq!(record.function.as_deref(), Some("m1"));
    }

    #[test]
    fn test_first_event_with_value_wins() {
        let record = normalize_json(json!({
            "events": [
                {"type": "T0", "packageId": "", "transactionModule": ""},
                {"type": "T1", "packageId": "0xP1", "transactionModule": ""},
                {"type": "T2", "packageId": "0xP2", "transactionModule": "mod2"},
                {"type": "T3", "packageId": "0xP3", "transactionModule": "mod3"}
            ]
        }));

        assert_eq!(record.package_id.as_deref(), Some("0xP1"));
        assert_eq!(record.function.as_deref(), Some("mod2"));
        assert_eq!(record.events.len(), 4);
        assert_eq!(record.events[0].parsed_payload, json!({}));
        assert_eq!(record.events[2].module, "mod2");
    }

    #[test]
    fn test_first_move_call_wins_even_when_incomplete() {
        let record = normalize_json(json!({
            "transaction": {"data": {"transaction": {
                "kind": "ProgrammableTransaction",
                "commands": [
                    {"type": "MoveCall", "package": "0xfirst", "module": "only_module"},
                    {"type": "MoveCall", "package": "0xsecond", "module": "m", "function": "f"}
                ]
            }}}
        }));

        assert_eq!(record.package_id.as_deref(), Some("0xfirst"));
        assert_eq!(record.function, None);
    }

    #[test]
    fn test_event_function_is_not_overwritten_by_move_call() {
        let record = normalize_json(json!({
            "transaction": {"data": {"transaction": {
                "kind": "ProgrammableTransaction",
                "commands": [{"type": "MoveCall", "package": "0xB", "module": "m2", "function": "f"}]
            }}},
            "events": [{"type": "T", "packageId": "", "transactionModule": "event_module"}]
        }));

        assert_eq!(record.package_id.as_deref(), Some("0xB"));
        assert_eq!(record.function.as_deref(), Some("event_module"));
    }

    #[test]
    fn test_commands_ignored_for_other_kinds() {
        let record = normalize_json(json!({
            "transaction": {"data": {"transaction": {
                "kind": "ConsensusCommitPrologueV3",
                "commands": [{"type": "MoveCall", "package": "0xB", "module": "m", "function": "f"}]
            }}}
        }));

        assert_eq!(record.transaction_type, "ConsensusCommitPrologueV3");
        assert_eq!(record.package_id, None);
        assert_eq!(record.function, None);
    }

    #[test]
    fn test_missing_kind_is_unknown() {
        let record = normalize_json(json!({
            "transaction": {"data": {"transaction": {"commands": []}}}
        }));
        assert_eq!(record.transaction_type, "unknown");
    }

    #[test]
    fn test_gas_arithmetic() {
        let record = normalize_json(json!({
            "effects": {"gasUsed": {"computationCost": 100, "storageCost": 50, "storageRebate": 30}}
        }));
        assert_eq!(record.total_gas_used, 120);

        let record = normalize_json(json!({
            "effects": {"gasUsed": {"computationCost": "10", "storageCost": "0", "storageRebate": "50"}}
        }));
        assert_eq!(record.total_gas_used, -40);

        let record = normalize_json(json!({"effects": {"gasUsed": {"storageRebate": 7}}}));
        assert_eq!(record.total_gas_used, -7);
    }

    #[test]
    fn test_large_gas_values_are_exact_or_zero() {
        let record = normalize_json(json!({
            "effects": {"gasUsed": {"computationCost": u64::MAX.to_string(), "storageRebate": "10"}}
        }));
        assert_eq!(record.total_gas_used, 0);

        // Components beyond i64 still count when the total fits.
        let record = normalize_json(json!({
            "effects": {"gasUsed": {"computationCost": u64::MAX, "storageRebate": u64::MAX - 5}}
        }));
        assert_eq!(record.total_gas_used, 5);

        let record = normalize_json(json!({
            "effects": {"gasUsed": {"computationCost": i64::MAX.to_string(), "storageCost": "1", "storageRebate": "11"}}
        }));
        assert_eq!(record.total_gas_used, i64::MAX - 10);

        let huge = i128::MAX.to_string();
        let record = normalize_json(json!({
            "effects": {"gasUsed": {"computationCost": huge, "storageCost": huge}}
        }));
        assert_eq!(record.total_gas_used, 0);
    }

    #[test]
    fn test_same_overflow_as_string_or_number() {
        let as_string = normalize_json(json!({
            "effects": {"gasUsed": {"computationCost": u64::MAX.to_string(), "storageCost": "1"}}
        }));
        let as_number = normalize_json(json!({
            "effects": {"gasUsed": {"computationCost": u64::MAX, "storageCost": 1}}
        }));
        assert_eq!(as_string.total_gas_used, 0);
        assert_eq!(as_number.total_gas_used, 0);
    }

    #[test]
    fn test_malformed_list_elements_keep_valid_siblings() {
        let record = normalize_json(json!({
            "events": [null, {"packageId": "0xA", "transactionModule": "m1"}],
            "effects": {"objectChanges": [{"type": "created", "objectId": "0xc1"}, 5]}
        }));

        assert_eq!(record.events.len(), 1);
        assert_eq!(record.package_id.as_deref(), Some("0xA"));
        assert_eq!(record.function.as_deref(), Some("m1"));
        assert_eq!(record.created_objects, vec!["0xc1"]);
    }

    #[test]
    fn test_array_result_is_a_processing_error() {
        let result = normalize_value(json!(["not", "an", "object"]), "Weird", ingest_time());
        match result {
            Err(ProcessingError::EnvelopeDecode { digest, .. }) => assert_eq!(digest, "Weird"),
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn test_deleted_objects_deduplicated_across_sections() {
        let record = normalize_json(json!({
            "effects": {
                "objectChanges": [
                    {"type": "deleted", "objectId": "0xaa"},
                    {"type": "deleted", "objectId": "0xbb"},
                    {"type": "deleted", "objectId": "0xaa"}
                ],
                "deleted": [{"objectId": "0xcc"}, {"objectId": "0xaa"}, {"objectId": ""}]
            }
        }));

        assert_eq!(record.deleted_objects, vec!["0xaa", "0xbb", "0xcc"]);
    }

    #[test]
    fn test_node_layout_of_commands_and_object_changes() {
        let record = normalize_json(json!({
            "transaction": {"data": {"transaction": {
                "kind": "ProgrammableTransaction",
                "transactions": [
                    {"SplitCoins": ["GasCoin", [{"Input": 0}]]},
                    {"MoveCall": {"package": "0x2", "module": "pay", "function": "split"}}
                ]
            }}},
            "effects": {"objectChanges": [{"type": "created", "objectId": "0x01"}]},
            "objectChanges": [
                {"type": "mutated", "objectId": "0xgas"},
                {"type": "created", "objectId": "0x01"},
                {"type": "published", "objectId": "0x99"}
            ]
        }));

        assert_eq!(record.package_id.as_deref(), Some("0x2"));
        assert_eq!(record.function.as_deref(), Some("pay::split"));
        assert_eq!(record.created_objects, vec!["0x01"]);
        assert_eq!(record.modified_objects, vec!["0xgas"]);
        assert!(record.deleted_objects.is_empty());
    }

    #[test]
    fn test_status_failure() {
        let record = normalize_json(json!({
            "effects": {"status": {"status": "failure", "error": "InsufficientGas"}}
        }));
        assert_eq!(record.status, TransactionStatus::Failure);
    }

    #[test]
    fn test_default_timestamp_is_ingestion_time() {
        let now = Utc::now();
        let record = normalize(&RawTransactionEnvelope::default(), now);

        let drift = (record.timestamp - now).num_milliseconds().abs();
        assert!(drift <= 1, "timestamp drifted by {}ms", drift);
    }

    #[test]
    fn test_normalization_is_deterministic() {
        let first = normalize_json(sample_envelope());
        let second = normalize_json(sample_envelope());

        assert_eq!(first, second);
        assert_eq!(
            serde_json::to_vec(&first).unwrap(),
            serde_json::to_vec(&second).unwrap()
        );
    }
}
