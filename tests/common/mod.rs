#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::{json, Value};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use sui_tx_indexer::clock::Clock;
use sui_tx_indexer::config::RpcConfig;
use sui_tx_indexer::SuiRpcClient;

/// Clock that records requested sleeps instead of waiting
#[derive(Default)]
pub struct RecordingClock {
    pub sleeps: Mutex<Vec<Duration>>,
}

impl RecordingClock {
    pub fn sleeps(&self) -> Vec<Duration> {
        self.sleeps.lock().unwrap().clone()
    }
}

#[async_trait]
impl Clock for RecordingClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }

    async fn sleep(&self, duration: Duration) {
        self.sleeps.lock().unwrap().push(duration);
    }
}

pub fn client_for(endpoint: &str, max_attempts: u32, clock: Arc<RecordingClock>) -> SuiRpcClient {
    let config = RpcConfig {
        endpoint: endpoint.to_string(),
        timeout_seconds: 5,
        max_attempts,
        retry_delay_ms: 2000,
    };
    SuiRpcClient::from_config(&config, clock).expect("Failed to build RPC client")
}

pub fn rpc_result(result: Value) -> Value {
    json!({"jsonrpc": "2.0", "id": 1, "result": result})
}

/// A transaction block as returned with every `show*` option enabled
pub fn transaction_block(digest: &str, checkpoint: &str) -> Value {
    json!({
        "digest": digest,
        "checkpoint": checkpoint,
        "timestampMs": "1714564800123",
        "transaction": {
            "data": {
                "sender": "0x7d20dcdb2bca4f508ea9613994683eb4e76e9c4ed371169677c1be02aaf0b58e",
                "transaction": {
                    "kind": "ProgrammableTransaction",
                    "inputs": [],
                    "transactions": [
                        {"SplitCoins": ["GasCoin", [{"Input": 0}]]},
                        {"MoveCall": {"package": "0xB", "module": "m2", "function": "f", "arguments": []}}
                    ]
                }
            }
        },
        "effects": {
            "status": {"status": "success"},
            "gasUsed": {
                "computationCost": "100",
                "storageCost": "50",
                "storageRebate": "30",
                "nonRefundableStorageFee": "0"
            },
            "deleted": [{"objectId": "0xdead", "version": 7, "digest": "x"}]
        },
        "events": [
            {
                "type": "0xA::m1::Swapped",
                "sender": "0x7d20",
                "packageId": "0xA",
                "transactionModule": "m1",
                "parsedJson": {"amount_in": "10"}
            }
        ],
        "objectChanges": [
            {"type": "created", "objectId": "0xnew"},
            {"type": "mutated", "objectId": "0xgas"},
            {"type": "deleted", "objectId": "0xdead"}
        ]
    })
}
