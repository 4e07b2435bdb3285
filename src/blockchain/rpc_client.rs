use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::blockchain::poller::ChainSource;
use crate::clock::{Clock, TokioClock};
use crate::config::RpcConfig;
use crate::error::RpcError;
use crate::logging::{LogContext, MetricsLogger, PerformanceMonitor};
use crate::models::envelope::coerce_i64;
use crate::retry::{RetryConfig, RetryManager};

pub const METHOD_LATEST_CHECKPOINT: &str = "sui_getLatestCheckpointSequenceNumber";
pub const METHOD_GET_CHECKPOINT: &str = "sui_getCheckpoint";
pub const METHOD_GET_TRANSACTION_BLOCK: &str = "sui_getTransactionBlock";

#[derive(Debug, Serialize)]
struct JsonRpcRequest<'a> {
    jsonrpc: &'static str,
    method: &'a str,
    params: &'a [Value],
    id: u64,
}

#[derive(Debug, Deserialize)]
struct JsonRpcResponse {
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<JsonRpcError>,
}

#[derive(Debug, Deserialize)]
struct JsonRpcError {
    code: i64,
    #[serde(default)]
    message: String,
}

#[derive(Debug, Deserialize)]
struct CheckpointPayload {
    transactions: Vec<String>,
}

/// JSON-RPC 2.0 client for a Sui full node
#[derive(Clone)]
pub struct SuiRpcClient {
    client: Client,
    endpoint: String,
    timeout_seconds: u64,
    retry: RetryConfig,
    clock: Arc<dyn Clock>,
    next_id: Arc<AtomicU64>,
}

impl SuiRpcClient {
    /// Client with default timeout and retry settings
    pub fn new(endpoint: &str) -> Result<Self, RpcError> {
        Self::from_config(
            &RpcConfig {
                endpoint: endpoint.to_string(),
                ..RpcConfig::default()
            },
            Arc::new(TokioClock),
        )
    }

    pub fn from_config(config: &RpcConfig, clock: Arc<dyn Clock>) -> Result<Self, RpcError> {
        LogContext::new("rpc_client", "initialization")
            .with_metadata("endpoint", json!(config.endpoint))
            .with_metadata("timeout_seconds", json!(config.timeout_seconds))
            .with_metadata("max_attempts", json!(config.max_attempts))
            .info("Initializing Sui RPC client");

        let client = Client::builder()
            .timeout(config.timeout())
            .pool_max_idle_per_host(10)
            .build()?;

        Ok(Self {
            client,
            endpoint: config.endpoint.clone(),
            timeout_seconds: config.timeout_seconds,
            retry: RetryConfig::new(config.max_attempts, config.retry_delay()),
            clock,
            next_id: Arc::new(AtomicU64::new(1)),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Invoke `method` and return the `result` payload, retrying transport
    /// and node-reported failures with linear backoff.
    pub async fn call(&self, method: &str, params: Vec<Value>) -> Result<Value, RpcError> {
        let monitor = PerformanceMonitor::new("rpc_call").with_metadata("method", json!(method));

        let result = RetryManager::new(method, self.retry.clone(), self.clock.clone())
            .execute(|| self.send_once(method, &params))
            .await;

        let duration = monitor.finish_with_result(&result);
        MetricsLogger::log_rpc_call(method, duration, result.is_ok());
        result
    }

    async fn send_once(&self, method: &str, params: &[Value]) -> Result<Value, RpcError> {
        let request = JsonRpcRequest {
            jsonrpc: "2.0",
            method,
            params,
            id: self.next_id.fetch_add(1, Ordering::Relaxed),
        };

        LogContext::new("rpc_client", "send")
            .with_metadata("method", json!(method))
            .with_metadata("id", json!(request.id))
            .trace(&format!("Sending RPC request: {}", method));

        let response = self
            .client
            .post(&self.endpoint)
            .json(&request)
            .send()
            .await
            .map_err(|e| self.classify_transport_error(e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(RpcError::HttpStatus {
                status: status.as_u16(),
            });
        }

        let body = response
            .text()
            .await
            .map_err(|e| self.classify_transport_error(e))?;

        decode_response(&body)
    }

    fn classify_transport_error(&self, error: reqwest::Error) -> RpcError {
        if error.is_timeout() {
            RpcError::Timeout {
                seconds: self.timeout_seconds,
            }
        } else if error.is_connect() {
            RpcError::Connection(error.to_string())
        } else {
            RpcError::Http(error)
        }
    }

    pub async fn get_latest_checkpoint_sequence_number(&self) -> Result<u64, RpcError> {
        let result = self.call(METHOD_LATEST_CHECKPOINT, vec![]).await?;
        parse_sequence_number(&result)
    }

    /// Digests of the transactions in checkpoint `sequence_number`, in order
    pub async fn get_checkpoint_transactions(&self, sequence_number: u64) -> Result<Vec<String>, RpcError> {
        let result = self
            .call(METHOD_GET_CHECKPOINT, vec![json!(sequence_number.to_string())])
            .await?;
        parse_checkpoint_transactions(sequence_number, result)
    }

    /// Full transaction envelope with input, effects, events, object and
    /// balance changes
    pub async fn get_transaction_block(&self, digest: &str) -> Result<Value, RpcError> {
        self.call(
            METHOD_GET_TRANSACTION_BLOCK,
            vec![json!(digest), transaction_block_options()],
        )
        .await
    }
}

#[async_trait]
impl ChainSource for SuiRpcClient {
    async fn latest_checkpoint(&self) -> Result<u64, RpcError> {
        self.get_latest_checkpoint_sequence_number().await
    }

    async fn checkpoint_transactions(&self, sequence_number: u64) -> Result<Vec<String>, RpcError> {
        self.get_checkpoint_transactions(sequence_number).await
    }

    async fn transaction_block(&self, digest: &str) -> Result<Value, RpcError> {
        self.get_transaction_block(digest).await
    }
}

fn transaction_block_options() -> Value {
    json!({
        "showInput": true,
        "showEffects": true,
        "showEvents": true,
        "showObjectChanges": true,
        "showBalanceChanges": true
    })
}

fn decode_response(body: &str) -> Result<Value, RpcError> {
    let response: JsonRpcResponse = serde_json::from_str(body)
        .map_err(|e| RpcError::InvalidResponse(format!("Undecodable JSON-RPC body: {}", e)))?;

    if let Some(error) = response.error {
        return Err(RpcError::Method {
            code: error.code,
            message: error.message,
        });
    }

    response
        .result
        .ok_or_else(|| RpcError::InvalidResponse("No result in response".to_string()))
}

fn parse_sequence_number(value: &Value) -> Result<u64, RpcError> {
    coerce_i64(value)
        .and_then(|n| u64::try_from(n).ok())
        .ok_or_else(|| RpcError::InvalidResponse(format!("Invalid checkpoint sequence number: {}", value)))
}

fn parse_checkpoint_transactions(sequence_number: u64, value: Value) -> Result<Vec<String>, RpcError> {
    let payload: CheckpointPayload = serde_json::from_value(value).map_err(|e| {
        RpcError::InvalidResponse(format!(
            "Checkpoint {} has no usable transaction list: {}",
            sequence_number, e
        ))
    })?;
    Ok(payload.transactions)
}
