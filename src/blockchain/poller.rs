use async_trait::async_trait;
use log::{debug, info};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::clock::Clock;
use crate::config::PollerConfig;
use crate::database::{TransactionStore, UpsertOutcome};
use crate::error::{DatabaseError, IndexerError, RpcError};
use crate::logging::{ErrorLogger, LogContext, MetricsLogger};
use crate::models::{normalize_value, CanonicalTransaction};

/// Chain reads the poller depends on
#[async_trait]
pub trait ChainSource: Send + Sync {
    async fn latest_checkpoint(&self) -> Result<u64, RpcError>;

    async fn checkpoint_transactions(&self, sequence_number: u64) -> Result<Vec<String>, RpcError>;

    async fn transaction_block(&self, digest: &str) -> Result<Value, RpcError>;
}

/// Destination for normalized transactions
pub trait TransactionSink: Send + Sync {
    fn upsert(&self, record: &CanonicalTransaction) -> Result<UpsertOutcome, DatabaseError>;
}

impl TransactionSink for TransactionStore {
    fn upsert(&self, record: &CanonicalTransaction) -> Result<UpsertOutcome, DatabaseError> {
        TransactionStore::upsert(self, record)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollerState {
    Idle,
    FetchingLatestDigest,
    Skip,
    FetchingDetails,
    Normalizing,
    Persisting,
    Sleeping,
}

/// Result of one successful cycle
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CycleOutcome {
    Processed { digest: String, outcome: UpsertOutcome },
    Skipped,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PollerStats {
    pub processed: u64,
    pub skipped: u64,
    pub failed: u64,
}

/// Follows the newest transaction of the newest checkpoint and stores it.
///
/// The only state carried between cycles is the digest stored last; a cycle
/// whose newest digest matches it does nothing.
pub struct Poller {
    source: Arc<dyn ChainSource>,
    sink: Arc<dyn TransactionSink>,
    clock: Arc<dyn Clock>,
    config: PollerConfig,
    state: PollerState,
    last_processed_digest: Option<String>,
    in_flight_digest: Option<String>,
    stats: PollerStats,
    shutdown_signal: Arc<AtomicBool>,
}

impl Poller {
    pub fn new(
        source: Arc<dyn ChainSource>,
        sink: Arc<dyn TransactionSink>,
        clock: Arc<dyn Clock>,
        config: PollerConfig,
    ) -> Self {
        Self {
            source,
            sink,
            clock,
            config,
            state: PollerState::Idle,
            last_processed_digest: None,
            in_flight_digest: None,
            stats: PollerStats::default(),
            shutdown_signal: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn state(&self) -> PollerState {
        self.state
    }

    pub fn last_processed_digest(&self) -> Option<&str> {
        self.last_processed_digest.as_deref()
    }

    pub fn stats(&self) -> PollerStats {
        self.stats
    }

    /// Flag that stops [`Poller::run`] at its next state boundary
    pub fn shutdown_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.shutdown_signal)
    }

    pub fn shutdown(&self) {
        self.shutdown_signal.store(true, Ordering::Relaxed);
    }

    fn is_shutdown_requested(&self) -> bool {
        self.shutdown_signal.load(Ordering::Relaxed)
    }

    fn transition(&mut self, next: PollerState) {
        debug!("Poller state {:?} -> {:?}", self.state, next);
        self.state = next;
    }

    /// Poll until shutdown is requested. Cycle failures are logged and
    /// followed by the error backoff; they never end the loop.
    pub async fn run(&mut self) {
        info!(
            "Starting poller (pacing {}ms, interval {}ms, error backoff {}ms)",
            self.config.pacing_delay_ms, self.config.poll_interval_ms, self.config.error_backoff_ms
        );

        while !self.is_shutdown_requested() {
            let pause = match self.run_cycle().await {
                Ok(_) => self.config.poll_interval(),
                Err(error) => {
                    self.stats.failed += 1;
                    let mut context = LogContext::new("poller", "cycle");
                    if let Some(digest) = self.in_flight_digest.take() {
                        context = context.with_digest(&digest);
                    }
                    ErrorLogger::log_error(&error, Some(context));
                    self.config.error_backoff()
                }
            };

            if self.is_shutdown_requested() {
                break;
            }

            self.transition(PollerState::Sleeping);
            self.clock.sleep(pause).await;
            self.transition(PollerState::Idle);
        }

        self.transition(PollerState::Idle);
        info!(
            "Poller stopped: {} processed, {} skipped, {} failed",
            self.stats.processed, self.stats.skipped, self.stats.failed
        );
    }

    /// One pass from the latest checkpoint down to the store
    pub async fn run_cycle(&mut self) -> Result<CycleOutcome, IndexerError> {
        self.in_flight_digest = None;

        self.transition(PollerState::FetchingLatestDigest);
        let sequence_number = self.source.latest_checkpoint().await?;
        self.clock.sleep(self.config.pacing_delay()).await;
        let digests = self.source.checkpoint_transactions(sequence_number).await?;
        let digest = digests.last().cloned().unwrap_or_default();

        if digest.is_empty() || self.last_processed_digest.as_deref() == Some(digest.as_str()) {
            self.transition(PollerState::Skip);
            self.stats.skipped += 1;
            LogContext::new("poller", "cycle")
                .with_checkpoint(sequence_number)
                .with_metadata("digest", json!(digest))
                .debug("No new transaction to process");
            return Ok(CycleOutcome::Skipped);
        }

        self.in_flight_digest = Some(digest.clone());

        self.transition(PollerState::FetchingDetails);
        self.clock.sleep(self.config.pacing_delay()).await;
        let value = self.source.transaction_block(&digest).await?;

        self.transition(PollerState::Normalizing);
        let mut record = normalize_value(value, &digest, self.clock.now())?;
        if record.digest.is_empty() {
            record.digest = digest.clone();
        }

        self.transition(PollerState::Persisting);
        let outcome = self.sink.upsert(&record)?;
        MetricsLogger::log_transaction_processed(
            &record.digest,
            record.checkpoint,
            record.status.as_str(),
            record.total_gas_used,
        );

        self.last_processed_digest = Some(digest.clone());
        self.in_flight_digest = None;
        self.stats.processed += 1;

        Ok(CycleOutcome::Processed { digest, outcome })
    }
}
