pub mod poller;
pub mod rpc_client;

pub use poller::{ChainSource, CycleOutcome, Poller, PollerState, PollerStats, TransactionSink};
pub use rpc_client::SuiRpcClient;
