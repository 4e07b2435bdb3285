pub mod envelope;
pub mod normalizer;
pub mod transaction;

pub use envelope::{RawCommand, RawTransactionEnvelope, MoveCallTarget};
pub use normalizer::{normalize, normalize_value};
pub use transaction::{CanonicalTransaction, EventRecord, TransactionStatus};
