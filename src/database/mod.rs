pub mod operations;
pub mod schema;


pub use operations::{TransactionStore, UpsertOutcome};
pub use schema::initialize_schema;
