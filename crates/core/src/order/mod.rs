//! Order persistence for the reconciliation job.

mod sqlite_store;
mod store;
mod types;

pub use sqlite_store::SqliteOrderStore;
pub use store::{
    CreateOrderRequest, OrderQuery, OrderStore, StatusUpdate, StoreError, UpdateOutcome,
};
pub use types::Order;
