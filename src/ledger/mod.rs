//! Ledger Store module
//!
//! Persistence for wallets and the append-only transaction log.
//! The engine talks to it only through the `LedgerStore` / `LedgerTx` traits.

mod error;
pub mod memory;
mod postgres;
mod queries;
mod store;

pub use error::{StoreError, StoreResult};
pub use memory::{Fault, FaultPoint, MemoryLedger};
pub use postgres::PgLedger;
pub use store::{LedgerStore, LedgerTx};
