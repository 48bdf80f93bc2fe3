//! Sender admission for linkcourier.
//!
//! [`TrustGate`] decides whether a message gets an answer:
//! - authentication tier: verified signal, allow-list, or trusted domain
//!   bypass; everyone else is warned once and then ignored
//! - throughput tier: per-sender request windows and permanent blocks
//!
//! State lives behind the [`AbuseStore`] and [`WarningStore`] capabilities,
//! with a SQLite implementation for deployments and an in-memory one for
//! tests.

mod error;
mod gate;
mod memory;
mod sqlite;
pub mod store;

pub use error::{TrustGateError, TrustGateResult};
pub use gate::{
    is_trusted_domain, next_abuse_record, Admission, AuthDecision, Sender, ThroughputDecision,
    TrustGate,
};
pub use memory::MemoryTrustStore;
pub use sqlite::SqliteTrustStore;
pub use store::{AbuseStore, AbuseTransition, AbuseUpdate, StoreKey, WarningStore};
