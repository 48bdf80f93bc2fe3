//! Versioned, localized download-link catalog.
//!
//! Each provider owns one catalog document (see [`format`]) with a release
//! history per OS and locale. [`LinkCatalog`] resolves a request to the
//! latest release of every provider, falling back to the default locale,
//! and offers the append-only publishing operations.

mod catalog;
mod error;
pub mod format;
pub mod storage;

pub use catalog::LinkCatalog;
pub use error::{CatalogError, CatalogResult};
pub use format::{CatalogFile, LinkRecord, Release};
pub use storage::{CatalogStorage, FsCatalogStorage};
