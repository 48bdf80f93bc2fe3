//! Core types, configuration, and utilities for linkcourier.
//!
//! Every other crate in the workspace depends on this one for:
//! - [`Config`]: the per-deployment settings (catalog vocabulary, channel
//!   policies, allow-list, collaborator file locations)
//! - [`Paths`]: where runtime files live
//! - [`init_logging`]: structured logging setup
//! - the shared vocabulary types in [`channel`]

pub mod channel;
mod config;
mod error;
mod logging;
mod paths;

pub use channel::{ChannelKind, LocalePolicy, LocaleStrategy, RequestType};
pub use config::{
    CatalogSettings, ChannelPolicies, ChannelPolicy, Config, DEFAULT_LOCALE, DEFAULT_LOG_LEVEL,
};
pub use error::{CoreError, CoreResult};
pub use logging::{init_logging, parse_level};
pub use paths::Paths;
