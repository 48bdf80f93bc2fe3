//! Request dispatch for linkcourier.
//!
//! The [`Dispatcher`] is the one place every channel funnels into:
//! normalize the sender, ask the trust gate, classify the body, answer
//! from the link catalog, and append a usage record whatever happens.
//!
//! Channel adapters implement [`Channel`]; reply texts come from a
//! [`Translator`]; usage records go to a [`UsageSink`].

pub mod address;
mod archive;
mod channel;
mod dispatcher;
mod error;
pub mod i18n;
mod usage;

pub use archive::{new_diagnostic_ref, MessageArchive};
pub use channel::{Channel, InboundMessage, OutboundMessage};
pub use dispatcher::Dispatcher;
pub use error::{ChannelError, DispatchError, DispatchResult};
pub use i18n::{BuiltinTranslator, MessageKey, Translator};
pub use usage::{MemoryUsageSink, SqliteUsageSink, UsageSink};
