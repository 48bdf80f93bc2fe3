//! Request classification.
//!
//! One [`Classifier`] serves every channel: a channel-specific
//! pre-processing step (quote stripping for email, markup stripping for
//! messaging) feeds a shared tokenizer and a single left-to-right scan.
//! Locales come either from a `Lang:` line (email) or from body tokens
//! (messaging), and both land in [`Request::locale`].

mod classifier;
mod error;
mod preprocess;
mod request;

pub use classifier::{tokenize, Classifier};
pub use error::{ClassifierError, ClassifierResult};
pub use preprocess::{MarkedBody, Preprocessor};
pub use request::{ClassifierPolicy, Request, Vocabulary};
