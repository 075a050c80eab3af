//! patternpress: turns an idea into print-on-demand t-shirt listings.
//!
//! An idea goes to a language model, which proposes several designs. Each
//! design's text is rendered as a centered, auto-sized image in a dark and a
//! light variant, uploaded to an image host, attached to a product on the
//! fulfillment service, and recorded in the local store:
//!
//! idea → [`clients::PatternGenerator`] → [`patternpress_render::AutoSizeRenderer`]
//! → [`clients::ImageHost`] → [`clients::Fulfillment`] → [`store::ProductStore`]
//!
//! Ideas can also be staged in a [`store::WorkQueue`] and processed one at a
//! time. [`server`] exposes both paths over HTTP behind a bearer token.

pub mod catalog;
pub mod clients;
pub mod config;
pub mod error;
pub mod pipeline;
pub mod rate_limit;
pub mod server;
pub mod store;
pub mod types;

pub use config::PipelineConfig;
pub use error::{PipelineError, Result};
pub use pipeline::{PipelineOrchestrator, QueueRun, RunReport, RunRequest};
pub use store::{SqliteStore, StorageError};
pub use types::{EnrichedPattern, FinishedProduct, QueueItem, RawPattern};
