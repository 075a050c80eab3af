//! External collaborators: pattern generation, image hosting, print
//! fulfillment and the storefront health probe.
//!
//! The orchestrator only sees the traits below. The HTTP implementations
//! live in the submodules; tests substitute in-memory fakes.

pub mod error;
pub mod github;
pub(crate) mod http;
pub mod openai;
pub mod printify;
pub mod shopify;

use std::path::Path;

use async_trait::async_trait;

pub use error::CollaboratorError;
pub use github::GithubImageHost;
pub use openai::OpenAiGenerator;
pub use printify::PrintifyClient;
pub use shopify::ShopifyHealth;

use crate::catalog::{CatalogVariant, ProductDraft};
use crate::types::RawPattern;

/// Convenience result type for collaborator calls.
pub type Result<T> = std::result::Result<T, CollaboratorError>;

/// Produces design concepts for an idea.
#[async_trait]
pub trait PatternGenerator: Send + Sync {
    /// Ask for `count` patterns about `idea`. The model may return a
    /// different number; callers use whatever comes back.
    async fn generate(&self, idea: &str, count: u32) -> Result<Vec<RawPattern>>;

    /// Cheap authenticated probe.
    async fn status(&self) -> Result<()>;
}

/// Result of uploading one file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileUpload {
    pub file_name: String,
    /// `None` on success.
    pub error: Option<String>,
}

/// Per-file outcome of [`ImageHost::upload_dir`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UploadReport {
    pub files: Vec<FileUpload>,
}

impl UploadReport {
    /// Error for `file_name`, or a note that it was never attempted.
    pub fn failure_for(&self, file_name: &str) -> Option<String> {
        match self.files.iter().find(|f| f.file_name == file_name) {
            Some(file) => file.error.clone(),
            None => Some(format!("{file_name} was not uploaded")),
        }
    }

    pub fn uploaded(&self) -> usize {
        self.files.iter().filter(|f| f.error.is_none()).count()
    }
}

/// Publishes local images at stable public URLs.
#[async_trait]
pub trait ImageHost: Send + Sync {
    /// Upload every file in `local_dir` into `remote_folder`. Individual
    /// file failures are reported, not raised; `Err` means nothing could be
    /// attempted.
    async fn upload_dir(&self, local_dir: &Path, remote_folder: &str) -> Result<UploadReport>;

    /// Public URL of an uploaded file.
    fn public_url(&self, remote_folder: &str, file_name: &str) -> String;

    async fn status(&self) -> Result<()>;
}

/// Print-on-demand product catalog and listing operations.
#[async_trait]
pub trait Fulfillment: Send + Sync {
    /// Raw provider variants for a blueprint.
    async fn catalog_variants(
        &self,
        blueprint_id: u64,
        print_provider_id: u64,
    ) -> Result<Vec<CatalogVariant>>;

    /// Register a publicly reachable image; returns its image id.
    async fn upload_image(&self, url: &str) -> Result<String>;

    /// Create a product; returns its product id.
    async fn create_product(&self, draft: &ProductDraft) -> Result<String>;

    async fn publish_product(&self, product_id: &str) -> Result<()>;

    /// Disable variants the provider reports as out of stock; returns how
    /// many were disabled.
    async fn disable_unavailable_variants(&self, product_id: &str) -> Result<usize>;

    /// Drop mockup images other than the front view.
    async fn prune_non_front_images(&self, product_id: &str) -> Result<()>;

    async fn status(&self) -> Result<()>;
}

/// Storefront reachability, used by the full health check only.
#[async_trait]
pub trait StorefrontHealth: Send + Sync {
    async fn status(&self) -> Result<()>;
}
