//! Service health probes.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::Serialize;

use crate::clients::{CollaboratorError, Fulfillment, ImageHost, PatternGenerator, StorefrontHealth};
use crate::store::{ProductStore, StorageError};

pub const STATUS_OK: &str = "OK";
pub const NOT_CONFIGURED: &str = "Not configured";

/// Everything `/full_healthcheck` asks about.
#[derive(Clone)]
pub struct HealthProbes {
    pub generator: Arc<dyn PatternGenerator>,
    pub images: Arc<dyn ImageHost>,
    pub fulfillment: Arc<dyn Fulfillment>,
    /// `None` when no storefront is configured.
    pub storefront: Option<Arc<dyn StorefrontHealth>>,
    pub products: Arc<dyn ProductStore>,
}

/// `{"status": "OK" | "Error", "details": {service: status}}`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HealthReport {
    pub status: String,
    pub details: BTreeMap<String, String>,
}

impl HealthReport {
    pub fn is_ok(&self) -> bool {
        self.status == STATUS_OK
    }
}

fn describe(result: Result<(), CollaboratorError>) -> String {
    match result {
        Ok(()) => STATUS_OK.to_owned(),
        Err(e) => format!("Error {e}"),
    }
}

impl HealthProbes {
    /// Trivial read against the product store.
    pub async fn database(&self) -> Result<(), StorageError> {
        let products = Arc::clone(&self.products);
        tokio::task::spawn_blocking(move || products.healthcheck())
            .await
            .map_err(|e| StorageError::Io(e.to_string()))?
    }

    /// Probe every collaborator concurrently. An unconfigured storefront is
    /// reported but does not fail the overall status.
    pub async fn full_report(&self) -> HealthReport {
        let storefront = async {
            match &self.storefront {
                Some(s) => describe(s.status().await),
                None => NOT_CONFIGURED.to_owned(),
            }
        };
        let database = async {
            match self.database().await {
                Ok(()) => STATUS_OK.to_owned(),
                Err(e) => {
                    tracing::error!(error = %e, "database health check failed");
                    "Error: check logs".to_owned()
                }
            }
        };
        let (printify, shopify, openai, github, database) = tokio::join!(
            async { describe(self.fulfillment.status().await) },
            storefront,
            async { describe(self.generator.status().await) },
            async { describe(self.images.status().await) },
            database,
        );

        let details: BTreeMap<String, String> = [
            ("printify", printify),
            ("shopify", shopify),
            ("openai", openai),
            ("github", github),
            ("database", database),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_owned(), v))
        .collect();

        let healthy = details
            .values()
            .all(|v| v == STATUS_OK || v == NOT_CONFIGURED);
        if !healthy {
            tracing::warn!(?details, "full health check failed");
        }
        HealthReport {
            status: if healthy { STATUS_OK } else { "Error" }.to_owned(),
            details,
        }
    }
}
