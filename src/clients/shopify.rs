//! Shopify admin API reachability probe.

use std::time::Duration;

use async_trait::async_trait;

use super::http::{build_client, check_status};
use super::{CollaboratorError, Result, StorefrontHealth};
use crate::config::{ShopifySettings, TimeoutConfig};

const SERVICE: &str = "shopify";

/// Calls `GET /admin/api/{version}/shop.json` with the admin access token.
pub struct ShopifyHealth {
    settings: ShopifySettings,
    client: reqwest::Client,
}

impl std::fmt::Debug for ShopifyHealth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ShopifyHealth")
            .field("shop_name", &self.settings.shop_name)
            .field("api_version", &self.settings.api_version)
            .finish()
    }
}

impl ShopifyHealth {
    pub fn new(settings: ShopifySettings, timeouts: &TimeoutConfig) -> Result<Self> {
        Ok(Self {
            client: build_client(SERVICE, Duration::from_secs(timeouts.health_timeout_secs))?,
            settings,
        })
    }

    pub fn shop_url(&self) -> String {
        format!(
            "{}/admin/api/{}/shop.json",
            self.settings.admin_base_url().trim_end_matches('/'),
            self.settings.api_version
        )
    }
}

#[async_trait]
impl StorefrontHealth for ShopifyHealth {
    async fn status(&self) -> Result<()> {
        let response = self
            .client
            .get(self.shop_url())
            .header("X-Shopify-Access-Token", &self.settings.access_token)
            .send()
            .await
            .map_err(|e| CollaboratorError::from_reqwest(SERVICE, &e))?;
        check_status(SERVICE, response).await.map(|_| ())
    }
}
