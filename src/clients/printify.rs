//! Printify v1 fulfillment client.
//!
//! Every call passes through the account-wide limiter (600 requests per
//! minute); publishing additionally passes the publish limiter (200 per 30
//! minutes). HTTP 429 is retried with `Retry-After` or exponential backoff.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tokio::sync::OnceCell;

use super::http::{build_client, check_status, read_json, send_with_retry};
use super::{CollaboratorError, Fulfillment, Result};
use crate::catalog::{CatalogVariant, ProductDraft};
use crate::config::{PrintifySettings, TimeoutConfig};
use crate::rate_limit::RateLimiter;

const SERVICE: &str = "printify";

/// Fields the publish call pushes to the storefront.
const PUBLISH_FIELDS: [&str; 5] = ["title", "description", "images", "variants", "tags"];

#[derive(Debug, Deserialize)]
struct VariantList {
    variants: Vec<WireVariant>,
}

#[derive(Debug, Deserialize)]
struct WireVariant {
    id: u64,
    options: WireOptions,
}

#[derive(Debug, Deserialize)]
struct WireOptions {
    color: String,
    size: String,
}

#[derive(Debug, Deserialize)]
struct IdOnly {
    id: serde_json::Value,
}

/// Printify ids arrive as numbers (shops) or strings (images, products).
fn id_string(value: &serde_json::Value) -> Option<String> {
    match value {
        serde_json::Value::String(s) if !s.is_empty() => Some(s.clone()),
        serde_json::Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Last path segment of an image URL, used as the upload's file name.
pub fn file_name_from_url(url: &str) -> &str {
    let path = url.split(['?', '#']).next().unwrap_or(url);
    path.rsplit('/').next().unwrap_or(path)
}

/// JSON body for `POST /shops/{shop}/products.json`.
pub fn build_product_body(draft: &ProductDraft) -> serde_json::Value {
    let print_areas: Vec<serde_json::Value> = draft
        .print_areas
        .iter()
        .map(|area| {
            serde_json::json!({
                "variant_ids": area.variant_ids,
                "placeholders": [{
                    "position": "front",
                    "images": [{
                        "id": area.image_id,
                        "x": 0.5,
                        "y": 0.5,
                        "scale": 1,
                        "angle": 0
                    }]
                }]
            })
        })
        .collect();

    serde_json::json!({
        "title": draft.title,
        "description": draft.description,
        "blueprint_id": draft.blueprint_id,
        "print_provider_id": draft.print_provider_id,
        "tags": draft.tags,
        "variants": draft.variants,
        "print_areas": print_areas,
    })
}

/// Keep only mockup images whose `position` is `front`.
pub fn front_images_only(product: &serde_json::Value) -> Vec<serde_json::Value> {
    product
        .get("images")
        .and_then(|v| v.as_array())
        .map(|images| {
            images
                .iter()
                .filter(|img| img.get("position").and_then(|p| p.as_str()) == Some("front"))
                .cloned()
                .collect()
        })
        .unwrap_or_default()
}

/// Product variants with every enabled-but-unavailable variant switched
/// off, plus how many were switched. A missing `is_available` counts as
/// unavailable.
pub fn disable_unavailable(product: &serde_json::Value) -> (Vec<serde_json::Value>, usize) {
    let mut variants = product
        .get("variants")
        .and_then(|v| v.as_array())
        .cloned()
        .unwrap_or_default();
    let mut disabled = 0;
    for variant in &mut variants {
        let flag = |key: &str| variant.get(key).and_then(|v| v.as_bool()).unwrap_or(false);
        let unavailable = flag("is_enabled") && !flag("is_available");
        if unavailable {
            if let Some(obj) = variant.as_object_mut() {
                obj.insert("is_enabled".into(), serde_json::Value::Bool(false));
                disabled += 1;
            }
        }
    }
    (variants, disabled)
}

/// HTTP [`Fulfillment`] implementation.
pub struct PrintifyClient {
    settings: PrintifySettings,
    client: reqwest::Client,
    health_client: reqwest::Client,
    limiter: RateLimiter,
    publish_limiter: RateLimiter,
    shop_id: OnceCell<String>,
}

impl std::fmt::Debug for PrintifyClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PrintifyClient")
            .field("base_url", &self.settings.base_url)
            .field("shop_id", &self.shop_id.get())
            .finish()
    }
}

impl PrintifyClient {
    pub fn new(settings: PrintifySettings, timeouts: &TimeoutConfig) -> Result<Self> {
        let shop_id = match settings.shop_id.clone().filter(|s| !s.trim().is_empty()) {
            Some(id) => OnceCell::new_with(Some(id)),
            None => OnceCell::new(),
        };
        Ok(Self {
            client: build_client(SERVICE, Duration::from_secs(timeouts.request_timeout_secs))?,
            health_client: build_client(SERVICE, Duration::from_secs(timeouts.health_timeout_secs))?,
            limiter: RateLimiter::per_minute("printify", settings.requests_per_minute),
            publish_limiter: RateLimiter::new(
                "printify-publish",
                settings.publishes_per_window,
                Duration::from_secs(settings.publish_window_secs),
            ),
            shop_id,
            settings,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.settings.base_url.trim_end_matches('/'))
    }

    async fn send(
        &self,
        method: reqwest::Method,
        path: &str,
        body: Option<&serde_json::Value>,
    ) -> Result<reqwest::Response> {
        let url = self.url(path);
        send_with_retry(SERVICE, self.settings.max_retries, Some(&self.limiter), || {
            let request = self
                .client
                .request(method.clone(), &url)
                .bearer_auth(&self.settings.api_key);
            match body {
                Some(body) => request.json(body),
                None => request,
            }
        })
        .await
    }

    async fn fetch_first_shop(&self) -> Result<String> {
        let response = self.send(reqwest::Method::GET, "/shops.json", None).await?;
        let shops: Vec<IdOnly> = read_json(SERVICE, response).await?;
        let id = shops
            .first()
            .and_then(|s| id_string(&s.id))
            .ok_or_else(|| CollaboratorError::decode(SERVICE, "account has no shops"))?;
        tracing::info!(shop_id = %id, "resolved printify shop");
        Ok(id)
    }

    /// Configured shop, or the account's first shop (resolved once).
    pub async fn shop_id(&self) -> Result<&str> {
        self.shop_id
            .get_or_try_init(|| self.fetch_first_shop())
            .await
            .map(String::as_str)
    }

    async fn get_product(&self, product_id: &str) -> Result<serde_json::Value> {
        let shop = self.shop_id().await?;
        let path = format!("/shops/{shop}/products/{product_id}.json");
        let response = self.send(reqwest::Method::GET, &path, None).await?;
        read_json(SERVICE, response).await
    }

    async fn update_product(&self, product_id: &str, patch: &serde_json::Value) -> Result<()> {
        let shop = self.shop_id().await?;
        let path = format!("/shops/{shop}/products/{product_id}.json");
        self.send(reqwest::Method::PUT, &path, Some(patch)).await?;
        Ok(())
    }
}

#[async_trait]
impl Fulfillment for PrintifyClient {
    async fn catalog_variants(
        &self,
        blueprint_id: u64,
        print_provider_id: u64,
    ) -> Result<Vec<CatalogVariant>> {
        let path = format!(
            "/catalog/blueprints/{blueprint_id}/print_providers/{print_provider_id}/variants.json"
        );
        let response = self.send(reqwest::Method::GET, &path, None).await?;
        let list: VariantList = read_json(SERVICE, response).await?;
        tracing::debug!(count = list.variants.len(), "catalog variants fetched");
        Ok(list
            .variants
            .into_iter()
            .map(|v| CatalogVariant {
                id: v.id,
                color: v.options.color,
                size: v.options.size,
            })
            .collect())
    }

    async fn upload_image(&self, url: &str) -> Result<String> {
        let body = serde_json::json!({
            "file_name": file_name_from_url(url),
            "url": url,
        });
        let response = self
            .send(reqwest::Method::POST, "/uploads/images.json", Some(&body))
            .await?;
        let uploaded: IdOnly = read_json(SERVICE, response).await?;
        let id = id_string(&uploaded.id)
            .ok_or_else(|| CollaboratorError::decode(SERVICE, "upload response has no id"))?;
        tracing::debug!(image_id = %id, url, "image registered");
        Ok(id)
    }

    async fn create_product(&self, draft: &ProductDraft) -> Result<String> {
        let shop = self.shop_id().await?;
        let body = build_product_body(draft);
        let path = format!("/shops/{shop}/products.json");
        let response = self.send(reqwest::Method::POST, &path, Some(&body)).await?;
        let created: IdOnly = read_json(SERVICE, response).await?;
        let id = id_string(&created.id)
            .ok_or_else(|| CollaboratorError::decode(SERVICE, "product response has no id"))?;
        tracing::info!(product_id = %id, title = %draft.title, "product created");
        Ok(id)
    }

    async fn publish_product(&self, product_id: &str) -> Result<()> {
        self.publish_limiter.acquire().await;
        let shop = self.shop_id().await?;
        let mut body = serde_json::Map::new();
        for field in PUBLISH_FIELDS {
            body.insert(field.into(), serde_json::Value::Bool(true));
        }
        let path = format!("/shops/{shop}/products/{product_id}/publish.json");
        self.send(reqwest::Method::POST, &path, Some(&serde_json::Value::Object(body)))
            .await?;
        tracing::info!(product_id, "product published");
        Ok(())
    }

    async fn disable_unavailable_variants(&self, product_id: &str) -> Result<usize> {
        let product = self.get_product(product_id).await?;
        let (variants, disabled) = disable_unavailable(&product);
        if disabled > 0 {
            self.update_product(product_id, &serde_json::json!({ "variants": variants }))
                .await?;
        }
        Ok(disabled)
    }

    async fn prune_non_front_images(&self, product_id: &str) -> Result<()> {
        let product = self.get_product(product_id).await?;
        let images = front_images_only(&product);
        self.update_product(product_id, &serde_json::json!({ "images": images }))
            .await
    }

    async fn status(&self) -> Result<()> {
        let response = self
            .health_client
            .get(self.url("/shops.json"))
            .bearer_auth(&self.settings.api_key)
            .send()
            .await
            .map_err(|e| CollaboratorError::from_reqwest(SERVICE, &e))?;
        check_status(SERVICE, response).await.map(|_| ())
    }
}
