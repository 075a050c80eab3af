//! Configuration types for the patternpress service.
//!
//! A single [`PipelineConfig`] is built at process start (TOML file, then
//! environment overrides for secrets) and passed by reference to every
//! component. Nothing below the binary reads the environment.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::error::PipelineError;

/// Top-level service configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// HTTP listener and API key.
    pub server: ServerConfig,
    /// Pattern generation (OpenAI) settings.
    pub openai: OpenAiSettings,
    /// Image hosting (GitHub repository) settings.
    pub github: GithubSettings,
    /// Print fulfillment (Printify) settings.
    pub printify: PrintifySettings,
    /// Storefront (Shopify) health probe; absent disables the probe.
    pub shopify: Option<ShopifySettings>,
    /// SQLite database location.
    pub storage: StorageConfig,
    /// Text image rendering.
    pub render: RenderConfig,
    /// Run sizing and reproducibility.
    pub pipeline: RunConfig,
    /// Outbound call timeouts.
    pub timeouts: TimeoutConfig,
}

/// HTTP listener configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Bearer token required by every mutating endpoint.
    pub api_key: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_owned(),
            port: 8000,
            api_key: String::new(),
        }
    }
}

/// OpenAI chat completion settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OpenAiSettings {
    pub api_key: String,
    pub base_url: String,
    pub model: String,
    pub temperature: f32,
    pub max_tokens: Option<u32>,
    pub frequency_penalty: f32,
}

impl Default for OpenAiSettings {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            base_url: "https://api.openai.com".to_owned(),
            // Structured outputs need gpt-4o-2024-08-06 or later.
            model: "gpt-4o-2024-08-06".to_owned(),
            temperature: 0.7,
            max_tokens: None,
            frequency_penalty: 0.0,
        }
    }
}

/// GitHub repository used as a static image host.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GithubSettings {
    /// Personal access token with `contents:write`.
    pub token: String,
    /// `owner/repo` or a `https://github.com/owner/repo` URL.
    pub repository: String,
    pub branch: String,
    pub api_base_url: String,
    /// Public URL prefix for raw files, e.g.
    /// `https://raw.githubusercontent.com/owner/repo/main`.
    pub content_prefix: String,
    /// Directory inside the repository that run folders are written under.
    pub remote_root: String,
    pub uploads_per_minute: u32,
}

impl Default for GithubSettings {
    fn default() -> Self {
        Self {
            token: String::new(),
            repository: String::new(),
            branch: "main".to_owned(),
            api_base_url: "https://api.github.com".to_owned(),
            content_prefix: String::new(),
            remote_root: String::new(),
            uploads_per_minute: 60,
        }
    }
}

impl GithubSettings {
    /// `(owner, repo)` parsed from [`GithubSettings::repository`].
    pub fn owner_repo(&self) -> Option<(String, String)> {
        parse_repository(&self.repository)
    }
}

/// Printify catalog and shop settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PrintifySettings {
    pub api_key: String,
    pub base_url: String,
    /// Shop to create products in; the first shop of the account when unset.
    pub shop_id: Option<String>,
    /// Unisex Gildan T-Shirt.
    pub blueprint_id: u64,
    /// Printify Choice provider.
    pub print_provider_id: u64,
    /// Price in cents for XS through 2XL.
    pub standard_price: u32,
    /// Price in cents for larger sizes (kept disabled).
    pub extended_price: u32,
    pub max_variants: usize,
    pub requests_per_minute: u32,
    pub publishes_per_window: u32,
    pub publish_window_secs: u64,
    /// Retries after HTTP 429 before giving up.
    pub max_retries: u32,
}

impl Default for PrintifySettings {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            base_url: "https://api.printify.com/v1".to_owned(),
            shop_id: None,
            blueprint_id: 6,
            print_provider_id: 99,
            standard_price: 2399,
            extended_price: 2999,
            max_variants: 100,
            requests_per_minute: 600,
            publishes_per_window: 200,
            publish_window_secs: 1800,
            max_retries: 3,
        }
    }
}

/// Shopify admin API settings (health probe only).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ShopifySettings {
    pub shop_name: String,
    pub access_token: String,
    pub api_version: String,
    /// Overrides `https://{shop_name}.myshopify.com`.
    pub base_url: Option<String>,
}

impl Default for ShopifySettings {
    fn default() -> Self {
        Self {
            shop_name: String::new(),
            access_token: String::new(),
            api_version: "2024-07".to_owned(),
            base_url: None,
        }
    }
}

impl ShopifySettings {
    pub fn admin_base_url(&self) -> String {
        self.base_url
            .clone()
            .unwrap_or_else(|| format!("https://{}.myshopify.com", self.shop_name))
    }
}

/// SQLite storage settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub db_path: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            db_path: default_data_dir().join("patternpress.db"),
        }
    }
}

/// Text image rendering settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderConfig {
    pub canvas_width: u32,
    pub canvas_height: u32,
    pub min_font_size: u32,
    pub max_font_size: u32,
    /// Font file; the first well-known system font when unset.
    pub font_path: Option<PathBuf>,
    /// Run folders are created under this directory.
    pub output_dir: PathBuf,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            canvas_width: 2000,
            canvas_height: 2000,
            min_font_size: 1,
            max_font_size: 500,
            font_path: None,
            output_dir: PathBuf::from("img"),
        }
    }
}

/// Run sizing.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    /// Patterns per direct request when the caller omits a count.
    pub default_patterns: u32,
    /// Patterns per queued idea when the enqueuer omits a count.
    pub queue_default_patterns: u32,
    /// Upper bound accepted from callers.
    pub max_patterns: u32,
    /// Seed for default-variant color choice. Entropy-seeded when unset.
    pub rng_seed: Option<u64>,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            default_patterns: 3,
            queue_default_patterns: 10,
            max_patterns: 25,
            rng_seed: None,
        }
    }
}

/// Outbound HTTP timeouts.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TimeoutConfig {
    pub health_timeout_secs: u64,
    pub request_timeout_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            health_timeout_secs: 10,
            request_timeout_secs: 120,
        }
    }
}

fn default_data_dir() -> PathBuf {
    dirs::data_local_dir()
        .map(|d| d.join("patternpress"))
        .unwrap_or_else(|| PathBuf::from("/tmp").join("patternpress"))
}

/// Parse `owner/repo`, `https://github.com/owner/repo` or the `.git` form.
pub fn parse_repository(raw: &str) -> Option<(String, String)> {
    let trimmed = raw.trim().trim_end_matches('/');
    let path = trimmed
        .strip_prefix("https://github.com/")
        .or_else(|| trimmed.strip_prefix("http://github.com/"))
        .or_else(|| trimmed.strip_prefix("git@github.com:"))
        .unwrap_or(trimmed);
    let path = path.strip_suffix(".git").unwrap_or(path);
    let mut parts = path.split('/');
    let owner = parts.next().filter(|s| !s.is_empty())?;
    let repo = parts.next().filter(|s| !s.is_empty())?;
    if parts.next().is_some() {
        return None;
    }
    Some((owner.to_owned(), repo.to_owned()))
}

impl PipelineConfig {
    /// Load configuration from a TOML file, falling back to defaults for missing fields.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: &std::path::Path) -> crate::error::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content).map_err(|e| PipelineError::Config(e.to_string()))
    }

    /// Save configuration to a TOML file, creating parent directories as needed.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written or the config cannot be serialized.
    pub fn save_to_file(&self, path: &std::path::Path) -> crate::error::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content =
            toml::to_string_pretty(self).map_err(|e| PipelineError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Returns the default config file path: `~/.config/patternpress/config.toml`.
    pub fn default_config_path() -> PathBuf {
        dirs::config_dir()
            .map(|d| d.join("patternpress").join("config.toml"))
            .unwrap_or_else(|| PathBuf::from("/tmp/patternpress-config/config.toml"))
    }

    /// Overlay secrets and deployment values from environment-style variables.
    ///
    /// `lookup` is usually `|k| std::env::var(k).ok()`; tests pass a map.
    /// Empty values are ignored.
    pub fn apply_env_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(v) = get("API_KEY") {
            self.server.api_key = v;
        }
        if let Some(v) = get("OPENAI_API_KEY") {
            self.openai.api_key = v;
        }
        if let Some(v) = get("PRINTIFY_API_KEY") {
            self.printify.api_key = v;
        }
        if let Some(v) = get("PRINTIFY_SHOP_ID") {
            self.printify.shop_id = Some(v);
        }
        if let Some(v) = get("GH_PAT") {
            self.github.token = v;
        }
        if let Some(v) = get("GH_UPLOAD_REPO") {
            self.github.repository = v;
        }
        if let Some(v) = get("GH_CONTENT_PREFIX") {
            self.github.content_prefix = v;
        }
        if let Some(v) = get("PATTERNPRESS_DB") {
            self.storage.db_path = PathBuf::from(v);
        }
        if let Some(v) = get("PATTERNPRESS_FONT") {
            self.render.font_path = Some(PathBuf::from(v));
        }

        let shop_name = get("SHOPIFY_SHOP_NAME");
        let shop_token = get("SHOPIFY_ACCESS_TOKEN");
        if shop_name.is_some() || shop_token.is_some() {
            let shopify = self.shopify.get_or_insert_with(ShopifySettings::default);
            if let Some(v) = shop_name {
                shopify.shop_name = v;
            }
            if let Some(v) = shop_token {
                shopify.access_token = v;
            }
        }
    }

    /// Check invariants the service relies on.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::Config`] naming the first invalid field.
    pub fn validate(&self) -> crate::error::Result<()> {
        let fail = |msg: &str| Err(PipelineError::Config(msg.to_owned()));

        if self.server.api_key.trim().is_empty() {
            return fail("server.api_key (API_KEY) must be set");
        }
        if self.render.canvas_width == 0 || self.render.canvas_height == 0 {
            return fail("render canvas dimensions must be greater than 0");
        }
        if self.render.min_font_size == 0 || self.render.min_font_size > self.render.max_font_size
        {
            return fail("render font sizes must satisfy 1 <= min_font_size <= max_font_size");
        }
        if self.pipeline.max_patterns == 0 {
            return fail("pipeline.max_patterns must be greater than 0");
        }
        if self.pipeline.default_patterns == 0
            || self.pipeline.default_patterns > self.pipeline.max_patterns
            || self.pipeline.queue_default_patterns == 0
            || self.pipeline.queue_default_patterns > self.pipeline.max_patterns
        {
            return fail("pipeline default pattern counts must be within 1..=max_patterns");
        }
        if !self.github.repository.is_empty() && self.github.owner_repo().is_none() {
            return fail("github.repository must look like owner/repo");
        }
        if self.timeouts.health_timeout_secs == 0 || self.timeouts.request_timeout_secs == 0 {
            return fail("timeouts must be greater than 0");
        }
        if self.printify.requests_per_minute == 0
            || self.printify.publishes_per_window == 0
            || self.github.uploads_per_minute == 0
        {
            return fail("rate limits must be greater than 0");
        }
        Ok(())
    }
}
