//! Pipeline orchestrator: idea → patterns → images → products → records.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::Utc;
use patternpress_render::{AutoSizeRenderer, GlyphPainter, RenderRequest, RenderedImage, Rgba};
use rand::SeedableRng;
use rand::rngs::StdRng;
use tokio::sync::Mutex;
use tracing::{info, warn};
use uuid::Uuid;

use crate::catalog::{
    PrintArea, ProductDraft, TEXT_COLORS, VariantCatalog, VariantPolicy, select_variants,
};
use crate::clients::{Fulfillment, ImageHost, PatternGenerator};
use crate::config::PipelineConfig;
use crate::error::{PipelineError, Result};
use crate::pipeline::messages::{FailureStage, QueueRequest, QueueRun, RunReport, RunRequest};
use crate::store::{ProductStore, SqliteStore, WorkQueue};
use crate::types::{EnrichedPattern, FinishedProduct, NewQueueItem, QueueItem};

/// `chrono` format of run folder names.
pub const RUN_FOLDER_FORMAT: &str = "%Y-%m-%d_%H-%M-%S";

/// Renders text to a PNG file. Implemented by [`AutoSizeRenderer`].
pub trait TextRenderer: Send + Sync + 'static {
    fn render_to_file(
        &self,
        request: &RenderRequest,
        path: &Path,
    ) -> patternpress_render::Result<RenderedImage>;
}

impl<F: GlyphPainter + 'static> TextRenderer for AutoSizeRenderer<F> {
    fn render_to_file(
        &self,
        request: &RenderRequest,
        path: &Path,
    ) -> patternpress_render::Result<RenderedImage> {
        AutoSizeRenderer::render_to_file(self, request, path)
    }
}

/// Run-shaping values taken from [`PipelineConfig`].
#[derive(Debug, Clone)]
pub struct OrchestratorSettings {
    pub canvas_width: u32,
    pub canvas_height: u32,
    /// Run folders are created here.
    pub output_dir: PathBuf,
    pub blueprint_id: u64,
    pub print_provider_id: u64,
    pub policy: VariantPolicy,
    pub default_patterns: u32,
    pub queue_default_patterns: u32,
    pub max_patterns: u32,
}

impl From<&PipelineConfig> for OrchestratorSettings {
    fn from(config: &PipelineConfig) -> Self {
        Self {
            canvas_width: config.render.canvas_width,
            canvas_height: config.render.canvas_height,
            output_dir: config.render.output_dir.clone(),
            blueprint_id: config.printify.blueprint_id,
            print_provider_id: config.printify.print_provider_id,
            policy: VariantPolicy::from(&config.printify),
            default_patterns: config.pipeline.default_patterns,
            queue_default_patterns: config.pipeline.queue_default_patterns,
            max_patterns: config.pipeline.max_patterns,
        }
    }
}

/// Outbound services a run talks to.
#[derive(Clone)]
pub struct Collaborators {
    pub generator: Arc<dyn PatternGenerator>,
    pub images: Arc<dyn ImageHost>,
    pub fulfillment: Arc<dyn Fulfillment>,
}

/// Queue and product persistence.
#[derive(Clone)]
pub struct Storage {
    pub queue: Arc<dyn WorkQueue>,
    pub products: Arc<dyn ProductStore>,
}

impl Storage {
    /// Both roles served by one SQLite store.
    pub fn sqlite(store: Arc<SqliteStore>) -> Self {
        Self {
            queue: store.clone(),
            products: store,
        }
    }
}

/// A step failure inside the per-pattern fulfillment sequence.
struct StageError {
    stage: FailureStage,
    error: PipelineError,
    product_id: Option<String>,
}

impl StageError {
    fn new(stage: FailureStage, error: impl Into<PipelineError>) -> Self {
        Self {
            stage,
            error: error.into(),
            product_id: None,
        }
    }

    fn with_product(mut self, product_id: &str) -> Self {
        self.product_id = Some(product_id.to_owned());
        self
    }
}

/// Drives one idea through generation, rendering, upload, fulfillment and
/// persistence. A failure on one pattern is recorded in the [`RunReport`];
/// only a generation failure aborts the run.
pub struct PipelineOrchestrator {
    settings: OrchestratorSettings,
    collaborators: Collaborators,
    storage: Storage,
    renderer: Arc<dyn TextRenderer>,
    rng: Mutex<StdRng>,
}

impl PipelineOrchestrator {
    pub fn new(
        settings: OrchestratorSettings,
        collaborators: Collaborators,
        storage: Storage,
        renderer: Arc<dyn TextRenderer>,
        rng: StdRng,
    ) -> Self {
        Self {
            settings,
            collaborators,
            storage,
            renderer,
            rng: Mutex::new(rng),
        }
    }

    /// Seeded from `seed` when given, otherwise from OS entropy.
    pub fn rng_from_seed(seed: Option<u64>) -> StdRng {
        match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        }
    }

    pub fn settings(&self) -> &OrchestratorSettings {
        &self.settings
    }

    /// Check a caller-supplied pattern count against `1..=max_patterns`.
    pub fn check_pattern_count(&self, patterns: u32) -> Result<u32> {
        if (1..=self.settings.max_patterns).contains(&patterns) {
            Ok(patterns)
        } else {
            Err(PipelineError::Config(format!(
                "patterns must be between 1 and {}, got {patterns}",
                self.settings.max_patterns
            )))
        }
    }

    /// Process one idea end to end.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::Generation`] when the generator fails or
    /// returns unusable output. Every later failure is per pattern and is
    /// reported in the returned [`RunReport`].
    pub async fn run(&self, request: RunRequest) -> Result<RunReport> {
        let patterns = request.patterns.clamp(1, self.settings.max_patterns.max(1));
        let run_folder = Utc::now().format(RUN_FOLDER_FORMAT).to_string();
        let run_dir = self.settings.output_dir.join(&run_folder);
        info!(idea = %request.idea, patterns, %run_folder, publish = request.publish, "run started");

        let raw = self
            .collaborators
            .generator
            .generate(&request.idea, patterns)
            .await
            .map_err(|e| PipelineError::Generation(e.to_string()))?;
        if raw.is_empty() {
            return Err(PipelineError::Generation(
                "generator returned no patterns".to_owned(),
            ));
        }
        let enriched: Vec<EnrichedPattern> =
            raw.into_iter().map(|p| p.enrich(Uuid::new_v4())).collect();

        let mut report = RunReport::new(&run_folder);

        let mut rendered = Vec::with_capacity(enriched.len());
        for pattern in enriched {
            match self.render_pattern(&pattern, &run_dir).await {
                Ok(()) => rendered.push(pattern),
                Err(e) => report.fail(&pattern, FailureStage::Render, e, None),
            }
        }
        if rendered.is_empty() {
            return Ok(finish(report));
        }

        let uploaded = match self
            .collaborators
            .images
            .upload_dir(&run_dir, &run_folder)
            .await
        {
            Ok(upload) => {
                let mut ok = Vec::with_capacity(rendered.len());
                for pattern in rendered {
                    let stem = pattern.id.to_string();
                    let failed = TEXT_COLORS
                        .iter()
                        .find_map(|color| upload.failure_for(&color.file_name(&stem)));
                    match failed {
                        Some(error) => report.fail(&pattern, FailureStage::Upload, error, None),
                        None => ok.push(pattern),
                    }
                }
                ok
            }
            Err(e) => {
                for pattern in &rendered {
                    report.fail(pattern, FailureStage::Upload, &e, None);
                }
                Vec::new()
            }
        };
        if uploaded.is_empty() {
            return Ok(finish(report));
        }

        let catalog = match self.variant_catalog().await {
            Ok(catalog) => catalog,
            Err(e) => {
                for pattern in &uploaded {
                    report.fail(pattern, FailureStage::Fulfillment, &e, None);
                }
                return Ok(finish(report));
            }
        };

        for pattern in uploaded {
            match self
                .fulfill(pattern.clone(), &catalog, &run_folder, request.publish)
                .await
            {
                Ok(product) => report.products.push(product),
                Err(e) => report.fail(&pattern, e.stage, &e.error, e.product_id),
            }
        }

        Ok(finish(report))
    }

    /// Claim the oldest queued idea and run it.
    ///
    /// The claim is destructive: if the run then fails, the item is not
    /// re-queued.
    pub async fn run_next_queued(&self, publish: bool) -> Result<QueueRun> {
        let queue = Arc::clone(&self.storage.queue);
        let Some(item) = tokio::task::spawn_blocking(move || queue.claim_oldest()).await?? else {
            info!("queue empty");
            return Ok(QueueRun::Empty);
        };

        let report = self
            .run(RunRequest {
                idea: item.idea.clone(),
                patterns: item.patterns,
                publish,
            })
            .await?;
        Ok(QueueRun::Processed { item, report })
    }

    /// Stage ideas for later processing. All are stored or none.
    pub async fn enqueue(&self, requests: Vec<QueueRequest>) -> Result<Vec<QueueItem>> {
        let now = Utc::now();
        let mut items = Vec::with_capacity(requests.len());
        for request in requests {
            let patterns = match request.patterns {
                Some(p) => self.check_pattern_count(p)?,
                None => self.settings.queue_default_patterns,
            };
            items.push(NewQueueItem {
                idea: request.idea,
                patterns,
                enqueued_at: now,
            });
        }
        let queue = Arc::clone(&self.storage.queue);
        let stored = tokio::task::spawn_blocking(move || queue.enqueue_many(&items)).await??;
        info!(count = stored.len(), "ideas queued");
        Ok(stored)
    }

    /// Pending queue items.
    pub async fn queue_count(&self) -> Result<u64> {
        let queue = Arc::clone(&self.storage.queue);
        Ok(tokio::task::spawn_blocking(move || queue.count()).await??)
    }

    async fn render_pattern(&self, pattern: &EnrichedPattern, run_dir: &Path) -> Result<()> {
        let renderer = Arc::clone(&self.renderer);
        let text = pattern.tshirt_text.clone();
        let stem = pattern.id.to_string();
        let dir = run_dir.to_path_buf();
        let (width, height) = (self.settings.canvas_width, self.settings.canvas_height);

        tokio::task::spawn_blocking(move || -> Result<()> {
            for color in TEXT_COLORS {
                let request = RenderRequest::new(text.clone(), width, height, Rgba::from_hex(color.hex)?);
                let image = renderer.render_to_file(&request, &dir.join(color.file_name(&stem)))?;
                tracing::debug!(
                    path = %image.path.display(),
                    font_size = image.font_size,
                    lines = image.lines.len(),
                    "image rendered"
                );
            }
            Ok(())
        })
        .await?
    }

    async fn variant_catalog(&self) -> Result<VariantCatalog> {
        let raw = self
            .collaborators
            .fulfillment
            .catalog_variants(self.settings.blueprint_id, self.settings.print_provider_id)
            .await?;
        let catalog = {
            let mut rng = self.rng.lock().await;
            select_variants(&raw, &self.settings.policy, &mut *rng)
        };
        if catalog.is_empty() {
            warn!("variant catalog is empty after filtering");
        }
        Ok(catalog)
    }

    async fn fulfill(
        &self,
        pattern: EnrichedPattern,
        catalog: &VariantCatalog,
        run_folder: &str,
        publish: bool,
    ) -> std::result::Result<FinishedProduct, StageError> {
        let fulfillment = &self.collaborators.fulfillment;
        let stem = pattern.id.to_string();

        let mut image_ids = Vec::with_capacity(TEXT_COLORS.len());
        for color in TEXT_COLORS {
            let url = self
                .collaborators
                .images
                .public_url(run_folder, &color.file_name(&stem));
            let id = fulfillment
                .upload_image(&url)
                .await
                .map_err(|e| StageError::new(FailureStage::Fulfillment, e))?;
            image_ids.push(id);
        }

        let draft = ProductDraft {
            title: pattern.product_name.clone(),
            description: pattern.description.clone(),
            tags: pattern.marketing_tags.clone(),
            blueprint_id: self.settings.blueprint_id,
            print_provider_id: self.settings.print_provider_id,
            variants: catalog.variants.clone(),
            print_areas: TEXT_COLORS
                .iter()
                .zip(&image_ids)
                .map(|(color, image_id)| PrintArea {
                    variant_ids: color.variant_ids(catalog).to_vec(),
                    image_id: image_id.clone(),
                })
                .collect(),
        };
        let product_id = fulfillment
            .create_product(&draft)
            .await
            .map_err(|e| StageError::new(FailureStage::Fulfillment, e))?;

        let disabled = fulfillment
            .disable_unavailable_variants(&product_id)
            .await
            .map_err(|e| StageError::new(FailureStage::Fulfillment, e).with_product(&product_id))?;
        if disabled > 0 {
            info!(product_id = %product_id, disabled, "unavailable variants disabled");
        }

        fulfillment
            .prune_non_front_images(&product_id)
            .await
            .map_err(|e| StageError::new(FailureStage::Fulfillment, e).with_product(&product_id))?;

        if publish {
            fulfillment
                .publish_product(&product_id)
                .await
                .map_err(|e| StageError::new(FailureStage::Publish, e).with_product(&product_id))?;
        }

        let product = pattern.finish(product_id, image_ids);
        let products = Arc::clone(&self.storage.products);
        let record = product.clone();
        tokio::task::spawn_blocking(move || products.put_product(&record))
            .await
            .map_err(|e| StageError::new(FailureStage::Persist, e))?
            .map_err(|e| StageError::new(FailureStage::Persist, e).with_product(&product.product_id))?;

        info!(product_id = %product.product_id, pattern_id = %product.pattern_id, "product finished");
        Ok(product)
    }
}

fn finish(report: RunReport) -> RunReport {
    info!(
        run_folder = %report.run_folder,
        products = report.products.len(),
        failures = report.failures.len(),
        "run finished"
    );
    report
}
