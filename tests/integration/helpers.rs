//! In-memory collaborators and a synthetic font shared by the integration tests.

use std::path::Path;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use image::RgbaImage;
use patternpress::catalog::{CatalogVariant, ProductDraft};
use patternpress::clients::{
    CollaboratorError, FileUpload, Fulfillment, ImageHost, PatternGenerator, StorefrontHealth,
    UploadReport,
};
use patternpress::pipeline::{Collaborators, OrchestratorSettings, Storage};
use patternpress::server::HealthProbes;
use patternpress::{PipelineConfig, PipelineOrchestrator, RawPattern, SqliteStore};
use patternpress_render::{AutoSizeRenderer, FontMetrics, GlyphPainter, LineMetrics, Rgba};
use rand::SeedableRng;
use rand::rngs::StdRng;

type Outcome<T> = Result<T, CollaboratorError>;

/// `size` px per character, ascent `2·size`, descent `0.5·size`.
pub(crate) struct Monospace;

impl FontMetrics for Monospace {
    fn line_metrics(&self, size: u32) -> LineMetrics {
        LineMetrics {
            ascent: 2.0 * size as f32,
            descent: 0.5 * size as f32,
        }
    }

    fn text_width(&self, size: u32, text: &str) -> f32 {
        (text.chars().count() as u32 * size) as f32
    }
}

impl GlyphPainter for Monospace {
    fn draw_line(&self, canvas: &mut RgbaImage, x: f32, y: f32, _: u32, _: &str, color: Rgba) {
        let (w, h) = canvas.dimensions();
        let (px, py) = (x.max(0.0) as u32, y.max(0.0) as u32);
        if px < w && py < h {
            canvas.put_pixel(px, py, image::Rgba([color.r, color.g, color.b, color.a]));
        }
    }
}

pub(crate) fn pattern(name: &str, text: &str) -> RawPattern {
    RawPattern {
        product_name: name.to_owned(),
        description: format!("{name} description"),
        tshirt_text: text.to_owned(),
        marketing_tags: vec!["funny".to_owned(), "tee".to_owned()],
    }
}

pub(crate) fn http_error(service: &'static str, status: u16) -> CollaboratorError {
    CollaboratorError::Http {
        service,
        status,
        message: "simulated".to_owned(),
    }
}

pub(crate) struct FakeGenerator {
    pub result: Outcome<Vec<RawPattern>>,
    pub healthy: bool,
    pub calls: Mutex<Vec<(String, u32)>>,
}

impl FakeGenerator {
    pub(crate) fn returning(patterns: Vec<RawPattern>) -> Self {
        Self {
            result: Ok(patterns),
            healthy: true,
            calls: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn failing(err: CollaboratorError) -> Self {
        Self {
            result: Err(err),
            healthy: true,
            calls: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn calls(&self) -> Vec<(String, u32)> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl PatternGenerator for FakeGenerator {
    async fn generate(&self, idea: &str, count: u32) -> Outcome<Vec<RawPattern>> {
        self.calls.lock().unwrap().push((idea.to_owned(), count));
        self.result.clone()
    }

    async fn status(&self) -> Outcome<()> {
        if self.healthy { Ok(()) } else { Err(http_error("openai", 401)) }
    }
}

/// Records uploaded file names; fails the first `fail_first` files in name order.
#[derive(Default)]
pub(crate) struct FakeImageHost {
    pub fail_first: usize,
    pub fail_all: bool,
    pub uploaded: Mutex<Vec<String>>,
}

#[async_trait]
impl ImageHost for FakeImageHost {
    async fn upload_dir(&self, local_dir: &Path, remote_folder: &str) -> Outcome<UploadReport> {
        if self.fail_all {
            return Err(http_error("github", 500));
        }
        let mut names: Vec<String> = std::fs::read_dir(local_dir)
            .map_err(|e| CollaboratorError::request("github", e.to_string()))?
            .filter_map(|e| e.ok())
            .map(|e| e.file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();

        let mut report = UploadReport::default();
        for (i, name) in names.into_iter().enumerate() {
            let error = (i < self.fail_first).then(|| "simulated upload failure".to_owned());
            if error.is_none() {
                self.uploaded
                    .lock()
                    .unwrap()
                    .push(format!("{remote_folder}/{name}"));
            }
            report.files.push(FileUpload {
                file_name: name,
                error,
            });
        }
        Ok(report)
    }

    fn public_url(&self, remote_folder: &str, file_name: &str) -> String {
        format!("https://images.test/{remote_folder}/{file_name}")
    }

    async fn status(&self) -> Outcome<()> {
        Ok(())
    }
}

/// Hands out sequential ids and records every call.
pub(crate) struct FakeFulfillment {
    pub catalog: Outcome<Vec<CatalogVariant>>,
    /// Product creation fails for drafts with this title.
    pub fail_create_title: Option<String>,
    pub fail_publish: bool,
    pub fail_variant_check: bool,
    /// When set, each catalog fetch waits here for the others.
    pub catalog_gate: Option<tokio::sync::Barrier>,
    pub healthy: bool,
    pub next_id: AtomicUsize,
    pub image_urls: Mutex<Vec<String>>,
    pub drafts: Mutex<Vec<ProductDraft>>,
    pub stock_checked: Mutex<Vec<String>>,
    pub pruned: Mutex<Vec<String>>,
    pub published: Mutex<Vec<String>>,
}

impl Default for FakeFulfillment {
    fn default() -> Self {
        Self {
            catalog: Ok(sample_catalog()),
            fail_create_title: None,
            fail_publish: false,
            fail_variant_check: false,
            catalog_gate: None,
            healthy: true,
            next_id: AtomicUsize::new(1),
            image_urls: Mutex::new(Vec::new()),
            drafts: Mutex::new(Vec::new()),
            stock_checked: Mutex::new(Vec::new()),
            pruned: Mutex::new(Vec::new()),
            published: Mutex::new(Vec::new()),
        }
    }
}

pub(crate) fn sample_catalog() -> Vec<CatalogVariant> {
    [
        (101, "Black", "L"),
        (102, "Black", "4XL"),
        (103, "White", "L"),
        (104, "Sport Grey", "M"),
        (105, "Navy", "S"),
        (106, "Ash", "L"),
    ]
    .into_iter()
    .map(|(id, color, size)| CatalogVariant {
        id,
        color: color.to_owned(),
        size: size.to_owned(),
    })
    .collect()
}

#[async_trait]
impl Fulfillment for FakeFulfillment {
    async fn catalog_variants(&self, _: u64, _: u64) -> Outcome<Vec<CatalogVariant>> {
        if let Some(gate) = &self.catalog_gate {
            gate.wait().await;
        }
        self.catalog.clone()
    }

    async fn upload_image(&self, url: &str) -> Outcome<String> {
        let mut urls = self.image_urls.lock().unwrap();
        urls.push(url.to_owned());
        Ok(format!("img-{}", urls.len()))
    }

    async fn create_product(&self, draft: &ProductDraft) -> Outcome<String> {
        if self.fail_create_title.as_deref() == Some(draft.title.as_str()) {
            return Err(http_error("printify", 400));
        }
        self.drafts.lock().unwrap().push(draft.clone());
        Ok(format!("prod-{}", self.next_id.fetch_add(1, Ordering::SeqCst)))
    }

    async fn publish_product(&self, product_id: &str) -> Outcome<()> {
        if self.fail_publish {
            return Err(http_error("printify", 503));
        }
        self.published.lock().unwrap().push(product_id.to_owned());
        Ok(())
    }

    async fn disable_unavailable_variants(&self, product_id: &str) -> Outcome<usize> {
        if self.fail_variant_check {
            return Err(http_error("printify", 500));
        }
        self.stock_checked.lock().unwrap().push(product_id.to_owned());
        Ok(0)
    }

    async fn prune_non_front_images(&self, product_id: &str) -> Outcome<()> {
        self.pruned.lock().unwrap().push(product_id.to_owned());
        Ok(())
    }

    async fn status(&self) -> Outcome<()> {
        if self.healthy { Ok(()) } else { Err(http_error("printify", 401)) }
    }
}

pub(crate) struct FakeStorefront {
    pub healthy: bool,
}

#[async_trait]
impl StorefrontHealth for FakeStorefront {
    async fn status(&self) -> Outcome<()> {
        if self.healthy { Ok(()) } else { Err(http_error("shopify", 500)) }
    }
}

/// A wired orchestrator plus handles on its fakes.
pub(crate) struct Harness {
    pub orchestrator: Arc<PipelineOrchestrator>,
    pub generator: Arc<FakeGenerator>,
    pub images: Arc<FakeImageHost>,
    pub fulfillment: Arc<FakeFulfillment>,
    pub store: Arc<SqliteStore>,
    pub output: tempfile::TempDir,
}

impl Harness {
    pub(crate) fn new(
        generator: FakeGenerator,
        images: FakeImageHost,
        fulfillment: FakeFulfillment,
    ) -> Self {
        Self::with_canvas(generator, images, fulfillment, 1200, 800)
    }

    pub(crate) fn with_canvas(
        generator: FakeGenerator,
        images: FakeImageHost,
        fulfillment: FakeFulfillment,
        width: u32,
        height: u32,
    ) -> Self {
        let output = tempfile::tempdir().expect("output dir");
        let mut config = PipelineConfig::default();
        config.render.canvas_width = width;
        config.render.canvas_height = height;
        config.render.output_dir = output.path().to_path_buf();

        let generator = Arc::new(generator);
        let images = Arc::new(images);
        let fulfillment = Arc::new(fulfillment);
        let store = Arc::new(SqliteStore::open_in_memory().expect("store"));

        let orchestrator = PipelineOrchestrator::new(
            OrchestratorSettings::from(&config),
            Collaborators {
                generator: generator.clone(),
                images: images.clone(),
                fulfillment: fulfillment.clone(),
            },
            Storage::sqlite(store.clone()),
            Arc::new(AutoSizeRenderer::new(Monospace)),
            StdRng::seed_from_u64(7),
        );

        Self {
            orchestrator: Arc::new(orchestrator),
            generator,
            images,
            fulfillment,
            store,
            output,
        }
    }

    pub(crate) fn health(&self, storefront: Option<FakeStorefront>) -> HealthProbes {
        HealthProbes {
            generator: self.generator.clone(),
            images: self.images.clone(),
            fulfillment: self.fulfillment.clone(),
            storefront: storefront.map(|s| Arc::new(s) as Arc<dyn StorefrontHealth>),
            products: self.store.clone(),
        }
    }
}
