//! patternpress HTTP service.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use patternpress::clients::{
    GithubImageHost, OpenAiGenerator, PrintifyClient, ShopifyHealth, StorefrontHealth,
};
use patternpress::pipeline::{Collaborators, OrchestratorSettings, Storage};
use patternpress::server::{AppState, HealthProbes};
use patternpress::{PipelineConfig, PipelineOrchestrator, SqliteStore};
use patternpress_render::{AutoSizeRenderer, RenderRequest, Rgba, RusttypeFace, SizeRange};
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Idea-to-listing pipeline for print-on-demand apparel.
#[derive(Parser)]
#[command(name = "patternpress", version, about)]
struct Cli {
    /// Path to TOML configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override the listen host.
    #[arg(long)]
    host: Option<String>,

    /// Override the listen port.
    #[arg(long)]
    port: Option<u16>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Run the HTTP service (default).
    Serve,

    /// Write the default configuration to the config path.
    InitConfig,

    /// Render one text image with the configured font and canvas.
    Render {
        /// Text to print.
        text: String,
        /// Output PNG path.
        #[arg(short, long, default_value = "render.png")]
        out: PathBuf,
        /// Text color as hex.
        #[arg(long, default_value = "000000")]
        color: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("patternpress=info,patternpress_render=info")),
        )
        .init();

    let cli = Cli::parse();
    let config_path = cli
        .config
        .clone()
        .unwrap_or_else(PipelineConfig::default_config_path);

    if let Some(Command::InitConfig) = cli.command {
        PipelineConfig::default().save_to_file(&config_path)?;
        println!("wrote {}", config_path.display());
        return Ok(());
    }

    let mut config = if config_path.exists() {
        PipelineConfig::from_file(&config_path)
            .with_context(|| format!("loading {}", config_path.display()))?
    } else {
        info!(path = %config_path.display(), "no config file; using defaults");
        PipelineConfig::default()
    };
    config.apply_env_overrides(|key| std::env::var(key).ok());
    if let Some(host) = cli.host {
        config.server.host = host;
    }
    if let Some(port) = cli.port {
        config.server.port = port;
    }

    match cli.command.unwrap_or(Command::Serve) {
        Command::Render { text, out, color } => render_once(&config, &text, &out, &color),
        Command::Serve | Command::InitConfig => serve(config).await,
    }
}

fn build_renderer(config: &PipelineConfig) -> anyhow::Result<AutoSizeRenderer<RusttypeFace>> {
    let face = RusttypeFace::discover(config.render.font_path.as_deref())?;
    let range = SizeRange::new(config.render.min_font_size, config.render.max_font_size)?;
    info!(font = ?face.path(), min = range.min(), max = range.max(), "font loaded");
    Ok(AutoSizeRenderer::new(face).with_range(range))
}

fn render_once(
    config: &PipelineConfig,
    text: &str,
    out: &std::path::Path,
    color: &str,
) -> anyhow::Result<()> {
    let renderer = build_renderer(config)?;
    let request = RenderRequest::new(
        text,
        config.render.canvas_width,
        config.render.canvas_height,
        Rgba::from_hex(color)?,
    );
    let image = renderer.render_to_file(&request, out)?;
    println!(
        "{} ({}x{}, font size {}, {} lines)",
        image.path.display(),
        image.width_px,
        image.height_px,
        image.font_size,
        image.lines.len()
    );
    Ok(())
}

async fn serve(config: PipelineConfig) -> anyhow::Result<()> {
    config.validate()?;

    let store = Arc::new(SqliteStore::open(&config.storage.db_path)?);
    info!(db = %config.storage.db_path.display(), "store opened");

    let generator = Arc::new(OpenAiGenerator::new(config.openai.clone(), &config.timeouts)?);
    let images = Arc::new(GithubImageHost::new(config.github.clone(), &config.timeouts)?);
    let fulfillment = Arc::new(PrintifyClient::new(config.printify.clone(), &config.timeouts)?);
    let storefront = match &config.shopify {
        Some(settings) => Some(
            Arc::new(ShopifyHealth::new(settings.clone(), &config.timeouts)?)
                as Arc<dyn StorefrontHealth>,
        ),
        None => None,
    };

    let orchestrator = PipelineOrchestrator::new(
        OrchestratorSettings::from(&config),
        Collaborators {
            generator: generator.clone(),
            images: images.clone(),
            fulfillment: fulfillment.clone(),
        },
        Storage::sqlite(store.clone()),
        Arc::new(build_renderer(&config)?),
        PipelineOrchestrator::rng_from_seed(config.pipeline.rng_seed),
    );
    let health = HealthProbes {
        generator,
        images,
        fulfillment,
        storefront,
        products: store,
    };

    let state = AppState::new(
        Arc::new(orchestrator),
        Arc::new(health),
        config.server.api_key.clone(),
    );
    patternpress::server::run_server(&config.server.host, config.server.port, state).await
}
