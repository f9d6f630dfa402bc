use anyhow::Context;
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use dyelab::api;
use dyelab::models::{AppConfig, ColorSpec, RecolorSettings, SizeClass, Tier};
use dyelab::server;
use dyelab::services::{
    decode_surface, BatchEvent, BatchOrchestrator, BatchRequest, BatchSink, GeminiClient,
    ImageGenerator, RetryPolicy, Workspace,
};

const DEFAULT_CONFIG_FILE: &str = "dyelab.yaml";

#[derive(Parser)]
#[command(name = "dyelab")]
#[command(about = "Batch garment recoloring through a generative image service")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP server
    Serve,
    /// Recolor local photos into one or more colors
    Recolor {
        /// Input photos
        #[arg(required = true)]
        inputs: Vec<PathBuf>,

        /// Target color as "Name=#RRGGBB" or "#RRGGBB" (repeatable)
        #[arg(short, long = "color")]
        colors: Vec<ColorSpec>,

        /// Use every preset color from the configuration
        #[arg(long)]
        palette: bool,

        /// Output directory
        #[arg(short, long, default_value = "recolored")]
        output: PathBuf,

        /// Model tier: "standard" or "pro"
        #[arg(short, long, default_value = "standard", value_parser = parse_tier)]
        tier: Tier,

        /// Output size for the pro tier: 1K, 2K or 4K
        #[arg(short, long, default_value = "1K", value_parser = parse_size)]
        size: SizeClass,

        /// Extra instructions appended to every request
        #[arg(long)]
        instructions: Option<String>,
    },
    /// Print the color of one pixel of an image
    Sample {
        /// Image file
        file: PathBuf,

        /// Horizontal position in display coordinates
        #[arg(short)]
        x: f64,

        /// Vertical position in display coordinates
        #[arg(short)]
        y: f64,

        /// Width the image is displayed at (default: native width)
        #[arg(long)]
        display_width: Option<f64>,

        /// Height the image is displayed at (default: native height)
        #[arg(long)]
        display_height: Option<f64>,
    },
    /// List the preset colors from the configuration
    Palette,
}

fn parse_tier(s: &str) -> Result<Tier, String> {
    Tier::from_str(s).ok_or_else(|| format!("unknown tier '{s}' (expected standard or pro)"))
}

fn parse_size(s: &str) -> Result<SizeClass, String> {
    SizeClass::from_str(s).ok_or_else(|| format!("unknown size '{s}' (expected 1K, 2K or 4K)"))
}

/// OpenAPI documentation
#[derive(OpenApi)]
#[openapi(
    info(
        title = "Dyelab API",
        description = "Batch garment recoloring through a generative image service",
        version = "0.1.0",
        license(name = "MIT")
    ),
    paths(
        api::upload_image,
        api::list_images,
        api::clear_images,
        api::get_image,
        api::delete_image,
        api::get_source,
        api::get_result,
        api::set_active_result,
        api::sample_image,
        api::sample_reference,
        api::palette,
        api::start_batch,
        api::batch_status,
        api::events,
        api::generate,
    ),
    components(schemas(
        api::CreatedResponse,
        api::ClearResponse,
        api::ActiveResultRequest,
        api::SampleImageRequest,
        api::SampleResponse,
        api::StartBatchRequest,
        api::StartBatchResponse,
        dyelab::services::ImageSummary,
        dyelab::services::RunState,
        dyelab::models::ColorSpec,
        dyelab::models::GenerationSettings,
        dyelab::models::RecolorSettings,
        dyelab::models::ResultSummary,
    )),
    tags(
        (name = "Images", description = "Workspace images and results"),
        (name = "Sampling", description = "Color picking"),
        (name = "Batch", description = "Batch recoloring runs"),
        (name = "Generation", description = "Prompt-based image generation")
    )
)]
struct ApiDoc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Some(Commands::Serve) => run_server().await,
        Some(Commands::Recolor {
            inputs,
            colors,
            palette,
            output,
            tier,
            size,
            instructions,
        }) => {
            init_cli_logging();
            let settings = RecolorSettings {
                tier,
                size_class: size,
                instructions,
            };
            run_recolor_command(&inputs, colors, palette, &output, settings).await
        }
        Some(Commands::Sample {
            file,
            x,
            y,
            display_width,
            display_height,
        }) => {
            init_cli_logging();
            run_sample_command(&file, x, y, display_width, display_height)
        }
        Some(Commands::Palette) => {
            init_cli_logging();
            run_palette_command();
            Ok(())
        }
        None => {
            run_status_command();
            Ok(())
        }
    }
}

/// Minimal logging for one-shot commands
fn init_cli_logging() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "dyelab=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer().without_time())
        .init();
}

/// `CONFIG_FILE`, or `dyelab.yaml` in the working directory if present
fn config_path() -> Option<PathBuf> {
    match std::env::var("CONFIG_FILE") {
        Ok(path) => Some(PathBuf::from(path)),
        Err(_) => {
            let default = PathBuf::from(DEFAULT_CONFIG_FILE);
            default.exists().then_some(default)
        }
    }
}

fn load_config() -> AppConfig {
    AppConfig::load(config_path().as_deref())
}

/// Recolor local files and write every variant to `output`
async fn run_recolor_command(
    inputs: &[PathBuf],
    mut colors: Vec<ColorSpec>,
    use_palette: bool,
    output: &Path,
    settings: RecolorSettings,
) -> anyhow::Result<()> {
    let config = load_config();
    if use_palette {
        colors.extend(config.palette.iter().cloned());
    }
    let mut seen = std::collections::HashSet::new();
    colors.retain(|c| seen.insert(c.clone()));
    if colors.is_empty() {
        anyhow::bail!("no colors given (use --color or --palette)");
    }

    let workspace = Arc::new(Workspace::new());
    for path in inputs {
        let bytes =
            std::fs::read(path).with_context(|| format!("failed to read {}", path.display()))?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        workspace
            .add_image(name, bytes)
            .await
            .with_context(|| format!("{} is not a supported image", path.display()))?;
    }

    let client = GeminiClient::new(config.service.clone())?;
    let generator: Arc<dyn ImageGenerator> = Arc::new(client);
    let orchestrator =
        BatchOrchestrator::new(generator, RetryPolicy::from(config.retry), config.pacing);

    let reporter = tokio::spawn(report_progress(workspace.subscribe()));

    let request = BatchRequest {
        images: workspace.snapshot().await,
        colors,
        settings,
    };
    let sink: Arc<dyn BatchSink> = workspace.clone();
    let run = orchestrator.start(request, sink).await?;
    println!(
        "Recoloring {} image(s) into {} variant(s)...",
        inputs.len(),
        run.progress().total_items
    );
    let summary = run.run_to_completion().await;
    let _ = reporter.await;

    std::fs::create_dir_all(output)
        .with_context(|| format!("failed to create {}", output.display()))?;

    let mut written = 0;
    for image in workspace.list().await {
        let stem = Path::new(&image.name)
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| image.id.to_string());
        for result in &image.results {
            let Some(color) = &result.color else {
                continue;
            };
            let bytes = workspace.result_image(&image.id, result.index).await?;
            let file = output.join(format!("{stem}-{}.{}", color.slug(), bytes.extension()));
            std::fs::write(&file, bytes.bytes())
                .with_context(|| format!("failed to write {}", file.display()))?;
            written += 1;
        }
        if let Some(error) = &image.error {
            eprintln!("  {}: {error}", image.name);
        }
    }

    println!(
        "Done: {} succeeded, {} failed, {written} file(s) written to {}",
        summary.succeeded,
        summary.failed,
        output.display()
    );

    if summary.succeeded == 0 {
        anyhow::bail!("no variant could be produced");
    }
    Ok(())
}

/// Print retries, failures and progress until the run ends
async fn report_progress(mut events: tokio::sync::broadcast::Receiver<BatchEvent>) {
    use tokio::sync::broadcast::error::RecvError;

    loop {
        match events.recv().await {
            Ok(BatchEvent::Progress(p)) if p.completed_items > 0 => {
                println!("  [{}/{}]", p.completed_items, p.total_items);
            }
            Ok(BatchEvent::RetryScheduled {
                attempt,
                delay_ms,
                error,
                ..
            }) => {
                println!(
                    "  retry {attempt} in {:.1}s: {error}",
                    delay_ms as f64 / 1000.0
                );
            }
            Ok(BatchEvent::ItemFailed { color, error, .. }) => {
                println!("  {color} failed: {error}");
            }
            Ok(BatchEvent::RunFinished { .. }) | Err(RecvError::Closed) => break,
            Ok(_) | Err(RecvError::Lagged(_)) => {}
        }
    }
}

/// Print the hex color under a point of a local image
fn run_sample_command(
    file: &Path,
    x: f64,
    y: f64,
    display_width: Option<f64>,
    display_height: Option<f64>,
) -> anyhow::Result<()> {
    use swatch::{Point, Size};

    let bytes =
        std::fs::read(file).with_context(|| format!("failed to read {}", file.display()))?;
    let surface = decode_surface(&bytes)?;
    let display = Size::new(
        display_width.unwrap_or(surface.width() as f64),
        display_height.unwrap_or(surface.height() as f64),
    );
    let rgb = surface.sample(display, Point::new(x, y))?;
    println!("{rgb}");
    Ok(())
}

fn run_palette_command() {
    let config = load_config();
    for color in &config.palette {
        println!("{}  {}", color.hex(), color.name());
    }
}

/// Show version, environment and configuration
fn run_status_command() {
    const VERSION: &str = env!("CARGO_PKG_VERSION");

    let bind_addr = std::env::var("BIND_ADDR").ok();
    let config_file = std::env::var("CONFIG_FILE").ok();
    let api_key_set = std::env::var("GEMINI_API_KEY").is_ok_and(|k| !k.trim().is_empty());

    println!("Dyelab v{VERSION}");
    println!("Batch garment recoloring through a generative image service\n");

    println!("Environment Variables:");
    println!(
        "  BIND_ADDR      = {}",
        bind_addr.as_deref().unwrap_or("0.0.0.0:3000 (default)")
    );
    println!(
        "  CONFIG_FILE    = {}",
        config_file.as_deref().unwrap_or("(not set)")
    );
    println!(
        "  GEMINI_API_KEY = {}",
        if api_key_set { "(set)" } else { "(not set)" }
    );

    let source = match config_path() {
        Some(path) if path.exists() => path.display().to_string(),
        Some(path) => format!("{} (file not found, using defaults)", path.display()),
        None => "built-in defaults".to_string(),
    };
    let config = load_config();

    println!("\nConfiguration:");
    println!("  Source:         {source}");
    println!("  Service:        {}", config.service.base_url);
    println!("  Standard model: {}", config.service.standard_model);
    println!(
        "  Pro model:      {} ({})",
        config.service.pro_model,
        if config.service.pro_enabled { "enabled" } else { "disabled" }
    );
    println!(
        "  Retries:        {} after the first attempt, base delay {} ms",
        config.retry.max_attempts, config.retry.base_delay_ms
    );
    println!(
        "  Pacing:         {} ms standard, {} ms pro",
        config.pacing.standard_delay_ms, config.pacing.pro_delay_ms
    );
    println!("  Palette:        {} colors", config.palette.len());

    println!("\nCommands:");
    println!("  dyelab serve      Start the HTTP server");
    println!("  dyelab recolor    Recolor local photos");
    println!("  dyelab sample     Print the color of a pixel");
    println!("  dyelab palette    List preset colors");
    println!("  dyelab --help     Show all options");
}

/// Run the HTTP server
async fn run_server() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "dyelab=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let bind_addr = std::env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:3000".to_string());
    let config = load_config();

    tracing::info!(
        config = ?config_path().map(|p| p.display().to_string()).unwrap_or_else(|| "defaults".to_string()),
        service = %config.service.base_url,
        api_key = config.service.api_key.is_some(),
        pro_enabled = config.service.pro_enabled,
        "Configuration loaded"
    );
    if config.service.api_key.is_none() {
        tracing::warn!("No API key configured, batch runs are refused until GEMINI_API_KEY is set");
    }

    let state = server::create_app_state(config)?;

    let app = server::build_router(state)
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()));

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    tracing::info!(addr = %bind_addr, "Dyelab server listening");

    axum::serve(listener, app).await?;

    Ok(())
}
