//! brickbook CLI - build instruction-book layouts from model archives
//!
//! Reads a `.bbk.json` model archive (classified part files), then loads,
//! compiles, measures and lays out the main model.

use anyhow::{Context, Result};
use brickbook::{ApproximateMetrics, BookSettings, Instructions};
use brickbook_ir::ModelArchive;
use brickbook_render::{acquire_surface, RenderBackend, SoftwareRenderer};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "brickbook")]
#[command(about = "Build instruction-book layouts for brick models", long_about = None)]
struct Cli {
    /// Settings file (TOML)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// More logging (-v debug, -vv trace); RUST_LOG overrides
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show the structure of a model
    Info {
        /// Model archive (.bbk.json)
        archive: PathBuf,
        /// Model to load (default: the archive's main model)
        #[arg(short, long)]
        model: Option<String>,
    },
    /// Measure every part and step image, using or refreshing the dimension cache
    Measure {
        /// Model archive (.bbk.json)
        archive: PathBuf,
        /// Model to load (default: the archive's main model)
        #[arg(short, long)]
        model: Option<String>,
        /// Directory holding the dimension cache
        #[arg(long)]
        cache_dir: Option<PathBuf>,
    },
    /// Measure and lay out the book, printing a JSON report
    Layout {
        /// Model archive (.bbk.json)
        archive: PathBuf,
        /// Model to load (default: the archive's main model)
        #[arg(short, long)]
        model: Option<String>,
        /// Directory holding the dimension cache
        #[arg(long)]
        cache_dir: Option<PathBuf>,
        /// Also build the template page step
        #[arg(long)]
        template: bool,
        /// Write the report here instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Render one step's model image to PNG
    Render {
        /// Model archive (.bbk.json)
        archive: PathBuf,
        /// Output PNG file
        output: PathBuf,
        /// Model to load (default: the archive's main model)
        #[arg(short, long)]
        model: Option<String>,
        /// Step number (default: last step)
        #[arg(short, long)]
        step: Option<u32>,
        /// Square image size in pixels
        #[arg(long, default_value_t = 512)]
        size: u32,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let settings = match &cli.config {
        Some(path) => BookSettings::load(path)
            .with_context(|| format!("reading settings from {}", path.display()))?,
        None => BookSettings::default(),
    };

    match cli.command {
        Commands::Info { archive, model } => show_info(&archive, model, settings),
        Commands::Measure {
            archive,
            model,
            cache_dir,
        } => measure(&archive, model, settings, cache_dir.as_deref()),
        Commands::Layout {
            archive,
            model,
            cache_dir,
            template,
            output,
        } => layout(&archive, model, settings, cache_dir.as_deref(), template, output),
        Commands::Render {
            archive,
            output,
            model,
            step,
            size,
        } => render_step(&archive, model, settings, step, size, &output),
    }
}

fn init_logging(verbose: u8) {
    let default = match verbose {
        0 => "warn",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .without_time()
        .compact()
        .init();
}

fn load_book(archive: &Path, model: Option<String>, settings: BookSettings) -> Result<Instructions> {
    let json = std::fs::read_to_string(archive)
        .with_context(|| format!("reading {}", archive.display()))?;
    let archive = ModelArchive::from_json(&json)?;
    let model = match model {
        Some(model) => model,
        None if !archive.main.is_empty() => archive.main.clone(),
        None => anyhow::bail!("archive has no main model; pass --model"),
    };
    Ok(Instructions::load(&archive, &model, settings)?)
}

fn show_info(archive: &Path, model: Option<String>, settings: BookSettings) -> Result<()> {
    let book = load_book(archive, model, settings)?;
    let registry = book.registry();
    let root = book.model();

    println!("Model: {} ({})", root.name, root.filename);
    println!("  Definitions: {}", registry.len());
    println!(
        "  Primitives: {}",
        registry.iter().filter(|(_, d)| d.primitive).count()
    );
    println!("  Submodels: {}", registry.iter().filter(|(_, d)| d.has_steps()).count());
    println!("  Steps: {}", root.steps.len());

    for step in &root.steps {
        let listed: Vec<String> = step
            .pli
            .entries()
            .iter()
            .map(|e| format!("{}x {}", e.count, registry[e.part].filename))
            .collect();
        let buffers = if step.csi.buffers.is_empty() {
            String::new()
        } else {
            format!(" [{} buffer(s)]", step.csi.buffers.len())
        };
        println!(
            "  {}: {} placement(s){}{}{}",
            step.number,
            step.placements.len(),
            buffers,
            if listed.is_empty() { "" } else { " - " },
            listed.join(", ")
        );
    }

    print_diagnostics(&book);
    Ok(())
}

fn measure(
    archive: &Path,
    model: Option<String>,
    settings: BookSettings,
    cache_dir: Option<&Path>,
) -> Result<()> {
    let mut book = load_book(archive, model, settings)?;
    let mut renderer = SoftwareRenderer::new();
    book.compile(&mut renderer)?;
    let source = book.init_dimensions(&mut renderer, cache_dir)?;

    println!("Dimensions: {:?}", source);
    print!("{}", book.dimension_cache());
    print_diagnostics(&book);
    Ok(())
}

fn layout(
    archive: &Path,
    model: Option<String>,
    settings: BookSettings,
    cache_dir: Option<&Path>,
    template: bool,
    output: Option<PathBuf>,
) -> Result<()> {
    let mut book = load_book(archive, model, settings)?;
    let mut renderer = SoftwareRenderer::new();
    book.compile(&mut renderer)?;
    book.init_dimensions(&mut renderer, cache_dir)?;
    book.init_layout(&ApproximateMetrics);
    if template {
        book.build_template(&mut renderer, &ApproximateMetrics)?;
    }

    let json = book.report().to_json()?;
    match output {
        Some(path) => {
            std::fs::write(&path, json)?;
            println!("Wrote layout report to {}", path.display());
        }
        None => println!("{json}"),
    }
    Ok(())
}

fn render_step(
    archive: &Path,
    model: Option<String>,
    settings: BookSettings,
    step: Option<u32>,
    size: u32,
    output: &Path,
) -> Result<()> {
    let view = settings.measure.view();
    let mut book = load_book(archive, model, settings)?;
    let mut renderer = SoftwareRenderer::new();
    let definition_list = book.compile(&mut renderer)?;

    let steps = &book.model().steps;
    let list = match step {
        Some(number) => steps
            .iter()
            .find(|s| s.number == number)
            .and_then(|s| s.csi.cumulative_list())
            .with_context(|| format!("model has no step {number}"))?,
        None => steps
            .last()
            .and_then(|s| s.csi.cumulative_list())
            .unwrap_or(definition_list),
    };

    let pixels = {
        let mut surface = acquire_surface(&mut renderer, size, size)?;
        surface.capture(list, &view)?
    };
    let image = image::RgbaImage::from_raw(pixels.width(), pixels.height(), pixels.into_rgba())
        .context("pixel buffer size mismatch")?;
    image.save(output)?;
    println!(
        "Rendered {} to {} ({} lists compiled)",
        book.model().filename,
        output.display(),
        renderer.list_count()
    );
    Ok(())
}

fn print_diagnostics(book: &Instructions) {
    let diagnostics = book.diagnostics();
    if diagnostics.is_empty() {
        return;
    }
    println!("\nDiagnostics:");
    for diagnostic in diagnostics {
        println!("  {diagnostic}");
    }
}
