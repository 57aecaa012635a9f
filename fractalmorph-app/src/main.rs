mod animation;
mod console_observer;
mod error;

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::Parser;
use fractalmorph_core::serde_format;
use fractalmorph_core::FractalParameters;
use fractalmorph_render::FractalCanvas;
use tracing::{error, info};

use animation::{run_animation, AnimationConfig};
use console_observer::ConsoleObserver;
use error::AppError;

const DEFAULT_PARAMETER_FILE: &str = "default.efp";

#[derive(Parser, Debug)]
#[command(name = "fractalmorph", about = "A Mariani-Silver fractal rasterizer")]
struct Cli {
    /// Initial parameter file.
    #[arg(short = 'p', value_name = "FILE")]
    parameter_file: Option<PathBuf>,

    /// Override screen width.
    #[arg(long, value_name = "N")]
    width: Option<u32>,

    /// Override screen height.
    #[arg(long, value_name = "N")]
    height: Option<u32>,

    /// Override oversampling.
    #[arg(long, value_name = "N")]
    oversampling: Option<u32>,

    /// Render the initial parameters to an image and exit.
    #[arg(long, conflicts_with = "animation")]
    image: bool,

    /// Render an inflection-unfolding animation.
    #[arg(long, conflicts_with = "image")]
    animation: bool,

    /// Frames per second (integer).
    #[arg(long, value_name = "N", default_value_t = 60)]
    fps: u32,

    /// Seconds per inflection (float).
    #[arg(long, value_name = "SECS", default_value_t = 3.0)]
    spi: f64,

    /// Seconds per zoom (float).
    #[arg(long, value_name = "SECS", default_value_t = 0.666_666_666_666_6)]
    spz: f64,

    /// Output directory (trailing slash optional).
    #[arg(short = 'o', value_name = "DIR", default_value = ".")]
    output_dir: PathBuf,

    /// Keep interactive UI open after rendering. Accepted for
    /// command-line compatibility; this build has no interactive UI to
    /// keep open, so it is a no-op.
    #[arg(short = 'i')]
    interactive: bool,
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info,fractalmorph=info".into()))
        .init();

    let cli = Cli::parse();
    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<(), AppError> {
    let _ = cli.interactive; // documented no-op; no interactive UI to keep open

    let mut params = load_parameters(cli.parameter_file.as_deref())?;

    if let Some(w) = cli.width {
        params.resize(w, params.target_height)?;
    }
    if let Some(h) = cli.height {
        params.resize(params.target_width, h)?;
    }
    if let Some(o) = cli.oversampling {
        params.set_oversampling(o)?;
    }

    if cli.image {
        render_image(params, &cli.output_dir)
    } else if cli.animation {
        let config = AnimationConfig {
            fps: cli.fps,
            seconds_per_inflection: cli.spi,
            seconds_per_zoom: cli.spz,
            use_simd: true,
        };
        run_animation(params, &config, &cli.output_dir, &ConsoleObserver)
    } else {
        print_summary(&params);
        Ok(())
    }
}

fn load_parameters(path: Option<&Path>) -> Result<FractalParameters, AppError> {
    let (path, explicit) = match path {
        Some(p) => (p.to_path_buf(), true),
        None => (PathBuf::from(DEFAULT_PARAMETER_FILE), false),
    };

    let mut params = FractalParameters::new(800, 600)?;
    match std::fs::read_to_string(&path) {
        Ok(text) => {
            serde_format::apply_json(&mut params, &text)?;
            info!(path = %path.display(), "loaded parameter file");
        }
        Err(e) if !explicit && e.kind() == std::io::ErrorKind::NotFound => {
            info!(path = %path.display(), "no default parameter file found, using built-in defaults");
        }
        Err(source) => return Err(AppError::FileRead { path, source }),
    }
    Ok(params)
}

fn render_image(params: FractalParameters, output_dir: &Path) -> Result<(), AppError> {
    std::fs::create_dir_all(output_dir)
        .map_err(|source| AppError::CreateOutputDir { path: output_dir.to_path_buf(), source })?;

    let mut canvas = FractalCanvas::new(params, true)?;
    let result = canvas.enqueue_render(&ConsoleObserver)?;
    canvas.enqueue_bitmap_render(true, false, &ConsoleObserver);

    let p = canvas.params();
    let metadata = fractalmorph_render::ExportMetadata {
        formula_name: p.formula_meta().map(|m| m.name.to_string()).unwrap_or_default(),
        center_re: p.center.re.to_string(),
        center_im: p.center.im.to_string(),
        zoom_level: p.zoom_level.to_string(),
        max_iterations: p.max_iters,
        oversampling: p.oversampling,
        julia_c_re: p.julia.then(|| p.julia_seed.re.to_string()),
        julia_c_im: p.julia.then(|| p.julia_seed.im.to_string()),
    };
    let path = output_dir.join("render.png");
    fractalmorph_render::export_png(canvas.bitmap(), &path, &metadata)?;

    info!(
        path = %path.display(),
        guessed = result.guessed_pixel_count,
        calculated = result.calculated_pixel_count,
        elapsed_ms = result.elapsed.as_millis(),
        "rendered image"
    );
    Ok(())
}

fn print_summary(params: &FractalParameters) {
    let formula_name = params.formula_meta().map(|m| m.name).unwrap_or("unknown");
    println!("formula:        {formula_name}");
    println!("dimensions:     {}x{}", params.target_width, params.target_height);
    println!("oversampling:   {}", params.oversampling);
    println!("center:         {} + {}i", params.center.re, params.center.im);
    println!("zoom level:     {}", params.zoom_level);
    println!("max iterations: {}", params.max_iters);
    println!("julia mode:     {}", params.julia);
    println!("inflections:    {}", params.inflections.len());
}
