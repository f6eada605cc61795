//! Golden pattern tool
//!
//! Usage:
//!   hudcheck-pattern generate symbol.png 0 0 255 255 40 12 symbol.pattern
//!   hudcheck-pattern show symbol.pattern      # writes symbol.pattern.preview.png

use clap::{Parser, Subcommand};
use image::Rgba;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use hudcheck::pattern::GoldenPattern;

#[derive(Parser)]
#[command(name = "hudcheck-pattern")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Build and inspect sparse golden patterns", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Encode every pixel that differs from the background colour
    Generate {
        /// Source image
        image: PathBuf,
        /// Background colour
        r: u8,
        g: u8,
        b: u8,
        a: u8,
        /// Reference point in source image pixels
        #[arg(allow_negative_numbers = true)]
        rp_x: f64,
        #[arg(allow_negative_numbers = true)]
        rp_y: f64,
        /// Pattern file to write
        output: PathBuf,
    },

    /// Print a pattern's box, size and reference point and write a preview
    Show {
        pattern: PathBuf,
    },
}

fn generate(image: &Path, background: Rgba<u8>, reference_point: (f64, f64), output: &Path) -> Result<(), String> {
    let raster = image::open(image)
        .map_err(|e| format!("Failed to read {}: {}", image.display(), e))?
        .to_rgba8();
    let pattern = GoldenPattern::encode(&raster, background, reference_point).map_err(|e| e.to_string())?;
    pattern.save(output).map_err(|e| e.to_string())?;

    println!("Wrote {}", output.display());
    println!("  Pixels:    {}", pattern.data.len());
    print_geometry(&pattern);
    Ok(())
}

fn show(path: &Path) -> Result<(), String> {
    let pattern = GoldenPattern::load(path).map_err(|e| e.to_string())?;
    println!("{}", path.display());
    println!("  Pixels:    {}", pattern.data.len());
    print_geometry(&pattern);

    let mut preview = path.as_os_str().to_owned();
    preview.push(".preview.png");
    let preview = PathBuf::from(preview);
    pattern
        .decode()
        .save(&preview)
        .map_err(|e| format!("Failed to write {}: {}", preview.display(), e))?;
    println!("Preview: {}", preview.display());
    Ok(())
}

fn print_geometry(pattern: &GoldenPattern) {
    let (x0, y0, x1, y1) = pattern.bounds;
    println!("  Box:       ({}, {}) - ({}, {})", x0, y0, x1, y1);
    println!("  Size:      {}x{}", pattern.size.0, pattern.size.1);
    println!("  RP_Offset: ({}, {})", pattern.rp_offset.0, pattern.rp_offset.1);
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let result = match cli.command {
        Commands::Generate {
            image,
            r,
            g,
            b,
            a,
            rp_x,
            rp_y,
            output,
        } => generate(&image, Rgba([r, g, b, a]), (rp_x, rp_y), &output),
        Commands::Show { pattern } => show(&pattern),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("{}", e);
            ExitCode::FAILURE
        }
    }
}
