use std::path::{Path, PathBuf};
use std::process;

use clap::{Parser, ValueEnum};
use tracing_subscriber::EnvFilter;

use overlay_watermark_removal::smoothing::{SmoothMode, SmoothParams};
use overlay_watermark_removal::{
    default_output_path, ProcessOptions, ProcessResult, RegionPreset, Strategy, WatermarkEngine,
};

#[derive(Clone, Copy, ValueEnum)]
enum PresetArg {
    /// Badge in the top-left corner
    TopLeft,
    /// Corner anchored bottom-right (see --corner-fraction)
    BottomRight,
}

#[derive(Clone, Copy, ValueEnum)]
enum StrategyArg {
    /// Smoothing + feathering, falling back to content-aware and flat fill
    Ladder,
    /// Tile the strip left of the region, falling back to content-aware and flat fill
    Strip,
}

#[derive(Parser)]
#[command(
    name = "overlay-watermark",
    about = "Score and remove corner overlay-text watermarks",
    version,
    after_help = "Simple usage: overlay-watermark <image>  (auto-detect and remove, writes {name}_cleaned.{ext})\n\n\
                  NOTE: Only the candidate corner region is processed; the watermark\n\
                  is not searched for elsewhere in the image."
)]
#[allow(clippy::struct_excessive_bools)]
struct Cli {
    /// Input image file or directory
    input: String,

    /// Output file or directory (default: {name}_cleaned.{ext})
    #[arg(short, long)]
    output: Option<String>,

    /// Skip watermark detection, process unconditionally
    #[arg(short, long)]
    force: bool,

    /// Detection confidence threshold (0.0-1.0)
    #[arg(short, long, default_value = "0.25")]
    threshold: f32,

    /// Candidate region preset
    #[arg(long, value_enum, default_value = "top-left")]
    preset: PresetArg,

    /// Share of each dimension covered by the bottom-right preset
    #[arg(long, default_value = "0.15")]
    corner_fraction: f32,

    /// Removal strategy
    #[arg(long, value_enum, default_value = "ladder")]
    strategy: StrategyArg,

    /// Enhanced smoothing iterations
    #[arg(long, default_value_t = SmoothParams::ENHANCED.iterations)]
    iterations: u32,

    /// Enhanced smoothing kernel size (odd)
    #[arg(long, default_value_t = SmoothParams::ENHANCED.kernel_size)]
    kernel: u32,

    /// Seed for the randomized feathering (reproducible output)
    #[arg(long)]
    seed: Option<u64>,

    /// Fall back when smoothing does not halve the text-like pixel ratio
    #[arg(long)]
    verify: bool,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Suppress all non-error output
    #[arg(short, long)]
    quiet: bool,
}

fn init_tracing(cli: &Cli) {
    let default_level = if cli.verbose {
        "debug"
    } else if cli.quiet {
        "error"
    } else {
        "warn"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .without_time()
        .init();
}

fn main() {
    let cli = Cli::parse();
    init_tracing(&cli);

    if !(0.0..=1.0).contains(&cli.threshold) {
        eprintln!("Error: Threshold must be between 0.0 and 1.0");
        process::exit(1);
    }

    if !(cli.corner_fraction > 0.0 && cli.corner_fraction <= 1.0) {
        eprintln!("Error: Corner fraction must be in (0.0, 1.0]");
        process::exit(1);
    }

    let enhanced = SmoothParams {
        iterations: cli.iterations,
        kernel_size: cli.kernel,
        mode: SmoothMode::Enhanced,
    };
    if let Err(e) = enhanced.validate() {
        eprintln!("Error: {e}");
        process::exit(1);
    }

    let opts = ProcessOptions {
        force: cli.force,
        threshold: cli.threshold,
        preset: match cli.preset {
            PresetArg::TopLeft => RegionPreset::TopLeftBadge,
            PresetArg::BottomRight => RegionPreset::BottomRightCorner {
                fraction: cli.corner_fraction,
            },
        },
        strategy: match cli.strategy {
            StrategyArg::Ladder => Strategy::Ladder,
            StrategyArg::Strip => Strategy::StripFill,
        },
        enhanced,
        seed: cli.seed,
        verify: cli.verify,
        verbose: cli.verbose,
        quiet: cli.quiet,
        ..ProcessOptions::default()
    };

    let input_path = Path::new(&cli.input);
    if !input_path.exists() {
        eprintln!("Error: Input path does not exist: {}", cli.input);
        process::exit(1);
    }

    if !opts.quiet {
        if opts.force {
            eprintln!("WARNING: Force mode - processing ALL images without detection!");
        } else {
            eprintln!(
                "Auto-detection enabled (threshold: {:.0}%)",
                opts.threshold * 100.0
            );
        }
        eprintln!();
    }

    let engine = WatermarkEngine::new(opts);

    let results = if input_path.is_dir() {
        let output_dir = if let Some(o) = &cli.output {
            PathBuf::from(o)
        } else {
            eprintln!("Error: Output directory is required for batch processing");
            eprintln!("Usage: overlay-watermark <input_dir> -o <output_dir>");
            process::exit(1);
        };
        engine.process_directory(input_path, &output_dir)
    } else {
        let output_path = match &cli.output {
            Some(o) => PathBuf::from(o),
            None => default_output_path(input_path),
        };
        vec![engine.process_file(input_path, &output_path)]
    };

    let opts = engine.options();
    let mut success_count = 0u32;
    let mut skip_count = 0u32;
    let mut fail_count = 0u32;

    for r in &results {
        print_result(r, opts);
        if r.skipped {
            skip_count += 1;
        } else if r.success {
            success_count += 1;
        } else {
            fail_count += 1;
        }
    }

    if results.len() > 1 && !opts.quiet {
        eprintln!();
        eprint!("[Summary] Processed: {success_count}");
        if skip_count > 0 {
            eprint!(", Skipped: {skip_count}");
        }
        if fail_count > 0 {
            eprint!(", Failed: {fail_count}");
        }
        eprintln!(" (Total: {})", results.len());
    }

    if fail_count > 0 {
        process::exit(1);
    }
}

fn print_result(result: &ProcessResult, opts: &ProcessOptions) {
    if opts.quiet && result.success {
        return;
    }

    let filename = result.path.file_name().map_or_else(
        || result.path.display().to_string(),
        |f| f.to_string_lossy().to_string(),
    );

    if result.skipped {
        if !opts.quiet {
            eprintln!("[SKIP] {filename}: {}", result.message);
        }
    } else if result.success {
        if !opts.quiet {
            match result.stage {
                Some(stage) if result.confidence > 0.0 => eprintln!(
                    "[OK] {filename} ({stage}, {:.0}% confidence)",
                    result.confidence * 100.0
                ),
                Some(stage) => eprintln!("[OK] {filename} ({stage})"),
                None => eprintln!("[OK] {filename}"),
            }
        }
    } else {
        eprintln!("[FAIL] {filename}: {}", result.message);
    }

    if opts.verbose && !result.message.is_empty() {
        eprintln!("  -> {}", result.message);
    }
}
