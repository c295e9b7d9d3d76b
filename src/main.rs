use clap::{Parser, Subcommand, ValueEnum};
use dataset_prep::config::{self, BackgroundMode, Operation, Overrides};
use dataset_prep::imaging::FitMode;
use dataset_prep::source::{InputSource, OutputTarget};
use dataset_prep::{output, process, scan};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "dataset-prep")]
#[command(about = "Batch pre-processor for image datasets")]
#[command(long_about = "\
Batch pre-processor for image datasets

Removes backgrounds, squares subjects, adjusts brightness and resizes every
supported image (jpg, jpeg, png, webp, bmp, tiff) under an input, writing a
mirrored tree to a folder or ZIP.

Inputs:
  ./photos                         # Directory, scanned recursively
  ./photos.zip                     # ZIP archive, extracted to a temp dir
  https://drive.google.com/file/d/<id>/view
                                   # Shared link to a ZIP, downloaded first

Operations:
  background   isolate subject -> pad -> square -> composite
  resize       resize to --width x --height
  brightness   scale brightness by --brightness
  all          background -> brightness -> resize (resize off when squaring)

Transparent results are written as PNG. Failed files are reported and
skipped; the run continues.

Run 'dataset-prep gen-config' to generate a documented prep.toml.")]
#[command(version)]
struct Cli {
    /// Log diagnostics to stderr (RUST_LOG overrides)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Process every image under the input
    Run(RunArgs),
    /// List the images an input would process
    Scan {
        /// Directory, .zip file, or http(s) URL
        #[arg(long, short)]
        input: String,
    },
    /// Print a stock prep.toml with all options documented
    GenConfig,
}

#[derive(clap::Args)]
struct RunArgs {
    /// Directory, .zip file, or http(s) URL
    #[arg(long, short)]
    input: String,

    /// Output directory, or a path ending in .zip
    #[arg(long, short)]
    output: PathBuf,

    /// Config file (defaults apply when omitted)
    #[arg(long, short)]
    config: Option<PathBuf>,

    #[arg(long, value_enum)]
    operation: Option<OperationArg>,

    /// Fill for removed background and letterbox bars
    #[arg(long, value_enum)]
    background: Option<BackgroundArg>,

    /// Custom background color (#rgb or #rrggbb); implies `--background custom`
    #[arg(long)]
    color: Option<String>,

    /// Custom background opacity in percent
    #[arg(long)]
    opacity: Option<u8>,

    /// Transparent margin in pixels around the subject
    #[arg(long)]
    padding: Option<u32>,

    /// Center the subject on a square canvas
    #[arg(long, conflicts_with = "no_square")]
    square: bool,

    /// Turn off a square canvas enabled in the config file
    #[arg(long)]
    no_square: bool,

    /// Fixed square side in pixels (default: longer side)
    #[arg(long)]
    square_size: Option<u32>,

    /// Enlarge subjects smaller than --square-size
    #[arg(long)]
    allow_upscale: bool,

    /// Brightness factor (0.2-2.5)
    #[arg(long)]
    brightness: Option<f32>,

    #[arg(long)]
    width: Option<u32>,

    #[arg(long)]
    height: Option<u32>,

    #[arg(long, value_enum)]
    fit: Option<FitArg>,

    /// Skip the final resize of the `all` operation
    #[arg(long)]
    no_resize: bool,

    /// Parallel workers (0 = one per CPU core)
    #[arg(long, short)]
    jobs: Option<usize>,

    /// Write a JSON run report to this file
    #[arg(long)]
    report: Option<PathBuf>,
}

#[derive(Clone, Copy, ValueEnum)]
enum OperationArg {
    Background,
    Resize,
    Brightness,
    All,
}

#[derive(Clone, Copy, ValueEnum)]
enum BackgroundArg {
    Transparent,
    White,
    Custom,
}

#[derive(Clone, Copy, ValueEnum)]
enum FitArg {
    Stretch,
    Pad,
    Crop,
}

impl RunArgs {
    fn overrides(&self) -> Overrides {
        Overrides {
            operation: self.operation.map(|op| match op {
                OperationArg::Background => Operation::Background,
                OperationArg::Resize => Operation::Resize,
                OperationArg::Brightness => Operation::Brightness,
                OperationArg::All => Operation::All,
            }),
            background_mode: self.background.map(|bg| match bg {
                BackgroundArg::Transparent => BackgroundMode::Transparent,
                BackgroundArg::White => BackgroundMode::White,
                BackgroundArg::Custom => BackgroundMode::Custom,
            }),
            color: self.color.clone(),
            opacity: self.opacity,
            padding: self.padding,
            square: if self.square {
                Some(true)
            } else {
                self.no_square.then_some(false)
            },
            square_size: self.square_size,
            allow_upscale: self.allow_upscale.then_some(true),
            brightness: self.brightness,
            width: self.width,
            height: self.height,
            fit: self.fit.map(|fit| match fit {
                FitArg::Stretch => FitMode::Stretch,
                FitArg::Pad => FitMode::Pad,
                FitArg::Crop => FitMode::Crop,
            }),
            resize_enabled: self.no_resize.then_some(false),
            jobs: self.jobs,
        }
    }
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "dataset_prep=debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Command::Run(args) => {
            let overrides = args.overrides().to_toml()?;
            let config = config::load_config(args.config.as_deref(), Some(overrides))?;
            let input = InputSource::parse(&args.input)?;
            let target = OutputTarget::parse(&args.output);

            let (tx, rx) = std::sync::mpsc::channel();
            let printer = std::thread::spawn(move || {
                for event in rx {
                    for line in output::format_process_event(&event) {
                        println!("{}", line);
                    }
                }
            });
            let result = process::run_job(&input, &target, &config, Some(tx));
            printer
                .join()
                .map_err(|_| "progress printer thread panicked")?;
            let report = result?;

            output::print_summary(&report);
            if let Some(path) = &args.report {
                std::fs::write(path, serde_json::to_string_pretty(&report)?)?;
                println!("Report: {}", path.display());
            }
            if report.succeeded == 0 {
                return Err("every file failed".into());
            }
        }
        Command::Scan { input } => {
            let resolved = InputSource::parse(&input)?.resolve()?;
            let result = scan::scan(resolved.root())?;
            output::print_scan_output(&result);
        }
        Command::GenConfig => {
            print!("{}", config::stock_config_toml());
        }
    }

    Ok(())
}
