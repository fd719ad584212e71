use std::fs::File;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use log::info;
use simplelog::{Config, LevelFilter, WriteLogger};

use inkmarks::export::render_note;
use inkmarks::panic_handler;
use inkmarks::pipeline;
use inkmarks::settings;

#[derive(Parser, Debug)]
#[command(name = "inkmarks")]
#[command(version, about = "Recover tablet highlights and burn them back into the PDF", long_about = None)]
struct Cli {
    /// Log file path
    #[arg(long, global = true, default_value = "inkmarks.log")]
    log_file: PathBuf,

    /// Log at debug level
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Settings file to use instead of the per-user config.yaml
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Print highlights and stats as JSON
    Highlights {
        bundle: PathBuf,

        /// Page count reported by the device, if known
        #[arg(long)]
        pages: Option<usize>,
    },

    /// Write a copy of the PDF with highlights burned in
    Render { bundle: PathBuf, output: PathBuf },

    /// Print highlight positions as JSON records
    Positions {
        bundle: PathBuf,

        /// Use this PDF instead of the one inside the bundle
        #[arg(long)]
        pdf: Option<PathBuf>,

        /// Emit annotation API items for this parent item key
        #[arg(long)]
        parent: Option<String>,
    },

    /// Print a Markdown reading note
    Note {
        bundle: PathBuf,

        #[arg(short, long)]
        title: String,

        /// Page count reported by the device, if known
        #[arg(long)]
        pages: Option<usize>,
    },

    /// Print the number of pages in the bundle
    PageCount { bundle: PathBuf },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };
    let log_file = File::create(&cli.log_file)
        .with_context(|| format!("Failed to create log file {}", cli.log_file.display()))?;
    WriteLogger::init(level, Config::default(), log_file)?;
    panic_handler::initialize_panic_handler();

    match &cli.config {
        Some(path) => {
            if !settings::load_settings_from_path(path) {
                anyhow::bail!("Could not load settings from {}", path.display());
            }
        }
        None => settings::load_settings(),
    }
    let calibration = settings::get_calibration();
    let style = settings::get_highlight_style();

    info!("Running {:?}", cli.command);

    match cli.command {
        Commands::Highlights { bundle, pages } => {
            let (highlights, stats) = pipeline::analyze(&bundle, &calibration, pages);
            let output = serde_json::json!({
                "highlights": highlights,
                "stats": stats,
            });
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
        Commands::Render { bundle, output } => {
            let drawn = pipeline::render_annotated_pdf(&bundle, &output, &calibration, &style)
                .with_context(|| format!("Failed to render {}", bundle.display()))?;
            println!("{drawn} highlight(s) written to {}", output.display());
        }
        Commands::Positions {
            bundle,
            pdf,
            parent,
        } => {
            let pdf_bytes = pdf
                .as_ref()
                .map(|path| {
                    std::fs::read(path)
                        .with_context(|| format!("Failed to read {}", path.display()))
                })
                .transpose()?;
            let records =
                pipeline::extract_positions(&bundle, pdf_bytes.as_deref(), &calibration, &style)
                    .with_context(|| format!("Failed to locate highlights in {}", bundle.display()))?;
            let output = match parent {
                Some(parent) => serde_json::Value::Array(
                    records.iter().map(|r| r.annotation_item(&parent)).collect(),
                ),
                None => serde_json::to_value(&records)?,
            };
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
        Commands::Note {
            bundle,
            title,
            pages,
        } => {
            let (highlights, stats) = pipeline::analyze(&bundle, &calibration, pages);
            let today = chrono::Local::now().date_naive();
            print!("{}", render_note(&title, &highlights, &stats, today));
        }
        Commands::PageCount { bundle } => {
            println!("{}", pipeline::page_count(&bundle));
        }
    }

    Ok(())
}
