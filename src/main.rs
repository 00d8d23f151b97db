use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, ValueEnum};

use winchm_import::{run_import, ImportOptions, MarkdownConverter, RenderProfile};

#[derive(Parser)]
#[command(
    name = "winchm-import",
    about = "Import a WinCHM HTML export as a Markdown documentation tree",
    version
)]
struct Cli {
    /// WinCHM export root directory (the HTML tree)
    #[arg(long)]
    src: PathBuf,

    /// Output docs root
    #[arg(long, default_value = "docs")]
    out_docs: PathBuf,

    /// Output assets root
    #[arg(long, default_value = "assets")]
    assets: PathBuf,

    /// Postprocess output for a target renderer
    #[arg(long, default_value = "github")]
    target: Target,

    /// Delete both output roots before generating
    #[arg(long)]
    clean: bool,

    /// Converter executable (default: pandoc from PATH)
    #[arg(long)]
    pandoc: Option<String>,

    /// Per-document conversion timeout in seconds
    #[arg(long, default_value = "30")]
    timeout_secs: u64,

    /// Output format for the run report
    #[arg(long, default_value = "plain")]
    format: OutputFormat,
}

#[derive(Clone, Debug, ValueEnum)]
enum Target {
    Github,
    Raw,
}

#[derive(Clone, Debug, ValueEnum)]
enum OutputFormat {
    Plain,
    Json,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::init();

    let cli = Cli::parse();

    let mut converter = MarkdownConverter::new().with_timeout(cli.timeout_secs);
    if let Some(pandoc) = &cli.pandoc {
        converter = converter.with_program(pandoc);
    }

    let mut options = ImportOptions::new(&cli.src);
    options.docs_root = cli.out_docs.clone();
    options.assets_root = cli.assets.clone();
    options.profile = match cli.target {
        Target::Github => RenderProfile::Github,
        Target::Raw => RenderProfile::Raw,
    };
    options.clean = cli.clean;
    options.converter = converter;

    let report = run_import(&options)
        .await
        .with_context(|| format!("import from {} failed", cli.src.display()))?;

    match cli.format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        OutputFormat::Plain => {
            println!(
                "Converted: {} documents -> {}",
                report.converted,
                cli.out_docs.display()
            );
            println!(
                "Copied images: {} -> {}",
                report.assets_copied,
                cli.assets.display()
            );
            if !report.failures.is_empty() {
                eprintln!("Skipped {} document(s):", report.failures.len());
                for failure in &report.failures {
                    eprintln!("  {}: {}", failure.path, failure.reason);
                }
            }
            if !report.asset_warnings.is_empty() {
                eprintln!("Unresolved image references:");
                for warning in &report.asset_warnings {
                    eprintln!("  {}", warning);
                }
            }
        }
    }

    if !report.is_clean() {
        std::process::exit(1);
    }

    Ok(())
}
