//! Shopsight CLI - compute dashboard insights from marketplace CSV exports
//!
//! # Commands
//!
//! ```bash
//! shopsight run                      # Run every analysis, report JSON on stdout
//! shopsight run --data-dir exports   # Read exports from another directory
//! shopsight parse orders.csv         # Debug: parse one CSV file to JSON records
//! ```

use clap::{Parser, Subcommand};
use shopsight::config::{DATA_DIR_VAR, TOP_N_VAR};
use shopsight::{
    parse_file_auto, Config, InsightPipeline, PipelineError, PipelineResult, TableCache,
};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "shopsight")]
#[command(about = "Compute e-commerce insights from marketplace CSV exports", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run every analysis and print the report as JSON
    Run {
        /// Directory holding the dataset exports (default: SHOPSIGHT_DATA_DIR or ./data)
        #[arg(short, long)]
        data_dir: Option<String>,

        /// Length of top-N rankings (default: SHOPSIGHT_TOP_N or 10)
        #[arg(long)]
        top_n: Option<String>,

        /// Output file (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Parse a CSV file and output JSON records
    Parse {
        /// Input CSV file
        input: PathBuf,

        /// Output file (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

fn main() {
    // Load .env file (if present)
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    let result: Result<(), Box<dyn std::error::Error>> = match cli.command {
        Commands::Run {
            data_dir,
            top_n,
            output,
        } => cmd_run(data_dir, top_n, output.as_deref()).map_err(Into::into),

        Commands::Parse { input, output } => cmd_parse(&input, output.as_deref()),
    };

    if let Err(e) = result {
        eprintln!("❌ Error: {}", e);
        std::process::exit(1);
    }
}

fn cmd_run(
    data_dir: Option<String>,
    top_n: Option<String>,
    output: Option<&Path>,
) -> PipelineResult<()> {
    let overrides: Vec<(&str, String)> = [(DATA_DIR_VAR, data_dir), (TOP_N_VAR, top_n)]
        .into_iter()
        .filter_map(|(key, value)| Some((key, value?)))
        .collect();
    let config = Config::from_env_with(&overrides)?;

    eprintln!("📂 Data directory: {}", config.data_dir.display());

    let cache = Arc::new(TableCache::with_dir(&config.data_dir));
    let report = InsightPipeline::new(cache, config).run_all();

    let json = serde_json::to_string_pretty(&report)?;
    write_output(&json, output)?;

    let failed = report.failed_sections();
    if failed.is_empty() {
        eprintln!("✅ Report {} complete", report.report_id);
        return Ok(());
    }

    for (name, error) in &failed {
        eprintln!("   ⚠️ {}: {}", name, error);
    }
    Err(PipelineError::AnalysesFailed(
        failed.into_iter().map(|(name, _)| name.to_string()).collect(),
    ))
}

fn cmd_parse(input: &Path, output: Option<&Path>) -> Result<(), Box<dyn std::error::Error>> {
    eprintln!("📄 Parsing CSV: {}", input.display());

    let result = parse_file_auto(input)?;

    eprintln!("   Encoding: {}", result.encoding);
    eprintln!(
        "   Delimiter: '{}'",
        match result.delimiter {
            '\t' => "\\t".to_string(),
            c => c.to_string(),
        }
    );
    eprintln!("   Columns: {}", result.headers.join(", "));

    let name = input
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_default();
    let table = result.into_table(name)?;
    eprintln!("✅ Parsed {} rows", table.len());

    let json = serde_json::to_string_pretty(&table.to_records())?;
    write_output(&json, output)?;

    Ok(())
}

fn write_output(content: &str, path: Option<&Path>) -> std::io::Result<()> {
    match path {
        Some(p) => {
            fs::write(p, content)?;
            eprintln!("💾 Output written to: {}", p.display());
        }
        None => {
            println!("{}", content);
        }
    }
    Ok(())
}
