//! Dataprep CLI - inspect, clean and featurize tabular files
//!
//! # Main Commands
//!
//! ```bash
//! dataprep serve                            # Start HTTP server (port 3000)
//! dataprep run people.csv recipe.json       # Apply a recipe, export the result
//! dataprep inspect people.csv               # Preview and statistics as JSON
//! ```
//!
//! # Reference Commands
//!
//! ```bash
//! dataprep operations                       # Show available operations
//! dataprep example-recipe                   # Show an example recipe
//! ```

use clap::{Args, Parser, Subcommand};
use dataprep::{
    example_recipe, operations_description, process_file, AppConfig, CorrelationMethod,
    FileFormat, LoadCache, LoadOptions, Recipe, Session,
};
use serde_json::json;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "dataprep")]
#[command(about = "Load, clean and featurize CSV/Parquet files with a reproducible pandas script", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

/// How to read the input file.
#[derive(Args)]
struct LoadArgs {
    /// The first row is data, not a header
    #[arg(long)]
    no_header: bool,

    /// Comma-separated column names
    #[arg(long, value_delimiter = ',')]
    names: Option<Vec<String>>,

    /// Text encoding (auto-detect if not specified)
    #[arg(long)]
    encoding: Option<String>,
}

impl LoadArgs {
    fn options(&self) -> LoadOptions {
        LoadOptions {
            header: !self.no_header,
            column_names: self.names.clone(),
            encoding: self.encoding.clone(),
            ..LoadOptions::default()
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Show preview, statistics and missing values of a file
    Inspect {
        /// Input CSV or Parquet file
        input: PathBuf,

        #[command(flatten)]
        load: LoadArgs,

        /// Number of leading rows in the preview
        #[arg(long, default_value = "10")]
        head: usize,

        /// Number of trailing rows in the preview
        #[arg(long, default_value = "0")]
        tail: usize,

        /// Also compute a correlation matrix (pearson or spearman)
        #[arg(long)]
        correlation: Option<CorrelationMethod>,
    },

    /// Apply a JSON recipe to a file
    Run {
        /// Input CSV or Parquet file
        input: PathBuf,

        /// Recipe JSON file
        recipe: PathBuf,

        #[command(flatten)]
        load: LoadArgs,

        /// Output file, format from its extension (default: CSV on stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Write the generated pandas script here (default: stderr)
        #[arg(long)]
        code: Option<PathBuf>,
    },

    /// Show available operations
    Operations,

    /// Show an example recipe
    ExampleRecipe,

    /// Start HTTP server
    Serve {
        /// Port to listen on (default: DATAPREP_PORT or 3000)
        #[arg(short, long)]
        port: Option<u16>,
    },
}

#[tokio::main]
async fn main() {
    // Load .env file (if present)
    dotenvy::dotenv().ok();

    let config = match AppConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("❌ Error: {}", e);
            std::process::exit(2);
        }
    };

    // Dropping the guard flushes the log file
    let log_guard = match dataprep::logging::init_logging(&config) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("❌ Error: {}", e);
            std::process::exit(2);
        }
    };

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Inspect {
            input,
            load,
            head,
            tail,
            correlation,
        } => cmd_inspect(&input, &load.options(), head, tail, correlation),

        Commands::Run {
            input,
            recipe,
            load,
            output,
            code,
        } => cmd_run(&input, &recipe, &load.options(), output.as_deref(), code.as_deref()),

        Commands::Operations => cmd_operations(),

        Commands::ExampleRecipe => cmd_example_recipe(),

        Commands::Serve { port } => {
            let config = AppConfig {
                port: port.unwrap_or(config.port),
                ..config
            };
            dataprep::server::start_server(&config).await
        }
    };

    if let Err(e) = result {
        eprintln!("❌ Error: {}", e);
        drop(log_guard);
        std::process::exit(1);
    }
}

fn load_session(input: &Path, options: &LoadOptions) -> Result<Session, Box<dyn std::error::Error>> {
    let bytes = fs::read(input)?;
    let file_name = input
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| input.display().to_string());

    let cache = LoadCache::new();
    let mut session = Session::new();
    session.load(&cache, &file_name, &bytes, options)?;
    Ok(session)
}

fn cmd_inspect(
    input: &Path,
    options: &LoadOptions,
    head: usize,
    tail: usize,
    correlation: Option<CorrelationMethod>,
) -> Result<(), Box<dyn std::error::Error>> {
    eprintln!("📄 Inspecting: {}", input.display());
    let session = load_session(input, options)?;

    let mut report = json!({
        "session": session.summary(),
        "preview": session.preview(head, tail)?.to_json(),
        "describe": session.describe()?.to_json(),
        "missing": session.missing_info()?.to_json(),
    });
    if let Some(method) = correlation {
        report["correlation"] = session.correlation(method)?.to_json();
    }

    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

fn cmd_run(
    input: &Path,
    recipe_path: &Path,
    options: &LoadOptions,
    output: Option<&Path>,
    code: Option<&Path>,
) -> Result<(), Box<dyn std::error::Error>> {
    let recipe = Recipe::from_file(recipe_path)?;
    eprintln!(
        "📄 Processing: {} with {} step(s)",
        input.display(),
        recipe.steps.len()
    );

    let (session, report) = process_file(input, options, &recipe)?;
    eprintln!(
        "⚙️  {}×{} → {}×{}",
        report.shape_before.0, report.shape_before.1, report.shape_after.0, report.shape_after.1
    );

    match output {
        Some(path) => {
            let format = FileFormat::from_file_name(&path.to_string_lossy())?;
            fs::write(path, session.export(format)?)?;
            eprintln!("💾 Output written to: {}", path.display());
        }
        None => {
            let bytes = session.export(FileFormat::Csv)?;
            print!("{}", String::from_utf8_lossy(&bytes).trim_start_matches('\u{feff}'));
        }
    }

    let script = session.generated_code();
    match code {
        Some(path) => {
            fs::write(path, &script)?;
            eprintln!("🐍 Script written to: {}", path.display());
        }
        None => eprint!("\n{}", script),
    }

    eprintln!("✨ Done!");
    Ok(())
}

fn cmd_operations() -> Result<(), Box<dyn std::error::Error>> {
    println!("{}", operations_description());
    Ok(())
}

fn cmd_example_recipe() -> Result<(), Box<dyn std::error::Error>> {
    println!("{}", example_recipe().to_json_pretty()?);
    Ok(())
}
