//! etlmap CLI - build load files from delimited input with mapping sets
//!
//! # Main Commands
//!
//! ```bash
//! etlmap transform input.csv --mapping accounts.yaml -o accounts.dat
//! etlmap transform input.csv --id customer-accounts-1a2b3c4d
//! etlmap mapping list                  # Manage stored mapping sets
//! ```
//!
//! # Authoring Commands
//!
//! ```bash
//! etlmap check accounts.yaml           # Schema validation + lint
//! etlmap preview input.csv --mapping accounts.yaml
//! etlmap eval "amount BETWEEN 1 AND 10" --row '{"amount": "5"}'
//! etlmap parse input.csv               # Just parse input to JSON
//! etlmap operators                     # Show the mapping language reference
//! etlmap example-mapping               # Show an example mapping set
//! ```

use clap::{Parser, Subcommand, ValueEnum};
use etlmap::logs::LOG_BROADCASTER;
use etlmap::registry::MappingRegistry;
use etlmap::transform::dsl::{parse_strict, read_document};
use etlmap::{
    example_mapping_set, evaluate, lint_mapping_set, load_validated, operators_description,
    parse_file_auto, preview_row, run_file, validate_mapping_document, BatchOptions, MappingSet,
    OutputLayout, Row, ValidationError,
};
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

type CliResult = Result<(), Box<dyn std::error::Error>>;

/// Progress line on stderr, suppressed by `--quiet`.
macro_rules! progress {
    ($($arg:tt)*) => {
        if !LOG_BROADCASTER.is_quiet() {
            eprintln!($($arg)*);
        }
    };
}

#[derive(Parser)]
#[command(name = "etlmap")]
#[command(about = "Build fixed-width and delimited load files from mapping sets", long_about = None)]
struct Cli {
    /// Mapping registry directory (default: $ETLMAP_MAPPINGS_DIR or .etlmap/mappings)
    #[arg(long, global = true)]
    registry: Option<PathBuf>,

    /// Only print command output, no progress
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum LayoutArg {
    Fixed,
    Delimited,
}

#[derive(Subcommand)]
enum Commands {
    /// Apply a mapping set to an input file
    Transform {
        /// Input file
        input: PathBuf,

        /// Mapping file (YAML or JSON)
        #[arg(short, long, conflicts_with = "id", required_unless_present = "id")]
        mapping: Option<PathBuf>,

        /// Stored mapping ID
        #[arg(long)]
        id: Option<String>,

        /// Output file (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Worker count (default: $ETLMAP_WORKERS or CPU count)
        #[arg(short, long)]
        workers: Option<usize>,

        /// Override the mapping's output layout
        #[arg(long, value_enum)]
        layout: Option<LayoutArg>,

        /// Output delimiter for the delimited layout
        #[arg(short, long)]
        delimiter: Option<String>,

        /// Skip schema validation, header checks and lint
        #[arg(long)]
        no_validate: bool,
    },

    /// Show per-field values for the first rows
    Preview {
        /// Input file
        input: PathBuf,

        /// Mapping file (YAML or JSON)
        #[arg(short, long)]
        mapping: PathBuf,

        /// Number of rows to show
        #[arg(short, long)]
        rows: Option<usize>,
    },

    /// Evaluate one expression against a JSON row
    Eval {
        /// Expression, e.g. "code IN ('A', 'B') && amount > 10"
        expr: String,

        /// Row as a JSON object
        #[arg(short, long, default_value = "{}")]
        row: String,
    },

    /// Validate a mapping file against the schema and lint it
    Check {
        /// Mapping file (YAML or JSON)
        mapping: PathBuf,
    },

    /// Parse an input file and output JSON
    Parse {
        /// Input file
        input: PathBuf,

        /// Output file (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Manage stored mapping sets
    Mapping {
        #[command(subcommand)]
        action: MappingAction,
    },

    /// Show transformation types, operators and expression grammar
    Operators,

    /// Show an example mapping set
    ExampleMapping {
        /// Print JSON instead of YAML
        #[arg(long)]
        json: bool,
    },
}

#[derive(Subcommand)]
enum MappingAction {
    /// List all stored mapping sets
    List,

    /// Validate and store a mapping file
    Import {
        /// Mapping file (YAML or JSON)
        file: PathBuf,
        /// Name for the stored mapping
        #[arg(short, long)]
        name: Option<String>,
    },

    /// Show a stored mapping set
    Show {
        id: String,
        /// Print JSON instead of YAML
        #[arg(long)]
        json: bool,
    },

    /// Delete a stored mapping set
    Delete { id: String },
}

#[tokio::main]
async fn main() {
    // Load .env file (if present)
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    LOG_BROADCASTER.set_quiet(cli.quiet);

    let registry_dir = cli.registry;
    let result = match cli.command {
        Commands::Transform { input, mapping, id, output, workers, layout, delimiter, no_validate } => {
            let options = batch_options(workers, layout, delimiter, no_validate);
            cmd_transform(&input, mapping.as_deref(), id.as_deref(), output.as_deref(), options, registry_dir).await
        }
        Commands::Preview { input, mapping, rows } => cmd_preview(&input, &mapping, rows),
        Commands::Eval { expr, row } => cmd_eval(&expr, &row),
        Commands::Check { mapping } => cmd_check(&mapping),
        Commands::Parse { input, output } => cmd_parse(&input, output.as_deref()),
        Commands::Mapping { action } => cmd_mapping(action, registry_dir),
        Commands::Operators => {
            println!("{}", operators_description());
            Ok(())
        }
        Commands::ExampleMapping { json } => cmd_example_mapping(json),
    };

    if let Err(e) = result {
        eprintln!("❌ Error: {}", e);
        std::process::exit(1);
    }
}

fn open_registry(dir: Option<PathBuf>) -> MappingRegistry {
    match dir {
        Some(dir) => MappingRegistry::with_dir(dir),
        None => MappingRegistry::from_env(),
    }
}

/// Environment defaults, then CLI flags
fn batch_options(
    workers: Option<usize>,
    layout: Option<LayoutArg>,
    delimiter: Option<String>,
    no_validate: bool,
) -> BatchOptions {
    let mut options = BatchOptions::from_env();
    if let Some(workers) = workers {
        options = options.with_workers(workers);
    }
    match (layout, delimiter) {
        (Some(LayoutArg::Fixed), _) => options = options.with_layout(OutputLayout::Fixed),
        (Some(LayoutArg::Delimited), d) | (None, d @ Some(_)) => {
            let delimiter = d.unwrap_or_else(|| "|".to_string());
            options = options.with_layout(OutputLayout::Delimited { delimiter });
        }
        (None, None) => {}
    }
    if no_validate {
        options = options.without_validation();
    }
    options
}

fn load_mapping(path: &Path, validate: bool) -> Result<MappingSet, Box<dyn std::error::Error>> {
    if validate {
        load_validated(path).map_err(|e| match e {
            ValidationError::SchemaError { errors } => errors.join("\n   ").into(),
            other => other.into(),
        })
    } else {
        Ok(MappingSet::from_path(path)?)
    }
}

async fn cmd_transform(
    input: &Path,
    mapping_path: Option<&Path>,
    id: Option<&str>,
    output: Option<&Path>,
    options: BatchOptions,
    registry_dir: Option<PathBuf>,
) -> CliResult {
    progress!("📄 Processing: {}", input.display());

    let set = match (mapping_path, id) {
        (Some(path), _) => {
            progress!("   Mapping: {}", path.display());
            load_mapping(path, options.validate)?
        }
        (None, Some(id)) => {
            let mut registry = open_registry(registry_dir);
            let set = registry.require(id)?.mapping.clone();
            registry.record_use(id)?;
            progress!("   Mapping: {} ({})", set.name, id);
            set
        }
        (None, None) => return Err("either --mapping or --id is required".into()),
    };

    let report = run_file(input, Arc::new(set), output, &options).await?;

    if output.is_none() {
        for line in &report.records {
            println!("{}", line);
        }
    }

    let empty: Vec<String> = report
        .empty_fields
        .iter()
        .map(|(field, count)| format!("{} ({})", field, count))
        .collect();
    if !empty.is_empty() {
        progress!("   Empty values: {}", empty.join(", "));
    }

    progress!("\n✨ Done! {}", report.summary());
    Ok(())
}

fn cmd_preview(input: &Path, mapping_path: &Path, rows: Option<usize>) -> CliResult {
    let set = load_mapping(mapping_path, true)?;
    let parsed = parse_file_auto(input)?;
    let limit = rows.unwrap_or(BatchOptions::from_env().preview_rows);

    let width = set.fields.iter().map(|f| f.target_field.chars().count()).max().unwrap_or(0);
    for (i, row) in parsed.rows.iter().take(limit).enumerate() {
        println!("Row {}:", i + 1);
        for (field, value) in preview_row(row, &set) {
            println!("  {:width$} = '{}'", field, value, width = width);
        }
        println!();
    }

    progress!("👀 Previewed {} of {} rows", limit.min(parsed.rows.len()), parsed.rows.len());
    Ok(())
}

fn cmd_eval(expr: &str, row_json: &str) -> CliResult {
    let value: Value = serde_json::from_str(row_json)?;
    let row = Row::from_json(&value).ok_or("--row must be a JSON object")?;

    if let Err(e) = parse_strict(expr) {
        eprintln!("⚠️  {} (evaluates to false)", e);
    }

    println!("{}", evaluate(expr, &row));
    Ok(())
}

fn cmd_check(path: &Path) -> CliResult {
    progress!("✔️  Checking: {}", path.display());

    let document = read_document(path)?;
    if let Err(e) = validate_mapping_document(&document) {
        if let ValidationError::SchemaError { errors } = &e {
            for err in errors.iter().take(10) {
                eprintln!("   ❌ {}", err);
            }
        }
        return Err(e.into());
    }
    progress!("   ✅ Schema valid");

    let set = MappingSet::from_value(&document)?;
    let findings = lint_mapping_set(&set);
    for finding in &findings {
        eprintln!("   ⚠️  {}", finding);
    }

    progress!(
        "\n📊 {}: {} fields, {} warning(s)",
        if set.name.is_empty() { "(unnamed)" } else { set.name.as_str() },
        set.fields.len(),
        findings.len()
    );
    Ok(())
}

fn cmd_parse(input: &Path, output: Option<&Path>) -> CliResult {
    progress!("📄 Parsing: {}", input.display());

    let result = parse_file_auto(input)?;
    progress!("   Encoding: {}", result.encoding);
    progress!("   Delimiter: '{}' (auto-detected)", format_delimiter(result.delimiter));
    progress!("   Columns: {}", result.headers.join(", "));
    progress!("✅ Parsed {} records", result.rows.len());

    let json = serde_json::to_string_pretty(&result.to_json())?;
    write_output(&json, output)
}

fn cmd_example_mapping(json: bool) -> CliResult {
    let set = example_mapping_set();
    let text = if json { set.to_json()? } else { set.to_yaml()? };
    println!("{}", text);
    Ok(())
}

fn format_delimiter(d: char) -> String {
    match d {
        '\t' => "\\t".to_string(),
        c => c.to_string(),
    }
}

fn write_output(content: &str, path: Option<&Path>) -> CliResult {
    match path {
        Some(p) => {
            fs::write(p, content)?;
            progress!("💾 Output written to: {}", p.display());
        }
        None => println!("{}", content),
    }
    Ok(())
}

fn cmd_mapping(action: MappingAction, registry_dir: Option<PathBuf>) -> CliResult {
    let mut registry = open_registry(registry_dir);

    match action {
        MappingAction::List => {
            let mappings = registry.list();
            if mappings.is_empty() {
                progress!("📋 No mappings stored in {}.", registry.dir().display());
                progress!("   Use 'etlmap mapping import <file>' to add one.");
                return Ok(());
            }

            progress!("📋 Stored mappings ({}):\n", mappings.len());
            for m in mappings {
                println!("  📄 {} ({})", m.name, m.id);
                if let Some(tx) = &m.transaction_type {
                    println!("     Transaction type: {}", tx);
                }
                println!("     Fields: {}", m.mapping.fields.len());
                println!("     Columns: {}", m.source_columns.join(", "));
                println!("     Uses: {}", m.use_count);
                if let Some(last) = &m.last_used {
                    println!("     Last used: {}", last);
                }
                println!();
            }
        }

        MappingAction::Import { file, name } => {
            progress!("📥 Importing mapping from: {}", file.display());
            let id = registry.import(&file, name.as_deref())?;
            progress!("✅ Mapping saved with ID: {}", id);
        }

        MappingAction::Show { id, json } => {
            let m = registry.require(&id)?;
            println!("📄 Mapping: {} ({})\n", m.name, m.id);
            println!("Created: {}", m.created_at);
            println!("Uses: {}", m.use_count);
            println!("Columns: {}\n", m.source_columns.join(", "));
            let text = if json { m.mapping.to_json()? } else { m.mapping.to_yaml()? };
            println!("{}", text);
        }

        MappingAction::Delete { id } => {
            registry.delete(&id)?;
            progress!("🗑️  Mapping deleted: {}", id);
        }
    }

    Ok(())
}
