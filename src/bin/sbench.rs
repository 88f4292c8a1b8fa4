//! sbench - Summarized Benchmark CLI
//!
//! Command-line interface for building and evaluating benchmark designs.

use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use summarized_bench::build::{build, BuildConfig, DEFAULT_ASSAY};
use summarized_bench::data::{Dataset, Table, Value};
use summarized_bench::design::{Arg, BenchDesign, DesignConfig, MethodCatalog, MethodFn, MethodSpec};
use summarized_bench::error::{BenchError, Result};
use summarized_bench::metric::{
    add_all_default_metrics, available_metrics, evaluate, EvalOptions, EvaluationConfig,
    ParamGrid,
};
use summarized_bench::result::BenchmarkResult;
use tracing_subscriber::EnvFilter;

/// Summarized benchmarks of analysis methods
#[derive(Parser)]
#[command(name = "sbench")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build a design from a YAML file and write the result
    Run {
        /// Path to design YAML
        #[arg(short, long)]
        design: PathBuf,

        /// Path to dataset TSV (first column: test-case ids)
        #[arg(short = 'i', long)]
        data: PathBuf,

        /// Path to build configuration YAML
        #[arg(short, long)]
        build: Option<PathBuf>,

        /// Path to evaluation configuration YAML; enables default metrics
        #[arg(short, long)]
        eval: Option<PathBuf>,

        /// Run methods in parallel (overrides the build configuration)
        #[arg(long)]
        parallel: bool,

        /// Worker threads for parallel runs
        #[arg(long)]
        threads: Option<usize>,

        /// Output directory
        #[arg(short, long)]
        output: PathBuf,
    },

    /// Evaluate default metrics on a precomputed method-by-column matrix
    Evaluate {
        /// Path to assay TSV (rows: test cases, columns: methods)
        #[arg(short, long)]
        assay: PathBuf,

        /// Path to ground truth TSV with the same row ids
        #[arg(short, long)]
        truth: PathBuf,

        /// Ground truth column
        #[arg(short, long)]
        column: String,

        /// Thresholds to evaluate (comma-separated)
        #[arg(long, value_delimiter = ',')]
        alpha: Vec<f64>,

        /// Long output format
        #[arg(long)]
        tidy: bool,

        /// Output path for the performance TSV (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// List the built-in metrics
    Metrics {
        /// Output format: text, json, or yaml
        #[arg(short, long, default_value = "text")]
        format: String,
    },
}

fn main() {
    init_logging();
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Run {
            design,
            data,
            build,
            eval,
            parallel,
            threads,
            output,
        } => cmd_run(
            &design,
            &data,
            build.as_deref(),
            eval.as_deref(),
            parallel,
            threads,
            &output,
        ),

        Commands::Evaluate {
            assay,
            truth,
            column,
            alpha,
            tidy,
            output,
        } => cmd_evaluate(&assay, &truth, &column, &alpha, tidy, output.as_deref()),

        Commands::Metrics { format } => cmd_metrics(&format),
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .compact()
        .init();
}

/// Callables available to design files.
fn builtin_catalog() -> MethodCatalog {
    let mut catalog = MethodCatalog::new();
    catalog
        .register_method(MethodFn::new("identity", |args| Ok(args.require("x")?.clone())))
        .register_method(MethodFn::new("scale", |args| {
            let x = args.numeric("x")?;
            let factor = args.number_or("factor", 1.0)?;
            Ok(Value::Numeric(x.iter().map(|v| v * factor).collect()))
        }))
        .register_method(MethodFn::new("complement", |args| {
            let x = args.numeric("x")?;
            Ok(Value::Numeric(x.iter().map(|v| 1.0 - v).collect()))
        }));
    catalog
}

/// Build a design from configuration
fn cmd_run(
    design_path: &Path,
    data_path: &Path,
    build_path: Option<&Path>,
    eval_path: Option<&Path>,
    parallel: bool,
    threads: Option<usize>,
    output_dir: &Path,
) -> Result<()> {
    eprintln!("Loading design from {:?}...", design_path);
    let design_config = DesignConfig::from_yaml(&std::fs::read_to_string(design_path)?)?;

    let mut build_config = match build_path {
        Some(path) => BuildConfig::from_yaml(&std::fs::read_to_string(path)?)?,
        None => BuildConfig::new(),
    };
    if parallel {
        build_config.parallel = true;
    }
    if let Some(n) = threads {
        build_config.threads = Some(n);
    }

    let name = design_config.name.clone();
    let dataset = Dataset::from_tsv(data_path)?;
    let design = design_config.into_design(dataset, &builtin_catalog())?;
    eprintln!("Design '{}' has {} methods", name, design.len());
    for summary in design.list_methods() {
        eprintln!("  {}", summary);
    }

    let mut result = build(&design, &build_config)?;

    if let Some(path) = eval_path {
        let eval_config = EvaluationConfig::from_yaml(&std::fs::read_to_string(path)?)?;
        let assays: Vec<String> = result.assay_names().iter().map(|s| s.to_string()).collect();
        for assay in &assays {
            add_all_default_metrics(&mut result, assay)?;
        }
        let evaluation = evaluate(&mut result, &eval_config.grid, &eval_config.options())?;
        if let Some(table) = evaluation.to_table()? {
            std::fs::create_dir_all(output_dir)?;
            let path = output_dir.join("performance.tsv");
            table.to_tsv(&path, "row")?;
            eprintln!("Wrote performance table to {:?}", path);
        }
    }

    result.write_tsv_dir(output_dir)?;
    print_failures(&result);
    eprintln!("Done! {} methods x {} test cases", result.n_methods(), result.n_rows());
    Ok(())
}

fn print_failures(result: &BenchmarkResult) {
    let meta = result.method_metadata();
    for (i, label) in result.method_labels().iter().enumerate() {
        if let Some(Value::Text(note)) = meta.get(i, "error") {
            eprintln!("  method '{}' failed: {}", label, note);
        }
    }
}

/// Evaluate default metrics on an existing assay matrix
fn cmd_evaluate(
    assay_path: &Path,
    truth_path: &Path,
    column: &str,
    alpha: &[f64],
    tidy: bool,
    output: Option<&Path>,
) -> Result<()> {
    let assay = Table::from_tsv(assay_path)?;
    let truth = Table::from_tsv(truth_path)?;
    let truth_cells = truth
        .column(column)
        .ok_or_else(|| BenchError::NotFound(format!("truth column '{}'", column)))?;
    if assay.has_column(column) {
        return Err(BenchError::Configuration(format!(
            "assay already has a column named '{}'",
            column
        )));
    }

    let mut data = assay.clone();
    let mut truth_only = Table::new(truth.row_ids().to_vec());
    truth_only.set_column(column, truth_cells.to_vec())?;
    data.hcat(&truth_only)?;

    let identity = MethodFn::new("identity", |args| Ok(args.require("x")?.clone()));
    let mut design = BenchDesign::new(data);
    for name in assay.column_names() {
        design.add_method(MethodSpec::new(name, identity.clone()).arg("x", Arg::field(name)))?;
    }

    let mut result = build(&design, &BuildConfig::new().truth_column(column))?;
    add_all_default_metrics(&mut result, DEFAULT_ASSAY)?;

    let grid = if alpha.is_empty() {
        ParamGrid::new()
    } else {
        ParamGrid::new().with("alpha", alpha.to_vec())
    };
    let evaluation = evaluate(&mut result, &grid, &EvalOptions::new().tidy(tidy))?;

    let table = match evaluation.to_table()? {
        Some(table) => table,
        None => return Ok(()),
    };
    match output {
        Some(path) => {
            table.to_tsv(path, "row")?;
            eprintln!("Wrote performance table to {:?}", path);
        }
        None => print_table(&table),
    }
    Ok(())
}

fn print_table(table: &Table) {
    println!("row\t{}", table.column_names().join("\t"));
    for (i, id) in table.row_ids().iter().enumerate() {
        let cells: Vec<String> = table
            .row(i)
            .unwrap_or_default()
            .into_iter()
            .map(|(_, v)| v.to_string())
            .collect();
        println!("{}\t{}", id, cells.join("\t"));
    }
}

/// List built-in metrics
fn cmd_metrics(format: &str) -> Result<()> {
    match format {
        "json" => {
            println!("{}", serde_json::to_string_pretty(available_metrics())?);
        }
        "yaml" => {
            println!("{}", serde_yaml::to_string(available_metrics())?);
        }
        _ => {
            println!("{:<12} {:<6} {:<6} Description", "Name", "Truth", "Alpha");
            for m in available_metrics() {
                println!(
                    "{:<12} {:<6} {:<6} {}",
                    m.name,
                    if m.requires_truth { "yes" } else { "no" },
                    m.default_alpha,
                    m.description
                );
            }
        }
    }
    Ok(())
}
