//! MathGen CLI
//!
//! Commands: types, functions, plan, generate, validate
//! Outputs JSON to stdout, logs to stderr
//! Returns 1 on setup errors, 2 on render or consistency failure

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

use mathgen_core::{BuildMode, ConsistencyReport, EmissionPipeline, EmitError, FailurePolicy, GeneratorConfig};

#[derive(Parser)]
#[command(name = "mathgen-cli")]
#[command(about = "MathGen CLI - Schema-driven code generator")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// JSON configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Schema document (built-in catalog when omitted)
    #[arg(short, long, global = true)]
    schema: Option<PathBuf>,

    /// Templates directory (built-in templates when omitted)
    #[arg(short, long, global = true)]
    templates: Option<PathBuf>,

    /// Increase log verbosity
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Commands {
    /// List registered types
    Types,

    /// List registered functions and their overloads
    Functions,

    /// Show the artifact plan and any destination collisions
    Plan,

    /// Render and write every artifact
    Generate {
        /// Output directory
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Block on consistency errors
        #[arg(long)]
        release: bool,

        /// Write what renders and report failures at the end
        #[arg(long)]
        best_effort: bool,

        /// Render threads (0 = all cores)
        #[arg(short, long)]
        jobs: Option<usize>,

        /// Render and validate without writing
        #[arg(long)]
        dry_run: bool,
    },

    /// Check previously generated output against the schema
    Validate {
        /// Output directory
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Treat any consistency finding as blocking
        #[arg(long)]
        release: bool,
    },
}

fn init_logging(verbose: u8) {
    let default = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn print_json(value: &serde_json::Value) {
    match serde_json::to_string_pretty(value) {
        Ok(text) => println!("{text}"),
        Err(e) => println!(r#"{{"success": false, "error": "{e}"}}"#),
    }
}

fn fail(error: impl std::fmt::Display, code: u8) -> ExitCode {
    print_json(&serde_json::json!({
        "success": false,
        "error": error.to_string(),
    }));
    ExitCode::from(code)
}

fn emit_failure(error: EmitError) -> ExitCode {
    let details = match &error {
        EmitError::DestinationCollision(collisions) => Some(serde_json::json!(collisions)),
        EmitError::Render(failures) => Some(serde_json::json!(failures)),
        EmitError::Inconsistent(findings) => Some(serde_json::json!(findings)),
        _ => None,
    };
    let Some(details) = details else {
        return fail(error, 1);
    };
    print_json(&serde_json::json!({
        "success": false,
        "error": error.to_string(),
        "details": details,
    }));
    ExitCode::from(2)
}

/// Dev findings are reported as warnings; only a blocking report fails.
fn validation_passed(report: &ConsistencyReport) -> bool {
    !report.blocking
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let mut config = match &cli.config {
        Some(path) => match GeneratorConfig::load(path) {
            Ok(config) => config,
            Err(e) => return fail(e, 1),
        },
        None => GeneratorConfig::default(),
    };
    if cli.schema.is_some() {
        config.schema_path = cli.schema.clone();
    }
    if cli.templates.is_some() {
        config.templates_dir = cli.templates.clone();
    }

    let pipeline = match EmissionPipeline::from_config(&config) {
        Ok(pipeline) => pipeline,
        Err(e) => return fail(e, 1),
    };

    match cli.command {
        Commands::Types => {
            let registries = pipeline.registries();
            let types: Vec<_> = registries
                .types
                .all()
                .map(|t| {
                    serde_json::json!({
                        "name": t.name,
                        "category": t.category,
                        "header": t.header_file(),
                        "bindingName": registries.types.binding_name(t),
                    })
                })
                .collect();
            print_json(&serde_json::json!(types));
            ExitCode::SUCCESS
        }

        Commands::Functions => {
            let functions: Vec<_> = pipeline
                .registries()
                .functions
                .all()
                .map(|f| {
                    serde_json::json!({
                        "name": f.name,
                        "symbol": f.symbol(),
                        "category": f.category,
                        "interfaces": f.interfaces,
                    })
                })
                .collect();
            print_json(&serde_json::json!(functions));
            ExitCode::SUCCESS
        }

        Commands::Plan => {
            let plan = pipeline.plan();
            let collisions = plan.collisions();
            print_json(&serde_json::json!({
                "success": collisions.is_empty(),
                "obligations": plan.obligations,
                "collisions": collisions,
            }));
            if collisions.is_empty() {
                ExitCode::SUCCESS
            } else {
                ExitCode::from(2)
            }
        }

        Commands::Generate {
            output,
            release,
            best_effort,
            jobs,
            dry_run,
        } => {
            let mut options = config.emit_options();
            if let Some(output) = output {
                options.output_dir = output;
            }
            if release {
                options.mode = BuildMode::Release;
            }
            if best_effort {
                options.failure_policy = FailurePolicy::BestEffort;
            }
            if let Some(jobs) = jobs {
                options.jobs = jobs;
            }
            options.dry_run |= dry_run;

            match pipeline.emit(&options) {
                Ok(report) => {
                    let success = report.success();
                    print_json(&serde_json::json!({
                        "success": success,
                        "report": report,
                    }));
                    if success {
                        ExitCode::SUCCESS
                    } else {
                        ExitCode::from(2)
                    }
                }
                Err(e) => emit_failure(e),
            }
        }

        Commands::Validate { output, release } => {
            let dir = output.unwrap_or_else(|| config.output_dir.clone());
            let mode = if release { BuildMode::Release } else { config.mode };
            match pipeline.validate_output(&dir, mode) {
                Ok(report) => {
                    let success = validation_passed(&report);
                    print_json(&serde_json::json!({
                        "success": success,
                        "report": report,
                    }));
                    if success {
                        ExitCode::SUCCESS
                    } else {
                        ExitCode::from(2)
                    }
                }
                Err(e) => fail(e, 1),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mathgen_core::{catalog, EmitOptions, TemplateSet};

    #[test]
    fn test_validate_fails_only_when_blocking() {
        let dir = tempfile::tempdir().unwrap();
        let pipeline = EmissionPipeline::new(catalog::builtin_registries().unwrap(), TemplateSet::builtin().unwrap());
        pipeline
            .emit(&EmitOptions {
                output_dir: dir.path().to_path_buf(),
                ..EmitOptions::default()
            })
            .unwrap();
        std::fs::remove_file(dir.path().join("types/vec3f.h")).unwrap();

        let dev = pipeline.validate_output(dir.path(), BuildMode::Dev).unwrap();
        assert!(!dev.is_clean());
        assert!(validation_passed(&dev));

        let release = pipeline.validate_output(dir.path(), BuildMode::Release).unwrap();
        assert!(!validation_passed(&release));
    }
}
