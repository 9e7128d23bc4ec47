//! Command definitions and dispatch.

pub mod output;

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Context;
use clap::{Parser, Subcommand};

use flowcheck::config::ValidatorConfig;
use flowcheck::load::{load_context, read_to_string_with_timeout};
use flowcheck::parse::{DocumentFormat, parse};
use flowcheck::patch::{apply_all, render_diff};
use flowcheck::{Level, WorkflowSource, validate_batch};

use output::OutputFormat;

pub const EXIT_PASS: u8 = 0;
pub const EXIT_FAIL: u8 = 1;
pub const EXIT_LOAD_ERROR: u8 = 2;

#[derive(Parser)]
#[command(name = "flowcheck")]
#[command(about = "Static validator for capability-composition workflows", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Configuration file (defaults to ./flowcheck.toml when present)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(clap::Args)]
pub struct SourceArgs {
    /// Ontology file (YAML or JSON)
    #[arg(long, env = "FLOWCHECK_ONTOLOGY")]
    pub ontology: Option<PathBuf>,

    /// Schema bundle files or directories
    #[arg(long, env = "FLOWCHECK_SCHEMAS", value_delimiter = ',', num_args = 1..)]
    pub schemas: Vec<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Validate one or more workflow documents
    Validate {
        /// Workflow files (YAML or JSON)
        #[arg(required = true)]
        paths: Vec<PathBuf>,

        #[command(flatten)]
        sources: SourceArgs,

        /// Conformance level (L1..L4)
        #[arg(long)]
        level: Option<Level>,

        /// Output format
        #[arg(long, value_enum, default_value = "text")]
        format: OutputFormat,

        /// Print generated patches as JSON
        #[arg(long)]
        emit_patch: bool,

        /// Print a unified diff of each patched workflow
        #[arg(long)]
        diff: bool,
    },

    /// Load the ontology and schema bundle and report their size
    CheckOntology {
        #[command(flatten)]
        sources: SourceArgs,
    },
}

pub fn run(cli: Cli) -> anyhow::Result<ExitCode> {
    let mut config = ValidatorConfig::load(cli.config.as_deref())?;

    match cli.command {
        Commands::Validate {
            paths,
            sources,
            level,
            format,
            emit_patch,
            diff,
        } => {
            apply_sources(&mut config, sources);
            if let Some(level) = level {
                config.level = level;
            }
            if (emit_patch || diff) && config.level < Level::L4 {
                if let Some(level) = level {
                    anyhow::bail!("--emit-patch and --diff need level L4, but --level {level} was given");
                }
                tracing::warn!(configured = %config.level, "patch output requested, validating at L4");
                config.level = Level::L4;
            }
            validate(&config, &paths, format, emit_patch, diff)
        }
        Commands::CheckOntology { sources } => {
            apply_sources(&mut config, sources);
            let ctx = load_context(&config)?;
            output::print_success(&format!(
                "ontology OK: {} capabilities, {} edges, {} schema documents",
                ctx.ontology().len(),
                ctx.ontology().edge_count(),
                ctx.schemas().len()
            ));
            Ok(ExitCode::from(EXIT_PASS))
        }
    }
}

/// Flags and environment override the configuration file.
fn apply_sources(config: &mut ValidatorConfig, sources: SourceArgs) {
    if let Some(ontology) = sources.ontology {
        config.ontology = Some(ontology);
    }
    if !sources.schemas.is_empty() {
        config.schemas = sources.schemas;
    }
}

fn validate(
    config: &ValidatorConfig,
    paths: &[PathBuf],
    format: OutputFormat,
    emit_patch: bool,
    diff: bool,
) -> anyhow::Result<ExitCode> {
    let ctx = load_context(config)?;
    let timeout = config.load_timeout();

    let mut sources = Vec::with_capacity(paths.len());
    for path in paths {
        let text = read_to_string_with_timeout(path, timeout)?;
        let name = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        sources.push(WorkflowSource {
            name,
            text,
            format: DocumentFormat::from_path(path),
        });
    }

    let reports = validate_batch(&ctx, &sources, config.level)?;
    output::print_reports(&reports, format)?;

    if emit_patch {
        for report in &reports {
            output::print_patches(report)?;
        }
    }
    if diff {
        for (source, report) in sources.iter().zip(&reports) {
            if report.patches.is_empty() {
                continue;
            }
            let Ok(parsed) = parse(&source.text, source.format, &source.name) else {
                continue;
            };
            let patched = apply_all(&parsed.raw, &report.patches);
            let rendered = render_diff(&parsed.raw, &patched, &source.name)
                .with_context(|| format!("rendering diff for {}", source.name))?;
            print!("{rendered}");
        }
    }

    let failed = reports.iter().filter(|r| !r.passed()).count();
    tracing::info!(workflows = reports.len(), failed, "validation complete");
    Ok(ExitCode::from(if failed > 0 { EXIT_FAIL } else { EXIT_PASS }))
}
