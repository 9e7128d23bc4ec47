//! Validation entry points.
//!
//! A run is parse, plan, bindings, then the check stages up to the requested
//! level. Problems in the workflow end up in the [`Report`]; only failures to
//! run at all are errors.

use std::fmt;
use std::num::NonZeroUsize;
use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;
use std::sync::mpsc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::binding::resolve_bindings;
use crate::check::{check_contracts, check_dependencies, infer_types};
use crate::context::ValidationContext;
use crate::error::ValidateError;
use crate::load::read_to_string_with_timeout;
use crate::parse::{DocumentFormat, ParsedWorkflow, WorkflowPlan, parse};
use crate::patch;
use crate::report::{Diagnostics, Report};
use crate::schema::{SchemaNode, WORKFLOW_DOC};

/// Conformance level. Each level includes the ones below it.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
pub enum Level {
    /// Parse, bindings and dependency rules.
    L1,
    /// Adds type inference.
    L2,
    /// Adds contract checking.
    L3,
    /// Adds patch generation.
    #[default]
    L4,
}

impl Level {
    pub const ALL: [Level; 4] = [Level::L1, Level::L2, Level::L3, Level::L4];

    pub fn as_str(self) -> &'static str {
        match self {
            Level::L1 => "L1",
            Level::L2 => "L2",
            Level::L3 => "L3",
            Level::L4 => "L4",
        }
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Level {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let digits = s.trim().trim_start_matches(['L', 'l']);
        match digits {
            "1" => Ok(Level::L1),
            "2" => Ok(Level::L2),
            "3" => Ok(Level::L3),
            "4" => Ok(Level::L4),
            _ => Err(format!("unknown level '{s}', expected one of L1, L2, L3, L4")),
        }
    }
}

/// One workflow text for [`validate_batch`].
#[derive(Debug, Clone)]
pub struct WorkflowSource {
    pub name: String,
    pub text: String,
    pub format: DocumentFormat,
}

/// Validate an already parsed workflow.
pub fn validate_document(ctx: &ValidationContext, workflow: &ParsedWorkflow, level: Level) -> Report {
    let span = tracing::debug_span!("validate", workflow = %workflow.name, %level);
    let _enter = span.enter();

    let document = &workflow.document;
    let mut diagnostics = Diagnostics::new(workflow.name.as_str());

    let plan = WorkflowPlan::build(document, &mut diagnostics);
    let bindings = resolve_bindings(&plan, document.inputs.is_some(), &mut diagnostics);
    let inputs = resolve_inputs(ctx, workflow, &mut diagnostics);

    let outcome = check_dependencies(ctx.ontology(), document, &plan, &bindings, &mut diagnostics);
    tracing::debug!(stage = "dependency", diagnostics = diagnostics.len());

    if level >= Level::L2 {
        let types = infer_types(
            ctx.ontology(),
            ctx.coercions(),
            &plan,
            inputs.as_ref(),
            &bindings,
            &outcome,
            &mut diagnostics,
        );
        tracing::debug!(stage = "inference", diagnostics = diagnostics.len());

        if level >= Level::L3 {
            check_contracts(
                ctx.ontology(),
                ctx.coercions(),
                &plan,
                &bindings,
                &types,
                &outcome,
                &mut diagnostics,
            );
            tracing::debug!(stage = "contract", diagnostics = diagnostics.len());
        }
    }

    let diagnostics = diagnostics.finish();
    let patches = if level >= Level::L4 {
        patch::generate(&plan, &diagnostics)
    } else {
        Vec::new()
    };
    let report = Report::new(workflow.name.clone(), level, diagnostics, patches);
    tracing::debug!(
        verdict = ?report.verdict,
        fatal = report.fatal_count(),
        warnings = report.warning_count(),
        "validation finished"
    );
    report
}

/// Resolve the workflow's `inputs` schema against the shared bundle. Local
/// `$ref`s point into the workflow document itself.
fn resolve_inputs(
    ctx: &ValidationContext,
    workflow: &ParsedWorkflow,
    diagnostics: &mut Diagnostics,
) -> Option<Arc<SchemaNode>> {
    workflow.document.inputs.as_ref()?;
    let mut resolver = ctx.resolver().with_document(WORKFLOW_DOC, &workflow.raw);
    match resolver.resolve_pointer(WORKFLOW_DOC, "/inputs") {
        Ok(node) => Some(node),
        Err(e) => {
            diagnostics.global(e.code(), Some("inputs"), e.to_string());
            None
        }
    }
}

/// Parse and validate workflow text. A document that cannot be parsed yields
/// a report holding a single `V100`.
pub fn validate_str(
    ctx: &ValidationContext,
    text: &str,
    format: DocumentFormat,
    fallback_name: &str,
    level: Level,
) -> Report {
    match parse(text, format, fallback_name) {
        Ok(workflow) => validate_document(ctx, &workflow, level),
        Err(diagnostic) => Report::new(
            diagnostic.location.workflow.clone(),
            level,
            vec![diagnostic],
            Vec::new(),
        ),
    }
}

/// Read and validate a workflow file. The file stem names the workflow when
/// the document has no `name`.
pub fn validate_path(
    ctx: &ValidationContext,
    path: &Path,
    level: Level,
    read_timeout: Duration,
) -> Result<Report, ValidateError> {
    let text = read_to_string_with_timeout(path, read_timeout)?;
    let name = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "workflow".to_string());
    Ok(validate_str(
        ctx,
        &text,
        DocumentFormat::from_path(path),
        &name,
        level,
    ))
}

/// Validate independent workflows in parallel over one shared context.
/// Reports come back in input order.
pub fn validate_batch(
    ctx: &ValidationContext,
    sources: &[WorkflowSource],
    level: Level,
) -> Result<Vec<Report>, ValidateError> {
    if sources.is_empty() {
        return Ok(Vec::new());
    }
    let workers = std::thread::available_parallelism()
        .map_or(1, NonZeroUsize::get)
        .min(sources.len());
    let chunk = sources.len().div_ceil(workers);

    std::thread::scope(|scope| {
        let handles: Vec<_> = sources
            .chunks(chunk)
            .map(|batch| {
                scope.spawn(move || {
                    batch
                        .iter()
                        .map(|s| validate_str(ctx, &s.text, s.format, &s.name, level))
                        .collect::<Vec<_>>()
                })
            })
            .collect();

        let mut reports = Vec::with_capacity(sources.len());
        for handle in handles {
            let batch = handle.join().map_err(|_| ValidateError::WorkerPanicked)?;
            reports.extend(batch);
        }
        Ok(reports)
    })
}

/// Run one validation with a deadline. The worker is detached when the
/// deadline passes.
pub fn validate_with_timeout(
    ctx: Arc<ValidationContext>,
    workflow: ParsedWorkflow,
    level: Level,
    timeout: Duration,
) -> Result<Report, ValidateError> {
    let (tx, rx) = mpsc::channel();
    std::thread::spawn(move || {
        let _ = tx.send(validate_document(&ctx, &workflow, level));
    });
    match rx.recv_timeout(timeout) {
        Ok(report) => Ok(report),
        Err(mpsc::RecvTimeoutError::Timeout) => {
            tracing::warn!(?timeout, "validation deadline exceeded");
            Err(ValidateError::Deadline(timeout))
        }
        Err(mpsc::RecvTimeoutError::Disconnected) => Err(ValidateError::WorkerPanicked),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn level_parsing() {
        assert_eq!("L2".parse::<Level>().unwrap(), Level::L2);
        assert_eq!("l3".parse::<Level>().unwrap(), Level::L3);
        assert_eq!("4".parse::<Level>().unwrap(), Level::L4);
        assert!("L5".parse::<Level>().is_err());
    }

    #[test]
    fn levels_are_ordered() {
        assert!(Level::L1 < Level::L2 && Level::L3 < Level::L4);
        assert_eq!(Level::default(), Level::L4);
        assert_eq!(serde_json::to_string(&Level::L3).unwrap(), "\"L3\"");
    }
}
