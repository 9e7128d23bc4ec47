//! Error reporter: collects diagnostics from every stage, deduplicates and
//! orders them, and decides the verdict.

pub mod codes;
pub mod diagnostic;

use std::collections::HashSet;
use std::fmt::Write as _;

use serde::Serialize;

pub use codes::{Category, Code, Severity};
pub use diagnostic::{Diagnostic, Fix, Location};

use crate::engine::Level;
use crate::patch::Patch;

/// Per-run diagnostic sink. Stages push into it; `finish` produces the
/// canonical ordering.
#[derive(Debug)]
pub struct Diagnostics {
    workflow: String,
    items: Vec<Diagnostic>,
}

impl Diagnostics {
    pub fn new(workflow: impl Into<String>) -> Self {
        Diagnostics {
            workflow: workflow.into(),
            items: Vec::new(),
        }
    }

    pub fn workflow(&self) -> &str {
        &self.workflow
    }

    /// Record a workflow-level diagnostic.
    pub fn global(
        &mut self,
        code: Code,
        field: Option<&str>,
        message: impl Into<String>,
    ) -> &mut Diagnostic {
        let location = Location {
            workflow: self.workflow.clone(),
            step: None,
            field: field.map(str::to_string),
        };
        self.push(Diagnostic::new(code, message, location))
    }

    /// Record a diagnostic attached to a step.
    pub fn step(
        &mut self,
        code: Code,
        step: usize,
        field: impl Into<String>,
        message: impl Into<String>,
    ) -> &mut Diagnostic {
        let location = Location {
            workflow: self.workflow.clone(),
            step: Some(step),
            field: Some(field.into()),
        };
        self.push(Diagnostic::new(code, message, location))
    }

    pub fn push(&mut self, diagnostic: Diagnostic) -> &mut Diagnostic {
        self.items.push(diagnostic);
        let last = self.items.len() - 1;
        &mut self.items[last]
    }

    pub fn has(&self, code: Code) -> bool {
        self.items.iter().any(|d| d.code == code)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Deduplicate on (code, location), keeping the first occurrence, then
    /// sort by (step, category, code, field, message).
    pub fn finish(self) -> Vec<Diagnostic> {
        let mut seen = HashSet::new();
        let mut items: Vec<Diagnostic> = self
            .items
            .into_iter()
            .filter(|d| seen.insert((d.code, d.location.clone())))
            .collect();
        items.sort_by(|a, b| {
            (
                a.location.step,
                a.category(),
                a.code,
                &a.location.field,
                &a.message,
            )
                .cmp(&(
                    b.location.step,
                    b.category(),
                    b.code,
                    &b.location.field,
                    &b.message,
                ))
        });
        items
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Verdict {
    Pass,
    Fail,
}

/// Outcome of one validation run.
#[derive(Debug, Clone, Serialize)]
pub struct Report {
    pub workflow: String,
    pub level: Level,
    pub verdict: Verdict,
    pub diagnostics: Vec<Diagnostic>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub patches: Vec<Patch>,
}

impl Report {
    pub fn new(
        workflow: impl Into<String>,
        level: Level,
        diagnostics: Vec<Diagnostic>,
        patches: Vec<Patch>,
    ) -> Self {
        let verdict = if diagnostics.iter().any(Diagnostic::is_fatal) {
            Verdict::Fail
        } else {
            Verdict::Pass
        };
        Report {
            workflow: workflow.into(),
            level,
            verdict,
            diagnostics,
            patches,
        }
    }

    pub fn passed(&self) -> bool {
        self.verdict == Verdict::Pass
    }

    pub fn fatal_count(&self) -> usize {
        self.diagnostics.iter().filter(|d| d.is_fatal()).count()
    }

    pub fn warning_count(&self) -> usize {
        self.diagnostics.len() - self.fatal_count()
    }

    pub fn codes(&self) -> Vec<Code> {
        self.diagnostics.iter().map(|d| d.code).collect()
    }

    pub fn count(&self, code: Code) -> usize {
        self.diagnostics.iter().filter(|d| d.code == code).count()
    }

    /// Diagnostics only, as a JSON array in wire shape.
    pub fn diagnostics_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(&self.diagnostics)
    }

    /// Human-readable rendering used by the CLI text format.
    pub fn render_text(&self) -> String {
        let mut out = String::new();
        let verdict = match self.verdict {
            Verdict::Pass => "PASS",
            Verdict::Fail => "FAIL",
        };
        let _ = writeln!(
            out,
            "{} {} ({}): {} fatal, {} warning(s)",
            verdict,
            self.workflow,
            self.level,
            self.fatal_count(),
            self.warning_count()
        );
        for d in &self.diagnostics {
            let _ = writeln!(out, "  {}: {}", d.severity(), d);
            if let Some(suggestion) = &d.suggestion {
                let _ = writeln!(out, "    suggestion: {}", suggestion);
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finish_dedups_on_code_and_location() {
        let mut sink = Diagnostics::new("wf");
        sink.step(Code::V102, 1, "capability", "first");
        sink.step(Code::V102, 1, "capability", "second");
        sink.step(Code::V102, 1, "store_as", "other field");
        let items = sink.finish();
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].message, "first");
    }

    #[test]
    fn finish_orders_workflow_level_first_then_step_category_code() {
        let mut sink = Diagnostics::new("wf");
        sink.step(Code::F501, 1, "mutation", "safety");
        sink.step(Code::B202, 1, "input_bindings.x", "binding");
        sink.step(Code::V101, 2, "capability", "late");
        sink.global(Code::V109, Some("steps"), "empty");
        sink.step(Code::V102, 1, "capability", "validation");
        let codes: Vec<Code> = sink.finish().iter().map(|d| d.code).collect();
        assert_eq!(
            codes,
            vec![Code::V109, Code::V102, Code::B202, Code::F501, Code::V101]
        );
    }

    #[test]
    fn warnings_alone_pass() {
        let mut sink = Diagnostics::new("wf");
        sink.step(Code::B209, 0, "input_bindings.x", "coerced");
        let report = Report::new("wf", Level::L3, sink.finish(), vec![]);
        assert!(report.passed());
        assert_eq!(report.warning_count(), 1);
    }

    #[test]
    fn wire_shape_has_exactly_five_keys() {
        let mut sink = Diagnostics::new("wf");
        sink.step(Code::B203, 0, "input_bindings.count", "expected number, found string")
            .suggest("annotate the binding");
        let value = serde_json::to_value(&sink.finish()[0]).unwrap();
        let keys: Vec<&String> = value.as_object().unwrap().keys().collect();
        assert_eq!(keys.len(), 5);
        assert_eq!(value["name"], "TYPE_MISMATCH");
        assert_eq!(value["location"]["step"], 0);
        assert_eq!(value["location"]["field"], "input_bindings.count");
    }
}
