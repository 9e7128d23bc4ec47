//! Arena-indexed binding AST. Every binding in a workflow is parsed once and
//! referred to by `BindingId` afterwards.

use std::fmt;
use std::ops::Range;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Segment {
    Field(String),
    Index(usize),
}

impl fmt::Display for Segment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Segment::Field(name) => write!(f, ".{name}"),
            Segment::Index(i) => write!(f, "[{i}]"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BindingId(u32);

impl BindingId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Producer {
    Step(usize),
    Inputs,
}

/// Where a binding was written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BindingSite {
    pub step: usize,
    /// Document field, e.g. `input_bindings.query` or `gates[0].when`.
    pub field: String,
}

#[derive(Debug, Clone)]
pub struct Binding {
    pub raw: String,
    pub producer: String,
    path: Range<usize>,
    pub annotation: Option<String>,
    pub site: BindingSite,
    pub resolved: Option<Producer>,
}

#[derive(Debug, Default)]
pub struct BindingArena {
    bindings: Vec<Binding>,
    segments: Vec<Segment>,
}

impl BindingArena {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn alloc(
        &mut self,
        raw: &str,
        producer: String,
        path: Vec<Segment>,
        annotation: Option<String>,
        site: BindingSite,
    ) -> BindingId {
        let start = self.segments.len();
        self.segments.extend(path);
        let id = BindingId(self.bindings.len() as u32);
        self.bindings.push(Binding {
            raw: raw.to_string(),
            producer,
            path: start..self.segments.len(),
            annotation,
            site,
            resolved: None,
        });
        id
    }

    pub fn get(&self, id: BindingId) -> &Binding {
        &self.bindings[id.index()]
    }

    pub fn path(&self, id: BindingId) -> &[Segment] {
        &self.segments[self.bindings[id.index()].path.clone()]
    }

    /// `producer.field[0].x` without the annotation.
    pub fn display_path(&self, id: BindingId) -> String {
        let mut out = self.get(id).producer.clone();
        for segment in self.path(id) {
            out.push_str(&segment.to_string());
        }
        out
    }

    pub fn set_resolved(&mut self, id: BindingId, producer: Producer) {
        self.bindings[id.index()].resolved = Some(producer);
    }

    pub fn iter(&self) -> impl Iterator<Item = (BindingId, &Binding)> {
        self.bindings
            .iter()
            .enumerate()
            .map(|(i, b)| (BindingId(i as u32), b))
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }
}
