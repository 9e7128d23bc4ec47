//! Registered conversions between primitive types.

use std::fmt;

use crate::schema::{Primitive, SchemaKind, SchemaNode};

/// Coercion key: a primitive, or a primitive restricted to an enum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TypeTag {
    Primitive(Primitive),
    Enum(Primitive),
}

impl TypeTag {
    pub fn of(node: &SchemaNode) -> Option<TypeTag> {
        match &node.kind {
            SchemaKind::Primitive {
                ty,
                enumeration: None,
            } => Some(TypeTag::Primitive(*ty)),
            SchemaKind::Primitive {
                ty,
                enumeration: Some(_),
            } => Some(TypeTag::Enum(*ty)),
            _ => None,
        }
    }

    pub fn base(self) -> Primitive {
        match self {
            TypeTag::Primitive(p) | TypeTag::Enum(p) => p,
        }
    }
}

impl fmt::Display for TypeTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeTag::Primitive(p) => f.write_str(p.as_str()),
            TypeTag::Enum(p) => write!(f, "enum<{}>", p.as_str()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoercionKind {
    /// Applied silently; reported as a hint.
    Implicit,
    /// Needs a `coerce` entry on the consuming step.
    Explicit,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Coercion {
    pub from: TypeTag,
    pub to: TypeTag,
    pub kind: CoercionKind,
    pub note: &'static str,
}

#[derive(Debug, Clone)]
pub struct CoercionRegistry {
    rules: Vec<Coercion>,
}

impl Default for CoercionRegistry {
    fn default() -> Self {
        CoercionRegistry::builtin()
    }
}

impl CoercionRegistry {
    pub fn empty() -> Self {
        CoercionRegistry { rules: Vec::new() }
    }

    pub fn builtin() -> Self {
        use CoercionKind::{Explicit, Implicit};
        use TypeTag::{Enum, Primitive as P};

        let mut registry = CoercionRegistry::empty();
        registry.register(
            P(Primitive::Integer),
            P(Primitive::Number),
            Implicit,
            "integers widen to numbers",
        );
        registry.register(
            P(Primitive::String),
            Enum(Primitive::String),
            Implicit,
            "value must be an enum member at runtime",
        );
        registry.register(
            P(Primitive::Number),
            P(Primitive::Integer),
            Explicit,
            "fractional part is truncated",
        );
        for from in [Primitive::Integer, Primitive::Number, Primitive::Boolean] {
            registry.register(P(from), P(Primitive::String), Explicit, "value is formatted as text");
        }
        for to in [Primitive::Number, Primitive::Integer, Primitive::Boolean] {
            registry.register(P(Primitive::String), P(to), Explicit, "text is parsed");
        }
        registry
    }

    pub fn register(&mut self, from: TypeTag, to: TypeTag, kind: CoercionKind, note: &'static str) {
        self.rules.retain(|r| !(r.from == from && r.to == to));
        self.rules.push(Coercion {
            from,
            to,
            kind,
            note,
        });
    }

    pub fn lookup(&self, from: TypeTag, to: TypeTag) -> Option<&Coercion> {
        self.rules.iter().find(|r| r.from == from && r.to == to)
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}
