//! Binding expressions: `${producer.path[: type]}` references between steps,
//! and the gate/condition expression language built on them.

pub mod ast;
pub mod expr;
pub mod parser;
pub mod resolve;

pub use ast::{Binding, BindingArena, BindingId, BindingSite, Producer, Segment};
pub use expr::{CmpOp, Expr, Operand, parse_expr};
pub use parser::{ParsedBinding, SyntaxError, parse_binding};
pub use resolve::{InputValue, ResolvedBindings, StepBindings, resolve_bindings};
