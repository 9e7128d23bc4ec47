//! Check stages, run in order: dependency (L1), inference (L2), contract (L3).

pub mod coercion;
pub mod contract;
pub mod dependency;
pub mod inference;

pub use coercion::{Coercion, CoercionKind, CoercionRegistry, TypeTag};
pub use contract::{Compatibility, check_contracts, compatibility};
pub use dependency::{DependencyOutcome, check_dependencies};
pub use inference::{PathOutcome, TypeTable, infer_types, walk};
