//! Canonical diagnostic code catalog.
//!
//! Every code has a fixed name, category and severity. The category is
//! derived from the code prefix: `V1xx` validation, `B2xx` binding,
//! `S3xx` schema, `R4xx` runtime (reserved for executors), `F5xx` safety.

use std::fmt;
use std::str::FromStr;

use serde::{Serialize, Serializer};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum Category {
    Validation,
    Binding,
    Schema,
    Runtime,
    Safety,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Fatal,
    Warning,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Fatal => write!(f, "fatal"),
            Severity::Warning => write!(f, "warning"),
        }
    }
}

/// Declaration order is numeric order within each category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Code {
    V100,
    V101,
    V102,
    V103,
    V104,
    V105,
    V106,
    V107,
    V108,
    V109,
    B201,
    B202,
    B203,
    B204,
    B205,
    B206,
    B207,
    B208,
    B209,
    S301,
    S302,
    S303,
    R401,
    R402,
    F501,
    F502,
    F503,
}

impl Code {
    pub const ALL: [Code; 27] = [
        Code::V100,
        Code::V101,
        Code::V102,
        Code::V103,
        Code::V104,
        Code::V105,
        Code::V106,
        Code::V107,
        Code::V108,
        Code::V109,
        Code::B201,
        Code::B202,
        Code::B203,
        Code::B204,
        Code::B205,
        Code::B206,
        Code::B207,
        Code::B208,
        Code::B209,
        Code::S301,
        Code::S302,
        Code::S303,
        Code::R401,
        Code::R402,
        Code::F501,
        Code::F502,
        Code::F503,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Code::V100 => "V100",
            Code::V101 => "V101",
            Code::V102 => "V102",
            Code::V103 => "V103",
            Code::V104 => "V104",
            Code::V105 => "V105",
            Code::V106 => "V106",
            Code::V107 => "V107",
            Code::V108 => "V108",
            Code::V109 => "V109",
            Code::B201 => "B201",
            Code::B202 => "B202",
            Code::B203 => "B203",
            Code::B204 => "B204",
            Code::B205 => "B205",
            Code::B206 => "B206",
            Code::B207 => "B207",
            Code::B208 => "B208",
            Code::B209 => "B209",
            Code::S301 => "S301",
            Code::S302 => "S302",
            Code::S303 => "S303",
            Code::R401 => "R401",
            Code::R402 => "R402",
            Code::F501 => "F501",
            Code::F502 => "F502",
            Code::F503 => "F503",
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Code::V100 => "MALFORMED_DOCUMENT",
            Code::V101 => "UNKNOWN_CAPABILITY",
            Code::V102 => "PREREQUISITE_VIOLATION",
            Code::V103 => "MALFORMED_STEP",
            Code::V104 => "DUPLICATE_STORE_AS",
            Code::V105 => "CAPABILITY_CONFLICT",
            Code::V106 => "INVALID_PARALLEL_GROUP",
            Code::V107 => "SOFT_PREREQUISITE_MISSING",
            Code::V108 => "DEPENDENCY_CYCLE",
            Code::V109 => "EMPTY_WORKFLOW",
            Code::B201 => "INVALID_FIELD_PATH",
            Code::B202 => "UNRESOLVED_BINDING",
            Code::B203 => "TYPE_MISMATCH",
            Code::B204 => "AMBIGUOUS_TYPE",
            Code::B205 => "INVALID_TYPE_ANNOTATION",
            Code::B206 => "MALFORMED_BINDING",
            Code::B207 => "UNKNOWN_PARAMETER",
            Code::B208 => "MISSING_REQUIRED_INPUT",
            Code::B209 => "COERCION_APPLIED",
            Code::S301 => "UNRESOLVED_REF",
            Code::S302 => "CIRCULAR_REF",
            Code::S303 => "INVALID_SCHEMA",
            Code::R401 => "EXECUTION_FAILED",
            Code::R402 => "EXECUTION_TIMEOUT",
            Code::F501 => "MISSING_CHECKPOINT",
            Code::F502 => "MISSING_APPROVAL",
            Code::F503 => "ROLLBACK_WITHOUT_CHECKPOINT",
        }
    }

    pub fn category(self) -> Category {
        match self.as_str().as_bytes()[0] {
            b'V' => Category::Validation,
            b'B' => Category::Binding,
            b'S' => Category::Schema,
            b'R' => Category::Runtime,
            _ => Category::Safety,
        }
    }

    pub fn severity(self) -> Severity {
        match self {
            Code::V107 | Code::B209 | Code::F502 => Severity::Warning,
            _ => Severity::Fatal,
        }
    }

    pub fn is_fatal(self) -> bool {
        self.severity() == Severity::Fatal
    }
}

impl fmt::Display for Code {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Code {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Code::ALL
            .iter()
            .copied()
            .find(|code| code.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("unknown diagnostic code '{s}'"))
    }
}

impl Serialize for Code {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}
