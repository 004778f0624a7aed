use crate::{edm::EdmType, value::Value};
use thiserror::Error as ThisError;

///
/// CompareOp
///

#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum CompareOp {
    Lt,
    Le,
    Gt,
    Ge,
    Ne,
    Eq,
}

impl CompareOp {
    /// Parse an operator token, accepting both the symbolic forms and the
    /// word aliases (`<`/`lt`, `<>`/`!=`/`!==`/`ne`, `=`/`==`/`===`/`eq`, …).
    pub fn parse(token: &str) -> Result<Self, FilterError> {
        match token {
            "<" | "lt" => Ok(Self::Lt),
            "<=" | "le" => Ok(Self::Le),
            ">" | "gt" => Ok(Self::Gt),
            ">=" | "ge" => Ok(Self::Ge),
            "<>" | "!=" | "!==" | "ne" => Ok(Self::Ne),
            "=" | "==" | "===" | "eq" => Ok(Self::Eq),
            other => Err(FilterError::UnknownComparisonOperator {
                operator: other.to_string(),
            }),
        }
    }

    /// Query-string keyword for this operator.
    #[must_use]
    pub const fn keyword(self) -> &'static str {
        match self {
            Self::Lt => "lt",
            Self::Le => "le",
            Self::Gt => "gt",
            Self::Ge => "ge",
            Self::Ne => "ne",
            Self::Eq => "eq",
        }
    }
}

///
/// Filter
///
/// Comparison/boolean expression tree produced by the query builder. The
/// only query language exposed: property references, typed constants,
/// binary comparisons, and/or/not, plus a raw-string escape hatch.
///

#[derive(Clone, Debug, PartialEq)]
pub enum Filter {
    Property(String),
    Constant {
        value: Value,
        edm_type: Option<EdmType>,
    },
    Not(Box<Filter>),
    And(Box<Filter>, Box<Filter>),
    Or(Box<Filter>, Box<Filter>),
    Compare {
        op: CompareOp,
        left: Box<Filter>,
        right: Box<Filter>,
    },
    Raw(String),
}

impl Filter {
    #[must_use]
    pub fn property(name: impl Into<String>) -> Self {
        Self::Property(name.into())
    }

    #[must_use]
    pub fn constant(value: impl Into<Value>) -> Self {
        Self::Constant {
            value: value.into(),
            edm_type: None,
        }
    }

    #[must_use]
    pub fn constant_typed(value: impl Into<Value>, edm_type: EdmType) -> Self {
        Self::Constant {
            value: value.into(),
            edm_type: Some(edm_type),
        }
    }

    #[must_use]
    pub fn not(filter: Self) -> Self {
        Self::Not(Box::new(filter))
    }

    #[must_use]
    pub fn and(left: Self, right: Self) -> Self {
        Self::And(Box::new(left), Box::new(right))
    }

    #[must_use]
    pub fn or(left: Self, right: Self) -> Self {
        Self::Or(Box::new(left), Box::new(right))
    }

    #[must_use]
    pub fn compare(op: CompareOp, left: Self, right: Self) -> Self {
        Self::Compare {
            op,
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    /// `property op constant` comparison.
    #[must_use]
    pub fn compare_value(op: CompareOp, property: &str, value: impl Into<Value>) -> Self {
        Self::compare(op, Self::property(property), Self::constant(value))
    }

    /// Property equality, the most common leaf.
    #[must_use]
    pub fn eq(property: &str, value: impl Into<Value>) -> Self {
        Self::compare_value(CompareOp::Eq, property, value)
    }

    #[must_use]
    pub fn raw(filter: impl Into<String>) -> Self {
        Self::Raw(filter.into())
    }

    /// Render to the OData `$filter` query-string form.
    #[must_use]
    pub fn render(&self) -> String {
        match self {
            Self::Property(name) => name.clone(),
            Self::Constant { value, edm_type } => {
                render_constant(value, edm_type.unwrap_or_else(|| EdmType::of(value)))
            }
            Self::Not(inner) => format!("not ({})", inner.render()),
            Self::And(left, right) => format!("({}) and ({})", left.render(), right.render()),
            Self::Or(left, right) => format!("({}) or ({})", left.render(), right.render()),
            Self::Compare { op, left, right } => {
                format!("{} {} {}", left.render(), op.keyword(), right.render())
            }
            Self::Raw(s) => s.clone(),
        }
    }
}

impl std::fmt::Display for Filter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.render())
    }
}

fn render_constant(value: &Value, edm_type: EdmType) -> String {
    match (edm_type, value) {
        (EdmType::String, _) => format!("'{}'", value.raw_wire().replace('\'', "''")),
        (EdmType::Int64, _) => format!("{}L", value.raw_wire()),
        (EdmType::DateTime, _) => format!("datetime'{}'", value.raw_wire()),
        (EdmType::Guid, _) => format!("guid'{}'", value.raw_wire()),
        (EdmType::Binary, Value::Binary(bytes)) => {
            let mut hex = String::with_capacity(bytes.len() * 2);
            for byte in bytes {
                use std::fmt::Write as _;
                let _ = write!(hex, "{byte:02X}");
            }
            format!("X'{hex}'")
        }
        _ => value.raw_wire(),
    }
}

///
/// FilterError
///

#[derive(Debug, Eq, PartialEq, ThisError)]
pub enum FilterError {
    #[error("unknown comparison operator {operator:?}")]
    UnknownComparisonOperator { operator: String },
}

///
/// TESTS
///
