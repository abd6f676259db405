//! Dynamic field values shared by the filter evaluator and the record pipeline.
use std::{cmp::Ordering, collections::BTreeMap, fmt};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    None,
    Bool(bool),
    Int(i64),
    Str(String),
    Map(BTreeMap<String, String>),
}

impl Value {
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::None => "NoneType",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Str(_) => "str",
            Value::Map(_) => "dict",
        }
    }

    pub fn truthy(&self) -> bool {
        match self {
            Value::None => false,
            Value::Bool(b) => *b,
            Value::Int(n) => *n != 0,
            Value::Str(s) => !s.is_empty(),
            Value::Map(m) => !m.is_empty(),
        }
    }

    /// Integer view used by arithmetic and numeric comparison; booleans count as 0/1.
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(n) => Some(*n),
            Value::Bool(b) => Some(i64::from(*b)),
            _ => None,
        }
    }

    /// Stable text form used when comparing records for duplicates.
    pub fn signature(&self) -> String {
        match self {
            Value::None => "n:".to_string(),
            Value::Bool(b) => format!("b:{b}"),
            Value::Int(n) => format!("i:{n}"),
            Value::Str(s) => format!("s:{s}"),
            Value::Map(m) => {
                let json = serde_json::to_string(m).unwrap_or_default();
                format!("m:{json}")
            }
        }
    }

    fn rank(&self) -> u8 {
        match self {
            Value::None => 0,
            Value::Bool(_) | Value::Int(_) => 1,
            Value::Str(_) => 2,
            Value::Map(_) => 3,
        }
    }

    /// Total order for sorting mixed values: by kind first, then by value.
    pub fn sort_cmp(&self, other: &Value) -> Ordering {
        match self.rank().cmp(&other.rank()) {
            Ordering::Equal => {}
            unequal => return unequal,
        }
        match (self, other) {
            (Value::Str(a), Value::Str(b)) => a.cmp(b),
            (Value::Map(_), Value::Map(_)) => self.signature().cmp(&other.signature()),
            _ => match (self.as_int(), other.as_int()) {
                (Some(a), Some(b)) => a.cmp(&b),
                _ => Ordering::Equal,
            },
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::None => f.write_str("None"),
            Value::Bool(true) => f.write_str("True"),
            Value::Bool(false) => f.write_str("False"),
            Value::Int(n) => write!(f, "{n}"),
            Value::Str(s) => f.write_str(s),
            Value::Map(m) => {
                f.write_str("{")?;
                for (i, (k, v)) in m.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "'{k}': '{v}'")?;
                }
                f.write_str("}")
            }
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(s)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Int(n)
    }
}

/// Anything whose named fields can be read by the filter and pipeline.
pub trait FieldSource {
    fn field_value(&self, name: &str) -> Option<Value>;

    /// Resolves a dotted path such as `params.sni`; later segments index into maps.
    fn lookup(&self, path: &str) -> Option<Value> {
        let mut parts = path.split('.');
        let mut current = self.field_value(parts.next()?)?;
        for key in parts {
            current = match current {
                Value::Map(m) => Value::Str(m.get(key)?.clone()),
                _ => return None,
            };
        }
        Some(current)
    }
}
