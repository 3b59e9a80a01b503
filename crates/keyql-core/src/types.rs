//! Core value and type-category types for keyql

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A typed attribute value as returned by the backing store
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum AttributeValue {
    /// String
    S(String),
    /// Number (kept as its textual form, the store does not fix a precision)
    N(String),
    /// Binary blob
    B(Vec<u8>),
    /// Boolean
    Bool(bool),
    /// Explicit NULL
    Null,
    /// Heterogeneous list
    L(Vec<AttributeValue>),
    /// Nested map
    M(HashMap<String, AttributeValue>),
    /// String set
    Ss(Vec<String>),
    /// Number set
    Ns(Vec<String>),
    /// Binary set
    Bs(Vec<Vec<u8>>),
}

impl AttributeValue {
    /// The relational category this value belongs to
    pub fn category(&self) -> TypeCategory {
        match self {
            AttributeValue::S(_) => TypeCategory::String,
            AttributeValue::N(_) => TypeCategory::Number,
            AttributeValue::B(_) => TypeCategory::Binary,
            AttributeValue::Bool(_) => TypeCategory::Boolean,
            AttributeValue::Null => TypeCategory::Null,
            AttributeValue::L(_)
            | AttributeValue::Ss(_)
            | AttributeValue::Ns(_)
            | AttributeValue::Bs(_) => TypeCategory::Array,
            AttributeValue::M(_) => TypeCategory::Struct,
        }
    }

    /// Check if the value is NULL
    pub fn is_null(&self) -> bool {
        matches!(self, AttributeValue::Null)
    }

    /// Try to get as a string
    pub fn as_str(&self) -> Option<&str> {
        match self {
            AttributeValue::S(s) => Some(s),
            _ => None,
        }
    }
}

/// One row of a scan: attribute name to value
pub type Item = HashMap<String, AttributeValue>;

/// Observed value category of a column, ordered by the relational type it maps to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TypeCategory {
    String,
    Number,
    Binary,
    Boolean,
    Array,
    Struct,
    Null,
    Other,
}

impl TypeCategory {
    /// Relational catalog type code (matches the codes used by SQL catalog APIs)
    pub fn sql_type_code(&self) -> i32 {
        match self {
            TypeCategory::String => 12,    // VARCHAR
            TypeCategory::Number => 3,     // DECIMAL
            TypeCategory::Binary => -3,    // VARBINARY
            TypeCategory::Boolean => 16,   // BOOLEAN
            TypeCategory::Array => 2003,   // ARRAY
            TypeCategory::Struct => 2002,  // STRUCT
            TypeCategory::Null => 0,       // NULL
            TypeCategory::Other => 1111,   // OTHER
        }
    }

    /// Relational type name shown in catalog listings
    pub fn sql_type_name(&self) -> &'static str {
        match self {
            TypeCategory::String => "VARCHAR",
            TypeCategory::Number => "DECIMAL",
            TypeCategory::Binary => "VARBINARY",
            TypeCategory::Boolean => "BOOLEAN",
            TypeCategory::Array => "ARRAY",
            TypeCategory::Struct => "STRUCT",
            TypeCategory::Null => "NULL",
            TypeCategory::Other => "OTHER",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TypeCategory::String => "STRING",
            TypeCategory::Number => "NUMBER",
            TypeCategory::Binary => "BINARY",
            TypeCategory::Boolean => "BOOLEAN",
            TypeCategory::Array => "ARRAY",
            TypeCategory::Struct => "STRUCT",
            TypeCategory::Null => "NULL",
            TypeCategory::Other => "OTHER",
        }
    }
}

impl std::fmt::Display for TypeCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
