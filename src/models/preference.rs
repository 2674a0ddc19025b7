//! Typed preference values
//!
//! Both preference stores hold scalar values. In a bundle every value is a
//! string; these types convert between the two.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Declared type of a structured preference key
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PreferenceType {
    Bool,
    Int,
    Long,
    Float,
    Text,
}

/// A scalar preference value
///
/// Serialized untagged, so a legacy preference file is a plain JSON object.
/// Variant order matters for deserialization: integers that fit `i32` become
/// `Int`, larger ones `Long`, anything with a fraction `Float`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PreferenceValue {
    Bool(bool),
    Int(i32),
    Long(i64),
    Float(f64),
    Text(String),
}

impl PreferenceValue {
    /// Infer the type of a stored string
    ///
    /// `true`/`false`, then `i32`, then `i64`, then finite float; anything
    /// else stays text.
    pub fn coerce(raw: &str) -> Self {
        match raw {
            "true" => return Self::Bool(true),
            "false" => return Self::Bool(false),
            _ => {}
        }
        if let Ok(v) = raw.parse::<i32>() {
            return Self::Int(v);
        }
        if let Ok(v) = raw.parse::<i64>() {
            return Self::Long(v);
        }
        match raw.parse::<f64>() {
            Ok(v) if v.is_finite() => Self::Float(v),
            _ => Self::Text(raw.to_string()),
        }
    }

    /// Parse a stored string as a declared type
    pub fn parse_as(kind: PreferenceType, raw: &str) -> Option<Self> {
        match kind {
            PreferenceType::Bool => raw.parse().ok().map(Self::Bool),
            PreferenceType::Int => raw.parse().ok().map(Self::Int),
            PreferenceType::Long => raw.parse().ok().map(Self::Long),
            PreferenceType::Float => raw
                .parse::<f64>()
                .ok()
                .filter(|v| v.is_finite())
                .map(Self::Float),
            PreferenceType::Text => Some(Self::Text(raw.to_string())),
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Int(v) => Some(i64::from(*v)),
            Self::Long(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Int(v) => Some(f64::from(*v)),
            Self::Long(v) => Some(*v as f64),
            Self::Float(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Text(v) => Some(v),
            _ => None,
        }
    }
}

impl fmt::Display for PreferenceValue {
    /// Floats always carry a fractional part, so they read back as floats
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(v) => write!(f, "{}", v),
            Self::Int(v) => write!(f, "{}", v),
            Self::Long(v) => write!(f, "{}", v),
            Self::Float(v) => {
                let text = v.to_string();
                if text.contains(['.', 'e', 'E']) || !v.is_finite() {
                    write!(f, "{}", text)
                } else {
                    write!(f, "{}.0", text)
                }
            }
            Self::Text(v) => write!(f, "{}", v),
        }
    }
}
