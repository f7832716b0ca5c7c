//! Structural comparison of semi-structured query results.
//!
//! [`equal`] decides whether two values are the same tree.
//! [`diff`] lists the leaves whose value changed, indexed by their [`FieldPath`].
//! Keys or items present on one side only make the values unequal but are not listed.

use serde_json::Value;
use std::fmt;

/// A step inside a JSON tree.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum PathSegment {
    Key(String),
    Index(usize),
}

impl fmt::Display for PathSegment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Key(key) => f.write_str(key),
            Self::Index(index) => index.fmt(f),
        }
    }
}

/// The location of a field from the root of a JSON tree, displayed as `results/bindings/0/x`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct FieldPath(Vec<PathSegment>);

impl FieldPath {
    pub fn segments(&self) -> &[PathSegment] {
        &self.0
    }

    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<Vec<PathSegment>> for FieldPath {
    fn from(segments: Vec<PathSegment>) -> Self {
        Self(segments)
    }
}

impl fmt::Display for FieldPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            return f.write_str("/");
        }
        for (i, segment) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str("/")?;
            }
            segment.fmt(f)?;
        }
        Ok(())
    }
}

/// A value that changed between the expected and the found tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldDiff {
    pub path: FieldPath,
    pub expected: Value,
    pub found: Value,
}

impl fmt::Display for FieldDiff {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "found `{}` but `{}` was expected at `{}`",
            self.found, self.expected, self.path
        )
    }
}

pub fn equal(expected: &Value, actual: &Value) -> bool {
    expected == actual
}

pub fn diff(expected: &Value, actual: &Value) -> Vec<FieldDiff> {
    let mut differences = Vec::new();
    diff_into(&mut Vec::new(), expected, actual, &mut differences);
    differences
}

fn diff_into(
    path: &mut Vec<PathSegment>,
    expected: &Value,
    actual: &Value,
    differences: &mut Vec<FieldDiff>,
) {
    match (expected, actual) {
        (Value::Object(expected), Value::Object(actual)) => {
            for (key, expected_value) in expected {
                if let Some(actual_value) = actual.get(key) {
                    path.push(PathSegment::Key(key.clone()));
                    diff_into(path, expected_value, actual_value, differences);
                    path.pop();
                }
            }
        }
        (Value::Array(expected), Value::Array(actual)) => {
            for (index, (expected_value, actual_value)) in expected.iter().zip(actual).enumerate() {
                path.push(PathSegment::Index(index));
                diff_into(path, expected_value, actual_value, differences);
                path.pop();
            }
        }
        (expected, actual) => {
            if expected != actual {
                differences.push(FieldDiff {
                    path: FieldPath(path.clone()),
                    expected: expected.clone(),
                    found: actual.clone(),
                });
            }
        }
    }
}
