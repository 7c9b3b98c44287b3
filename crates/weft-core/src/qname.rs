// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Qualified name composition.
//!
//! Qualified names are opaque strings. The core only joins segments with the
//! separator a backend declares and never validates the result.

use parking_lot::Mutex;

use crate::error::{Capability, ConnectorError, ConnectorResult};

/// Default separator for hierarchical names.
pub const DEFAULT_SEPARATOR: &str = "/";

/// Joins the non-empty `segments` with `separator`.
///
/// # Examples
///
/// ```
/// use weft_core::qname::compose;
///
/// assert_eq!(compose("/", &["machine", "", "speed"]), "machine/speed");
/// assert_eq!(compose(".", &[]), "");
/// ```
pub fn compose(separator: &str, segments: &[&str]) -> String {
    let mut result = String::new();
    for segment in segments.iter().filter(|s| !s.is_empty()) {
        if !result.is_empty() {
            result.push_str(separator);
        }
        result.push_str(segment);
    }
    result
}

/// Splits a qualified name into its non-empty segments.
pub fn split<'a>(separator: &str, qname: &'a str) -> Vec<&'a str> {
    if separator.is_empty() {
        return vec![qname];
    }
    qname.split(separator).filter(|s| !s.is_empty()).collect()
}

// =============================================================================
// NameScope
// =============================================================================

/// Prefix stack for backends with nested name scopes.
///
/// Backends supporting `step_into`/`step_out` keep one of these and qualify
/// every incoming name against the current scope.
#[derive(Debug)]
pub struct NameScope {
    separator: String,
    stack: Mutex<Vec<String>>,
}

impl NameScope {
    /// Creates an empty scope using `separator`.
    pub fn new(separator: impl Into<String>) -> Self {
        Self {
            separator: separator.into(),
            stack: Mutex::new(Vec::new()),
        }
    }

    /// Enters the child scope `name`.
    pub fn step_into(&self, name: &str) {
        self.stack.lock().push(name.to_string());
    }

    /// Leaves the current scope.
    ///
    /// # Errors
    ///
    /// Fails with an I/O error if already at top level.
    pub fn step_out(&self) -> ConnectorResult<()> {
        self.stack
            .lock()
            .pop()
            .map(|_| ())
            .ok_or_else(|| ConnectorError::io("Cannot step out of the top level scope"))
    }

    /// Returns the current prefix.
    pub fn prefix(&self) -> String {
        let stack = self.stack.lock();
        let segments: Vec<&str> = stack.iter().map(String::as_str).collect();
        compose(&self.separator, &segments)
    }

    /// Qualifies `name` against the current scope.
    pub fn qualify(&self, name: &str) -> String {
        compose(&self.separator, &[&self.prefix(), name])
    }

    /// Returns the nesting depth.
    pub fn depth(&self) -> usize {
        self.stack.lock().len()
    }
}

/// Error returned by backends without nested scopes.
pub fn no_nested_scopes() -> ConnectorError {
    ConnectorError::unsupported(Capability::NestedScopes)
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compose_skips_empty_segments() {
        assert_eq!(compose("_", &["", "a", "", "b", ""]), "a_b");
        assert_eq!(compose("/", &["only"]), "only");
    }

    #[test]
    fn test_split() {
        assert_eq!(split("/", "/a//b/"), vec!["a", "b"]);
        assert_eq!(split("", "a/b"), vec!["a/b"]);
    }

    #[test]
    fn test_name_scope() {
        let scope = NameScope::new("/");
        assert_eq!(scope.qualify("speed"), "speed");

        scope.step_into("line1");
        scope.step_into("drive");
        assert_eq!(scope.qualify("speed"), "line1/drive/speed");
        assert_eq!(scope.depth(), 2);

        scope.step_out().unwrap();
        assert_eq!(scope.prefix(), "line1");
        scope.step_out().unwrap();
        assert!(scope.step_out().is_err());
    }
}
