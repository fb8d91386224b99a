//! Domain scope validation
//!
//! Every mutation passes through [`Zone::validate`] before a provider call is
//! made. A denial is a security event, not an input error.

use super::{Zone, normalize_name};
use crate::error::{Error, Result};

/// `name` equals `domain` or sits below it on a label boundary
fn is_within(name: &str, domain: &str) -> bool {
    if domain.is_empty() {
        return false;
    }
    name == domain
        || name
            .strip_suffix(domain)
            .is_some_and(|head| head.ends_with('.') && head.len() > 1)
}

impl Zone {
    /// Whether `name` may be mutated under this zone
    pub fn is_in_scope(&self, name: &str) -> bool {
        let name = normalize_name(name);
        if name.is_empty() || name.chars().any(char::is_whitespace) {
            return false;
        }

        if is_within(&name, &self.root) {
            return true;
        }

        self.has_distinct_base() && is_within(&name, &self.base)
    }

    /// Check that `name` may be mutated under this zone
    ///
    /// Returns [`Error::ScopeDenied`] otherwise. The check is case-insensitive
    /// and ignores a trailing dot.
    pub fn validate(&self, name: &str) -> Result<()> {
        if self.is_in_scope(name) {
            tracing::debug!(name, root = %self.root, "Record name in scope");
            return Ok(());
        }

        Err(Error::scope_denied(name, &self.root, &self.base))
    }
}
