//! Managed-record ownership test
//!
//! Decides from name shape alone whether a record was created by this engine.
//! Stale-record cleanup relies on this predicate and nothing else.

use super::{Zone, normalize_name};

impl Zone {
    /// Whether `fqdn` is a record this engine manages
    ///
    /// - Never the root or base domain itself.
    /// - Direct: any strict subdomain of the root.
    /// - Prefix mode: additionally `<label>-<zone>.<base>` where `<label>` is a
    ///   single non-empty label.
    pub fn is_managed(&self, fqdn: &str) -> bool {
        let fqdn = normalize_name(fqdn);

        if fqdn.is_empty() || fqdn == self.root || fqdn == self.base {
            return false;
        }

        if fqdn
            .strip_suffix(&self.root)
            .is_some_and(|head| head.ends_with('.') && head.len() > 1)
        {
            return true;
        }

        if self.has_distinct_base() {
            let suffix = format!("-{}.{}", self.zone_label, self.base);
            if let Some(service) = fqdn.strip_suffix(&suffix) {
                return !service.is_empty() && !service.contains('.');
            }
        }

        false
    }
}
