//! Service name to record name mapping

use super::Zone;
use crate::traits::RecordType;

/// A record a service publishes
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TargetRecord {
    /// Normalized fully-qualified record name
    pub fqdn: String,
    /// Record type
    pub record_type: RecordType,
}

/// Flattened name for `service` under `root`
///
/// "app" + "zone.example.com" -> "app-zone.example.com". A single-label root
/// falls back to "app-root".
pub fn prefixed_service_name(service: &str, root: &str) -> String {
    match root.split_once('.') {
        Some((zone_label, parent)) => format!("{}-{}.{}", service, zone_label, parent),
        None => format!("{}-{}", service, root),
    }
}

impl Zone {
    /// FQDN a service is published under
    pub fn service_fqdn(&self, service: &str) -> String {
        let service = service.to_ascii_lowercase();
        if self.prefix_mode {
            prefixed_service_name(&service, &self.root)
        } else {
            format!("{}.{}", service, self.root)
        }
    }

    /// Records a service publishes, one per address family
    pub fn map_service_name(&self, service: &str) -> Vec<TargetRecord> {
        let fqdn = self.service_fqdn(service);
        RecordType::ALL
            .iter()
            .map(|record_type| TargetRecord {
                fqdn: fqdn.clone(),
                record_type: *record_type,
            })
            .collect()
    }
}
