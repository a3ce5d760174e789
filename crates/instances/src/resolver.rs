//! Module resolution
//!
//! Selectors are evaluated in two passes, names first and then ids. Every
//! selector is tried on its own; matches are unioned by device-scoped id so a
//! module selected both ways is processed once.

use common::{AppliedModule, ModuleSelector};
use tracing::{info, warn};

/// Result of matching selectors against a device's applied modules
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Resolution {
    /// Matched modules in selection order, unique by id
    pub modules: Vec<AppliedModule>,
    /// Selectors that matched nothing
    pub misses: Vec<ModuleSelector>,
    /// Number of selectors that matched at least one module
    pub found: usize,
}

impl Resolution {
    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }

    fn add(&mut self, module: &AppliedModule) {
        if !self.modules.iter().any(|m| m.id == module.id) {
            self.modules.push(module.clone());
        }
    }
}

/// Match `selectors` against `applied`
///
/// A selector with no match is logged and skipped. When several modules on
/// the device share a name, all of them are selected.
pub fn resolve(applied: &[AppliedModule], selectors: &[ModuleSelector]) -> Resolution {
    let mut resolution = Resolution::default();

    let by_name = selectors
        .iter()
        .filter(|s| matches!(s, ModuleSelector::ByName(_)));
    let by_id = selectors
        .iter()
        .filter(|s| matches!(s, ModuleSelector::ById(_)));

    for selector in by_name.chain(by_id) {
        let matched: Vec<&AppliedModule> = applied.iter().filter(|m| selector.matches(m)).collect();

        if matched.is_empty() {
            info!(selector = %selector, "No applied module matches");
            resolution.misses.push(selector.clone());
            continue;
        }

        if matched.len() > 1 {
            let ids: Vec<u64> = matched.iter().map(|m| m.id).collect();
            warn!(selector = %selector, ?ids, "Several applied modules share this name, selecting all");
        }

        resolution.found += 1;
        for module in matched {
            info!(
                module_id = module.id,
                module = %module.data_source_name,
                instances = module.instance_number,
                "Resolved applied module"
            );
            resolution.add(module);
        }
    }

    resolution
}

#[cfg(test)]
mod tests {
    use super::*;

    fn module(id: u64, name: &str, instances: u64) -> AppliedModule {
        AppliedModule {
            id,
            data_source_id: Some(id + 10_000),
            data_source_name: name.to_string(),
            data_source_display_name: None,
            instance_number: instances,
        }
    }

    fn applied() -> Vec<AppliedModule> {
        vec![
            module(11, "snmp64_if-", 5),
            module(12, "Ping", 1),
            module(1234, "HostStatus", 1),
        ]
    }

    #[test]
    fn test_resolve_by_name() {
        let resolution = resolve(&applied(), &[ModuleSelector::ByName("snmp64_if-".to_string())]);

        assert_eq!(resolution.found, 1);
        assert_eq!(resolution.modules.len(), 1);
        assert_eq!(resolution.modules[0].id, 11);
        assert!(resolution.misses.is_empty());
    }

    #[test]
    fn test_resolve_by_device_scoped_id() {
        let resolution = resolve(&applied(), &[ModuleSelector::ById(1234)]);
        assert_eq!(resolution.modules[0].data_source_name, "HostStatus");

        // catalog ids never match
        let resolution = resolve(&applied(), &[ModuleSelector::ById(11_234)]);
        assert!(resolution.is_empty());
    }

    #[test]
    fn test_unknown_name_is_a_miss_not_an_error() {
        let resolution = resolve(&applied(), &[ModuleSelector::ByName("NoSuchModule".to_string())]);

        assert_eq!(resolution.found, 0);
        assert!(resolution.is_empty());
        assert_eq!(resolution.misses, vec![ModuleSelector::ByName("NoSuchModule".to_string())]);
    }

    #[test]
    fn test_name_match_is_exact() {
        let resolution = resolve(&applied(), &[ModuleSelector::ByName("ping".to_string())]);
        assert!(resolution.is_empty());
    }

    #[test]
    fn test_each_selector_counts_independently() {
        let selectors = vec![
            ModuleSelector::ById(12),
            ModuleSelector::ByName("missing".to_string()),
            ModuleSelector::ByName("snmp64_if-".to_string()),
        ];
        let resolution = resolve(&applied(), &selectors);

        assert_eq!(resolution.found, 2);
        assert_eq!(resolution.misses.len(), 1);
        // names are evaluated before ids
        let ids: Vec<u64> = resolution.modules.iter().map(|m| m.id).collect();
        assert_eq!(ids, vec![11, 12]);
    }

    #[test]
    fn test_name_and_id_for_same_module_deduplicated() {
        let selectors = vec![
            ModuleSelector::ByName("Ping".to_string()),
            ModuleSelector::ById(12),
        ];
        let resolution = resolve(&applied(), &selectors);

        assert_eq!(resolution.found, 2);
        assert_eq!(resolution.modules.len(), 1);
    }

    #[test]
    fn test_duplicate_names_select_all() {
        let mut modules = applied();
        modules.push(module(13, "Ping", 2));

        let resolution = resolve(&modules, &[ModuleSelector::ByName("Ping".to_string())]);

        assert_eq!(resolution.found, 1);
        let ids: Vec<u64> = resolution.modules.iter().map(|m| m.id).collect();
        assert_eq!(ids, vec![12, 13]);
    }

    #[test]
    fn test_zero_instance_module_still_resolves() {
        let modules = vec![module(20, "Idle", 0)];
        let resolution = resolve(&modules, &[ModuleSelector::ByName("Idle".to_string())]);

        assert_eq!(resolution.modules.len(), 1);
        assert!(!resolution.modules[0].has_instances());
    }
}
