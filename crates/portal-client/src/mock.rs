//! In-memory portal for tests and dry runs

use crate::api::PortalApi;
use async_trait::async_trait;
use common::{AppliedModule, Error, InstancePatch, InstanceState, ModuleInstance, Result};
use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

/// A call received by [`MockPortalApi`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PortalCall {
    ListAppliedModules {
        device_id: u64,
        batch_size: u64,
    },
    ListInstances {
        device_id: u64,
        module_id: u64,
        filter: Option<String>,
    },
    PatchInstance {
        device_id: u64,
        module_id: u64,
        instance_id: u64,
        patch: InstancePatch,
    },
}

/// Mock portal for testing
///
/// Serves scripted modules and instances and records every call in order.
#[derive(Default)]
pub struct MockPortalApi {
    modules: HashMap<u64, Vec<AppliedModule>>,
    instances: HashMap<(u64, u64), Vec<ModuleInstance>>,
    filtered_instances: HashMap<(u64, u64, String), Vec<ModuleInstance>>,
    failing_instances: HashSet<u64>,
    fail_module_listing: bool,
    fail_instance_listing: bool,
    calls: Mutex<Vec<PortalCall>>,
}

impl MockPortalApi {
    /// Create an empty mock portal
    pub fn new() -> Self {
        Self::default()
    }

    /// Modules applied to a device
    pub fn with_modules(mut self, device_id: u64, modules: Vec<AppliedModule>) -> Self {
        self.modules.insert(device_id, modules);
        self
    }

    /// Instances returned for an unfiltered (or unmatched) listing
    pub fn with_instances(mut self, device_id: u64, module_id: u64, instances: Vec<ModuleInstance>) -> Self {
        self.instances.insert((device_id, module_id), instances);
        self
    }

    /// Instances returned when the listing carries exactly this (escaped) filter
    pub fn with_filtered_instances(
        mut self,
        device_id: u64,
        module_id: u64,
        filter: &str,
        instances: Vec<ModuleInstance>,
    ) -> Self {
        self.filtered_instances
            .insert((device_id, module_id, filter.to_string()), instances);
        self
    }

    /// PATCH of this instance id answers with a server error
    pub fn with_failing_instance(mut self, instance_id: u64) -> Self {
        self.failing_instances.insert(instance_id);
        self
    }

    /// Applied-module listing answers with a server error
    pub fn with_failing_module_listing(mut self) -> Self {
        self.fail_module_listing = true;
        self
    }

    /// Instance listing answers with a server error
    pub fn with_failing_instance_listing(mut self) -> Self {
        self.fail_instance_listing = true;
        self
    }

    /// Every call received so far, in order
    pub fn calls(&self) -> Vec<PortalCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn module_list_calls(&self) -> usize {
        self.count(|c| matches!(c, PortalCall::ListAppliedModules { .. }))
    }

    pub fn instance_list_calls(&self) -> usize {
        self.count(|c| matches!(c, PortalCall::ListInstances { .. }))
    }

    pub fn patch_calls(&self) -> usize {
        self.count(|c| matches!(c, PortalCall::PatchInstance { .. }))
    }

    fn count(&self, pred: impl Fn(&PortalCall) -> bool) -> usize {
        self.calls.lock().unwrap().iter().filter(|c| pred(*c)).count()
    }

    fn record(&self, call: PortalCall) {
        self.calls.lock().unwrap().push(call);
    }
}

#[async_trait]
impl PortalApi for MockPortalApi {
    async fn list_applied_modules(&self, device_id: u64, batch_size: u64) -> Result<Vec<AppliedModule>> {
        self.record(PortalCall::ListAppliedModules {
            device_id,
            batch_size,
        });
        if self.fail_module_listing {
            return Err(Error::api(500, "module listing failed"));
        }
        Ok(self.modules.get(&device_id).cloned().unwrap_or_default())
    }

    async fn list_instances(
        &self,
        device_id: u64,
        module_id: u64,
        filter: Option<&str>,
    ) -> Result<Vec<ModuleInstance>> {
        self.record(PortalCall::ListInstances {
            device_id,
            module_id,
            filter: filter.map(str::to_string),
        });
        if self.fail_instance_listing {
            return Err(Error::api(500, "instance listing failed"));
        }
        if let Some(filter) = filter {
            if let Some(found) = self
                .filtered_instances
                .get(&(device_id, module_id, filter.to_string()))
            {
                return Ok(found.clone());
            }
        }
        Ok(self
            .instances
            .get(&(device_id, module_id))
            .cloned()
            .unwrap_or_default())
    }

    async fn patch_instance(
        &self,
        device_id: u64,
        module_id: u64,
        instance_id: u64,
        patch: &InstancePatch,
    ) -> Result<InstanceState> {
        self.record(PortalCall::PatchInstance {
            device_id,
            module_id,
            instance_id,
            patch: *patch,
        });
        if self.failing_instances.contains(&instance_id) {
            return Err(Error::api(500, format!("instance {} update failed", instance_id)));
        }
        Ok(InstanceState {
            disable_alerting: patch.disable_alerting,
            stop_monitoring: patch.stop_monitoring.unwrap_or(false),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::MutationAction;

    fn instance(id: u64) -> ModuleInstance {
        ModuleInstance {
            id,
            display_name: format!("inst-{}", id),
            disable_alerting: true,
            stop_monitoring: true,
        }
    }

    #[tokio::test]
    async fn test_mock_records_calls() {
        let api = MockPortalApi::new().with_instances(1, 2, vec![instance(3)]);

        let listed = api.list_instances(1, 2, None).await.unwrap();
        assert_eq!(listed.len(), 1);

        let patch = InstancePatch::new(MutationAction::Enable, false);
        let state = api.patch_instance(1, 2, 3, &patch).await.unwrap();
        assert!(state.alerting_enabled());

        assert_eq!(api.instance_list_calls(), 1);
        assert_eq!(api.patch_calls(), 1);
        assert_eq!(
            api.calls()[1],
            PortalCall::PatchInstance {
                device_id: 1,
                module_id: 2,
                instance_id: 3,
                patch
            }
        );
    }

    #[tokio::test]
    async fn test_mock_filtered_listing() {
        let api = MockPortalApi::new()
            .with_instances(1, 2, vec![instance(3), instance(4)])
            .with_filtered_instances(1, 2, r#"name:"x""#, vec![instance(4)]);

        assert_eq!(api.list_instances(1, 2, Some(r#"name:"x""#)).await.unwrap().len(), 1);
        assert_eq!(api.list_instances(1, 2, Some(r#"name:"y""#)).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_mock_failures() {
        let api = MockPortalApi::new()
            .with_failing_module_listing()
            .with_failing_instance(9);

        assert!(api.list_applied_modules(1, 50).await.is_err());
        let patch = InstancePatch::new(MutationAction::Disable, true);
        assert!(api.patch_instance(1, 2, 9, &patch).await.is_err());
    }
}
