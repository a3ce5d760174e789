//! Enable/disable workflow - the entry point for one device
//!
//! Drives validation, module listing, resolution and per-module mutation,
//! and folds everything into a [`WorkflowReport`] whose exit code is the
//! process status.

use crate::mutator::{BatchOutcome, InstanceMutator, ModuleBatch};
use crate::resolver::resolve;
use common::{AppliedModule, Device, DeviceRef, Error, ModuleSelector, MutationAction, Result};
use observability::PortalMetrics;
use portal_client::{PortalApi, MAX_BATCH_SIZE};
use std::sync::Arc;
use tracing::{error, info, info_span, warn, Instrument};
use uuid::Uuid;

/// Stages of one run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkflowState {
    Idle,
    Validating,
    ResolvingDevice,
    FetchingModules,
    ResolvingModule,
    FetchingInstances,
    MutatingInstances,
    Done,
    /// No selector matched an applied module
    NoOpCompleted,
    Failed,
}

impl WorkflowState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            WorkflowState::Done | WorkflowState::NoOpCompleted | WorkflowState::Failed
        )
    }
}

/// Caller input for one run
#[derive(Debug, Clone)]
pub struct WorkflowRequest {
    pub device: DeviceRef,
    pub selectors: Vec<ModuleSelector>,
    /// Raw filter expression, escaped before use
    pub filter: Option<String>,
    pub alerting_only: bool,
    pub action: MutationAction,
    pub batch_size: u64,
}

impl WorkflowRequest {
    pub fn new(device: DeviceRef, selectors: Vec<ModuleSelector>) -> Self {
        Self {
            device,
            selectors,
            filter: None,
            alerting_only: false,
            action: MutationAction::Enable,
            batch_size: MAX_BATCH_SIZE,
        }
    }

    pub fn with_filter(mut self, filter: impl Into<String>) -> Self {
        self.filter = Some(filter.into());
        self
    }

    pub fn with_action(mut self, action: MutationAction) -> Self {
        self.action = action;
        self
    }

    pub fn alerting_only(mut self, alerting_only: bool) -> Self {
        self.alerting_only = alerting_only;
        self
    }

    pub fn with_batch_size(mut self, batch_size: u64) -> Self {
        self.batch_size = batch_size;
        self
    }

    /// Checks that need no network access
    pub fn validate(&self) -> Result<()> {
        if self.selectors.is_empty() {
            return Err(Error::invalid_input(
                "at least one module name or module id is required",
            ));
        }
        if self
            .selectors
            .iter()
            .any(|s| matches!(s, ModuleSelector::ByName(name) if name.trim().is_empty()))
        {
            return Err(Error::invalid_input("module name must not be empty"));
        }
        if self.batch_size == 0 || self.batch_size > MAX_BATCH_SIZE {
            return Err(Error::invalid_input(format!(
                "batch size must be between 1 and {}, got {}",
                MAX_BATCH_SIZE, self.batch_size
            )));
        }
        Ok(())
    }
}

/// Everything a run did, in order
#[derive(Debug, Clone)]
pub struct WorkflowReport {
    pub run_id: Uuid,
    pub action: MutationAction,
    pub device: Option<Device>,
    pub state: WorkflowState,
    /// Every state entered, starting with `Idle`
    pub history: Vec<WorkflowState>,
    pub batches: Vec<ModuleBatch>,
    /// Resolved modules reporting zero instances; never listed, and any entry
    /// makes the run exit non-zero
    pub skipped: Vec<AppliedModule>,
    pub misses: Vec<ModuleSelector>,
    /// Set when the run ended in `Failed`
    pub error: Option<String>,
}

impl WorkflowReport {
    fn new(action: MutationAction) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            action,
            device: None,
            state: WorkflowState::Idle,
            history: vec![WorkflowState::Idle],
            batches: Vec::new(),
            skipped: Vec::new(),
            misses: Vec::new(),
            error: None,
        }
    }

    fn enter(&mut self, state: WorkflowState) {
        if self.state != state {
            self.state = state;
            self.history.push(state);
        }
    }

    fn fail(&mut self, e: &Error) {
        self.error = Some(e.to_string());
        self.enter(WorkflowState::Failed);
    }

    pub fn applied_count(&self) -> usize {
        self.batches
            .iter()
            .map(|b| b.results().iter().filter(|r| r.is_success()).count())
            .sum()
    }

    pub fn failed_count(&self) -> usize {
        self.batches.iter().map(ModuleBatch::failed_count).sum()
    }

    /// 0 when nothing matched, or when every resolved module had instances
    /// and every mutation succeeded; 1 otherwise
    pub fn exit_code(&self) -> i32 {
        match self.state {
            WorkflowState::NoOpCompleted => 0,
            WorkflowState::Done
                if self.skipped.is_empty() && self.batches.iter().all(ModuleBatch::is_success) =>
            {
                0
            }
            _ => 1,
        }
    }
}

/// Runs enable/disable requests against a portal
pub struct InstanceWorkflow {
    api: Arc<dyn PortalApi>,
    metrics: Option<PortalMetrics>,
}

impl InstanceWorkflow {
    pub fn new(api: Arc<dyn PortalApi>) -> Self {
        Self { api, metrics: None }
    }

    pub fn with_metrics(mut self, metrics: PortalMetrics) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Execute one run
    ///
    /// Flow:
    /// 1. Validate the request (no network on failure)
    /// 2. Resolve the device reference
    /// 3. List every applied module, paged
    /// 4. Resolve selectors; nothing matched ends in `NoOpCompleted`
    /// 5. For each module with instances: list instances and patch them.
    ///    A module reporting zero instances is skipped and fails the run.
    pub async fn run(&self, request: WorkflowRequest) -> WorkflowReport {
        let mut report = WorkflowReport::new(request.action);
        let span = info_span!(
            "workflow",
            run_id = %report.run_id,
            action = %request.action,
            device_id = tracing::field::Empty
        );

        async {
            if let Err(e) = self.execute(&request, &mut report).await {
                error!(state = ?report.state, error = %e, "Workflow failed");
                report.fail(&e);
            }

            info!(
                state = ?report.state,
                modules = report.batches.len(),
                skipped = report.skipped.len(),
                misses = report.misses.len(),
                applied = report.applied_count(),
                failed = report.failed_count(),
                exit_code = report.exit_code(),
                "Workflow finished"
            );
        }
        .instrument(span)
        .await;

        report
    }

    async fn execute(&self, request: &WorkflowRequest, report: &mut WorkflowReport) -> Result<()> {
        report.enter(WorkflowState::Validating);
        request.validate()?;

        report.enter(WorkflowState::ResolvingDevice);
        let device = request.device.clone().resolve()?;
        tracing::Span::current().record("device_id", device.id);
        info!(device = %device.label(), "Device resolved");
        report.device = Some(device.clone());

        report.enter(WorkflowState::FetchingModules);
        let applied = self
            .api
            .list_applied_modules(device.id, request.batch_size)
            .await?;
        info!(count = applied.len(), "Applied modules listed");

        report.enter(WorkflowState::ResolvingModule);
        let resolution = resolve(&applied, &request.selectors);
        report.misses = resolution.misses;

        if resolution.modules.is_empty() {
            info!("No matching modules found, nothing to do");
            report.enter(WorkflowState::NoOpCompleted);
            return Ok(());
        }

        let mut mutator = InstanceMutator::new(self.api.as_ref(), request.action, request.alerting_only);
        if let Some(metrics) = &self.metrics {
            mutator = mutator.with_metrics(metrics);
        }

        for module in resolution.modules {
            if !module.has_instances() {
                warn!(
                    module_id = module.id,
                    module = %module.data_source_name,
                    "Module has no instances, skipping"
                );
                report.skipped.push(module);
                continue;
            }

            report.enter(WorkflowState::FetchingInstances);
            let batch = mutator
                .apply(&device, &module, request.filter.as_deref())
                .await?;

            if batch.outcome == BatchOutcome::NoInstances {
                warn!(module_id = module.id, "Instance query matched nothing");
            } else {
                report.enter(WorkflowState::MutatingInstances);
            }
            report.batches.push(batch);
        }

        report.enter(WorkflowState::Done);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::{ModuleInstance, MutationOutcome};
    use portal_client::{MockPortalApi, PortalCall};

    fn module(id: u64, name: &str, instances: u64) -> AppliedModule {
        AppliedModule {
            id,
            data_source_id: Some(id + 90_000),
            data_source_name: name.to_string(),
            data_source_display_name: None,
            instance_number: instances,
        }
    }

    fn instance(id: u64) -> ModuleInstance {
        ModuleInstance {
            id,
            display_name: format!("if-{}", id),
            disable_alerting: true,
            stop_monitoring: false,
        }
    }

    fn by_name(name: &str) -> Vec<ModuleSelector> {
        vec![ModuleSelector::ByName(name.to_string())]
    }

    async fn run(api: Arc<MockPortalApi>, request: WorkflowRequest) -> WorkflowReport {
        InstanceWorkflow::new(api).run(request).await
    }

    #[tokio::test]
    async fn test_single_module_five_instances() {
        let api = Arc::new(
            MockPortalApi::new()
                .with_modules(42, vec![module(11, "snmp64_if-", 5), module(12, "Ping", 1)])
                .with_instances(42, 11, (1..=5).map(instance).collect()),
        );

        let report = run(api.clone(), WorkflowRequest::new(DeviceRef::Id(42), by_name("snmp64_if-"))).await;

        assert_eq!(api.module_list_calls(), 1);
        assert_eq!(api.instance_list_calls(), 1);
        assert_eq!(api.patch_calls(), 5);
        assert_eq!(report.state, WorkflowState::Done);
        assert_eq!(report.applied_count(), 5);
        assert_eq!(report.exit_code(), 0);
        assert_eq!(
            report.history,
            vec![
                WorkflowState::Idle,
                WorkflowState::Validating,
                WorkflowState::ResolvingDevice,
                WorkflowState::FetchingModules,
                WorkflowState::ResolvingModule,
                WorkflowState::FetchingInstances,
                WorkflowState::MutatingInstances,
                WorkflowState::Done,
            ]
        );
    }

    #[tokio::test]
    async fn test_module_by_id_with_filter() {
        let api = Arc::new(
            MockPortalApi::new()
                .with_modules(42, vec![module(1234, "snmp64_if-", 4)])
                .with_instances(42, 1234, (1..=4).map(instance).collect())
                .with_filtered_instances(
                    42,
                    1234,
                    r#"description!~"uplink""#,
                    vec![instance(2), instance(3)],
                ),
        );
        let request = WorkflowRequest::new(DeviceRef::Id(42), vec![ModuleSelector::ById(1234)])
            .with_filter(r#"description!~"uplink""#);

        let report = run(api.clone(), request).await;

        assert_eq!(
            api.calls()[1],
            PortalCall::ListInstances {
                device_id: 42,
                module_id: 1234,
                filter: Some(r#"description!~"uplink""#.to_string()),
            }
        );
        let patched: Vec<u64> = api
            .calls()
            .iter()
            .filter_map(|c| match c {
                PortalCall::PatchInstance { instance_id, .. } => Some(*instance_id),
                _ => None,
            })
            .collect();
        assert_eq!(patched, vec![2, 3]);
        assert_eq!(report.exit_code(), 0);
    }

    #[tokio::test]
    async fn test_filter_with_reserved_characters_is_encoded() {
        let api = Arc::new(
            MockPortalApi::new()
                .with_modules(42, vec![module(1234, "snmp64_if-", 2)])
                .with_filtered_instances(42, 1234, r#"description!~"up%2Flink""#, vec![instance(9)]),
        );
        let request = WorkflowRequest::new(DeviceRef::Id(42), vec![ModuleSelector::ById(1234)])
            .with_filter(r#"description!~"up/link""#);

        let report = run(api.clone(), request).await;

        assert_eq!(report.applied_count(), 1);
        assert_eq!(report.exit_code(), 0);
    }

    #[tokio::test]
    async fn test_no_matching_module_is_benign() {
        let api = Arc::new(MockPortalApi::new().with_modules(42, vec![module(11, "snmp64_if-", 5)]));

        let report = run(api.clone(), WorkflowRequest::new(DeviceRef::Id(42), by_name("Missing"))).await;

        assert_eq!(report.state, WorkflowState::NoOpCompleted);
        assert_eq!(report.exit_code(), 0);
        assert_eq!(report.misses.len(), 1);
        assert_eq!(api.instance_list_calls(), 0);
        assert_eq!(api.patch_calls(), 0);
    }

    #[tokio::test]
    async fn test_patch_failure_sets_exit_status() {
        let api = Arc::new(
            MockPortalApi::new()
                .with_modules(42, vec![module(11, "snmp64_if-", 3)])
                .with_instances(42, 11, vec![instance(1), instance(2), instance(3)])
                .with_failing_instance(2),
        );

        let report = run(api.clone(), WorkflowRequest::new(DeviceRef::Id(42), by_name("snmp64_if-"))).await;

        assert_eq!(report.state, WorkflowState::Done);
        assert_eq!(api.patch_calls(), 3);
        let results = report.batches[0].results();
        assert_eq!(results.len(), 3);
        assert!(matches!(results[1].outcome, MutationOutcome::Failed(_)));
        assert_eq!(report.failed_count(), 1);
        assert_eq!(report.exit_code(), 1);
    }

    #[tokio::test]
    async fn test_module_listing_failure_is_terminal() {
        let api = Arc::new(MockPortalApi::new().with_failing_module_listing());

        let report = run(api.clone(), WorkflowRequest::new(DeviceRef::Id(42), by_name("Ping"))).await;

        assert_eq!(report.state, WorkflowState::Failed);
        assert!(report.error.is_some());
        assert_eq!(report.exit_code(), 1);
        assert_eq!(api.instance_list_calls(), 0);
    }

    #[tokio::test]
    async fn test_instance_listing_failure_stops_before_patching() {
        let api = Arc::new(
            MockPortalApi::new()
                .with_modules(42, vec![module(11, "snmp64_if-", 3), module(12, "Ping", 1)])
                .with_failing_instance_listing(),
        );
        let selectors = vec![
            ModuleSelector::ByName("snmp64_if-".to_string()),
            ModuleSelector::ByName("Ping".to_string()),
        ];

        let report = run(api.clone(), WorkflowRequest::new(DeviceRef::Id(42), selectors)).await;

        assert_eq!(report.state, WorkflowState::Failed);
        assert_eq!(report.exit_code(), 1);
        assert_eq!(api.instance_list_calls(), 1);
        assert_eq!(api.patch_calls(), 0);
    }

    #[tokio::test]
    async fn test_invalid_device_makes_no_calls() {
        let api = Arc::new(MockPortalApi::new());

        let report = run(api.clone(), WorkflowRequest::new(DeviceRef::Id(0), by_name("Ping"))).await;

        assert_eq!(report.state, WorkflowState::Failed);
        assert_eq!(report.exit_code(), 1);
        assert!(api.calls().is_empty());
    }

    #[tokio::test]
    async fn test_invalid_batch_size_makes_no_calls() {
        let api = Arc::new(MockPortalApi::new());
        let request = WorkflowRequest::new(DeviceRef::Id(42), by_name("Ping")).with_batch_size(0);

        let report = run(api.clone(), request).await;

        assert_eq!(report.state, WorkflowState::Failed);
        assert!(api.calls().is_empty());
        assert_eq!(report.history.last(), Some(&WorkflowState::Failed));
    }

    #[tokio::test]
    async fn test_zero_instance_module_sets_exit_status() {
        let api = Arc::new(
            MockPortalApi::new()
                .with_modules(42, vec![module(11, "Idle", 0), module(12, "Ping", 1)])
                .with_instances(42, 12, vec![instance(1)]),
        );
        let selectors = vec![
            ModuleSelector::ByName("Idle".to_string()),
            ModuleSelector::ByName("Ping".to_string()),
        ];

        let report = run(api.clone(), WorkflowRequest::new(DeviceRef::Id(42), selectors)).await;

        assert_eq!(report.skipped.len(), 1);
        assert_eq!(report.skipped[0].id, 11);
        assert_eq!(api.instance_list_calls(), 1);
        assert_eq!(report.applied_count(), 1);
        assert_eq!(report.exit_code(), 1);
    }

    #[tokio::test]
    async fn test_only_zero_instance_module_makes_no_instance_calls() {
        let api = Arc::new(MockPortalApi::new().with_modules(42, vec![module(11, "Idle", 0)]));

        let report = run(api.clone(), WorkflowRequest::new(DeviceRef::Id(42), by_name("Idle"))).await;

        assert_eq!(report.state, WorkflowState::Done);
        assert_eq!(report.skipped.len(), 1);
        assert!(report.batches.is_empty());
        assert_eq!(api.instance_list_calls(), 0);
        assert_eq!(api.patch_calls(), 0);
        assert_eq!(report.exit_code(), 1);
    }

    #[tokio::test]
    async fn test_empty_filtered_listing_sets_exit_status() {
        let api = Arc::new(
            MockPortalApi::new()
                .with_modules(42, vec![module(11, "snmp64_if-", 3)])
                .with_filtered_instances(42, 11, r#"displayName:"none""#, vec![]),
        );
        let request = WorkflowRequest::new(DeviceRef::Id(42), by_name("snmp64_if-"))
            .with_filter(r#"displayName:"none""#);

        let report = run(api.clone(), request).await;

        assert_eq!(report.state, WorkflowState::Done);
        assert_eq!(report.batches[0].outcome, BatchOutcome::NoInstances);
        assert_eq!(api.patch_calls(), 0);
        assert_eq!(report.exit_code(), 1);
    }

    #[tokio::test]
    async fn test_device_object_and_disable_action() {
        let api = Arc::new(
            MockPortalApi::new()
                .with_modules(7, vec![module(3, "Ping", 1)])
                .with_instances(7, 3, vec![instance(1)]),
        );
        let device = DeviceRef::from_json(r#"{"id": 7, "displayName": "core-sw-01"}"#).unwrap();
        let request = WorkflowRequest::new(device, by_name("Ping"))
            .with_action(MutationAction::Disable)
            .alerting_only(true);

        let report = run(api.clone(), request).await;

        assert_eq!(report.device.as_ref().and_then(|d| d.display_name.as_deref()), Some("core-sw-01"));
        assert!(matches!(
            &api.calls()[2],
            PortalCall::PatchInstance { patch, .. }
                if patch.disable_alerting && patch.stop_monitoring.is_none()
        ));
        assert_eq!(report.exit_code(), 0);
    }

    #[test]
    fn test_request_validation() {
        assert!(WorkflowRequest::new(DeviceRef::Id(1), vec![]).validate().is_err());
        assert!(WorkflowRequest::new(DeviceRef::Id(1), by_name(" ")).validate().is_err());
        assert!(WorkflowRequest::new(DeviceRef::Id(1), by_name("Ping"))
            .with_batch_size(1001)
            .validate()
            .is_err());
        assert!(WorkflowRequest::new(DeviceRef::Id(1), by_name("Ping")).validate().is_ok());
    }
}
