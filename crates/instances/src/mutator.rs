//! Instance mutation for one resolved module
//!
//! Instances are listed once (a single page, optionally filtered) and then
//! patched one at a time. A failed PATCH is recorded against that instance and
//! the batch carries on; only a failed listing aborts.

use common::{AppliedModule, Device, InstancePatch, MutationAction, MutationResult, Result};
use observability::PortalMetrics;
use portal_client::{escape_filter, PortalApi};
use tracing::{error, info, warn};

/// What happened to one module's instances
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BatchOutcome {
    /// Every listed instance was attempted
    Completed(Vec<MutationResult>),
    /// The listing returned no instances, nothing was patched
    NoInstances,
}

/// Mutation batch for one applied module
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleBatch {
    pub module: AppliedModule,
    pub outcome: BatchOutcome,
}

impl ModuleBatch {
    /// Per-instance results, empty for [`BatchOutcome::NoInstances`]
    pub fn results(&self) -> &[MutationResult] {
        match &self.outcome {
            BatchOutcome::Completed(results) => results.as_slice(),
            BatchOutcome::NoInstances => &[],
        }
    }

    pub fn failed_count(&self) -> usize {
        self.results().iter().filter(|r| !r.is_success()).count()
    }

    /// True when instances were found and every PATCH succeeded
    pub fn is_success(&self) -> bool {
        match &self.outcome {
            BatchOutcome::Completed(results) => results.iter().all(MutationResult::is_success),
            BatchOutcome::NoInstances => false,
        }
    }
}

/// Applies one [`MutationAction`] to the instances of a module
pub struct InstanceMutator<'a> {
    api: &'a dyn PortalApi,
    action: MutationAction,
    alerting_only: bool,
    metrics: Option<&'a PortalMetrics>,
}

impl<'a> InstanceMutator<'a> {
    pub fn new(api: &'a dyn PortalApi, action: MutationAction, alerting_only: bool) -> Self {
        Self {
            api,
            action,
            alerting_only,
            metrics: None,
        }
    }

    /// Count applied and failed updates in `instance_mutations_total`
    pub fn with_metrics(mut self, metrics: &'a PortalMetrics) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// List the module's instances and patch each of them
    ///
    /// `filter` is the raw filter expression; quoted literals are escaped
    /// here before it goes on the wire. Returns `Err` only when the listing
    /// itself fails.
    pub async fn apply(
        &self,
        device: &Device,
        module: &AppliedModule,
        filter: Option<&str>,
    ) -> Result<ModuleBatch> {
        let escaped = filter.map(escape_filter).filter(|f| !f.is_empty());

        let instances = self
            .api
            .list_instances(device.id, module.id, escaped.as_deref())
            .await?;

        if instances.is_empty() {
            warn!(
                device_id = device.id,
                module_id = module.id,
                filter = escaped.as_deref().unwrap_or(""),
                "No instances returned for module"
            );
            return Ok(ModuleBatch {
                module: module.clone(),
                outcome: BatchOutcome::NoInstances,
            });
        }

        info!(
            module_id = module.id,
            count = instances.len(),
            action = %self.action,
            "Updating instances"
        );

        let patch = InstancePatch::new(self.action, self.alerting_only);
        let mut results = Vec::with_capacity(instances.len());

        for instance in &instances {
            let result = match self
                .api
                .patch_instance(device.id, module.id, instance.id, &patch)
                .await
            {
                Ok(state) => {
                    info!(
                        instance_id = instance.id,
                        instance = %instance.display_name,
                        alerting_enabled = state.alerting_enabled(),
                        monitoring_enabled = state.monitoring_enabled(),
                        "Instance updated"
                    );
                    MutationResult::applied(instance, state)
                }
                Err(e) => {
                    error!(
                        instance_id = instance.id,
                        instance = %instance.display_name,
                        error = %e,
                        "Instance update failed"
                    );
                    MutationResult::failed(instance, e.to_string())
                }
            };

            if let Some(metrics) = self.metrics {
                metrics.record_mutation(result.is_success());
            }
            results.push(result);
        }

        Ok(ModuleBatch {
            module: module.clone(),
            outcome: BatchOutcome::Completed(results),
        })
    }
}
