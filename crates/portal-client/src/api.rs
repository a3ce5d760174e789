//! Portal operations used by the instance workflow
//!
//! [`PortalApi`] is the seam between the workflow and the network. The HTTP
//! implementation lives here; [`crate::mock::MockPortalApi`] serves tests.

use crate::client::{paths, HttpPortalClient};
use crate::paging::{fetch_all, Page, PageSource};
use async_trait::async_trait;
use common::{AppliedModule, InstancePatch, InstanceState, ModuleInstance, Result};
use serde_json::Value;
use tracing::{debug, warn};

/// Client trait for the portal - transport agnostic
#[async_trait]
pub trait PortalApi: Send + Sync {
    /// List every module applied to a device, paging with `batch_size`
    async fn list_applied_modules(&self, device_id: u64, batch_size: u64) -> Result<Vec<AppliedModule>>;

    /// List instances of one applied module
    ///
    /// A single page is requested. `filter` must already be escaped
    /// (see [`crate::filter::escape_filter`]) and is sent verbatim.
    async fn list_instances(
        &self,
        device_id: u64,
        module_id: u64,
        filter: Option<&str>,
    ) -> Result<Vec<ModuleInstance>>;

    /// Update alerting/monitoring flags of one instance and return the echoed state
    async fn patch_instance(
        &self,
        device_id: u64,
        module_id: u64,
        instance_id: u64,
        patch: &InstancePatch,
    ) -> Result<InstanceState>;
}

/// Applied modules of one device, served page by page
struct AppliedModulePages<'a> {
    client: &'a HttpPortalClient,
    device_id: u64,
}

#[async_trait]
impl PageSource<AppliedModule> for AppliedModulePages<'_> {
    async fn fetch_page(&self, offset: u64, size: u64) -> Result<Page<AppliedModule>> {
        let query = format!("offset={}&size={}&sort=id", offset, size);
        let body = self
            .client
            .get(&paths::applied_modules(self.device_id), Some(&query))
            .await?;
        Page::from_value(body)
    }
}

#[async_trait]
impl PortalApi for HttpPortalClient {
    async fn list_applied_modules(&self, device_id: u64, batch_size: u64) -> Result<Vec<AppliedModule>> {
        let pages = AppliedModulePages {
            client: self,
            device_id,
        };
        let modules = fetch_all(&pages, batch_size).await?;
        debug!(device_id, count = modules.len(), "Listed applied modules");
        Ok(modules)
    }

    async fn list_instances(
        &self,
        device_id: u64,
        module_id: u64,
        filter: Option<&str>,
    ) -> Result<Vec<ModuleInstance>> {
        let query = filter.map(|f| format!("filter={}", f));
        let body = self
            .get(&paths::instances(device_id, module_id), query.as_deref())
            .await?;
        let page: Page<ModuleInstance> = Page::from_value(body)?;

        if let Some(total) = page.total {
            if total > page.items.len() as u64 {
                warn!(
                    device_id,
                    module_id,
                    total,
                    returned = page.items.len(),
                    "Instance listing is truncated to the first page"
                );
            }
        }
        Ok(page.items)
    }

    async fn patch_instance(
        &self,
        device_id: u64,
        module_id: u64,
        instance_id: u64,
        patch: &InstancePatch,
    ) -> Result<InstanceState> {
        let body = serde_json::to_string(patch)?;
        let response = self
            .patch(&paths::instance(device_id, module_id, instance_id), &body)
            .await?;
        instance_state(response)
    }
}

/// The PATCH echo is the instance itself, possibly wrapped in `data`
fn instance_state(response: Value) -> Result<InstanceState> {
    let nested = response.get("data").filter(|d| d.is_object()).cloned();
    let record = nested.unwrap_or(response);
    Ok(serde_json::from_value(record)?)
}
