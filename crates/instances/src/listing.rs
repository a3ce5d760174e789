//! Read-only listings backing the `modules` and `instances` commands

use common::{AppliedModule, Device, DeviceRef, ModuleInstance, Result};
use portal_client::{escape_filter, PortalApi};
use tracing::info;

/// Every module applied to a device
pub async fn applied_modules(
    api: &dyn PortalApi,
    device: DeviceRef,
    batch_size: u64,
) -> Result<(Device, Vec<AppliedModule>)> {
    let device = device.resolve()?;
    let modules = api.list_applied_modules(device.id, batch_size).await?;
    info!(device = %device.label(), count = modules.len(), "Applied modules");
    Ok((device, modules))
}

/// Instances of one applied module, optionally filtered (single page)
pub async fn module_instances(
    api: &dyn PortalApi,
    device: DeviceRef,
    module_id: u64,
    filter: Option<&str>,
) -> Result<(Device, Vec<ModuleInstance>)> {
    let device = device.resolve()?;
    let escaped = filter.map(escape_filter).filter(|f| !f.is_empty());
    let instances = api
        .list_instances(device.id, module_id, escaped.as_deref())
        .await?;
    info!(device = %device.label(), module_id, count = instances.len(), "Module instances");
    Ok((device, instances))
}
