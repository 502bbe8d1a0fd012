//! Expansion of requested device and group ids into the accessible device set.

use std::collections::BTreeMap;

use tracing::debug;

use crate::access::DeviceAccess;
use crate::error::ReportResult;
use crate::model::{Device, DeviceId};
use crate::query::ReportQuery;

/// Resolve the devices a query covers.
///
/// The result is de-duplicated and ordered by device id. An unscoped query
/// (no devices, no groups) yields nothing and never reaches the collaborator.
///
/// # Errors
///
/// Propagates collaborator failures unchanged.
pub async fn resolve_devices(
    access: &dyn DeviceAccess,
    query: &ReportQuery,
) -> ReportResult<Vec<Device>> {
    if query.is_unscoped() {
        debug!(user = %query.user_id(), "No devices or groups requested");
        return Ok(Vec::new());
    }

    let devices = access
        .accessible_devices(query.user_id(), query.device_ids(), query.group_ids())
        .await?;

    let unique: BTreeMap<DeviceId, Device> = devices
        .into_iter()
        .map(|device| (device.id, device))
        .collect();

    debug!(
        user = %query.user_id(),
        requested_devices = query.device_ids().len(),
        requested_groups = query.group_ids().len(),
        resolved = unique.len(),
        "Resolved report scope"
    );

    Ok(unique.into_values().collect())
}
