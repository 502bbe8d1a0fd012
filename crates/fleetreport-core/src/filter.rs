//! Event visibility filtering.
//!
//! Events are filtered in two passes: first by type, then by whether their
//! geofence or maintenance reference resolves for the requesting user. A
//! reference that does not resolve drops the event; it is never an error.
//!
//! Resolved names are recorded into [`LookupTables`] as a byproduct, so an
//! export can print geofence and maintenance names without looking them up
//! again.

use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;
use tracing::debug;

use crate::access::{ObjectAccess, ObjectRef};
use crate::error::ReportResult;
use crate::model::{Event, GeofenceId, MaintenanceId, Position, PositionId, UserId};
use crate::query::EventTypeFilter;

/// Id to name (and id to position) tables shared by every device of one
/// report call.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LookupTables {
    geofence_names: BTreeMap<GeofenceId, String>,
    maintenance_names: BTreeMap<MaintenanceId, String>,
    positions: BTreeMap<PositionId, Position>,
    #[serde(skip)]
    hidden: BTreeSet<ObjectRef>,
    #[serde(skip)]
    missing_positions: BTreeSet<PositionId>,
}

impl LookupTables {
    /// Empty tables for a new report call.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Names of every geofence that passed the filter.
    #[must_use]
    pub const fn geofence_names(&self) -> &BTreeMap<GeofenceId, String> {
        &self.geofence_names
    }

    /// Names of every maintenance entry that passed the filter.
    #[must_use]
    pub const fn maintenance_names(&self) -> &BTreeMap<MaintenanceId, String> {
        &self.maintenance_names
    }

    /// Positions referenced by retained events.
    #[must_use]
    pub const fn positions(&self) -> &BTreeMap<PositionId, Position> {
        &self.positions
    }

    fn is_known(&self, reference: ObjectRef) -> Option<bool> {
        if self.hidden.contains(&reference) {
            return Some(false);
        }
        let visible = match reference {
            ObjectRef::Geofence(id) => self.geofence_names.contains_key(&id),
            ObjectRef::Maintenance(id) => self.maintenance_names.contains_key(&id),
            ObjectRef::Group(_) => false,
        };
        visible.then_some(true)
    }

    fn record(&mut self, reference: ObjectRef, name: Option<String>) {
        match (reference, name) {
            (ObjectRef::Geofence(id), Some(name)) => {
                self.geofence_names.insert(id, name);
            }
            (ObjectRef::Maintenance(id), Some(name)) => {
                self.maintenance_names.insert(id, name);
            }
            (reference, _) => {
                self.hidden.insert(reference);
            }
        }
    }

    /// Whether `reference` is visible, resolving it at most once per call.
    async fn resolve(
        &mut self,
        objects: &dyn ObjectAccess,
        user_id: UserId,
        reference: ObjectRef,
    ) -> ReportResult<bool> {
        if let Some(visible) = self.is_known(reference) {
            return Ok(visible);
        }
        let resolved = objects.try_resolve(user_id, reference).await?;
        let visible = resolved.is_some();
        self.record(reference, resolved.map(|object| object.name));
        Ok(visible)
    }
}

/// The reference that decides an event's visibility. A geofence reference
/// takes precedence over a maintenance reference.
const fn governing_reference(event: &Event) -> Option<ObjectRef> {
    match (event.geofence_id, event.maintenance_id) {
        (Some(id), _) => Some(ObjectRef::Geofence(id)),
        (None, Some(id)) => Some(ObjectRef::Maintenance(id)),
        (None, None) => None,
    }
}

/// Filter one device's events for `user_id`.
///
/// Returns the retained events in their original order. Names of resolved
/// references are recorded into `lookups`.
///
/// # Errors
///
/// Propagates collaborator failures; unresolvable references are not errors.
pub async fn filter_events(
    events: Vec<Event>,
    types: &EventTypeFilter,
    user_id: UserId,
    objects: &dyn ObjectAccess,
    lookups: &mut LookupTables,
) -> ReportResult<Vec<Event>> {
    let typed: Vec<Event> = events
        .into_iter()
        .filter(|event| types.accepts(&event.event_type))
        .collect();

    let mut retained = Vec::with_capacity(typed.len());
    for event in typed {
        let visible = match governing_reference(&event) {
            Some(reference) => lookups.resolve(objects, user_id, reference).await?,
            None => true,
        };
        if visible {
            retained.push(event);
        } else {
            debug!(event_id = event.id, user = %user_id, "Dropping event with hidden reference");
        }
    }
    Ok(retained)
}

/// Cache the positions referenced by `events`. A missing position leaves no
/// entry and does not affect the event; it is looked up once per call.
///
/// # Errors
///
/// Propagates collaborator failures.
pub async fn cache_positions(
    events: &[Event],
    objects: &dyn ObjectAccess,
    lookups: &mut LookupTables,
) -> ReportResult<()> {
    for position_id in events.iter().filter_map(|event| event.position_id) {
        if lookups.positions.contains_key(&position_id)
            || lookups.missing_positions.contains(&position_id)
        {
            continue;
        }
        match objects.position(position_id).await? {
            Some(position) => {
                lookups.positions.insert(position_id, position);
            }
            None => {
                lookups.missing_positions.insert(position_id);
            }
        }
    }
    Ok(())
}
