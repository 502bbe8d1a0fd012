//! In-process storage backed by a JSON data snapshot.
//!
//! [`SnapshotStore`] implements every collaborator trait from
//! [`access`](crate::access) over a [`Snapshot`] loaded once at startup.
//!
//! Permissions follow the usual fleet model: an administrator sees
//! everything; other users see the devices, groups, geofences and
//! maintenance entries granted to them, plus every device and subgroup
//! nested below a granted group.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::path::Path;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::access::{DeviceAccess, ObjectAccess, ObjectRef, RecordStore, TripDetector};
use crate::error::{ReportError, ReportResult};
use crate::model::{
    Device, DeviceId, Event, GeofenceId, Group, GroupId, MaintenanceId, NamedObject, Position,
    PositionId, TripSegment, UserId,
};
use crate::preferences::ReportPreferences;

/// What one user has been granted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserGrant {
    /// User id.
    pub id: UserId,

    /// Administrators see every object.
    #[serde(default)]
    pub administrator: bool,

    /// Directly granted devices.
    #[serde(default)]
    pub devices: Vec<DeviceId>,

    /// Granted groups, including everything nested below them.
    #[serde(default)]
    pub groups: Vec<GroupId>,

    /// Granted geofences.
    #[serde(default)]
    pub geofences: Vec<GeofenceId>,

    /// Granted maintenance entries.
    #[serde(default)]
    pub maintenance: Vec<MaintenanceId>,

    /// Report display preferences.
    #[serde(default)]
    pub preferences: ReportPreferences,
}

impl UserGrant {
    /// A user with no grants and default preferences.
    #[must_use]
    pub fn new(id: UserId) -> Self {
        Self {
            id,
            administrator: false,
            devices: Vec::new(),
            groups: Vec::new(),
            geofences: Vec::new(),
            maintenance: Vec::new(),
            preferences: ReportPreferences::default(),
        }
    }
}

/// Serialized form of the whole data set.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Snapshot {
    /// All devices.
    pub devices: Vec<Device>,
    /// Device groups; nesting via each group's parent id.
    pub groups: Vec<Group>,
    /// Geofences.
    pub geofences: Vec<NamedObject>,
    /// Maintenance entries.
    pub maintenance: Vec<NamedObject>,
    /// Stored position fixes.
    pub positions: Vec<Position>,
    /// Stored events.
    pub events: Vec<Event>,
    /// Precomputed trips handed out by the trip detector.
    pub trips: Vec<TripSegment>,
    /// Users and their grants.
    pub users: Vec<UserGrant>,
}

/// Read-only store answering report queries from a [`Snapshot`].
#[derive(Debug, Default)]
pub struct SnapshotStore {
    devices: BTreeMap<DeviceId, Device>,
    groups: BTreeMap<GroupId, Group>,
    geofences: HashMap<GeofenceId, String>,
    maintenance: HashMap<MaintenanceId, String>,
    positions: BTreeMap<PositionId, Position>,
    events: Vec<Event>,
    trips: Vec<TripSegment>,
    users: HashMap<UserId, UserGrant>,
}

impl SnapshotStore {
    /// Read a snapshot file.
    ///
    /// # Errors
    ///
    /// Returns [`ReportError::StorageUnavailable`] if the file cannot be read
    /// or is not a valid snapshot.
    pub fn load(path: &Path) -> ReportResult<Self> {
        let raw = std::fs::read_to_string(path).map_err(|e| {
            ReportError::storage(format!("cannot read snapshot {}: {e}", path.display()))
        })?;
        let snapshot: Snapshot = serde_json::from_str(&raw).map_err(|e| {
            ReportError::storage(format!("invalid snapshot {}: {e}", path.display()))
        })?;

        info!(
            path = %path.display(),
            devices = snapshot.devices.len(),
            events = snapshot.events.len(),
            positions = snapshot.positions.len(),
            "Loaded data snapshot"
        );
        Ok(Self::from_snapshot(snapshot))
    }

    /// Index a snapshot.
    #[must_use]
    pub fn from_snapshot(snapshot: Snapshot) -> Self {
        Self {
            devices: snapshot.devices.into_iter().map(|d| (d.id, d)).collect(),
            groups: snapshot.groups.into_iter().map(|g| (g.id, g)).collect(),
            geofences: snapshot
                .geofences
                .into_iter()
                .map(|o| (GeofenceId(o.id), o.name))
                .collect(),
            maintenance: snapshot
                .maintenance
                .into_iter()
                .map(|o| (MaintenanceId(o.id), o.name))
                .collect(),
            positions: snapshot.positions.into_iter().map(|p| (p.id, p)).collect(),
            events: snapshot.events,
            trips: snapshot.trips,
            users: snapshot.users.into_iter().map(|u| (u.id, u)).collect(),
        }
    }

    /// `roots` plus every group nested below them.
    fn subtree(&self, roots: impl IntoIterator<Item = GroupId>) -> BTreeSet<GroupId> {
        let mut closure: BTreeSet<GroupId> = roots.into_iter().collect();
        loop {
            let before = closure.len();
            for group in self.groups.values() {
                if group.group_id.is_some_and(|parent| closure.contains(&parent)) {
                    closure.insert(group.id);
                }
            }
            if closure.len() == before {
                return closure;
            }
        }
    }

    fn resolve_for(&self, grant: &UserGrant, reference: ObjectRef) -> Option<NamedObject> {
        match reference {
            ObjectRef::Geofence(id) => self
                .geofences
                .get(&id)
                .filter(|_| grant.administrator || grant.geofences.contains(&id))
                .map(|name| NamedObject {
                    id: id.0,
                    name: name.clone(),
                }),
            ObjectRef::Maintenance(id) => self
                .maintenance
                .get(&id)
                .filter(|_| grant.administrator || grant.maintenance.contains(&id))
                .map(|name| NamedObject {
                    id: id.0,
                    name: name.clone(),
                }),
            ObjectRef::Group(id) => self
                .groups
                .get(&id)
                .filter(|_| {
                    grant.administrator || self.subtree(grant.groups.iter().copied()).contains(&id)
                })
                .map(|group| NamedObject {
                    id: id.0,
                    name: group.name.clone(),
                }),
        }
    }
}

fn can_see_device(grant: &UserGrant, granted_groups: &BTreeSet<GroupId>, device: &Device) -> bool {
    grant.administrator
        || grant.devices.contains(&device.id)
        || device.group_id.is_some_and(|g| granted_groups.contains(&g))
}

fn within(t: DateTime<Utc>, from: DateTime<Utc>, to: DateTime<Utc>) -> bool {
    from <= t && t <= to
}

#[async_trait]
impl DeviceAccess for SnapshotStore {
    async fn accessible_devices(
        &self,
        user_id: UserId,
        device_ids: &BTreeSet<DeviceId>,
        group_ids: &BTreeSet<GroupId>,
    ) -> ReportResult<Vec<Device>> {
        let Some(grant) = self.users.get(&user_id) else {
            debug!(user = %user_id, "Unknown user has no devices");
            return Ok(Vec::new());
        };

        let granted_groups = self.subtree(grant.groups.iter().copied());
        let requested_groups = self.subtree(group_ids.iter().copied());

        Ok(self
            .devices
            .values()
            .filter(|device| {
                device_ids.contains(&device.id)
                    || device.group_id.is_some_and(|g| requested_groups.contains(&g))
            })
            .filter(|device| can_see_device(grant, &granted_groups, device))
            .cloned()
            .collect())
    }
}

#[async_trait]
impl ObjectAccess for SnapshotStore {
    async fn try_resolve(
        &self,
        user_id: UserId,
        reference: ObjectRef,
    ) -> ReportResult<Option<NamedObject>> {
        Ok(self
            .users
            .get(&user_id)
            .and_then(|grant| self.resolve_for(grant, reference)))
    }

    async fn position(&self, position_id: PositionId) -> ReportResult<Option<Position>> {
        Ok(self.positions.get(&position_id).cloned())
    }

    async fn preferences(&self, user_id: UserId) -> ReportResult<ReportPreferences> {
        Ok(self
            .users
            .get(&user_id)
            .map(|grant| grant.preferences.clone())
            .unwrap_or_default())
    }
}

#[async_trait]
impl RecordStore for SnapshotStore {
    async fn events(
        &self,
        device_id: DeviceId,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> ReportResult<Vec<Event>> {
        let mut events: Vec<Event> = self
            .events
            .iter()
            .filter(|e| e.device_id == device_id && within(e.event_time, from, to))
            .cloned()
            .collect();
        events.sort_by_key(|e| e.event_time);
        Ok(events)
    }

    async fn positions(
        &self,
        device_id: DeviceId,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> ReportResult<Vec<Position>> {
        let mut positions: Vec<Position> = self
            .positions
            .values()
            .filter(|p| p.device_id == device_id && within(p.fix_time, from, to))
            .cloned()
            .collect();
        positions.sort_by_key(|p| p.fix_time);
        Ok(positions)
    }
}

#[async_trait]
impl TripDetector for SnapshotStore {
    async fn detect(
        &self,
        device: &Device,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> ReportResult<Vec<TripSegment>> {
        let mut trips: Vec<TripSegment> = self
            .trips
            .iter()
            .filter(|t| {
                t.device_id == device.id
                    && within(t.start_time, from, to)
                    && within(t.end_time, from, to)
            })
            .cloned()
            .collect();
        trips.sort_by_key(|t| t.start_time);
        Ok(trips)
    }
}
