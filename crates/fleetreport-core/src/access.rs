//! Contracts for the storage and permission collaborators.
//!
//! The report pipeline never decides who may see what, nor how records are
//! stored. It consumes these traits; [`SnapshotStore`](crate::snapshot::SnapshotStore)
//! is the in-process implementation, production deployments plug in their own.
//!
//! Every method distinguishes "absent" (`Ok(None)`, no access or dangling id)
//! from a collaborator failure (`Err`), which aborts the report.

use std::collections::BTreeSet;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::ReportResult;
use crate::model::{
    Device, DeviceId, Event, GeofenceId, GroupId, MaintenanceId, NamedObject, Position,
    PositionId, TripSegment, UserId,
};
use crate::preferences::ReportPreferences;

/// A cross-referenced object resolved under a user's visibility scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ObjectRef {
    /// A geofence referenced by an event.
    Geofence(GeofenceId),
    /// A maintenance entry referenced by an event.
    Maintenance(MaintenanceId),
    /// The group owning a device.
    Group(GroupId),
}

/// Permission-aware device lookup.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait DeviceAccess: Send + Sync {
    /// Devices the user may access among the requested ids and the members
    /// of the requested groups. Inaccessible ids are left out.
    async fn accessible_devices(
        &self,
        user_id: UserId,
        device_ids: &BTreeSet<DeviceId>,
        group_ids: &BTreeSet<GroupId>,
    ) -> ReportResult<Vec<Device>>;
}

/// Permission-aware single-object lookup.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ObjectAccess: Send + Sync {
    /// Resolve a reference if the user can see it.
    async fn try_resolve(
        &self,
        user_id: UserId,
        reference: ObjectRef,
    ) -> ReportResult<Option<NamedObject>>;

    /// Load a position by id, without permission filtering.
    async fn position(&self, position_id: PositionId) -> ReportResult<Option<Position>>;

    /// Display preferences used to initialize export templates.
    async fn preferences(&self, user_id: UserId) -> ReportResult<ReportPreferences>;
}

/// Time-ordered record queries. Both window ends are inclusive.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Events of a device, ascending by event time.
    async fn events(
        &self,
        device_id: DeviceId,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> ReportResult<Vec<Event>>;

    /// Positions of a device, ascending by fix time.
    async fn positions(
        &self,
        device_id: DeviceId,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> ReportResult<Vec<Position>>;
}

/// Trip detection, consumed as a black box.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TripDetector: Send + Sync {
    /// Trips of a device within the window, in chronological order.
    async fn detect(
        &self,
        device: &Device,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> ReportResult<Vec<TripSegment>>;
}
