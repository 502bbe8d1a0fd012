//! Entities read by the report pipeline.
//!
//! Everything here is a read-only snapshot owned by the storage layer. On the
//! wire a reference id of `0` means "no reference"; in memory such fields are
//! `Option`s.

use std::collections::HashMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

macro_rules! entity_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, ToSchema,
        )]
        #[serde(transparent)]
        pub struct $name(pub i64);

        impl From<i64> for $name {
            fn from(id: i64) -> Self {
                Self(id)
            }
        }

        impl From<$name> for i64 {
            fn from(id: $name) -> Self {
                id.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

entity_id!(
    /// Identifier of the user a report is generated for.
    UserId
);
entity_id!(
    /// Identifier of a tracked device.
    DeviceId
);
entity_id!(
    /// Identifier of a device group.
    GroupId
);
entity_id!(
    /// Identifier of a geofence.
    GeofenceId
);
entity_id!(
    /// Identifier of a maintenance entry.
    MaintenanceId
);
entity_id!(
    /// Identifier of a stored position.
    PositionId
);

/// Serde adapter mapping a wire id of `0` (or `null`, or a missing field) to `None`.
pub mod zero_as_none {
    use serde::{Deserialize, Deserializer, Serializer};

    /// Writes `None` as `0`.
    pub fn serialize<S, T>(value: &Option<T>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
        T: Copy + Into<i64>,
    {
        serializer.serialize_i64(value.map_or(0, Into::into))
    }

    /// Reads `0` and `null` as `None`.
    pub fn deserialize<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
    where
        D: Deserializer<'de>,
        T: From<i64>,
    {
        let raw = Option::<i64>::deserialize(deserializer)?;
        Ok(raw.filter(|&id| id != 0).map(T::from))
    }
}

/// A tracked device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Device {
    /// Device id.
    pub id: DeviceId,

    /// Display name.
    #[schema(example = "Delivery Van 7")]
    pub name: String,

    /// Owning group, if any.
    #[serde(default, with = "zero_as_none")]
    #[schema(value_type = i64, example = 3)]
    pub group_id: Option<GroupId>,
}

/// A device group. Groups may nest under a parent group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Group {
    /// Group id.
    pub id: GroupId,

    /// Display name.
    pub name: String,

    /// Parent group, if any.
    #[serde(default, with = "zero_as_none")]
    #[schema(value_type = i64)]
    pub group_id: Option<GroupId>,
}

/// A geofence or maintenance entry, reduced to what reports display.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct NamedObject {
    /// Object id.
    pub id: i64,

    /// Display name.
    pub name: String,
}

/// A stored position fix.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Position {
    /// Position id.
    pub id: PositionId,

    /// Device that reported this fix.
    pub device_id: DeviceId,

    /// Time of the fix.
    pub fix_time: DateTime<Utc>,

    /// Whether the fix is valid.
    #[serde(default)]
    pub valid: bool,

    /// Latitude in degrees.
    pub latitude: f64,

    /// Longitude in degrees.
    pub longitude: f64,

    /// Altitude in meters.
    #[serde(default)]
    pub altitude: f64,

    /// Speed in knots.
    #[serde(default)]
    pub speed: f64,

    /// Course in degrees.
    #[serde(default)]
    pub course: f64,

    /// Reverse-geocoded address.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,

    /// Protocol-specific attributes.
    #[serde(default)]
    #[schema(value_type = Object)]
    pub attributes: HashMap<String, serde_json::Value>,
}

/// A device event such as a geofence entry or an overspeed alarm.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Event {
    /// Event id.
    pub id: i64,

    /// Event type, e.g. `geofenceEnter`.
    #[serde(rename = "type")]
    #[schema(example = "geofenceEnter")]
    pub event_type: String,

    /// When the event happened.
    pub event_time: DateTime<Utc>,

    /// Device that produced the event.
    pub device_id: DeviceId,

    /// Position recorded with the event.
    #[serde(default, with = "zero_as_none")]
    #[schema(value_type = i64)]
    pub position_id: Option<PositionId>,

    /// Geofence the event refers to.
    #[serde(default, with = "zero_as_none")]
    #[schema(value_type = i64)]
    pub geofence_id: Option<GeofenceId>,

    /// Maintenance entry the event refers to.
    #[serde(default, with = "zero_as_none")]
    #[schema(value_type = i64)]
    pub maintenance_id: Option<MaintenanceId>,

    /// Event-specific attributes.
    #[serde(default)]
    #[schema(value_type = Object)]
    pub attributes: HashMap<String, serde_json::Value>,
}

/// One detected trip, as produced by the trip detector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TripSegment {
    /// Device the trip belongs to.
    pub device_id: DeviceId,

    /// Device name at detection time.
    pub device_name: String,

    /// Trip start.
    pub start_time: DateTime<Utc>,

    /// Trip end.
    pub end_time: DateTime<Utc>,

    /// Position the trip started at.
    #[serde(default, with = "zero_as_none")]
    #[schema(value_type = i64)]
    pub start_position_id: Option<PositionId>,

    /// Position the trip ended at.
    #[serde(default, with = "zero_as_none")]
    #[schema(value_type = i64)]
    pub end_position_id: Option<PositionId>,

    /// Start latitude.
    pub start_lat: f64,

    /// Start longitude.
    pub start_lon: f64,

    /// End latitude.
    pub end_lat: f64,

    /// End longitude.
    pub end_lon: f64,

    /// Start address.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_address: Option<String>,

    /// End address.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_address: Option<String>,

    /// Distance travelled in meters.
    #[serde(default)]
    pub distance: f64,

    /// Average speed in knots.
    #[serde(default)]
    pub average_speed: f64,

    /// Maximum speed in knots.
    #[serde(default)]
    pub max_speed: f64,

    /// Duration in milliseconds.
    #[serde(default)]
    pub duration: i64,

    /// Fuel spent in liters.
    #[serde(default)]
    pub spent_fuel: f64,

    /// Driver identifier, if one was reported.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub driver_unique_id: Option<String>,

    /// Driver name, if known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub driver_name: Option<String>,
}
