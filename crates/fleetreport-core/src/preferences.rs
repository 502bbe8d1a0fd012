//! Per-user display preferences bound into export templates.

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Unit for speeds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub enum SpeedUnit {
    /// Knots.
    #[default]
    #[serde(rename = "kn")]
    Knots,
    /// Kilometers per hour.
    #[serde(rename = "kmh")]
    KilometersPerHour,
    /// Miles per hour.
    #[serde(rename = "mph")]
    MilesPerHour,
}

/// Unit for distances.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub enum DistanceUnit {
    /// Kilometers.
    #[default]
    #[serde(rename = "km")]
    Kilometers,
    /// Statute miles.
    #[serde(rename = "mi")]
    Miles,
    /// Nautical miles.
    #[serde(rename = "nmi")]
    NauticalMiles,
}

/// Unit for fuel volumes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub enum VolumeUnit {
    /// Liters.
    #[default]
    #[serde(rename = "ltr")]
    Liters,
    /// US gallons.
    #[serde(rename = "usGal")]
    UsGallons,
    /// Imperial gallons.
    #[serde(rename = "impGal")]
    ImperialGallons,
}

/// Display preferences of the requesting user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ReportPreferences {
    /// IANA timezone name used for local timestamps.
    #[serde(default = "default_timezone")]
    #[schema(example = "Europe/Berlin")]
    pub timezone: String,

    /// Speed unit.
    #[serde(default)]
    pub speed_unit: SpeedUnit,

    /// Distance unit.
    #[serde(default)]
    pub distance_unit: DistanceUnit,

    /// Volume unit.
    #[serde(default)]
    pub volume_unit: VolumeUnit,
}

fn default_timezone() -> String {
    "UTC".to_string()
}

impl Default for ReportPreferences {
    fn default() -> Self {
        Self {
            timezone: default_timezone(),
            speed_unit: SpeedUnit::default(),
            distance_unit: DistanceUnit::default(),
            volume_unit: VolumeUnit::default(),
        }
    }
}

impl ReportPreferences {
    /// The configured timezone, falling back to UTC when the name is unknown.
    #[must_use]
    pub fn tz(&self) -> Tz {
        self.timezone.parse().unwrap_or_else(|_| {
            tracing::warn!(timezone = %self.timezone, "Unknown timezone, using UTC");
            chrono_tz::UTC
        })
    }

    /// Format a timestamp in the user's timezone.
    #[must_use]
    pub fn local_time(&self, instant: DateTime<Utc>) -> String {
        instant
            .with_timezone(&self.tz())
            .format("%Y-%m-%d %H:%M:%S")
            .to_string()
    }
}
