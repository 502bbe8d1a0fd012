//! Report request descriptors and the period policy.

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::error::{ReportError, ReportResult};
use crate::model::{DeviceId, GroupId, UserId};

/// The three report kinds. Each selects a record type and a template.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum ReportKind {
    /// Device events.
    Events,
    /// Raw positions.
    Route,
    /// Detected trips.
    Trips,
}

impl ReportKind {
    /// Base file name of the template for this kind.
    #[must_use]
    pub const fn template_name(self) -> &'static str {
        match self {
            Self::Events => "events",
            Self::Route => "route",
            Self::Trips => "trips",
        }
    }
}

impl fmt::Display for ReportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.template_name())
    }
}

impl FromStr for ReportKind {
    type Err = ReportError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "events" => Ok(Self::Events),
            "route" => Ok(Self::Route),
            "trips" => Ok(Self::Trips),
            other => Err(ReportError::UnknownReportKind(other.to_string())),
        }
    }
}

/// Immutable description of one report request.
///
/// The window is inclusive on both ends. Construction rejects `from > to`;
/// the maximum-period check belongs to [`PeriodPolicy`] because the limit is
/// configuration, not part of the request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportQuery {
    user_id: UserId,
    device_ids: BTreeSet<DeviceId>,
    group_ids: BTreeSet<GroupId>,
    from: DateTime<Utc>,
    to: DateTime<Utc>,
}

impl ReportQuery {
    /// Build a query.
    ///
    /// # Errors
    ///
    /// Returns [`ReportError::InvalidPeriod`] if `from` is after `to`.
    pub fn new(
        user_id: UserId,
        device_ids: impl IntoIterator<Item = DeviceId>,
        group_ids: impl IntoIterator<Item = GroupId>,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> ReportResult<Self> {
        if from > to {
            return Err(ReportError::InvalidPeriod { from, to });
        }
        Ok(Self {
            user_id,
            device_ids: device_ids.into_iter().collect(),
            group_ids: group_ids.into_iter().collect(),
            from,
            to,
        })
    }

    /// The requesting user.
    #[must_use]
    pub const fn user_id(&self) -> UserId {
        self.user_id
    }

    /// Explicitly requested devices.
    #[must_use]
    pub const fn device_ids(&self) -> &BTreeSet<DeviceId> {
        &self.device_ids
    }

    /// Explicitly requested groups.
    #[must_use]
    pub const fn group_ids(&self) -> &BTreeSet<GroupId> {
        &self.group_ids
    }

    /// Window start (inclusive).
    #[must_use]
    pub const fn from(&self) -> DateTime<Utc> {
        self.from
    }

    /// Window end (inclusive).
    #[must_use]
    pub const fn to(&self) -> DateTime<Utc> {
        self.to
    }

    /// `true` when neither devices nor groups were requested.
    #[must_use]
    pub fn is_unscoped(&self) -> bool {
        self.device_ids.is_empty() && self.group_ids.is_empty()
    }

    /// Window length; zero for a single instant.
    #[must_use]
    pub fn window(&self) -> Duration {
        (self.to - self.from).to_std().unwrap_or_default()
    }
}

/// Maximum allowed report window.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PeriodPolicy {
    limit: Option<Duration>,
}

impl PeriodPolicy {
    /// No limit on the window.
    #[must_use]
    pub const fn unlimited() -> Self {
        Self { limit: None }
    }

    /// Reject windows longer than `limit`.
    #[must_use]
    pub const fn limited(limit: Duration) -> Self {
        Self { limit: Some(limit) }
    }

    /// The configured limit, if any.
    #[must_use]
    pub const fn limit(&self) -> Option<Duration> {
        self.limit
    }

    /// Check a query against the policy.
    ///
    /// # Errors
    ///
    /// Returns [`ReportError::InvalidPeriod`] for an inverted window and
    /// [`ReportError::PeriodExceeded`] when the window is longer than the limit.
    pub fn check(&self, query: &ReportQuery) -> ReportResult<()> {
        if query.from > query.to {
            return Err(ReportError::InvalidPeriod {
                from: query.from,
                to: query.to,
            });
        }
        match self.limit {
            Some(limit) if query.window() > limit => Err(ReportError::PeriodExceeded {
                requested_secs: query.window().as_secs(),
                limit_secs: limit.as_secs(),
            }),
            _ => Ok(()),
        }
    }
}

/// Event-type selection for the events report.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EventTypeFilter {
    types: BTreeSet<String>,
}

impl EventTypeFilter {
    /// Sentinel type selecting every event.
    pub const ALL_EVENTS: &'static str = "allEvents";

    /// Accept only the given types. An empty set, or one containing
    /// [`Self::ALL_EVENTS`], accepts everything.
    pub fn new<I, S>(types: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            types: types.into_iter().map(Into::into).collect(),
        }
    }

    /// Accept every event type.
    #[must_use]
    pub fn all() -> Self {
        Self::default()
    }

    /// `true` when no type filtering applies.
    #[must_use]
    pub fn is_all(&self) -> bool {
        self.types.is_empty() || self.types.contains(Self::ALL_EVENTS)
    }

    /// Whether an event of `event_type` is retained.
    #[must_use]
    pub fn accepts(&self, event_type: &str) -> bool {
        self.is_all() || self.types.contains(event_type)
    }
}
