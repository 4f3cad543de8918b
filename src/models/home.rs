//! Home and alarm status models
//!
//! `GET /homes/{id}` comes back in two shapes: newer responses carry an
//! `alarm_status_detailed` field, older ones only the coarse `on`/`off`
//! status plus an optional grace-period expiry. Both decode into the one
//! canonical [`ResourceStatus`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A home the account can monitor
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Home {
    pub home_id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timezone: Option<String>,
}

/// Alarm state. Grace-period variants carry the instant the grace period
/// ends, so an expiry exists exactly when the state is a grace period.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlarmState {
    Armed,
    Disarmed,
    ArmingGracePeriod { expires_at: DateTime<Utc> },
    DisarmingGracePeriod { expires_at: DateTime<Utc> },
    CriticalEvent,
}

/// Wire name of each alarm state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlarmStatusKind {
    Armed,
    Disarmed,
    ArmingGracePeriod,
    DisarmingGracePeriod,
    CriticalEvent,
}

impl AlarmStatusKind {
    pub fn is_grace_period(self) -> bool {
        matches!(self, Self::ArmingGracePeriod | Self::DisarmingGracePeriod)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlarmMode {
    Manual,
    Scheduled,
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum InvalidStatus {
    #[error("{0:?} requires a grace period expiry")]
    MissingGraceExpiry(AlarmStatusKind),
    #[error("unrecognized alarm status {0:?}")]
    UnknownStatus(String),
}

/// Canonical alarm status of one home
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "StatusWire", into = "DetailedStatusWire")]
pub struct ResourceStatus {
    pub state: AlarmState,
    pub mode: AlarmMode,
}

impl ResourceStatus {
    /// Build a status from wire parts. An expiry given for a non-grace
    /// state is dropped; a grace state without one is rejected.
    pub fn new(
        kind: AlarmStatusKind,
        mode: AlarmMode,
        grace_period_expires_at: Option<DateTime<Utc>>,
    ) -> Result<Self, InvalidStatus> {
        let state = match (kind, grace_period_expires_at) {
            (AlarmStatusKind::Armed, _) => AlarmState::Armed,
            (AlarmStatusKind::Disarmed, _) => AlarmState::Disarmed,
            (AlarmStatusKind::CriticalEvent, _) => AlarmState::CriticalEvent,
            (AlarmStatusKind::ArmingGracePeriod, Some(expires_at)) => {
                AlarmState::ArmingGracePeriod { expires_at }
            }
            (AlarmStatusKind::DisarmingGracePeriod, Some(expires_at)) => {
                AlarmState::DisarmingGracePeriod { expires_at }
            }
            (kind, None) => return Err(InvalidStatus::MissingGraceExpiry(kind)),
        };
        Ok(Self { state, mode })
    }

    pub fn kind(&self) -> AlarmStatusKind {
        match self.state {
            AlarmState::Armed => AlarmStatusKind::Armed,
            AlarmState::Disarmed => AlarmStatusKind::Disarmed,
            AlarmState::ArmingGracePeriod { .. } => AlarmStatusKind::ArmingGracePeriod,
            AlarmState::DisarmingGracePeriod { .. } => AlarmStatusKind::DisarmingGracePeriod,
            AlarmState::CriticalEvent => AlarmStatusKind::CriticalEvent,
        }
    }

    /// Armed, or on the way to armed
    pub fn is_armed(&self) -> bool {
        matches!(
            self.state,
            AlarmState::Armed | AlarmState::ArmingGracePeriod { .. }
        )
    }

    pub fn grace_period_expires_at(&self) -> Option<DateTime<Utc>> {
        match self.state {
            AlarmState::ArmingGracePeriod { expires_at }
            | AlarmState::DisarmingGracePeriod { expires_at } => Some(expires_at),
            _ => None,
        }
    }
}

impl fmt::Display for ResourceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.state {
            AlarmState::Armed => write!(f, "armed"),
            AlarmState::Disarmed => write!(f, "disarmed"),
            AlarmState::ArmingGracePeriod { .. } => write!(f, "arming"),
            AlarmState::DisarmingGracePeriod { .. } => write!(f, "disarming"),
            AlarmState::CriticalEvent => write!(f, "CRITICAL EVENT"),
        }
    }
}

/// Coarse `alarm_status` values
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CoarseAlarmStatus {
    On,
    Off,
    CriticalEvent,
}

/// Newer home payload with the detailed status field. The coarse
/// `alarm_status` is written for older readers but ignored on decode.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetailedStatusWire {
    #[serde(default, skip_deserializing, skip_serializing_if = "Option::is_none")]
    pub alarm_status: Option<CoarseAlarmStatus>,
    pub alarm_status_detailed: AlarmStatusKind,
    #[serde(default = "manual")]
    pub alarm_mode: AlarmMode,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub grace_period_expires_at: Option<DateTime<Utc>>,
}

/// Older home payload: coarse status, grace period implied by the expiry.
#[derive(Debug, Clone, Deserialize)]
pub struct CoarseStatusWire {
    pub alarm_status: String,
    #[serde(default = "manual")]
    pub alarm_mode: AlarmMode,
    #[serde(default)]
    pub grace_period_expires_at: Option<DateTime<Utc>>,
}

fn manual() -> AlarmMode {
    AlarmMode::Manual
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum StatusWire {
    Detailed(DetailedStatusWire),
    Coarse(CoarseStatusWire),
}

impl TryFrom<StatusWire> for ResourceStatus {
    type Error = InvalidStatus;

    fn try_from(wire: StatusWire) -> Result<Self, Self::Error> {
        match wire {
            StatusWire::Detailed(w) => {
                ResourceStatus::new(w.alarm_status_detailed, w.alarm_mode, w.grace_period_expires_at)
            }
            StatusWire::Coarse(w) => {
                let kind = match (w.alarm_status.as_str(), w.grace_period_expires_at) {
                    ("on", None) => AlarmStatusKind::Armed,
                    ("on", Some(_)) => AlarmStatusKind::ArmingGracePeriod,
                    ("off", None) => AlarmStatusKind::Disarmed,
                    ("off", Some(_)) => AlarmStatusKind::DisarmingGracePeriod,
                    ("critical_event", _) => AlarmStatusKind::CriticalEvent,
                    (other, _) => return Err(InvalidStatus::UnknownStatus(other.to_string())),
                };
                ResourceStatus::new(kind, w.alarm_mode, w.grace_period_expires_at)
            }
        }
    }
}

impl From<ResourceStatus> for DetailedStatusWire {
    fn from(status: ResourceStatus) -> Self {
        let alarm_status = match status.state {
            AlarmState::Armed | AlarmState::ArmingGracePeriod { .. } => CoarseAlarmStatus::On,
            AlarmState::Disarmed | AlarmState::DisarmingGracePeriod { .. } => {
                CoarseAlarmStatus::Off
            }
            AlarmState::CriticalEvent => CoarseAlarmStatus::CriticalEvent,
        };
        Self {
            alarm_status: Some(alarm_status),
            alarm_status_detailed: status.kind(),
            alarm_mode: status.mode,
            grace_period_expires_at: status.grace_period_expires_at(),
        }
    }
}
