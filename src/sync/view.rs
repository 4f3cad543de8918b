//! Status presentation state

use chrono::{DateTime, Duration, Utc};
use std::fmt;

use crate::models::ResourceStatus;
use crate::store::SharedCache;

/// What a status display should show, derived from the latest fetch
/// outcome and the shared cache.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum StatusView {
    #[default]
    Loading,
    Ready {
        home_name: String,
        status: ResourceStatus,
    },
    NotAuthenticated,
    NoResourceSelected,
    /// Live fetch failed; showing the last cached value
    Error {
        last_known_armed: bool,
        last_update_time: Option<DateTime<Utc>>,
        reason: String,
    },
}

impl StatusView {
    pub fn from_cache(cache: &SharedCache, reason: impl Into<String>) -> Self {
        Self::Error {
            last_known_armed: cache.last_known_armed,
            last_update_time: cache.last_update_time,
            reason: reason.into(),
        }
    }

    /// Best known armed flag, live or cached.
    pub fn is_armed(&self) -> Option<bool> {
        match self {
            Self::Ready { status, .. } => Some(status.is_armed()),
            Self::Error {
                last_known_armed, ..
            } => Some(*last_known_armed),
            _ => None,
        }
    }

    /// Whether a cached value is older than `max_age` (or was never
    /// fetched). Live values are never stale.
    pub fn is_stale(&self, now: DateTime<Utc>, max_age: Duration) -> bool {
        match self {
            Self::Error {
                last_update_time, ..
            } => last_update_time.map_or(true, |t| now - t > max_age),
            _ => false,
        }
    }

    /// Time left in an arming/disarming grace period, for a countdown.
    pub fn grace_remaining(&self, now: DateTime<Utc>) -> Option<Duration> {
        match self {
            Self::Ready { status, .. } => status
                .grace_period_expires_at()
                .map(|expires_at| (expires_at - now).max(Duration::zero())),
            _ => None,
        }
    }
}

impl fmt::Display for StatusView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Loading => write!(f, "Loading..."),
            Self::Ready { home_name, status } => {
                write!(f, "{}: {}", home_name, status)?;
                if let Some(expires_at) = status.grace_period_expires_at() {
                    write!(f, " (grace period until {})", expires_at.format("%H:%M:%S UTC"))?;
                }
                Ok(())
            }
            Self::NotAuthenticated => write!(f, "Not signed in. Run 'homewatch login'."),
            Self::NoResourceSelected => {
                write!(f, "No home selected. Run 'homewatch homes' and 'homewatch select <id>'.")
            }
            Self::Error {
                last_known_armed,
                last_update_time,
                reason,
            } => {
                let state = if *last_known_armed { "armed" } else { "disarmed" };
                match last_update_time {
                    Some(t) => write!(f, "Last known: {} (as of {})", state, t.to_rfc3339())?,
                    None => write!(f, "Last known: {} (never updated)", state)?,
                }
                write!(f, " - {}", reason)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{AlarmMode, AlarmStatusKind};
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 10, 17, 12, 0, 0).unwrap()
    }

    fn ready(kind: AlarmStatusKind, grace: Option<DateTime<Utc>>) -> StatusView {
        StatusView::Ready {
            home_name: "Cabin".to_string(),
            status: ResourceStatus::new(kind, AlarmMode::Manual, grace).unwrap(),
        }
    }

    #[test]
    fn test_default_is_loading() {
        assert_eq!(StatusView::default(), StatusView::Loading);
        assert_eq!(StatusView::Loading.is_armed(), None);
        assert_eq!(StatusView::Loading.to_string(), "Loading...");
    }

    #[test]
    fn test_staleness_of_cached_value() {
        let cache = SharedCache {
            last_known_armed: true,
            last_update_time: Some(now() - Duration::minutes(30)),
            ..SharedCache::default()
        };
        let view = StatusView::from_cache(&cache, "HTTP 503");

        assert_eq!(view.is_armed(), Some(true));
        assert!(view.is_stale(now(), Duration::minutes(15)));
        assert!(!view.is_stale(now(), Duration::hours(1)));

        let never = StatusView::from_cache(&SharedCache::default(), "offline");
        assert!(never.is_stale(now(), Duration::days(365)));

        assert!(!ready(AlarmStatusKind::Armed, None).is_stale(now(), Duration::zero()));
    }

    #[test]
    fn test_grace_countdown() {
        let arming = ready(
            AlarmStatusKind::ArmingGracePeriod,
            Some(now() + Duration::seconds(45)),
        );
        assert_eq!(arming.grace_remaining(now()), Some(Duration::seconds(45)));
        assert_eq!(
            arming.grace_remaining(now() + Duration::minutes(5)),
            Some(Duration::zero())
        );
        assert_eq!(ready(AlarmStatusKind::Armed, None).grace_remaining(now()), None);
    }

    #[test]
    fn test_display() {
        let view = ready(
            AlarmStatusKind::DisarmingGracePeriod,
            Some(now() + Duration::seconds(30)),
        );
        assert_eq!(
            view.to_string(),
            "Cabin: disarming (grace period until 12:00:30 UTC)"
        );

        let cached = StatusView::from_cache(&SharedCache::default(), "HTTP 500");
        assert_eq!(
            cached.to_string(),
            "Last known: disarmed (never updated) - HTTP 500"
        );
    }
}
