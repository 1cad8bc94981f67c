use std::collections::HashMap;

use chrono::{DateTime, Datelike, Duration, NaiveTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::models::{ActiveSenior, ScheduleStatus, SessionEvent};

/// Reported when a senior has no session results at all.
pub const NO_SESSION_SENTINEL: i64 = 999;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    Medium,
    High,
}

impl Priority {
    pub fn as_str(&self) -> &'static str {
        match self {
            Priority::Low => "low",
            Priority::Medium => "medium",
            Priority::High => "high",
        }
    }
}

/// Current calendar week as a half-open interval: Sunday 00:00 up to the
/// following Sunday 00:00. Both bounds derive from the one `now` passed in,
/// so repeated calls around midnight cannot disagree with each other.
#[derive(Debug, Clone, Copy)]
pub struct WeekWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl WeekWindow {
    pub fn contains(&self, ts: DateTime<Utc>) -> bool {
        self.start <= ts && ts < self.end
    }
}

pub fn week_window(now: DateTime<Utc>) -> WeekWindow {
    let today = now.date_naive();
    let back = Duration::days(today.weekday().num_days_from_sunday() as i64);
    let sunday = today - back;
    let start = sunday.and_time(NaiveTime::MIN).and_utc();
    WeekWindow {
        start,
        end: start + Duration::days(7),
    }
}

/// Whole days since the last session, or the sentinel when there is none.
pub fn days_since_last(now: DateTime<Utc>, last: Option<DateTime<Utc>>) -> i64 {
    match last {
        Some(ts) => (now - ts).num_days(),
        None => NO_SESSION_SENTINEL,
    }
}

/// Tier precedence is high, then medium, then low; monotonic in both inputs.
pub fn priority_for(missed: i64, days_since_last: i64) -> Priority {
    if missed >= 3 || days_since_last >= 7 {
        Priority::High
    } else if missed >= 2 || days_since_last >= 5 {
        Priority::Medium
    } else {
        Priority::Low
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct AttentionEntry {
    pub senior_id: Uuid,
    pub senior_name: String,
    pub phone: Option<String>,
    pub guardian_phone: Option<String>,
    pub last_session_at: Option<DateTime<Utc>>,
    pub days_since_last: i64,
    pub sessions_per_week: i32,
    pub expected_this_week: i64,
    pub completed_this_week: i64,
    pub missed_sessions: i64,
    pub priority: Priority,
    pub schedule_status: ScheduleStatus,
}

#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct MonitoringStats {
    pub total_active_seniors: i64,
    pub seniors_with_missed_sessions: i64,
    pub total_missed_sessions: i64,
    pub avg_completion_rate: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct MonitoringSnapshot {
    pub entries: Vec<AttentionEntry>,
    pub stats: MonitoringStats,
}

/// Builds the needs-attention list and its aggregate stats. Pure given
/// `now` and the three query results; callers fetch once and pass everything
/// through so the whole snapshot shares a single clock reading.
pub fn assemble(
    now: DateTime<Utc>,
    roster: &[ActiveSenior],
    week_events: &[SessionEvent],
    last_sessions: &HashMap<Uuid, DateTime<Utc>>,
) -> MonitoringSnapshot {
    let window = week_window(now);

    let mut completed: HashMap<Uuid, i64> = HashMap::new();
    for event in week_events {
        if window.contains(event.created_at) {
            *completed.entry(event.senior_id).or_insert(0) += 1;
        }
    }

    let mut total_completed = 0i64;
    let mut total_expected = 0i64;
    let mut entries = Vec::new();

    for senior in roster {
        let completed_this_week = completed.get(&senior.senior_id).copied().unwrap_or(0);
        let expected_this_week = i64::from(senior.sessions_per_week);
        let missed = (expected_this_week - completed_this_week).max(0);

        let last = last_sessions.get(&senior.senior_id).copied();
        let dsl = days_since_last(now, last);

        total_completed += completed_this_week;
        total_expected += expected_this_week;

        if missed > 0 || dsl > 3 {
            entries.push(AttentionEntry {
                senior_id: senior.senior_id,
                senior_name: senior.name.clone(),
                phone: senior.phone.clone(),
                guardian_phone: senior.guardian_phone.clone(),
                last_session_at: last,
                days_since_last: dsl,
                sessions_per_week: senior.sessions_per_week,
                expected_this_week,
                completed_this_week,
                missed_sessions: missed,
                priority: priority_for(missed, dsl),
                schedule_status: senior.status,
            });
        }
    }

    // Stable sort: input order is the tie-break within a tier.
    entries.sort_by(|a, b| b.priority.cmp(&a.priority));

    let total_missed_sessions = entries.iter().map(|e| e.missed_sessions).sum();
    let avg_completion_rate = if total_expected > 0 {
        ((total_completed as f64 / total_expected as f64) * 100.0).round() as i64
    } else {
        0
    };

    MonitoringSnapshot {
        stats: MonitoringStats {
            total_active_seniors: roster.len() as i64,
            seniors_with_missed_sessions: entries.len() as i64,
            total_missed_sessions,
            avg_completion_rate,
        },
        entries,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn senior(id: Uuid, name: &str, per_week: i32) -> ActiveSenior {
        ActiveSenior {
            senior_id: id,
            name: name.to_string(),
            phone: Some("010-1234-5678".to_string()),
            guardian_phone: None,
            sessions_per_week: per_week,
            status: ScheduleStatus::Active,
        }
    }

    fn event(senior_id: Uuid, ts: DateTime<Utc>) -> SessionEvent {
        SessionEvent {
            senior_id,
            created_at: ts,
        }
    }

    // 2026-08-19 is a Wednesday; its week runs Sunday 2026-08-16 through
    // Saturday 2026-08-22.
    fn wednesday() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 8, 19, 15, 30, 0).unwrap()
    }

    #[test]
    fn week_window_starts_on_sunday() {
        let window = week_window(wednesday());
        assert_eq!(window.start, Utc.with_ymd_and_hms(2026, 8, 16, 0, 0, 0).unwrap());
        assert_eq!(window.end, Utc.with_ymd_and_hms(2026, 8, 23, 0, 0, 0).unwrap());
    }

    #[test]
    fn week_window_covers_saturday_end_of_day() {
        let window = week_window(wednesday());
        assert!(window.contains(Utc.with_ymd_and_hms(2026, 8, 22, 23, 59, 59).unwrap()));
        assert!(!window.contains(Utc.with_ymd_and_hms(2026, 8, 23, 0, 0, 0).unwrap()));
        assert!(!window.contains(Utc.with_ymd_and_hms(2026, 8, 15, 23, 59, 59).unwrap()));
    }

    #[test]
    fn week_window_on_sunday_is_that_sunday() {
        let sunday = Utc.with_ymd_and_hms(2026, 8, 16, 0, 0, 1).unwrap();
        let window = week_window(sunday);
        assert_eq!(window.start.date_naive(), sunday.date_naive());
    }

    #[test]
    fn missed_never_goes_negative() {
        let id = Uuid::new_v4();
        let now = wednesday();
        let events: Vec<SessionEvent> = (0..5)
            .map(|i| event(id, now - Duration::hours(i)))
            .collect();
        let mut last = HashMap::new();
        last.insert(id, now - Duration::hours(1));

        let snapshot = assemble(now, &[senior(id, "Margaret Olsen", 2)], &events, &last);
        assert!(snapshot.entries.is_empty());
        assert_eq!(snapshot.stats.avg_completion_rate, 250);
    }

    #[test]
    fn never_trained_senior_gets_sentinel_and_is_flagged() {
        let id = Uuid::new_v4();
        let snapshot = assemble(wednesday(), &[senior(id, "Harold Kim", 3)], &[], &HashMap::new());
        assert_eq!(snapshot.entries.len(), 1);
        let entry = &snapshot.entries[0];
        assert_eq!(entry.days_since_last, NO_SESSION_SENTINEL);
        assert_eq!(entry.missed_sessions, 3);
        assert_eq!(entry.priority, Priority::High);
        assert!(entry.last_session_at.is_none());
    }

    #[test]
    fn priority_tiers_follow_thresholds() {
        assert_eq!(priority_for(0, 0), Priority::Low);
        assert_eq!(priority_for(1, 4), Priority::Low);
        assert_eq!(priority_for(2, 0), Priority::Medium);
        assert_eq!(priority_for(0, 5), Priority::Medium);
        assert_eq!(priority_for(3, 0), Priority::High);
        assert_eq!(priority_for(0, 7), Priority::High);
    }

    #[test]
    fn priority_is_monotonic_in_both_inputs() {
        for missed in 0..6 {
            for days in 0..10 {
                let here = priority_for(missed, days);
                assert!(priority_for(missed + 1, days) >= here);
                assert!(priority_for(missed, days + 1) >= here);
            }
        }
    }

    #[test]
    fn completion_rate_is_zero_without_expected_sessions() {
        let snapshot = assemble(wednesday(), &[], &[], &HashMap::new());
        assert_eq!(snapshot.stats.avg_completion_rate, 0);
        assert_eq!(snapshot.stats.total_active_seniors, 0);
    }

    #[test]
    fn three_per_week_with_one_done_and_ten_days_idle_is_high() {
        let id = Uuid::new_v4();
        let now = wednesday();
        // One session inside the current week, but the most recent overall
        // session is stale (the week event belongs to another kind of check
        // in practice; here the last-session map is authoritative).
        let events = vec![event(id, now - Duration::hours(2))];
        let mut last = HashMap::new();
        last.insert(id, now - Duration::days(10));

        let snapshot = assemble(now, &[senior(id, "Doris Park", 3)], &events, &last);
        let entry = &snapshot.entries[0];
        assert_eq!(entry.completed_this_week, 1);
        assert_eq!(entry.missed_sessions, 2);
        assert_eq!(entry.days_since_last, 10);
        assert_eq!(entry.priority, Priority::High);
    }

    #[test]
    fn entries_sort_high_first_and_keep_input_order_within_tier() {
        let now = wednesday();
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let c = Uuid::new_v4();
        let roster = vec![
            senior(a, "Low First", 1),
            senior(b, "High", 4),
            senior(c, "Low Second", 1),
        ];
        let mut last = HashMap::new();
        // All trained recently enough to stay out of the day-based tiers.
        for id in [a, b, c] {
            last.insert(id, now - Duration::days(1));
        }

        let snapshot = assemble(now, &roster, &[], &last);
        let names: Vec<&str> = snapshot.entries.iter().map(|e| e.senior_name.as_str()).collect();
        assert_eq!(names, vec!["High", "Low First", "Low Second"]);
    }

    #[test]
    fn stats_count_missed_only_across_flagged_but_rate_across_all() {
        let now = wednesday();
        let busy = Uuid::new_v4();
        let idle = Uuid::new_v4();
        let roster = vec![senior(busy, "On Track", 2), senior(idle, "Behind", 3)];

        let events = vec![
            event(busy, now - Duration::hours(1)),
            event(busy, now - Duration::hours(3)),
            event(idle, now - Duration::hours(5)),
        ];
        let mut last = HashMap::new();
        last.insert(busy, now - Duration::hours(1));
        last.insert(idle, now - Duration::hours(5));

        let snapshot = assemble(now, &roster, &events, &last);
        assert_eq!(snapshot.stats.total_active_seniors, 2);
        assert_eq!(snapshot.stats.seniors_with_missed_sessions, 1);
        assert_eq!(snapshot.stats.total_missed_sessions, 2);
        // (2 + 1) completed of (2 + 3) expected -> 60%.
        assert_eq!(snapshot.stats.avg_completion_rate, 60);
    }

    #[test]
    fn events_outside_the_window_do_not_count() {
        let id = Uuid::new_v4();
        let now = wednesday();
        let events = vec![event(id, now - Duration::days(8))];
        let mut last = HashMap::new();
        last.insert(id, now - Duration::days(8));

        let snapshot = assemble(now, &[senior(id, "Edith Cho", 1)], &events, &last);
        let entry = &snapshot.entries[0];
        assert_eq!(entry.completed_this_week, 0);
        assert_eq!(entry.missed_sessions, 1);
        assert_eq!(entry.priority, Priority::High);
    }
}
