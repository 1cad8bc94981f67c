use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Datelike, Duration, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::models::{SeniorActivity, SessionEvent};
use crate::monitoring::week_window;

#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct Kpi {
    pub total_users: i64,
    pub active_today: i64,
    pub weekly_active: i64,
    pub new_users_this_month: i64,
    pub inactive_users_this_week: i64,
    pub license_seats_remaining: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct UserProgress {
    pub id: Uuid,
    pub name: String,
    pub current_week: i64,
    pub completed_this_week: i64,
    pub sessions_per_week: i32,
    pub active: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct InactiveUser {
    pub id: Uuid,
    pub name: String,
    /// None when the senior has never trained.
    pub days_since_last: Option<i64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DashboardSnapshot {
    pub kpi: Kpi,
    pub user_progress: Vec<UserProgress>,
    pub inactive_users: Vec<InactiveUser>,
}

const LIST_LIMIT: usize = 10;

/// Admin dashboard KPIs. `recent_events` must cover at least the rolling
/// 7-day window ending at `now`; both the rolling window and the calendar
/// week are re-derived here from the single `now`.
pub fn assemble(
    now: DateTime<Utc>,
    seniors: &[SeniorActivity],
    licence_seats: i64,
    recent_events: &[SessionEvent],
    last_sessions: &HashMap<Uuid, DateTime<Utc>>,
) -> DashboardSnapshot {
    let week_ago = now - Duration::days(7);
    let window = week_window(now);
    let today = now.date_naive();
    let month_start = today.with_day0(0).unwrap_or(today);

    let mut weekly_ids: HashSet<Uuid> = HashSet::new();
    let mut today_ids: HashSet<Uuid> = HashSet::new();
    let mut completed_this_week: HashMap<Uuid, i64> = HashMap::new();
    for event in recent_events {
        if event.created_at >= week_ago {
            weekly_ids.insert(event.senior_id);
        }
        if event.created_at.date_naive() == today {
            today_ids.insert(event.senior_id);
        }
        if window.contains(event.created_at) {
            *completed_this_week.entry(event.senior_id).or_insert(0) += 1;
        }
    }

    let total_users = seniors.len() as i64;
    let new_users_this_month = seniors
        .iter()
        .filter(|s| s.created_at.date_naive() >= month_start)
        .count() as i64;

    let scheduled: Vec<&SeniorActivity> =
        seniors.iter().filter(|s| s.schedule_start.is_some()).collect();

    let user_progress: Vec<UserProgress> = scheduled
        .iter()
        .take(LIST_LIMIT)
        .map(|s| {
            let start = s.schedule_start.unwrap_or(today);
            let elapsed = (today - start).num_days().max(0);
            UserProgress {
                id: s.id,
                name: s.name.clone(),
                current_week: elapsed / 7 + 1,
                completed_this_week: completed_this_week.get(&s.id).copied().unwrap_or(0),
                sessions_per_week: s.sessions_per_week.unwrap_or(0),
                active: weekly_ids.contains(&s.id),
            }
        })
        .collect();

    let mut inactive_users: Vec<InactiveUser> = scheduled
        .iter()
        .filter(|s| !weekly_ids.contains(&s.id))
        .map(|s| InactiveUser {
            id: s.id,
            name: s.name.clone(),
            days_since_last: last_sessions.get(&s.id).map(|last| (now - *last).num_days()),
        })
        .collect();
    let inactive_count = inactive_users.len() as i64;
    // Longest-idle first; never-trained sorts ahead of everyone.
    inactive_users.sort_by(|a, b| {
        b.days_since_last
            .map_or(i64::MAX, |d| d)
            .cmp(&a.days_since_last.map_or(i64::MAX, |d| d))
    });
    inactive_users.truncate(LIST_LIMIT);

    DashboardSnapshot {
        kpi: Kpi {
            total_users,
            active_today: today_ids.len() as i64,
            weekly_active: weekly_ids.len() as i64,
            new_users_this_month,
            inactive_users_this_week: inactive_count,
            license_seats_remaining: licence_seats - total_users,
        },
        user_progress,
        inactive_users,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn activity(id: Uuid, name: &str, created_days_ago: i64, now: DateTime<Utc>) -> SeniorActivity {
        SeniorActivity {
            id,
            name: name.to_string(),
            created_at: now - Duration::days(created_days_ago),
            schedule_start: Some((now - Duration::days(21)).date_naive()),
            sessions_per_week: Some(3),
        }
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 8, 19, 12, 0, 0).unwrap()
    }

    #[test]
    fn counts_active_today_and_weekly() {
        let now = now();
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let seniors = vec![activity(a, "A", 40, now), activity(b, "B", 40, now)];
        let events = vec![
            SessionEvent { senior_id: a, created_at: now - Duration::hours(2) },
            SessionEvent { senior_id: b, created_at: now - Duration::days(3) },
        ];
        let snapshot = assemble(now, &seniors, 10, &events, &HashMap::new());
        assert_eq!(snapshot.kpi.active_today, 1);
        assert_eq!(snapshot.kpi.weekly_active, 2);
        assert_eq!(snapshot.kpi.inactive_users_this_week, 0);
        assert_eq!(snapshot.kpi.license_seats_remaining, 8);
    }

    #[test]
    fn inactive_users_carry_real_idle_days() {
        let now = now();
        let idle = Uuid::new_v4();
        let never = Uuid::new_v4();
        let seniors = vec![activity(idle, "Idle", 40, now), activity(never, "Never", 40, now)];
        let mut last = HashMap::new();
        last.insert(idle, now - Duration::days(9));

        let snapshot = assemble(now, &seniors, 10, &[], &last);
        assert_eq!(snapshot.kpi.inactive_users_this_week, 2);
        // Never-trained sorts first, then the 9-day idle senior.
        assert_eq!(snapshot.inactive_users[0].name, "Never");
        assert_eq!(snapshot.inactive_users[0].days_since_last, None);
        assert_eq!(snapshot.inactive_users[1].days_since_last, Some(9));
    }

    #[test]
    fn new_users_this_month_uses_calendar_month() {
        let now = now(); // Aug 19: 18 days ago is still August, 20 is July.
        let seniors = vec![
            activity(Uuid::new_v4(), "Recent", 18, now),
            activity(Uuid::new_v4(), "Old", 20, now),
        ];
        let snapshot = assemble(now, &seniors, 10, &[], &HashMap::new());
        assert_eq!(snapshot.kpi.new_users_this_month, 1);
    }

    #[test]
    fn progress_reports_real_week_counts() {
        let now = now();
        let id = Uuid::new_v4();
        let seniors = vec![activity(id, "Ruth", 40, now)];
        let events = vec![
            SessionEvent { senior_id: id, created_at: now - Duration::hours(1) },
            SessionEvent { senior_id: id, created_at: now - Duration::days(2) },
        ];
        let snapshot = assemble(now, &seniors, 10, &events, &HashMap::new());
        let progress = &snapshot.user_progress[0];
        assert_eq!(progress.completed_this_week, 2);
        assert_eq!(progress.current_week, 4);
        assert!(progress.active);
    }
}
