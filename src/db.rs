use std::collections::HashMap;

use anyhow::Context;
use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde_json::{json, Value};
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use uuid::Uuid;

use crate::models::{
    ActiveSenior, OrganisationRow, ReportRow, ScheduleRow, ScheduleStatus, ScheduleWithSenior,
    SeniorActivity, SeniorRow, SessionDetail, SessionEvent, SessionKind,
};
use crate::validate::{NewResult, NewSchedule, NewSenior, SchedulePatch, SeniorPatch};

pub async fn init_db(pool: &PgPool) -> anyhow::Result<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}

pub fn is_unique_violation(err: &anyhow::Error) -> bool {
    matches!(
        err.downcast_ref::<sqlx::Error>(),
        Some(sqlx::Error::Database(db)) if db.is_unique_violation()
    )
}

fn senior_from_row(row: &PgRow) -> anyhow::Result<SeniorRow> {
    let gender: String = row.get("gender");
    let eduyear: Option<String> = row.get("eduyear");
    Ok(SeniorRow {
        id: row.get("id"),
        org_id: row.get("org_id"),
        name: row.get("name"),
        gender: gender.parse()?,
        birth: row.get("birth"),
        eduyear: eduyear.as_deref().map(str::parse).transpose()?,
        phone: row.get("phone"),
        guardian_phone: row.get("guardian_phone"),
        address: row.get("address"),
        note: row.get("note"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    })
}

fn schedule_from_row(row: &PgRow) -> anyhow::Result<ScheduleRow> {
    let status: String = row.get("status");
    Ok(ScheduleRow {
        id: row.get("id"),
        senior_id: row.get("senior_id"),
        start_date: row.get("start_date"),
        end_date: row.get("end_date"),
        sessions_per_week: row.get("sessions_per_week"),
        status: status.parse()?,
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    })
}

pub async fn fetch_organisation(
    pool: &PgPool,
    org_id: Uuid,
) -> anyhow::Result<Option<OrganisationRow>> {
    let row = sqlx::query("SELECT id, name, licence_seats FROM organisations WHERE id = $1")
        .bind(org_id)
        .fetch_optional(pool)
        .await?;

    Ok(row.map(|row| OrganisationRow {
        id: row.get("id"),
        name: row.get("name"),
        licence_seats: row.get("licence_seats"),
    }))
}

pub async fn first_licence_seats(pool: &PgPool) -> anyhow::Result<i64> {
    let row = sqlx::query("SELECT licence_seats FROM organisations ORDER BY created_at LIMIT 1")
        .fetch_optional(pool)
        .await?;
    Ok(row.map(|r| i64::from(r.get::<i32, _>("licence_seats"))).unwrap_or(0))
}

pub async fn count_seniors(pool: &PgPool, org_id: Uuid) -> anyhow::Result<i64> {
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM seniors WHERE org_id = $1")
        .bind(org_id)
        .fetch_one(pool)
        .await?;
    Ok(count)
}

pub async fn insert_senior(pool: &PgPool, senior: &NewSenior) -> anyhow::Result<SeniorRow> {
    let row = sqlx::query(
        r#"
        INSERT INTO seniors (org_id, name, gender, birth, eduyear, phone, guardian_phone, address, note)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
        RETURNING *
        "#,
    )
    .bind(senior.org_id)
    .bind(&senior.name)
    .bind(senior.gender.as_str())
    .bind(senior.birth)
    .bind(senior.eduyear.map(|e| e.as_str()))
    .bind(&senior.phone)
    .bind(&senior.guardian_phone)
    .bind(&senior.address)
    .bind(&senior.note)
    .fetch_one(pool)
    .await?;

    senior_from_row(&row)
}

pub async fn list_seniors(pool: &PgPool) -> anyhow::Result<Vec<SeniorRow>> {
    let rows = sqlx::query("SELECT * FROM seniors ORDER BY created_at DESC")
        .fetch_all(pool)
        .await?;

    rows.iter().map(senior_from_row).collect()
}

pub async fn update_senior(
    pool: &PgPool,
    id: Uuid,
    patch: &SeniorPatch,
) -> anyhow::Result<Option<SeniorRow>> {
    let row = sqlx::query(
        r#"
        UPDATE seniors SET
            name = COALESCE($2, name),
            gender = COALESCE($3, gender),
            birth = COALESCE($4, birth),
            eduyear = COALESCE($5, eduyear),
            phone = COALESCE($6, phone),
            guardian_phone = COALESCE($7, guardian_phone),
            address = COALESCE($8, address),
            note = COALESCE($9, note),
            updated_at = now()
        WHERE id = $1
        RETURNING *
        "#,
    )
    .bind(id)
    .bind(&patch.name)
    .bind(patch.gender.map(|g| g.as_str()))
    .bind(patch.birth)
    .bind(patch.eduyear.map(|e| e.as_str()))
    .bind(&patch.phone)
    .bind(&patch.guardian_phone)
    .bind(&patch.address)
    .bind(&patch.note)
    .fetch_optional(pool)
    .await?;

    row.as_ref().map(senior_from_row).transpose()
}

pub async fn delete_senior(pool: &PgPool, id: Uuid) -> anyhow::Result<bool> {
    let result = sqlx::query("DELETE FROM seniors WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}

pub async fn senior_name(pool: &PgPool, id: Uuid) -> anyhow::Result<Option<String>> {
    let row = sqlx::query("SELECT name FROM seniors WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await?;
    Ok(row.map(|r| r.get("name")))
}

pub async fn list_schedules(pool: &PgPool) -> anyhow::Result<Vec<ScheduleWithSenior>> {
    let rows = sqlx::query(
        r#"
        SELECT sc.*, se.name AS senior_name
        FROM schedules sc
        JOIN seniors se ON se.id = sc.senior_id
        ORDER BY sc.created_at DESC
        "#,
    )
    .fetch_all(pool)
    .await?;

    rows.iter()
        .map(|row| {
            Ok(ScheduleWithSenior {
                schedule: schedule_from_row(row)?,
                senior_name: row.get("senior_name"),
            })
        })
        .collect()
}

pub async fn insert_schedule(pool: &PgPool, schedule: &NewSchedule) -> anyhow::Result<ScheduleRow> {
    let row = sqlx::query(
        r#"
        INSERT INTO schedules (senior_id, start_date, end_date, sessions_per_week, status)
        VALUES ($1, $2, $3, $4, $5)
        RETURNING *
        "#,
    )
    .bind(schedule.senior_id)
    .bind(schedule.start_date)
    .bind(schedule.end_date)
    .bind(schedule.sessions_per_week)
    .bind(schedule.status.as_str())
    .fetch_one(pool)
    .await?;

    schedule_from_row(&row)
}

pub async fn update_schedule(
    pool: &PgPool,
    id: Uuid,
    patch: &SchedulePatch,
) -> anyhow::Result<Option<ScheduleRow>> {
    let row = sqlx::query(
        r#"
        UPDATE schedules SET
            start_date = COALESCE($2, start_date),
            end_date = COALESCE($3, end_date),
            sessions_per_week = COALESCE($4, sessions_per_week),
            status = COALESCE($5, status),
            updated_at = now()
        WHERE id = $1
        RETURNING *
        "#,
    )
    .bind(id)
    .bind(patch.start_date)
    .bind(patch.end_date)
    .bind(patch.sessions_per_week)
    .bind(patch.status.map(|s| s.as_str()))
    .fetch_optional(pool)
    .await?;

    row.as_ref().map(schedule_from_row).transpose()
}

pub async fn delete_schedule(pool: &PgPool, id: Uuid) -> anyhow::Result<bool> {
    let result = sqlx::query("DELETE FROM schedules WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}

/// Seniors carrying an Active schedule, in creation order. The partial
/// unique index guarantees at most one Active schedule per senior.
pub async fn fetch_active_roster(pool: &PgPool) -> anyhow::Result<Vec<ActiveSenior>> {
    let rows = sqlx::query(
        r#"
        SELECT se.id AS senior_id, se.name, se.phone, se.guardian_phone,
               sc.sessions_per_week, sc.status
        FROM seniors se
        JOIN schedules sc ON sc.senior_id = se.id AND sc.status = 'Active'
        ORDER BY se.created_at
        "#,
    )
    .fetch_all(pool)
    .await?;

    rows.iter()
        .map(|row| {
            let status: String = row.get("status");
            Ok(ActiveSenior {
                senior_id: row.get("senior_id"),
                name: row.get("name"),
                phone: row.get("phone"),
                guardian_phone: row.get("guardian_phone"),
                sessions_per_week: row.get("sessions_per_week"),
                status: status.parse::<ScheduleStatus>()?,
            })
        })
        .collect()
}

/// Motor and cognitive events unioned over [since, until).
pub async fn fetch_results_between(
    pool: &PgPool,
    since: DateTime<Utc>,
    until: DateTime<Utc>,
) -> anyhow::Result<Vec<SessionEvent>> {
    let rows = sqlx::query(
        r#"
        SELECT senior_id, created_at FROM motor_results
        WHERE created_at >= $1 AND created_at < $2
        UNION ALL
        SELECT senior_id, created_at FROM cognitive_results
        WHERE created_at >= $1 AND created_at < $2
        "#,
    )
    .bind(since)
    .bind(until)
    .fetch_all(pool)
    .await?;

    Ok(rows
        .iter()
        .map(|row| SessionEvent {
            senior_id: row.get("senior_id"),
            created_at: row.get("created_at"),
        })
        .collect())
}

/// All-time most recent session per senior, across both result kinds.
pub async fn fetch_last_sessions(
    pool: &PgPool,
) -> anyhow::Result<HashMap<Uuid, DateTime<Utc>>> {
    let rows = sqlx::query(
        r#"
        SELECT senior_id, MAX(created_at) AS last_session
        FROM (
            SELECT senior_id, created_at FROM motor_results
            UNION ALL
            SELECT senior_id, created_at FROM cognitive_results
        ) sessions
        GROUP BY senior_id
        "#,
    )
    .fetch_all(pool)
    .await?;

    Ok(rows
        .iter()
        .map(|row| (row.get("senior_id"), row.get("last_session")))
        .collect())
}

/// Senior rows joined with their Active schedule (if any), for the dashboard.
pub async fn fetch_senior_activity(pool: &PgPool) -> anyhow::Result<Vec<SeniorActivity>> {
    let rows = sqlx::query(
        r#"
        SELECT se.id, se.name, se.created_at,
               sc.start_date AS schedule_start, sc.sessions_per_week
        FROM seniors se
        LEFT JOIN schedules sc ON sc.senior_id = se.id AND sc.status = 'Active'
        ORDER BY se.created_at
        "#,
    )
    .fetch_all(pool)
    .await?;

    Ok(rows
        .iter()
        .map(|row| SeniorActivity {
            id: row.get("id"),
            name: row.get("name"),
            created_at: row.get("created_at"),
            schedule_start: row.get("schedule_start"),
            sessions_per_week: row.get("sessions_per_week"),
        })
        .collect())
}

pub async fn insert_result(pool: &PgPool, result: &NewResult) -> anyhow::Result<Uuid> {
    let id: Uuid = match result.kind {
        SessionKind::Motor => {
            sqlx::query_scalar(
                r#"
                INSERT INTO motor_results (senior_id, raw, video_key, bpm)
                VALUES ($1, $2, $3, $4)
                RETURNING id
                "#,
            )
            .bind(result.senior_id)
            .bind(&result.raw)
            .bind(&result.video_key)
            .bind(result.bpm)
            .fetch_one(pool)
            .await?
        }
        SessionKind::Cognitive => {
            sqlx::query_scalar(
                r#"
                INSERT INTO cognitive_results (senior_id, raw, video_key)
                VALUES ($1, $2, $3)
                RETURNING id
                "#,
            )
            .bind(result.senior_id)
            .bind(&result.raw)
            .bind(&result.video_key)
            .fetch_one(pool)
            .await?
        }
    };
    Ok(id)
}

pub async fn fetch_session(
    pool: &PgPool,
    kind: SessionKind,
    session_id: Uuid,
) -> anyhow::Result<Option<SessionDetail>> {
    // Table name comes from the enum, never from user input.
    let bpm_column = match kind {
        SessionKind::Motor => "r.bpm",
        SessionKind::Cognitive => "NULL::INTEGER AS bpm",
    };
    let query = format!(
        r#"
        SELECT r.id, r.senior_id, r.raw, r.video_key, r.created_at, {bpm_column},
               se.name AS senior_name
        FROM {table} r
        JOIN seniors se ON se.id = r.senior_id
        WHERE r.id = $1
        "#,
        table = kind.table(),
    );

    let row = sqlx::query(&query).bind(session_id).fetch_optional(pool).await?;

    Ok(row.map(|row| SessionDetail {
        id: row.get("id"),
        senior_id: row.get("senior_id"),
        senior_name: row.get("senior_name"),
        raw: row.get("raw"),
        video_key: row.get("video_key"),
        bpm: row.get("bpm"),
        created_at: row.get("created_at"),
    }))
}

pub async fn insert_report_stub(pool: &PgPool, session_id: Uuid) -> anyhow::Result<()> {
    sqlx::query(
        r#"
        INSERT INTO reports (session_id, kind, pdf_url)
        VALUES ($1, 'PDF', $2)
        ON CONFLICT (session_id) DO NOTHING
        "#,
    )
    .bind(session_id)
    .bind(format!("placeholder_reports/{session_id}.pdf"))
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn upsert_report(pool: &PgPool, session_id: Uuid, pdf_url: &str) -> anyhow::Result<()> {
    sqlx::query(
        r#"
        INSERT INTO reports (session_id, kind, pdf_url)
        VALUES ($1, 'PDF', $2)
        ON CONFLICT (session_id) DO UPDATE SET pdf_url = EXCLUDED.pdf_url
        "#,
    )
    .bind(session_id)
    .bind(pdf_url)
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn list_reports(pool: &PgPool) -> anyhow::Result<Vec<ReportRow>> {
    let rows = sqlx::query("SELECT * FROM reports ORDER BY created_at DESC")
        .fetch_all(pool)
        .await?;

    Ok(rows
        .iter()
        .map(|row| ReportRow {
            id: row.get("id"),
            session_id: row.get("session_id"),
            kind: row.get("kind"),
            pdf_url: row.get("pdf_url"),
            created_at: row.get("created_at"),
        })
        .collect())
}

pub async fn seed(pool: &PgPool) -> anyhow::Result<()> {
    let org_id = Uuid::parse_str("8f6f0c7e-5dd2-4b6a-9a49-61c1b3f4a021")?;
    sqlx::query(
        r#"
        INSERT INTO organisations (id, name, licence_seats)
        VALUES ($1, $2, $3)
        ON CONFLICT (id) DO UPDATE SET name = EXCLUDED.name, licence_seats = EXCLUDED.licence_seats
        "#,
    )
    .bind(org_id)
    .bind("Evergreen Wellness Center")
    .bind(25)
    .execute(pool)
    .await?;

    let seniors = vec![
        (
            Uuid::parse_str("3d7f5d6f-24f7-4e8e-8b4b-3e7e44b4a7b2")?,
            "Margaret Olsen",
            "F",
            NaiveDate::from_ymd_opt(1948, 3, 12).context("invalid date")?,
            Some("010-5521-0341"),
            Some("010-9934-1187"),
        ),
        (
            Uuid::parse_str("0c22f1f1-9184-4fd4-9b21-28c68a6a89dc")?,
            "Harold Kim",
            "M",
            NaiveDate::from_ymd_opt(1952, 11, 3).context("invalid date")?,
            Some("010-2218-7765"),
            None,
        ),
        (
            Uuid::parse_str("d5a0a1a2-2a3c-44c2-8f73-60b7897a9dd2")?,
            "Doris Park",
            "F",
            NaiveDate::from_ymd_opt(1945, 7, 28).context("invalid date")?,
            None,
            Some("010-4431-9022"),
        ),
    ];

    for (id, name, gender, birth, phone, guardian_phone) in &seniors {
        sqlx::query(
            r#"
            INSERT INTO seniors (id, org_id, name, gender, birth, phone, guardian_phone)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            ON CONFLICT (id) DO UPDATE SET name = EXCLUDED.name
            "#,
        )
        .bind(id)
        .bind(org_id)
        .bind(name)
        .bind(gender)
        .bind(birth)
        .bind(phone)
        .bind(guardian_phone)
        .execute(pool)
        .await?;
    }

    let today = Utc::now().date_naive();
    let schedules = vec![
        ("b32f7c01-6d3a-4dd5-8a2e-b8c41e3d9f10", seniors[0].0, 3),
        ("5d1f4a92-0c7b-4f7e-b7d0-2a6a8e1c44f3", seniors[1].0, 2),
        ("9e8b3c54-7f21-4a0d-9c65-d4f2b7a8e019", seniors[2].0, 4),
    ];
    for (id, senior_id, per_week) in schedules {
        sqlx::query(
            r#"
            INSERT INTO schedules (id, senior_id, start_date, end_date, sessions_per_week, status)
            VALUES ($1, $2, $3, $4, $5, 'Active')
            ON CONFLICT (id) DO NOTHING
            "#,
        )
        .bind(Uuid::parse_str(id)?)
        .bind(senior_id)
        .bind(today - Duration::days(28))
        .bind(today + Duration::days(56))
        .bind(per_week)
        .execute(pool)
        .await?;
    }

    // Margaret trained recently, Harold is ten days idle, Doris never has.
    let motor_raw = json!({
        "exercise_type": "walking",
        "duration": 1800,
        "steps": 2400,
        "completion_rate": 95,
        "effort_level": "moderate",
        "score": 82
    });
    let cognitive_raw = json!({
        "test_type": "memory",
        "duration": 900,
        "total_questions": 20,
        "correct_answers": 17,
        "completion_rate": 90,
        "score": 78
    });

    let now = Utc::now();
    let motor_seed = vec![
        ("1a2b3c4d-0001-4a00-8000-000000000001", seniors[0].0, 1i64),
        ("1a2b3c4d-0001-4a00-8000-000000000002", seniors[1].0, 10),
    ];
    for (id, senior_id, days_ago) in motor_seed {
        sqlx::query(
            r#"
            INSERT INTO motor_results (id, senior_id, raw, video_key, bpm, created_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (id) DO NOTHING
            "#,
        )
        .bind(Uuid::parse_str(id)?)
        .bind(senior_id)
        .bind(&motor_raw)
        .bind(format!("training_videos/{senior_id}/seed.mp4"))
        .bind(140)
        .bind(now - Duration::days(days_ago))
        .execute(pool)
        .await?;
    }

    sqlx::query(
        r#"
        INSERT INTO cognitive_results (id, senior_id, raw, video_key, created_at)
        VALUES ($1, $2, $3, $4, $5)
        ON CONFLICT (id) DO NOTHING
        "#,
    )
    .bind(Uuid::parse_str("1a2b3c4d-0002-4a00-8000-000000000001")?)
    .bind(seniors[0].0)
    .bind(&cognitive_raw)
    .bind(format!("training_videos/{}/seed-cog.mp4", seniors[0].0))
    .bind(now - Duration::days(2))
    .execute(pool)
    .await?;

    Ok(())
}

pub async fn import_csv(pool: &PgPool, csv_path: &std::path::Path) -> anyhow::Result<usize> {
    #[derive(serde::Deserialize)]
    struct CsvRow {
        senior_id: Uuid,
        kind: String,
        video_key: String,
        created_at: DateTime<Utc>,
        bpm: Option<i32>,
        raw: Option<String>,
        source_key: Option<String>,
    }

    let mut reader = csv::Reader::from_path(csv_path)?;
    let mut inserted = 0usize;

    for result in reader.deserialize::<CsvRow>() {
        let row = result?;
        let kind: SessionKind = row.kind.parse()?;
        let raw: Value = match &row.raw {
            Some(text) => serde_json::from_str(text)
                .with_context(|| format!("invalid raw JSON for senior {}", row.senior_id))?,
            None => json!({}),
        };
        let source_key = row
            .source_key
            .unwrap_or_else(|| format!("import-{}", Uuid::new_v4()));

        let result = match kind {
            SessionKind::Motor => {
                sqlx::query(
                    r#"
                    INSERT INTO motor_results (id, senior_id, raw, video_key, bpm, source_key, created_at)
                    VALUES ($1, $2, $3, $4, $5, $6, $7)
                    ON CONFLICT (source_key) DO NOTHING
                    "#,
                )
                .bind(Uuid::new_v4())
                .bind(row.senior_id)
                .bind(&raw)
                .bind(&row.video_key)
                .bind(row.bpm)
                .bind(&source_key)
                .bind(row.created_at)
                .execute(pool)
                .await?
            }
            SessionKind::Cognitive => {
                sqlx::query(
                    r#"
                    INSERT INTO cognitive_results (id, senior_id, raw, video_key, source_key, created_at)
                    VALUES ($1, $2, $3, $4, $5, $6)
                    ON CONFLICT (source_key) DO NOTHING
                    "#,
                )
                .bind(Uuid::new_v4())
                .bind(row.senior_id)
                .bind(&raw)
                .bind(&row.video_key)
                .bind(&source_key)
                .bind(row.created_at)
                .execute(pool)
                .await?
            }
        };

        if result.rows_affected() > 0 {
            inserted += 1;
        }
    }

    Ok(inserted)
}
