//! Request payloads arrive as loose JSON and are validated into typed
//! structs here, so every missing or malformed field surfaces as a 400 with
//! a readable message rather than a serde rejection.

use chrono::{Datelike, NaiveDate};
use serde::Deserialize;
use serde_json::Value;
use uuid::Uuid;

use crate::error::ApiError;
use crate::models::{EduYear, Gender, ScheduleStatus, SessionKind};

pub const MIN_AGE: i32 = 50;
pub const MAX_SESSIONS_PER_WEEK: i32 = 14;

#[derive(Debug, Deserialize)]
pub struct CreateSeniorPayload {
    pub org_id: Option<String>,
    pub name: Option<String>,
    pub gender: Option<String>,
    pub birth: Option<String>,
    pub eduyear: Option<String>,
    pub phone: Option<String>,
    pub guardian_phone: Option<String>,
    pub address: Option<Value>,
    pub note: Option<String>,
}

#[derive(Debug)]
pub struct NewSenior {
    pub org_id: Uuid,
    pub name: String,
    pub gender: Gender,
    pub birth: NaiveDate,
    pub eduyear: Option<EduYear>,
    pub phone: Option<String>,
    pub guardian_phone: Option<String>,
    pub address: Option<Value>,
    pub note: Option<String>,
}

fn validation(message: impl Into<String>) -> ApiError {
    ApiError::Validation(message.into())
}

fn parse_uuid(value: &str, field: &str) -> Result<Uuid, ApiError> {
    value
        .parse()
        .map_err(|_| validation(format!("{field} must be a valid UUID")))
}

fn parse_date(value: &str, field: &str) -> Result<NaiveDate, ApiError> {
    value
        .parse()
        .map_err(|_| validation(format!("{field} must be an ISO date (YYYY-MM-DD)")))
}

fn trimmed(value: Option<String>) -> Option<String> {
    value
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

pub fn validate_create_senior(
    payload: CreateSeniorPayload,
    today: NaiveDate,
) -> Result<NewSenior, ApiError> {
    let (Some(org_id), Some(name), Some(gender), Some(birth)) = (
        payload.org_id,
        trimmed(payload.name),
        payload.gender,
        payload.birth,
    ) else {
        return Err(validation(
            "Missing required fields: org_id, name, gender, birth",
        ));
    };

    let org_id = parse_uuid(&org_id, "org_id")?;
    let gender: Gender = gender
        .parse()
        .map_err(|_| validation("gender must be M or F"))?;
    let birth = parse_date(&birth, "birth")?;

    if birth > today {
        return Err(validation("Birth date cannot be in the future"));
    }
    if today.year() - birth.year() < MIN_AGE {
        return Err(validation(
            "Age must be 50 or older for senior care programs",
        ));
    }

    let eduyear = match payload.eduyear {
        Some(value) => Some(
            value
                .parse::<EduYear>()
                .map_err(|_| validation("eduyear must be one of none, elementary, middle, high, college"))?,
        ),
        None => None,
    };

    Ok(NewSenior {
        org_id,
        name,
        gender,
        birth,
        eduyear,
        phone: trimmed(payload.phone),
        guardian_phone: trimmed(payload.guardian_phone),
        address: payload.address,
        note: trimmed(payload.note),
    })
}

#[derive(Debug, Deserialize)]
pub struct UpdateSeniorPayload {
    pub name: Option<String>,
    pub gender: Option<String>,
    pub birth: Option<String>,
    pub eduyear: Option<String>,
    pub phone: Option<String>,
    pub guardian_phone: Option<String>,
    pub address: Option<Value>,
    pub note: Option<String>,
}

#[derive(Debug, Default)]
pub struct SeniorPatch {
    pub name: Option<String>,
    pub gender: Option<Gender>,
    pub birth: Option<NaiveDate>,
    pub eduyear: Option<EduYear>,
    pub phone: Option<String>,
    pub guardian_phone: Option<String>,
    pub address: Option<Value>,
    pub note: Option<String>,
}

pub fn validate_update_senior(
    payload: UpdateSeniorPayload,
    today: NaiveDate,
) -> Result<SeniorPatch, ApiError> {
    let gender = match payload.gender {
        Some(value) => Some(
            value
                .parse::<Gender>()
                .map_err(|_| validation("gender must be M or F"))?,
        ),
        None => None,
    };

    let birth = match payload.birth {
        Some(value) => {
            let birth = parse_date(&value, "birth")?;
            if birth > today {
                return Err(validation("Birth date cannot be in the future"));
            }
            if today.year() - birth.year() < MIN_AGE {
                return Err(validation(
                    "Age must be 50 or older for senior care programs",
                ));
            }
            Some(birth)
        }
        None => None,
    };

    let eduyear = match payload.eduyear {
        Some(value) => Some(
            value
                .parse::<EduYear>()
                .map_err(|_| validation("eduyear must be one of none, elementary, middle, high, college"))?,
        ),
        None => None,
    };

    Ok(SeniorPatch {
        name: trimmed(payload.name),
        gender,
        birth,
        eduyear,
        phone: trimmed(payload.phone),
        guardian_phone: trimmed(payload.guardian_phone),
        address: payload.address,
        note: trimmed(payload.note),
    })
}

pub fn check_licence(current_seniors: i64, licence_seats: i32) -> Result<(), ApiError> {
    if current_seniors >= i64::from(licence_seats) {
        return Err(ApiError::LicenceLimit {
            current: current_seniors,
            limit: licence_seats,
        });
    }
    Ok(())
}

#[derive(Debug, Deserialize)]
pub struct CreateSchedulePayload {
    pub senior_id: Option<String>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    pub sessions_per_week: Option<i32>,
    pub status: Option<String>,
}

#[derive(Debug)]
pub struct NewSchedule {
    pub senior_id: Uuid,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub sessions_per_week: i32,
    pub status: ScheduleStatus,
}

pub fn validate_create_schedule(payload: CreateSchedulePayload) -> Result<NewSchedule, ApiError> {
    let (Some(senior_id), Some(start_date), Some(end_date), Some(sessions_per_week)) = (
        payload.senior_id,
        payload.start_date,
        payload.end_date,
        payload.sessions_per_week,
    ) else {
        return Err(validation(
            "Missing required fields: senior_id, start_date, end_date, sessions_per_week",
        ));
    };

    let senior_id = parse_uuid(&senior_id, "senior_id")?;
    let start_date = parse_date(&start_date, "start_date")?;
    let end_date = parse_date(&end_date, "end_date")?;
    if end_date < start_date {
        return Err(validation("end_date must not be before start_date"));
    }
    if !(1..=MAX_SESSIONS_PER_WEEK).contains(&sessions_per_week) {
        return Err(validation(format!(
            "sessions_per_week must be between 1 and {MAX_SESSIONS_PER_WEEK}"
        )));
    }

    let status = match payload.status {
        Some(value) => value
            .parse()
            .map_err(|_| validation("status must be Active, Completed, or Cancelled"))?,
        None => ScheduleStatus::Active,
    };

    Ok(NewSchedule {
        senior_id,
        start_date,
        end_date,
        sessions_per_week,
        status,
    })
}

#[derive(Debug, Deserialize)]
pub struct UpdateSchedulePayload {
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    pub sessions_per_week: Option<i32>,
    pub status: Option<String>,
}

#[derive(Debug, Default)]
pub struct SchedulePatch {
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub sessions_per_week: Option<i32>,
    pub status: Option<ScheduleStatus>,
}

pub fn validate_update_schedule(payload: UpdateSchedulePayload) -> Result<SchedulePatch, ApiError> {
    let start_date = match payload.start_date {
        Some(value) => Some(parse_date(&value, "start_date")?),
        None => None,
    };
    let end_date = match payload.end_date {
        Some(value) => Some(parse_date(&value, "end_date")?),
        None => None,
    };
    if let (Some(start), Some(end)) = (start_date, end_date) {
        if end < start {
            return Err(validation("end_date must not be before start_date"));
        }
    }

    if let Some(per_week) = payload.sessions_per_week {
        if !(1..=MAX_SESSIONS_PER_WEEK).contains(&per_week) {
            return Err(validation(format!(
                "sessions_per_week must be between 1 and {MAX_SESSIONS_PER_WEEK}"
            )));
        }
    }

    let status = match payload.status {
        Some(value) => Some(
            value
                .parse::<ScheduleStatus>()
                .map_err(|_| validation("status must be Active, Completed, or Cancelled"))?,
        ),
        None => None,
    };

    Ok(SchedulePatch {
        start_date,
        end_date,
        sessions_per_week: payload.sessions_per_week,
        status,
    })
}

#[derive(Debug, Deserialize)]
pub struct UploadResultsPayload {
    pub senior_id: Option<String>,
    pub result_type: Option<String>,
    pub raw_data: Option<Value>,
    pub video_key: Option<String>,
    pub bpm: Option<i32>,
}

#[derive(Debug)]
pub struct NewResult {
    pub senior_id: Uuid,
    pub kind: SessionKind,
    pub raw: Value,
    pub video_key: String,
    pub bpm: Option<i32>,
}

pub fn validate_upload_results(payload: UploadResultsPayload) -> Result<NewResult, ApiError> {
    let (Some(senior_id), Some(result_type), Some(raw), Some(video_key)) = (
        payload.senior_id,
        payload.result_type,
        payload.raw_data,
        trimmed(payload.video_key),
    ) else {
        return Err(validation(
            "Missing required fields: senior_id, result_type, raw_data, video_key",
        ));
    };

    let senior_id = parse_uuid(&senior_id, "senior_id")?;
    let kind = result_type
        .parse()
        .map_err(|_| validation("Invalid result type"))?;

    Ok(NewResult {
        senior_id,
        kind,
        raw,
        video_key,
        bpm: payload.bpm,
    })
}

#[derive(Debug, Deserialize)]
pub struct GenerateReportPayload {
    pub session_id: Option<String>,
    pub result_type: Option<String>,
}

pub fn validate_generate_report(
    payload: GenerateReportPayload,
) -> Result<(Uuid, SessionKind), ApiError> {
    let (Some(session_id), Some(result_type)) = (payload.session_id, payload.result_type) else {
        return Err(validation("Missing session_id or result_type"));
    };

    let session_id = parse_uuid(&session_id, "session_id")?;
    let kind = result_type
        .parse()
        .map_err(|_| validation("Invalid result type"))?;

    Ok((session_id, kind))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 8, 19).unwrap()
    }

    fn full_payload() -> CreateSeniorPayload {
        CreateSeniorPayload {
            org_id: Some(Uuid::new_v4().to_string()),
            name: Some("  Margaret Olsen  ".to_string()),
            gender: Some("F".to_string()),
            birth: Some("1951-04-02".to_string()),
            eduyear: Some("high".to_string()),
            phone: Some("010-1234-5678".to_string()),
            guardian_phone: Some("   ".to_string()),
            address: Some(json!({ "city": "Busan" })),
            note: None,
        }
    }

    #[test]
    fn accepts_and_trims_a_full_payload() {
        let senior = validate_create_senior(full_payload(), today()).unwrap();
        assert_eq!(senior.name, "Margaret Olsen");
        assert_eq!(senior.gender, Gender::F);
        assert_eq!(senior.eduyear, Some(EduYear::High));
        assert_eq!(senior.guardian_phone, None);
    }

    #[test]
    fn rejects_missing_required_fields() {
        let payload = CreateSeniorPayload {
            name: None,
            ..full_payload()
        };
        let err = validate_create_senior(payload, today()).unwrap_err();
        assert!(err.to_string().contains("Missing required fields"));
    }

    #[test]
    fn rejects_seniors_under_fifty() {
        let payload = CreateSeniorPayload {
            birth: Some("2016-08-19".to_string()),
            ..full_payload()
        };
        let err = validate_create_senior(payload, today()).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Age must be 50 or older for senior care programs"
        );
    }

    #[test]
    fn rejects_future_birth_dates() {
        let payload = CreateSeniorPayload {
            birth: Some("2030-01-01".to_string()),
            ..full_payload()
        };
        let err = validate_create_senior(payload, today()).unwrap_err();
        assert_eq!(err.to_string(), "Birth date cannot be in the future");
    }

    #[test]
    fn rejects_unknown_gender_and_eduyear() {
        let payload = CreateSeniorPayload {
            gender: Some("X".to_string()),
            ..full_payload()
        };
        assert!(validate_create_senior(payload, today()).is_err());

        let payload = CreateSeniorPayload {
            eduyear: Some("phd".to_string()),
            ..full_payload()
        };
        assert!(validate_create_senior(payload, today()).is_err());
    }

    #[test]
    fn licence_check_blocks_full_organisations() {
        assert!(check_licence(4, 5).is_ok());
        let err = check_licence(5, 5).unwrap_err();
        assert_eq!(err.to_string(), "License limit reached");
        assert!(check_licence(6, 5).is_err());
    }

    #[test]
    fn schedule_rejects_inverted_dates_and_bad_frequency() {
        let base = CreateSchedulePayload {
            senior_id: Some(Uuid::new_v4().to_string()),
            start_date: Some("2026-08-01".to_string()),
            end_date: Some("2026-09-30".to_string()),
            sessions_per_week: Some(3),
            status: None,
        };
        let schedule = validate_create_schedule(base).unwrap();
        assert_eq!(schedule.status, ScheduleStatus::Active);

        let inverted = CreateSchedulePayload {
            senior_id: Some(Uuid::new_v4().to_string()),
            start_date: Some("2026-09-30".to_string()),
            end_date: Some("2026-08-01".to_string()),
            sessions_per_week: Some(3),
            status: None,
        };
        assert!(validate_create_schedule(inverted).is_err());

        let zero = CreateSchedulePayload {
            senior_id: Some(Uuid::new_v4().to_string()),
            start_date: Some("2026-08-01".to_string()),
            end_date: Some("2026-09-30".to_string()),
            sessions_per_week: Some(0),
            status: None,
        };
        assert!(validate_create_schedule(zero).is_err());
    }

    #[test]
    fn upload_requires_all_fields_and_a_known_kind() {
        let payload = UploadResultsPayload {
            senior_id: Some(Uuid::new_v4().to_string()),
            result_type: Some("motor".to_string()),
            raw_data: Some(json!({ "steps": 2400 })),
            video_key: Some("training_videos/abc.mp4".to_string()),
            bpm: Some(140),
        };
        let result = validate_upload_results(payload).unwrap();
        assert_eq!(result.kind, SessionKind::Motor);

        let bad_kind = UploadResultsPayload {
            senior_id: Some(Uuid::new_v4().to_string()),
            result_type: Some("strength".to_string()),
            raw_data: Some(json!({})),
            video_key: Some("k".to_string()),
            bpm: None,
        };
        let err = validate_upload_results(bad_kind).unwrap_err();
        assert_eq!(err.to_string(), "Invalid result type");
    }

    #[test]
    fn generate_report_requires_both_fields() {
        let err = validate_generate_report(GenerateReportPayload {
            session_id: Some(Uuid::new_v4().to_string()),
            result_type: None,
        })
        .unwrap_err();
        assert_eq!(err.to_string(), "Missing session_id or result_type");
    }
}
