use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Gender {
    M,
    F,
}

impl Gender {
    pub fn as_str(&self) -> &'static str {
        match self {
            Gender::M => "M",
            Gender::F => "F",
        }
    }
}

impl FromStr for Gender {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "M" => Ok(Gender::M),
            "F" => Ok(Gender::F),
            other => Err(anyhow::anyhow!("unknown gender: {other}")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EduYear {
    None,
    Elementary,
    Middle,
    High,
    College,
}

impl EduYear {
    pub fn as_str(&self) -> &'static str {
        match self {
            EduYear::None => "none",
            EduYear::Elementary => "elementary",
            EduYear::Middle => "middle",
            EduYear::High => "high",
            EduYear::College => "college",
        }
    }
}

impl FromStr for EduYear {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "none" => Ok(EduYear::None),
            "elementary" => Ok(EduYear::Elementary),
            "middle" => Ok(EduYear::Middle),
            "high" => Ok(EduYear::High),
            "college" => Ok(EduYear::College),
            other => Err(anyhow::anyhow!("unknown eduyear: {other}")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ScheduleStatus {
    Active,
    Completed,
    Cancelled,
}

impl ScheduleStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScheduleStatus::Active => "Active",
            ScheduleStatus::Completed => "Completed",
            ScheduleStatus::Cancelled => "Cancelled",
        }
    }
}

impl FromStr for ScheduleStatus {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Active" => Ok(ScheduleStatus::Active),
            "Completed" => Ok(ScheduleStatus::Completed),
            "Cancelled" => Ok(ScheduleStatus::Cancelled),
            other => Err(anyhow::anyhow!("unknown schedule status: {other}")),
        }
    }
}

/// The two disjoint result kinds, unioned for activity purposes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionKind {
    Motor,
    Cognitive,
}

impl SessionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionKind::Motor => "motor",
            SessionKind::Cognitive => "cognitive",
        }
    }

    pub fn table(&self) -> &'static str {
        match self {
            SessionKind::Motor => "motor_results",
            SessionKind::Cognitive => "cognitive_results",
        }
    }
}

impl FromStr for SessionKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "motor" => Ok(SessionKind::Motor),
            "cognitive" => Ok(SessionKind::Cognitive),
            other => Err(anyhow::anyhow!("unknown result type: {other}")),
        }
    }
}

impl fmt::Display for SessionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct OrganisationRow {
    pub id: Uuid,
    pub name: String,
    pub licence_seats: i32,
}

#[derive(Debug, Clone, Serialize)]
pub struct SeniorRow {
    pub id: Uuid,
    pub org_id: Uuid,
    pub name: String,
    pub gender: Gender,
    pub birth: NaiveDate,
    pub eduyear: Option<EduYear>,
    pub phone: Option<String>,
    pub guardian_phone: Option<String>,
    pub address: Option<Value>,
    pub note: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ScheduleRow {
    pub id: Uuid,
    pub senior_id: Uuid,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub sessions_per_week: i32,
    pub status: ScheduleStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ScheduleWithSenior {
    #[serde(flatten)]
    pub schedule: ScheduleRow,
    pub senior_name: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ReportRow {
    pub id: Uuid,
    pub session_id: Uuid,
    #[serde(rename = "type")]
    pub kind: String,
    pub pdf_url: String,
    pub created_at: DateTime<Utc>,
}

/// One senior carrying an Active schedule, as the monitoring roster sees it.
#[derive(Debug, Clone)]
pub struct ActiveSenior {
    pub senior_id: Uuid,
    pub name: String,
    pub phone: Option<String>,
    pub guardian_phone: Option<String>,
    pub sessions_per_week: i32,
    pub status: ScheduleStatus,
}

/// A timestamped training event; motor and cognitive rows collapse to this.
#[derive(Debug, Clone)]
pub struct SessionEvent {
    pub senior_id: Uuid,
    pub created_at: DateTime<Utc>,
}

/// A result row joined with its senior, as the report pipeline needs it.
#[derive(Debug, Clone)]
pub struct SessionDetail {
    pub id: Uuid,
    pub senior_id: Uuid,
    pub senior_name: String,
    pub raw: Value,
    pub video_key: String,
    pub bpm: Option<i32>,
    pub created_at: DateTime<Utc>,
}

/// Senior row plus its Active schedule (if any), for the dashboard.
#[derive(Debug, Clone)]
pub struct SeniorActivity {
    pub id: Uuid,
    pub name: String,
    pub created_at: DateTime<Utc>,
    pub schedule_start: Option<NaiveDate>,
    pub sessions_per_week: Option<i32>,
}
