use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use super::{Chemist, Doctor, User};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkType {
    FieldWork,
    OfficeWork,
    Leave,
    Holiday,
}

impl WorkType {
    pub fn as_str(&self) -> &'static str {
        match self {
            WorkType::FieldWork => "field_work",
            WorkType::OfficeWork => "office_work",
            WorkType::Leave => "leave",
            WorkType::Holiday => "holiday",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            WorkType::FieldWork => "Field Work",
            WorkType::OfficeWork => "Office Work",
            WorkType::Leave => "Leave",
            WorkType::Holiday => "Holiday",
        }
    }
}

/// Daily call report: what a representative did on one day.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DailyCallReport {
    pub id: i64,
    pub user: i64,
    #[serde(default)]
    pub user_details: Option<User>,
    pub date: NaiveDate,
    pub work_type: WorkType,
    pub summary: String,
    #[serde(default)]
    pub doctors_visited: Vec<i64>,
    #[serde(default)]
    pub doctors_visited_details: Vec<Doctor>,
    #[serde(default)]
    pub chemists_visited: Vec<i64>,
    #[serde(default)]
    pub chemists_visited_details: Vec<Chemist>,
    #[serde(default)]
    pub submitted_at: Option<DateTime<Utc>>,
}

impl DailyCallReport {
    pub fn total_calls(&self) -> usize {
        self.doctors_visited.len() + self.chemists_visited.len()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct NewDailyCallReport {
    pub date: NaiveDate,
    pub work_type: WorkType,
    pub summary: String,
    pub doctors_visited: Vec<i64>,
    pub chemists_visited: Vec<i64>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct DailyCallReportUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub work_type: Option<WorkType>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub doctors_visited: Option<Vec<i64>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chemists_visited: Option<Vec<i64>>,
}
