use chrono::{DateTime, Month, Utc};
use serde::{Deserialize, Serialize};

use super::User;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TourStatus {
    Draft,
    Submitted,
    Approved,
    Rejected,
}

impl TourStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TourStatus::Draft => "draft",
            TourStatus::Submitted => "submitted",
            TourStatus::Approved => "approved",
            TourStatus::Rejected => "rejected",
        }
    }
}

/// Monthly plan of the areas a representative will cover.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TourProgram {
    pub id: i64,
    pub user: i64,
    #[serde(default)]
    pub user_details: Option<User>,
    pub month: u32,
    #[serde(default)]
    pub month_name: Option<String>,
    pub year: i32,
    pub area_details: String,
    pub status: TourStatus,
    #[serde(default)]
    pub submitted_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub reviewed_by: Option<i64>,
    #[serde(default)]
    pub reviewer_details: Option<User>,
    #[serde(default)]
    pub reviewed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub manager_comments: Option<String>,
}

impl TourProgram {
    /// "March 2024"
    pub fn period(&self) -> String {
        let month = self.month_name.clone().unwrap_or_else(|| {
            u8::try_from(self.month)
                .ok()
                .and_then(|m| Month::try_from(m).ok())
                .map(|m| m.name().to_string())
                .unwrap_or_else(|| self.month.to_string())
        });
        format!("{} {}", month, self.year)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct NewTourProgram {
    pub month: u32,
    pub year: i32,
    pub area_details: String,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct TourProgramUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub month: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub year: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub area_details: Option<String>,
}
