use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use super::User;

/// Review state shared by leave requests and expense claims.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ApprovalStatus {
    Pending,
    Approved,
    Rejected,
    Queried,
    Cancelled,
}

impl ApprovalStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ApprovalStatus::Pending => "pending",
            ApprovalStatus::Approved => "approved",
            ApprovalStatus::Rejected => "rejected",
            ApprovalStatus::Queried => "queried",
            ApprovalStatus::Cancelled => "cancelled",
        }
    }

    /// No further review action is possible.
    pub fn is_final(&self) -> bool {
        matches!(
            self,
            ApprovalStatus::Approved | ApprovalStatus::Rejected | ApprovalStatus::Cancelled
        )
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LeaveType {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub is_paid: bool,
    /// 0 means unlimited.
    #[serde(default)]
    pub max_days_per_year: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LeaveRequest {
    pub id: i64,
    pub user: i64,
    #[serde(default)]
    pub user_details: Option<User>,
    pub leave_type: i64,
    #[serde(default)]
    pub leave_type_details: Option<LeaveType>,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    #[serde(default)]
    pub days_count: Option<i64>,
    pub reason: String,
    pub status: ApprovalStatus,
    #[serde(default)]
    pub requested_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub reviewed_by: Option<i64>,
    #[serde(default)]
    pub reviewed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub manager_comments: Option<String>,
}

impl LeaveRequest {
    /// Inclusive day count, computed locally when the server omits it.
    pub fn days(&self) -> i64 {
        self.days_count
            .unwrap_or_else(|| (self.end_date - self.start_date).num_days() + 1)
    }

    pub fn leave_type_name(&self) -> String {
        self.leave_type_details
            .as_ref()
            .map(|t| t.name.clone())
            .unwrap_or_else(|| format!("Type #{}", self.leave_type))
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct NewLeaveRequest {
    pub leave_type: i64,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub reason: String,
}

/// Partial update; unset fields are not sent.
#[derive(Debug, Clone, Default, Serialize)]
pub struct LeaveRequestUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub leave_type: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_date: Option<NaiveDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_date: Option<NaiveDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}
