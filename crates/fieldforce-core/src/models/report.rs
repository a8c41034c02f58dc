//! Dashboard, summary reports and performance analytics.
//!
//! These are read-only aggregates computed server-side; the client only
//! parses them. Maps keyed by date use `YYYY-MM-DD` strings.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::common::{de_decimal, de_opt_decimal};
use super::User;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpcomingEvent {
    pub date: NaiveDate,
    pub title: String,
    #[serde(rename = "type")]
    pub kind: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TourProgramStatus {
    pub current_month: u32,
    pub current_year: i32,
    /// A tour status, or "Not submitted" when none exists for the month.
    pub status: String,
    #[serde(default)]
    pub area_details: String,
}

/// Role-dependent landing page data.
///
/// The summary card keys differ per role (MR, manager, admin), so they are
/// kept as an ordered map rather than fixed fields.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Dashboard {
    pub welcome_message: String,
    #[serde(default)]
    pub role: Option<String>,
    #[serde(default)]
    pub upcoming_events: Vec<UpcomingEvent>,
    #[serde(default)]
    pub summary_cards: BTreeMap<String, i64>,
    #[serde(default)]
    pub tour_program: Option<TourProgramStatus>,
    #[serde(default)]
    pub team_summary: Option<BTreeMap<String, i64>>,
    #[serde(default)]
    pub system_summary: Option<BTreeMap<String, i64>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DcrSummary {
    pub total_dcrs: u64,
    #[serde(default)]
    pub field_work_count: u64,
    #[serde(default)]
    pub office_work_count: u64,
    #[serde(default)]
    pub leave_count: u64,
    #[serde(default)]
    pub holiday_count: u64,
    #[serde(default)]
    pub total_doctors_visited: u64,
    #[serde(default)]
    pub total_chemists_visited: u64,
    #[serde(default)]
    pub dcr_by_date: BTreeMap<String, u64>,
    #[serde(default)]
    pub dcrs: Vec<DcrSummaryRow>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DcrSummaryRow {
    pub id: i64,
    pub date: NaiveDate,
    pub user: String,
    pub work_type: String,
    pub summary: String,
    #[serde(default)]
    pub doctors_count: u64,
    #[serde(default)]
    pub chemists_count: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExpenseSummary {
    pub total_expenses: u64,
    #[serde(deserialize_with = "de_decimal")]
    pub total_amount: f64,
    #[serde(default)]
    pub pending_count: u64,
    #[serde(default)]
    pub approved_count: u64,
    #[serde(default)]
    pub rejected_count: u64,
    #[serde(default)]
    pub queried_count: u64,
    #[serde(default)]
    pub expense_by_type: BTreeMap<String, serde_json::Value>,
    #[serde(default)]
    pub expense_by_date: BTreeMap<String, f64>,
    #[serde(default)]
    pub expenses: Vec<ExpenseSummaryRow>,
}

impl ExpenseSummary {
    /// Per-type totals; the server sends these as decimal strings or numbers.
    pub fn totals_by_type(&self) -> BTreeMap<String, f64> {
        self.expense_by_type
            .iter()
            .filter_map(|(name, value)| {
                let amount = match value {
                    serde_json::Value::Number(n) => n.as_f64(),
                    serde_json::Value::String(s) => s.parse().ok(),
                    _ => None,
                }?;
                Some((name.clone(), amount))
            })
            .collect()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExpenseSummaryRow {
    pub id: i64,
    pub date: NaiveDate,
    pub user: String,
    pub expense_type: String,
    #[serde(deserialize_with = "de_decimal")]
    pub amount: f64,
    pub status: String,
    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LeaveSummary {
    pub total_leaves: u64,
    #[serde(default)]
    pub total_days: u64,
    #[serde(default)]
    pub pending_count: u64,
    #[serde(default)]
    pub approved_count: u64,
    #[serde(default)]
    pub rejected_count: u64,
    #[serde(default)]
    pub cancelled_count: u64,
    #[serde(default)]
    pub leave_by_type: BTreeMap<String, u64>,
    #[serde(default)]
    pub leave_by_date: BTreeMap<String, u64>,
    #[serde(default)]
    pub leaves: Vec<LeaveSummaryRow>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LeaveSummaryRow {
    pub id: i64,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub days: i64,
    pub user: String,
    pub leave_type: String,
    pub status: String,
    #[serde(default)]
    pub reason: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PerformanceKpis {
    pub dcr_compliance: f64,
    pub call_average: f64,
    pub tp_submission: f64,
    pub expense_efficiency: f64,
    #[serde(default)]
    pub total_dcrs: u64,
    #[serde(default)]
    pub working_days: u64,
    #[serde(default)]
    pub field_work_days: u64,
    #[serde(default)]
    pub total_doctors_visited: u64,
    #[serde(default)]
    pub total_chemists_visited: u64,
    #[serde(default, deserialize_with = "de_opt_decimal")]
    pub total_expense_amount: Option<f64>,
    #[serde(default)]
    pub tp_submitted: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserPerformance {
    pub user: User,
    pub performance_score: f64,
    #[serde(default)]
    pub rank: Option<u32>,
    #[serde(default)]
    pub kpis: Option<PerformanceKpis>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PerformanceReport {
    pub period_start: NaiveDate,
    pub period_end: NaiveDate,
    pub total_users: u64,
    pub performances: Vec<UserPerformance>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_manager_dashboard() {
        let json = r#"{
            "welcome_message": "Welcome, Priya", "role": "manager",
            "upcoming_events": [{"date": "2024-03-08", "title": "Holi", "type": "holiday"}],
            "summary_cards": {"team_members": 12, "pending_tp_approvals": 3,
                              "pending_leave_approvals": 1, "pending_expense_approvals": 4},
            "tour_program": {"current_month": 3, "current_year": 2024, "status": "Not submitted", "area_details": ""},
            "team_summary": {"total_doctors": 140, "total_chemists": 55}
        }"#;
        let dash: Dashboard = serde_json::from_str(json).unwrap();
        assert_eq!(dash.summary_cards["pending_expense_approvals"], 4);
        assert_eq!(dash.upcoming_events[0].kind, "holiday");
        assert_eq!(dash.team_summary.unwrap()["total_doctors"], 140);
        assert!(dash.system_summary.is_none());
    }

    #[test]
    fn test_expense_summary_totals_by_type() {
        let json = r#"{"total_expenses": 3, "total_amount": "4200.00", "pending_count": 1,
            "approved_count": 2, "rejected_count": 0, "queried_count": 0,
            "expense_by_type": {"Travel": "3000.00", "Meals": 1200.0},
            "expense_by_date": {"2024-03-01": 4200.0}}"#;
        let summary: ExpenseSummary = serde_json::from_str(json).unwrap();
        assert_eq!(summary.total_amount, 4200.0);
        let totals = summary.totals_by_type();
        assert_eq!(totals["Travel"], 3000.0);
        assert_eq!(totals["Meals"], 1200.0);
    }

    #[test]
    fn test_parse_leave_summary_detailed() {
        let json = r#"{"total_leaves": 1, "total_days": 2, "pending_count": 0,
            "approved_count": 1, "rejected_count": 0, "cancelled_count": 0,
            "leave_by_type": {"Sick Leave": 1}, "leave_by_date": {"2024-02-01": 1},
            "leaves": [{"id": 4, "start_date": "2024-02-01", "end_date": "2024-02-02",
                        "days": 2, "user": "Asha Rao", "leave_type": "Sick Leave",
                        "status": "approved", "reason": "Fever"}]}"#;
        let summary: LeaveSummary = serde_json::from_str(json).unwrap();
        assert_eq!(summary.leaves.len(), 1);
        assert_eq!(summary.leaves[0].days, 2);
    }
}
