//! Which review actions a viewer may take on a record.
//!
//! The server enforces permissions; these rules only decide what a client
//! should offer, so a record never shows actions the server would refuse in
//! the common case.

use super::{ApprovalStatus, DailyCallReport, ExpenseClaim, LeaveRequest, TourProgram, TourStatus, User};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReviewAction {
    Approve,
    Reject,
    Query,
    Cancel,
    Submit,
    Edit,
    Delete,
}

impl ReviewAction {
    /// Trailing path segment of the action endpoint, for actions that have one.
    pub fn path_segment(&self) -> Option<&'static str> {
        match self {
            ReviewAction::Approve => Some("approve"),
            ReviewAction::Reject => Some("reject"),
            ReviewAction::Query => Some("query"),
            ReviewAction::Cancel => Some("cancel"),
            ReviewAction::Submit => Some("submit"),
            ReviewAction::Edit | ReviewAction::Delete => None,
        }
    }

    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "approve" => Some(ReviewAction::Approve),
            "reject" => Some(ReviewAction::Reject),
            "query" => Some(ReviewAction::Query),
            "cancel" => Some(ReviewAction::Cancel),
            "submit" => Some(ReviewAction::Submit),
            "edit" => Some(ReviewAction::Edit),
            "delete" => Some(ReviewAction::Delete),
            _ => None,
        }
    }
}

pub fn leave_actions(viewer: &User, leave: &LeaveRequest) -> Vec<ReviewAction> {
    let mut actions = Vec::new();
    if leave.status != ApprovalStatus::Pending {
        return actions;
    }
    if leave.user == viewer.id {
        actions.push(ReviewAction::Cancel);
    }
    if viewer.is_manager() {
        actions.push(ReviewAction::Approve);
        actions.push(ReviewAction::Reject);
    }
    actions
}

/// Managers review MR claims; staff and superusers review managers' claims.
/// Query is only offered on a pending claim, approve/reject also on a
/// queried one.
pub fn expense_actions(viewer: &User, claim: &ExpenseClaim) -> Vec<ReviewAction> {
    let mut actions = Vec::new();
    if claim.status == ApprovalStatus::Pending && claim.user == viewer.id {
        actions.push(ReviewAction::Cancel);
    }

    let reviewable = matches!(claim.status, ApprovalStatus::Pending | ApprovalStatus::Queried);
    let claimant = claim.claimant_role();
    let may_review = match claimant.as_deref() {
        Some("mr") => viewer.is_manager(),
        Some("manager") => viewer.is_staff || viewer.is_superuser,
        _ => false,
    };
    if reviewable && may_review {
        actions.push(ReviewAction::Approve);
        actions.push(ReviewAction::Reject);
        if claim.status == ApprovalStatus::Pending {
            actions.push(ReviewAction::Query);
        }
    }
    actions
}

pub fn tour_actions(viewer: &User, tour: &TourProgram) -> Vec<ReviewAction> {
    match tour.status {
        TourStatus::Draft if tour.user == viewer.id => {
            vec![ReviewAction::Edit, ReviewAction::Submit]
        }
        TourStatus::Submitted if viewer.is_manager() || viewer.is_staff => {
            vec![ReviewAction::Approve, ReviewAction::Reject]
        }
        _ => Vec::new(),
    }
}

pub fn dcr_actions(viewer: &User, dcr: &DailyCallReport) -> Vec<ReviewAction> {
    if dcr.user == viewer.id || viewer.is_staff || viewer.is_manager() {
        vec![ReviewAction::Edit, ReviewAction::Delete]
    } else {
        Vec::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn user(id: i64, role: &str, is_staff: bool) -> User {
        serde_json::from_value(json!({
            "id": id, "email": format!("u{}@pharma.test", id), "role": role, "is_staff": is_staff
        }))
        .unwrap()
    }

    fn claim(owner: &User, status: &str) -> ExpenseClaim {
        serde_json::from_value(json!({
            "id": 1, "user": owner.id, "user_details": owner, "expense_type": 1,
            "amount": "10.00", "date": "2024-03-01", "description": "x", "status": status
        }))
        .unwrap()
    }

    fn leave(owner: i64, status: &str) -> LeaveRequest {
        serde_json::from_value(json!({
            "id": 1, "user": owner, "leave_type": 1, "start_date": "2024-03-01",
            "end_date": "2024-03-01", "reason": "x", "status": status
        }))
        .unwrap()
    }

    fn tour(owner: i64, status: &str) -> TourProgram {
        serde_json::from_value(json!({
            "id": 1, "user": owner, "month": 3, "year": 2024, "area_details": "x", "status": status
        }))
        .unwrap()
    }

    #[test]
    fn test_leave_actions() {
        let mr = user(1, "mr", false);
        let manager = user(2, "manager", false);

        assert_eq!(leave_actions(&mr, &leave(1, "pending")), vec![ReviewAction::Cancel]);
        assert_eq!(
            leave_actions(&manager, &leave(1, "pending")),
            vec![ReviewAction::Approve, ReviewAction::Reject]
        );
        assert!(leave_actions(&manager, &leave(1, "approved")).is_empty());
        assert!(leave_actions(&mr, &leave(3, "pending")).is_empty());
    }

    #[test]
    fn test_expense_review_depends_on_claimant_role() {
        let mr = user(1, "mr", false);
        let manager = user(2, "manager", false);
        let admin = user(3, "admin", true);

        assert_eq!(
            expense_actions(&manager, &claim(&mr, "pending")),
            vec![ReviewAction::Approve, ReviewAction::Reject, ReviewAction::Query]
        );
        // queried claims can still be decided but not queried again
        assert_eq!(
            expense_actions(&manager, &claim(&mr, "queried")),
            vec![ReviewAction::Approve, ReviewAction::Reject]
        );
        // managers do not review each other
        assert!(expense_actions(&user(4, "manager", false), &claim(&manager, "pending")).is_empty());
        assert_eq!(
            expense_actions(&admin, &claim(&manager, "pending")),
            vec![ReviewAction::Approve, ReviewAction::Reject, ReviewAction::Query]
        );
        assert_eq!(expense_actions(&mr, &claim(&mr, "pending")), vec![ReviewAction::Cancel]);
        assert!(expense_actions(&mr, &claim(&mr, "rejected")).is_empty());
    }

    #[test]
    fn test_tour_and_dcr_actions() {
        let mr = user(1, "mr", false);
        let manager = user(2, "manager", false);

        assert_eq!(tour_actions(&mr, &tour(1, "draft")), vec![ReviewAction::Edit, ReviewAction::Submit]);
        assert!(tour_actions(&manager, &tour(1, "draft")).is_empty());
        assert_eq!(
            tour_actions(&manager, &tour(1, "submitted")),
            vec![ReviewAction::Approve, ReviewAction::Reject]
        );
        assert!(tour_actions(&mr, &tour(1, "approved")).is_empty());

        let dcr: DailyCallReport = serde_json::from_value(json!({
            "id": 1, "user": 1, "date": "2024-03-01", "work_type": "leave", "summary": "x"
        }))
        .unwrap();
        assert_eq!(dcr_actions(&manager, &dcr), vec![ReviewAction::Edit, ReviewAction::Delete]);
        assert!(dcr_actions(&user(9, "mr", false), &dcr).is_empty());
    }

    #[test]
    fn test_action_names_round_trip() {
        for name in ["approve", "reject", "query", "cancel", "submit"] {
            let action = ReviewAction::parse(name).unwrap();
            assert_eq!(action.path_segment(), Some(name));
        }
        assert_eq!(ReviewAction::parse("edit").unwrap().path_segment(), None);
        assert!(ReviewAction::parse("archive").is_none());
    }
}
