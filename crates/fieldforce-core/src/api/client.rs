//! Typed wrappers for the field-force REST API.
//!
//! Every call goes through the `SessionManager`, so the bearer token is
//! attached and an expired token is refreshed transparently. Errors are
//! `anyhow::Error`s wrapping either an `ApiError` or an `AuthError`; callers
//! that need to branch on them use `downcast_ref`.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use reqwest::StatusCode;
use serde::{de::DeserializeOwned, Serialize};
use tracing::{debug, warn};

use super::request::{ApiRequest, ApiResponse};
use super::ApiError;
use crate::auth::SessionManager;
use crate::models::notification::UnreadCount;
use crate::models::{
    Chemist, ChemistCategory, ContactInput, DailyCallReport, DailyCallReportUpdate, Dashboard,
    DcrSummary, Doctor, DoctorSpecialty, ExpenseClaim, ExpenseClaimForm, ExpenseSummary,
    ExpenseType, LeaveRequest, LeaveRequestUpdate, LeaveSummary, LeaveType, ListParams,
    NewDailyCallReport, NewLeaveRequest, NewTourProgram, Notification, Page, PerformanceReport,
    ReviewAction, ReviewComments, StatusMessage, TourProgram, TourProgramUpdate, User,
    UserPerformance,
};

// ============================================================================
// Constants
// ============================================================================

/// Maximum number of retries for rate-limited (429) requests.
const MAX_RATE_LIMIT_RETRIES: u32 = 3;

/// Initial backoff delay in milliseconds for rate limiting.
const INITIAL_BACKOFF_MS: u64 = 1000;

const USERS: &str = "users/";
const DASHBOARD: &str = "dashboard/";
const LEAVE_TYPES: &str = "leaves/leave-types/";
const LEAVE_REQUESTS: &str = "leaves/leave-requests/";
const EXPENSE_TYPES: &str = "expenses/expense-types/";
const EXPENSE_CLAIMS: &str = "expenses/expense-claims/";
const DAILY_CALL_REPORTS: &str = "reports/daily-call-reports/";
const TOUR_PROGRAMS: &str = "tours/tour-programs/";
const DOCTOR_SPECIALTIES: &str = "masters/doctor-specialties/";
const CHEMIST_CATEGORIES: &str = "masters/chemist-categories/";
const DOCTORS: &str = "masters/doctors/";
const CHEMISTS: &str = "masters/chemists/";
const NOTIFICATIONS: &str = "notifications/";

/// Default size of the top performers widget.
pub const DEFAULT_TOP_PERFORMERS: u32 = 3;

/// Default look-back window of the top performers widget, in days.
pub const DEFAULT_PERFORMANCE_DAYS: u32 = 30;

fn item(collection: &str, id: i64) -> String {
    format!("{}{}/", collection, id)
}

fn action(collection: &str, id: i64, name: &str) -> String {
    format!("{}{}/{}/", collection, id, name)
}

/// Client for the field-force API.
/// Clone is cheap - the session is shared.
#[derive(Clone)]
pub struct ApiClient {
    session: Arc<SessionManager>,
}

impl ApiClient {
    pub fn new(session: Arc<SessionManager>) -> Self {
        Self { session }
    }

    pub fn session(&self) -> &SessionManager {
        &self.session
    }

    fn url(&self, path: &str) -> String {
        self.session.endpoints().api_url(path)
    }

    /// Send through the session, backing off on 429 and mapping error
    /// statuses to `ApiError`.
    async fn send(&self, request: ApiRequest) -> Result<ApiResponse> {
        let mut retries = 0;
        let mut backoff_ms = INITIAL_BACKOFF_MS;

        loop {
            let response = self.session.execute(request.clone()).await?;
            if response.status() != StatusCode::TOO_MANY_REQUESTS {
                return Ok(response.error_for_status()?);
            }

            // Rate limited
            retries += 1;
            if retries > MAX_RATE_LIMIT_RETRIES {
                return Err(ApiError::RateLimited.into());
            }
            warn!(url = request.url(), retry = retries, backoff_ms = backoff_ms, "Rate limited, backing off");
            tokio::time::sleep(Duration::from_millis(backoff_ms)).await;
            backoff_ms *= 2; // Exponential backoff
        }
    }

    async fn fetch<T: DeserializeOwned>(&self, request: ApiRequest) -> Result<T> {
        let url = request.url().to_string();
        let response = self.send(request).await?;
        response
            .json()
            .with_context(|| format!("Failed to parse JSON response from {}", url))
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        self.fetch(ApiRequest::get(self.url(path))).await
    }

    async fn get_list<T: DeserializeOwned>(&self, path: &str, params: &ListParams) -> Result<T> {
        self.fetch(ApiRequest::get(self.url(path)).query(params.to_query()))
            .await
    }

    /// Lookup tables come back as a page; only its rows are of interest.
    async fn get_results<T: DeserializeOwned>(&self, path: &str) -> Result<Vec<T>> {
        let page: Page<T> = self.get(path).await?;
        Ok(page.results)
    }

    async fn post<T: DeserializeOwned, B: Serialize + ?Sized>(&self, path: &str, body: &B) -> Result<T> {
        self.fetch(ApiRequest::post(self.url(path)).json(body)?).await
    }

    async fn post_empty<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        self.fetch(ApiRequest::post(self.url(path))).await
    }

    async fn patch<T: DeserializeOwned, B: Serialize + ?Sized>(&self, path: &str, body: &B) -> Result<T> {
        self.fetch(ApiRequest::patch(self.url(path)).json(body)?).await
    }

    async fn delete(&self, path: &str) -> Result<()> {
        self.send(ApiRequest::delete(self.url(path))).await?;
        Ok(())
    }

    /// POST to a review action endpoint. Decisions carry the reviewer's
    /// comments; cancel and submit have no body.
    async fn review<T: DeserializeOwned>(
        &self,
        collection: &str,
        id: i64,
        review: ReviewAction,
        comments: Option<&str>,
    ) -> Result<T> {
        let segment = review
            .path_segment()
            .ok_or_else(|| anyhow::anyhow!("{:?} is not a review action", review))?;
        let path = action(collection, id, segment);
        debug!(path = %path, "Review action");
        match review {
            ReviewAction::Approve | ReviewAction::Reject | ReviewAction::Query => {
                self.post(&path, &ReviewComments::new(comments.unwrap_or_default()))
                    .await
            }
            _ => self.post_empty(&path).await,
        }
    }

    // ===== Users =====

    pub async fn list_users(&self, params: &ListParams) -> Result<Page<User>> {
        self.get_list(USERS, params).await
    }

    pub async fn get_user(&self, id: i64) -> Result<User> {
        self.get(&item(USERS, id)).await
    }

    /// Fetch the signed-in user and cache it in the session.
    pub async fn current_user(&self) -> Result<User> {
        Ok(self.session.fetch_current_user().await?)
    }

    pub async fn dashboard(&self) -> Result<Dashboard> {
        self.get(DASHBOARD).await
    }

    // ===== Leave =====

    pub async fn leave_types(&self) -> Result<Vec<LeaveType>> {
        self.get_results(LEAVE_TYPES).await
    }

    pub async fn list_leave_requests(&self, params: &ListParams) -> Result<Page<LeaveRequest>> {
        self.get_list(LEAVE_REQUESTS, params).await
    }

    pub async fn get_leave_request(&self, id: i64) -> Result<LeaveRequest> {
        self.get(&item(LEAVE_REQUESTS, id)).await
    }

    pub async fn create_leave_request(&self, leave: &NewLeaveRequest) -> Result<LeaveRequest> {
        self.post(LEAVE_REQUESTS, leave).await
    }

    pub async fn update_leave_request(&self, id: i64, update: &LeaveRequestUpdate) -> Result<LeaveRequest> {
        self.patch(&item(LEAVE_REQUESTS, id), update).await
    }

    pub async fn cancel_leave_request(&self, id: i64) -> Result<LeaveRequest> {
        self.review(LEAVE_REQUESTS, id, ReviewAction::Cancel, None).await
    }

    pub async fn approve_leave_request(&self, id: i64, comments: &str) -> Result<LeaveRequest> {
        self.review(LEAVE_REQUESTS, id, ReviewAction::Approve, Some(comments))
            .await
    }

    pub async fn reject_leave_request(&self, id: i64, comments: &str) -> Result<LeaveRequest> {
        self.review(LEAVE_REQUESTS, id, ReviewAction::Reject, Some(comments))
            .await
    }

    // ===== Expenses =====

    pub async fn expense_types(&self) -> Result<Vec<ExpenseType>> {
        self.get_results(EXPENSE_TYPES).await
    }

    pub async fn list_expense_claims(&self, params: &ListParams) -> Result<Page<ExpenseClaim>> {
        self.get_list(EXPENSE_CLAIMS, params).await
    }

    pub async fn get_expense_claim(&self, id: i64) -> Result<ExpenseClaim> {
        self.get(&item(EXPENSE_CLAIMS, id)).await
    }

    /// Submit a claim as a multipart form, with the receipt if one is attached.
    pub async fn create_expense_claim(&self, claim: &ExpenseClaimForm) -> Result<ExpenseClaim> {
        let request = ApiRequest::post(self.url(EXPENSE_CLAIMS)).form(claim.to_fields());
        self.fetch(request).await
    }

    pub async fn update_expense_claim(&self, id: i64, claim: &ExpenseClaimForm) -> Result<ExpenseClaim> {
        let request = ApiRequest::patch(self.url(&item(EXPENSE_CLAIMS, id))).form(claim.to_fields());
        self.fetch(request).await
    }

    pub async fn cancel_expense_claim(&self, id: i64) -> Result<ExpenseClaim> {
        self.review(EXPENSE_CLAIMS, id, ReviewAction::Cancel, None).await
    }

    pub async fn approve_expense_claim(&self, id: i64, comments: &str) -> Result<ExpenseClaim> {
        self.review(EXPENSE_CLAIMS, id, ReviewAction::Approve, Some(comments))
            .await
    }

    pub async fn reject_expense_claim(&self, id: i64, comments: &str) -> Result<ExpenseClaim> {
        self.review(EXPENSE_CLAIMS, id, ReviewAction::Reject, Some(comments))
            .await
    }

    /// Send a claim back to the claimant with a question.
    pub async fn query_expense_claim(&self, id: i64, comments: &str) -> Result<ExpenseClaim> {
        self.review(EXPENSE_CLAIMS, id, ReviewAction::Query, Some(comments))
            .await
    }

    // ===== Daily call reports =====

    pub async fn list_daily_call_reports(&self, params: &ListParams) -> Result<Page<DailyCallReport>> {
        self.get_list(DAILY_CALL_REPORTS, params).await
    }

    pub async fn get_daily_call_report(&self, id: i64) -> Result<DailyCallReport> {
        self.get(&item(DAILY_CALL_REPORTS, id)).await
    }

    pub async fn create_daily_call_report(&self, report: &NewDailyCallReport) -> Result<DailyCallReport> {
        self.post(DAILY_CALL_REPORTS, report).await
    }

    pub async fn update_daily_call_report(
        &self,
        id: i64,
        update: &DailyCallReportUpdate,
    ) -> Result<DailyCallReport> {
        self.patch(&item(DAILY_CALL_REPORTS, id), update).await
    }

    pub async fn delete_daily_call_report(&self, id: i64) -> Result<()> {
        self.delete(&item(DAILY_CALL_REPORTS, id)).await
    }

    // ===== Tour programs =====

    pub async fn list_tour_programs(&self, params: &ListParams) -> Result<Page<TourProgram>> {
        self.get_list(TOUR_PROGRAMS, params).await
    }

    pub async fn get_tour_program(&self, id: i64) -> Result<TourProgram> {
        self.get(&item(TOUR_PROGRAMS, id)).await
    }

    pub async fn create_tour_program(&self, tour: &NewTourProgram) -> Result<TourProgram> {
        self.post(TOUR_PROGRAMS, tour).await
    }

    pub async fn update_tour_program(&self, id: i64, update: &TourProgramUpdate) -> Result<TourProgram> {
        self.patch(&item(TOUR_PROGRAMS, id), update).await
    }

    pub async fn submit_tour_program(&self, id: i64) -> Result<TourProgram> {
        self.review(TOUR_PROGRAMS, id, ReviewAction::Submit, None).await
    }

    pub async fn approve_tour_program(&self, id: i64, comments: &str) -> Result<TourProgram> {
        self.review(TOUR_PROGRAMS, id, ReviewAction::Approve, Some(comments))
            .await
    }

    pub async fn reject_tour_program(&self, id: i64, comments: &str) -> Result<TourProgram> {
        self.review(TOUR_PROGRAMS, id, ReviewAction::Reject, Some(comments))
            .await
    }

    // ===== Contacts =====

    pub async fn doctor_specialties(&self) -> Result<Vec<DoctorSpecialty>> {
        self.get_results(DOCTOR_SPECIALTIES).await
    }

    pub async fn chemist_categories(&self) -> Result<Vec<ChemistCategory>> {
        self.get_results(CHEMIST_CATEGORIES).await
    }

    pub async fn list_doctors(&self, params: &ListParams) -> Result<Page<Doctor>> {
        self.get_list(DOCTORS, params).await
    }

    pub async fn get_doctor(&self, id: i64) -> Result<Doctor> {
        self.get(&item(DOCTORS, id)).await
    }

    pub async fn create_doctor(&self, doctor: &ContactInput) -> Result<Doctor> {
        self.post(DOCTORS, &doctor.doctor_body()).await
    }

    pub async fn update_doctor(&self, id: i64, doctor: &ContactInput) -> Result<Doctor> {
        self.patch(&item(DOCTORS, id), &doctor.doctor_body()).await
    }

    pub async fn delete_doctor(&self, id: i64) -> Result<()> {
        self.delete(&item(DOCTORS, id)).await
    }

    pub async fn list_chemists(&self, params: &ListParams) -> Result<Page<Chemist>> {
        self.get_list(CHEMISTS, params).await
    }

    pub async fn get_chemist(&self, id: i64) -> Result<Chemist> {
        self.get(&item(CHEMISTS, id)).await
    }

    pub async fn create_chemist(&self, chemist: &ContactInput) -> Result<Chemist> {
        self.post(CHEMISTS, &chemist.chemist_body()).await
    }

    pub async fn update_chemist(&self, id: i64, chemist: &ContactInput) -> Result<Chemist> {
        self.patch(&item(CHEMISTS, id), &chemist.chemist_body()).await
    }

    pub async fn delete_chemist(&self, id: i64) -> Result<()> {
        self.delete(&item(CHEMISTS, id)).await
    }

    // ===== Notifications =====

    pub async fn list_notifications(&self, params: &ListParams) -> Result<Page<Notification>> {
        self.get_list(NOTIFICATIONS, params).await
    }

    pub async fn unread_notification_count(&self) -> Result<u64> {
        let count: UnreadCount = self.get(&format!("{}unread_count/", NOTIFICATIONS)).await?;
        Ok(count.unread_count)
    }

    pub async fn mark_notification_read(&self, id: i64) -> Result<StatusMessage> {
        self.post_empty(&action(NOTIFICATIONS, id, "mark_as_read")).await
    }

    pub async fn mark_all_notifications_read(&self) -> Result<StatusMessage> {
        self.post_empty(&format!("{}mark_all_as_read/", NOTIFICATIONS))
            .await
    }

    // ===== Reports and analytics =====

    pub async fn dcr_summary(&self, params: &ListParams) -> Result<DcrSummary> {
        self.get_list("reports/dcr-summary/", params).await
    }

    pub async fn expense_summary(&self, params: &ListParams) -> Result<ExpenseSummary> {
        self.get_list("reports/expense-summary/", params).await
    }

    pub async fn leave_summary(&self, params: &ListParams) -> Result<LeaveSummary> {
        self.get_list("reports/leave-summary/", params).await
    }

    /// Scores for the caller's team (managers) or all MRs (admins).
    pub async fn performance_report(&self, params: &ListParams) -> Result<PerformanceReport> {
        self.get_list("analytics/performance-report/", params).await
    }

    pub async fn top_performers(&self, limit: u32, days: u32) -> Result<Vec<UserPerformance>> {
        let params = ListParams::new()
            .with("limit", limit.to_string())
            .with("days", days.to_string());
        self.get_list("analytics/top-performers/", &params).await
    }
}
