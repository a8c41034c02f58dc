//! Data models for field-force API resources.
//!
//! This module contains the data structures used to represent:
//!
//! - `User`, `Role`: accounts and their roles
//! - Workflows: `LeaveRequest`, `ExpenseClaim`, `TourProgram`, `DailyCallReport`
//! - Directories: `Doctor`, `Chemist` and their lookup types
//! - `Notification`, `Dashboard`, summary reports and analytics
//! - `workflow`: which review actions a viewer may take on a record

pub mod common;
pub mod contact;
pub mod dcr;
pub mod expense;
pub mod leave;
pub mod notification;
pub mod report;
pub mod tour;
pub mod user;
pub mod workflow;

pub use common::{ListParams, Page, ReviewComments, StatusMessage};
pub use contact::{Chemist, ChemistCategory, ContactInput, Doctor, DoctorSpecialty};
pub use dcr::{DailyCallReport, DailyCallReportUpdate, NewDailyCallReport, WorkType};
pub use expense::{Attachment, ExpenseClaim, ExpenseClaimForm, ExpenseType};
pub use leave::{ApprovalStatus, LeaveRequest, LeaveRequestUpdate, LeaveType, NewLeaveRequest};
pub use notification::{Notification, NotificationLevel};
pub use report::{
    Dashboard, DcrSummary, ExpenseSummary, LeaveSummary, PerformanceReport, UserPerformance,
};
pub use tour::{NewTourProgram, TourProgram, TourProgramUpdate, TourStatus};
pub use user::{Role, User};
pub use workflow::ReviewAction;
