use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use super::common::{de_decimal, de_opt_decimal};
use super::{ApprovalStatus, User};
use crate::api::request::{FormField, FormValue};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExpenseType {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub code: Option<String>,
    /// 0 means no cap.
    #[serde(default, deserialize_with = "de_opt_decimal")]
    pub max_amount: Option<f64>,
    #[serde(default)]
    pub requires_receipt: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExpenseClaim {
    pub id: i64,
    pub user: i64,
    #[serde(default)]
    pub user_details: Option<User>,
    pub expense_type: i64,
    #[serde(default)]
    pub expense_type_details: Option<ExpenseType>,
    #[serde(deserialize_with = "de_decimal")]
    pub amount: f64,
    pub date: NaiveDate,
    pub description: String,
    pub status: ApprovalStatus,
    #[serde(default)]
    pub submitted_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub reviewed_by: Option<i64>,
    #[serde(default)]
    pub reviewed_by_details: Option<User>,
    #[serde(default)]
    pub reviewed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub manager_comments: Option<String>,
    #[serde(default)]
    pub attachment_url: Option<String>,
}

impl ExpenseClaim {
    /// Role of the claimant as reported in `user_details`, lowercased.
    pub fn claimant_role(&self) -> Option<String> {
        self.user_details
            .as_ref()
            .and_then(|u| u.role.as_deref())
            .map(str::to_ascii_lowercase)
    }
}

/// A receipt or other supporting document.
#[derive(Clone)]
pub struct Attachment {
    pub file_name: String,
    pub mime: String,
    pub bytes: Vec<u8>,
}

impl std::fmt::Debug for Attachment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Attachment")
            .field("file_name", &self.file_name)
            .field("mime", &self.mime)
            .field("len", &self.bytes.len())
            .finish()
    }
}

/// Fields of a new or edited claim. Sent as a multipart form since the
/// claim may carry an attachment.
#[derive(Debug, Clone, Default)]
pub struct ExpenseClaimForm {
    pub expense_type: Option<i64>,
    pub amount: Option<f64>,
    pub date: Option<NaiveDate>,
    pub description: Option<String>,
    pub attachment: Option<Attachment>,
}

impl ExpenseClaimForm {
    /// Build form fields, skipping anything unset.
    pub fn to_fields(&self) -> Vec<FormField> {
        let mut fields = Vec::new();
        let mut text = |name: &str, value: String| {
            fields.push(FormField {
                name: name.to_string(),
                value: FormValue::Text(value),
            })
        };
        if let Some(expense_type) = self.expense_type {
            text("expense_type", expense_type.to_string());
        }
        if let Some(amount) = self.amount {
            text("amount", format!("{:.2}", amount));
        }
        if let Some(date) = self.date {
            text("date", date.format("%Y-%m-%d").to_string());
        }
        if let Some(ref description) = self.description {
            text("description", description.clone());
        }
        if let Some(ref attachment) = self.attachment {
            fields.push(FormField {
                name: "attachment".to_string(),
                value: FormValue::File {
                    file_name: attachment.file_name.clone(),
                    mime: attachment.mime.clone(),
                    bytes: attachment.bytes.clone(),
                },
            });
        }
        fields
    }
}
