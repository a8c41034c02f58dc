//! `key=value` arguments of the create and edit commands.

use std::collections::BTreeMap;
use std::path::Path;
use std::str::FromStr;

use anyhow::{anyhow, bail, Context, Result};
use chrono::NaiveDate;

use fieldforce_core::models::{
    Attachment, ContactInput, DailyCallReportUpdate, ExpenseClaimForm, LeaveRequestUpdate,
    NewDailyCallReport, NewLeaveRequest, NewTourProgram, TourProgramUpdate, WorkType,
};

/// Each field is consumed as it is read; `finish` rejects whatever is left.
#[derive(Debug, Default)]
pub struct Fields(BTreeMap<String, String>);

impl Fields {
    pub fn parse(raw: &[String]) -> Result<Self> {
        let mut map = BTreeMap::new();
        for arg in raw {
            let (key, value) = arg
                .split_once('=')
                .ok_or_else(|| anyhow!("Expected key=value, got: {}", arg))?;
            map.insert(key.to_string(), value.to_string());
        }
        Ok(Self(map))
    }

    fn text(&mut self, key: &str) -> Option<String> {
        self.0.remove(key)
    }

    fn require(&mut self, key: &str) -> Result<String> {
        self.text(key).ok_or_else(|| anyhow!("Missing {}=...", key))
    }

    fn parsed<T>(&mut self, key: &str) -> Result<Option<T>>
    where
        T: FromStr,
        T::Err: std::error::Error + Send + Sync + 'static,
    {
        self.text(key)
            .map(|raw| raw.parse::<T>().with_context(|| format!("Invalid {}: {}", key, raw)))
            .transpose()
    }

    fn require_parsed<T>(&mut self, key: &str) -> Result<T>
    where
        T: FromStr,
        T::Err: std::error::Error + Send + Sync + 'static,
    {
        self.parsed(key)?.ok_or_else(|| anyhow!("Missing {}=...", key))
    }

    /// Comma-separated ids; an empty value clears the list.
    fn ids(&mut self, key: &str) -> Result<Option<Vec<i64>>> {
        self.text(key)
            .map(|raw| {
                raw.split(',')
                    .map(str::trim)
                    .filter(|id| !id.is_empty())
                    .map(|id| id.parse().with_context(|| format!("Invalid id in {}: {}", key, id)))
                    .collect()
            })
            .transpose()
    }

    fn work_type(&mut self, key: &str) -> Result<Option<WorkType>> {
        self.text(key)
            .map(|raw| {
                serde_json::from_value(serde_json::Value::String(raw.clone())).map_err(|_| {
                    anyhow!("Invalid {}: {} (field_work, office_work, leave or holiday)", key, raw)
                })
            })
            .transpose()
    }

    pub fn finish(self) -> Result<()> {
        if !self.0.is_empty() {
            let unknown: Vec<&str> = self.0.keys().map(String::as_str).collect();
            bail!("Unknown field(s): {}", unknown.join(", "));
        }
        Ok(())
    }
}

pub fn new_leave(mut f: Fields) -> Result<NewLeaveRequest> {
    let leave = NewLeaveRequest {
        leave_type: f.require_parsed("type")?,
        start_date: f.require_parsed("start")?,
        end_date: f.require_parsed("end")?,
        reason: f.require("reason")?,
    };
    f.finish()?;
    if leave.end_date < leave.start_date {
        bail!("end date is before start date");
    }
    Ok(leave)
}

pub fn leave_update(mut f: Fields) -> Result<LeaveRequestUpdate> {
    let update = LeaveRequestUpdate {
        leave_type: f.parsed("type")?,
        start_date: f.parsed("start")?,
        end_date: f.parsed("end")?,
        reason: f.text("reason"),
    };
    f.finish()?;
    Ok(update)
}

/// With `complete`, every claim field must be present, as for a new claim.
pub fn expense_form(mut f: Fields, complete: bool) -> Result<ExpenseClaimForm> {
    let form = if complete {
        ExpenseClaimForm {
            expense_type: Some(f.require_parsed("type")?),
            amount: Some(f.require_parsed("amount")?),
            date: Some(f.require_parsed("date")?),
            description: Some(f.require("description")?),
            attachment: None,
        }
    } else {
        ExpenseClaimForm {
            expense_type: f.parsed("type")?,
            amount: f.parsed("amount")?,
            date: f.parsed("date")?,
            description: f.text("description"),
            attachment: None,
        }
    };
    let attachment = f.text("receipt").map(|path| read_attachment(Path::new(&path))).transpose()?;
    f.finish()?;
    if form.amount.is_some_and(|amount| amount <= 0.0) {
        bail!("amount must be positive");
    }
    Ok(ExpenseClaimForm { attachment, ..form })
}

pub fn read_attachment(path: &Path) -> Result<Attachment> {
    let bytes = std::fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;
    let file_name = path
        .file_name()
        .and_then(|name| name.to_str())
        .unwrap_or("attachment")
        .to_string();
    let extension = path.extension().and_then(|e| e.to_str()).map(str::to_ascii_lowercase);
    let mime = match extension.as_deref() {
        Some("jpg" | "jpeg") => "image/jpeg",
        Some("png") => "image/png",
        Some("pdf") => "application/pdf",
        _ => "application/octet-stream",
    };
    Ok(Attachment {
        file_name,
        mime: mime.to_string(),
        bytes,
    })
}

pub fn new_dcr(mut f: Fields) -> Result<NewDailyCallReport> {
    let report = NewDailyCallReport {
        date: f.require_parsed::<NaiveDate>("date")?,
        work_type: f.work_type("work")?.unwrap_or(WorkType::FieldWork),
        summary: f.text("summary").unwrap_or_default(),
        doctors_visited: f.ids("doctors")?.unwrap_or_default(),
        chemists_visited: f.ids("chemists")?.unwrap_or_default(),
    };
    f.finish()?;
    Ok(report)
}

pub fn dcr_update(mut f: Fields) -> Result<DailyCallReportUpdate> {
    let update = DailyCallReportUpdate {
        work_type: f.work_type("work")?,
        summary: f.text("summary"),
        doctors_visited: f.ids("doctors")?,
        chemists_visited: f.ids("chemists")?,
    };
    f.finish()?;
    Ok(update)
}

pub fn new_tour(mut f: Fields) -> Result<NewTourProgram> {
    let tour = NewTourProgram {
        month: f.require_parsed("month")?,
        year: f.require_parsed("year")?,
        area_details: f.require("area")?,
    };
    f.finish()?;
    if !(1..=12).contains(&tour.month) {
        bail!("month must be 1-12");
    }
    Ok(tour)
}

pub fn tour_update(mut f: Fields) -> Result<TourProgramUpdate> {
    let update = TourProgramUpdate {
        month: f.parsed("month")?,
        year: f.parsed("year")?,
        area_details: f.text("area"),
    };
    f.finish()?;
    Ok(update)
}

/// `kind_key` is `specialty` for doctors and `category` for chemists.
pub fn contact(mut f: Fields, kind_key: &str, complete: bool) -> Result<ContactInput> {
    let input = ContactInput {
        name: if complete { Some(f.require("name")?) } else { f.text("name") },
        kind_id: f.parsed(kind_key)?,
        location: f.text("location"),
        contact_number: f.text("phone"),
        email: f.text("email"),
    };
    f.finish()?;
    Ok(input)
}
