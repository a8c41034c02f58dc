use chrono::NaiveDate;
use serde::{Deserialize, Deserializer, Serialize};

/// One page of a paginated list endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Page<T> {
    #[serde(default)]
    pub count: u64,
    #[serde(default)]
    pub next: Option<String>,
    #[serde(default)]
    pub previous: Option<String>,
    pub results: Vec<T>,
}

impl<T> Page<T> {
    pub fn has_next(&self) -> bool {
        self.next.is_some()
    }
}

/// Filters accepted by the list endpoints.
///
/// Unset fields are left out of the query string.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListParams {
    pub page: Option<u32>,
    pub search: Option<String>,
    pub ordering: Option<String>,
    pub status: Option<String>,
    pub user_id: Option<i64>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    /// Extra endpoint-specific filters, passed through verbatim.
    pub extra: Vec<(String, String)>,
}

impl ListParams {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn page(mut self, page: u32) -> Self {
        self.page = Some(page);
        self
    }

    pub fn status(mut self, status: impl Into<String>) -> Self {
        self.status = Some(status.into());
        self
    }

    pub fn search(mut self, term: impl Into<String>) -> Self {
        self.search = Some(term.into());
        self
    }

    pub fn user(mut self, user_id: i64) -> Self {
        self.user_id = Some(user_id);
        self
    }

    pub fn between(mut self, start: NaiveDate, end: NaiveDate) -> Self {
        self.start_date = Some(start);
        self.end_date = Some(end);
        self
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.extra.push((key.into(), value.into()));
        self
    }

    pub fn to_query(&self) -> Vec<(String, String)> {
        let mut pairs = Vec::new();
        if let Some(page) = self.page {
            pairs.push(("page".to_string(), page.to_string()));
        }
        if let Some(ref search) = self.search {
            pairs.push(("search".to_string(), search.clone()));
        }
        if let Some(ref ordering) = self.ordering {
            pairs.push(("ordering".to_string(), ordering.clone()));
        }
        if let Some(ref status) = self.status {
            pairs.push(("status".to_string(), status.clone()));
        }
        if let Some(user_id) = self.user_id {
            pairs.push(("user_id".to_string(), user_id.to_string()));
        }
        if let Some(start) = self.start_date {
            pairs.push(("start_date".to_string(), start.format("%Y-%m-%d").to_string()));
        }
        if let Some(end) = self.end_date {
            pairs.push(("end_date".to_string(), end.format("%Y-%m-%d").to_string()));
        }
        pairs.extend(self.extra.iter().cloned());
        pairs
    }
}

/// Body of approve/reject/query calls.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ReviewComments {
    pub manager_comments: String,
}

impl ReviewComments {
    pub fn new(comments: impl Into<String>) -> Self {
        Self {
            manager_comments: comments.into(),
        }
    }
}

/// Acknowledgement payload of state-change endpoints, e.g. `{"status": "..."}`.
#[derive(Debug, Clone, Deserialize)]
pub struct StatusMessage {
    pub status: String,
}

/// Decimal amounts arrive as JSON strings ("1250.50") or plain numbers.
pub(crate) fn de_decimal<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Decimal {
        Number(f64),
        Text(String),
    }

    match Decimal::deserialize(deserializer)? {
        Decimal::Number(n) => Ok(n),
        Decimal::Text(s) => s.trim().parse().map_err(serde::de::Error::custom),
    }
}

/// Optional variant of [`de_decimal`].
pub(crate) fn de_opt_decimal<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    struct Wrapper(#[serde(deserialize_with = "de_decimal")] f64);

    Ok(Option::<Wrapper>::deserialize(deserializer)?.map(|Wrapper(n)| n))
}
