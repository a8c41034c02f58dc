use std::time::Duration;

use async_trait::async_trait;
use reqwest::{header, multipart, Client};
use tracing::debug;

use super::request::{ApiRequest, ApiResponse, Body, FormField, FormValue};
use super::ApiError;

/// HTTP request timeout in seconds.
/// 30s allows for slow API responses while failing fast enough for good UX.
pub const REQUEST_TIMEOUT_SECS: u64 = 30;

/// Sends a single request and hands back whatever the server answered.
///
/// Non-2xx statuses are returned as responses, not errors; only failures that
/// prevent a response from arriving at all map to `Err`.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, request: &ApiRequest) -> Result<ApiResponse, ApiError>;
}

/// `reqwest`-backed transport.
/// Clone is cheap - reqwest::Client uses Arc internally for connection pooling.
#[derive(Clone)]
pub struct HttpTransport {
    client: Client,
}

impl HttpTransport {
    pub fn new() -> Result<Self, ApiError> {
        Self::with_timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
    }

    pub fn with_timeout(timeout: Duration) -> Result<Self, ApiError> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self { client })
    }

    /// Share an existing connection pool.
    pub fn with_client(client: Client) -> Self {
        Self { client }
    }

    fn build_form(fields: &[FormField]) -> Result<multipart::Form, ApiError> {
        let mut form = multipart::Form::new();
        for field in fields {
            form = match &field.value {
                FormValue::Text(text) => form.text(field.name.clone(), text.clone()),
                FormValue::File {
                    file_name,
                    mime,
                    bytes,
                } => {
                    let part = multipart::Part::bytes(bytes.clone())
                        .file_name(file_name.clone())
                        .mime_str(mime)?;
                    form.part(field.name.clone(), part)
                }
            };
        }
        Ok(form)
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(&self, request: &ApiRequest) -> Result<ApiResponse, ApiError> {
        let mut builder = self
            .client
            .request(request.method().clone(), request.url())
            .header(header::ACCEPT, "application/json");

        if !request.query_pairs().is_empty() {
            builder = builder.query(request.query_pairs());
        }
        if let Some(token) = request.bearer() {
            builder = builder.bearer_auth(token);
        }
        builder = match request.body() {
            Body::Empty => builder,
            Body::Json(value) => builder.json(value),
            Body::Form(fields) => builder.multipart(Self::build_form(fields)?),
        };

        let response = builder.send().await?;
        let status = response.status();
        let body = response.text().await?;
        debug!(method = %request.method(), url = request.url(), status = status.as_u16(), "API response");

        Ok(ApiResponse::new(status, body))
    }
}
