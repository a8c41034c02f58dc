//! REST API client module for the field-force service.
//!
//! This module provides the `ApiClient` with typed wrappers for every
//! resource, the `Transport` seam the session layer sends through, and the
//! `ApiError` type that error statuses map to.
//!
//! The API uses JWT bearer tokens obtained from the `token/` endpoint and
//! renewed through `token/refresh/`.

pub mod client;
pub mod endpoints;
pub mod error;
pub mod request;
pub mod transport;

pub use client::ApiClient;
pub use endpoints::Endpoints;
pub use error::{ApiError, FieldErrors};
pub use request::{ApiRequest, ApiResponse};
pub use transport::{HttpTransport, Transport};
