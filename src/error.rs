use rocket::http::Status;
use rocket::request::Request;
use rocket::response::{self, status, Responder};
use rocket::serde::json::Json;

use crate::extractor::ExtractError;
use crate::proxy::ProxyError;
use crate::types::ErrorResponse;

/// Errors surfaced by the HTTP handlers, rendered as `{"error": ...}`.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error(transparent)]
    Extraction(#[from] ExtractError),

    #[error(transparent)]
    Upstream(#[from] ProxyError),
}

impl ApiError {
    pub fn status(&self) -> Status {
        match self {
            ApiError::Extraction(_) => Status::InternalServerError,
            ApiError::Upstream(_) => Status::BadGateway,
        }
    }
}

impl<'r> Responder<'r, 'static> for ApiError {
    fn respond_to(self, req: &'r Request<'_>) -> response::Result<'static> {
        let status = self.status();
        tracing::error!("{} {}: {}", req.method(), req.uri(), self);
        status::Custom(
            status,
            Json(ErrorResponse {
                error: self.to_string(),
            }),
        )
        .respond_to(req)
    }
}
