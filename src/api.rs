use std::sync::Arc;

use rocket::http::uri::Origin;
use rocket::http::Status;
use rocket::response::{status, Redirect};
use rocket::serde::json::{json, Json, Value};
use rocket::{catch, get, post, uri, Request, State};

use crate::app_state::AppState;
use crate::batch;
use crate::config::ExtractorKind;
use crate::error::ApiError;
use crate::shaper;
use crate::types::{
    Batch,
    BatchRequest,
    EntitiesByTypeResult,
    EntitiesResult,
    ErrorResponse,
    HealthResponse,
};

const EXAMPLE_REQUEST: &str = include_str!("../data/example_request.json");

#[get("/")]
pub fn docs_redirect() -> Redirect {
    Redirect::to(uri!(docs))
}

#[get("/docs")]
pub fn docs(state: &State<Arc<AppState>>) -> Json<Value> {
    let example: Value = serde_json::from_str(EXAMPLE_REQUEST).unwrap_or(Value::Null);

    Json(json!({
        "title": "Entity Gateway",
        "version": env!("CARGO_PKG_VERSION"),
        "description": "Upstream generation API passthrough and batch named entity extraction",
        "extractor": state.extractor.name(),
        "model": match state.config.extractor {
            ExtractorKind::Bert => json!({
                "repo": state.config.model_repo,
                "revision": state.config.model_revision,
            }),
            ExtractorKind::Lexicon => json!({ "lexicon": state.config.lexicon_path }),
        },
        "upstream": state.proxy.base_url(),
        "routes": [
            { "method": "GET", "path": "/api/<path..>", "description": "Forward a GET to the upstream API" },
            { "method": "POST", "path": "/entities", "description": "Extract named entities from a batch of records" },
            { "method": "POST", "path": "/entities_by_type", "description": "Extract named entities grouped by entity type" },
            { "method": "GET", "path": "/health", "description": "Liveness probe" },
        ],
        "exampleRequest": example,
    }))
}

#[get("/health")]
pub fn health(state: &State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        extractor: state.extractor.name().to_string(),
    })
}

/// Forwards the request to the upstream API. The upstream status is
/// mirrored and its body is returned as a JSON string.
///
/// Path and query are forwarded as received, percent-encoding included.
#[get("/api/<_..>")]
pub async fn handle_get(
    state: &State<Arc<AppState>>,
    origin: &Origin<'_>,
) -> Result<status::Custom<Json<String>>, ApiError> {
    let raw = origin.path().as_str();
    let path = raw.strip_prefix("/api").unwrap_or(raw);
    let query = origin.query().map(|q| q.as_str());

    let upstream = state.proxy.forward(path, query).await?;
    Ok(status::Custom(Status::new(upstream.status), Json(upstream.body)))
}

/// Extract named entities from a batch of records.
#[post("/entities", data = "<req>")]
pub async fn extract_entities(
    state: &State<Arc<AppState>>,
    req: Json<BatchRequest>,
) -> Result<Json<Batch<EntitiesResult>>, ApiError> {
    let resp = batch::handle(state.extractor.as_ref(), req.into_inner(), shaper::flat).await?;
    Ok(Json(resp))
}

/// Extract named entities from a batch of records, grouped by the property
/// of each entity label.
#[post("/entities_by_type", data = "<req>")]
pub async fn extract_entities_by_type(
    state: &State<Arc<AppState>>,
    req: Json<BatchRequest>,
) -> Result<Json<Batch<EntitiesByTypeResult>>, ApiError> {
    let resp = batch::handle(state.extractor.as_ref(), req.into_inner(), shaper::by_type).await?;
    Ok(Json(resp))
}

/// JSON body for everything Rocket rejects itself (bad JSON, missing
/// fields, unknown routes).
#[catch(default)]
pub fn default_catcher(status: Status, _req: &Request<'_>) -> status::Custom<Json<ErrorResponse>> {
    status::Custom(
        status,
        Json(ErrorResponse {
            error: status.reason().unwrap_or("error").to_string(),
        }),
    )
}
