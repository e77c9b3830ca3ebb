use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::labels::EntityLabel;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub extractor: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Record {
    pub record_id: String,
    pub data: RecordData,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordData {
    pub text: String,
}

/// Envelope shared by batch requests and responses.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Batch<T> {
    pub values: Vec<T>,
}

pub type BatchRequest = Batch<Record>;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Entity {
    pub name: String,
    pub label: EntityLabel,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_offset: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_offset: Option<usize>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntitiesResult {
    pub record_id: String,
    pub data: EntitiesData,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntitiesData {
    pub entities: Vec<Entity>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntitiesByTypeResult {
    pub record_id: String,
    pub data: BTreeMap<String, Vec<String>>,
}
