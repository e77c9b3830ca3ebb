//! Projections of extractor output into the two response formats.

use std::collections::BTreeMap;

use crate::extractor::ExtractedDocument;
use crate::types::{EntitiesByTypeResult, EntitiesData, EntitiesResult};

pub fn flat(documents: Vec<ExtractedDocument>) -> Vec<EntitiesResult> {
    documents
        .into_iter()
        .map(|doc| EntitiesResult {
            record_id: doc.id,
            data: EntitiesData {
                entities: doc.entities,
            },
        })
        .collect()
}

/// Groups entity names under their label's property. Names keep extractor
/// order and duplicates; properties without entities are absent.
pub fn by_type(documents: Vec<ExtractedDocument>) -> Vec<EntitiesByTypeResult> {
    documents
        .into_iter()
        .map(|doc| {
            let mut data: BTreeMap<String, Vec<String>> = BTreeMap::new();
            for entity in doc.entities {
                data.entry(entity.label.property().to_string())
                    .or_default()
                    .push(entity.name);
            }
            EntitiesByTypeResult {
                record_id: doc.id,
                data,
            }
        })
        .collect()
}
