use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;

use crate::labels::{EntityLabel, UnmappedLabel};
use crate::types::Entity;

/// One unit of text handed to an extractor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    pub id: String,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedDocument {
    pub id: String,
    pub entities: Vec<Entity>,
}

#[derive(Debug, thiserror::Error)]
pub enum ExtractError {
    #[error("failed to load extractor: {0:#}")]
    Load(anyhow::Error),

    #[error(transparent)]
    Label(#[from] UnmappedLabel),

    #[error("inference failed: {0}")]
    Inference(String),
}

/// Shared NER backend. Built once at ignition, read-only afterwards.
#[async_trait]
pub trait EntityExtractor: Send + Sync {
    fn name(&self) -> &str;

    /// Every label this extractor can emit.
    fn labels(&self) -> &[EntityLabel];

    /// Runs the whole batch in one call. The output has one entry per
    /// document, in input order.
    async fn extract(&self, documents: Vec<Document>)
        -> Result<Vec<ExtractedDocument>, ExtractError>;
}

/// Gazetteer backend: whole-word, case-sensitive, longest match first.
pub struct LexiconExtractor {
    entries: Vec<(String, EntityLabel)>,
    labels: Vec<EntityLabel>,
}

impl LexiconExtractor {
    /// Parses `{ "<LABEL>": ["phrase", ...] }`.
    pub fn from_json(json: &str) -> Result<Self, ExtractError> {
        let raw: BTreeMap<String, Vec<String>> =
            serde_json::from_str(json).map_err(|e| ExtractError::Load(e.into()))?;

        let mut entries = Vec::new();
        let mut labels = BTreeSet::new();
        for (label, phrases) in raw {
            let label: EntityLabel = label.parse()?;
            labels.insert(label);
            entries.extend(
                phrases
                    .into_iter()
                    .filter(|p| !p.trim().is_empty())
                    .map(|p| (p, label)),
            );
        }
        // stable: equal-length phrases keep file order
        entries.sort_by(|a, b| b.0.len().cmp(&a.0.len()));

        Ok(Self {
            entries,
            labels: labels.into_iter().collect(),
        })
    }

    pub fn load(path: &Path) -> Result<Arc<Self>, ExtractError> {
        let json = std::fs::read_to_string(path).map_err(|e| {
            ExtractError::Load(anyhow::Error::new(e).context(format!("reading {}", path.display())))
        })?;
        let lexicon = Self::from_json(&json)?;
        tracing::info!(
            "lexicon loaded from {}: {} phrases, {} labels",
            path.display(),
            lexicon.entries.len(),
            lexicon.labels.len()
        );
        Ok(Arc::new(lexicon))
    }

    fn find(&self, text: &str) -> Vec<Entity> {
        let mut entities = Vec::new();
        let mut pos = 0;

        while pos < text.len() {
            let rest = &text[pos..];
            if is_word_start(text, pos) {
                let hit = self.entries.iter().find(|(phrase, _)| {
                    rest.starts_with(phrase.as_str()) && is_word_end(text, pos + phrase.len())
                });
                if let Some((phrase, label)) = hit {
                    let end = pos + phrase.len();
                    entities.push(Entity {
                        name: phrase.clone(),
                        label: *label,
                        start_offset: Some(char_offset(text, pos)),
                        end_offset: Some(char_offset(text, end)),
                    });
                    pos = end;
                    continue;
                }
            }
            pos += rest.chars().next().map_or(1, char::len_utf8);
        }

        entities
    }
}

#[async_trait]
impl EntityExtractor for LexiconExtractor {
    fn name(&self) -> &str {
        "lexicon"
    }

    fn labels(&self) -> &[EntityLabel] {
        &self.labels
    }

    async fn extract(
        &self,
        documents: Vec<Document>,
    ) -> Result<Vec<ExtractedDocument>, ExtractError> {
        Ok(documents
            .into_iter()
            .map(|doc| ExtractedDocument {
                entities: self.find(&doc.text),
                id: doc.id,
            })
            .collect())
    }
}

/// Converts a byte offset into a character offset.
pub(crate) fn char_offset(text: &str, byte: usize) -> usize {
    text.get(..byte).map_or(0, |prefix| prefix.chars().count())
}

fn is_word_start(text: &str, pos: usize) -> bool {
    text[..pos]
        .chars()
        .next_back()
        .map_or(true, |c| !c.is_alphanumeric())
}

fn is_word_end(text: &str, pos: usize) -> bool {
    text.get(pos..)
        .and_then(|rest| rest.chars().next())
        .map_or(true, |c| !c.is_alphanumeric())
}

#[cfg(test)]
mod tests {
    use super::*;

    const LEXICON: &str = r#"{
        "PERSON": ["Obama", "Barack Obama"],
        "GPE": ["York", "New York"],
        "ORG": ["Apple", ""]
    }"#;

    fn doc(id: &str, text: &str) -> Document {
        Document {
            id: id.to_string(),
            text: text.to_string(),
        }
    }

    fn names(entities: &[Entity]) -> Vec<&str> {
        entities.iter().map(|e| e.name.as_str()).collect()
    }

    #[test]
    fn longest_phrase_wins() {
        let lexicon = LexiconExtractor::from_json(LEXICON).unwrap();
        let found = lexicon.find("Barack Obama visited New York.");
        assert_eq!(names(&found), vec!["Barack Obama", "New York"]);
        assert_eq!(found[0].label, EntityLabel::Person);
        assert_eq!(found[1].label, EntityLabel::Gpe);
    }

    #[test]
    fn matches_respect_word_boundaries() {
        let lexicon = LexiconExtractor::from_json(LEXICON).unwrap();
        assert!(lexicon.find("Applesauce and Yorkshire").is_empty());
        assert_eq!(names(&lexicon.find("Apple's phone")), vec!["Apple"]);
    }

    #[test]
    fn offsets_count_characters() {
        let lexicon = LexiconExtractor::from_json(LEXICON).unwrap();
        let found = lexicon.find("Café Obama");
        assert_eq!(found[0].start_offset, Some(5));
        assert_eq!(found[0].end_offset, Some(10));
    }

    #[test]
    fn duplicates_are_reported_in_order() {
        let lexicon = LexiconExtractor::from_json(LEXICON).unwrap();
        let found = lexicon.find("Obama met Obama");
        assert_eq!(names(&found), vec!["Obama", "Obama"]);
        assert_eq!(found[1].start_offset, Some(10));
    }

    #[test]
    fn labels_are_collected_and_empty_phrases_skipped() {
        let lexicon = LexiconExtractor::from_json(LEXICON).unwrap();
        assert_eq!(
            lexicon.labels(),
            &[EntityLabel::Person, EntityLabel::Org, EntityLabel::Gpe]
        );
        assert_eq!(lexicon.entries.len(), 5);
    }

    #[test]
    fn unknown_label_fails_loading() {
        let err = LexiconExtractor::from_json(r#"{"SPECIES": ["cat"]}"#)
            .err()
            .unwrap();
        assert!(matches!(err, ExtractError::Label(UnmappedLabel(ref l)) if l == "SPECIES"));
    }

    #[tokio::test]
    async fn extract_preserves_ids_and_order() {
        let lexicon = LexiconExtractor::from_json(LEXICON).unwrap();
        let out = lexicon
            .extract(vec![doc("b", "Obama"), doc("a", ""), doc("c", "Apple")])
            .await
            .unwrap();
        let ids: Vec<&str> = out.iter().map(|d| d.id.as_str()).collect();
        assert_eq!(ids, vec!["b", "a", "c"]);
        assert!(out[1].entities.is_empty());
        assert_eq!(out[2].entities[0].label, EntityLabel::Org);
    }
}
