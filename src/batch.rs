use crate::extractor::{Document, EntityExtractor, ExtractError, ExtractedDocument};
use crate::types::{Batch, BatchRequest};

/// Runs one batch through the extractor and shapes the result.
///
/// The extractor is called once for the whole batch, and not at all for an
/// empty one. Any extractor error fails the batch.
pub async fn handle<T>(
    extractor: &dyn EntityExtractor,
    request: BatchRequest,
    shape: fn(Vec<ExtractedDocument>) -> Vec<T>,
) -> Result<Batch<T>, ExtractError> {
    if request.values.is_empty() {
        return Ok(Batch { values: Vec::new() });
    }

    let documents: Vec<Document> = request
        .values
        .into_iter()
        .map(|record| Document {
            id: record.record_id,
            text: record.data.text,
        })
        .collect();
    let ids: Vec<String> = documents.iter().map(|d| d.id.clone()).collect();

    tracing::debug!("extracting {} records with {}", ids.len(), extractor.name());
    let extracted = extractor.extract(documents).await?;

    let aligned = extracted.len() == ids.len()
        && extracted.iter().zip(&ids).all(|(doc, id)| &doc.id == id);
    if !aligned {
        return Err(ExtractError::Inference(format!(
            "{} returned {} results for {} records",
            extractor.name(),
            extracted.len(),
            ids.len()
        )));
    }

    Ok(Batch {
        values: shape(extracted),
    })
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;

    use super::*;
    use crate::extractor::LexiconExtractor;
    use crate::labels::EntityLabel;
    use crate::shaper;
    use crate::types::{Record, RecordData};

    fn request(records: &[(&str, &str)]) -> BatchRequest {
        Batch {
            values: records
                .iter()
                .map(|(id, text)| Record {
                    record_id: id.to_string(),
                    data: RecordData {
                        text: text.to_string(),
                    },
                })
                .collect(),
        }
    }

    /// Counts calls and can be told to lose the last document.
    struct Probe {
        calls: AtomicUsize,
        drop_last: bool,
    }

    #[async_trait]
    impl EntityExtractor for Probe {
        fn name(&self) -> &str {
            "probe"
        }

        fn labels(&self) -> &[EntityLabel] {
            &[]
        }

        async fn extract(
            &self,
            documents: Vec<Document>,
        ) -> Result<Vec<ExtractedDocument>, ExtractError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let mut out: Vec<ExtractedDocument> = documents
                .into_iter()
                .map(|d| ExtractedDocument {
                    id: d.id,
                    entities: vec![],
                })
                .collect();
            if self.drop_last {
                out.pop();
            }
            Ok(out)
        }
    }

    fn probe(drop_last: bool) -> Probe {
        Probe {
            calls: AtomicUsize::new(0),
            drop_last,
        }
    }

    #[tokio::test]
    async fn one_extractor_call_per_batch() {
        let extractor = probe(false);
        let out = handle(&extractor, request(&[("1", "a"), ("2", "b"), ("3", "c")]), shaper::flat)
            .await
            .unwrap();
        assert_eq!(extractor.calls.load(Ordering::SeqCst), 1);
        let ids: Vec<&str> = out.values.iter().map(|r| r.record_id.as_str()).collect();
        assert_eq!(ids, vec!["1", "2", "3"]);
    }

    #[tokio::test]
    async fn empty_batch_skips_extractor() {
        let extractor = probe(false);
        let out = handle(&extractor, request(&[]), shaper::by_type).await.unwrap();
        assert!(out.values.is_empty());
        assert_eq!(extractor.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn misaligned_extractor_output_fails_the_batch() {
        let extractor = probe(true);
        let err = handle(&extractor, request(&[("1", "a"), ("2", "b")]), shaper::flat)
            .await
            .unwrap_err();
        assert!(matches!(err, ExtractError::Inference(_)));
    }

    #[tokio::test]
    async fn lexicon_batch_shapes_both_ways() {
        let lexicon = LexiconExtractor::from_json(r#"{"PERSON": ["Barack Obama"]}"#).unwrap();
        let req = request(&[("x", "Barack Obama was president."), ("y", "")]);

        let flat = handle(&lexicon, req.clone(), shaper::flat).await.unwrap();
        assert_eq!(flat.values[0].data.entities[0].name, "Barack Obama");
        assert!(flat.values[1].data.entities.is_empty());

        let grouped = handle(&lexicon, req, shaper::by_type).await.unwrap();
        assert_eq!(grouped.values[0].data["persons"], vec!["Barack Obama"]);
        assert!(grouped.values[1].data.is_empty());
    }
}
