use std::collections::HashMap;
use std::ops::Range;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use anyhow::Context;
use async_trait::async_trait;
use serde::Deserialize;

// Candle
use candle_core::{DType, Device, Tensor, D};
use candle_nn::{Linear, Module, VarBuilder};
use candle_transformers::models::bert::{BertModel, Config as BertConfig};
use hf_hub::api::sync::{Api, ApiRepo};
use hf_hub::{Repo, RepoType};
use tokenizers::models::wordpiece::WordPiece;
use tokenizers::normalizers::bert::BertNormalizer;
use tokenizers::pre_tokenizers::bert::BertPreTokenizer;
use tokenizers::{Encoding, ModelWrapper, NormalizerWrapper, PreTokenizerWrapper, Tokenizer};

use crate::extractor::{char_offset, Document, EntityExtractor, ExtractError, ExtractedDocument};
use crate::labels::{EntityLabel, UnmappedLabel};
use crate::types::Entity;

/// Per-token prediction of a BIO/BIOES token classifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Tag {
    Outside,
    Begin(EntityLabel),
    Inside(EntityLabel),
}

impl Tag {
    fn parse(raw: &str) -> Result<Self, UnmappedLabel> {
        if raw == "O" {
            return Ok(Tag::Outside);
        }
        Ok(match raw.split_once('-') {
            Some(("B" | "S", label)) => Tag::Begin(label.parse()?),
            Some(("I" | "E", label)) => Tag::Inside(label.parse()?),
            _ => Tag::Inside(raw.parse()?),
        })
    }

    fn label(self) -> Option<EntityLabel> {
        match self {
            Tag::Outside => None,
            Tag::Begin(label) | Tag::Inside(label) => Some(label),
        }
    }
}

/// The parts of `config.json` the classification head needs.
#[derive(Debug, Deserialize)]
struct HeadConfig {
    hidden_size: usize,
    max_position_embeddings: usize,
    id2label: HashMap<String, String>,
}

impl HeadConfig {
    fn tags(&self) -> Result<Vec<Tag>, ExtractError> {
        let mut tags = vec![Tag::Outside; self.id2label.len()];
        for (id, raw) in &self.id2label {
            let idx: usize = id
                .parse()
                .ok()
                .filter(|&i| i < tags.len())
                .ok_or_else(|| {
                    ExtractError::Load(anyhow::anyhow!("bad id2label key `{id}` in config.json"))
                })?;
            tags[idx] = Tag::parse(raw)?;
        }
        Ok(tags)
    }
}

struct ModelFiles {
    config: PathBuf,
    weights: PathBuf,
    tokenizer: Tokenizer,
}

/// BERT token-classification backend running on candle.
pub struct BertExtractor {
    inner: Arc<BertInner>,
    labels: Vec<EntityLabel>,
}

struct BertInner {
    model: BertModel,
    classifier: Linear,
    tokenizer: Tokenizer,
    device: Device,
    tags: Vec<Tag>,
    cls_id: u32,
    sep_id: u32,
    /// Tokens per forward pass, excluding [CLS] and [SEP].
    window: usize,
}

impl BertExtractor {
    pub fn load(repo_id: &str, revision: &str) -> Result<Arc<Self>, ExtractError> {
        let start = Instant::now();

        let files = fetch(repo_id, revision).map_err(ExtractError::Load)?;
        let config_json = std::fs::read_to_string(&files.config)
            .map_err(|e| ExtractError::Load(e.into()))?;
        let head: HeadConfig =
            serde_json::from_str(&config_json).map_err(|e| ExtractError::Load(e.into()))?;
        let tags = head.tags()?;

        let mut labels: Vec<EntityLabel> = tags.iter().filter_map(|t| t.label()).collect();
        labels.sort();
        labels.dedup();

        let inner = BertInner::build(files, &config_json, &head, tags).map_err(ExtractError::Load)?;
        tracing::info!(
            "[Candle] {} ready with {} labels in {:.2}s",
            repo_id,
            labels.len(),
            start.elapsed().as_secs_f32()
        );

        Ok(Arc::new(Self {
            inner: Arc::new(inner),
            labels,
        }))
    }
}

fn fetch(repo_id: &str, revision: &str) -> anyhow::Result<ModelFiles> {
    let api = Api::new()?;
    let repo = api.repo(Repo::with_revision(
        repo_id.to_string(),
        RepoType::Model,
        revision.to_string(),
    ));

    let config = repo.get("config.json")?;
    let weights = match repo.get("model.safetensors") {
        Ok(path) => path,
        Err(_) => repo
            .get("pytorch_model.bin")
            .context("repo has neither model.safetensors nor pytorch_model.bin")?,
    };
    let tokenizer = load_tokenizer(&repo)?;

    Ok(ModelFiles {
        config,
        weights,
        tokenizer,
    })
}

/// Prefers `tokenizer.json`; older checkpoints only ship `vocab.txt`.
fn load_tokenizer(repo: &ApiRepo) -> anyhow::Result<Tokenizer> {
    if let Ok(path) = repo.get("tokenizer.json") {
        return Tokenizer::from_file(path)
            .map_err(|e| anyhow::anyhow!("Error loading tokenizer: {e}"));
    }

    #[derive(Deserialize, Default)]
    struct TokenizerConfig {
        #[serde(default)]
        do_lower_case: bool,
    }
    let lowercase = repo
        .get("tokenizer_config.json")
        .ok()
        .and_then(|p| std::fs::read_to_string(p).ok())
        .and_then(|s| serde_json::from_str::<TokenizerConfig>(&s).ok())
        .unwrap_or_default()
        .do_lower_case;

    let vocab = repo.get("vocab.txt")?;
    let vocab = vocab.to_str().context("non-utf8 vocab path")?;
    let wordpiece = WordPiece::from_file(vocab)
        .unk_token("[UNK]".to_string())
        .build()
        .map_err(|e| anyhow::anyhow!("Error loading vocab: {e}"))?;

    let mut tokenizer = Tokenizer::new(ModelWrapper::WordPiece(wordpiece));
    tokenizer.with_normalizer(NormalizerWrapper::BertNormalizer(BertNormalizer::new(
        true,
        true,
        Some(lowercase),
        lowercase,
    )));
    tokenizer.with_pre_tokenizer(PreTokenizerWrapper::BertPreTokenizer(BertPreTokenizer));
    Ok(tokenizer)
}

impl BertInner {
    fn build(
        files: ModelFiles,
        config_json: &str,
        head: &HeadConfig,
        tags: Vec<Tag>,
    ) -> anyhow::Result<Self> {
        anyhow::ensure!(
            head.max_position_embeddings > 2,
            "max_position_embeddings too small: {}",
            head.max_position_embeddings
        );

        let device = Device::Cpu;
        let config: BertConfig = serde_json::from_str(config_json)?;

        let size = std::fs::metadata(&files.weights).map(|m| m.len()).unwrap_or(0);
        tracing::info!(
            "[Candle] loading {} ({})",
            files.weights.display(),
            format_size(size as usize)
        );
        let vb = var_builder(&files.weights, &device)?;
        let model = BertModel::load(vb.pp("bert"), &config)?;
        let classifier = candle_nn::linear(head.hidden_size, tags.len(), vb.pp("classifier"))?;

        let mut tokenizer = files.tokenizer;
        tokenizer.with_padding(None);
        // windows are cut by hand, the tokenizer must see the full text
        let _ = tokenizer.with_truncation(None);

        let cls_id = tokenizer
            .token_to_id("[CLS]")
            .context("tokenizer has no [CLS] token")?;
        let sep_id = tokenizer
            .token_to_id("[SEP]")
            .context("tokenizer has no [SEP] token")?;

        Ok(Self {
            model,
            classifier,
            tokenizer,
            device,
            tags,
            cls_id,
            sep_id,
            window: head.max_position_embeddings - 2,
        })
    }

    fn extract_blocking(
        &self,
        documents: Vec<Document>,
    ) -> Result<Vec<ExtractedDocument>, ExtractError> {
        let texts: Vec<&str> = documents.iter().map(|d| d.text.as_str()).collect();
        let encodings = self
            .tokenizer
            .encode_batch(texts, false)
            .map_err(|e| ExtractError::Inference(format!("Error encoding: {e}")))?;

        documents
            .iter()
            .zip(encodings.iter())
            .map(|(doc, encoding)| {
                Ok(ExtractedDocument {
                    id: doc.id.clone(),
                    entities: self.tag_document(&doc.text, encoding)?,
                })
            })
            .collect()
    }

    fn tag_document(&self, text: &str, encoding: &Encoding) -> Result<Vec<Entity>, ExtractError> {
        let ids = encoding.get_ids();
        let offsets = encoding.get_offsets();
        let word_ids = encoding.get_word_ids();

        let tags = window_tags(word_ids, self.window, |range| -> Result<Vec<Tag>, ExtractError> {
            let mut input = Vec::with_capacity(range.len() + 2);
            input.push(self.cls_id);
            input.extend_from_slice(&ids[range]);
            input.push(self.sep_id);

            let predicted = self
                .classify(&input)
                .map_err(|e| ExtractError::Inference(e.to_string()))?;
            Ok(predicted[1..predicted.len() - 1]
                .iter()
                .map(|&id| self.tags.get(id as usize).copied().unwrap_or(Tag::Outside))
                .collect())
        })?;

        Ok(decode(text, offsets, word_ids, &tags))
    }

    /// Argmax class id for every input token.
    ///
    /// Sequences run one at a time: `BertModel::forward` at this candle
    /// version takes no attention mask, so padded batches would attend to
    /// padding.
    fn classify(&self, ids: &[u32]) -> candle_core::Result<Vec<u32>> {
        let input = Tensor::new(ids, &self.device)?.unsqueeze(0)?;
        let token_type_ids = input.zeros_like()?;
        let hidden = self.model.forward(&input, &token_type_ids)?;
        let logits = self.classifier.forward(&hidden)?;
        logits.squeeze(0)?.argmax(D::Minus1)?.to_vec1::<u32>()
    }
}

fn var_builder(weights: &Path, device: &Device) -> anyhow::Result<VarBuilder<'static>> {
    let is_safetensors = weights.extension().map_or(false, |ext| ext == "safetensors");
    let vb = if is_safetensors {
        // SAFETY: the file lives in the hf-hub cache and is not modified while mapped.
        unsafe { VarBuilder::from_mmaped_safetensors(&[weights], DType::F32, device)? }
    } else {
        VarBuilder::from_pth(weights, DType::F32, device)?
    };
    Ok(vb)
}

#[async_trait]
impl EntityExtractor for BertExtractor {
    fn name(&self) -> &str {
        "bert"
    }

    fn labels(&self) -> &[EntityLabel] {
        &self.labels
    }

    async fn extract(
        &self,
        documents: Vec<Document>,
    ) -> Result<Vec<ExtractedDocument>, ExtractError> {
        let inner = Arc::clone(&self.inner);
        let count = documents.len();
        let start = Instant::now();

        let out = rocket::tokio::task::spawn_blocking(move || inner.extract_blocking(documents))
            .await
            .map_err(|e| ExtractError::Inference(format!("inference task failed: {e}")))??;

        tracing::debug!(
            "[Candle] tagged {} documents in {:.2}s",
            count,
            start.elapsed().as_secs_f32()
        );
        Ok(out)
    }
}

/// Splits a token sequence into ranges of at most `window` tokens, moving
/// each cut back to the start of a word when the word fits.
fn windows(word_ids: &[Option<u32>], window: usize) -> Vec<Range<usize>> {
    let len = word_ids.len();
    let mut out = Vec::new();
    let mut start = 0;

    while start < len {
        let mut end = (start + window).min(len);
        if end < len {
            if let Some(cut) = (start + 1..=end)
                .rev()
                .find(|&i| word_ids[i].is_none() || word_ids[i] != word_ids[i - 1])
            {
                end = cut;
            }
        }
        out.push(start..end);
        start = end;
    }
    out
}

/// Classifies every window and joins the tags into one sequence aligned
/// with the document's tokens, so spans may run across window cuts.
fn window_tags<E>(
    word_ids: &[Option<u32>],
    window: usize,
    mut classify: impl FnMut(Range<usize>) -> Result<Vec<Tag>, E>,
) -> Result<Vec<Tag>, E> {
    let mut tags = Vec::with_capacity(word_ids.len());
    for range in windows(word_ids, window) {
        tags.extend(classify(range)?);
    }
    Ok(tags)
}

struct OpenSpan {
    label: EntityLabel,
    start: usize,
    end: usize,
}

/// Turns per-token tags into entity spans over `text`.
///
/// `offsets` are byte offsets into `text`. Continuation pieces of a word
/// follow the tag of the word's first piece.
fn decode(
    text: &str,
    offsets: &[(usize, usize)],
    word_ids: &[Option<u32>],
    tags: &[Tag],
) -> Vec<Entity> {
    let mut entities = Vec::new();
    let mut open: Option<OpenSpan> = None;
    let mut prev_word = None;

    for ((&(start, end), &word), &tag) in offsets.iter().zip(word_ids).zip(tags) {
        let continues = word.is_some() && word == prev_word;
        prev_word = word;
        if continues {
            if let Some(span) = open.as_mut() {
                span.end = end;
            }
            continue;
        }

        match tag {
            Tag::Outside => close(text, open.take(), &mut entities),
            Tag::Inside(label) if open.as_ref().map_or(false, |s| s.label == label) => {
                if let Some(span) = open.as_mut() {
                    span.end = end;
                }
            }
            Tag::Begin(label) | Tag::Inside(label) => {
                close(text, open.take(), &mut entities);
                open = Some(OpenSpan { label, start, end });
            }
        }
    }
    close(text, open, &mut entities);

    entities
}

fn close(text: &str, span: Option<OpenSpan>, entities: &mut Vec<Entity>) {
    let Some(span) = span else { return };
    let Some(name) = text.get(span.start..span.end) else { return };
    if name.trim().is_empty() {
        return;
    }
    entities.push(Entity {
        name: name.to_string(),
        label: span.label,
        start_offset: Some(char_offset(text, span.start)),
        end_offset: Some(char_offset(text, span.end)),
    });
}

// human-readable byte count
fn format_size(size: usize) -> String {
    const KB: f64 = 1024.0;
    const MB: f64 = KB * 1024.0;
    const GB: f64 = MB * 1024.0;
    let size_f = size as f64;
    if size_f > GB {
        format!("{:.2} GiB", size_f / GB)
    } else if size_f > MB {
        format!("{:.2} MiB", size_f / MB)
    } else if size_f > KB {
        format!("{:.2} KiB", size_f / KB)
    } else {
        format!("{size} B")
    }
}
