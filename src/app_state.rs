use std::sync::Arc;

use crate::bert::BertExtractor;
use crate::config::{AppConfig, ExtractorKind};
use crate::extractor::{EntityExtractor, ExtractError, LexiconExtractor};
use crate::proxy::ProxyClient;

/// Shared state handed to every handler:
/// - extractor: the NER backend, loaded once at ignition
/// - proxy: client for the upstream generation API
pub struct AppState {
    pub extractor: Arc<dyn EntityExtractor>,
    pub proxy: ProxyClient,
    pub config: AppConfig,
}

impl AppState {
    pub async fn init(config: AppConfig) -> Result<Arc<Self>, ExtractError> {
        let extractor = load_extractor(&config).await?;
        Ok(Self::with_extractor(config, extractor))
    }

    pub fn with_extractor(config: AppConfig, extractor: Arc<dyn EntityExtractor>) -> Arc<Self> {
        Arc::new(Self {
            proxy: ProxyClient::new(&config.upstream_url),
            extractor,
            config,
        })
    }
}

/// Builds the configured extractor off the async runtime; model downloads
/// and weight loading block.
pub async fn load_extractor(config: &AppConfig) -> Result<Arc<dyn EntityExtractor>, ExtractError> {
    let config = config.clone();

    let extractor = rocket::tokio::task::spawn_blocking(move || {
        let extractor: Arc<dyn EntityExtractor> = match config.extractor {
            ExtractorKind::Bert => {
                BertExtractor::load(&config.model_repo, &config.model_revision)?
            }
            ExtractorKind::Lexicon => LexiconExtractor::load(&config.lexicon_path)?,
        };
        Ok::<_, ExtractError>(extractor)
    })
    .await
    .map_err(|e| ExtractError::Load(e.into()))??;

    let mapping: Vec<String> = extractor
        .labels()
        .iter()
        .map(|label| format!("{}->{}", label, label.property()))
        .collect();
    tracing::info!("extractor `{}` labels: {}", extractor.name(), mapping.join(", "));

    Ok(extractor)
}
