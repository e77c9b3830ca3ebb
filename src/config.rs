use std::path::PathBuf;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExtractorKind {
    Bert,
    Lexicon,
}

/// Service settings, read from Rocket's figment (`Rocket.toml`,
/// `ROCKET_*` env vars).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub upstream_url: String,
    pub extractor: ExtractorKind,
    pub model_repo: String,
    pub model_revision: String,
    pub lexicon_path: PathBuf,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            upstream_url: "http://127.0.0.1:5000/api".to_string(),
            extractor: ExtractorKind::Bert,
            model_repo: "dslim/bert-base-NER".to_string(),
            model_revision: "main".to_string(),
            lexicon_path: PathBuf::from("data/lexicon.json"),
        }
    }
}

#[cfg(test)]
mod tests {
    use rocket::figment::Figment;

    use super::*;

    #[test]
    fn defaults_fill_missing_keys() {
        let config: AppConfig = Figment::new()
            .merge(("extractor", "lexicon"))
            .extract()
            .unwrap();
        assert_eq!(config.extractor, ExtractorKind::Lexicon);
        assert_eq!(config.upstream_url, "http://127.0.0.1:5000/api");
        assert_eq!(config.model_repo, "dslim/bert-base-NER");
    }

    #[test]
    fn unknown_extractor_is_rejected() {
        let result: Result<AppConfig, _> = Figment::new().merge(("extractor", "spacy")).extract();
        assert!(result.is_err());
    }
}
