use std::collections::HashMap;
use std::env;

use crate::elastic::{self, types::IndexTarget};
use crate::llm::types::ParseEffortError;
use crate::llm::{LlmSettings, ReasoningEffort, client};
use crate::retrieval::ContentField;

const DEFAULT_INDEX: &str = "*";
const DEFAULT_CONTENT_FIELD: &str = "content";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("content field must be set (ELASTICSEARCH_CONTENT_FIELD)")]
    MissingContentField,

    #[error("{var} is not a valid URL: {source}")]
    InvalidUrl {
        var: &'static str,
        source: url::ParseError,
    },

    #[error("{var} must be a URL with an http or https scheme, got '{value}'")]
    UnsupportedScheme { var: &'static str, value: String },

    #[error("{var} must be a positive integer, got '{value}'")]
    InvalidNumber { var: &'static str, value: String },

    #[error("LLM_REASONING_EFFORT: {0}")]
    InvalidReasoningEffort(#[from] ParseEffortError),
}

/// Process configuration, read once at startup.
///
/// Variables:
/// - `ELASTICSEARCH_URL`, `ELASTICSEARCH_INDEX`, `ELASTICSEARCH_CONTENT_FIELD`,
///   `ELASTICSEARCH_API_KEY`, `ELASTICSEARCH_RESULT_SIZE`
/// - `GROQ_API_KEY`, `LLM_BASE_URL`, `LLM_MODEL`, `LLM_REASONING_EFFORT`
#[derive(Debug, Clone)]
pub struct Config {
    pub elastic_url: String,
    pub elastic_api_key: Option<String>,
    pub index: IndexTarget,
    /// `None` when configured blank; the retriever rejects it at construction.
    pub content_field: Option<ContentField>,
    pub result_size: Option<usize>,
    pub llm: LlmSettings,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let elastic_url = get("ELASTICSEARCH_URL").unwrap_or_else(|| elastic::DEFAULT_URL.into());
        validate_url("ELASTICSEARCH_URL", &elastic_url)?;

        let base_url = get("LLM_BASE_URL").unwrap_or_else(|| client::DEFAULT_BASE_URL.into());
        validate_url("LLM_BASE_URL", &base_url)?;

        let index = IndexTarget::parse(&get("ELASTICSEARCH_INDEX").unwrap_or_else(|| DEFAULT_INDEX.into()));

        // An explicitly blank value is kept as "unset" rather than defaulted.
        let content_field = match lookup("ELASTICSEARCH_CONTENT_FIELD") {
            Some(v) => parse_content_field(&v),
            None => Some(ContentField::Single(DEFAULT_CONTENT_FIELD.into())),
        };

        let result_size = get("ELASTICSEARCH_RESULT_SIZE")
            .map(|raw| match raw.parse::<usize>() {
                Ok(n) if n > 0 => Ok(n),
                _ => Err(ConfigError::InvalidNumber {
                    var: "ELASTICSEARCH_RESULT_SIZE",
                    value: raw,
                }),
            })
            .transpose()?;

        let reasoning_effort = get("LLM_REASONING_EFFORT")
            .map(|raw| raw.parse::<ReasoningEffort>())
            .transpose()?
            .unwrap_or_default();

        Ok(Self {
            elastic_url,
            elastic_api_key: get("ELASTICSEARCH_API_KEY"),
            index,
            content_field,
            result_size,
            llm: LlmSettings {
                base_url,
                api_key: get("GROQ_API_KEY"),
                model: get("LLM_MODEL").unwrap_or_else(|| client::DEFAULT_MODEL.into()),
                reasoning_effort,
            },
        })
    }
}

/// `field` for every index, or `index=field,index=field` per index.
fn parse_content_field(raw: &str) -> Option<ContentField> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    if !raw.contains('=') {
        return Some(ContentField::Single(raw.to_string()));
    }
    let map: HashMap<String, String> = raw
        .split(',')
        .filter_map(|pair| pair.split_once('='))
        .map(|(index, field)| (index.trim().to_string(), field.trim().to_string()))
        .collect();
    Some(ContentField::PerIndex(map))
}

fn validate_url(var: &'static str, value: &str) -> Result<(), ConfigError> {
    let parsed = url::Url::parse(value).map_err(|source| ConfigError::InvalidUrl { var, source })?;
    match parsed.scheme() {
        "http" | "https" => Ok(()),
        _ => Err(ConfigError::UnsupportedScheme {
            var,
            value: value.to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn load(vars: &[(&str, &str)]) -> Result<Config, ConfigError> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| map.get(key).cloned())
    }

    #[test]
    fn defaults_match_local_setup() {
        let config = load(&[("GROQ_API_KEY", "gsk_test")]).unwrap();
        assert_eq!(config.elastic_url, "http://localhost:9200");
        assert_eq!(config.index, IndexTarget::Single("*".into()));
        assert_eq!(
            config.content_field,
            Some(ContentField::Single("content".into()))
        );
        assert_eq!(config.result_size, None);
        assert_eq!(config.llm.model, "openai/gpt-oss-120b");
        assert_eq!(config.llm.reasoning_effort, ReasoningEffort::Medium);
        assert_eq!(config.llm.api_key.as_deref(), Some("gsk_test"));
    }

    #[test]
    fn overrides_are_applied() {
        let config = load(&[
            ("ELASTICSEARCH_URL", "https://search.internal:9243"),
            ("ELASTICSEARCH_INDEX", "quran,hadith"),
            ("ELASTICSEARCH_CONTENT_FIELD", "body"),
            ("ELASTICSEARCH_RESULT_SIZE", "5"),
            ("LLM_MODEL", "llama-3.3-70b-versatile"),
            ("LLM_REASONING_EFFORT", "high"),
        ])
        .unwrap();
        assert_eq!(
            config.index,
            IndexTarget::Many(vec!["quran".into(), "hadith".into()])
        );
        assert_eq!(config.content_field, Some(ContentField::Single("body".into())));
        assert_eq!(config.result_size, Some(5));
        assert_eq!(config.llm.model, "llama-3.3-70b-versatile");
        assert_eq!(config.llm.reasoning_effort, ReasoningEffort::High);
    }

    #[test]
    fn blank_content_field_is_unset() {
        let config = load(&[("ELASTICSEARCH_CONTENT_FIELD", "  ")]).unwrap();
        assert!(config.content_field.is_none());
    }

    #[test]
    fn per_index_content_fields() {
        let config = load(&[("ELASTICSEARCH_CONTENT_FIELD", "quran=translation, hadith=content")])
            .unwrap();
        assert_eq!(
            config.content_field,
            Some(ContentField::PerIndex(HashMap::from([
                ("quran".to_string(), "translation".to_string()),
                ("hadith".to_string(), "content".to_string()),
            ])))
        );
    }

    #[test]
    fn invalid_values_are_rejected() {
        assert!(matches!(
            load(&[("ELASTICSEARCH_URL", "not a url")]),
            Err(ConfigError::InvalidUrl { var: "ELASTICSEARCH_URL", .. })
        ));
        assert!(matches!(
            load(&[("LLM_BASE_URL", "ftp://models.example")]),
            Err(ConfigError::UnsupportedScheme { var: "LLM_BASE_URL", .. })
        ));
        assert!(matches!(
            load(&[("ELASTICSEARCH_RESULT_SIZE", "0")]),
            Err(ConfigError::InvalidNumber { .. })
        ));
        assert!(matches!(
            load(&[("LLM_REASONING_EFFORT", "max")]),
            Err(ConfigError::InvalidReasoningEffort(_))
        ));
    }
}
