use serde::{Deserialize, Serialize};
use thiserror::Error;
use validator::Validate;

/// Named bundle of provider defaults.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Preset {
    OpenAI,
    Ollama,
}

/// Client configuration as written by users, either in the config file or in
/// a `setClient` request. Unset fields inherit from the preset.
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
pub struct ClientConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preset: Option<Preset>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub base_url: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub key: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub model: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[validate(range(min = 1))]
    pub concurrency: Option<u32>,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid client config: {0}")]
    Invalid(#[from] validator::ValidationErrors),
}

/// Fully resolved configuration a client runs with.
#[derive(Debug, Clone)]
pub(crate) struct ResolvedConfig {
    pub base_url: String,
    pub key: String,
    pub model: String,
    pub concurrency: usize,
}

const OPENAI_BASE_URL: &str = "https://api.openai.com/v1/";
const OLLAMA_BASE_URL: &str = "http://localhost:11434/v1/";

fn preset_config(preset: Preset) -> ClientConfig {
    match preset {
        Preset::OpenAI => ClientConfig {
            base_url: OPENAI_BASE_URL.to_string(),
            concurrency: Some(5),
            ..ClientConfig::default()
        },
        Preset::Ollama => ClientConfig {
            base_url: OLLAMA_BASE_URL.to_string(),
            key: "ollama".to_string(),
            concurrency: Some(1),
            ..ClientConfig::default()
        },
    }
}

/// Resolves a user config against its preset: preset values first, explicit
/// values on top, and the OpenAI base URL as the final fallback.
pub(crate) fn resolve_config(src: &ClientConfig) -> Result<ResolvedConfig, ConfigError> {
    src.validate()?;

    let mut dest = ResolvedConfig {
        base_url: String::new(),
        key: String::new(),
        model: String::new(),
        concurrency: 1,
    };

    if let Some(preset) = src.preset {
        apply_config(&mut dest, &preset_config(preset));
    }

    apply_config(&mut dest, src);

    if dest.base_url.is_empty() {
        dest.base_url = OPENAI_BASE_URL.to_string();
    }

    Ok(dest)
}

fn apply_config(dest: &mut ResolvedConfig, src: &ClientConfig) {
    if !src.base_url.is_empty() {
        dest.base_url.clone_from(&src.base_url);
    }
    if !src.key.is_empty() {
        dest.key.clone_from(&src.key);
    }
    if !src.model.is_empty() {
        dest.model.clone_from(&src.model);
    }
    if let Some(concurrency) = src.concurrency {
        dest.concurrency = concurrency as usize;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_to_openai_base_url() {
        let resolved = resolve_config(&ClientConfig::default()).unwrap();
        assert_eq!(resolved.base_url, OPENAI_BASE_URL);
        assert_eq!(resolved.concurrency, 1);
    }

    #[test]
    fn preset_values_apply_under_explicit_ones() {
        let resolved = resolve_config(&ClientConfig {
            preset: Some(Preset::Ollama),
            model: "llama3".to_string(),
            ..ClientConfig::default()
        })
        .unwrap();

        assert_eq!(resolved.base_url, OLLAMA_BASE_URL);
        assert_eq!(resolved.key, "ollama");
        assert_eq!(resolved.model, "llama3");
        assert_eq!(resolved.concurrency, 1);

        let resolved = resolve_config(&ClientConfig {
            preset: Some(Preset::OpenAI),
            ..ClientConfig::default()
        })
        .unwrap();
        assert_eq!(resolved.concurrency, 5);
    }

    #[test]
    fn explicit_values_override_preset() {
        let resolved = resolve_config(&ClientConfig {
            preset: Some(Preset::OpenAI),
            base_url: "https://proxy.example.com/v1/".to_string(),
            concurrency: Some(2),
            ..ClientConfig::default()
        })
        .unwrap();

        assert_eq!(resolved.base_url, "https://proxy.example.com/v1/");
        assert_eq!(resolved.concurrency, 2);
    }

    #[test]
    fn invalid_concurrency_is_rejected() {
        let err = resolve_config(&ClientConfig {
            concurrency: Some(0),
            ..ClientConfig::default()
        });
        assert!(err.is_err());
    }

    #[test]
    fn preset_names_deserialize_lowercase() {
        let config: ClientConfig =
            serde_json::from_str("{\"preset\":\"ollama\"}").unwrap();
        assert_eq!(config.preset, Some(Preset::Ollama));
    }
}
