use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use strum::{Display, EnumIter, EnumString, IntoEnumIterator};

/// Environment variable overriding the data directory
pub const HOME_ENV: &str = "TUTORCHAT_HOME";

/// Hosted model backends a turn can be sent to
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    EnumIter,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum Provider {
    /// Google Generative Language API
    #[default]
    Google,
    /// Zhipu BigModel open platform
    Zhipu,
}

impl Provider {
    pub fn display_name(&self) -> &'static str {
        match self {
            Provider::Google => "Google AI",
            Provider::Zhipu => "ZhipuAI",
        }
    }

    /// Environment variable consulted when no key is stored
    pub fn api_key_env(&self) -> &'static str {
        match self {
            Provider::Google => "GOOGLE_API_KEY",
            Provider::Zhipu => "ZHIPU_API_KEY",
        }
    }
}

/// Credentials and provider choice, saved only on explicit user request
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderSettings {
    #[serde(default)]
    pub google_api_key: String,
    #[serde(default)]
    pub zhipu_api_key: String,
    #[serde(default)]
    pub selected_provider: Provider,
}

impl ProviderSettings {
    /// Configured key for `provider`, ignoring blank values
    pub fn api_key(&self, provider: Provider) -> Option<&str> {
        let key = match provider {
            Provider::Google => &self.google_api_key,
            Provider::Zhipu => &self.zhipu_api_key,
        };
        let key = key.trim();
        (!key.is_empty()).then_some(key)
    }

    pub fn set_api_key(&mut self, provider: Provider, key: String) {
        match provider {
            Provider::Google => self.google_api_key = key,
            Provider::Zhipu => self.zhipu_api_key = key,
        }
    }

    /// Whether any provider has a key at all
    pub fn has_any_api_key(&self) -> bool {
        self.api_key(Provider::Google).is_some() || self.api_key(Provider::Zhipu).is_some()
    }

    /// Fill blank keys from the provider environment variables
    pub fn with_env_fallback(mut self) -> Self {
        for provider in Provider::iter() {
            if self.api_key(provider).is_none() {
                if let Ok(key) = std::env::var(provider.api_key_env()) {
                    self.set_api_key(provider, key);
                }
            }
        }
        self
    }
}

/// Process-level configuration resolved at startup
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Directory holding the persisted records
    pub data_dir: PathBuf,
}

impl AppConfig {
    /// Resolve the data directory: explicit path, then `TUTORCHAT_HOME`, then `~/.tutorchat`
    pub fn resolve(data_dir: Option<PathBuf>) -> Result<Self> {
        let data_dir = match data_dir {
            Some(dir) => dir,
            None => match std::env::var_os(HOME_ENV) {
                Some(dir) => PathBuf::from(dir),
                None => dirs::home_dir()
                    .context("Could not find home directory")?
                    .join(".tutorchat"),
            },
        };

        Ok(Self { data_dir })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_keys_count_as_missing() {
        let settings = ProviderSettings {
            google_api_key: "   ".to_string(),
            zhipu_api_key: "zk-123".to_string(),
            selected_provider: Provider::Google,
        };

        assert_eq!(settings.api_key(Provider::Google), None);
        assert_eq!(settings.api_key(Provider::Zhipu), Some("zk-123"));
        assert!(settings.has_any_api_key());
        assert!(!ProviderSettings::default().has_any_api_key());
    }

    #[test]
    fn provider_parses_case_insensitively() {
        assert_eq!("Google".parse::<Provider>().unwrap(), Provider::Google);
        assert_eq!("zhipu".parse::<Provider>().unwrap(), Provider::Zhipu);
        assert!("openai".parse::<Provider>().is_err());
        assert_eq!(Provider::Zhipu.to_string(), "zhipu");
    }

    #[test]
    fn providers_iterate_in_declaration_order() {
        let providers: Vec<Provider> = Provider::iter().collect();
        assert_eq!(providers, vec![Provider::Google, Provider::Zhipu]);
    }

    #[test]
    fn settings_toml_tolerates_missing_fields() {
        let settings: ProviderSettings = toml::from_str("zhipu_api_key = \"abc\"").unwrap();
        assert_eq!(settings.selected_provider, Provider::Google);
        assert_eq!(settings.api_key(Provider::Zhipu), Some("abc"));
    }

    #[test]
    fn explicit_data_dir_wins() {
        let config = AppConfig::resolve(Some(PathBuf::from("/tmp/somewhere"))).unwrap();
        assert_eq!(config.data_dir, PathBuf::from("/tmp/somewhere"));
    }
}
