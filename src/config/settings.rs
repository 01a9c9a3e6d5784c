//! Settings structures for DeepSearch-RS configuration

use crate::providers::ProviderKind;
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Main settings structure matching settings.yml
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub general: GeneralSettings,
    pub server: ServerSettings,
    pub outgoing: OutgoingSettings,
    pub providers: ProvidersSettings,
    pub report: ReportSettings,
}

impl Settings {
    /// Load settings from a YAML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// Parse settings from YAML text
    pub fn from_yaml(content: &str) -> Result<Self> {
        let settings: Settings = serde_yaml::from_str(content)?;
        Ok(settings)
    }

    /// Merge with environment variables
    pub fn merge_env(&mut self) {
        self.merge_vars(|key| std::env::var(key).ok());
    }

    /// Merge overrides from an arbitrary variable source
    fn merge_vars<F>(&mut self, var: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(val) = var("DEEPSEARCH_DEBUG") {
            self.general.debug = val.parse().unwrap_or(false);
        }
        if let Some(val) = var("DEEPSEARCH_PORT") {
            if let Ok(port) = val.parse() {
                self.server.port = port;
            }
        }
        if let Some(val) = var("DEEPSEARCH_BIND_ADDRESS") {
            self.server.bind_address = val;
        }

        for kind in ProviderKind::all() {
            if let Some(key) = kind.api_key_env().and_then(|env| var(env)) {
                if !key.is_empty() {
                    self.providers.get_mut(*kind).api_key = Some(key);
                }
            }
        }
    }
}

/// General settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralSettings {
    /// Enable debug logging
    pub debug: bool,
    /// Instance name reported by the API
    pub instance_name: String,
}

impl Default for GeneralSettings {
    fn default() -> Self {
        Self {
            debug: false,
            instance_name: "DeepSearch".to_string(),
        }
    }
}

/// Server settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    /// Server port
    pub port: u16,
    /// Bind address
    pub bind_address: String,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            port: 8888,
            bind_address: "127.0.0.1".to_string(),
        }
    }
}

/// Outgoing request settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutgoingSettings {
    /// Default request timeout in seconds
    pub request_timeout: f64,
    /// Upper bound for any per-query timeout
    pub max_request_timeout: f64,
    /// Pool max size
    pub pool_maxsize: usize,
    /// Verify SSL certificates
    pub verify_ssl: bool,
    /// Proxy settings
    pub proxies: ProxySettings,
}

impl Default for OutgoingSettings {
    fn default() -> Self {
        Self {
            request_timeout: 30.0,
            max_request_timeout: 120.0,
            pool_maxsize: 20,
            verify_ssl: true,
            proxies: ProxySettings::default(),
        }
    }
}

/// Proxy settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ProxySettings {
    pub http: Option<String>,
    pub https: Option<String>,
    pub all: Option<String>,
}

/// Per-provider settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderSettings {
    /// API key, if the provider needs one
    pub api_key: Option<String>,
    /// Override of the provider's API endpoint
    pub base_url: Option<String>,
    /// Custom per-query timeout in seconds
    pub timeout: Option<f64>,
    /// Whether the provider is disabled
    pub disabled: bool,
}

/// Settings for every known provider
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ProvidersSettings {
    pub tavily: ProviderSettings,
    pub exa: ProviderSettings,
    pub perplexity: ProviderSettings,
    pub arxiv: ProviderSettings,
    pub pubmed: ProviderSettings,
}

impl ProvidersSettings {
    /// Settings for one provider
    pub fn get(&self, kind: ProviderKind) -> &ProviderSettings {
        match kind {
            ProviderKind::Tavily => &self.tavily,
            ProviderKind::Exa => &self.exa,
            ProviderKind::Perplexity => &self.perplexity,
            ProviderKind::Arxiv => &self.arxiv,
            ProviderKind::Pubmed => &self.pubmed,
        }
    }

    pub fn get_mut(&mut self, kind: ProviderKind) -> &mut ProviderSettings {
        match kind {
            ProviderKind::Tavily => &mut self.tavily,
            ProviderKind::Exa => &mut self.exa,
            ProviderKind::Perplexity => &mut self.perplexity,
            ProviderKind::Arxiv => &mut self.arxiv,
            ProviderKind::Pubmed => &mut self.pubmed,
        }
    }

    /// Providers that are not disabled
    pub fn enabled(&self) -> Vec<ProviderKind> {
        ProviderKind::all()
            .iter()
            .copied()
            .filter(|kind| !self.get(*kind).disabled)
            .collect()
    }
}

/// Defaults for the rendered source report
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReportSettings {
    /// Token budget per source (4 characters per token)
    pub max_tokens_per_source: usize,
    /// Whether full source text is included
    pub include_raw_content: bool,
}

impl Default for ReportSettings {
    fn default() -> Self {
        Self {
            max_tokens_per_source: 1000,
            include_raw_content: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_default_settings() {
        let settings = Settings::default();
        assert_eq!(settings.server.port, 8888);
        assert!(!settings.general.debug);
        assert_eq!(settings.report.max_tokens_per_source, 1000);
        assert_eq!(settings.providers.enabled().len(), ProviderKind::all().len());
    }

    #[test]
    fn test_yaml_overrides() {
        let yaml = r#"
server:
  port: 9000
providers:
  exa:
    api_key: exa-key
    timeout: 12.5
  pubmed:
    disabled: true
report:
  max_tokens_per_source: 250
"#;
        let settings = Settings::from_yaml(yaml).unwrap();

        assert_eq!(settings.server.port, 9000);
        assert_eq!(settings.server.bind_address, "127.0.0.1");
        assert_eq!(settings.providers.exa.api_key.as_deref(), Some("exa-key"));
        assert_eq!(settings.providers.exa.timeout, Some(12.5));
        assert!(settings.providers.pubmed.disabled);
        assert!(!settings.providers.enabled().contains(&ProviderKind::Pubmed));
        assert_eq!(settings.report.max_tokens_per_source, 250);
        assert!(settings.report.include_raw_content);
    }

    #[test]
    fn test_env_overrides() {
        let vars: HashMap<&str, &str> = [
            ("DEEPSEARCH_PORT", "7000"),
            ("DEEPSEARCH_DEBUG", "true"),
            ("TAVILY_API_KEY", "tvly-123"),
            ("EXA_API_KEY", ""),
        ]
        .into_iter()
        .collect();

        let mut settings = Settings::default();
        settings.merge_vars(|key| vars.get(key).map(|v| v.to_string()));

        assert_eq!(settings.server.port, 7000);
        assert!(settings.general.debug);
        assert_eq!(settings.providers.tavily.api_key.as_deref(), Some("tvly-123"));
        assert!(settings.providers.exa.api_key.is_none());
        assert!(settings.providers.arxiv.api_key.is_none());
    }
}
