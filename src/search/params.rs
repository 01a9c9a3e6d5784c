//! Caller configuration filtering

use crate::providers::ProviderKind;
use serde_json::{Map, Value};

/// Free-form configuration supplied with a batch
pub type ConfigMap = Map<String, Value>;

/// Keep only the configuration keys the named provider accepts.
///
/// Absent configuration and unknown providers both yield an empty map.
pub fn get_search_params(provider: &str, config: Option<&ConfigMap>) -> ConfigMap {
    match provider.parse::<ProviderKind>() {
        Ok(kind) => filter_params(kind, config),
        Err(_) => ConfigMap::new(),
    }
}

/// Keep only the configuration keys `kind` accepts
pub fn filter_params(kind: ProviderKind, config: Option<&ConfigMap>) -> ConfigMap {
    let Some(config) = config else {
        return ConfigMap::new();
    };
    let accepted = kind.accepted_params();

    config
        .iter()
        .filter(|(key, _)| accepted.contains(&key.as_str()))
        .map(|(key, value)| (key.clone(), value.clone()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn config(value: Value) -> ConfigMap {
        match value {
            Value::Object(map) => map,
            _ => panic!("expected an object"),
        }
    }

    #[test]
    fn test_unknown_keys_dropped() {
        let config = config(json!({
            "load_max_docs": 3,
            "num_results": 10,
            "api_key": "not for arxiv"
        }));

        let params = get_search_params("arxiv", Some(&config));
        assert_eq!(Value::Object(params), json!({"load_max_docs": 3}));
    }

    #[test]
    fn test_absent_config() {
        assert!(get_search_params("exa", None).is_empty());
    }

    #[test]
    fn test_unknown_provider() {
        let config = config(json!({"num_results": 10}));
        assert!(get_search_params("bing", Some(&config)).is_empty());
    }

    #[test]
    fn test_providers_without_options() {
        let config = config(json!({"max_results": 10, "topic": "news"}));
        assert!(get_search_params("tavily", Some(&config)).is_empty());
        assert!(get_search_params("perplexity", Some(&config)).is_empty());
    }

    #[test]
    fn test_aliases_resolve() {
        let config = config(json!({"top_k_results": 2, "subpages": 1}));
        let params = get_search_params("biomedical", Some(&config));
        assert_eq!(Value::Object(params), json!({"top_k_results": 2}));
    }
}
