use crate::domain::models::AiProvider;
use crate::infrastructure::error::InfraError;
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use url::Url;

const ADVISOR_JSON: &str = "advisor.json";

fn default_files() -> HashMap<&'static str, serde_json::Value> {
    HashMap::from([(
        ADVISOR_JSON,
        serde_json::json!({
            "schema": 1,
            "endpoints": {}
        }),
    )])
}

pub fn ensure_default_configs(config_dir: &Path) -> Result<(), InfraError> {
    for (name, value) in default_files() {
        let path = config_dir.join(name);
        if !path.exists() {
            let formatted = serde_json::to_string_pretty(&value)?;
            fs::write(path, format!("{formatted}\n"))?;
        }
    }
    Ok(())
}

fn read_config(path: &Path) -> Result<serde_json::Value, InfraError> {
    let raw = fs::read_to_string(path)?;
    let parsed: serde_json::Value = serde_json::from_str(&raw)?;
    let schema = parsed
        .get("schema")
        .and_then(serde_json::Value::as_u64)
        .ok_or_else(|| InfraError::InvalidConfig(format!("missing schema in {}", path.display())))?;
    if schema != 1 {
        return Err(InfraError::InvalidConfig(format!(
            "unsupported schema {} in {}",
            schema,
            path.display()
        )));
    }
    Ok(parsed)
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AdvisorEndpoints {
    overrides: HashMap<AiProvider, String>,
}

impl AdvisorEndpoints {
    pub fn endpoint_for(&self, provider: AiProvider) -> Option<&str> {
        self.overrides.get(&provider).map(String::as_str)
    }

    #[cfg(test)]
    pub fn with_override(provider: AiProvider, endpoint: impl Into<String>) -> Self {
        Self {
            overrides: HashMap::from([(provider, endpoint.into())]),
        }
    }
}

// Unknown providers, blank values, and unparsable URLs are skipped so a stale
// advisor.json never blocks the built-in endpoints.
pub fn load_advisor_endpoints(config_dir: &Path) -> AdvisorEndpoints {
    let Ok(parsed) = read_config(&config_dir.join(ADVISOR_JSON)) else {
        return AdvisorEndpoints::default();
    };

    let mut overrides = HashMap::new();
    if let Some(entries) = parsed.get("endpoints").and_then(serde_json::Value::as_object) {
        for (name, value) in entries {
            let Some(provider) = AiProvider::parse(name) else {
                continue;
            };
            let Some(endpoint) = value
                .as_str()
                .map(str::trim)
                .filter(|candidate| !candidate.is_empty())
            else {
                continue;
            };
            if Url::parse(endpoint).is_ok() {
                overrides.insert(provider, endpoint.to_string());
            }
        }
    }
    AdvisorEndpoints { overrides }
}
