//! TOML-based configuration for narrator.
//!
//! Supports a config file (narrator.toml) with environment variable expansion.
//!
//! Example configuration:
//! ```toml
//! [powerbi]
//! tenant_id = "${AZURE_TENANT_ID}"
//! client_id = "${AZURE_CLIENT_ID}"
//! client_secret = "${AZURE_CLIENT_SECRET}"
//! workspace = "Retail Analytics"
//! dataset = "Sales Model"
//!
//! [openai]
//! endpoint = "https://my-gateway.azure-api.net"
//! deployment_id = "gpt-4o"
//! api_version = "2024-02-01"
//! subscription_key = "${APIM_SUBSCRIPTION_KEY}"
//!
//! [narrative]
//! system_prompt = "Describe the ranked table in two sentences."
//! summary_prompt = "Summarize these findings for an executive."
//!
//! [drill]
//! rank_depth = 3
//! on_query_failure = "degrade"
//!
//! [sink]
//! path = "narratives.csv"
//! ```

use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use crate::drill::FailurePolicy;

/// Error type for settings.
#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    #[error("Config file not found: {0}")]
    FileNotFound(PathBuf),

    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse config file: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Missing required setting: {0}")]
    MissingSetting(&'static str),
}

/// Root configuration structure.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct Settings {
    /// Analytical service connection.
    pub powerbi: PowerBiSettings,

    /// Language model endpoint.
    pub openai: OpenAiSettings,

    /// Prompts.
    pub narrative: NarrativeSettings,

    /// Drill defaults.
    pub drill: DrillSettings,

    /// Output log.
    pub sink: SinkSettings,
}

/// Analytical service connection (service principal + dataset).
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct PowerBiSettings {
    /// Directory tenant (supports ${ENV_VAR} expansion).
    pub tenant_id: String,

    pub client_id: String,

    pub client_secret: String,

    /// Workspace display name, resolved to an id at startup.
    pub workspace: String,

    /// Dataset display name, resolved to an id at startup.
    pub dataset: String,

    /// Skip name resolution and use this dataset id directly.
    pub dataset_id: Option<String>,

    /// Identity provider base URL.
    pub authority_host: String,

    /// REST API base URL.
    pub api_base: String,

    /// OAuth scope requested for the token.
    pub scope: String,

    /// Per-request timeout in seconds.
    pub timeout_secs: u64,
}

impl Default for PowerBiSettings {
    fn default() -> Self {
        Self {
            tenant_id: String::new(),
            client_id: String::new(),
            client_secret: String::new(),
            workspace: String::new(),
            dataset: String::new(),
            dataset_id: None,
            authority_host: "https://login.microsoftonline.com".to_string(),
            api_base: "https://api.powerbi.com/v1.0/myorg".to_string(),
            scope: "https://analysis.windows.net/powerbi/api/.default".to_string(),
            timeout_secs: 120,
        }
    }
}

impl PowerBiSettings {
    /// Copy with every `${VAR}` expanded and required fields checked.
    pub fn resolved(&self) -> Result<Self, SettingsError> {
        let resolved = Self {
            tenant_id: expand_env_vars(&self.tenant_id)?,
            client_id: expand_env_vars(&self.client_id)?,
            client_secret: expand_env_vars(&self.client_secret)?,
            workspace: expand_env_vars(&self.workspace)?,
            dataset: expand_env_vars(&self.dataset)?,
            dataset_id: self.dataset_id.as_deref().map(expand_env_vars).transpose()?,
            authority_host: expand_env_vars(&self.authority_host)?,
            api_base: expand_env_vars(&self.api_base)?,
            scope: self.scope.clone(),
            timeout_secs: self.timeout_secs,
        };

        require(&resolved.tenant_id, "powerbi.tenant_id")?;
        require(&resolved.client_id, "powerbi.client_id")?;
        require(&resolved.client_secret, "powerbi.client_secret")?;
        if resolved.dataset_id.is_none() {
            require(&resolved.workspace, "powerbi.workspace")?;
            require(&resolved.dataset, "powerbi.dataset")?;
        }
        Ok(resolved)
    }
}

/// Chat-completions endpoint behind an API gateway.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct OpenAiSettings {
    /// Gateway base URL.
    pub endpoint: String,

    pub deployment_id: String,

    pub api_version: String,

    /// Gateway subscription key (supports ${ENV_VAR} expansion).
    pub subscription_key: String,

    pub max_tokens: u32,

    /// Caller tag sent with each request.
    pub user: String,

    pub timeout_secs: u64,
}

impl Default for OpenAiSettings {
    fn default() -> Self {
        Self {
            endpoint: String::new(),
            deployment_id: String::new(),
            api_version: "2024-02-01".to_string(),
            subscription_key: String::new(),
            max_tokens: 4096,
            user: "narrator".to_string(),
            timeout_secs: 300,
        }
    }
}

impl OpenAiSettings {
    /// Copy with every `${VAR}` expanded and required fields checked.
    pub fn resolved(&self) -> Result<Self, SettingsError> {
        let resolved = Self {
            endpoint: expand_env_vars(&self.endpoint)?,
            deployment_id: expand_env_vars(&self.deployment_id)?,
            api_version: expand_env_vars(&self.api_version)?,
            subscription_key: expand_env_vars(&self.subscription_key)?,
            max_tokens: self.max_tokens,
            user: self.user.clone(),
            timeout_secs: self.timeout_secs,
        };

        require(&resolved.endpoint, "openai.endpoint")?;
        require(&resolved.deployment_id, "openai.deployment_id")?;
        require(&resolved.subscription_key, "openai.subscription_key")?;
        Ok(resolved)
    }

    /// `{endpoint}/openai/deployments/{deployment}/chat/completions?api-version={v}`
    pub fn chat_url(&self) -> String {
        format!(
            "{}/openai/deployments/{}/chat/completions?api-version={}",
            self.endpoint.trim_end_matches('/'),
            self.deployment_id,
            self.api_version
        )
    }
}

/// Prompts used for narrative synthesis.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct NarrativeSettings {
    /// System prompt for each level's narrative.
    pub system_prompt: String,

    /// System prompt for the final summary.
    pub summary_prompt: String,
}

impl Default for NarrativeSettings {
    fn default() -> Self {
        Self {
            system_prompt: "You are a business analyst. The user message starts with a heading \
                            of the form '<parent> by <child>' followed by JSON rows ranked within \
                            each parent. Describe the most notable contributors in plain prose."
                .to_string(),
            summary_prompt: "You are a business analyst. The user message is a JSON array of \
                             narratives, one per drill level, coarsest first. Write one concise \
                             summary connecting them."
                .to_string(),
        }
    }
}

/// Defaults applied to drill requests.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct DrillSettings {
    /// Top-N per parent when the request does not say.
    pub rank_depth: u32,

    /// `"degrade"` or `"abort"`.
    pub on_query_failure: FailurePolicy,
}

impl Default for DrillSettings {
    fn default() -> Self {
        Self {
            rank_depth: 3,
            on_query_failure: FailurePolicy::Degrade,
        }
    }
}

/// Output log location.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SinkSettings {
    pub path: String,
}

impl Default for SinkSettings {
    fn default() -> Self {
        Self {
            path: "narratives.csv".to_string(),
        }
    }
}

impl SinkSettings {
    pub fn resolved_path(&self) -> Result<PathBuf, SettingsError> {
        Ok(PathBuf::from(expand_env_vars(&self.path)?))
    }
}

impl Settings {
    /// Load settings from a TOML file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, SettingsError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(SettingsError::FileNotFound(path.to_path_buf()));
        }

        let content = fs::read_to_string(path)?;
        let settings: Settings = toml::from_str(&content)?;
        Ok(settings)
    }

    /// Load settings from the default config file locations.
    ///
    /// Searches in order:
    /// 1. Environment variable `NARRATOR_CONFIG`
    /// 2. `./narrator.toml`
    /// 3. `~/.config/narrator/config.toml`
    pub fn load() -> Result<Self, SettingsError> {
        if let Ok(path) = env::var("NARRATOR_CONFIG") {
            return Self::from_file(&path);
        }

        let local_config = PathBuf::from("narrator.toml");
        if local_config.exists() {
            return Self::from_file(&local_config);
        }

        if let Some(config_dir) = dirs::config_dir() {
            let user_config = config_dir.join("narrator").join("config.toml");
            if user_config.exists() {
                return Self::from_file(&user_config);
            }
        }

        Ok(Settings::default())
    }
}

fn require(value: &str, name: &'static str) -> Result<(), SettingsError> {
    if value.trim().is_empty() {
        return Err(SettingsError::MissingSetting(name));
    }
    Ok(())
}

/// Expand environment variables in a string.
///
/// Supports `${VAR}` and `$VAR` syntax.
pub fn expand_env_vars(s: &str) -> Result<String, SettingsError> {
    let mut result = String::with_capacity(s.len());
    let mut chars = s.chars().peekable();

    while let Some(c) = chars.next() {
        if c != '$' {
            result.push(c);
            continue;
        }

        let mut var_name = String::new();
        if chars.peek() == Some(&'{') {
            chars.next(); // consume '{'
            for ch in chars.by_ref() {
                if ch == '}' {
                    break;
                }
                var_name.push(ch);
            }
        } else {
            // $VAR ends at the first non-alphanumeric/underscore
            while let Some(&ch) = chars.peek() {
                if !(ch.is_alphanumeric() || ch == '_') {
                    break;
                }
                var_name.push(ch);
                chars.next();
            }
            if var_name.is_empty() {
                // Just a lone $, keep it
                result.push('$');
                continue;
            }
        }

        let value =
            env::var(&var_name).map_err(|_| SettingsError::MissingEnvVar(var_name.clone()))?;
        result.push_str(&value);
    }

    Ok(result)
}
