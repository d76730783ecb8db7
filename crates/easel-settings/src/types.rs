use std::fmt;

use serde::{Deserialize, Serialize};

use easel_core::security::{ApiKey, ProviderConfig};

/// Root settings document (`~/.easel/settings.json`).
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EaselSettings {
    pub server: ServerSettings,
    pub agent: AgentSettings,
    pub providers: Vec<ProviderEntry>,
    pub logging: LoggingSettings,
}

impl Default for EaselSettings {
    fn default() -> Self {
        Self {
            server: ServerSettings::default(),
            agent: AgentSettings::default(),
            providers: default_providers(),
            logging: LoggingSettings::default(),
        }
    }
}

impl EaselSettings {
    pub fn provider(&self, id: &str) -> Option<&ProviderEntry> {
        self.providers.iter().find(|p| p.id == id)
    }
}

/// WebSocket host settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
    /// Per-client outbound queue; messages beyond it are dropped.
    pub max_send_queue: usize,
    pub heartbeat_interval_ms: u64,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 9847,
            max_send_queue: 256,
            heartbeat_interval_ms: 30_000,
        }
    }
}

/// Agent loop tunables.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AgentSettings {
    pub max_iterations: u32,
    /// How long `get_canvas_state` waits for the UI before using its cache.
    pub state_timeout_ms: u64,
    pub tool_timeout_secs: u64,
    pub max_tokens: u32,
}

impl Default for AgentSettings {
    fn default() -> Self {
        Self {
            max_iterations: 15,
            state_timeout_ms: 2_000,
            tool_timeout_secs: 30,
            max_tokens: 4_096,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LoggingSettings {
    pub level: String,
    pub json: bool,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self { level: "info".to_string(), json: false }
    }
}

/// One configured chat-model backend, referenced by `id` from start requests.
#[derive(Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderEntry {
    pub id: String,
    /// `anthropic`, `openai` or `gemini`. Left as text so that an unknown kind
    /// fails the run that uses it instead of the whole settings file.
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    /// Environment variable consulted when `api_key` is absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key_env: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_model: Option<String>,
}

impl fmt::Debug for ProviderEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderEntry")
            .field("id", &self.id)
            .field("kind", &self.kind)
            .field("api_key", &self.api_key.as_ref().map(|_| "[REDACTED]"))
            .field("api_key_env", &self.api_key_env)
            .field("base_url", &self.base_url)
            .field("default_model", &self.default_model)
            .finish()
    }
}

impl ProviderEntry {
    fn builtin(kind: &str, env: &str, model: &str) -> Self {
        Self {
            id: kind.to_string(),
            kind: kind.to_string(),
            api_key: None,
            api_key_env: Some(env.to_string()),
            base_url: None,
            default_model: Some(model.to_string()),
        }
    }

    /// Inline key first, then the named environment variable.
    pub fn resolve_api_key(&self) -> Option<ApiKey> {
        self.resolve_api_key_with(|name| std::env::var(name).ok())
    }

    pub fn resolve_api_key_with(&self, lookup: impl Fn(&str) -> Option<String>) -> Option<ApiKey> {
        let inline = self.api_key.clone().filter(|k| !k.trim().is_empty());
        inline
            .or_else(|| {
                self.api_key_env
                    .as_deref()
                    .and_then(&lookup)
                    .filter(|k| !k.trim().is_empty())
            })
            .map(ApiKey::new)
    }

    pub fn to_provider_config(&self) -> ProviderConfig {
        ProviderConfig {
            kind: self.kind.clone(),
            api_key: self.resolve_api_key(),
            base_url: self.base_url.clone(),
        }
    }
}

/// Providers available out of the box, keyed by the vendors' usual env vars.
pub fn default_providers() -> Vec<ProviderEntry> {
    vec![
        ProviderEntry::builtin("anthropic", "ANTHROPIC_API_KEY", "claude-sonnet-4-5"),
        ProviderEntry::builtin("openai", "OPENAI_API_KEY", "gpt-4o"),
        ProviderEntry::builtin("gemini", "GEMINI_API_KEY", "gemini-2.5-flash"),
    ]
}
