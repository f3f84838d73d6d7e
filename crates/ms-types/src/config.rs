use serde::{Deserialize, Serialize};

/// Persona specification (`mind_seed.json`).
///
/// Every field is optional at load time so a partial persona still drives a
/// reflection; [`MindSeed::validate`] reports what a complete one must carry.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MindSeed {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stage: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub core_values: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub constraints: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub relational_style: Option<RelationalStyle>,
    /// Read by validation only; the reflection prompt does not use it.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub orientation: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RelationalStyle {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tone: Option<String>,
}

impl MindSeed {
    /// List everything missing from a complete persona. Empty means valid.
    pub fn validate(&self) -> Vec<String> {
        let mut problems = Vec::new();
        let mut require = |present: bool, field: &str| {
            if !present {
                problems.push(format!("missing required field `{field}`"));
            }
        };

        require(self.name.is_some(), "name");
        require(self.stage.is_some(), "stage");
        require(self.core_values.is_some(), "core_values");
        require(self.orientation.is_some(), "orientation");
        require(self.constraints.is_some(), "constraints");
        match &self.relational_style {
            Some(style) => {
                require(style.role.is_some(), "relational_style.role");
                require(style.tone.is_some(), "relational_style.tone");
            }
            None => require(false, "relational_style"),
        }

        problems
    }
}

// ─── Runtime settings (morningstar.toml) ─────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub llm: LlmSettings,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LlmSettings {
    #[serde(default)]
    pub provider: LlmProvider,
    /// Model identifier. `LLM_MODEL_NAME` takes priority at runtime.
    #[serde(default)]
    pub model: Option<String>,
    /// Overrides the provider's public endpoint.
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    /// Optional API key stored in config (`LLM_API_KEY` takes priority at runtime).
    #[serde(default)]
    pub api_key: Option<String>,
}

fn default_max_tokens() -> u32 {
    2048
}

impl Default for LlmSettings {
    fn default() -> Self {
        Self {
            provider: LlmProvider::default(),
            model: None,
            base_url: None,
            max_tokens: default_max_tokens(),
            api_key: None,
        }
    }
}

impl LlmSettings {
    pub fn endpoint(&self) -> &str {
        self.base_url
            .as_deref()
            .unwrap_or_else(|| self.provider.default_base_url())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LlmProvider {
    /// OpenAI-compatible chat completions.
    #[default]
    OpenAi,
    Anthropic,
}

impl LlmProvider {
    pub fn default_base_url(&self) -> &'static str {
        match self {
            Self::Anthropic => "https://api.anthropic.com/v1",
            Self::OpenAi => "https://api.openai.com/v1",
        }
    }
}

impl std::fmt::Display for LlmProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Anthropic => write!(f, "anthropic"),
            Self::OpenAi => write!(f, "openai"),
        }
    }
}

impl std::str::FromStr for LlmProvider {
    type Err = anyhow::Error;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "anthropic" => Ok(Self::Anthropic),
            "openai" => Ok(Self::OpenAi),
            _ => Err(anyhow::anyhow!("unknown LLM provider: {}", s)),
        }
    }
}
