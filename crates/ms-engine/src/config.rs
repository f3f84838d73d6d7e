//! File-backed configuration: persona, guiding document and runtime settings.

use std::path::{Path, PathBuf};

use tracing::{debug, info};

use ms_types::config::{LlmProvider, MindSeed, Settings};

use crate::error::{Error, Result};

pub const MIND_SEED_FILE: &str = "mind_seed.json";
pub const CONSTITUTION_FILE: &str = "constitution.md";
pub const SETTINGS_FILE: &str = "morningstar.toml";

/// Returns the Morningstar home directory: `$MORNINGSTAR_HOME`, else `~/.morningstar/`.
pub fn morningstar_home() -> PathBuf {
    if let Some(dir) = std::env::var_os("MORNINGSTAR_HOME").filter(|v| !v.is_empty()) {
        return PathBuf::from(dir);
    }
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".morningstar")
}

/// Returns the config directory (`<home>/config/`)
pub fn config_dir() -> PathBuf {
    morningstar_home().join("config")
}

/// Returns the memory log directory (`<home>/memory/`)
pub fn memory_dir() -> PathBuf {
    morningstar_home().join("memory")
}

/// Configuration provider rooted at one directory.
#[derive(Debug, Clone)]
pub struct ConfigStore {
    dir: PathBuf,
}

impl ConfigStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn open_default() -> Self {
        Self::new(config_dir())
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn mind_seed_path(&self) -> PathBuf {
        self.dir.join(MIND_SEED_FILE)
    }

    pub fn constitution_path(&self) -> PathBuf {
        self.dir.join(CONSTITUTION_FILE)
    }

    pub fn settings_path(&self) -> PathBuf {
        self.dir.join(SETTINGS_FILE)
    }

    /// Load the persona. Missing and unparsable files are distinct errors.
    pub fn load_persona(&self) -> Result<MindSeed> {
        let path = self.mind_seed_path();
        let contents = match std::fs::read_to_string(&path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(Error::ConfigMissing(path));
            }
            Err(e) => {
                return Err(Error::Config(format!(
                    "Failed to read {}: {e}",
                    path.display()
                )));
            }
        };

        let seed = serde_json::from_str(&contents).map_err(|e| Error::ConfigMalformed {
            path: path.clone(),
            source: Box::new(e),
        })?;
        debug!("Loaded persona from {}", path.display());
        Ok(seed)
    }

    /// Load the guiding document. A missing or blank file is `None`.
    pub fn load_guiding_text(&self) -> Result<Option<String>> {
        let path = self.constitution_path();
        match std::fs::read_to_string(&path) {
            Ok(text) if text.trim().is_empty() => Ok(None),
            Ok(text) => Ok(Some(text)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(Error::Config(format!(
                "Failed to read {}: {e}",
                path.display()
            ))),
        }
    }

    /// Load runtime settings. A missing file means defaults; nothing is
    /// written. Environment variables override file values.
    pub fn load_settings(&self) -> Result<Settings> {
        let mut settings = self.load_settings_file()?;
        apply_env_overrides(&mut settings, |key| std::env::var(key).ok())?;
        Ok(settings)
    }

    /// Write a default settings file if none exists. Returns true when one
    /// was written.
    pub fn init_settings(&self) -> Result<bool> {
        let path = self.settings_path();
        if path.exists() {
            return Ok(false);
        }

        std::fs::create_dir_all(&self.dir)?;
        let toml_str = toml::to_string_pretty(&Settings::default()).map_err(|e| {
            Error::Config(format!("Failed to serialize default settings: {e}"))
        })?;
        std::fs::write(&path, toml_str)?;
        info!("Wrote default settings to {}", path.display());
        Ok(true)
    }

    fn load_settings_file(&self) -> Result<Settings> {
        let path = self.settings_path();
        let contents = match std::fs::read_to_string(&path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("No settings file at {}; using defaults", path.display());
                return Ok(Settings::default());
            }
            Err(e) => return Err(e.into()),
        };

        toml::from_str(&contents).map_err(|e| Error::ConfigMalformed {
            path,
            source: Box::new(e),
        })
    }
}

/// Apply `LLM_*` overrides. Empty values are ignored.
pub fn apply_env_overrides<F>(settings: &mut Settings, lookup: F) -> Result<()>
where
    F: Fn(&str) -> Option<String>,
{
    let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

    if let Some(provider) = get("LLM_PROVIDER") {
        settings.llm.provider = provider
            .parse::<LlmProvider>()
            .map_err(|e| Error::Config(e.to_string()))?;
    }
    if let Some(model) = get("LLM_MODEL_NAME") {
        settings.llm.model = Some(model);
    }
    if let Some(url) = get("LLM_BASE_URL") {
        settings.llm.base_url = Some(url);
    }
    if let Some(key) = get("LLM_API_KEY") {
        settings.llm.api_key = Some(key);
    }
    Ok(())
}
