use serde::{Deserialize, Serialize};
use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::providers::ProviderKind;

pub const DEFAULT_SYSTEM_MESSAGE: &str = "You are a helpful assistant";
pub const DEFAULT_CLAUDE_API_VERSION: &str = "2023-06-01";
pub const DEFAULT_MAX_TOKENS: u32 = 1024;
pub const SETTINGS_FILE_NAME: &str = ".ask_ai_settings.yaml";

pub const CLAUDE_MODELS: &[&str] = &[
    "claude-3-5-sonnet-20240620",
    "claude-3-opus-20240229",
    "claude-3-sonnet-20240229",
    "claude-3-haiku-20240307",
];
pub const OPENAI_MODELS: &[&str] = &["gpt-3.5-turbo", "gpt-4.0-turbo", "text-davinci-003"];

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not resolve the home directory; pass --config or set ASK_CONFIG")]
    HomeDirUnavailable,

    #[error("failed to read settings file '{}': {source}", path.display())]
    Read { path: PathBuf, source: io::Error },

    #[error("failed to parse settings file '{}': {source}", path.display())]
    Parse {
        path: PathBuf,
        source: serde_yaml::Error,
    },

    #[error("failed to write settings file '{}': {source}", path.display())]
    Write { path: PathBuf, source: io::Error },

    #[error("failed to encode settings: {0}")]
    Encode(#[source] serde_yaml::Error),

    #[error("failed to talk to the terminal: {0}")]
    Console(#[from] io::Error),

    #[error("input closed before setup finished")]
    InputClosed,

    #[error("no default provider selected; run with --update-config")]
    NoDefaultProvider,

    #[error(
        "{provider} is not configured; run with --update-config to add its API key and model"
    )]
    ProviderNotConfigured { provider: ProviderKind },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClaudeSettings {
    pub api_key: String,
    pub api_version: String,
    pub model: String,
    #[serde(alias = "max_token")]
    pub max_tokens: u32,
    pub system_message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
}

impl Default for ClaudeSettings {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            api_version: DEFAULT_CLAUDE_API_VERSION.to_string(),
            model: String::new(),
            max_tokens: DEFAULT_MAX_TOKENS,
            system_message: DEFAULT_SYSTEM_MESSAGE.to_string(),
            base_url: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OpenAiSettings {
    pub api_key: String,
    pub model: String,
    pub max_tokens: u32,
    pub system_message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
}

impl Default for OpenAiSettings {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            model: String::new(),
            max_tokens: DEFAULT_MAX_TOKENS,
            system_message: DEFAULT_SYSTEM_MESSAGE.to_string(),
            base_url: None,
        }
    }
}

/// Contents of the settings file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub setup_complete: bool,
    #[serde(alias = "default_model")]
    pub default_provider: Option<ProviderKind>,
    pub claude: ClaudeSettings,
    pub openai: OpenAiSettings,
}

impl Settings {
    pub fn is_configured(&self, kind: ProviderKind) -> bool {
        let (api_key, model) = match kind {
            ProviderKind::Claude => (&self.claude.api_key, &self.claude.model),
            ProviderKind::OpenAi => (&self.openai.api_key, &self.openai.model),
        };
        !api_key.trim().is_empty() && !model.trim().is_empty()
    }

    /// The provider a run will use: `selected` when given, else the default.
    pub fn active_provider(&self, selected: Option<ProviderKind>) -> Option<ProviderKind> {
        selected.or(self.default_provider)
    }

    /// True when setup has run and the active provider can be built.
    pub fn is_ready(&self, selected: Option<ProviderKind>) -> bool {
        self.setup_complete
            && self
                .active_provider(selected)
                .is_some_and(|kind| self.is_configured(kind))
    }

    /// Overlays credentials, base URLs and the default provider from the
    /// environment. Empty values are ignored.
    pub fn with_env_with(mut self, mut get_var: impl FnMut(&str) -> Option<String>) -> Self {
        let mut get = |key: &str| {
            get_var(key)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };

        if let Some(key) = get("ANTHROPIC_API_KEY") {
            self.claude.api_key = key;
        }
        if let Some(key) = get("OPENAI_API_KEY") {
            self.openai.api_key = key;
        }
        if let Some(url) = get("CLAUDE_BASE_URL") {
            self.claude.base_url = Some(url);
        }
        if let Some(url) = get("OPENAI_BASE_URL") {
            self.openai.base_url = Some(url);
        }
        if let Some(raw) = get("ASK_PROVIDER") {
            match ProviderKind::parse(&raw) {
                Ok(kind) => self.default_provider = Some(kind),
                Err(err) => warn!(error = %err, "ignoring ASK_PROVIDER"),
            }
        }
        self
    }

    /// Reads the settings file; `Ok(None)` when it does not exist yet.
    pub fn read(path: &Path) -> Result<Option<Self>, ConfigError> {
        let contents = match fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "settings file not found");
                return Ok(None);
            }
            Err(source) => {
                return Err(ConfigError::Read {
                    path: path.to_path_buf(),
                    source,
                });
            }
        };

        if contents.trim().is_empty() {
            return Ok(Some(Self::default()));
        }

        serde_yaml::from_str(&contents)
            .map(Some)
            .map_err(|source| ConfigError::Parse {
                path: path.to_path_buf(),
                source,
            })
    }

    /// Writes the settings file readable and writable by the owner only.
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let contents = serde_yaml::to_string(self).map_err(ConfigError::Encode)?;
        let write_error = |source| ConfigError::Write {
            path: path.to_path_buf(),
            source,
        };

        if let Some(dir) = path.parent().filter(|dir| !dir.as_os_str().is_empty()) {
            fs::create_dir_all(dir).map_err(write_error)?;
        }

        let mut options = OpenOptions::new();
        options.write(true).create(true).truncate(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            options.mode(0o600);
        }
        let mut file = options.open(path).map_err(write_error)?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            file.set_permissions(fs::Permissions::from_mode(0o600))
                .map_err(write_error)?;
        }
        file.write_all(contents.as_bytes()).map_err(write_error)?;

        info!(path = %path.display(), "saved settings");
        Ok(())
    }
}

pub fn settings_path(explicit: Option<PathBuf>) -> Result<PathBuf, ConfigError> {
    settings_path_with(explicit, |key| std::env::var(key).ok(), dirs::home_dir)
}

fn settings_path_with(
    explicit: Option<PathBuf>,
    mut get_var: impl FnMut(&str) -> Option<String>,
    home_dir: impl FnOnce() -> Option<PathBuf>,
) -> Result<PathBuf, ConfigError> {
    if let Some(path) = explicit {
        return Ok(path);
    }
    if let Some(path) = get_var("ASK_CONFIG").filter(|value| !value.trim().is_empty()) {
        return Ok(PathBuf::from(path.trim()));
    }
    home_dir()
        .map(|home| home.join(SETTINGS_FILE_NAME))
        .ok_or(ConfigError::HomeDirUnavailable)
}
