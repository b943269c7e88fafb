pub mod claude;
mod error;
mod http_errors;
pub mod openai;
mod transport;

use anyhow::{Result, anyhow};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::rc::Rc;
use tracing::{debug, warn};

use crate::config::{ConfigError, Settings};
use crate::model::Transcript;

pub use claude::ClaudeProvider;
pub use error::{RequestError, ShapeError};
pub use openai::{OpenAiApi, OpenAiProvider};
pub use transport::{HttpRequest, HttpResponse, HttpTransport, Transport, TransportFuture};

#[cfg(test)]
pub(crate) use transport::stub::StubTransport;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    Claude,
    OpenAi,
}

impl ProviderKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Claude => "claude",
            Self::OpenAi => "openai",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Claude => "Claude",
            Self::OpenAi => "OpenAI",
        }
    }

    /// Case-insensitive lookup by the name used on the command line and in
    /// the settings file.
    pub fn from_name(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "claude" => Some(Self::Claude),
            "openai" => Some(Self::OpenAi),
            _ => None,
        }
    }

    pub fn parse(raw: &str) -> Result<Self> {
        Self::from_name(raw).ok_or_else(|| {
            let requested = raw.trim();
            warn!(provider = %requested, "unsupported provider requested");
            anyhow!(
                "Unsupported provider '{}'. Supported providers: claude, openai.",
                requested
            )
        })
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The active backend, chosen once at startup. Each variant owns its own
/// transcript.
pub enum Provider {
    Claude(ClaudeProvider),
    OpenAi(OpenAiProvider),
}

impl Provider {
    /// Builds the provider for `kind`, refusing if its credential or model
    /// is still empty.
    pub fn new(
        kind: ProviderKind,
        settings: &Settings,
        transport: Rc<dyn Transport>,
    ) -> Result<Self, ConfigError> {
        if !settings.is_configured(kind) {
            return Err(ConfigError::ProviderNotConfigured { provider: kind });
        }

        let provider = match kind {
            ProviderKind::Claude => {
                Self::Claude(ClaudeProvider::new(settings.claude.clone(), transport))
            }
            ProviderKind::OpenAi => {
                Self::OpenAi(OpenAiProvider::new(settings.openai.clone(), transport))
            }
        };
        debug!(provider = %kind, "initialized provider");
        Ok(provider)
    }

    pub fn kind(&self) -> ProviderKind {
        match self {
            Self::Claude(_) => ProviderKind::Claude,
            Self::OpenAi(_) => ProviderKind::OpenAi,
        }
    }

    pub async fn reply(&mut self, prompt: &str) -> Result<String, RequestError> {
        match self {
            Self::Claude(provider) => provider.reply(prompt).await,
            Self::OpenAi(provider) => provider.reply(prompt).await,
        }
    }

    pub fn transcript(&self) -> &Transcript {
        match self {
            Self::Claude(provider) => provider.transcript(),
            Self::OpenAi(provider) => provider.transcript(),
        }
    }

    pub fn configured_system_message(&self) -> &str {
        match self {
            Self::Claude(provider) => provider.system_message(),
            Self::OpenAi(provider) => provider.system_message(),
        }
    }

    pub fn clear_transcript(&mut self) {
        self.transcript_mut().clear();
    }

    pub fn reseed(&mut self, system: impl Into<String>) {
        self.transcript_mut().reseed(system);
    }

    fn transcript_mut(&mut self) -> &mut Transcript {
        match self {
            Self::Claude(provider) => provider.transcript_mut(),
            Self::OpenAi(provider) => provider.transcript_mut(),
        }
    }
}

/// Returns the body of a 2xx response, or a `Status` error carrying the body
/// the API sent back.
pub(crate) fn success_body(
    kind: ProviderKind,
    response: HttpResponse,
) -> Result<String, RequestError> {
    if response.is_success() {
        return Ok(response.body);
    }

    warn!(
        provider = %kind,
        status = response.status,
        response_body_len = response.body.len(),
        "provider returned non-success status"
    );
    Err(RequestError::Status {
        status: response.status,
        body: response.body,
    })
}
