use serde::{Deserialize, Serialize};
use std::rc::Rc;
use tracing::debug;

use super::error::{first, parse_body, required};
use super::{HttpRequest, ProviderKind, RequestError, Transport, success_body};
use crate::config::ClaudeSettings;
use crate::model::{Transcript, Turn};

pub const DEFAULT_BASE_URL: &str = "https://api.anthropic.com";

#[derive(Debug, Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    messages: &'a [Turn],
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<&'a str>,
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    content: Option<Vec<ContentBlock>>,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    text: Option<String>,
}

fn messages_url(base_url: &str) -> String {
    format!("{}/v1/messages", base_url.trim_end_matches('/'))
}

fn parse_reply(body: &str) -> Result<String, RequestError> {
    let parsed: MessagesResponse = parse_body(body)?;
    let block = first(parsed.content, "content")?;
    Ok(required(block.text, "content[0].text")?)
}

/// Message-style backend for the Anthropic Messages API.
///
/// The system seed travels in the top-level `system` field; every exchanged
/// turn goes into `messages` in order.
pub struct ClaudeProvider {
    settings: ClaudeSettings,
    transport: Rc<dyn Transport>,
    transcript: Transcript,
}

impl ClaudeProvider {
    pub fn new(settings: ClaudeSettings, transport: Rc<dyn Transport>) -> Self {
        let transcript = Transcript::seeded(settings.system_message.clone());
        Self {
            settings,
            transport,
            transcript,
        }
    }

    pub fn transcript(&self) -> &Transcript {
        &self.transcript
    }

    pub(crate) fn transcript_mut(&mut self) -> &mut Transcript {
        &mut self.transcript
    }

    pub fn system_message(&self) -> &str {
        &self.settings.system_message
    }

    fn build_request(&self) -> Result<HttpRequest, RequestError> {
        let base_url = self.settings.base_url.as_deref().unwrap_or(DEFAULT_BASE_URL);
        let body = MessagesRequest {
            model: &self.settings.model,
            max_tokens: self.settings.max_tokens,
            messages: self.transcript.turns(),
            system: self.transcript.system(),
        };
        Ok(HttpRequest {
            url: messages_url(base_url),
            headers: vec![
                ("x-api-key", self.settings.api_key.clone()),
                ("anthropic-version", self.settings.api_version.clone()),
            ],
            body: serde_json::to_value(&body)?,
        })
    }

    pub async fn reply(&mut self, prompt: &str) -> Result<String, RequestError> {
        self.transcript.push(Turn::user(prompt));
        let request = self.build_request()?;
        debug!(
            api_url = %request.url,
            model = %self.settings.model,
            message_count = self.transcript.len(),
            "sending claude messages request"
        );

        let response = self.transport.post_json(request).await?;
        let body = success_body(ProviderKind::Claude, response)?;
        let text = parse_reply(&body)?;
        debug!(
            model = %self.settings.model,
            response_len = text.len(),
            "received claude reply"
        );

        self.transcript.push(Turn::assistant(text.clone()));
        Ok(text)
    }
}
