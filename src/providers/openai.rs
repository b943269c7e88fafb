use serde::{Deserialize, Serialize};
use std::rc::Rc;
use tracing::debug;

use super::error::{first, parse_body, required};
use super::{HttpRequest, ProviderKind, RequestError, Transport, success_body};
use crate::config::OpenAiSettings;
use crate::model::{Transcript, Turn};

pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

const COMPLETION_TEMPERATURE: f32 = 0.5;

/// Wire shape used against the OpenAI API, decided by the model name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenAiApi {
    /// `/completions`: flat prompt, no history.
    Completions,
    /// `/chat/completions`: full message list.
    Chat,
}

impl OpenAiApi {
    pub fn for_model(model: &str) -> Self {
        if model.trim().starts_with("text-") {
            Self::Completions
        } else {
            Self::Chat
        }
    }

    fn path(&self) -> &'static str {
        match self {
            Self::Completions => "completions",
            Self::Chat => "chat/completions",
        }
    }
}

#[derive(Debug, Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<&'a Turn>,
    max_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct ChoicesResponse {
    choices: Option<Vec<Choice>>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    text: Option<String>,
    message: Option<ChoiceMessage>,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

fn endpoint_url(base_url: &str, api: OpenAiApi) -> String {
    format!("{}/{}", base_url.trim_end_matches('/'), api.path())
}

fn parse_reply(api: OpenAiApi, body: &str) -> Result<String, RequestError> {
    let parsed: ChoicesResponse = parse_body(body)?;
    let choice = first(parsed.choices, "choices")?;
    let text = match api {
        OpenAiApi::Completions => required(choice.text, "choices[0].text")?,
        OpenAiApi::Chat => required(
            required(choice.message, "choices[0].message")?.content,
            "choices[0].message.content",
        )?,
    };
    Ok(text)
}

/// Completion-style backend for the OpenAI API.
pub struct OpenAiProvider {
    settings: OpenAiSettings,
    api: OpenAiApi,
    transport: Rc<dyn Transport>,
    transcript: Transcript,
}

impl OpenAiProvider {
    pub fn new(settings: OpenAiSettings, transport: Rc<dyn Transport>) -> Self {
        let api = OpenAiApi::for_model(&settings.model);
        let transcript = Transcript::seeded(settings.system_message.clone());
        Self {
            settings,
            api,
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

    fn build_request(&self, prompt: &str) -> Result<HttpRequest, RequestError> {
        let base_url = self.settings.base_url.as_deref().unwrap_or(DEFAULT_BASE_URL);
        let model = self.settings.model.as_str();
        let max_tokens = self.settings.max_tokens;
        let body = match self.api {
            OpenAiApi::Completions => serde_json::to_value(CompletionRequest {
                model,
                prompt,
                temperature: COMPLETION_TEMPERATURE,
                max_tokens,
            })?,
            OpenAiApi::Chat => serde_json::to_value(ChatRequest {
                model,
                messages: self.transcript.replay().collect(),
                max_tokens,
            })?,
        };

        Ok(HttpRequest {
            url: endpoint_url(base_url, self.api),
            headers: vec![(
                "authorization",
                format!("Bearer {}", self.settings.api_key),
            )],
            body,
        })
    }

    pub async fn reply(&mut self, prompt: &str) -> Result<String, RequestError> {
        self.transcript.push(Turn::user(prompt));
        let request = self.build_request(prompt)?;
        debug!(
            api_url = %request.url,
            model = %self.settings.model,
            api = ?self.api,
            message_count = self.transcript.len(),
            "sending openai request"
        );

        let response = self.transport.post_json(request).await?;
        let body = success_body(ProviderKind::OpenAi, response)?;
        let text = parse_reply(self.api, &body)?;
        debug!(
            model = %self.settings.model,
            response_len = text.len(),
            "received openai reply"
        );

        self.transcript.push(Turn::assistant(text.clone()));
        Ok(text)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use std::rc::Rc;

    use super::{OpenAiApi, OpenAiProvider, endpoint_url, parse_reply};
    use crate::config::OpenAiSettings;
    use crate::model::Role;
    use crate::providers::{RequestError, ShapeError, StubTransport};

    fn settings(model: &str) -> OpenAiSettings {
        OpenAiSettings {
            api_key: "sk-test".to_string(),
            model: model.to_string(),
            max_tokens: 1024,
            system_message: "You are a helpful assistant".to_string(),
            base_url: None,
        }
    }

    #[test]
    fn api_follows_model_family() {
        assert_eq!(OpenAiApi::for_model("text-davinci-003"), OpenAiApi::Completions);
        assert_eq!(OpenAiApi::for_model("gpt-3.5-turbo"), OpenAiApi::Chat);
        assert_eq!(OpenAiApi::for_model("gpt-4.0-turbo"), OpenAiApi::Chat);
    }

    #[test]
    fn endpoint_url_joins_base_and_path() {
        assert_eq!(
            endpoint_url("https://api.openai.com/v1/", OpenAiApi::Chat),
            "https://api.openai.com/v1/chat/completions"
        );
        assert_eq!(
            endpoint_url("https://api.openai.com/v1", OpenAiApi::Completions),
            "https://api.openai.com/v1/completions"
        );
    }

    #[tokio::test]
    async fn chat_reply_uses_message_content_and_grows_transcript() {
        let transport = Rc::new(
            StubTransport::new().respond(200, json!({"choices": [{"message": {"content": "4"}}]})),
        );
        let mut provider = OpenAiProvider::new(settings("gpt-4.0-turbo"), transport.clone());

        let answer = provider.reply("What is 2+2?").await.expect("stub replies");

        assert_eq!(answer.trim(), "4");
        assert_eq!(provider.transcript().len(), 2);
        let requests = transport.requests();
        assert_eq!(requests[0].url, "https://api.openai.com/v1/chat/completions");
        assert_eq!(requests[0].header("authorization"), Some("Bearer sk-test"));
        assert_eq!(
            requests[0].body,
            json!({
                "model": "gpt-4.0-turbo",
                "max_tokens": 1024,
                "messages": [
                    {"role": "system", "content": "You are a helpful assistant"},
                    {"role": "user", "content": "What is 2+2?"},
                ],
            })
        );
    }

    #[tokio::test]
    async fn completions_request_never_replays_prior_turns() {
        let transport = Rc::new(
            StubTransport::new()
                .respond(200, json!({"choices": [{"text": "\n\nParis"}]}))
                .respond(200, json!({"choices": [{"text": "\n\nBerlin"}]})),
        );
        let mut provider = OpenAiProvider::new(settings("text-davinci-003"), transport.clone());

        provider.reply("Capital of France?").await.expect("first reply");
        let answer = provider
            .reply("Capital of Germany?")
            .await
            .expect("second reply");

        assert_eq!(answer.trim(), "Berlin");
        assert_eq!(provider.transcript().len(), 4);
        let requests = transport.requests();
        assert_eq!(requests[1].url, "https://api.openai.com/v1/completions");
        assert_eq!(
            requests[1].body,
            json!({
                "model": "text-davinci-003",
                "prompt": "Capital of Germany?",
                "temperature": 0.5,
                "max_tokens": 1024,
            })
        );
    }

    #[tokio::test]
    async fn malformed_reply_keeps_user_turn_only() {
        let transport =
            Rc::new(StubTransport::new().respond(200, json!({"choices": [{"message": {}}]})));
        let mut provider = OpenAiProvider::new(settings("gpt-3.5-turbo"), transport);

        let err = provider.reply("hi").await.expect_err("content is missing");

        assert!(matches!(
            err,
            RequestError::Shape(ShapeError::MissingField("choices[0].message.content"))
        ));
        assert_eq!(provider.transcript().len(), 1);
        assert_eq!(provider.transcript().turns()[0].role, Role::User);
    }

    #[tokio::test]
    async fn error_status_surfaces_body() {
        let transport = Rc::new(StubTransport::new().respond_raw(
            401,
            r#"{"error":{"message":"Incorrect API key provided"}}"#,
        ));
        let mut provider = OpenAiProvider::new(settings("gpt-3.5-turbo"), transport);

        let err = provider.reply("hi").await.expect_err("401 should fail");
        let msg = err.to_string();

        assert!(msg.contains("status 401"), "{msg}");
        assert!(msg.contains("Incorrect API key provided"), "{msg}");
        assert_eq!(provider.transcript().len(), 1);
    }

    #[test]
    fn parse_reply_distinguishes_shapes_per_api() {
        assert!(matches!(
            parse_reply(OpenAiApi::Completions, r#"{"choices": []}"#),
            Err(RequestError::Shape(ShapeError::EmptyList("choices")))
        ));
        assert!(matches!(
            parse_reply(OpenAiApi::Completions, r#"{"choices": [{"message": {"content": "x"}}]}"#),
            Err(RequestError::Shape(ShapeError::MissingField("choices[0].text")))
        ));
        assert!(matches!(
            parse_reply(OpenAiApi::Chat, r#"{"choices": [{"text": "x"}]}"#),
            Err(RequestError::Shape(ShapeError::MissingField("choices[0].message")))
        ));
        assert_eq!(
            parse_reply(OpenAiApi::Chat, r#"{"choices": [{"message": {"content": "x"}}]}"#)
                .expect("chat shape parses"),
            "x"
        );
    }
}
