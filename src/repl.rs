use anyhow::{Context, Result};
use tracing::{debug, warn};

use crate::console::Console;
use crate::providers::Provider;

const YOU: &str = "You: ";

/// How a session drives the chat loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionMode {
    /// Answer the given question and stop.
    OneShot(String),
    /// Ask for a single question on the console, answer it and stop.
    PromptOnce,
    /// Keep chatting until an exit sentinel, optionally answering an opening
    /// question first.
    Interactive { opening: Option<String> },
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Input {
    Exit,
    Clear,
    Role,
    Prompt(String),
}

fn classify(line: &str) -> Input {
    let line = line.trim();
    if line.is_empty() || line.eq_ignore_ascii_case("exit") {
        return Input::Exit;
    }
    match line {
        "clear" => Input::Clear,
        "role" => Input::Role,
        _ => Input::Prompt(line.to_string()),
    }
}

#[derive(Debug, Clone, Copy)]
enum ReplyStyle {
    Plain,
    Labeled,
}

async fn dispatch(
    provider: &mut Provider,
    console: &mut dyn Console,
    prompt: &str,
    style: ReplyStyle,
) -> Result<()> {
    debug!(
        provider = %provider.kind(),
        prompt_len = prompt.len(),
        transcript_len = provider.transcript().len(),
        "dispatching prompt"
    );

    let line = match provider.reply(prompt).await {
        Ok(answer) => match style {
            ReplyStyle::Plain => answer.trim().to_string(),
            ReplyStyle::Labeled => format!(
                "{} 🤖: {}\n",
                provider.kind().display_name(),
                answer.trim()
            ),
        },
        Err(err) => {
            warn!(provider = %provider.kind(), error = %err, "reply failed");
            format!("Error: {err}")
        }
    };
    console.println(&line).context("Failed to write reply")
}

async fn run_interactive(
    provider: &mut Provider,
    console: &mut dyn Console,
    opening: Option<String>,
) -> Result<()> {
    let label = provider.kind().display_name();
    console.println(&format!(
        "Chat started with {label}. Type 'exit' or an empty line to quit, \
         'clear' to forget the conversation, 'role' to set a new system message."
    ))?;

    if let Some(question) = opening {
        dispatch(provider, console, &question, ReplyStyle::Labeled).await?;
    }

    loop {
        console.print(YOU)?;
        let Some(line) = console.read_line().context("Failed to read stdin")? else {
            break;
        };

        match classify(&line) {
            Input::Exit => break,
            Input::Clear => {
                provider.clear_transcript();
                console.clear_screen()?;
                console.println(&format!("{label} 🤖: Message history cleared."))?;
            }
            Input::Role => {
                console.clear_screen()?;
                console.println(&format!("{label} 🤖: Please enter the role:"))?;
                console.print(YOU)?;
                let Some(role) = console.read_line().context("Failed to read stdin")? else {
                    break;
                };
                let role = role.trim();
                let role = if role.is_empty() {
                    provider.configured_system_message().to_string()
                } else {
                    role.to_string()
                };
                debug!(role_len = role.len(), "reseeding transcript");
                provider.reseed(role);
                console.println(&format!("{label} 🤖: System message updated."))?;
            }
            Input::Prompt(prompt) => {
                dispatch(provider, console, &prompt, ReplyStyle::Labeled).await?;
            }
        }
    }

    console.println("Bye!")?;
    Ok(())
}

/// Runs one chat session. Provider failures are printed and never end the
/// session early; only console failures are returned.
pub async fn run_session(
    provider: &mut Provider,
    console: &mut dyn Console,
    mode: SessionMode,
) -> Result<()> {
    match mode {
        SessionMode::OneShot(question) => {
            dispatch(provider, console, &question, ReplyStyle::Plain).await
        }
        SessionMode::PromptOnce => {
            console.println("Please enter the question:")?;
            let question = console.read_line().context("Failed to read stdin")?;
            match question.as_deref().map(str::trim) {
                Some(question) if !question.is_empty() => {
                    dispatch(provider, console, question, ReplyStyle::Plain).await
                }
                _ => Ok(()),
            }
        }
        SessionMode::Interactive { opening } => run_interactive(provider, console, opening).await,
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use std::rc::Rc;

    use super::{Input, SessionMode, classify, run_session};
    use crate::config::Settings;
    use crate::console::scripted::ScriptedConsole;
    use crate::model::Role;
    use crate::providers::{Provider, ProviderKind, StubTransport};

    fn settings() -> Settings {
        let mut settings = Settings::default();
        settings.claude.api_key = "sk-ant".to_string();
        settings.claude.model = "claude-3-haiku-20240307".to_string();
        settings.openai.api_key = "sk-oai".to_string();
        settings.openai.model = "gpt-4.0-turbo".to_string();
        settings
    }

    fn provider(kind: ProviderKind, transport: &Rc<StubTransport>) -> Provider {
        Provider::new(kind, &settings(), transport.clone()).expect("provider is configured")
    }

    fn chat_reply(text: &str) -> serde_json::Value {
        json!({"choices": [{"message": {"content": text}}]})
    }

    #[test]
    fn classify_recognizes_sentinels_and_commands() {
        assert_eq!(classify(""), Input::Exit);
        assert_eq!(classify("   "), Input::Exit);
        assert_eq!(classify("EXIT"), Input::Exit);
        assert_eq!(classify("clear"), Input::Clear);
        assert_eq!(classify(" role "), Input::Role);
        assert_eq!(
            classify("  clear the table  "),
            Input::Prompt("clear the table".to_string())
        );
    }

    #[tokio::test]
    async fn one_shot_prints_trimmed_reply_only() {
        let transport = Rc::new(StubTransport::new().respond(200, chat_reply("  4\n")));
        let mut provider = provider(ProviderKind::OpenAi, &transport);
        let mut console = ScriptedConsole::new(&[]);

        run_session(
            &mut provider,
            &mut console,
            SessionMode::OneShot("What is 2+2?".to_string()),
        )
        .await
        .expect("session completes");

        assert_eq!(console.output.trim(), "4");
        assert_eq!(provider.transcript().len(), 2);
    }

    #[tokio::test]
    async fn one_shot_failure_is_printed_not_returned() {
        let transport = Rc::new(StubTransport::new().respond(500, json!({"error": "boom"})));
        let mut provider = provider(ProviderKind::OpenAi, &transport);
        let mut console = ScriptedConsole::new(&[]);

        run_session(
            &mut provider,
            &mut console,
            SessionMode::OneShot("hi".to_string()),
        )
        .await
        .expect("remote failures do not abort");

        assert!(
            console.output.starts_with("Error: API request failed with status 500"),
            "{}",
            console.output
        );
        assert_eq!(provider.transcript().len(), 1);
    }

    #[tokio::test]
    async fn prompt_once_reads_single_question() {
        let transport = Rc::new(
            StubTransport::new().respond(200, json!({"content": [{"text": "hello"}]})),
        );
        let mut provider = provider(ProviderKind::Claude, &transport);
        let mut console = ScriptedConsole::new(&["hi", "ignored"]);

        run_session(&mut provider, &mut console, SessionMode::PromptOnce)
            .await
            .expect("session completes");

        assert_eq!(console.output, "Please enter the question:\nhello\n");
        assert_eq!(console.remaining_input(), 1);
        let turns = provider.transcript().turns();
        assert_eq!(turns.len(), 2);
        assert_eq!((turns[0].role, turns[0].content.as_str()), (Role::User, "hi"));
        assert_eq!(
            (turns[1].role, turns[1].content.as_str()),
            (Role::Assistant, "hello")
        );
    }

    #[tokio::test]
    async fn exit_sentinel_first_makes_no_request() {
        for first in ["exit", ""] {
            let transport = Rc::new(StubTransport::new());
            let mut provider = provider(ProviderKind::OpenAi, &transport);
            let mut console = ScriptedConsole::new(&[first, "never sent"]);

            run_session(
                &mut provider,
                &mut console,
                SessionMode::Interactive { opening: None },
            )
            .await
            .expect("session completes");

            assert_eq!(transport.call_count(), 0);
            assert!(console.output.ends_with("Bye!\n"), "{}", console.output);
            assert_eq!(console.remaining_input(), 1);
        }
    }

    #[tokio::test]
    async fn end_of_input_terminates_session() {
        let transport = Rc::new(StubTransport::new());
        let mut provider = provider(ProviderKind::Claude, &transport);
        let mut console = ScriptedConsole::new(&[]);

        run_session(
            &mut provider,
            &mut console,
            SessionMode::Interactive { opening: None },
        )
        .await
        .expect("session completes");

        assert_eq!(transport.call_count(), 0);
        assert!(console.output.ends_with("Bye!\n"));
    }

    #[tokio::test]
    async fn failed_reply_does_not_end_interactive_session() {
        let transport = Rc::new(
            StubTransport::new()
                .fail("Connection refused by 'https://api.openai.com/v1/chat/completions'.")
                .respond(200, chat_reply("second try worked")),
        );
        let mut provider = provider(ProviderKind::OpenAi, &transport);
        let mut console = ScriptedConsole::new(&["first", "second", "exit"]);

        run_session(
            &mut provider,
            &mut console,
            SessionMode::Interactive { opening: None },
        )
        .await
        .expect("session completes");

        assert_eq!(transport.call_count(), 2);
        assert!(console.output.contains("Error: Connection refused by"));
        assert!(console.output.contains("OpenAI 🤖: second try worked"));
        // first (unanswered), second, reply
        assert_eq!(provider.transcript().len(), 3);
    }

    #[tokio::test]
    async fn clear_resets_transcript_without_request() {
        let transport = Rc::new(StubTransport::new().respond(200, chat_reply("4")));
        let mut provider = provider(ProviderKind::OpenAi, &transport);
        let mut console = ScriptedConsole::new(&["What is 2+2?", "clear", "exit"]);

        run_session(
            &mut provider,
            &mut console,
            SessionMode::Interactive { opening: None },
        )
        .await
        .expect("session completes");

        assert_eq!(transport.call_count(), 1);
        assert_eq!(provider.transcript().len(), 0);
        assert_eq!(provider.transcript().system(), None);
        assert_eq!(console.clears, 1);
        assert!(console.output.contains("Message history cleared."));
    }

    #[tokio::test]
    async fn role_reseeds_transcript_with_next_line() {
        let transport = Rc::new(StubTransport::new().respond(200, chat_reply("Arr, 4.")));
        let mut provider = provider(ProviderKind::OpenAi, &transport);
        let mut console =
            ScriptedConsole::new(&["role", "You are a pirate", "What is 2+2?", "exit"]);

        run_session(
            &mut provider,
            &mut console,
            SessionMode::Interactive { opening: None },
        )
        .await
        .expect("session completes");

        let requests = transport.requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(
            requests[0].body["messages"],
            json!([
                {"role": "system", "content": "You are a pirate"},
                {"role": "user", "content": "What is 2+2?"},
            ])
        );
        assert_eq!(provider.transcript().system(), Some("You are a pirate"));
    }

    #[tokio::test]
    async fn blank_role_restores_configured_system_message() {
        let transport = Rc::new(StubTransport::new());
        let mut provider = provider(ProviderKind::Claude, &transport);
        let mut console = ScriptedConsole::new(&["clear", "role", "", "exit"]);

        run_session(
            &mut provider,
            &mut console,
            SessionMode::Interactive { opening: None },
        )
        .await
        .expect("session completes");

        assert_eq!(
            provider.transcript().system(),
            Some("You are a helpful assistant")
        );
        assert_eq!(transport.call_count(), 0);
    }

    #[tokio::test]
    async fn opening_question_is_answered_before_prompting() {
        let transport = Rc::new(
            StubTransport::new()
                .respond(200, json!({"content": [{"text": "hello"}]}))
                .respond(200, json!({"content": [{"text": "I am fine"}]})),
        );
        let mut provider = provider(ProviderKind::Claude, &transport);
        let mut console = ScriptedConsole::new(&["how are you?", "exit"]);

        run_session(
            &mut provider,
            &mut console,
            SessionMode::Interactive {
                opening: Some("hi".to_string()),
            },
        )
        .await
        .expect("session completes");

        let requests = transport.requests();
        assert_eq!(requests.len(), 2);
        assert_eq!(requests[1].body["messages"].as_array().map(Vec::len), Some(3));
        assert_eq!(provider.transcript().len(), 4);
        assert!(console.output.contains("Claude 🤖: hello"));
        assert!(console.output.contains("Claude 🤖: I am fine"));
    }
}
