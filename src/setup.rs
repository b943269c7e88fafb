use std::path::Path;
use thiserror::Error;
use tracing::{debug, info};

use crate::config::{
    CLAUDE_MODELS, ConfigError, DEFAULT_SYSTEM_MESSAGE, OPENAI_MODELS, Settings,
};
use crate::console::Console;
use crate::providers::ProviderKind;

/// Rejected setup answer. Printed and re-asked, never returned to callers.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
enum ValidationError {
    #[error("Invalid model. Please choose one of: {}.", allowed.join(", "))]
    UnknownModel { allowed: &'static [&'static str] },

    #[error("Please enter a positive whole number.")]
    NotAPositiveNumber,

    #[error("Please answer with 'y' or 'n'.")]
    NotYesOrNo,

    #[error("Please enter either 'claude' or 'openai'.")]
    UnknownProvider,
}

fn validate_model(
    answer: &str,
    allowed: &'static [&'static str],
) -> Result<String, ValidationError> {
    allowed
        .iter()
        .find(|model| **model == answer)
        .map(|model| (*model).to_string())
        .ok_or(ValidationError::UnknownModel { allowed })
}

fn validate_positive(answer: &str) -> Result<u32, ValidationError> {
    answer
        .parse::<u32>()
        .ok()
        .filter(|value| *value > 0)
        .ok_or(ValidationError::NotAPositiveNumber)
}

fn validate_yes_no(answer: &str) -> Result<bool, ValidationError> {
    match answer.to_ascii_lowercase().as_str() {
        "y" | "yes" => Ok(true),
        "n" | "no" => Ok(false),
        _ => Err(ValidationError::NotYesOrNo),
    }
}

fn validate_provider(answer: &str) -> Result<ProviderKind, ValidationError> {
    ProviderKind::from_name(answer).ok_or(ValidationError::UnknownProvider)
}

struct Prompter<'a> {
    console: &'a mut dyn Console,
}

impl Prompter<'_> {
    fn answer(&mut self, question: &str) -> Result<String, ConfigError> {
        self.console.print(question)?;
        let line = self.console.read_line()?.ok_or(ConfigError::InputClosed)?;
        Ok(line.trim().to_string())
    }

    fn with_default(&mut self, question: &str, current: &str) -> Result<String, ConfigError> {
        let answer = self.answer(&format!("{question} [{current}]: "))?;
        if answer.is_empty() {
            return Ok(current.to_string());
        }
        Ok(answer)
    }

    /// Keeps asking until `validate` accepts. A blank answer returns `current`
    /// when there is one.
    fn validated<T>(
        &mut self,
        question: &str,
        current: Option<T>,
        validate: impl Fn(&str) -> Result<T, ValidationError>,
    ) -> Result<T, ConfigError>
    where
        T: Clone + ToString,
    {
        loop {
            let shown = current.as_ref().map(ToString::to_string).unwrap_or_default();
            let answer = self.answer(&format!("{question} [{shown}]: "))?;
            if answer.is_empty()
                && let Some(current) = current.clone()
            {
                return Ok(current);
            }
            match validate(&answer) {
                Ok(value) => return Ok(value),
                Err(err) => {
                    debug!(error = %err, "rejected setup answer");
                    self.console.println(&err.to_string())?;
                }
            }
        }
    }

    fn yes_no(&mut self, question: &str) -> Result<bool, ConfigError> {
        loop {
            let answer = self.answer(&format!("{question} (y/n): "))?;
            match validate_yes_no(&answer) {
                Ok(value) => return Ok(value),
                Err(err) => self.console.println(&err.to_string())?,
            }
        }
    }

    /// Concealed entry; a blank answer keeps the stored key.
    fn secret(&mut self, question: &str, current: &str) -> Result<String, ConfigError> {
        let hint = if current.is_empty() {
            ""
        } else {
            " [leave blank to keep the current key]"
        };
        self.console.print(&format!("{question}{hint}: "))?;
        let secret = self
            .console
            .read_secret()?
            .ok_or(ConfigError::InputClosed)?;
        let secret = secret.trim();
        if secret.is_empty() {
            return Ok(current.to_string());
        }
        Ok(secret.to_string())
    }

    fn system_message(&mut self, question: &str, current: &str) -> Result<String, ConfigError> {
        let current = if current.trim().is_empty() {
            DEFAULT_SYSTEM_MESSAGE
        } else {
            current
        };
        self.with_default(question, current)
    }
}

fn non_empty(value: &str) -> Option<String> {
    Some(value.to_string()).filter(|value| !value.trim().is_empty())
}

fn setup_claude(prompter: &mut Prompter<'_>, settings: &mut Settings) -> Result<(), ConfigError> {
    let claude = &mut settings.claude;
    claude.api_key = prompter.secret("Enter your Claude API key", &claude.api_key)?;
    claude.api_version = prompter.with_default("Enter your Claude API version", &claude.api_version)?;
    claude.model = prompter.validated(
        &format!("Choose a Claude model ({})", CLAUDE_MODELS.join(", ")),
        non_empty(&claude.model),
        |answer| validate_model(answer, CLAUDE_MODELS),
    )?;
    claude.max_tokens = prompter.validated(
        "Enter the Claude max tokens",
        Some(claude.max_tokens),
        validate_positive,
    )?;
    claude.system_message =
        prompter.system_message("Enter a system message for Claude", &claude.system_message)?;
    Ok(())
}

fn setup_openai(prompter: &mut Prompter<'_>, settings: &mut Settings) -> Result<(), ConfigError> {
    let openai = &mut settings.openai;
    openai.api_key = prompter.secret("Enter your OpenAI API key", &openai.api_key)?;
    openai.model = prompter.validated(
        &format!("Choose an OpenAI model ({})", OPENAI_MODELS.join(", ")),
        non_empty(&openai.model),
        |answer| validate_model(answer, OPENAI_MODELS),
    )?;
    openai.max_tokens = prompter.validated(
        "Enter the OpenAI max tokens",
        Some(openai.max_tokens),
        validate_positive,
    )?;
    openai.system_message =
        prompter.system_message("Enter a system message for OpenAI", &openai.system_message)?;
    Ok(())
}

/// Walks the user through configuring providers, starting from `existing`.
/// Blank answers keep existing values.
pub fn run_setup(console: &mut dyn Console, existing: Settings) -> Result<Settings, ConfigError> {
    let mut settings = existing;
    let mut prompter = Prompter { console };
    prompter
        .console
        .println("Welcome to ask! Let's set up your AI providers.")?;

    let claude = prompter.yes_no("Do you want to set up or update Claude?")?;
    if claude {
        setup_claude(&mut prompter, &mut settings)?;
    }
    let openai = prompter.yes_no("Do you want to set up or update OpenAI?")?;
    if openai {
        setup_openai(&mut prompter, &mut settings)?;
    }

    settings.default_provider = match (claude, openai, settings.default_provider) {
        (true, false, _) => Some(ProviderKind::Claude),
        (false, true, _) => Some(ProviderKind::OpenAi),
        (false, false, Some(current)) => Some(current),
        (true, true, current) | (false, false, current @ None) => Some(prompter.validated(
            "Which provider should be the default? (claude/openai)",
            current,
            validate_provider,
        )?),
    };
    settings.setup_complete = true;

    Ok(settings)
}

/// Loads the settings file at `path`, running setup first when it is missing
/// or incomplete, when `reconfigure` is set, or when the provider this run
/// will use (`selected`, else the default) lacks a key or model. Environment
/// overrides apply to the returned value but are never written back to disk.
pub fn load_or_setup(
    path: &Path,
    console: &mut dyn Console,
    reconfigure: bool,
    selected: Option<ProviderKind>,
    mut get_var: impl FnMut(&str) -> Option<String>,
) -> Result<Settings, ConfigError> {
    let stored = Settings::read(path)?.unwrap_or_default();
    let effective = stored.clone().with_env_with(&mut get_var);
    if !reconfigure && effective.is_ready(selected) {
        return Ok(effective);
    }

    info!(
        path = %path.display(),
        reconfigure,
        selected = ?selected,
        "running interactive setup"
    );
    let configured = run_setup(console, stored)?;
    configured.save(path)?;
    console.println("Setup complete! Your settings have been saved.")?;

    let effective = configured.with_env_with(get_var);
    match effective.active_provider(selected) {
        Some(kind) if effective.is_configured(kind) => Ok(effective),
        Some(kind) => Err(ConfigError::ProviderNotConfigured { provider: kind }),
        None => Err(ConfigError::NoDefaultProvider),
    }
}
