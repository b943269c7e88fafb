use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::repl::SessionMode;

#[derive(Debug, Parser)]
#[command(name = "ask")]
#[command(about = "Chat with Claude or OpenAI from the command line")]
pub struct Cli {
    /// The question to ask the AI
    #[arg(short, long)]
    pub question: Option<String>,

    /// Keep the conversation going until 'exit'
    #[arg(short, long)]
    pub recursive: bool,

    /// Update the configuration settings before chatting
    #[arg(short = 's', long = "update-config")]
    pub update_config: bool,

    /// AI provider to use (claude or openai)
    #[arg(short, long)]
    pub provider: Option<String>,

    /// Settings file to use instead of ~/.ask_ai_settings.yaml
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Print the version number of ask
    Version,
}

impl Cli {
    /// A blank `--question` counts as no question at all.
    pub fn session_mode(&self) -> SessionMode {
        let question = self
            .question
            .as_deref()
            .map(str::trim)
            .filter(|question| !question.is_empty())
            .map(str::to_string);
        match (question, self.recursive) {
            (opening, true) => SessionMode::Interactive { opening },
            (Some(question), false) => SessionMode::OneShot(question),
            (None, false) => SessionMode::PromptOnce,
        }
    }
}
