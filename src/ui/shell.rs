//! Interactive terminal front-end.
//!
//! Reads one command per line from stdin and forwards it to the panel controllers.
//! Progress and errors arrive separately through [`spawn_status_printer`], which
//! listens to state change events.

use crate::models::app_state::AppState;
use crate::models::{AspectRatio, ParseAspectRatioError};
use crate::state::{StateChange, StateManager};
use crate::ui::StudioController;
use crate::ui::editor::CUSTOM_EDIT_NAME;
use crate::{APP_NAME, VERSION};
use anyhow::{Context, Result};
use camino::Utf8PathBuf;
use std::io::Write;
use std::str::FromStr;
use thiserror::Error;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;

const HELP: &str = "\
Editor:
  upload <path>        Load a PNG, JPEG or WEBP image
  tools                List the preset editing tools
  tool <id>            Apply a preset tool
  edit <instruction>   Apply a free-form edit
  reset                Restore the original image
  download             Save the edited image
  describe             Quick description of the image
  ask [question]       Ask about the image (reuses the pending question if omitted)
Generation:
  prompt <text>        Set the generation prompt
  ratio <r>            Select aspect ratio (1:1, 3:4, 4:3, 9:16, 16:9)
  generate [text]      Generate an image (optionally setting the prompt first)
  save-generated       Save the generated image
Chat:
  chat <message>       Send a message
  history              Show the transcript
General:
  status               Show the current state
  dismiss              Dismiss the error banner
  help                 Show this help
  quit                 Exit";

/// One parsed input line
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Empty,
    Help,
    Upload(Utf8PathBuf),
    Tools,
    Tool(String),
    Edit(String),
    Reset,
    Download,
    Describe,
    Ask(Option<String>),
    Prompt(String),
    Ratio(AspectRatio),
    Generate(Option<String>),
    SaveGenerated,
    Chat(String),
    History,
    Status,
    Dismiss,
    Quit,
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ParseCommandError {
    #[error("Unknown command '{0}'. Type 'help' for a list of commands.")]
    Unknown(String),

    #[error("'{command}' needs {argument}")]
    MissingArgument {
        command: &'static str,
        argument: &'static str,
    },

    #[error(transparent)]
    Ratio(#[from] ParseAspectRatioError),
}

fn required(
    rest: &str,
    command: &'static str,
    argument: &'static str,
) -> Result<String, ParseCommandError> {
    if rest.is_empty() {
        Err(ParseCommandError::MissingArgument { command, argument })
    } else {
        Ok(rest.to_string())
    }
}

fn optional(rest: &str) -> Option<String> {
    (!rest.is_empty()).then(|| rest.to_string())
}

impl FromStr for Command {
    type Err = ParseCommandError;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let line = line.trim();
        let (head, rest) = line
            .split_once(char::is_whitespace)
            .map(|(head, rest)| (head, rest.trim()))
            .unwrap_or((line, ""));

        let command = match head.to_ascii_lowercase().as_str() {
            "" => Command::Empty,
            "help" | "?" => Command::Help,
            "upload" | "open" => Command::Upload(Utf8PathBuf::from(required(rest, "upload", "a file path")?)),
            "tools" => Command::Tools,
            "tool" => Command::Tool(required(rest, "tool", "a tool id")?),
            "edit" => Command::Edit(required(rest, "edit", "an instruction")?),
            "reset" => Command::Reset,
            "download" => Command::Download,
            "describe" => Command::Describe,
            "ask" => Command::Ask(optional(rest)),
            "prompt" => Command::Prompt(required(rest, "prompt", "some text")?),
            "ratio" => Command::Ratio(required(rest, "ratio", "an aspect ratio")?.parse()?),
            "generate" => Command::Generate(optional(rest)),
            "save-generated" => Command::SaveGenerated,
            "chat" => Command::Chat(required(rest, "chat", "a message")?),
            "history" => Command::History,
            "status" => Command::Status,
            "dismiss" => Command::Dismiss,
            "quit" | "exit" => Command::Quit,
            other => return Err(ParseCommandError::Unknown(other.to_string())),
        };
        Ok(command)
    }
}

/// Whether the shell keeps reading after a command
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Quit,
}

/// Human-readable summary of the whole state, for the `status` command
pub fn render_status(state: &AppState) -> String {
    let mut lines = Vec::new();

    if state.is_busy() {
        lines.push(format!("Busy: {}", state.status.label));
    } else {
        lines.push("Idle".to_string());
    }
    if let Some(error) = state.error() {
        lines.push(format!("Error: {}", error));
    }

    match state.editor.current_image() {
        Some(image) => lines.push(format!(
            "Image: {} ({} bytes), {} edit(s){}",
            image.format(),
            image.len(),
            state.editor.edits_applied,
            if state.editor.can_reset() { ", reset available" } else { "" }
        )),
        None => lines.push("Image: none".to_string()),
    }
    if !state.editor.analysis_result.is_empty() {
        lines.push(format!("Analysis: {}", state.editor.analysis_result));
    }
    if !state.editor.analysis_prompt.is_empty() {
        lines.push(format!("Pending question: {}", state.editor.analysis_prompt));
    }

    lines.push(format!(
        "Generation: \"{}\" at {}, {}",
        state.generation.prompt,
        state.generation.aspect_ratio,
        match &state.generation.generated_image {
            Some(image) => format!("last image {} ({} bytes)", image.format(), image.len()),
            None => "nothing generated yet".to_string(),
        }
    ));

    lines.push(format!(
        "Chat: {} message(s){}",
        state.chat.len(),
        if state.chat.is_chatting { ", awaiting reply" } else { "" }
    ));

    lines.join("\n")
}

/// Line printed for a state change, if it is worth showing
pub fn describe_change(change: &StateChange) -> Option<String> {
    match change {
        StateChange::OperationStarted { label } => Some(label.clone()),
        StateChange::ErrorRaised { message } => Some(format!("Error: {}", message)),
        StateChange::ChatStatusChanged { awaiting: true } => Some("Waiting for reply...".to_string()),
        _ => None,
    }
}

/// Print busy labels and errors as they happen
pub fn spawn_status_printer(state: &StateManager) -> JoinHandle<()> {
    let mut rx = state.subscribe();

    tokio::spawn(async move {
        tracing::debug!("Status printer started");
        loop {
            match rx.recv().await {
                Ok(change) => {
                    tracing::trace!("State change received: {:?}", change);
                    if let Some(line) = describe_change(&change) {
                        println!("{}", line);
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!("Status printer lagged, skipped {} events", skipped);
                }
                Err(RecvError::Closed) => break,
            }
        }
        tracing::debug!("Status printer stopped");
    })
}

/// Line-oriented front-end over a [`StudioController`]
pub struct Shell {
    studio: StudioController,
}

impl Shell {
    pub fn new(studio: StudioController) -> Self {
        Self { studio }
    }

    pub fn studio(&self) -> &StudioController {
        &self.studio
    }

    /// Read commands from stdin until `quit` or end of input
    pub async fn run(&self) -> Result<()> {
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        let mut stdout = std::io::stdout();

        writeln!(stdout, "{} v{} - type 'help' for commands", APP_NAME, VERSION)?;

        loop {
            write!(stdout, "> ")?;
            stdout.flush()?;

            let Some(line) = lines.next_line().await.context("Failed to read from stdin")? else {
                break;
            };

            match line.parse::<Command>() {
                Ok(command) => {
                    if self.execute(command, &mut stdout).await? == Flow::Quit {
                        break;
                    }
                }
                Err(err) => writeln!(stdout, "{}", err)?,
            }
        }

        Ok(())
    }

    fn has_image(&self) -> bool {
        self.studio.state().read(|state| state.editor.has_image())
    }

    /// Run one command, writing its result to `out`.
    ///
    /// Failures of remote operations are reported by the status printer, not here.
    pub async fn execute<W: Write>(&self, command: Command, out: &mut W) -> Result<Flow> {
        let state = self.studio.state();
        let editor = self.studio.editor();
        let generation = self.studio.generation();

        let needs_image = matches!(
            command,
            Command::Tool(_)
                | Command::Edit(_)
                | Command::Reset
                | Command::Download
                | Command::Describe
                | Command::Ask(_)
        );
        if needs_image && !self.has_image() {
            writeln!(out, "Upload an image first.")?;
            return Ok(Flow::Continue);
        }

        match command {
            Command::Empty => {}
            Command::Help => writeln!(out, "{}", HELP)?,
            Command::Quit => return Ok(Flow::Quit),

            Command::Upload(path) => {
                if editor.upload(&path).await {
                    let summary = state.read(|s| {
                        s.editor
                            .current_image()
                            .map(|image| format!("{} ({} bytes)", image.format(), image.len()))
                    });
                    writeln!(out, "Loaded {} {}", path, summary.unwrap_or_default())?;
                }
            }
            Command::Tools => {
                for category in editor.tools().categories() {
                    writeln!(out, "{}:", category.name)?;
                    for tool in category.tools {
                        writeln!(out, "  {:<18} {}", tool.id, tool.name)?;
                    }
                }
            }
            Command::Tool(id) => match editor.tools().get(&id).copied() {
                Some(tool) => {
                    if editor.apply_tool(tool.id).await {
                        writeln!(out, "Applied {}", tool.name)?;
                    }
                }
                None => writeln!(out, "Unknown tool '{}'. Type 'tools' to list them.", id)?,
            },
            Command::Edit(instruction) => {
                if editor.apply_edit(&instruction, CUSTOM_EDIT_NAME).await {
                    writeln!(out, "Applied {}", CUSTOM_EDIT_NAME)?;
                }
            }
            Command::Reset => {
                if editor.reset() {
                    writeln!(out, "Restored original image")?;
                }
            }
            Command::Download => match editor.download() {
                Ok(Some(path)) => writeln!(out, "Saved {}", path)?,
                Ok(None) => writeln!(out, "Upload an image first.")?,
                Err(err) => writeln!(out, "Download failed: {}", err)?,
            },
            Command::Describe => {
                if editor.quick_analysis().await {
                    let text = state.read(|s| s.editor.analysis_result.clone());
                    writeln!(out, "{}", text)?;
                }
            }
            Command::Ask(question) => {
                if let Some(question) = question {
                    editor.set_analysis_prompt(question);
                }
                if state.read(|s| s.editor.analysis_prompt.trim().is_empty()) {
                    writeln!(out, "Ask a question, e.g. 'ask what breed is this dog?'")?;
                } else if editor.analyze_pending_prompt().await {
                    let text = state.read(|s| s.editor.analysis_result.clone());
                    writeln!(out, "{}", text)?;
                }
            }

            Command::Prompt(text) => {
                generation.set_prompt(text);
                writeln!(out, "Prompt set")?;
            }
            Command::Ratio(aspect_ratio) => {
                generation.select_aspect_ratio(aspect_ratio);
                writeln!(out, "Aspect ratio: {}", aspect_ratio)?;
            }
            Command::Generate(prompt) => {
                if let Some(prompt) = prompt {
                    generation.set_prompt(prompt);
                }
                if state.read(|s| s.generation.prompt.trim().is_empty()) {
                    writeln!(out, "Set a prompt first, e.g. 'generate a lighthouse at dusk'")?;
                } else if generation.generate_from_selection().await {
                    writeln!(out, "Image generated. Type 'save-generated' to write it to disk.")?;
                }
            }
            Command::SaveGenerated => match generation.save_generated() {
                Ok(Some(path)) => writeln!(out, "Saved {}", path)?,
                Ok(None) => writeln!(out, "Nothing generated yet.")?,
                Err(err) => writeln!(out, "Save failed: {}", err)?,
            },

            Command::Chat(message) => {
                if self.studio.chat().send(&message).await {
                    let reply = state.read(|s| s.chat.messages().last().cloned());
                    if let Some(reply) = reply {
                        writeln!(out, "{}: {}", reply.role, reply.text)?;
                    }
                }
            }
            Command::History => {
                let messages = state.read(|s| s.chat.messages().to_vec());
                if messages.is_empty() {
                    writeln!(out, "No messages yet.")?;
                }
                for message in messages {
                    writeln!(out, "[{}] {}", message.role, message.text)?;
                }
            }

            Command::Status => writeln!(out, "{}", state.read(render_status))?,
            Command::Dismiss => {
                self.studio.dismiss_error();
                writeln!(out, "Error dismissed")?;
            }
        }

        Ok(Flow::Continue)
    }
}
