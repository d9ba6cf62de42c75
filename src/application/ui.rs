//! Interactive user interaction: prompts, confirmations, editor round-trips

use std::sync::Arc;

use colored::Colorize;
use serde_json::Value;
use tracing::debug;

use crate::application::{ApplicationError, ApplicationResult, IoResultExt};
use crate::domain::DomainError;
use crate::infrastructure::traits::{Console, Editor, FileSystem};

/// Behaviour switches taken from global command-line flags.
#[derive(Debug, Clone, Copy, Default)]
pub struct UiOptions {
    /// Answer every confirmation with yes (`--yes`)
    pub assume_yes: bool,
    /// Skip the editor and use documents as generated (`--no-editor`)
    pub no_editor: bool,
}

pub struct Ui {
    console: Arc<dyn Console>,
    editor: Arc<dyn Editor>,
    fs: Arc<dyn FileSystem>,
    options: UiOptions,
}

impl Ui {
    pub fn new(
        console: Arc<dyn Console>,
        editor: Arc<dyn Editor>,
        fs: Arc<dyn FileSystem>,
        options: UiOptions,
    ) -> Self {
        Self {
            console,
            editor,
            fs,
            options,
        }
    }

    /// Print a line to stdout.
    pub fn say(&self, msg: &str) {
        self.console.say(msg);
    }

    /// Print without a trailing newline (progress dots).
    pub fn print(&self, msg: &str) {
        self.console.print(msg);
    }

    /// `Label: value` with the label highlighted.
    pub fn field(&self, label: &str, value: &str) {
        self.console.say(&format!("{}: {}", label.cyan(), value));
    }

    pub fn heading(&self, msg: &str) {
        self.console.say(&msg.magenta().to_string());
    }

    /// Ask a question and return the answer without the line terminator.
    pub fn ask(&self, prompt: &str) -> ApplicationResult<String> {
        let answer = self.console.ask(prompt).with_context("read answer")?;
        Ok(answer.trim_end_matches(['\r', '\n']).to_string())
    }

    /// `<question>? (Y/N)`; anything but an answer starting with y/Y aborts.
    pub fn confirm(&self, question: &str) -> ApplicationResult<()> {
        if self.options.assume_yes {
            debug!("confirm: assuming yes for '{}'", question);
            return Ok(());
        }
        let answer = self.ask(&format!("{question}? (Y/N) "))?;
        if answer.trim_start().starts_with(['y', 'Y']) {
            Ok(())
        } else {
            Err(ApplicationError::Aborted)
        }
    }

    /// Open `data` as pretty JSON in the editor and parse the result.
    pub fn edit_data(&self, data: &Value) -> ApplicationResult<Value> {
        if self.options.no_editor {
            return Ok(data.clone());
        }
        let dir = tempfile::Builder::new()
            .prefix("knife-edit-")
            .tempdir()
            .with_context("create editor temp dir")?;
        let path = dir.path().join("knife-edit.json");

        let pretty = serde_json::to_string_pretty(data).map_err(|e| DomainError::InvalidDocument {
            message: e.to_string(),
        })?;
        self.fs
            .write(&path, &pretty)
            .with_path_context("write editor file", &path)?;
        self.editor
            .open(&path)
            .with_path_context("run editor on", &path)?;
        let edited = self
            .fs
            .read_to_string(&path)
            .with_path_context("read editor file", &path)?;

        serde_json::from_str(&edited).map_err(|e| {
            DomainError::InvalidDocument {
                message: format!("edited document is not valid JSON: {e}"),
            }
            .into()
        })
    }
}
