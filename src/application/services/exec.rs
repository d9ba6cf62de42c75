//! Knife command scripts (`exec`)

use std::io;
use std::path::PathBuf;
use std::sync::Arc;

use tracing::debug;

use crate::application::{ApplicationError, ApplicationResult, IoResultExt};
use crate::domain::expand_env_vars;
use crate::domain::script::{parse_script, ScriptLine};
use crate::infrastructure::traits::FileSystem;

/// Script text and the label errors are reported against.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptSource {
    pub label: String,
    pub text: String,
}

/// One parsed command, tagged with where it came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptCommand {
    pub label: String,
    pub line: usize,
    pub argv: Vec<String>,
}

impl ScriptCommand {
    /// `<label>:<line>` prefix for failures of this command.
    pub fn location(&self) -> String {
        format!("{}:{}", self.label, self.line)
    }
}

pub struct ExecService {
    fs: Arc<dyn FileSystem>,
}

impl ExecService {
    pub fn new(fs: Arc<dyn FileSystem>) -> Self {
        Self { fs }
    }

    /// `-E` code wins, then script files, then whatever `read_stdin` yields.
    pub fn sources<F>(
        &self,
        code: Option<&str>,
        scripts: &[String],
        read_stdin: F,
    ) -> ApplicationResult<Vec<ScriptSource>>
    where
        F: FnOnce() -> io::Result<String>,
    {
        if let Some(code) = code {
            return Ok(vec![ScriptSource {
                label: "-E Argument".to_string(),
                text: code.to_string(),
            }]);
        }
        if !scripts.is_empty() {
            return scripts
                .iter()
                .map(|script| {
                    let path = PathBuf::from(expand_env_vars(script));
                    debug!("exec: loading {}", path.display());
                    let text = self
                        .fs
                        .read_to_string(&path)
                        .with_path_context("read script", &path)?;
                    Ok(ScriptSource {
                        label: path.display().to_string(),
                        text,
                    })
                })
                .collect();
        }
        let text = read_stdin().with_context("read script from STDIN")?;
        Ok(vec![ScriptSource {
            label: "STDIN".to_string(),
            text,
        }])
    }

    /// Parse every source up front so a syntax error runs nothing.
    pub fn parse(&self, sources: &[ScriptSource]) -> ApplicationResult<Vec<ScriptCommand>> {
        let mut commands = Vec::new();
        for source in sources {
            let lines = parse_script(&source.text).map_err(|(line, e)| {
                ApplicationError::fatal(format!("{}:{}: {}", source.label, line, e))
            })?;
            commands.extend(lines.into_iter().map(|ScriptLine { line, argv }| ScriptCommand {
                label: source.label.clone(),
                line,
                argv,
            }));
        }
        Ok(commands)
    }
}
