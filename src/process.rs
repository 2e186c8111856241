//! External program execution behind a mockable trait.
//!
//! Transcoding, local speech synthesis and playback all shell out; going
//! through `CommandExecutor` keeps those paths testable without the tools.

use crate::error::{KiraError, Result};
use std::collections::{HashSet, VecDeque};
use std::process::Command;
use std::sync::Mutex;

/// Trait for executing system commands.
///
/// Object-safe, Send + Sync for use in concurrent contexts.
pub trait CommandExecutor: Send + Sync {
    /// Run `command` with `args` to completion.
    ///
    /// Returns stdout on success, an error if the program is missing or
    /// exits unsuccessfully.
    fn execute(&self, command: &str, args: &[&str]) -> Result<String>;

    /// Whether `program` can be found on `PATH`.
    fn is_available(&self, program: &str) -> bool {
        is_available(program)
    }
}

/// PATH lookup.
pub fn is_available(program: &str) -> bool {
    which::which(program).is_ok()
}

/// Production command executor using std::process::Command.
#[derive(Debug, Clone, Default)]
pub struct SystemCommandExecutor;

impl SystemCommandExecutor {
    pub fn new() -> Self {
        Self
    }
}

impl CommandExecutor for SystemCommandExecutor {
    fn execute(&self, command: &str, args: &[&str]) -> Result<String> {
        tracing::trace!(command, ?args, "running");

        let output = Command::new(command).args(args).output().map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                KiraError::ToolNotFound {
                    tool: command.to_string(),
                }
            } else {
                KiraError::CommandFailed {
                    tool: command.to_string(),
                    message: e.to_string(),
                }
            }
        })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(KiraError::CommandFailed {
                tool: command.to_string(),
                message: format!("{}: {}", output.status, stderr.trim()),
            });
        }

        Ok(String::from_utf8_lossy(&output.stdout).to_string())
    }
}

/// Mock command executor for testing.
///
/// Records every call and pops configured responses in order; once the queue
/// is empty every call succeeds with empty output.
#[derive(Debug, Default)]
pub struct MockCommandExecutor {
    calls: Mutex<Vec<(String, Vec<String>)>>,
    responses: Mutex<VecDeque<Result<String>>>,
    missing: HashSet<String>,
}

impl MockCommandExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a successful response.
    pub fn with_response(self, response: &str) -> Self {
        if let Ok(mut queue) = self.responses.lock() {
            queue.push_back(Ok(response.to_string()));
        }
        self
    }

    /// Queue an error response.
    pub fn with_error(self, error: KiraError) -> Self {
        if let Ok(mut queue) = self.responses.lock() {
            queue.push_back(Err(error));
        }
        self
    }

    /// Report `program` as absent from PATH.
    pub fn without_program(mut self, program: &str) -> Self {
        self.missing.insert(program.to_string());
        self
    }

    pub fn calls(&self) -> Vec<(String, Vec<String>)> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().map(|c| c.len()).unwrap_or(0)
    }

    pub fn call(&self, index: usize) -> Option<(String, Vec<String>)> {
        self.calls.lock().ok()?.get(index).cloned()
    }
}

impl CommandExecutor for MockCommandExecutor {
    fn execute(&self, command: &str, args: &[&str]) -> Result<String> {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push((
                command.to_string(),
                args.iter().map(|s| s.to_string()).collect(),
            ));
        }

        if self.missing.contains(command) {
            return Err(KiraError::ToolNotFound {
                tool: command.to_string(),
            });
        }

        self.responses
            .lock()
            .ok()
            .and_then(|mut queue| queue.pop_front())
            .unwrap_or_else(|| Ok(String::new()))
    }

    fn is_available(&self, program: &str) -> bool {
        !self.missing.contains(program)
    }
}
