//! Command runner abstraction for executing system programs.
//!
//! `CommandRunner` is the trait that adapters use to execute system commands.
//! `SystemRunner` is the production implementation that spawns the program
//! directly (no shell, so arguments never need quoting).
//! `MockRunner` is the test double that records calls and returns preset responses.

use std::cell::RefCell;
use std::io;
use std::process::Command;

/// Why a command did not succeed.
#[derive(Debug, thiserror::Error)]
pub enum CommandFailure {
    #[error("failed to execute: {0}")]
    Spawn(#[from] io::Error),

    #[error("exited with {}: {}", code.map_or("signal".to_string(), |c| format!("status {}", c)), stderr.trim())]
    Exit { code: Option<i32>, stderr: String },
}

impl CommandFailure {
    pub fn exit(code: i32, stderr: &str) -> Self {
        CommandFailure::Exit {
            code: Some(code),
            stderr: stderr.to_string(),
        }
    }

    /// True when the program ran and reported failure, as opposed to not
    /// running at all.
    pub fn is_exit(&self) -> bool {
        matches!(self, CommandFailure::Exit { .. })
    }
}

/// Trait for executing a program with arguments, returning its stdout.
pub trait CommandRunner {
    fn run(&self, program: &str, args: &[&str]) -> Result<String, CommandFailure>;
}

impl<R: CommandRunner + ?Sized> CommandRunner for &R {
    fn run(&self, program: &str, args: &[&str]) -> Result<String, CommandFailure> {
        (**self).run(program, args)
    }
}

/// Production runner.
pub struct SystemRunner;

impl CommandRunner for SystemRunner {
    fn run(&self, program: &str, args: &[&str]) -> Result<String, CommandFailure> {
        tracing::debug!(program, ?args, "running command");
        let output = Command::new(program).args(args).output()?;
        if output.status.success() {
            Ok(String::from_utf8_lossy(&output.stdout).to_string())
        } else {
            Err(CommandFailure::Exit {
                code: output.status.code(),
                stderr: String::from_utf8_lossy(&output.stderr).to_string(),
            })
        }
    }
}

/// Test-double runner that records commands and returns pre-configured responses.
pub struct MockRunner {
    responses: RefCell<Vec<Result<String, CommandFailure>>>,
    commands: RefCell<Vec<String>>,
}

impl MockRunner {
    pub fn with_responses(responses: Vec<Result<String, CommandFailure>>) -> Self {
        let mut reversed = responses;
        reversed.reverse();
        MockRunner {
            responses: RefCell::new(reversed),
            commands: RefCell::new(Vec::new()),
        }
    }

    pub fn new() -> Self {
        MockRunner {
            responses: RefCell::new(Vec::new()),
            commands: RefCell::new(Vec::new()),
        }
    }

    /// Each executed command as a single space-joined line.
    pub fn executed_commands(&self) -> Vec<String> {
        self.commands.borrow().clone()
    }
}

impl Default for MockRunner {
    fn default() -> Self {
        Self::new()
    }
}

impl CommandRunner for MockRunner {
    fn run(&self, program: &str, args: &[&str]) -> Result<String, CommandFailure> {
        let mut line = program.to_string();
        for arg in args {
            line.push(' ');
            line.push_str(arg);
        }
        self.commands.borrow_mut().push(line);
        let mut responses = self.responses.borrow_mut();
        if let Some(response) = responses.pop() {
            response
        } else {
            Ok(String::new())
        }
    }
}
