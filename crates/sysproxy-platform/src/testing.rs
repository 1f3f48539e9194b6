//! Scripted [`CommandRunner`] for exercising backends without touching the OS.

use std::collections::HashSet;
use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;

use crate::commands::{CommandOutput, CommandRunner};

type Handler = dyn Fn(&str, &[String]) -> CommandOutput + Send + Sync;

/// Records every invocation and answers from a closure.
pub struct FakeRunner {
    handler: Box<Handler>,
    installed: HashSet<String>,
    calls: Mutex<Vec<Vec<String>>>,
}

impl FakeRunner {
    pub fn new<F>(handler: F) -> Self
    where
        F: Fn(&str, &[String]) -> CommandOutput + Send + Sync + 'static,
    {
        Self {
            handler: Box::new(handler),
            installed: HashSet::new(),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// A runner where every command succeeds with empty output.
    #[must_use]
    pub fn succeeding() -> Self {
        Self::new(|_, _| CommandOutput::ok(""))
    }

    #[must_use]
    pub fn with_installed(mut self, programs: &[&str]) -> Self {
        self.installed
            .extend(programs.iter().map(|program| (*program).to_string()));
        self
    }

    /// Every call so far as `[program, args...]`.
    pub fn calls(&self) -> Vec<Vec<String>> {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Every call so far joined with spaces, for compact assertions.
    pub fn command_lines(&self) -> Vec<String> {
        self.calls().iter().map(|call| call.join(" ")).collect()
    }
}

#[async_trait]
impl CommandRunner for FakeRunner {
    async fn run(&self, program: &str, args: &[String]) -> std::io::Result<CommandOutput> {
        let mut call = vec![program.to_string()];
        call.extend(args.iter().cloned());
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(call);

        Ok((self.handler)(program, args))
    }

    fn is_installed(&self, program: &str) -> bool {
        self.installed.contains(program)
    }
}
