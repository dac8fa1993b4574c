//! Scripted collaborators for tests
//!
//! Enabled for this crate's unit tests and, through the `testing` feature,
//! for the integration-test crate.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::monitoring::{StatusCallback, StatusNotifier};
use crate::system::System;
use crate::{Result, SupervisorError};

#[derive(Default)]
struct MockSystemState {
    files: HashMap<PathBuf, String>,
    commands: HashMap<String, String>,
    /// Elevated command → (command whose output it changes, new output)
    elevated_effects: HashMap<String, (String, String)>,
    failing_elevated: HashSet<String>,
    written: Vec<(PathBuf, String)>,
    exec_calls: Vec<String>,
    elevated_calls: Vec<String>,
    user_calls: Vec<String>,
}

/// In-memory [`System`]
///
/// Files and command outputs are scripted up front. `exec` and
/// `exec_as_user` share one command table; a command with no scripted output
/// fails as if it exited with code 1. Elevated commands succeed with empty
/// output unless marked failing, and may carry an effect that rescripts a
/// query command, so a second reconciliation pass sees the installed state.
#[derive(Default)]
pub struct MockSystem {
    state: Mutex<MockSystemState>,
}

impl MockSystem {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_file(&self, path: impl Into<PathBuf>, content: impl Into<String>) {
        self.state.lock().files.insert(path.into(), content.into());
    }

    pub fn unset_file(&self, path: impl AsRef<Path>) {
        self.state.lock().files.remove(path.as_ref());
    }

    pub fn file(&self, path: impl AsRef<Path>) -> Option<String> {
        self.state.lock().files.get(path.as_ref()).cloned()
    }

    pub fn set_command(&self, command: impl Into<String>, output: impl Into<String>) {
        self.state.lock().commands.insert(command.into(), output.into());
    }

    pub fn unset_command(&self, command: &str) {
        self.state.lock().commands.remove(command);
    }

    /// When `command` runs elevated, `query` starts answering with `output`
    pub fn set_elevated_effect(
        &self,
        command: impl Into<String>,
        query: impl Into<String>,
        output: impl Into<String>,
    ) {
        self.state
            .lock()
            .elevated_effects
            .insert(command.into(), (query.into(), output.into()));
    }

    pub fn fail_elevated(&self, command: &str) {
        self.state.lock().failing_elevated.insert(command.to_string());
    }

    /// Every `write_file` call, in order
    pub fn written(&self) -> Vec<(PathBuf, String)> {
        self.state.lock().written.clone()
    }

    pub fn exec_calls(&self) -> Vec<String> {
        self.state.lock().exec_calls.clone()
    }

    pub fn elevated_calls(&self) -> Vec<String> {
        self.state.lock().elevated_calls.clone()
    }

    pub fn user_calls(&self) -> Vec<String> {
        self.state.lock().user_calls.clone()
    }

    fn scripted(state: &MockSystemState, command: &str) -> Result<String> {
        state
            .commands
            .get(command)
            .cloned()
            .ok_or_else(|| SupervisorError::CommandFailed {
                command: command.to_string(),
                code: Some(1),
                stderr: "not scripted".to_string(),
            })
    }
}

#[async_trait]
impl System for MockSystem {
    async fn read_file(&self, path: &Path) -> Result<Option<String>> {
        Ok(self.state.lock().files.get(path).cloned())
    }

    async fn write_file(&self, path: &Path, content: &str) -> Result<()> {
        let mut state = self.state.lock();
        state.written.push((path.to_path_buf(), content.to_string()));
        state.files.insert(path.to_path_buf(), content.to_string());
        Ok(())
    }

    async fn exec(&self, command: &str) -> Result<String> {
        let mut state = self.state.lock();
        state.exec_calls.push(command.to_string());
        Self::scripted(&state, command)
    }

    async fn exec_elevated(&self, command: &str) -> Result<String> {
        let mut state = self.state.lock();
        state.elevated_calls.push(command.to_string());

        if state.failing_elevated.contains(command) {
            return Err(SupervisorError::CommandFailed {
                command: command.to_string(),
                code: Some(1223),
                stderr: "The operation was canceled by the user.".to_string(),
            });
        }

        if let Some((query, output)) = state.elevated_effects.get(command).cloned() {
            state.commands.insert(query, output);
        }
        Ok(String::new())
    }

    async fn exec_as_user(&self, command: &str) -> Result<String> {
        let mut state = self.state.lock();
        state.user_calls.push(command.to_string());
        Self::scripted(&state, command)
    }
}

/// [`StatusNotifier`] whose observations are pushed by the test
#[derive(Default)]
pub struct MockStatusNotifier {
    callback: Mutex<Option<Arc<dyn Fn(bool) + Send + Sync>>>,
    started: AtomicBool,
}

impl MockStatusNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Deliver one observation to the registered callback, if any
    pub fn report(&self, alive: bool) {
        let callback = self.callback.lock().clone();
        if let Some(callback) = callback {
            callback(alive);
        }
    }

    pub fn is_started(&self) -> bool {
        self.started.load(Ordering::SeqCst)
    }
}

impl StatusNotifier for MockStatusNotifier {
    fn start(&self) {
        self.started.store(true, Ordering::SeqCst);
    }

    fn stop(&self) {
        self.started.store(false, Ordering::SeqCst);
    }

    fn on_status(&self, callback: StatusCallback) {
        *self.callback.lock() = Some(Arc::from(callback));
    }
}
