//! Scripted stand-in for the appliance configuration shell.

use anyhow::Result;
use futures::future::BoxFuture;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Mutex, MutexGuard};

use crate::codec::Record;
use crate::core::DeclkitError;
use crate::storage::{PrivilegedShell, parse_record_listing};

#[derive(Debug, Default)]
struct FakeState {
    folders: BTreeSet<String>,
    groups: BTreeMap<String, Vec<Record>>,
    commands: Vec<String>,
    failures: Vec<(String, String)>,
    saves: usize,
}

/// In-process [`PrivilegedShell`] that understands the handful of commands the
/// appliance data store sends, with appliance-like listings and error texts.
///
/// Records are listed in the order they were written.
#[derive(Debug, Default)]
pub struct FakeAppliance {
    state: Mutex<FakeState>,
}

impl FakeAppliance {
    /// Fresh appliance with no folders or collections.
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every command starting with `prefix` fail with `stderr`.
    pub fn fail_on(&self, prefix: &str, stderr: &str) {
        self.lock().failures.push((prefix.to_string(), stderr.to_string()));
    }

    /// Every command received so far, in order.
    pub fn commands(&self) -> Vec<String> {
        self.lock().commands.clone()
    }

    /// Number of `save sys config` commands received.
    pub fn save_count(&self) -> usize {
        self.lock().saves
    }

    /// Records currently held by the collection at `path`.
    pub fn records(&self, path: &str) -> Vec<Record> {
        self.lock().groups.get(path).cloned().unwrap_or_default()
    }

    /// Number of records currently held by the collection at `path`.
    pub fn record_count(&self, path: &str) -> usize {
        self.records(path).len()
    }

    fn lock(&self) -> MutexGuard<'_, FakeState> {
        self.state.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    fn execute(&self, command: &str) -> Result<String> {
        let mut state = self.lock();
        state.commands.push(command.to_string());

        if let Some((_, stderr)) = state.failures.iter().find(|(p, _)| command.starts_with(p.as_str())) {
            return fail(command, stderr);
        }

        if let Some(folder) = command.strip_prefix("create sys folder ") {
            let folder = folder.trim().to_string();
            if !state.folders.insert(folder.clone()) {
                return fail(
                    command,
                    &format!("01020066:3: The requested folder ({folder}) already exists in partition Common."),
                );
            }
            return Ok(String::new());
        }

        if let Some(rest) = command.strip_prefix("create ltm data-group internal ") {
            let path = first_token(rest);
            let folder = path.rsplit_once('/').map(|(f, _)| format!("{f}/")).unwrap_or_default();
            if !state.folders.contains(&folder) {
                return fail(command, &format!("01020036:3: The requested folder ({folder}) was not found."));
            }
            if state.groups.contains_key(path) {
                return fail(
                    command,
                    &format!("01020066:3: The requested value list ({path}) already exists in partition Common."),
                );
            }
            state.groups.insert(path.to_string(), Vec::new());
            return Ok(String::new());
        }

        if let Some(rest) = command.strip_prefix("list ltm data-group internal ") {
            let path = first_token(rest);
            let Some(records) = state.groups.get(path) else {
                return fail(command, &format!("01020036:3: The requested value list ({path}) was not found."));
            };
            return Ok(render_listing(path, records));
        }

        if let Some(rest) = command.strip_prefix("modify ltm data-group internal ") {
            let rest = rest.trim_start();
            let path = first_token(rest).to_string();
            let body = &rest[path.len()..];
            if !state.groups.contains_key(&path) {
                return fail(command, &format!("01020036:3: The requested value list ({path}) was not found."));
            }
            let records = if body.trim() == "records none" {
                Vec::new()
            } else {
                parse_record_listing(body)?
            };
            state.groups.insert(path, records);
            return Ok(String::new());
        }

        if command.trim() == "save sys config" {
            state.saves += 1;
            return Ok("Saving running configuration...".to_string());
        }

        fail(command, "Syntax Error: unexpected command")
    }
}

impl PrivilegedShell for FakeAppliance {
    fn run<'a>(&'a self, command: &'a str) -> BoxFuture<'a, Result<String>> {
        let result = self.execute(command);
        Box::pin(async move { result })
    }
}

fn first_token(text: &str) -> &str {
    text.split_whitespace().next().unwrap_or_default()
}

fn fail(command: &str, stderr: &str) -> Result<String> {
    Err(DeclkitError::ShellCommandFailed {
        command: command.chars().take(80).collect(),
        stderr: stderr.to_string(),
    }
    .into())
}

fn render_listing(path: &str, records: &[Record]) -> String {
    let mut out = format!("ltm data-group internal {path} {{\n");
    if !records.is_empty() {
        out.push_str("    records {\n");
        for record in records {
            out.push_str(&format!(
                "        {} {{\n            data {}\n        }}\n",
                record.name, record.data
            ));
        }
        out.push_str("    }\n");
    }
    out.push_str("    type string\n}\n");
    out
}
