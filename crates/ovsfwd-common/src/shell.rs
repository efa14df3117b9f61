//! External command execution for the forwarder.
//!
//! All host mutation (OVS tools, iproute2) goes through a [`CommandRunner`]
//! so that whole request/close flows can be exercised against a recording
//! implementation that captures the exact command sequence.
//!
//! # Example
//!
//! ```ignore
//! use ovsfwd_common::shell::{self, ShellRunner, CommandRunner, OVS_VSCTL_CMD};
//!
//! let runner = ShellRunner;
//! let cmd = format!("{} -- --may-exist add-br br-nsm", OVS_VSCTL_CMD);
//! let result = runner.exec(&cmd).await?;
//! ```

use std::collections::VecDeque;
use std::process::Stdio;
use std::sync::Mutex;

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use tokio::process::Command;

use crate::error::{FwdError, FwdResult};

/// Path to the `ovs-vsctl` command for OVSDB configuration.
pub const OVS_VSCTL_CMD: &str = "/usr/bin/ovs-vsctl";

/// Path to the `ovs-ofctl` command for OpenFlow programming.
pub const OVS_OFCTL_CMD: &str = "/usr/bin/ovs-ofctl";

/// Path to the `ip` command for link and address configuration.
pub const IP_CMD: &str = "/sbin/ip";

/// Regex for characters that need escaping in shell double-quotes.
/// Matches: $, `, ", \, and newline
static SHELL_ESCAPE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"([$`"\\\n])"#).expect("Invalid regex pattern"));

/// Quotes a string for safe use in shell commands.
///
/// Wraps the string in double quotes and escapes the characters that have
/// special meaning inside double quotes (`$`, `` ` ``, `"`, `\`, newline).
///
/// # Example
///
/// ```
/// use ovsfwd_common::shell::shellquote;
///
/// assert_eq!(shellquote("tapsrc-1"), "\"tapsrc-1\"");
/// assert_eq!(shellquote("with$var"), "\"with\\$var\"");
/// ```
pub fn shellquote(s: &str) -> String {
    let escaped = SHELL_ESCAPE_RE.replace_all(s, r"\$1");
    format!("\"{}\"", escaped)
}

/// Result of an external command execution.
#[derive(Debug, Clone)]
pub struct ExecResult {
    /// The exit code of the command (0 = success).
    pub exit_code: i32,
    /// The trimmed stdout output.
    pub stdout: String,
    /// The trimmed stderr output.
    pub stderr: String,
}

impl ExecResult {
    /// A successful result carrying the given stdout.
    pub fn ok(stdout: impl Into<String>) -> Self {
        Self {
            exit_code: 0,
            stdout: stdout.into(),
            stderr: String::new(),
        }
    }

    /// A failed result with the given exit code and stderr.
    pub fn failed(exit_code: i32, stderr: impl Into<String>) -> Self {
        Self {
            exit_code,
            stdout: String::new(),
            stderr: stderr.into(),
        }
    }

    /// Returns true if the command succeeded (exit code 0).
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }

    /// Returns the combined output (stdout + stderr) for error messages.
    pub fn combined_output(&self) -> String {
        if self.stderr.is_empty() {
            self.stdout.clone()
        } else if self.stdout.is_empty() {
            self.stderr.clone()
        } else {
            format!("{}\n{}", self.stdout, self.stderr)
        }
    }
}

/// Executes external commands on behalf of the dataplane adapters.
#[async_trait]
pub trait CommandRunner: Send + Sync {
    /// Runs the command, returning its exit code and output.
    ///
    /// An `Err` means the command could not be spawned; a non-zero exit
    /// code is reported through the returned [`ExecResult`].
    async fn exec(&self, cmd: &str) -> FwdResult<ExecResult>;

    /// Runs the command and returns stdout, failing on non-zero exit.
    async fn exec_ok(&self, cmd: &str) -> FwdResult<String> {
        let result = self.exec(cmd).await?;
        if result.success() {
            Ok(result.stdout)
        } else {
            Err(FwdError::CommandFailed {
                command: cmd.to_string(),
                exit_code: result.exit_code,
                output: result.combined_output(),
            })
        }
    }
}

/// Production runner: executes through `/bin/sh -c`.
///
/// Commands run through a shell to support the `--`-separated compound
/// invocations the OVS tools use.
#[derive(Debug, Default, Clone, Copy)]
pub struct ShellRunner;

#[async_trait]
impl CommandRunner for ShellRunner {
    async fn exec(&self, cmd: &str) -> FwdResult<ExecResult> {
        tracing::debug!(command = %cmd, "executing command");

        let output = Command::new("/bin/sh")
            .arg("-c")
            .arg(cmd)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await
            .map_err(|e| FwdError::Exec {
                command: cmd.to_string(),
                source: e,
            })?;

        let exit_code = output.status.code().unwrap_or(-1);
        let stdout = String::from_utf8_lossy(&output.stdout).trim().to_string();
        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();

        let result = ExecResult {
            exit_code,
            stdout,
            stderr,
        };

        if result.success() {
            tracing::trace!(command = %cmd, "command succeeded");
        } else {
            tracing::warn!(
                command = %cmd,
                exit_code = exit_code,
                stderr = %result.stderr,
                "command failed"
            );
        }

        Ok(result)
    }
}

/// A scripted response rule for [`RecordingRunner`].
#[derive(Debug)]
struct Rule {
    /// Substring matched against the full command line.
    needle: String,
    /// Responses served in order; the last one repeats.
    responses: VecDeque<ExecResult>,
}

/// Test runner that records every command and serves scripted outputs.
///
/// The recording equivalent of the mock mode the config managers use:
/// commands are captured instead of executed, so tests can assert the
/// exact sequence of OVS and iproute2 operations a scenario produces.
#[derive(Debug, Default)]
pub struct RecordingRunner {
    commands: Mutex<Vec<String>>,
    rules: Mutex<Vec<Rule>>,
}

impl RecordingRunner {
    /// Creates a runner where every command succeeds with empty output.
    pub fn new() -> Self {
        Self::default()
    }

    /// Serves `stdout` for commands containing `needle`.
    pub fn with_output(self, needle: impl Into<String>, stdout: impl Into<String>) -> Self {
        self.add_rule(needle, ExecResult::ok(stdout));
        self
    }

    /// Fails commands containing `needle` with exit code 1.
    pub fn with_failure(self, needle: impl Into<String>, stderr: impl Into<String>) -> Self {
        self.add_rule(needle, ExecResult::failed(1, stderr));
        self
    }

    /// Appends a scripted response for commands containing `needle`.
    ///
    /// Multiple responses for the same needle are served in order; the
    /// last response repeats for any further matches.
    pub fn add_rule(&self, needle: impl Into<String>, response: ExecResult) {
        let needle = needle.into();
        let mut rules = self.rules.lock().unwrap();
        if let Some(rule) = rules.iter_mut().find(|r| r.needle == needle) {
            rule.responses.push_back(response);
        } else {
            rules.push(Rule {
                needle,
                responses: VecDeque::from([response]),
            });
        }
    }

    /// Returns all commands recorded so far.
    pub fn commands(&self) -> Vec<String> {
        self.commands.lock().unwrap().clone()
    }

    /// Returns the recorded commands containing the given substring.
    pub fn commands_matching(&self, needle: &str) -> Vec<String> {
        self.commands()
            .into_iter()
            .filter(|c| c.contains(needle))
            .collect()
    }

    /// Clears the recorded command log (scripted responses are kept).
    pub fn reset(&self) {
        self.commands.lock().unwrap().clear();
    }
}

#[async_trait]
impl CommandRunner for RecordingRunner {
    async fn exec(&self, cmd: &str) -> FwdResult<ExecResult> {
        self.commands.lock().unwrap().push(cmd.to_string());

        let mut rules = self.rules.lock().unwrap();
        for rule in rules.iter_mut() {
            if cmd.contains(rule.needle.as_str()) {
                let response = if rule.responses.len() > 1 {
                    rule.responses.pop_front().unwrap()
                } else {
                    rule.responses.front().cloned().unwrap()
                };
                return Ok(response);
            }
        }
        Ok(ExecResult::ok(""))
    }
}
