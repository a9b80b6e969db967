//! The boundary between the orchestrator and the machine it provisions.
//!
//! Every external effect other than writing files goes through [`Host`]:
//! privilege and architecture probes, tool discovery, child processes, the
//! release download, and the interactive prompt. [`SystemHost`] is the real
//! implementation; tests drive the orchestrator with an in-memory fake.

use std::io::{BufRead, Write};
use std::path::Path;
use std::process::{Command, Stdio};
use std::time::Duration;

use crate::error::{ProvisionError, Result};

/// Captured result of a finished child process.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    /// Exit code; None when the process was killed by a signal.
    pub code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }

    pub fn status_label(&self) -> String {
        match self.code {
            Some(c) => format!("exit code {c}"),
            None => "signal".to_string(),
        }
    }

    /// Stderr if present, otherwise stdout, trimmed and capped for display.
    pub fn diagnostic(&self) -> String {
        let text = if self.stderr.trim().is_empty() {
            self.stdout.trim()
        } else {
            self.stderr.trim()
        };
        text.chars().take(2000).collect()
    }
}

pub trait Host {
    /// True when the process runs with effective uid 0.
    fn is_root(&self) -> bool;

    /// Raw machine identifier, as printed by `uname -m`.
    fn machine_arch(&self) -> Result<String>;

    /// True when `tool` resolves on PATH.
    fn has_tool(&self, tool: &str) -> bool;

    /// Run `program` to completion, optionally feeding `stdin`.
    ///
    /// A non-zero exit is returned as output, not as an error; only failure to
    /// spawn is an `Err`. Callers decide what a non-zero exit means.
    fn run(&self, program: &str, args: &[&str], stdin: Option<&str>) -> Result<CommandOutput>;

    /// Fetch `url` and write the response body to `dest`.
    fn download(&self, url: &str, dest: &Path) -> Result<()>;

    /// Ask the operator for one line of input. EOF yields an empty string.
    fn prompt(&self, message: &str) -> Result<String>;
}

/// Run a command and turn a non-zero exit into [`ProvisionError::CommandFailed`].
pub fn run_checked(host: &dyn Host, program: &str, args: &[&str]) -> Result<CommandOutput> {
    let output = host.run(program, args, None)?;
    if !output.success() {
        return Err(ProvisionError::CommandFailed {
            command: render_command(program, args),
            status: output.status_label(),
            stderr: output.diagnostic(),
        });
    }
    Ok(output)
}

pub fn render_command(program: &str, args: &[&str]) -> String {
    std::iter::once(program)
        .chain(args.iter().copied())
        .collect::<Vec<_>>()
        .join(" ")
}

// ---------------------------------------------------------------------------
// SystemHost
// ---------------------------------------------------------------------------

const DOWNLOAD_TIMEOUT: Duration = Duration::from_secs(300);

/// The machine this process runs on.
pub struct SystemHost {
    envs: Vec<(String, String)>,
}

impl SystemHost {
    pub fn new() -> Self {
        Self {
            // Keeps apt from opening dialogs in the middle of a run.
            envs: vec![("DEBIAN_FRONTEND".into(), "noninteractive".into())],
        }
    }
}

impl Default for SystemHost {
    fn default() -> Self {
        Self::new()
    }
}

impl Host for SystemHost {
    fn is_root(&self) -> bool {
        nix::unistd::geteuid().is_root()
    }

    fn machine_arch(&self) -> Result<String> {
        let output = run_checked(self, "uname", &["-m"])?;
        Ok(output.stdout.trim().to_string())
    }

    fn has_tool(&self, tool: &str) -> bool {
        which::which(tool).is_ok()
    }

    fn run(&self, program: &str, args: &[&str], stdin: Option<&str>) -> Result<CommandOutput> {
        tracing::debug!(command = %render_command(program, args), "running");

        let mut cmd = Command::new(program);
        cmd.args(args);
        for (k, v) in &self.envs {
            cmd.env(k, v);
        }
        cmd.stdin(if stdin.is_some() {
            Stdio::piped()
        } else {
            Stdio::null()
        });
        cmd.stdout(Stdio::piped());
        cmd.stderr(Stdio::piped());

        let mut child = cmd.spawn().map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                ProvisionError::ToolNotFound(program.to_string())
            } else {
                ProvisionError::Io(e)
            }
        })?;

        if let Some(input) = stdin {
            if let Some(mut pipe) = child.stdin.take() {
                pipe.write_all(input.as_bytes())?;
            }
        }

        let output = child.wait_with_output()?;
        Ok(CommandOutput {
            code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }

    fn download(&self, url: &str, dest: &Path) -> Result<()> {
        let fail = |reason: String| ProvisionError::Download {
            url: url.to_string(),
            reason,
        };

        let client = reqwest::blocking::Client::builder()
            .user_agent(concat!("boxstrap/", env!("CARGO_PKG_VERSION")))
            .timeout(DOWNLOAD_TIMEOUT)
            .build()?;

        let response = client
            .get(url)
            .send()
            .map_err(|e| fail(e.to_string()))?;
        let status = response.status();
        if !status.is_success() {
            return Err(fail(format!("HTTP {status}")));
        }
        let body = response.bytes().map_err(|e| fail(e.to_string()))?;
        std::fs::write(dest, &body)?;
        Ok(())
    }

    /// The question goes to stderr so stdout carries only the report.
    fn prompt(&self, message: &str) -> Result<String> {
        ask(message, std::io::stdin().lock(), std::io::stderr())
    }
}

/// Write `message` to `out`, then read one trimmed line from `input`.
fn ask(message: &str, mut input: impl BufRead, mut out: impl Write) -> Result<String> {
    write!(out, "{message}")?;
    out.flush()?;

    let mut line = String::new();
    input.read_line(&mut line)?;
    Ok(line.trim().to_string())
}
