//! Runner module - Execution abstraction layer
//!
//! This module provides a single interface for running one program to
//! completion or to its deadline:
//! - `ProcessRunner`: spawns a child process group with rlimits applied
//!
//! The runner module does NOT:
//! - Compare outputs or determine verdicts
//! - Know about languages or compilation
//! - Own the workspace directory

pub mod process;

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

use crate::sandbox::ResourceLimits;

/// Command specification for execution
#[derive(Debug, Clone, PartialEq)]
pub struct CommandSpec {
    /// Program path or name
    pub program: String,
    /// Arguments to the program
    pub args: Vec<String>,
    /// Environment variables; the child starts from an empty environment
    pub env: Vec<(String, String)>,
    /// Working directory
    pub work_dir: Option<PathBuf>,
}

impl CommandSpec {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            env: Vec::new(),
            work_dir: None,
        }
    }

    pub fn with_args(mut self, args: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.args = args.into_iter().map(|a| a.into()).collect();
        self
    }

    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    pub fn with_work_dir(mut self, dir: impl AsRef<Path>) -> Self {
        self.work_dir = Some(dir.as_ref().to_path_buf());
        self
    }

    /// Convert to a vector of strings (program + args)
    pub fn to_vec(&self) -> Vec<String> {
        let mut v = vec![self.program.clone()];
        v.extend(self.args.iter().cloned());
        v
    }
}

/// Limits for a single run
#[derive(Debug, Clone)]
pub struct RunLimits {
    /// Wall-clock deadline
    pub time_limit: Duration,
    /// Kernel limits applied to the child before exec
    pub resources: ResourceLimits,
    /// Per-stream cap on captured output
    pub output_limit_bytes: usize,
    /// Resident set ceiling; the process group is killed once a sample
    /// exceeds it
    pub memory_limit_kb: Option<u64>,
}

impl RunLimits {
    pub fn new(time_limit: Duration, resources: ResourceLimits) -> Self {
        Self {
            time_limit,
            resources,
            output_limit_bytes: DEFAULT_OUTPUT_LIMIT_BYTES,
            memory_limit_kb: None,
        }
    }

    pub fn with_output_limit(mut self, bytes: usize) -> Self {
        self.output_limit_bytes = bytes;
        self
    }

    pub fn with_memory_limit_kb(mut self, kilobytes: u64) -> Self {
        self.memory_limit_kb = Some(kilobytes);
        self
    }
}

pub const DEFAULT_OUTPUT_LIMIT_BYTES: usize = 1024 * 1024;

/// Execution status (raw, no verdict interpretation)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    /// Program exited normally with given exit code
    Exited(i32),
    /// Killed by signal
    Signaled(i32),
    /// Deadline passed; the process group was killed
    TimedOut,
}

/// Outcome of running a program
#[derive(Debug, Clone)]
pub struct RunOutcome {
    pub status: RunStatus,
    pub stdout: String,
    pub stderr: String,
    /// Wall time from spawn to resolution
    pub time_ms: u64,
    /// Sampled peak resident set size, where the platform exposes it
    pub memory_kb: Option<u64>,
    /// Either stream hit the output cap
    pub output_truncated: bool,
}

impl RunOutcome {
    /// Check if execution was successful (exited with code 0)
    pub fn is_success(&self) -> bool {
        matches!(self.status, RunStatus::Exited(0))
    }

    /// Exit code, with signals mapped to 128 + signal and timeouts to -1
    pub fn exit_code(&self) -> i32 {
        match self.status {
            RunStatus::Exited(code) => code,
            RunStatus::Signaled(sig) => 128 + sig,
            RunStatus::TimedOut => -1,
        }
    }
}

#[derive(Debug, Error)]
pub enum RunError {
    /// The program could not be started at all
    #[error("Failed to start {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },
    #[error("I/O error while running program: {0}")]
    Io(#[from] std::io::Error),
}

/// Runner trait for executing programs
#[async_trait]
pub trait Runner: Send + Sync {
    /// Run a command with the given limits, feeding `stdin` and closing it
    async fn run(
        &self,
        cmd: &CommandSpec,
        limits: &RunLimits,
        stdin: &str,
    ) -> Result<RunOutcome, RunError>;
}

pub use process::ProcessRunner;

#[cfg(test)]
mod tests {
    use super::*;

    fn outcome(status: RunStatus) -> RunOutcome {
        RunOutcome {
            status,
            stdout: String::new(),
            stderr: String::new(),
            time_ms: 0,
            memory_kb: None,
            output_truncated: false,
        }
    }

    #[test]
    fn test_exit_code_mapping() {
        assert_eq!(outcome(RunStatus::Exited(0)).exit_code(), 0);
        assert_eq!(outcome(RunStatus::Exited(3)).exit_code(), 3);
        assert_eq!(outcome(RunStatus::Signaled(9)).exit_code(), 137);
        assert_eq!(outcome(RunStatus::TimedOut).exit_code(), -1);
    }

    #[test]
    fn test_only_clean_exit_is_success() {
        assert!(outcome(RunStatus::Exited(0)).is_success());
        assert!(!outcome(RunStatus::Exited(1)).is_success());
        assert!(!outcome(RunStatus::Signaled(11)).is_success());
        assert!(!outcome(RunStatus::TimedOut).is_success());
    }

    #[test]
    fn test_command_spec_to_vec() {
        let spec = CommandSpec::new("java")
            .with_args(["-cp", "/w"])
            .with_env("LANG", "C.UTF-8");
        assert_eq!(spec.to_vec(), vec!["java", "-cp", "/w"]);
        assert_eq!(spec.env, vec![("LANG".to_string(), "C.UTF-8".to_string())]);
    }

    #[test]
    fn test_run_limits_memory_ceiling_is_opt_in() {
        let limits = RunLimits::new(Duration::from_secs(1), ResourceLimits::default());
        assert_eq!(limits.memory_limit_kb, None);
        assert_eq!(limits.with_memory_limit_kb(65536).memory_limit_kb, Some(65536));
    }
}
