//! Compiler module - Source code compilation
//!
//! Compiles the submission inside its workspace for languages whose adapter
//! has a compile step. The compiler is run through the same [`Runner`] as the
//! solution, with the larger compile limits from the engine configuration.

use std::path::Path;
use std::time::Duration;

use tracing::{debug, info};

use crate::languages::LanguageAdapter;
use crate::runner::{RunError, RunLimits, RunStatus, Runner};
use crate::sandbox::ResourceLimits;

/// Limits for the compile step
#[derive(Debug, Clone, Copy)]
pub struct CompileLimits {
    pub time_limit_secs: f64,
    pub memory_mb: u64,
    pub output_limit_bytes: usize,
    pub file_size_bytes: u64,
}

/// Result of a compilation attempt
#[derive(Debug)]
pub struct CompileResult {
    pub success: bool,
    /// Compiler diagnostics on failure
    pub message: Option<String>,
    pub exit_code: i32,
    pub time_ms: u64,
}

impl CompileResult {
    fn skipped() -> Self {
        Self {
            success: true,
            message: None,
            exit_code: 0,
            time_ms: 0,
        }
    }
}

/// Compile the workspace source if the language needs it
pub async fn compile_in_workspace(
    runner: &dyn Runner,
    adapter: &LanguageAdapter<'_>,
    work_dir: &Path,
    limits: &CompileLimits,
) -> Result<CompileResult, RunError> {
    let Some(cmd) = adapter.compile_command(work_dir, limits.memory_mb) else {
        return Ok(CompileResult::skipped());
    };

    info!("Compiling {} submission in {}", adapter.language(), work_dir.display());
    debug!("Compile command: {:?}", cmd.to_vec());

    let mut resources = ResourceLimits::default()
        .with_cpu_time(limits.time_limit_secs)
        .with_file_size(limits.file_size_bytes);
    if let Some(mb) = adapter.compile_address_space_mb(limits.memory_mb) {
        resources = resources.with_address_space_mb(mb);
    }
    let run_limits = RunLimits::new(Duration::from_secs_f64(limits.time_limit_secs), resources)
        .with_output_limit(limits.output_limit_bytes);

    let result = runner.run(&cmd, &run_limits, "").await?;

    if result.is_success() {
        return Ok(CompileResult {
            success: true,
            message: None,
            exit_code: 0,
            time_ms: result.time_ms,
        });
    }

    let error_msg = if !result.stderr.trim().is_empty() {
        result.stderr.clone()
    } else if !result.stdout.trim().is_empty() {
        result.stdout.clone()
    } else {
        match result.status {
            RunStatus::TimedOut => "Compilation timed out".to_string(),
            RunStatus::Signaled(_) => "Compiler crashed".to_string(),
            RunStatus::Exited(code) => format!("Compilation failed with exit code {}", code),
        }
    };
    info!("Compilation failed: exit_code={}", result.exit_code());

    Ok(CompileResult {
        success: false,
        message: Some(error_msg),
        exit_code: result.exit_code(),
        time_ms: result.time_ms,
    })
}
