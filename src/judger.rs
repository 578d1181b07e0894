//! Judger module - drives one request from validation to results
//!
//! A request is validated, written into a fresh workspace, compiled when the
//! language needs it, and then run once per test case in order. Every test
//! case produces exactly one [`ExecutionResult`]; failures along the way are
//! converted into results instead of being returned as errors.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{debug, error, info, warn};

use crate::checker::{compare_output, normalize_output};
use crate::compiler::{compile_in_workspace, CompileLimits};
use crate::config::EngineConfig;
use crate::core::utils::truncate_chars;
use crate::core::{ExecutionRequest, ExecutionResult, JudgeSummary, TestCase, Verdict};
use crate::languages::{Language, LanguageAdapter, LanguageRegistry};
use crate::runner::{ProcessRunner, RunLimits, RunOutcome, RunStatus, Runner};
use crate::sandbox::{Workspace, WorkspaceError, WorkspaceManager};
use crate::validator::{validate, ValidRequest, ValidationError};

/// Longest compiler message copied into results
const MAX_COMPILE_MESSAGE_CHARS: usize = 4096;

pub const TIMEOUT_MESSAGE: &str = "Execution timeout";

pub struct JudgeEngine {
    config: EngineConfig,
    registry: LanguageRegistry,
    workspaces: WorkspaceManager,
    runner: Arc<dyn Runner>,
}

impl JudgeEngine {
    /// Create an engine that runs programs as local child processes
    pub fn new(config: EngineConfig) -> Result<Self, WorkspaceError> {
        Self::with_runner(config, Arc::new(ProcessRunner::new()))
    }

    pub fn with_runner(config: EngineConfig, runner: Arc<dyn Runner>) -> Result<Self, WorkspaceError> {
        let workspaces = WorkspaceManager::new(&config.scratch_root)?;
        let registry = LanguageRegistry::new(config.toolchain.clone());
        Ok(Self {
            config,
            registry,
            workspaces,
            runner,
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Judge a request against all of its test cases.
    ///
    /// Returns `Err` only for requests that fail validation, before any
    /// workspace or process exists. Otherwise the result list has one entry
    /// per test case, or a single `system_error` entry when the workspace
    /// could not be prepared.
    pub async fn execute(
        &self,
        request: &ExecutionRequest,
    ) -> Result<Vec<ExecutionResult>, ValidationError> {
        let valid = validate(request, &self.config.request_limits())?;
        let adapter = self.registry.adapter(valid.language);

        info!(
            "Judging {} submission: {} test case(s), time_limit={}s, memory_limit={}MB",
            valid.language,
            valid.test_cases.len(),
            valid.time_limit_secs,
            valid.memory_limit_mb
        );

        let mut workspace = match self.prepare(&valid, &adapter).await {
            Ok(workspace) => workspace,
            Err(e) => {
                error!("Workspace setup failed: {}", e);
                return Ok(vec![ExecutionResult::failure(
                    Verdict::SystemError,
                    format!("Failed to prepare workspace: {}", e),
                )]);
            }
        };

        let results = self.judge_in(&workspace, &valid, &adapter).await;

        if let Err(e) = workspace.destroy() {
            warn!("{}", e);
        }

        let summary = JudgeSummary::from_results(&results);
        info!(
            "Judge summary: language={}, all_passed={}, verdict={}, passed={}/{}, max_time_ms={}, max_memory_kb={:?}",
            valid.language,
            summary.all_passed(),
            summary.verdict,
            summary.passed,
            summary.total,
            summary.max_time_ms,
            summary.max_memory_kb
        );

        Ok(results)
    }

    async fn prepare(
        &self,
        valid: &ValidRequest<'_>,
        adapter: &LanguageAdapter<'_>,
    ) -> Result<Workspace, WorkspaceError> {
        let workspace = self.workspaces.create()?;
        self.workspaces.write(&workspace, valid.code, adapter).await?;
        Ok(workspace)
    }

    async fn judge_in(
        &self,
        workspace: &Workspace,
        valid: &ValidRequest<'_>,
        adapter: &LanguageAdapter<'_>,
    ) -> Vec<ExecutionResult> {
        let dir = workspace.path();

        match compile_in_workspace(self.runner.as_ref(), adapter, dir, &self.compile_limits()).await {
            Ok(compiled) if compiled.success => {}
            Ok(compiled) => {
                let message = compiled
                    .message
                    .map(|m| truncate_chars(&m, MAX_COMPILE_MESSAGE_CHARS))
                    .unwrap_or_else(|| "Compilation failed".to_string());
                return valid
                    .test_cases
                    .iter()
                    .map(|_| ExecutionResult {
                        exit_code: compiled.exit_code,
                        execution_time_ms: compiled.time_ms,
                        ..ExecutionResult::failure(Verdict::CompileError, message.clone())
                    })
                    .collect();
            }
            Err(e) => {
                error!("Compiler could not be started: {}", e);
                return valid
                    .test_cases
                    .iter()
                    .map(|_| ExecutionResult::failure(Verdict::SystemError, e.to_string()))
                    .collect();
            }
        }

        let cmd = adapter.run_command(dir, valid.memory_limit_mb);
        let memory_ceiling_kb = adapter.memory_ceiling_kb(valid.memory_limit_mb);
        let limits = RunLimits::new(
            Duration::from_secs_f64(valid.time_limit_secs),
            adapter
                .resource_limits(valid.memory_limit_mb, valid.time_limit_secs)
                .with_file_size(self.config.file_size_limit_bytes),
        )
        .with_output_limit(self.config.output_limit_bytes)
        .with_memory_limit_kb(memory_ceiling_kb);

        let mut results = Vec::with_capacity(valid.test_cases.len());
        for (index, test_case) in valid.test_cases.iter().enumerate() {
            let started = Instant::now();
            let result = match self.runner.run(&cmd, &limits, &test_case.input).await {
                Ok(outcome) => judge_outcome(outcome, test_case, valid.language, memory_ceiling_kb),
                Err(e) => {
                    warn!("Test case {} could not be run: {}", index + 1, e);
                    ExecutionResult {
                        execution_time_ms: started.elapsed().as_millis() as u64,
                        ..ExecutionResult::failure(Verdict::SystemError, e.to_string())
                    }
                }
            };
            debug!(
                "Test case {}: verdict={}, time_ms={}, memory_kb={:?}, exit_code={}",
                index + 1,
                result.verdict,
                result.execution_time_ms,
                result.memory_usage_kb,
                result.exit_code
            );
            results.push(result);
        }
        results
    }

    fn compile_limits(&self) -> CompileLimits {
        CompileLimits {
            time_limit_secs: self.config.compile_time_limit_secs,
            memory_mb: self.config.compile_memory_limit_mb,
            output_limit_bytes: self.config.output_limit_bytes,
            file_size_bytes: self.config.file_size_limit_bytes,
        }
    }
}

/// Turn a finished run into a result for one test case
fn judge_outcome(
    outcome: RunOutcome,
    test_case: &TestCase,
    language: Language,
    memory_ceiling_kb: u64,
) -> ExecutionResult {
    // Checked before the exit status: a run that finished cleanly is still
    // over the limit if its sampled peak was
    let over_memory = outcome.memory_kb.is_some_and(|kb| kb > memory_ceiling_kb);

    let (verdict, error) = match outcome.status {
        RunStatus::TimedOut => (Verdict::TimeLimitExceeded, Some(TIMEOUT_MESSAGE.to_string())),
        _ if over_memory => (
            Verdict::MemoryLimitExceeded,
            Some(format!("Memory usage exceeded {}KB", memory_ceiling_kb)),
        ),
        _ if outcome.output_truncated => (
            Verdict::OutputLimitExceeded,
            Some("Output limit exceeded".to_string()),
        ),
        _ if !outcome.is_success() => {
            let verdict = if outcome.stderr.contains(language.out_of_memory_marker()) {
                Verdict::MemoryLimitExceeded
            } else {
                Verdict::RuntimeError
            };
            (verdict, Some(failure_message(&outcome)))
        }
        _ if compare_output(&outcome.stdout, &test_case.expected_output) => (Verdict::Accepted, None),
        _ => (Verdict::WrongAnswer, non_empty(&outcome.stderr)),
    };

    ExecutionResult {
        success: verdict.is_accepted(),
        verdict,
        output: normalize_output(&outcome.stdout),
        error,
        execution_time_ms: outcome.time_ms,
        memory_usage_kb: outcome.memory_kb,
        exit_code: outcome.exit_code(),
    }
}

fn failure_message(outcome: &RunOutcome) -> String {
    if let Some(stderr) = non_empty(&outcome.stderr) {
        return stderr;
    }
    match outcome.status {
        RunStatus::Signaled(sig) => format!("Process killed by signal {}", sig),
        _ => format!("Process exited with code {}", outcome.exit_code()),
    }
}

fn non_empty(s: &str) -> Option<String> {
    let trimmed = s.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}
