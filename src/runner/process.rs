//! Process runner implementation
//!
//! Spawns the program as the leader of a fresh process group, applies rlimits
//! before exec, feeds stdin and drains stdout/stderr on their own tasks, and
//! races process exit against the wall-clock deadline. Peak RSS is sampled
//! while the race runs and the group is killed once it passes the memory
//! ceiling. Whichever way the race ends, the whole process group is killed
//! before `run` returns.

use std::os::unix::process::ExitStatusExt;
use std::process::{ExitStatus, Stdio};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use nix::errno::Errno;
use nix::sys::signal::{killpg, Signal};
use nix::unistd::Pid;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tokio::process::Command;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use super::{CommandSpec, RunError, RunLimits, RunOutcome, RunStatus, Runner};
use crate::core::utils::lossy_string;

const MEMORY_SAMPLE_INTERVAL: Duration = Duration::from_millis(10);
/// How long to wait for output pipes to close after the group is gone
const DRAIN_GRACE: Duration = Duration::from_millis(500);

/// Runner that executes programs as local child processes
#[derive(Debug, Clone, Default)]
pub struct ProcessRunner;

impl ProcessRunner {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Runner for ProcessRunner {
    async fn run(
        &self,
        cmd: &CommandSpec,
        limits: &RunLimits,
        stdin: &str,
    ) -> Result<RunOutcome, RunError> {
        debug!(
            "Running {:?} (time limit {:?}, limits {:?})",
            cmd.to_vec(),
            limits.time_limit,
            limits.resources
        );

        let mut command = Command::new(&cmd.program);
        command
            .args(&cmd.args)
            .env_clear()
            .envs(cmd.env.iter().map(|(k, v)| (k.as_str(), v.as_str())))
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .process_group(0);
        if let Some(dir) = &cmd.work_dir {
            command.current_dir(dir);
        }

        let resources = limits.resources;
        // SAFETY: the hook only calls setrlimit, which is async-signal-safe.
        unsafe {
            command.pre_exec(move || resources.apply());
        }

        let start = Instant::now();
        let mut child = command.spawn().map_err(|source| RunError::Spawn {
            program: cmd.program.clone(),
            source,
        })?;
        let pid = child.id();
        let group = ProcessGroup::new(pid);

        let writer = child.stdin.take().map(|mut pipe| {
            let input = stdin.to_owned();
            tokio::spawn(async move {
                // The program may exit without reading its input
                if let Err(e) = pipe.write_all(input.as_bytes()).await {
                    debug!("Stopped writing stdin: {}", e);
                }
            })
        });
        let stdout_reader = child
            .stdout
            .take()
            .map(|pipe| Drain::spawn(pipe, limits.output_limit_bytes));
        let stderr_reader = child
            .stderr
            .take()
            .map(|pipe| Drain::spawn(pipe, limits.output_limit_bytes));

        let deadline = tokio::time::sleep(limits.time_limit);
        tokio::pin!(deadline);
        let mut sampler = tokio::time::interval(MEMORY_SAMPLE_INTERVAL);
        let mut peak_kb: Option<u64> = None;
        let mut memory_killed = false;

        let exited = loop {
            tokio::select! {
                status = child.wait() => break Some(status?),
                _ = &mut deadline => break None,
                _ = sampler.tick() => {
                    if let Some(kb) = pid.and_then(peak_rss_kb) {
                        peak_kb = Some(peak_kb.map_or(kb, |peak| peak.max(kb)));
                    }
                    if !memory_killed && exceeds(peak_kb, limits.memory_limit_kb) {
                        warn!(
                            "Process {:?} exceeded {:?}KB resident memory; killing its process group",
                            pid, limits.memory_limit_kb
                        );
                        group.kill();
                        memory_killed = true;
                    }
                }
            }
        };

        let status = match exited {
            Some(status) => exit_status(status),
            None => {
                warn!(
                    "Process {:?} exceeded {:?}; killing its process group",
                    pid, limits.time_limit
                );
                group.kill();
                if let Err(e) = child.kill().await {
                    debug!("Failed to reap timed out process: {}", e);
                }
                RunStatus::TimedOut
            }
        };
        let time_ms = start.elapsed().as_millis() as u64;

        // Background descendants must not outlive the run
        group.kill();
        if let Some(writer) = writer {
            writer.abort();
        }
        let stdout = collect(stdout_reader).await;
        let stderr = collect(stderr_reader).await;

        Ok(RunOutcome {
            status,
            stdout: lossy_string(&stdout.data),
            stderr: lossy_string(&stderr.data),
            time_ms,
            memory_kb: peak_kb,
            output_truncated: stdout.truncated || stderr.truncated,
        })
    }
}

/// Handle on the child's process group; kills the group when dropped so a
/// cancelled run leaves nothing behind.
struct ProcessGroup {
    pgid: Option<Pid>,
}

impl ProcessGroup {
    fn new(leader: Option<u32>) -> Self {
        Self {
            pgid: leader.map(|pid| Pid::from_raw(pid as i32)),
        }
    }

    fn kill(&self) {
        let Some(pgid) = self.pgid else {
            return;
        };
        match killpg(pgid, Signal::SIGKILL) {
            Ok(()) | Err(Errno::ESRCH) => {}
            Err(e) => warn!("Failed to kill process group {}: {}", pgid, e),
        }
    }
}

impl Drop for ProcessGroup {
    fn drop(&mut self) {
        self.kill();
    }
}

#[derive(Debug, Default)]
struct Captured {
    data: Vec<u8>,
    truncated: bool,
}

/// Output drained by a background task into a buffer the runner can still
/// read if the task has to be abandoned
struct Drain {
    handle: JoinHandle<std::io::Result<()>>,
    sink: Arc<Mutex<Captured>>,
}

impl Drain {
    fn spawn<R>(reader: R, cap: usize) -> Self
    where
        R: AsyncRead + Unpin + Send + 'static,
    {
        let sink = Arc::new(Mutex::new(Captured::default()));
        let handle = tokio::spawn(read_capped(reader, cap, Arc::clone(&sink)));
        Self { handle, sink }
    }
}

fn lock(sink: &Mutex<Captured>) -> MutexGuard<'_, Captured> {
    sink.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Read a stream to EOF, keeping at most `cap` bytes
async fn read_capped<R>(mut reader: R, cap: usize, sink: Arc<Mutex<Captured>>) -> std::io::Result<()>
where
    R: AsyncRead + Unpin,
{
    let mut buf = [0u8; 8192];
    loop {
        let n = reader.read(&mut buf).await?;
        if n == 0 {
            return Ok(());
        }
        let mut captured = lock(&sink);
        let room = cap.saturating_sub(captured.data.len());
        if n > room {
            captured.truncated = true;
        }
        captured.data.extend_from_slice(&buf[..n.min(room)]);
    }
}

/// Wait for a drain to finish; past the grace period, keep what was read so far
async fn collect(drain: Option<Drain>) -> Captured {
    let Some(mut drain) = drain else {
        return Captured::default();
    };
    match tokio::time::timeout(DRAIN_GRACE, &mut drain.handle).await {
        Ok(Ok(Ok(()))) => {}
        Ok(Ok(Err(e))) => warn!("Failed to read program output: {}", e),
        Ok(Err(e)) => warn!("Output reader task failed: {}", e),
        Err(_) => {
            warn!("Output pipe held open by a process outside the group; keeping partial output");
            drain.handle.abort();
        }
    }
    let out = std::mem::take(&mut *lock(&drain.sink));
    out
}

fn exceeds(peak_kb: Option<u64>, limit_kb: Option<u64>) -> bool {
    matches!((peak_kb, limit_kb), (Some(peak), Some(limit)) if peak > limit)
}

fn exit_status(status: ExitStatus) -> RunStatus {
    match (status.code(), status.signal()) {
        (Some(code), _) => RunStatus::Exited(code),
        (None, Some(sig)) => RunStatus::Signaled(sig),
        (None, None) => RunStatus::Exited(0),
    }
}

/// Peak resident set size of a live process, from `/proc/<pid>/status`
#[cfg(target_os = "linux")]
fn peak_rss_kb(pid: u32) -> Option<u64> {
    let status = std::fs::read_to_string(format!("/proc/{}/status", pid)).ok()?;
    parse_vm_hwm(&status)
}

#[cfg(not(target_os = "linux"))]
fn peak_rss_kb(_pid: u32) -> Option<u64> {
    None
}

#[cfg_attr(not(target_os = "linux"), allow(dead_code))]
fn parse_vm_hwm(status: &str) -> Option<u64> {
    status
        .lines()
        .find_map(|line| line.strip_prefix("VmHWM:"))
        .and_then(|rest| rest.trim().trim_end_matches("kB").trim().parse().ok())
}
