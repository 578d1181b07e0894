//! Kernel resource limits for judged programs
//!
//! Limits are applied in the child between fork and exec, so they bind the
//! judged program and everything it spawns but never the engine itself.

use nix::sys::resource::{setrlimit, Resource};

/// Resource limits for sandbox execution
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResourceLimits {
    /// Virtual address space cap in bytes; `None` for managed runtimes that
    /// enforce their own heap limit
    pub address_space_bytes: Option<u64>,
    /// CPU time in seconds; the wall-clock deadline normally fires first
    pub cpu_time_secs: u64,
    /// Maximum open files
    pub open_files: u64,
    /// Maximum size of any file the program writes
    pub file_size_bytes: u64,
}

impl Default for ResourceLimits {
    fn default() -> Self {
        Self {
            address_space_bytes: None,
            cpu_time_secs: 10,
            open_files: 256,
            file_size_bytes: 64 * 1024 * 1024,
        }
    }
}

impl ResourceLimits {
    pub fn with_address_space_mb(mut self, megabytes: u64) -> Self {
        self.address_space_bytes = Some(megabytes * 1024 * 1024);
        self
    }

    /// CPU backstop one second above the rounded-up wall-clock limit
    pub fn with_cpu_time(mut self, wall_secs: f64) -> Self {
        self.cpu_time_secs = wall_secs.max(0.0).ceil() as u64 + 1;
        self
    }

    pub fn with_file_size(mut self, bytes: u64) -> Self {
        self.file_size_bytes = bytes;
        self
    }

    /// Apply the limits to the calling process.
    ///
    /// Runs inside `pre_exec`: only async-signal-safe calls are allowed here.
    pub fn apply(&self) -> std::io::Result<()> {
        if let Some(bytes) = self.address_space_bytes {
            setrlimit(Resource::RLIMIT_AS, bytes, bytes)?;
        }
        // Soft limit delivers SIGXCPU, the hard limit one second later SIGKILL
        setrlimit(
            Resource::RLIMIT_CPU,
            self.cpu_time_secs,
            self.cpu_time_secs + 1,
        )?;
        setrlimit(Resource::RLIMIT_CORE, 0, 0)?;
        setrlimit(
            Resource::RLIMIT_FSIZE,
            self.file_size_bytes,
            self.file_size_bytes,
        )?;
        setrlimit(Resource::RLIMIT_NOFILE, self.open_files, self.open_files)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cpu_backstop_rounds_up() {
        assert_eq!(ResourceLimits::default().with_cpu_time(1.0).cpu_time_secs, 2);
        assert_eq!(ResourceLimits::default().with_cpu_time(0.2).cpu_time_secs, 2);
        assert_eq!(ResourceLimits::default().with_cpu_time(2.5).cpu_time_secs, 4);
    }

    #[test]
    fn test_address_space_in_bytes() {
        let limits = ResourceLimits::default().with_address_space_mb(64);
        assert_eq!(limits.address_space_bytes, Some(64 * 1024 * 1024));
    }

    #[test]
    fn test_default_leaves_address_space_open() {
        assert_eq!(ResourceLimits::default().address_space_bytes, None);
    }
}
