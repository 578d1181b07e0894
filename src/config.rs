//! Engine configuration
//!
//! Built from defaults, an optional TOML file named by `JUDGE_CONFIG`, and
//! `JUDGE_*` environment overrides, in that order. The resulting value is
//! passed explicitly to the components that need it.

use std::fmt::Display;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use anyhow::Context;
use serde::Deserialize;

use crate::languages::Language;
use crate::validator::RequestLimits;

pub const CONFIG_PATH_ENV: &str = "JUDGE_CONFIG";

/// Process-wide ceilings for requests
pub const MAX_TIME_LIMIT_SECS: f64 = 30.0;
pub const MAX_MEMORY_LIMIT_MB: u64 = 128;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Directory under which per-request workspaces are created
    pub scratch_root: PathBuf,
    pub max_time_limit_secs: f64,
    pub max_memory_limit_mb: u64,
    /// Compile time limit in seconds (default: 30s)
    pub compile_time_limit_secs: f64,
    /// Compile memory limit in MB (default: 2048MB)
    pub compile_memory_limit_mb: u64,
    /// Per-stream cap on captured stdout/stderr
    pub output_limit_bytes: usize,
    /// Largest file a judged program may write
    pub file_size_limit_bytes: u64,
    /// Language used by the health probe
    pub health_language: Language,
    pub toolchain: Toolchain,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            scratch_root: std::env::temp_dir().join("judge-engine"),
            max_time_limit_secs: MAX_TIME_LIMIT_SECS,
            max_memory_limit_mb: MAX_MEMORY_LIMIT_MB,
            compile_time_limit_secs: 30.0,
            compile_memory_limit_mb: 2048,
            output_limit_bytes: 1024 * 1024,
            file_size_limit_bytes: 64 * 1024 * 1024,
            health_language: Language::Python,
            toolchain: Toolchain::default(),
        }
    }
}

/// Interpreter and compiler binaries, resolved through `path`
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Toolchain {
    pub node: String,
    pub python: String,
    pub java: String,
    pub javac: String,
    pub cxx: String,
    /// PATH handed to judged programs; inherits the engine's PATH when unset
    pub path: Option<String>,
}

impl Default for Toolchain {
    fn default() -> Self {
        Self {
            node: "node".into(),
            python: "python3".into(),
            java: "java".into(),
            javac: "javac".into(),
            cxx: "g++".into(),
            path: None,
        }
    }
}

impl Toolchain {
    /// PATH value for spawned programs
    pub fn search_path(&self) -> String {
        self.path
            .clone()
            .or_else(|| std::env::var("PATH").ok())
            .unwrap_or_else(|| "/usr/local/bin:/usr/bin:/bin".into())
    }
}

impl EngineConfig {
    /// Load configuration from the optional config file and the environment
    pub fn load() -> anyhow::Result<Self> {
        let mut config = match std::env::var(CONFIG_PATH_ENV) {
            Ok(path) => Self::from_file(&path)?,
            Err(_) => Self::default(),
        };
        config.apply_env()?;
        Ok(config)
    }

    pub fn from_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        Self::from_toml(&content)
            .with_context(|| format!("Invalid config file {}", path.display()))
    }

    pub fn from_toml(content: &str) -> anyhow::Result<Self> {
        Ok(toml::from_str(content)?)
    }

    fn apply_env(&mut self) -> anyhow::Result<()> {
        if let Ok(root) = std::env::var("JUDGE_SCRATCH_ROOT") {
            self.scratch_root = PathBuf::from(root);
        }
        env_override("JUDGE_MAX_TIME_LIMIT_SECS", &mut self.max_time_limit_secs)?;
        env_override("JUDGE_MAX_MEMORY_LIMIT_MB", &mut self.max_memory_limit_mb)?;
        env_override("JUDGE_OUTPUT_LIMIT_BYTES", &mut self.output_limit_bytes)?;
        env_override("JUDGE_HEALTH_LANGUAGE", &mut self.health_language)?;
        env_override("JUDGE_NODE", &mut self.toolchain.node)?;
        env_override("JUDGE_PYTHON", &mut self.toolchain.python)?;
        env_override("JUDGE_JAVA", &mut self.toolchain.java)?;
        env_override("JUDGE_JAVAC", &mut self.toolchain.javac)?;
        env_override("JUDGE_CXX", &mut self.toolchain.cxx)?;
        Ok(())
    }

    pub fn request_limits(&self) -> RequestLimits {
        RequestLimits {
            max_time_limit_secs: self.max_time_limit_secs,
            max_memory_limit_mb: self.max_memory_limit_mb,
        }
    }
}

fn env_override<T>(key: &str, slot: &mut T) -> anyhow::Result<()>
where
    T: FromStr,
    T::Err: Display,
{
    if let Ok(raw) = std::env::var(key) {
        *slot = raw
            .parse()
            .map_err(|e| anyhow::anyhow!("Invalid value for {}: {:?} ({})", key, raw, e))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_defaults_match_process_ceilings() {
        let config = EngineConfig::default();
        assert_eq!(config.max_time_limit_secs, 30.0);
        assert_eq!(config.max_memory_limit_mb, 128);
        assert_eq!(config.health_language, Language::Python);
        assert_eq!(config.toolchain.python, "python3");
    }

    #[test]
    fn test_partial_toml_keeps_other_defaults() {
        let config = EngineConfig::from_toml(
            r#"
scratch_root = "/var/tmp/judge"
health_language = "JS"

[toolchain]
cxx = "clang++"
"#,
        )
        .unwrap();

        assert_eq!(config.scratch_root, PathBuf::from("/var/tmp/judge"));
        assert_eq!(config.health_language, Language::JavaScript);
        assert_eq!(config.toolchain.cxx, "clang++");
        assert_eq!(config.toolchain.javac, "javac");
        assert_eq!(config.max_memory_limit_mb, MAX_MEMORY_LIMIT_MB);
    }

    #[test]
    fn test_unknown_health_language_is_rejected() {
        assert!(EngineConfig::from_toml(r#"health_language = "cobol""#).is_err());
    }

    #[test]
    fn test_from_file_reads_toml() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "max_time_limit_secs = 10.0\noutput_limit_bytes = 4096").unwrap();

        let config = EngineConfig::from_file(file.path()).unwrap();
        assert_eq!(config.max_time_limit_secs, 10.0);
        assert_eq!(config.output_limit_bytes, 4096);
    }

    #[test]
    fn test_missing_file_reports_path() {
        let err = EngineConfig::from_file("/nonexistent/judge.toml").unwrap_err();
        assert!(format!("{:#}", err).contains("/nonexistent/judge.toml"));
    }

    #[test]
    fn test_request_limits_follow_config() {
        let config = EngineConfig {
            max_time_limit_secs: 12.0,
            max_memory_limit_mb: 256,
            ..EngineConfig::default()
        };
        let limits = config.request_limits();
        assert_eq!(limits.max_time_limit_secs, 12.0);
        assert_eq!(limits.max_memory_limit_mb, 256);
    }
}
