//! Language adapters for compilation and execution
//!
//! The set of languages is closed: every adapter property is an exhaustive
//! match on [`Language`], and unknown ids are rejected rather than defaulted.

use std::fmt;
use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::Toolchain;
use crate::runner::CommandSpec;
use crate::sandbox::ResourceLimits;

/// Supported programming languages
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Language {
    JavaScript,
    Python,
    Java,
    Cpp,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Unsupported language: {0}")]
pub struct UnknownLanguage(pub String);

impl Language {
    pub const ALL: [Language; 4] = [
        Language::JavaScript,
        Language::Python,
        Language::Java,
        Language::Cpp,
    ];

    /// Canonical language id
    pub fn as_str(&self) -> &'static str {
        match self {
            Language::JavaScript => "javascript",
            Language::Python => "python",
            Language::Java => "java",
            Language::Cpp => "cpp",
        }
    }

    /// Get all supported language names
    pub fn supported() -> Vec<&'static str> {
        Self::ALL.iter().map(|l| l.as_str()).collect()
    }

    /// Marker a runtime prints to stderr when it runs out of memory
    pub fn out_of_memory_marker(&self) -> &'static str {
        match self {
            Language::JavaScript => "heap out of memory",
            Language::Python => "MemoryError",
            Language::Java => "OutOfMemoryError",
            Language::Cpp => "std::bad_alloc",
        }
    }
}

impl FromStr for Language {
    type Err = UnknownLanguage;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "javascript" | "js" | "node" => Ok(Language::JavaScript),
            "python" | "py" | "python3" => Ok(Language::Python),
            "java" => Ok(Language::Java),
            "cpp" | "c++" | "cc" => Ok(Language::Cpp),
            _ => Err(UnknownLanguage(s.to_string())),
        }
    }
}

impl TryFrom<String> for Language {
    type Error = UnknownLanguage;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Language> for String {
    fn from(language: Language) -> Self {
        language.as_str().to_string()
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Resolves languages to adapters bound to the configured toolchain
#[derive(Debug, Clone)]
pub struct LanguageRegistry {
    toolchain: Toolchain,
}

impl LanguageRegistry {
    pub fn new(toolchain: Toolchain) -> Self {
        Self { toolchain }
    }

    pub fn adapter(&self, language: Language) -> LanguageAdapter<'_> {
        LanguageAdapter {
            language,
            toolchain: &self.toolchain,
        }
    }
}

/// File naming, commands, and memory policy for one language
#[derive(Debug, Clone, Copy)]
pub struct LanguageAdapter<'a> {
    language: Language,
    toolchain: &'a Toolchain,
}

/// Address space headroom for interpreter or libc baseline, in MB
const PYTHON_ADDRESS_SPACE_BONUS_MB: u64 = 64;
const NATIVE_ADDRESS_SPACE_BONUS_MB: u64 = 32;
/// Resident baseline of a JVM or V8 isolate before user code allocates
const MANAGED_RUNTIME_RSS_BONUS_MB: u64 = 32;

impl<'a> LanguageAdapter<'a> {
    pub fn language(&self) -> Language {
        self.language
    }

    /// Name of the source file inside the workspace
    pub fn source_file(&self) -> &'static str {
        match self.language {
            Language::JavaScript => "solution.js",
            Language::Python => "solution.py",
            Language::Java => "Solution.java",
            Language::Cpp => "solution.cpp",
        }
    }

    /// Compile step, if the language has one
    pub fn compile_command(&self, dir: &Path, memory_mb: u64) -> Option<CommandSpec> {
        let source = dir.join(self.source_file());
        let cmd = match self.language {
            Language::JavaScript | Language::Python => return None,
            Language::Java => CommandSpec::new(&self.toolchain.javac).with_args([
                format!("-J-Xmx{}m", memory_mb),
                "-encoding".to_string(),
                "UTF-8".to_string(),
                "-d".to_string(),
                path_arg(dir),
                path_arg(&source),
            ]),
            Language::Cpp => CommandSpec::new(&self.toolchain.cxx).with_args([
                "-O2".to_string(),
                "-std=c++17".to_string(),
                "-o".to_string(),
                path_arg(&dir.join(CPP_BINARY)),
                path_arg(&source),
            ]),
        };
        Some(self.with_base_env(cmd, dir))
    }

    /// Command that runs the (compiled) solution
    pub fn run_command(&self, dir: &Path, memory_mb: u64) -> CommandSpec {
        let cmd = match self.language {
            Language::JavaScript => CommandSpec::new(&self.toolchain.node).with_args([
                format!("--max-old-space-size={}", memory_mb),
                path_arg(&dir.join(self.source_file())),
            ]),
            Language::Python => CommandSpec::new(&self.toolchain.python)
                .with_args([path_arg(&dir.join(self.source_file()))]),
            Language::Java => CommandSpec::new(&self.toolchain.java).with_args([
                format!("-Xmx{}m", memory_mb),
                "-XX:+UseSerialGC".to_string(),
                "-cp".to_string(),
                path_arg(dir),
                "Solution".to_string(),
            ]),
            Language::Cpp => CommandSpec::new(path_arg(&dir.join(CPP_BINARY))),
        };
        self.with_base_env(cmd, dir)
    }

    /// Address space cap for a run, or `None` when the runtime caps its own
    /// heap through command-line flags (JVM and V8 reserve large virtual
    /// ranges at startup and fail under RLIMIT_AS).
    pub fn address_space_mb(&self, memory_mb: u64) -> Option<u64> {
        match self.language {
            Language::Python => Some(memory_mb + PYTHON_ADDRESS_SPACE_BONUS_MB),
            Language::Cpp => Some(memory_mb + NATIVE_ADDRESS_SPACE_BONUS_MB),
            Language::JavaScript | Language::Java => None,
        }
    }

    /// Resident memory a run may reach before it is killed and judged
    /// `memory_limit_exceeded`
    pub fn memory_ceiling_kb(&self, memory_mb: u64) -> u64 {
        let bonus_mb = match self.language {
            Language::JavaScript | Language::Java => MANAGED_RUNTIME_RSS_BONUS_MB,
            Language::Python | Language::Cpp => 0,
        };
        (memory_mb + bonus_mb) * 1024
    }

    /// Address space cap for the compile step
    pub fn compile_address_space_mb(&self, memory_mb: u64) -> Option<u64> {
        match self.language {
            Language::Cpp => Some(memory_mb),
            Language::JavaScript | Language::Python | Language::Java => None,
        }
    }

    /// Kernel limits for one run of the solution
    pub fn resource_limits(&self, memory_mb: u64, time_limit_secs: f64) -> ResourceLimits {
        let limits = ResourceLimits::default().with_cpu_time(time_limit_secs);
        match self.address_space_mb(memory_mb) {
            Some(mb) => limits.with_address_space_mb(mb),
            None => limits,
        }
    }

    fn with_base_env(&self, cmd: CommandSpec, dir: &Path) -> CommandSpec {
        let mut cmd = cmd
            .with_env("PATH", self.toolchain.search_path())
            .with_env("HOME", path_arg(dir))
            .with_env("LANG", "C.UTF-8")
            .with_work_dir(dir);
        if self.language == Language::Java {
            if let Ok(java_home) = std::env::var("JAVA_HOME") {
                cmd = cmd.with_env("JAVA_HOME", java_home);
            }
        }
        cmd
    }
}

const CPP_BINARY: &str = "solution";

fn path_arg(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn registry() -> LanguageRegistry {
        LanguageRegistry::new(Toolchain::default())
    }

    #[test]
    fn test_parse_is_case_insensitive() {
        assert_eq!("JavaScript".parse::<Language>().unwrap(), Language::JavaScript);
        assert_eq!("PYTHON".parse::<Language>().unwrap(), Language::Python);
        assert_eq!(" cpp ".parse::<Language>().unwrap(), Language::Cpp);
    }

    #[test]
    fn test_parse_aliases() {
        assert_eq!("py".parse::<Language>().unwrap(), Language::Python);
        assert_eq!("node".parse::<Language>().unwrap(), Language::JavaScript);
        assert_eq!("C++".parse::<Language>().unwrap(), Language::Cpp);
    }

    #[test]
    fn test_unknown_language_is_rejected() {
        let err = "ruby".parse::<Language>().unwrap_err();
        assert_eq!(err, UnknownLanguage("ruby".to_string()));
        assert!("".parse::<Language>().is_err());
    }

    #[test]
    fn test_serde_uses_canonical_ids() {
        assert_eq!(serde_json::to_string(&Language::Cpp).unwrap(), "\"cpp\"");
        let lang: Language = serde_json::from_str("\"Python3\"").unwrap();
        assert_eq!(lang, Language::Python);
        assert!(serde_json::from_str::<Language>("\"brainfuck\"").is_err());
    }

    #[test]
    fn test_supported_lists_every_language() {
        assert_eq!(Language::supported(), vec!["javascript", "python", "java", "cpp"]);
    }

    #[test]
    fn test_python_run_command() {
        let dir = PathBuf::from("/work/run-1");
        let cmd = registry().adapter(Language::Python).run_command(&dir, 64);

        assert_eq!(cmd.to_vec(), vec!["python3", "/work/run-1/solution.py"]);
        assert_eq!(cmd.work_dir.as_deref(), Some(dir.as_path()));
        assert!(cmd.env.iter().any(|(k, v)| k == "HOME" && v == "/work/run-1"));
    }

    #[test]
    fn test_javascript_caps_heap_by_flag() {
        let dir = PathBuf::from("/w");
        let registry = registry();
        let adapter = registry.adapter(Language::JavaScript);

        assert_eq!(
            adapter.run_command(&dir, 64).to_vec(),
            vec!["node", "--max-old-space-size=64", "/w/solution.js"]
        );
        assert_eq!(adapter.address_space_mb(64), None);
        assert!(adapter.compile_command(&dir, 2048).is_none());
    }

    #[test]
    fn test_java_compiles_then_runs_from_classpath() {
        let dir = PathBuf::from("/w");
        let registry = registry();
        let adapter = registry.adapter(Language::Java);

        assert_eq!(adapter.source_file(), "Solution.java");
        let compile = adapter.compile_command(&dir, 512).unwrap();
        assert_eq!(compile.program, "javac");
        assert!(compile.args.contains(&"-J-Xmx512m".to_string()));
        assert_eq!(compile.args.last().unwrap(), "/w/Solution.java");

        let run = adapter.run_command(&dir, 128).to_vec();
        assert_eq!(run[0], "java");
        assert!(run.contains(&"-Xmx128m".to_string()));
        assert_eq!(&run[run.len() - 3..], &["-cp", "/w", "Solution"]);
    }

    #[test]
    fn test_cpp_runs_compiled_binary() {
        let dir = PathBuf::from("/w");
        let registry = registry();
        let adapter = registry.adapter(Language::Cpp);

        let compile = adapter.compile_command(&dir, 2048).unwrap().to_vec();
        assert_eq!(
            compile,
            vec!["g++", "-O2", "-std=c++17", "-o", "/w/solution", "/w/solution.cpp"]
        );
        assert_eq!(adapter.run_command(&dir, 64).to_vec(), vec!["/w/solution"]);
        assert_eq!(adapter.address_space_mb(64), Some(96));
        assert_eq!(adapter.compile_address_space_mb(2048), Some(2048));
    }

    #[test]
    fn test_resource_limits_follow_memory_policy() {
        let registry = registry();

        let python = registry.adapter(Language::Python).resource_limits(64, 2.0);
        assert_eq!(python.address_space_bytes, Some(128 * 1024 * 1024));
        assert_eq!(python.cpu_time_secs, 3);

        let java = registry.adapter(Language::Java).resource_limits(64, 0.5);
        assert_eq!(java.address_space_bytes, None);
        assert_eq!(java.cpu_time_secs, 2);
    }

    #[test]
    fn test_memory_ceiling_allows_managed_runtime_baseline() {
        let registry = registry();
        assert_eq!(registry.adapter(Language::Python).memory_ceiling_kb(64), 64 * 1024);
        assert_eq!(registry.adapter(Language::Cpp).memory_ceiling_kb(64), 64 * 1024);
        assert_eq!(registry.adapter(Language::JavaScript).memory_ceiling_kb(64), 96 * 1024);
        assert_eq!(registry.adapter(Language::Java).memory_ceiling_kb(128), 160 * 1024);
    }

    #[test]
    fn test_custom_toolchain_paths() {
        let toolchain = Toolchain {
            python: "/opt/python/bin/python3.12".into(),
            path: Some("/opt/python/bin".into()),
            ..Toolchain::default()
        };
        let registry = LanguageRegistry::new(toolchain);
        let cmd = registry
            .adapter(Language::Python)
            .run_command(Path::new("/w"), 64);

        assert_eq!(cmd.program, "/opt/python/bin/python3.12");
        assert!(cmd.env.contains(&("PATH".to_string(), "/opt/python/bin".to_string())));
    }
}
