//! Request and result types exchanged with the caller
//!
//! These are the only types the surrounding application sees: it hands in an
//! [`ExecutionRequest`] and receives one [`ExecutionResult`] per test case.

use serde::{Deserialize, Serialize};

use super::verdict::Verdict;

pub const DEFAULT_TIME_LIMIT_SECS: f64 = 5.0;
pub const DEFAULT_MEMORY_LIMIT_MB: u64 = 64;

fn default_time_limit() -> f64 {
    DEFAULT_TIME_LIMIT_SECS
}

fn default_memory_limit() -> u64 {
    DEFAULT_MEMORY_LIMIT_MB
}

/// A submission to be judged
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionRequest {
    pub code: String,
    /// Free-form language id, matched case-insensitively
    pub language: String,
    pub test_cases: Vec<TestCase>,
    #[serde(default = "default_time_limit")]
    pub time_limit_seconds: f64,
    #[serde(rename = "memoryLimitMB", default = "default_memory_limit")]
    pub memory_limit_mb: u64,
}

impl ExecutionRequest {
    pub fn new(code: impl Into<String>, language: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            language: language.into(),
            test_cases: Vec::new(),
            time_limit_seconds: DEFAULT_TIME_LIMIT_SECS,
            memory_limit_mb: DEFAULT_MEMORY_LIMIT_MB,
        }
    }

    pub fn with_test_case(mut self, test_case: TestCase) -> Self {
        self.test_cases.push(test_case);
        self
    }

    pub fn with_time_limit(mut self, seconds: f64) -> Self {
        self.time_limit_seconds = seconds;
        self
    }

    pub fn with_memory_limit(mut self, megabytes: u64) -> Self {
        self.memory_limit_mb = megabytes;
        self
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestCase {
    pub input: String,
    pub expected_output: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl TestCase {
    pub fn new(input: impl Into<String>, expected_output: impl Into<String>) -> Self {
        Self {
            input: input.into(),
            expected_output: expected_output.into(),
            description: None,
        }
    }
}

/// Outcome of one test case
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionResult {
    pub success: bool,
    pub verdict: Verdict,
    /// Program stdout after newline normalization and trimming
    pub output: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub execution_time_ms: u64,
    #[serde(rename = "memoryUsageKB", skip_serializing_if = "Option::is_none")]
    pub memory_usage_kb: Option<u64>,
    pub exit_code: i32,
}

impl ExecutionResult {
    /// A failed result that carries no program output
    pub fn failure(verdict: Verdict, error: impl Into<String>) -> Self {
        Self {
            success: false,
            verdict,
            output: String::new(),
            error: Some(error.into()),
            execution_time_ms: 0,
            memory_usage_kb: None,
            exit_code: -1,
        }
    }
}

/// Aggregate view over a result list, for scoring collaborators
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JudgeSummary {
    /// First non-accepted verdict, or accepted when every case passed
    pub verdict: Verdict,
    pub passed: usize,
    pub total: usize,
    pub max_time_ms: u64,
    pub max_memory_kb: Option<u64>,
}

impl JudgeSummary {
    pub fn from_results(results: &[ExecutionResult]) -> Self {
        let verdict = results
            .iter()
            .map(|r| r.verdict)
            .find(|v| !v.is_accepted())
            .unwrap_or(Verdict::Accepted);
        let passed = results.iter().filter(|r| r.success).count();
        let max_time_ms = results
            .iter()
            .map(|r| r.execution_time_ms)
            .max()
            .unwrap_or(0);
        let max_memory_kb = results.iter().filter_map(|r| r.memory_usage_kb).max();

        Self {
            verdict,
            passed,
            total: results.len(),
            max_time_ms,
            max_memory_kb,
        }
    }

    pub fn all_passed(&self) -> bool {
        self.total > 0 && self.passed == self.total
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_uses_camel_case_wire_names() {
        let json = r#"{
            "code": "print(input())",
            "language": "Python",
            "testCases": [{"input": "42", "expectedOutput": "42"}],
            "timeLimitSeconds": 5,
            "memoryLimitMB": 64
        }"#;
        let request: ExecutionRequest = serde_json::from_str(json).unwrap();

        assert_eq!(request.language, "Python");
        assert_eq!(request.test_cases.len(), 1);
        assert_eq!(request.test_cases[0].expected_output, "42");
        assert_eq!(request.time_limit_seconds, 5.0);
        assert_eq!(request.memory_limit_mb, 64);
    }

    #[test]
    fn test_request_limits_default_when_missing() {
        let json = r#"{"code": "x", "language": "cpp", "testCases": []}"#;
        let request: ExecutionRequest = serde_json::from_str(json).unwrap();

        assert_eq!(request.time_limit_seconds, DEFAULT_TIME_LIMIT_SECS);
        assert_eq!(request.memory_limit_mb, DEFAULT_MEMORY_LIMIT_MB);
    }

    #[test]
    fn test_result_serialization_omits_missing_fields() {
        let result = ExecutionResult::failure(Verdict::SystemError, "boom");
        let value = serde_json::to_value(&result).unwrap();

        assert_eq!(value["exitCode"], -1);
        assert_eq!(value["verdict"], "system_error");
        assert!(value.get("memoryUsageKB").is_none());
    }

    #[test]
    fn test_summary_reports_first_failure() {
        let mut ok = ExecutionResult::failure(Verdict::Accepted, "");
        ok.success = true;
        ok.error = None;
        ok.execution_time_ms = 12;
        ok.memory_usage_kb = Some(900);

        let mut wrong = ExecutionResult::failure(Verdict::WrongAnswer, "");
        wrong.execution_time_ms = 30;
        let timeout = ExecutionResult::failure(Verdict::TimeLimitExceeded, "Execution timeout");

        let summary = JudgeSummary::from_results(&[ok, wrong, timeout]);

        assert_eq!(summary.verdict, Verdict::WrongAnswer);
        assert_eq!(summary.passed, 1);
        assert_eq!(summary.total, 3);
        assert_eq!(summary.max_time_ms, 30);
        assert_eq!(summary.max_memory_kb, Some(900));
        assert!(!summary.all_passed());
    }

    #[test]
    fn test_summary_of_empty_list_is_not_a_pass() {
        let summary = JudgeSummary::from_results(&[]);
        assert_eq!(summary.verdict, Verdict::Accepted);
        assert!(!summary.all_passed());
    }
}
