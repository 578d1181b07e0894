//! Request validation
//!
//! Runs before anything touches the filesystem or spawns a process. Checks
//! happen in a fixed order and the first failure is returned.

use thiserror::Error;

use crate::config::{MAX_MEMORY_LIMIT_MB, MAX_TIME_LIMIT_SECS};
use crate::core::{ExecutionRequest, TestCase};
use crate::languages::Language;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("Code must not be empty")]
    EmptyCode,
    #[error("Unsupported language: {0}")]
    UnsupportedLanguage(String),
    #[error("At least one test case is required")]
    NoTestCases,
    #[error("Time limit must be a positive number of seconds")]
    InvalidTimeLimit,
    #[error("Time limit {requested}s exceeds the maximum of {max}s")]
    TimeLimitExceeded { requested: f64, max: f64 },
    #[error("Memory limit must be a positive number of megabytes")]
    InvalidMemoryLimit,
    #[error("Memory limit {requested}MB exceeds the maximum of {max}MB")]
    MemoryLimitExceeded { requested: u64, max: u64 },
}

/// Process-wide ceilings a request is checked against
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RequestLimits {
    pub max_time_limit_secs: f64,
    pub max_memory_limit_mb: u64,
}

impl Default for RequestLimits {
    fn default() -> Self {
        Self {
            max_time_limit_secs: MAX_TIME_LIMIT_SECS,
            max_memory_limit_mb: MAX_MEMORY_LIMIT_MB,
        }
    }
}

/// A request that passed validation, with its language resolved
#[derive(Debug, Clone, Copy)]
pub struct ValidRequest<'a> {
    pub code: &'a str,
    pub language: Language,
    pub test_cases: &'a [TestCase],
    pub time_limit_secs: f64,
    pub memory_limit_mb: u64,
}

pub fn validate<'a>(
    request: &'a ExecutionRequest,
    limits: &RequestLimits,
) -> Result<ValidRequest<'a>, ValidationError> {
    if request.code.trim().is_empty() {
        return Err(ValidationError::EmptyCode);
    }

    let language: Language = request
        .language
        .parse()
        .map_err(|_| ValidationError::UnsupportedLanguage(request.language.clone()))?;

    if request.test_cases.is_empty() {
        return Err(ValidationError::NoTestCases);
    }

    let time_limit = request.time_limit_seconds;
    if !time_limit.is_finite() || time_limit <= 0.0 {
        return Err(ValidationError::InvalidTimeLimit);
    }
    if time_limit > limits.max_time_limit_secs {
        return Err(ValidationError::TimeLimitExceeded {
            requested: time_limit,
            max: limits.max_time_limit_secs,
        });
    }

    if request.memory_limit_mb == 0 {
        return Err(ValidationError::InvalidMemoryLimit);
    }
    if request.memory_limit_mb > limits.max_memory_limit_mb {
        return Err(ValidationError::MemoryLimitExceeded {
            requested: request.memory_limit_mb,
            max: limits.max_memory_limit_mb,
        });
    }

    Ok(ValidRequest {
        code: &request.code,
        language,
        test_cases: &request.test_cases,
        time_limit_secs: time_limit,
        memory_limit_mb: request.memory_limit_mb,
    })
}
