//! Code execution and judging engine
//!
//! Runs untrusted programs in JavaScript, Python, Java or C++ against test
//! cases under time and memory limits and reports one result per case.

pub mod checker;
pub mod compiler;
pub mod config;
pub mod core;
pub mod health;
pub mod judger;
pub mod languages;
pub mod runner;
pub mod sandbox;
pub mod validator;

pub use config::EngineConfig;
pub use core::{ExecutionRequest, ExecutionResult, JudgeSummary, TestCase, Verdict};
pub use health::HealthProber;
pub use judger::JudgeEngine;
pub use languages::Language;
pub use validator::ValidationError;
