//! Core data types shared by every stage of the engine

pub mod models;
pub mod utils;
pub mod verdict;

pub use models::{ExecutionRequest, ExecutionResult, JudgeSummary, TestCase};
pub use verdict::Verdict;
