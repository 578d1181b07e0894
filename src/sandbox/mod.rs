//! Sandbox module - Workspace and resource-limit plumbing
//!
//! This module handles:
//! - Per-request workspace creation and guaranteed removal
//! - Kernel resource limits applied to judged programs
//!
//! The sandbox module does NOT:
//! - Spawn or wait on processes (that's the runner's job)
//! - Know about languages beyond the adapter's source file name
//! - Interpret verdicts

pub mod limits;
pub mod workspace;

// Re-exports for convenience
pub use limits::ResourceLimits;
pub use workspace::{remove_workspace_dir, Workspace, WorkspaceError, WorkspaceManager};
