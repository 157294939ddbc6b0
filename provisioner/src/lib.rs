//! bootforge provisioning library.
//!
//! This crate acquires base OS images, writes them to removable media behind
//! an explicit confirmation, overlays device-specific configuration onto the
//! boot partition, and verifies the result. It is used by the `bootforge` CLI
//! binary and can be driven programmatically with substitute collaborators.
//!
//! # Modules
//!
//! - [`artifact`] - Image references, download, integrity checks, extraction
//! - [`cli`] - Command-line argument definitions
//! - [`command`] - External command execution abstraction
//! - [`dirs`] - Directory resolution abstraction for platform-specific paths
//! - [`error`] - Failure classification and CLI error types
//! - [`guard`] - Confirmation gate for destructive operations
//! - [`lock`] - Per-medium advisory locking
//! - [`medium`] - Removable media discovery
//! - [`operator`] - Interactive prompts
//! - [`output`] - Progress and listing output
//! - [`overlay`] - Configuration bundle generation and writing
//! - [`pipeline`] - Stage orchestration and the pipeline state machine
//! - [`report`] - Run outcome and exit codes
//! - [`surface`] - Location of the mounted boot partition
//! - [`verify`] - Post-write verification engine
//! - [`writer`] - Raw block device writing

pub mod artifact;
pub mod cli;
pub mod command;
pub mod dirs;
pub mod error;
pub mod guard;
pub mod lock;
pub mod medium;
pub mod operator;
pub mod output;
pub mod overlay;
pub mod pipeline;
pub mod report;
pub mod surface;
pub mod verify;
pub mod writer;

#[cfg(any(test, feature = "test-support"))]
pub mod test_utils;
