//! Iterative, resumable code-generation pipeline.
//!
//! A goal is turned into a short plan, then into a bounded sequence of
//! single-file edits. Each edit is generated from the current context files
//! and conversation history, and the previous contents of every target are
//! backed up before it is overwritten. The crate is split the same way its
//! state is:
//!
//! - **[`core`]**: Pure logic (ignore patterns, fence stripping, the data
//!   model, the usage gauge). No I/O.
//! - **[`io`]**: Stores under the configuration directory, prompt rendering
//!   and the command-backed generation service.
//!
//! Orchestration modules ([`session`], [`plan`], [`implement`], [`ask`]) wire
//! the two together for the CLI commands.

pub mod ask;
pub mod core;
pub mod exit_codes;
pub mod implement;
pub mod io;
pub mod logging;
pub mod plan;
pub mod session;
#[cfg(any(test, feature = "test-support"))]
pub mod test_support;
