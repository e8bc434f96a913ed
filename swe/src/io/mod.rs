//! Side-effecting stores and adapters.

pub mod backup;
pub mod config;
pub mod context_store;
pub mod generator;
pub mod history_store;
pub mod init;
pub mod plan_store;
pub mod process;
pub mod prompt;
