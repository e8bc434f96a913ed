//! Stable exit codes for `swe` commands.

/// Command succeeded, or an implement run stopped because the service said it was done.
pub const OK: i32 = 0;
/// Invalid configuration, unreadable stores, bad arguments or other errors.
pub const INVALID: i32 = 1;
/// An implement run was aborted by a service, response or write failure.
pub const INCOMPLETE: i32 = 2;
/// An implement run hit `max_iterations` while more files were requested.
pub const MAX_ITERATIONS: i32 = 3;
