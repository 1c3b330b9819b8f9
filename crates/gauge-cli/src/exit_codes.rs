//! Process exit codes for the `gauge` binary.

pub const SUCCESS: i32 = 0;
pub const ERROR: i32 = 2; // Config, entries or evaluator construction failed
pub const INTERRUPTED: i32 = 130; // Ctrl-C, as a shell reports SIGINT
