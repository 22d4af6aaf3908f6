// Supervisor constants (no magic values)

/// Exit code reported when the supervisor itself classifies the run as failed
/// (spawn failure, killed process, wait error), distinct from any real exit code
pub const COMMAND_FAILED_EXIT_CODE: i32 = -10;
