// Unit tests for logger module initialization logic
// Tests focus on idempotence and error handling

use crate::logger::{LOG_FILE_NAME, initialize};

use std::path::PathBuf;

use tempfile::TempDir;

/// **VALUE**: Verifies that calling initialize() multiple times doesn't panic or fail.
///
/// **WHY THIS MATTERS**: Startup code and tests may both try to install the logger.
/// A second call must not crash the hub.
///
/// **BUG THIS CATCHES**: Would catch if the Once or AtomicBool guards are removed,
/// causing fern to fail when setting a global logger twice.
#[test]
fn given_logger_initialized_when_called_again_then_returns_ok() {
    // GIVEN: A valid temporary directory
    let temp_dir = TempDir::new().expect("temp dir");

    // WHEN: Calling initialize twice
    let first = initialize(temp_dir.path());
    let second = initialize(temp_dir.path());

    // THEN: Both return Ok
    assert!(first.is_ok(), "First initialization should succeed");
    assert!(second.is_ok(), "Second initialization should be a no-op");
}

/// **VALUE**: Verifies the error path when the log file cannot be created.
///
/// **BUG THIS CATCHES**: Would catch `fern::log_file()` being unwrapped instead of
/// mapped to [`crate::error::HubError::Hub`].
#[test]
fn given_invalid_log_dir_when_internal_initialize_then_file_error_is_reported() {
    // GIVEN: A path that can never hold a file
    let invalid_dir = PathBuf::from("/dev/null/invalid-path");

    // WHEN: Trying to create the log file there
    let result = fern::log_file(invalid_dir.join(LOG_FILE_NAME));

    // THEN: The failure surfaces as an error
    assert!(result.is_err(), "Log file creation should fail");
}
