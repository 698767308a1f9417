use crate::ErrorLocation;
use std::panic::Location;

/// **VALUE**: Verifies that `ErrorLocation::from()` captures file, line, and column.
///
/// **WHY THIS MATTERS**: Every IPC, store, and config error carries an `ErrorLocation`.
/// If it records the wrong position, a failed request in a renderer process can no
/// longer be traced back to the code that raised it.
///
/// **BUG THIS CATCHES**: Would catch if:
/// - `Location::caller()` stops being propagated correctly
/// - File path extraction breaks
/// - Line/column capture fails
#[test]
fn given_location_caller_when_error_location_created_then_captures_file_line_column() {
    // GIVEN: Current caller location
    // WHEN: Creating ErrorLocation from caller
    let location = ErrorLocation::from(Location::caller());

    // THEN: Should capture file, line, and column
    assert!(
        location.file.contains("error_location.rs"),
        "Should capture file path"
    );
    assert!(location.line > 0, "Should capture line number");
    assert!(location.column > 0, "Should capture column number");
}

/// **VALUE**: Verifies that the Display format is `[file:line:column]`.
///
/// **WHY THIS MATTERS**: Error messages are written to the hub log and carried back to
/// callers inside failed responses. A broken format makes those messages unreadable.
///
/// **BUG THIS CATCHES**: Would catch if the Display implementation drops the brackets
/// or one of the three components.
#[test]
fn given_error_location_when_formatted_then_produces_bracketed_format() {
    // GIVEN: An ErrorLocation
    let location = ErrorLocation::from(Location::caller());

    // WHEN: Formatting as string
    let formatted = format!("{}", location);

    // THEN: Should produce "[file:line:column]" format
    assert!(formatted.starts_with('['), "Should start with '['");
    assert!(formatted.ends_with(']'), "Should end with ']'");
    assert!(
        formatted.contains(&format!(":{}:{}]", location.line, location.column)),
        "Should end with line and column"
    );
    assert_eq!(
        formatted.matches(':').count(),
        2,
        "Should have exactly 2 colons"
    );
}

/// **VALUE**: Verifies that `#[track_caller]` propagation gives each call site its own line.
///
/// **WHY THIS MATTERS**: All error constructors in `ipc-core` rely on `#[track_caller]`.
/// Without it every error would point at the constructor instead of the failing call.
///
/// **BUG THIS CATCHES**: Would catch if location propagation breaks in refactoring.
#[test]
fn given_multiple_call_sites_when_capturing_location_then_each_has_unique_line() {
    // GIVEN: A helper function that captures location
    #[track_caller]
    fn capture_location() -> ErrorLocation {
        ErrorLocation::from(Location::caller())
    }

    // WHEN: Capturing location from different call sites
    let loc1 = capture_location();
    let loc2 = capture_location();

    // THEN: Should have same file but sequential line numbers
    assert_eq!(loc1.file, loc2.file, "Should have same file");
    assert_eq!(loc1.line + 1, loc2.line, "Lines should be sequential");
}
