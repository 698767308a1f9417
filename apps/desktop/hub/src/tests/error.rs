// Unit tests for HubError

use crate::error::HubError;

use ipc_core::error::CoreError;
use ipc_core::error::ipc::IpcError;

/// **VALUE**: Verifies hub errors carry the location they were raised at.
///
/// **WHY THIS MATTERS**: The log line is often the only trace of a startup failure.
///
/// **BUG THIS CATCHES**: Would catch the location being dropped from Display.
#[test]
fn given_hub_error_when_displayed_then_includes_message_and_location() {
    let error = HubError::hub("Failed to get log directory");

    let text = error.to_string();

    assert!(text.contains("Failed to get log directory"));
    assert!(text.contains("error.rs"), "location should name this file: {text}");
}

/// **VALUE**: Verifies core errors convert without losing their text.
#[test]
fn given_ipc_error_when_converted_then_wrapped_as_core_error() {
    let ipc = IpcError::closed("Transport closed");
    let expected = ipc.to_string();

    let error = HubError::from(ipc);

    assert!(matches!(error, HubError::Core(CoreError::Ipc(_))));
    assert_eq!(error.to_string(), expected);
}
