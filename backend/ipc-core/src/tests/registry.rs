// Unit tests for the server's client registry and action table

use crate::message::{ApiVersion, ClientId, RegisterClientRequest, WindowId};
use crate::server::ClientRegistry;

use uuid::Uuid;

fn request(name: &str, actions: &[&str]) -> RegisterClientRequest {
    RegisterClientRequest {
        name: name.to_owned(),
        actions: actions.iter().map(|action| (*action).to_owned()).collect(),
        window_id: None,
    }
}

/// **VALUE**: Verifies registration creates a record with a fresh id and the current version.
///
/// **BUG THIS CATCHES**: Would catch id reuse between clients.
#[test]
fn given_two_registrations_when_registered_then_ids_are_distinct() {
    let mut registry = ClientRegistry::new();

    let first = registry.register(RegisterClientRequest {
        window_id: Some(WindowId(1)),
        ..request("renderer-1", &[])
    });
    let second = registry.register(request("renderer-2", &[]));

    assert_ne!(first.id, second.id);
    assert_eq!(first.api_version, ApiVersion::CURRENT);
    assert_eq!(first.window_id, Some(WindowId(1)));
    assert_eq!(registry.len(), 2);
}

/// **VALUE**: Verifies overlapping claims resolve to exactly one owner: the latest.
///
/// **WHY THIS MATTERS**: Forwarding looks up one owner per action.
///
/// **BUG THIS CATCHES**: Would catch the first registrant keeping ownership.
#[test]
fn given_overlapping_claims_when_registered_then_most_recent_claimant_owns_action() {
    // GIVEN: Three clients, two of which claim the same action
    let mut registry = ClientRegistry::new();
    let first = registry.register(request("renderer-1", &["settings/open", "keys/capture"]));
    let second = registry.register(request("renderer-2", &["settings/open"]));
    let _third = registry.register(request("renderer-3", &[]));

    // THEN: The latest claimant owns the shared action; the other is untouched
    assert_eq!(registry.action_owner("settings/open"), Some(second.id));
    assert_eq!(registry.action_owner("keys/capture"), Some(first.id));
    assert_eq!(registry.action_owner("game-info/setGameName"), None);
}

/// **VALUE**: Verifies the table is rebuilt from the survivors after removal.
///
/// **BUG THIS CATCHES**: Would catch incremental removal that drops the action entirely
/// instead of handing it back to the earlier claimant.
#[test]
fn given_latest_owner_when_unregistered_then_action_falls_back_to_earlier_claimant() {
    let mut registry = ClientRegistry::new();
    let first = registry.register(request("renderer-1", &["settings/open"]));
    let second = registry.register(request("renderer-2", &["settings/open", "keys/capture"]));

    let removed = registry.unregister(second.id).expect("was registered");

    assert_eq!(removed.name, "renderer-2");
    assert_eq!(registry.action_owner("settings/open"), Some(first.id));
    assert_eq!(registry.action_owner("keys/capture"), None);
    assert!(registry.get(second.id).is_none());
}

/// **VALUE**: Verifies removing an unknown id changes nothing.
#[test]
fn given_stale_id_when_unregistered_then_returns_none() {
    let mut registry = ClientRegistry::new();
    let client = registry.register(request("renderer-1", &["settings/open"]));

    let removed = registry.unregister(ClientId::from(Uuid::new_v4()));

    assert!(removed.is_none());
    assert_eq!(registry.len(), 1);
    assert_eq!(registry.action_owner("settings/open"), Some(client.id));
}
