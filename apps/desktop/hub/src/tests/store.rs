// Unit tests for the canonical store

use crate::store::{SET_GAME_NAME, canonical_store};

use ipc_core::error::store::StoreError;
use ipc_core::store::StateStore;

use serde_json::{Value, json};

/// **VALUE**: Verifies the game-info action updates state and reports its commit.
#[tokio::test]
async fn given_game_name_when_set_game_name_dispatched_then_state_updated() {
    let store = canonical_store();

    let dispatched = store
        .dispatch(SET_GAME_NAME, json!("Celeste"), None)
        .await
        .expect("dispatch");

    assert_eq!(dispatched.return_value, Value::Bool(true));
    assert_eq!(dispatched.commits.len(), 1);
    assert_eq!(store.snapshot()["gameInfo"]["name"], "Celeste");
}

/// **VALUE**: Verifies a bad payload is refused without touching state.
#[tokio::test]
async fn given_non_string_payload_when_set_game_name_dispatched_then_refused() {
    let store = canonical_store();

    let result = store.dispatch(SET_GAME_NAME, json!(1), None).await;

    assert!(matches!(result, Err(StoreError::Action { .. })));
    assert!(store.snapshot()["gameInfo"]["name"].is_null());
}
