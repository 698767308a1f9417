// Unit tests for ModuleStore

use crate::error::store::StoreError;
use crate::message::Commit;
use crate::store::{ModuleStore, StateStore};

use serde_json::{Value, json};

fn counter_store() -> ModuleStore {
    ModuleStore::builder(json!({ "count": 0 }))
        .mutation("counter/add", |state, payload, _| {
            let amount = payload
                .as_i64()
                .ok_or_else(|| StoreError::mutation("counter/add", "payload must be an integer"))?;
            let current = state["count"].as_i64().unwrap_or(0);
            state["count"] = json!(current + amount);
            Ok(())
        })
        .action("counter/addTwice", |context, payload, _| {
            context.commit("counter/add", payload.clone(), None)?;
            context.commit("counter/add", payload, None)?;
            Ok(context.state()["count"].clone())
        })
        .action("counter/addThenFail", |context, payload, _| {
            context.commit("counter/add", payload, None)?;
            Err(StoreError::action("counter/addThenFail", "refused"))
        })
        .build()
}

/// **VALUE**: Verifies an action reports its return value and the commits it made.
///
/// **WHY THIS MATTERS**: The server pushes exactly these commits to every replica.
///
/// **BUG THIS CATCHES**: Would catch commits being applied but not recorded, or
/// recorded out of order.
#[tokio::test]
async fn given_action_that_commits_when_dispatched_then_reports_commits_in_order() {
    // GIVEN: A counter store
    let store = counter_store();

    // WHEN: Dispatching an action that commits twice
    let dispatched = store
        .dispatch("counter/addTwice", json!(2), None)
        .await
        .expect("dispatch");

    // THEN: State, return value, and recorded commits agree
    assert_eq!(store.snapshot(), json!({ "count": 4 }));
    assert_eq!(dispatched.return_value, json!(4));
    assert_eq!(
        dispatched.commits,
        vec![
            Commit::new("counter/add", json!(2), None),
            Commit::new("counter/add", json!(2), None),
        ]
    );
}

/// **VALUE**: Verifies a failing action leaves no trace in the state.
///
/// **WHY THIS MATTERS**: The server reports a failed response and pushes no
/// commits; a half-applied action would make the canonical store disagree with
/// every replica.
///
/// **BUG THIS CATCHES**: Would catch commits made before the failure surviving it.
#[tokio::test]
async fn given_action_that_fails_after_commit_when_dispatched_then_state_is_restored() {
    let store = counter_store();

    let result = store.dispatch("counter/addThenFail", json!(5), None).await;

    assert!(matches!(result, Err(StoreError::Action { .. })));
    assert_eq!(store.snapshot(), json!({ "count": 0 }));
}

/// **VALUE**: Verifies unknown names are distinct errors.
///
/// **BUG THIS CATCHES**: Would catch an unknown action being treated as a no-op.
#[tokio::test]
async fn given_unknown_names_when_dispatched_or_committed_then_returns_unknown_errors() {
    let store = counter_store();

    let action = store.dispatch("counter/reset", Value::Null, None).await;
    let mutation = store.commit("counter/reset", Value::Null, None);

    assert!(matches!(action, Err(StoreError::UnknownAction { .. })));
    assert!(matches!(mutation, Err(StoreError::UnknownMutation { .. })));
}

/// **VALUE**: Verifies `replace_state` swaps the whole tree.
#[test]
fn given_snapshot_when_replace_state_then_snapshot_matches() {
    let store = counter_store();

    store.replace_state(json!({ "count": 10, "extra": true }));

    assert_eq!(store.snapshot(), json!({ "count": 10, "extra": true }));
}

/// **VALUE**: Verifies shutdown tears down the registries.
///
/// **WHY THIS MATTERS**: Work arriving while the process exits must fail loudly
/// instead of mutating a store nobody will persist.
///
/// **BUG THIS CATCHES**: Would catch dispatch still running after shutdown.
#[tokio::test]
async fn given_shut_down_store_when_dispatched_then_returns_shut_down() {
    let store = counter_store();
    assert_eq!(store.action_names(), vec!["counter/addThenFail", "counter/addTwice"]);

    store.shutdown();

    let result = store.dispatch("counter/addTwice", json!(1), None).await;
    assert!(matches!(result, Err(StoreError::ShutDown { .. })));
    assert!(store.action_names().is_empty());
    assert!(store.mutation_names().is_empty());
}

/// **VALUE**: Verifies the relayed error text is the display text minus the location.
///
/// **BUG THIS CATCHES**: Would catch `[file:line:col]` from this process ending up
/// in another participant's error message.
#[tokio::test]
async fn given_store_errors_when_message_then_matches_display_without_location() {
    let store = counter_store();

    let errors = [
        store
            .dispatch("counter/addThenFail", json!(1), None)
            .await
            .expect_err("action refuses"),
        store
            .commit("counter/add", json!("one"), None)
            .expect_err("mutation refuses"),
        store
            .dispatch("counter/reset", Value::Null, None)
            .await
            .expect_err("unknown action"),
        StoreError::shut_down(),
    ];

    for error in &errors {
        let location = match error {
            StoreError::UnknownAction { location, .. }
            | StoreError::UnknownMutation { location, .. }
            | StoreError::Action { location, .. }
            | StoreError::Mutation { location, .. }
            | StoreError::ShutDown { location } => *location,
        };
        assert_eq!(error.to_string(), format!("{} {location}", error.message()));
        assert!(!error.message().contains(&location.to_string()));
    }
    assert_eq!(errors[0].message(), "Action 'counter/addThenFail' failed: refused");
}
