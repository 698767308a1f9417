use crate::helpers::{Observer, QUIET, eventually, start_client, start_server};

use ipc_core::client::ClientOptions;
use ipc_core::config::ServerOptions;
use ipc_core::message::{Body, MessageType};
use ipc_core::store::StateStore;
use ipc_core::transport::LocalBus;

use serde_json::{Value, json};

fn forwarding() -> ServerOptions {
    ServerOptions {
        forward_client_actions: true,
    }
}

/// **VALUE**: Verifies an owned action runs once, on its owner, and every store follows.
///
/// **WHY THIS MATTERS**: Some actions need capabilities only one process has.
/// The owner executes them locally; the server must relay the commits without
/// the owner applying them a second time.
///
/// **BUG THIS CATCHES**: Would catch:
/// - The server executing an owned action itself
/// - Forwarded commits never reaching the canonical store
/// - The owner applying its own commits twice (count of 2)
/// - The requester's replica missing the relayed commits
#[tokio::test]
async fn given_action_owned_by_other_client_when_dispatched_then_owner_executes_once() {
    // GIVEN: Forwarding is on and renderer-1 owns counter/increment
    let bus = LocalBus::new();
    let server = start_server(&bus, forwarding());
    let owner = start_client(
        bus.connect(),
        ClientOptions::new("renderer-1").with_actions(["counter/increment"]),
    );
    let requester = start_client(bus.connect(), ClientOptions::new("renderer-2"));
    owner.register().await.expect("register owner");
    requester.register().await.expect("register requester");
    assert_eq!(
        server.server().action_owner("counter/increment"),
        owner.client_id()
    );

    // WHEN: renderer-2 dispatches the owned action
    let return_value = requester
        .dispatch_action("counter/increment", Value::Null, None)
        .await
        .expect("dispatch");

    // THEN: The owner's return value is relayed and the canonical store followed
    assert_eq!(return_value, json!(1));
    assert_eq!(server.server().store().snapshot()["count"], 1);

    // THEN: Both replicas land on 1; the owner did not re-apply the echo
    let requester_store = requester.store().clone();
    assert!(eventually(|| requester_store.snapshot()["count"] == 1).await);
    tokio::time::sleep(QUIET).await;
    assert_eq!(owner.store().snapshot()["count"], 1);
    assert_eq!(requester.store().snapshot()["count"], 1);
}

/// **VALUE**: Verifies the owner's action error is relayed to the requester.
///
/// **BUG THIS CATCHES**: Would catch the forwarded error being replaced by a
/// generic message, picking up the owner's or the server's source location on
/// the way, or the requester hanging.
#[tokio::test]
async fn given_owner_action_fails_when_forwarded_then_requester_receives_owner_error() {
    let bus = LocalBus::new();
    let server = start_server(&bus, forwarding());
    let owner = start_client(
        bus.connect(),
        ClientOptions::new("renderer-1").with_actions(["game-info/setGameName"]),
    );
    let requester = start_client(bus.connect(), ClientOptions::new("renderer-2"));
    owner.register().await.expect("register owner");
    requester.register().await.expect("register requester");

    let result = requester
        .dispatch_action("game-info/setGameName", json!(7), None)
        .await;

    let error = result.expect_err("owner refused");
    assert_eq!(
        error.remote_message(),
        Some("Action 'game-info/setGameName' failed: Game name must be a string")
    );
    assert!(server.server().store().snapshot()["gameInfo"]["name"].is_null());
}

/// **VALUE**: Verifies an owner dispatching its own action is served directly.
///
/// **BUG THIS CATCHES**: Would catch the server forwarding an action back to the
/// client that asked for it.
#[tokio::test]
async fn given_owner_dispatches_own_action_when_forwarding_enabled_then_not_forwarded() {
    // GIVEN: renderer-1 owns counter/increment and an observer watches the bus
    let bus = LocalBus::new();
    let server = start_server(&bus, forwarding());
    let owner = start_client(
        bus.connect(),
        ClientOptions::new("renderer-1").with_actions(["counter/increment"]),
    );
    owner.register().await.expect("register");
    let mut observer = Observer::attach(&bus);

    // WHEN: The owner dispatches it
    let return_value = owner
        .dispatch_action("counter/increment", Value::Null, None)
        .await
        .expect("dispatch");

    // THEN: The server executed it; no dispatch-client-action went out
    assert_eq!(return_value, json!(1));
    assert_eq!(server.server().store().snapshot()["count"], 1);
    while let Some(message) = observer.next_within(QUIET).await {
        assert_ne!(
            message.message_type(),
            Some(MessageType::DispatchClientAction)
        );
    }
    let owner_store = owner.store().clone();
    assert!(eventually(|| owner_store.snapshot()["count"] == 1).await);
}

/// **VALUE**: Verifies forwarding is off unless configured.
///
/// **BUG THIS CATCHES**: Would catch owned actions being forwarded by default.
#[tokio::test]
async fn given_forwarding_disabled_when_owned_action_dispatched_then_server_executes_it() {
    let bus = LocalBus::new();
    let server = start_server(&bus, ServerOptions::default());
    let owner = start_client(
        bus.connect(),
        ClientOptions::new("renderer-1").with_actions(["counter/increment"]),
    );
    let requester = start_client(bus.connect(), ClientOptions::new("renderer-2"));
    owner.register().await.expect("register owner");
    requester.register().await.expect("register requester");
    let mut observer = Observer::attach(&bus);

    requester
        .dispatch_action("counter/increment", Value::Null, None)
        .await
        .expect("dispatch");

    assert_eq!(server.server().store().snapshot()["count"], 1);
    let mut saw_push = false;
    while let Some(message) = observer.next_within(QUIET).await {
        assert_ne!(
            message.message_type(),
            Some(MessageType::DispatchClientAction)
        );
        if let Body::CommitMutation(commit) = &message.body {
            assert_eq!(commit.source_client_id, None);
            saw_push = true;
        }
    }
    assert!(saw_push);
    let owner_store = owner.store().clone();
    assert!(eventually(|| owner_store.snapshot()["count"] == 1).await);
}
