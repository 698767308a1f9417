use crate::helpers::{eventually, fixture_store, start_client};

use ipc_core::client::ClientOptions;
use ipc_core::config::{RequestConfig, ServerOptions};
use ipc_core::error::ipc::IpcError;
use ipc_core::server::Server;
use ipc_core::store::StateStore;
use ipc_core::transport::{WsHub, connect};

use serde_json::{Value, json};

/// **VALUE**: Verifies the protocol works across real WebSocket connections.
///
/// **WHY THIS MATTERS**: In production every UI process reaches the main process
/// through the hub; the in-process bus only stands in for it.
///
/// **BUG THIS CATCHES**: Would catch:
/// - The hub not relaying client frames to the owner's channel
/// - The hub not relaying the server's responses back out
/// - Responses lost because the relay subscribed after the handshake
#[tokio::test]
async fn given_hub_when_remote_clients_register_and_dispatch_then_all_replicas_follow() {
    // GIVEN: A hub on an ephemeral port with the server on the owner channel
    let (channel, hub) = WsHub::bind("127.0.0.1:0").await.expect("bind hub");
    let server = Server::start(
        channel,
        fixture_store(),
        ServerOptions::default(),
        &RequestConfig::default(),
    );

    // GIVEN: Two clients connected over WebSocket
    let first = start_client(
        connect(&hub.url()).await.expect("connect"),
        ClientOptions::new("renderer-1"),
    );
    let second = start_client(
        connect(&hub.url()).await.expect("connect"),
        ClientOptions::new("renderer-2"),
    );

    // WHEN: Both register and one dispatches
    assert!(first.register().await.expect("register"));
    assert!(second.register().await.expect("register"));
    let return_value = first
        .dispatch_action("game-info/setGameName", json!("Celeste"), None)
        .await
        .expect("dispatch");

    // THEN: The server ran it and both replicas received the commit
    assert_eq!(return_value, Value::Bool(true));
    assert_eq!(server.server().clients().len(), 2);
    let first_store = first.store().clone();
    let second_store = second.store().clone();
    assert!(eventually(|| first_store.snapshot()["gameInfo"]["name"] == "Celeste").await);
    assert!(eventually(|| second_store.snapshot()["gameInfo"]["name"] == "Celeste").await);
}

/// **VALUE**: Verifies hub shutdown reaches connected clients as a closed transport.
///
/// **WHY THIS MATTERS**: A UI process must notice the main process going away
/// instead of waiting on requests forever.
///
/// **BUG THIS CATCHES**: Would catch relay tasks surviving shutdown, or the client
/// handler accepting new requests on a dead connection.
#[tokio::test]
async fn given_connected_client_when_hub_shuts_down_then_client_handler_closes() {
    let (channel, hub) = WsHub::bind("127.0.0.1:0").await.expect("bind hub");
    let _server = Server::start(
        channel,
        fixture_store(),
        ServerOptions::default(),
        &RequestConfig::default(),
    );
    let client = start_client(
        connect(&hub.url()).await.expect("connect"),
        ClientOptions::new("renderer-1"),
    );
    client.register().await.expect("register");

    hub.shutdown();

    let handler = client.handler().clone();
    assert!(eventually(|| handler.is_closed()).await);
    let result = client.get_store_state().await;
    assert!(result.is_err());
}

/// **VALUE**: Verifies connecting to a port with no hub is a handshake error.
#[tokio::test]
async fn given_no_hub_when_connect_then_returns_handshake_error() {
    // Bind and immediately release a port so nothing is listening on it.
    let listener = std::net::TcpListener::bind("127.0.0.1:0").expect("bind");
    let address = listener.local_addr().expect("addr");
    drop(listener);

    let result = connect(&format!("ws://{address}")).await;

    assert!(matches!(result, Err(IpcError::Handshake { .. })));
}
