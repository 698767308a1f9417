use hub::app::App;
use hub::store::{SET_GAME_NAME, canonical_store};

use ipc_core::client::{Client, ClientOptions};
use ipc_core::config::{IpcConfig, RequestConfig};
use ipc_core::message::WindowId;
use ipc_core::store::StateStore;
use ipc_core::transport::connect;

use std::sync::Arc;
use std::time::Duration;

use serde_json::{Value, json};

fn ephemeral_config() -> IpcConfig {
    let mut config = IpcConfig::default();
    config.transport.port = 0;
    config.requests = config.requests.with_timeout(Duration::from_secs(5));
    config
}

/// **VALUE**: Verifies a UI process can register with the hub and change the canonical store.
///
/// **WHY THIS MATTERS**: This is the full production path: WebSocket transport,
/// the hub's server, and its canonical store.
///
/// **BUG THIS CATCHES**: Would catch:
/// - The app serving on a different address than it reports
/// - The server not being wired to the hub owner's channel
/// - The canonical store missing the game-info module
#[tokio::test]
async fn given_running_app_when_client_dispatches_set_game_name_then_canonical_store_updated() {
    // GIVEN: The app on an ephemeral port
    let app = App::start(&ephemeral_config()).await.expect("start app");

    // GIVEN: renderer-1 connected with its own replica
    let channel = connect(&app.url()).await.expect("connect");
    let replica = Arc::new(canonical_store());
    let (client, _listener) = Client::start(
        channel,
        replica,
        ClientOptions::new("renderer-1").with_identity(WindowId(1)),
        &RequestConfig::default(),
    );

    // WHEN: It registers and dispatches
    assert!(client.register().await.expect("register"));
    let return_value = client
        .dispatch_action(SET_GAME_NAME, json!("Celeste"), None)
        .await
        .expect("dispatch");

    // THEN: The canonical store changed
    assert_eq!(return_value, Value::Bool(true));
    assert_eq!(app.store().snapshot()["gameInfo"]["name"], "Celeste");

    // THEN: A sync brings the replica in line
    client.sync_store_state().await.expect("sync");
    assert_eq!(client.store().snapshot(), app.store().snapshot());

    app.shutdown();
}

/// **VALUE**: Verifies an invalid config stops startup.
///
/// **BUG THIS CATCHES**: Would catch the hub binding a non-loopback address.
#[tokio::test]
async fn given_non_loopback_host_when_app_starts_then_returns_error() {
    let mut config = ephemeral_config();
    config.transport.host = String::from("0.0.0.0");

    let result = App::start(&config).await;

    assert!(result.is_err());
}
