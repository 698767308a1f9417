//! The canonical store served by the hub.

use ipc_core::error::store::StoreError;
use ipc_core::store::ModuleStore;

use serde_json::{Value, json};

pub const SET_GAME_NAME: &str = "game-info/setGameName";
const SET_NAME: &str = "game-info/setName";

/// Initial state plus the game-info module.
pub fn canonical_store() -> ModuleStore {
    ModuleStore::builder(json!({ "gameInfo": { "name": null } }))
        .mutation(SET_NAME, |state, payload, _| {
            state["gameInfo"]["name"] = payload;
            Ok(())
        })
        .action(SET_GAME_NAME, |context, payload, _| {
            if !payload.is_string() {
                return Err(StoreError::action(SET_GAME_NAME, "Game name must be a string"));
            }
            context.commit(SET_NAME, payload, None)?;
            Ok(Value::Bool(true))
        })
        .build()
}
