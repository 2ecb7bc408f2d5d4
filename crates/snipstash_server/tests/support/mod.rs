//! Shared integration-test server bootstrap helpers.

use async_trait::async_trait;
use axum_test::TestServer;
use snipstash_core::store::{Command, KeyValueStore, MemoryStore, Reply, StoreError};
use snipstash_server::{create_app, AppState, Config, SharedStore};
use std::sync::Arc;

/// Cheap hashing so account tests stay fast.
pub(crate) const TEST_PASSWORD_COST: u32 = 4;

pub(crate) fn test_config() -> Config {
    Config {
        port: 0,
        password_cost: TEST_PASSWORD_COST,
        ..Config::default()
    }
}

pub(crate) fn memory_store() -> SharedStore {
    Arc::new(MemoryStore::new())
}

pub(crate) fn test_server_with_stores(
    config: Config,
    current: SharedStore,
    legacy: Option<SharedStore>,
) -> TestServer {
    let state = AppState::new(config, current, legacy);
    TestServer::new(create_app(state)).expect("server")
}

pub(crate) fn test_server_for_config(config: Config) -> TestServer {
    test_server_with_stores(config, memory_store(), None)
}

pub(crate) fn setup_test_server() -> TestServer {
    test_server_for_config(test_config())
}

/// Store whose every round trip fails.
pub(crate) struct OutageStore;

#[async_trait]
impl KeyValueStore for OutageStore {
    async fn pipeline(
        &self,
        _commands: &[Command],
    ) -> Result<Vec<Result<Reply, StoreError>>, StoreError> {
        Err(StoreError::Unavailable("connection refused".to_string()))
    }
}
