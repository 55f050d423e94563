//! Config file loading through the public facade

use divan::{CouchStore, PurgePolicy, StoreConfig, CONFIG_FILE_NAME};
use tempfile::TempDir;

#[test]
fn test_connect_from_config_file() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join(CONFIG_FILE_NAME);
    std::fs::write(
        &path,
        r#"
database = "orders"
read_size = 25
purge = "disabled"

[server]
url = "http://couch.internal:5984"
username = "svc"
password = "pw"
"#,
    )
    .unwrap();

    let config = StoreConfig::from_file(&path).unwrap();
    let store = CouchStore::connect(&config).unwrap();
    assert_eq!(store.database(), "orders");
    assert_eq!(store.purge_policy(), PurgePolicy::Disabled);
    assert_eq!(config.server.username.as_deref(), Some("svc"));
    assert_eq!(config.server.timeout_ms, divan_gateway::DEFAULT_TIMEOUT_MS);
}

#[test]
fn test_default_config_round_trip() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join(CONFIG_FILE_NAME);
    std::fs::write(&path, StoreConfig::default_toml()).unwrap();
    let config = StoreConfig::from_file(&path).unwrap();
    assert_eq!(config, StoreConfig::new("app"));
}
