//! Integration tests for the database registry.
//!
//! These tests run against file-backed SQLite databases so that every
//! connection leased from a pool sees the same data.

use dbkit::{DatabaseRegistry, DbError, MASTER, RegistryConfig, SqlValue};
use tempfile::TempDir;

/// Build a registry over file-backed SQLite databases, one per given name.
async fn setup_registry(names: &[&str]) -> (DatabaseRegistry, TempDir) {
    let dir = TempDir::new().expect("Failed to create temp dir");
    let specs: Vec<String> = names
        .iter()
        .map(|name| {
            let path = dir.path().join(format!("{name}.db"));
            format!("{}=sqlite:{}", name, path.display())
        })
        .collect();
    let config = RegistryConfig::from_specs(&specs).expect("Failed to parse specs");

    let registry = DatabaseRegistry::new();
    registry
        .init_default(&config)
        .await
        .expect("Failed to initialize registry");
    (registry, dir)
}

#[tokio::test]
async fn test_init_builds_pool_per_database() {
    let (registry, _dir) = setup_registry(&[MASTER, "logs", "archive"]).await;

    let mut names = registry.database_names();
    names.sort_unstable();
    assert_eq!(names, vec!["archive", "logs", MASTER]);

    for name in [MASTER, "logs", "archive"] {
        assert!(registry.pool(name).is_ok(), "missing pool for '{name}'");
    }
    registry.close_all().await;
}

#[tokio::test]
async fn test_second_init_keeps_first_configuration() {
    let (registry, dir) = setup_registry(&[MASTER]).await;

    let extra = dir.path().join("extra.db");
    let second =
        RegistryConfig::from_specs(&[format!("extra=sqlite:{}", extra.display())]).unwrap();
    registry
        .init_default(&second)
        .await
        .expect("Repeat init should be a no-op, not an error");

    assert_eq!(registry.database_names(), vec![MASTER]);
    assert!(matches!(
        registry.pool("extra"),
        Err(DbError::UnknownDatabase { .. })
    ));
    registry.close_all().await;
}

#[tokio::test]
async fn test_unknown_database_name() {
    let (registry, _dir) = setup_registry(&[MASTER]).await;

    match registry.pool("reporting") {
        Err(DbError::UnknownDatabase { name }) => assert_eq!(name, "reporting"),
        other => panic!("expected UnknownDatabase, got {:?}", other.map(|_| ())),
    }
    match registry.acquire("reporting", true).await {
        Err(DbError::UnknownDatabase { name }) => assert_eq!(name, "reporting"),
        other => panic!("expected UnknownDatabase, got {:?}", other.map(|_| ())),
    }
    registry.close_all().await;
}

#[tokio::test]
async fn test_lookup_before_init_fails() {
    let registry = DatabaseRegistry::new();
    assert!(matches!(registry.master(), Err(DbError::NotInitialized)));
    assert!(matches!(
        registry.acquire(MASTER, true).await,
        Err(DbError::NotInitialized)
    ));
}

#[tokio::test]
async fn test_named_databases_are_isolated() {
    let (registry, _dir) = setup_registry(&[MASTER, "logs"]).await;

    let mut master = registry.acquire_master().await.unwrap();
    master
        .execute("CREATE TABLE only_here (id INTEGER PRIMARY KEY)", &[])
        .await
        .unwrap();
    master
        .execute("INSERT INTO only_here (id) VALUES (?)", &[SqlValue::from(1)])
        .await
        .unwrap();
    drop(master);

    // The table exists only in the master database
    let mut logs = registry.acquire_default("logs").await.unwrap();
    let result = logs.fetch_rows("SELECT id FROM only_here", &[]).await;
    assert!(result.is_err());
    drop(logs);

    registry.close_all().await;
}

#[tokio::test]
async fn test_acquire_without_auto_commit_opens_transaction() {
    let (registry, _dir) = setup_registry(&[MASTER]).await;

    let mut setup = registry.acquire_master().await.unwrap();
    setup
        .execute("CREATE TABLE items (id INTEGER PRIMARY KEY, name TEXT)", &[])
        .await
        .unwrap();
    drop(setup);

    let mut conn = registry.acquire(MASTER, false).await.unwrap();
    conn.execute(
        "INSERT INTO items (name) VALUES (?)",
        &[SqlValue::from("pending")],
    )
    .await
    .unwrap();
    conn.rollback().await.unwrap();
    drop(conn);

    let mut check = registry.acquire_master().await.unwrap();
    let rows = check.fetch_rows("SELECT id FROM items", &[]).await.unwrap();
    assert!(rows.is_empty(), "rolled-back insert must not persist");
    drop(check);

    registry.close_all().await;
}
