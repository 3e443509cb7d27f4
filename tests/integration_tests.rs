//! End-to-end integration tests

use std::sync::Arc;

use connection_manager::config::{Config, TokenConfig};
use connection_manager::storage::{CachedStore, CredentialStore, Database};
use connection_manager::{
    ConnectionManager, DomainPolicy, Principal, SecretLookup, TokenKeyHint,
};
use tempfile::TempDir;

fn setup_db() -> (Arc<Database>, TempDir) {
    let temp_dir = TempDir::new().unwrap();
    let db = Database::open(temp_dir.path()).unwrap();
    (Arc::new(db), temp_dir)
}

fn config_with_defined(tokens: &[&str]) -> Config {
    Config {
        tokens: TokenConfig {
            defined_blog_tokens: tokens.iter().map(|t| t.to_string()).collect(),
        },
        ..Config::default()
    }
}

#[tokio::test]
async fn test_site_connection_lifecycle() {
    let (db, temp) = setup_db();
    let manager = ConnectionManager::new(Arc::clone(&db), &Config::default());

    // Domain is checked before the handshake
    assert!(manager
        .is_usable_domain("example.com", DomainPolicy::Enforce)
        .is_allowed());
    assert!(!manager.is_active().unwrap());

    // Handshake secrets are stable until consumed
    let pair = manager.generate_secrets("register", 0, None).unwrap();
    assert_eq!(pair.secret_1.len(), 12);
    assert_eq!(manager.generate_secrets("register", 0, None).unwrap(), pair);
    assert_eq!(
        manager.get_secrets("register", 0).unwrap(),
        SecretLookup::Found(pair)
    );
    assert!(manager.delete_secrets("register", 0).unwrap());

    // Remote service issued durable credentials
    db.set_blog_token("blogkey.blogsecret").unwrap();
    db.set_master_user_id(1).unwrap();
    db.set_user_token(1, "ownerkey.ownersecret.1").unwrap();
    assert!(manager.is_active().unwrap());
    assert!(manager.is_user_connected(Some(1)).unwrap());
    assert!(manager.is_connection_owner(Some(1)).unwrap());

    // Credentials survive reopening the database
    drop(manager);
    drop(db);
    let db = Arc::new(Database::open(temp.path()).unwrap());
    let manager = ConnectionManager::new(Arc::clone(&db), &Config::default());
    let owner = manager
        .get_access_token(Principal::MasterUser, &TokenKeyHint::NoHint)
        .unwrap()
        .unwrap();
    assert_eq!(owner.secret, "ownerkey.ownersecret");
    assert_eq!(owner.external_user_id, 1);

    manager.disconnect_site().unwrap();
    assert!(!manager.is_active().unwrap());
    assert!(!manager.is_user_connected(Some(1)).unwrap());
}

#[tokio::test]
async fn test_open_from_configured_data_dir() {
    let temp = TempDir::new().unwrap();
    let data_dir = temp.path().join("nested").join("store");
    let config = Config {
        data_dir: data_dir.to_string_lossy().into_owned(),
        ..Config::default()
    };

    let manager = ConnectionManager::open(&config).unwrap();
    manager.store().set_blog_token("blogkey.blogsecret").unwrap();
    assert!(manager.is_active().unwrap());
    drop(manager);

    assert!(data_dir.join("connection.redb").exists());
    let manager = ConnectionManager::open(&config).unwrap();
    assert!(manager.is_active().unwrap());
}

#[tokio::test]
async fn test_token_precedence_with_defined_tokens() {
    let (db, _temp) = setup_db();
    let special = ";vip1;4242;.specialsecret";
    let config = config_with_defined(&["definedkey.definedsecret", special]);
    let manager = ConnectionManager::new(Arc::clone(&db), &config);
    db.set_blog_token("blogkey.blogsecret").unwrap();

    let site = |hint: TokenKeyHint| {
        manager
            .get_access_token(Principal::Site, &hint)
            .unwrap()
            .map(|t| t.secret)
    };

    assert_eq!(site(TokenKeyHint::NoHint).as_deref(), Some(special));
    assert_eq!(
        site(TokenKeyHint::FirstNormal).as_deref(),
        Some("blogkey.blogsecret")
    );
    assert_eq!(
        site(TokenKeyHint::exact("definedkey")).as_deref(),
        Some("definedkey.definedsecret")
    );
    assert_eq!(site(TokenKeyHint::exact("nosuchkey")), None);
}

#[tokio::test]
async fn test_user_token_owner_must_match() {
    let (db, _temp) = setup_db();
    let manager = ConnectionManager::new(Arc::clone(&db), &Config::default());

    db.set_user_token(2, "k.s.2").unwrap();
    db.set_user_token(3, "k.s.2").unwrap();

    assert!(manager.is_user_connected(Some(2)).unwrap());
    assert!(!manager.is_user_connected(Some(3)).unwrap());

    assert!(manager.disconnect_user(2).unwrap());
    assert!(!manager.is_user_connected(Some(2)).unwrap());
}

#[tokio::test]
async fn test_expired_secrets_are_deleted_on_read() {
    let (db, _temp) = setup_db();
    let manager = ConnectionManager::new(Arc::clone(&db), &Config::default());

    manager.generate_secrets("authorize", 7, Some(0)).unwrap();
    assert_eq!(
        manager.get_secrets("authorize", 7).unwrap(),
        SecretLookup::Expired
    );
    assert_eq!(
        manager.get_secrets("authorize", 7).unwrap(),
        SecretLookup::Missing
    );
    assert!(db.get_secrets_table().unwrap().is_empty());
}

#[tokio::test]
async fn test_concurrent_generation_on_different_keys() {
    let (db, _temp) = setup_db();
    let manager = Arc::new(ConnectionManager::new(
        Arc::new(CachedStore::new(Arc::clone(&db))),
        &Config::default(),
    ));

    let mut handles = Vec::new();
    for user_id in 1..=8u64 {
        let manager = Arc::clone(&manager);
        handles.push(tokio::task::spawn_blocking(move || {
            manager.generate_secrets("register", user_id, None).unwrap()
        }));
    }

    let mut pairs = Vec::new();
    for handle in handles {
        pairs.push(handle.await.unwrap());
    }

    // No writer lost another's pair
    let table = db.get_secrets_table().unwrap();
    assert_eq!(table.len(), 8);
    for (user_id, pair) in (1..=8u64).zip(pairs) {
        assert_eq!(table.get(&format!("register_{user_id}")), Some(&pair));
    }
}
