mod common;

use chrono::Duration;
use serde_json::{json, Value};
use std::sync::Arc;

use common::{identity, TestContext};
use sessionvault::{
    AppError, CryptoEngine, FileStore, KeySource, KeyValueStore, SessionManager, SessionMeta,
    SessionSettings,
};

#[tokio::test]
async fn test_other_user_cannot_read_vault_entry() {
    let ctx = TestContext::new().await;
    let vault = ctx.manager.vault();

    vault.set("u1", "prefs", &json!({"theme": "dark"})).await.unwrap();

    let u2 = ctx.login("u2").await;
    ctx.manager.set_current_session(&u2).await.unwrap();
    let current = ctx.manager.get_current_session().await.unwrap().unwrap();
    assert_eq!(current.user_id, "u2");

    assert_eq!(vault.get::<Value>(&current.user_id, "prefs").await.unwrap(), None);
    assert_eq!(
        vault.get::<Value>("u1", "prefs").await.unwrap(),
        Some(json!({"theme": "dark"}))
    );
}

#[tokio::test]
async fn test_concurrent_contexts_stay_isolated() {
    let ctx = TestContext::new().await;
    let s1 = ctx.login("u1").await;
    let s2 = ctx.login("u2").await;

    let laptop = ctx.manager.context("laptop");
    let library = ctx.manager.context("library-kiosk");
    laptop.set_current_session(&s1).await.unwrap();
    library.set_current_session(&s2).await.unwrap();

    let owner1 = laptop.get_current_session().await.unwrap().unwrap();
    let owner2 = library.get_current_session().await.unwrap().unwrap();

    ctx.manager
        .vault_for(&owner1)
        .set("plan", &json!(["CS101", "MATH221"]))
        .await
        .unwrap();
    ctx.manager
        .vault_for(&owner2)
        .set("plan", &json!(["BIO110"]))
        .await
        .unwrap();

    let v1: Value = ctx.manager.vault_for(&owner1).get("plan").await.unwrap().unwrap();
    let v2: Value = ctx.manager.vault_for(&owner2).get("plan").await.unwrap().unwrap();
    assert_eq!(v1, json!(["CS101", "MATH221"]));
    assert_eq!(v2, json!(["BIO110"]));

    assert_eq!(ctx.manager.vault_for(&owner2).data_types().await.unwrap(), vec!["plan".to_string()]);
    assert_eq!(
        laptop.current_session_id().await.unwrap().as_deref(),
        Some(s1.as_str())
    );
}

#[tokio::test]
async fn test_entry_copied_between_users_is_unreadable() {
    let ctx = TestContext::new().await;
    ctx.manager.vault().set("u1", "prefs", &json!({"theme": "dark"})).await.unwrap();

    let sealed = ctx.store.get("userData:u1:prefs").await.unwrap().unwrap();
    ctx.store.set("userData:u2:prefs", sealed).await.unwrap();

    assert_eq!(ctx.manager.vault().get::<Value>("u2", "prefs").await.unwrap(), None);
}

#[tokio::test]
async fn test_destroy_user_sessions_wipes_only_that_user() {
    let ctx = TestContext::new().await;
    let vault = ctx.manager.vault();

    let a = ctx.login("u1").await;
    let b = ctx.login("u1").await;
    vault.set("u1", "prefs", &json!({"theme": "dark"})).await.unwrap();
    vault.set("u1", "plan", &json!(["CS101"])).await.unwrap();

    let sibling = ctx.login("u2").await;
    vault.set("u2", "prefs", &json!({"theme": "light"})).await.unwrap();

    assert_eq!(ctx.manager.destroy_user_sessions("u1").await.unwrap(), 2);

    assert!(ctx.manager.validate_session(&a).await.unwrap().is_none());
    assert!(ctx.manager.validate_session(&b).await.unwrap().is_none());
    assert_eq!(vault.get::<Value>("u1", "prefs").await.unwrap(), None);
    assert_eq!(vault.get::<Value>("u1", "plan").await.unwrap(), None);
    assert!(vault.data_types("u1").await.unwrap().is_empty());

    assert!(ctx.manager.validate_session(&sibling).await.unwrap().is_some());
    assert_eq!(
        vault.get::<Value>("u2", "prefs").await.unwrap(),
        Some(json!({"theme": "light"}))
    );
}

#[tokio::test]
async fn test_handle_cannot_write_after_destroy_user_sessions() {
    let ctx = TestContext::new().await;
    let id = ctx.login("u1").await;
    let session = ctx.manager.validate_session(&id).await.unwrap().unwrap();
    let handle = ctx.manager.vault_for(&session);

    assert_eq!(ctx.manager.destroy_user_sessions("u1").await.unwrap(), 1);

    let err = handle.set("prefs", &json!({"theme": "dark"})).await.unwrap_err();
    assert!(matches!(err, AppError::Unauthorized));
    assert_eq!(ctx.manager.vault().get::<Value>("u1", "prefs").await.unwrap(), None);
    assert!(ctx.manager.vault().data_types("u1").await.unwrap().is_empty());
}

#[tokio::test]
async fn test_concurrent_write_and_destroy_leave_nothing_behind() {
    let ctx = TestContext::new().await;
    let id = ctx.login("u1").await;
    let session = ctx.manager.validate_session(&id).await.unwrap().unwrap();
    let handle = ctx.manager.vault_for(&session);
    let prefs = json!({"theme": "dark"});

    let (written, destroyed) = tokio::join!(
        handle.set("prefs", &prefs),
        ctx.manager.destroy_user_sessions("u1"),
    );
    destroyed.unwrap();
    if let Err(e) = written {
        assert!(matches!(e, AppError::Unauthorized));
    }

    assert_eq!(ctx.manager.vault().get::<Value>("u1", "prefs").await.unwrap(), None);
}

#[tokio::test]
async fn test_handle_of_expired_session_cannot_write() {
    let ctx = TestContext::new().await;
    let id = ctx.login("u1").await;
    let session = ctx.manager.validate_session(&id).await.unwrap().unwrap();
    let handle = ctx.manager.vault_for(&session);

    handle.set("prefs", &json!({"units": 12})).await.unwrap();
    ctx.advance(Duration::hours(25));

    assert!(matches!(
        handle.set("prefs", &json!({"units": 18})).await,
        Err(AppError::Unauthorized)
    ));
    assert_eq!(
        handle.get::<Value>("prefs").await.unwrap(),
        Some(json!({"units": 12}))
    );
}

#[tokio::test]
async fn test_single_logout_keeps_vault() {
    let ctx = TestContext::new().await;
    let id = ctx.login("u1").await;
    let session = ctx.manager.validate_session(&id).await.unwrap().unwrap();
    ctx.manager.vault_for(&session).set("prefs", &json!({"units": 15})).await.unwrap();

    ctx.manager.destroy_session(&id).await.unwrap();

    let again = ctx.login("u1").await;
    let session = ctx.manager.validate_session(&again).await.unwrap().unwrap();
    assert_eq!(
        ctx.manager.vault_for(&session).get::<Value>("prefs").await.unwrap(),
        Some(json!({"units": 15}))
    );
}

#[tokio::test]
async fn test_colon_in_user_id_does_not_leak_across_namespaces() {
    let ctx = TestContext::new().await;
    let vault = ctx.manager.vault();
    vault.set("a:b", "c", &1).await.unwrap();
    vault.set("a", "b:c", &2).await.unwrap();

    assert_eq!(vault.get::<i32>("a:b", "c").await.unwrap(), Some(1));
    assert_eq!(vault.get::<i32>("a", "b:c").await.unwrap(), Some(2));

    ctx.manager.destroy_user_sessions("a").await.unwrap();
    assert_eq!(vault.get::<i32>("a:b", "c").await.unwrap(), Some(1));
}

#[tokio::test]
async fn test_file_store_survives_restart() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("sessions.bin");

    let (session_id, user) = {
        let store: Arc<dyn KeyValueStore> = Arc::new(FileStore::open(&path).await.unwrap());
        let manager = SessionManager::open(store, KeySource::Store, SessionSettings::default())
            .await
            .unwrap();
        let id = manager
            .create_session(&identity("u1"), SessionMeta::default())
            .await
            .unwrap();
        manager.vault().set("u1", "prefs", &json!({"theme": "dark"})).await.unwrap();
        (id, "u1")
    };

    let store: Arc<dyn KeyValueStore> = Arc::new(FileStore::open(&path).await.unwrap());
    let manager = SessionManager::open(store, KeySource::Store, SessionSettings::default())
        .await
        .unwrap();

    let session = manager.validate_session(&session_id).await.unwrap().unwrap();
    assert_eq!(session.user_id, user);
    assert_eq!(
        manager.vault().get::<Value>(user, "prefs").await.unwrap(),
        Some(json!({"theme": "dark"}))
    );
}

#[tokio::test]
async fn test_external_key_is_required_to_read_back() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("sessions.bin");
    let key = sessionvault::crypto::aes::generate_key();

    let store: Arc<dyn KeyValueStore> = Arc::new(FileStore::open(&path).await.unwrap());
    let manager = SessionManager::new(
        store.clone(),
        CryptoEngine::with_key(key.clone()),
        SessionSettings::default(),
    );
    let id = manager
        .create_session(&identity("u1"), SessionMeta::default())
        .await
        .unwrap();
    assert_eq!(store.get("encryptionKey").await.unwrap(), None);

    let right = SessionManager::new(store.clone(), CryptoEngine::with_key(key), SessionSettings::default());
    assert!(right.validate_session(&id).await.unwrap().is_some());

    // A manager with a different key fails closed and purges what it cannot read.
    let wrong = SessionManager::open(store, KeySource::Store, SessionSettings::default())
        .await
        .unwrap();
    assert!(wrong.validate_session(&id).await.unwrap().is_none());
    assert!(right.validate_session(&id).await.unwrap().is_none());
}
