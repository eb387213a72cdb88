use barter_core::profile::ProfileFields;
use barter_core::remote::RemoteStore;
use barter_core::tag::TagKind;
use barter_infrastructure::InMemoryRemoteStore;
use std::sync::Arc;

#[tokio::test]
async fn test_session_changes_arrive_in_order() {
    let store: Arc<dyn RemoteStore> = Arc::new(InMemoryRemoteStore::new());
    let mut changes = store.subscribe_session_changes();

    store.sign_up("ana@example.com", "hunter22").await.unwrap();
    store.sign_out().await.unwrap();
    store
        .sign_in_with_password("ana@example.com", "hunter22")
        .await
        .unwrap();

    let first = changes.recv().await.unwrap().expect("sign-up session");
    assert_eq!(changes.recv().await.unwrap(), None);
    let third = changes.recv().await.unwrap().expect("sign-in session");
    assert_eq!(first.user_id(), third.user_id());
    assert_ne!(first.access_token, third.access_token);
}

#[tokio::test]
async fn test_profiles_are_private_to_their_owner() {
    let backend = Arc::new(InMemoryRemoteStore::new());
    let store: Arc<dyn RemoteStore> = backend.clone();
    store.sign_up("ana@example.com", "hunter22").await.unwrap();
    let ana = store.get_session().await.unwrap().unwrap();
    let profile = store
        .create_profile(ana.user_id(), &ProfileFields::default())
        .await
        .unwrap();
    let tag = backend.seed_tag("Rust", TagKind::Offer).await;

    store.sign_up("bob@example.com", "hunter22").await.unwrap();

    assert!(store.query_profile(ana.user_id()).await.unwrap_err().is_auth());
    assert!(
        store
            .insert_tag_link(&profile.id, &tag.id)
            .await
            .unwrap_err()
            .is_auth()
    );
}

#[tokio::test]
async fn test_unknown_tag_is_not_found() {
    let store = InMemoryRemoteStore::new();
    store.sign_up("ana@example.com", "hunter22").await.unwrap();
    let user_id = store.get_session().await.unwrap().unwrap().user_id().to_string();
    let profile = store
        .create_profile(&user_id, &ProfileFields::default())
        .await
        .unwrap();

    let err = store.insert_tag_link(&profile.id, "missing").await.unwrap_err();
    assert!(err.is_not_found());
}
