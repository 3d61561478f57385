use serde_json::json;
use tidelog_types::Cid;

use super::{TestEnv, fake_entry};
use crate::access::{ANY_KEY, AccessController, AllowAll, KeyListAccess};
use crate::entry::Entry;

async fn signed_entry(env: &TestEnv, seed: u8) -> Entry {
    let identity = env.identity(seed);
    Entry::build(
        env.provider.as_ref(),
        &identity,
        "A",
        json!("payload"),
        Vec::<Cid>::new(),
        None,
    )
    .await
    .unwrap()
}

#[tokio::test]
async fn test_allow_all() {
    let env = TestEnv::new();
    let entry = signed_entry(&env, 1).await;
    assert!(AllowAll.can_append(&entry, env.provider.as_ref()).await.unwrap());
    assert!(AllowAll.can_append(&fake_entry(1, "w", 1), env.provider.as_ref()).await.unwrap());
}

#[tokio::test]
async fn test_key_list_allows_listed_key() {
    let env = TestEnv::new();
    let entry = signed_entry(&env, 1).await;
    let access = KeyListAccess::new([env.identity(1).public_key()]);

    assert!(access.allows(env.identity(1).public_key()));
    assert!(access.can_append(&entry, env.provider.as_ref()).await.unwrap());
}

#[tokio::test]
async fn test_key_list_denies_other_keys() {
    let env = TestEnv::new();
    let entry = signed_entry(&env, 2).await;
    let access = KeyListAccess::new([env.identity(1).public_key()]);

    assert!(!access.allows(env.identity(2).public_key()));
    assert!(!access.can_append(&entry, env.provider.as_ref()).await.unwrap());
}

#[tokio::test]
async fn test_key_list_wildcard() {
    let env = TestEnv::new();
    let entry = signed_entry(&env, 3).await;
    let access = KeyListAccess::new([ANY_KEY]);

    assert!(access.allows("anything"));
    assert!(access.can_append(&entry, env.provider.as_ref()).await.unwrap());
}

#[tokio::test]
async fn test_key_list_accepts_identity_id() {
    let env = TestEnv::new();
    let entry = signed_entry(&env, 1).await;
    let identity_id = entry.identity.as_ref().unwrap().id.clone();
    let access = KeyListAccess::new([identity_id]);

    assert!(access.can_append(&entry, env.provider.as_ref()).await.unwrap());
}

#[tokio::test]
async fn test_key_list_rejects_borrowed_identity() {
    let env = TestEnv::new();
    let mut entry = signed_entry(&env, 1).await;
    // Claim someone else's identity while signing with our own key.
    entry.identity = Some(env.identity(2).descriptor());
    let access = KeyListAccess::new([ANY_KEY]);

    assert!(!access.can_append(&entry, env.provider.as_ref()).await.unwrap());
}

#[tokio::test]
async fn test_key_list_rejects_forged_identity_signature() {
    let env = TestEnv::new();
    let mut entry = signed_entry(&env, 1).await;
    let mut descriptor = entry.identity.clone().unwrap();
    descriptor.signatures.id = descriptor.signatures.public_key.clone();
    entry.identity = Some(descriptor);
    let access = KeyListAccess::new([ANY_KEY]);

    assert!(!access.can_append(&entry, env.provider.as_ref()).await.unwrap());
}

#[tokio::test]
async fn test_key_list_rejects_unsigned() {
    let env = TestEnv::new();
    let access = KeyListAccess::new([ANY_KEY]);
    assert!(!access.can_append(&fake_entry(1, "w", 1), env.provider.as_ref()).await.unwrap());
}
