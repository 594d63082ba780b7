//! 자격증명 수명 주기 통합 테스트.

mod common;

use async_trait::async_trait;
use chrono::{Duration, Utc};
use common::codec;
use eyeon_core::{CredentialStore, Store};
use eyeon_exchange::{
    CredentialManager, DecryptedCredential, ExchangeError, ExchangeResult, NewCredentialInput,
    RenewedTokens, TokenRenewer,
};
use eyeon_storage::MemoryStore;
use secrecy::{ExposeSecret, SecretString};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use uuid::Uuid;

/// 호출 횟수를 세는 고정 토큰 갱신기.
struct CountingRenewer {
    calls: AtomicUsize,
}

impl CountingRenewer {
    fn new() -> Self {
        Self {
            calls: AtomicUsize::new(0),
        }
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TokenRenewer for CountingRenewer {
    fn token_ttl(&self) -> Duration {
        Duration::minutes(15)
    }

    async fn renew(&self, _credential: &DecryptedCredential) -> ExchangeResult<RenewedTokens> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        Ok(RenewedTokens {
            access_key: SecretString::new(format!("access-{}", n).into()),
            refresh_key: None,
        })
    }
}

fn manager(store: &MemoryStore) -> CredentialManager {
    let shared: Arc<dyn Store> = Arc::new(store.clone());
    CredentialManager::new(shared, codec())
}

#[tokio::test]
async fn test_store_and_decrypt() {
    let store = MemoryStore::new();
    let credentials = manager(&store);
    let user = Uuid::new_v4();
    let exchange = Uuid::new_v4();

    let record = credentials
        .store_credential(NewCredentialInput::new(
            user,
            exchange,
            "api-key-1234567890",
            "very-secret",
        ))
        .await
        .unwrap();

    assert_eq!(record.label, "Default");
    assert_ne!(record.api_key, "api-key-1234567890");
    assert_ne!(record.secret_key, "very-secret");
    assert!(record.access_key.is_none());

    let decrypted = credentials
        .get_by_user_and_exchange(user, exchange)
        .await
        .unwrap();
    assert_eq!(decrypted.id, record.id);
    assert_eq!(decrypted.api_key.expose_secret(), "api-key-1234567890");
    assert_eq!(decrypted.secret_key.expose_secret(), "very-secret");

    let debug = format!("{:?}", decrypted);
    assert!(!debug.contains("very-secret"));
    assert!(!debug.contains("api-key-1234567890"));
}

#[tokio::test]
async fn test_credentials_are_scoped_to_user() {
    let store = MemoryStore::new();
    let credentials = manager(&store);
    let exchange = Uuid::new_v4();
    let owner = Uuid::new_v4();

    credentials
        .store_credential(NewCredentialInput::new(owner, exchange, "key", "secret"))
        .await
        .unwrap();

    let result = credentials
        .get_by_user_and_exchange(Uuid::new_v4(), exchange)
        .await;
    assert!(matches!(result, Err(ExchangeError::NotFound(_))));

    let result = credentials
        .get_by_user_and_exchange(owner, Uuid::new_v4())
        .await;
    assert!(matches!(result, Err(ExchangeError::NotFound(_))));
}

#[tokio::test]
async fn test_wrong_master_key_fails_decryption() {
    let store = MemoryStore::new();
    let user = Uuid::new_v4();
    let exchange = Uuid::new_v4();

    manager(&store)
        .store_credential(NewCredentialInput::new(user, exchange, "key", "secret"))
        .await
        .unwrap();

    let result = manager(&store)
        .get_by_user_and_exchange(user, exchange)
        .await;
    assert!(matches!(result, Err(ExchangeError::DecryptionFailed(_))));
}

#[tokio::test]
async fn test_duplicate_label_rejected() {
    let store = MemoryStore::new();
    let credentials = manager(&store);
    let user = Uuid::new_v4();
    let exchange = Uuid::new_v4();

    credentials
        .store_credential(NewCredentialInput::new(user, exchange, "a", "b").with_label("main"))
        .await
        .unwrap();

    let result = credentials
        .store_credential(NewCredentialInput::new(user, exchange, "c", "d").with_label("main"))
        .await;
    assert!(matches!(result, Err(ExchangeError::ValidationFailed(_))));

    credentials
        .store_credential(NewCredentialInput::new(user, exchange, "c", "d").with_label("backup"))
        .await
        .unwrap();
    assert_eq!(credentials.list_for_user(user).await.unwrap().len(), 2);
}

#[tokio::test]
async fn test_deactivated_credential_not_returned() {
    let store = MemoryStore::new();
    let credentials = manager(&store);
    let user = Uuid::new_v4();
    let exchange = Uuid::new_v4();

    let record = credentials
        .store_credential(NewCredentialInput::new(user, exchange, "key", "secret"))
        .await
        .unwrap();
    credentials.deactivate(record.id).await.unwrap();

    let result = credentials.get_by_user_and_exchange(user, exchange).await;
    assert!(matches!(result, Err(ExchangeError::NotFound(_))));
}

#[tokio::test]
async fn test_renewal_reencrypts_and_sets_expiry() {
    let store = MemoryStore::new();
    let credentials = manager(&store);
    let user = Uuid::new_v4();
    let exchange = Uuid::new_v4();

    let before = credentials
        .store_credential(
            NewCredentialInput::new(user, exchange, "key", "secret").with_tokens(
                "old-access",
                Some("refresh".to_string()),
                Some(Utc::now() + Duration::minutes(10)),
            ),
        )
        .await
        .unwrap();

    let renewer = CountingRenewer::new();
    let renewed = credentials
        .renew_access_token(user, exchange, &renewer)
        .await
        .unwrap();

    assert_eq!(renewer.calls(), 1);
    assert_eq!(
        renewed.access_key.as_ref().map(|k| k.expose_secret().to_string()),
        Some("access-1".to_string())
    );
    assert_eq!(
        renewed.refresh_key.as_ref().map(|k| k.expose_secret().to_string()),
        Some("refresh".to_string())
    );
    assert_eq!(renewed.api_key.expose_secret(), "key");

    let expires_at = renewed.access_expires_at.unwrap();
    assert!(expires_at > Utc::now() + Duration::minutes(14));
    assert!(expires_at <= Utc::now() + Duration::minutes(15));

    let after = store
        .find_latest_active_credential(user, exchange)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(after.id, before.id);
    assert_ne!(after.api_key, before.api_key);
    assert_ne!(after.access_key, before.access_key);
}

#[tokio::test]
async fn test_fresh_credential_skips_renewal_when_valid() {
    let store = MemoryStore::new();
    let credentials = manager(&store);
    let user = Uuid::new_v4();
    let exchange = Uuid::new_v4();

    credentials
        .store_credential(
            NewCredentialInput::new(user, exchange, "key", "secret").with_tokens(
                "access",
                None,
                Some(Utc::now() + Duration::minutes(10)),
            ),
        )
        .await
        .unwrap();

    let renewer = CountingRenewer::new();
    let credential = credentials
        .fresh_credential(user, exchange, &renewer)
        .await
        .unwrap();

    assert_eq!(renewer.calls(), 0);
    assert_eq!(
        credential.access_key.as_ref().map(|k| k.expose_secret().to_string()),
        Some("access".to_string())
    );
}

#[tokio::test]
async fn test_concurrent_renewals_are_serialized() {
    let store = MemoryStore::new();
    let credentials = manager(&store);
    let user = Uuid::new_v4();
    let exchange = Uuid::new_v4();

    credentials
        .store_credential(
            NewCredentialInput::new(user, exchange, "key", "secret").with_tokens(
                "expired",
                None,
                Some(Utc::now() - Duration::minutes(5)),
            ),
        )
        .await
        .unwrap();

    let renewer = CountingRenewer::new();
    let (a, b) = tokio::join!(
        credentials.fresh_credential(user, exchange, &renewer),
        credentials.fresh_credential(user, exchange, &renewer),
    );

    assert_eq!(renewer.calls(), 1);
    let a = a.unwrap();
    let b = b.unwrap();
    assert_eq!(
        a.access_key.as_ref().map(|k| k.expose_secret().to_string()),
        b.access_key.as_ref().map(|k| k.expose_secret().to_string())
    );
}
