//! 통합 테스트 공용 헬퍼.

#![allow(dead_code)]

use chrono::{DateTime, Duration, Utc};
use eyeon_core::crypto::generate_master_key;
use eyeon_core::{ExchangeConfig, SecretCodec, Store};
use eyeon_exchange::{ExchangeHandle, ExchangeRegistry, NewCredentialInput};
use eyeon_storage::MemoryStore;
use mockito::ServerGuard;
use std::sync::Arc;
use uuid::Uuid;

pub struct Harness {
    pub server: ServerGuard,
    pub store: MemoryStore,
    pub registry: ExchangeRegistry,
}

pub fn codec() -> Arc<SecretCodec> {
    Arc::new(SecretCodec::new(&generate_master_key()).unwrap())
}

pub async fn harness() -> Harness {
    let server = mockito::Server::new_async().await;
    let store = MemoryStore::new();
    let shared: Arc<dyn Store> = Arc::new(store.clone());
    let registry = ExchangeRegistry::builder(shared, codec())
        .with_default_adapters()
        .unwrap()
        .build();

    Harness {
        server,
        store,
        registry,
    }
}

impl Harness {
    pub async fn bitpin(&self) -> ExchangeHandle {
        self.registry
            .get_or_create_exchange(&ExchangeConfig::bitpin().with_base_url(self.server.url()))
            .await
            .unwrap()
    }

    pub async fn nobitex(&self) -> ExchangeHandle {
        self.registry
            .get_or_create_exchange(&ExchangeConfig::nobitex().with_base_url(self.server.url()))
            .await
            .unwrap()
    }

    /// Bitpin 형태의 자격증명 (액세스/리프레시 토큰 포함).
    pub async fn store_token_credential(
        &self,
        user_id: Uuid,
        exchange_id: Uuid,
        access: &str,
        expires_at: DateTime<Utc>,
    ) {
        self.registry
            .credentials()
            .store_credential(
                NewCredentialInput::new(user_id, exchange_id, "key", "secret").with_tokens(
                    access,
                    Some("refresh".to_string()),
                    Some(expires_at),
                ),
            )
            .await
            .unwrap();
    }

    /// API 키만 있는 자격증명.
    pub async fn store_api_key_credential(&self, user_id: Uuid, exchange_id: Uuid) {
        self.registry
            .credentials()
            .store_credential(NewCredentialInput::new(user_id, exchange_id, "key", "secret"))
            .await
            .unwrap();
    }
}

pub fn in_ten_minutes() -> DateTime<Utc> {
    Utc::now() + Duration::minutes(10)
}
