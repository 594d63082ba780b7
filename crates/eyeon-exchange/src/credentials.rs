//! 자격증명 수명 주기 관리.
//!
//! 처리 기능:
//! - (사용자, 거래소)별 최신 활성 자격증명 조회 및 복호화
//! - 단기 액세스 토큰 갱신 (만료 60초 전 선제 갱신, 401 응답 시 즉시 갱신)
//! - 새 자격증명 암호화 저장
//! - 마지막 사용 시각 기록
//!
//! 복호화된 값은 `SecretString`으로만 보관하며 로그/Debug 출력에 나타나지 않습니다.

use crate::error::ExchangeError;
use crate::traits::ExchangeResult;
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use eyeon_core::{
    ExchangeCredential, NewCredential, RotatedSecrets, SecretCodec, Store, StoreError,
    DEFAULT_CREDENTIAL_LABEL,
};
use secrecy::{ExposeSecret, SecretString};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// 선제 갱신 여유 시간 (초). 만료까지 이보다 적게 남으면 갱신합니다.
pub const TOKEN_REFRESH_MARGIN_SECS: i64 = 60;

fn secret(value: String) -> SecretString {
    SecretString::new(value.into())
}

/// API 키 마스킹 (앞/뒤 4자만 표시).
pub fn mask_key(key: &str) -> String {
    if key.len() > 8 && key.is_char_boundary(4) && key.is_char_boundary(key.len() - 4) {
        format!("{}...{}", &key[..4], &key[key.len() - 4..])
    } else {
        "***REDACTED***".to_string()
    }
}

// ============================================================================
// 복호화된 자격증명
// ============================================================================

/// 복호화된 자격증명.
pub struct DecryptedCredential {
    pub id: Uuid,
    pub user_id: Uuid,
    pub exchange_id: Uuid,
    pub label: String,
    pub api_key: SecretString,
    pub secret_key: SecretString,
    pub access_key: Option<SecretString>,
    pub refresh_key: Option<SecretString>,
    pub access_expires_at: Option<DateTime<Utc>>,
    pub is_testnet: bool,
    pub last_used: Option<DateTime<Utc>>,
}

impl DecryptedCredential {
    /// 액세스 토큰이 없거나, 만료되었거나, 곧 만료되는지 확인.
    ///
    /// 만료 시각이 기록되지 않은 토큰은 유효한 것으로 보고 401 응답에 맡깁니다.
    pub fn access_expiring(&self, now: DateTime<Utc>) -> bool {
        if self.access_key.is_none() {
            return true;
        }
        match self.access_expires_at {
            Some(expires_at) => expires_at <= now + Duration::seconds(TOKEN_REFRESH_MARGIN_SECS),
            None => false,
        }
    }
}

impl fmt::Debug for DecryptedCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DecryptedCredential")
            .field("id", &self.id)
            .field("user_id", &self.user_id)
            .field("exchange_id", &self.exchange_id)
            .field("label", &self.label)
            .field("api_key", &mask_key(self.api_key.expose_secret()))
            .field("secret_key", &"[REDACTED]")
            .field("access_key", &self.access_key.as_ref().map(|_| "[REDACTED]"))
            .field("refresh_key", &self.refresh_key.as_ref().map(|_| "[REDACTED]"))
            .field("access_expires_at", &self.access_expires_at)
            .field("is_testnet", &self.is_testnet)
            .finish()
    }
}

// ============================================================================
// 토큰 갱신
// ============================================================================

/// 갱신된 토큰.
pub struct RenewedTokens {
    pub access_key: SecretString,
    /// `None`이면 저장된 리프레시 키를 유지
    pub refresh_key: Option<SecretString>,
}

impl fmt::Debug for RenewedTokens {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RenewedTokens")
            .field("access_key", &"[REDACTED]")
            .field("refresh_key", &self.refresh_key.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}

/// 단기 토큰 거래소의 토큰 갱신 구현.
///
/// 거래소 어댑터가 구현하며, 실제 갱신 엔드포인트 호출만 담당합니다.
/// 암호화/저장은 `CredentialManager`가 처리합니다.
#[async_trait]
pub trait TokenRenewer: Send + Sync {
    /// 새 액세스 토큰의 예상 수명.
    fn token_ttl(&self) -> Duration;

    async fn renew(&self, credential: &DecryptedCredential) -> ExchangeResult<RenewedTokens>;
}

// ============================================================================
// 새 자격증명 입력
// ============================================================================

/// 새 자격증명 등록 입력 (평문).
pub struct NewCredentialInput {
    pub user_id: Uuid,
    pub exchange_id: Uuid,
    /// 없으면 "Default"
    pub label: Option<String>,
    pub api_key: SecretString,
    pub secret_key: SecretString,
    pub access_key: Option<SecretString>,
    pub refresh_key: Option<SecretString>,
    pub access_expires_at: Option<DateTime<Utc>>,
    pub is_testnet: bool,
}

impl NewCredentialInput {
    pub fn new(
        user_id: Uuid,
        exchange_id: Uuid,
        api_key: impl Into<String>,
        secret_key: impl Into<String>,
    ) -> Self {
        Self {
            user_id,
            exchange_id,
            label: None,
            api_key: secret(api_key.into()),
            secret_key: secret(secret_key.into()),
            access_key: None,
            refresh_key: None,
            access_expires_at: None,
            is_testnet: false,
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn with_tokens(
        mut self,
        access_key: impl Into<String>,
        refresh_key: Option<String>,
        access_expires_at: Option<DateTime<Utc>>,
    ) -> Self {
        self.access_key = Some(secret(access_key.into()));
        self.refresh_key = refresh_key.map(secret);
        self.access_expires_at = access_expires_at;
        self
    }
}

impl fmt::Debug for NewCredentialInput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NewCredentialInput")
            .field("user_id", &self.user_id)
            .field("exchange_id", &self.exchange_id)
            .field("label", &self.label)
            .field("api_key", &mask_key(self.api_key.expose_secret()))
            .field("secret_key", &"[REDACTED]")
            .field("is_testnet", &self.is_testnet)
            .finish()
    }
}

// ============================================================================
// 관리자
// ============================================================================

/// 자격증명 수명 주기 관리자.
///
/// 같은 자격증명에 대한 토큰 갱신은 자격증명 ID별 잠금으로 직렬화됩니다.
pub struct CredentialManager {
    store: Arc<dyn Store>,
    codec: Arc<SecretCodec>,
    renewals: Mutex<HashMap<Uuid, Arc<Mutex<()>>>>,
}

impl fmt::Debug for CredentialManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialManager")
            .field("codec", &self.codec)
            .finish_non_exhaustive()
    }
}

impl CredentialManager {
    pub fn new(store: Arc<dyn Store>, codec: Arc<SecretCodec>) -> Self {
        Self {
            store,
            codec,
            renewals: Mutex::new(HashMap::new()),
        }
    }

    /// (사용자, 거래소)의 최신 활성 자격증명을 복호화하여 반환.
    ///
    /// # Errors
    /// - 활성 자격증명이 없으면 `NotFound`
    /// - 암호문/키 불일치 시 `DecryptionFailed`
    pub async fn get_by_user_and_exchange(
        &self,
        user_id: Uuid,
        exchange_id: Uuid,
    ) -> ExchangeResult<DecryptedCredential> {
        let record = self
            .store
            .find_latest_active_credential(user_id, exchange_id)
            .await?
            .ok_or_else(|| {
                ExchangeError::NotFound(format!(
                    "no active credential for user {} on exchange {}",
                    user_id, exchange_id
                ))
            })?;

        self.decrypt(record)
    }

    /// 액세스 토큰이 곧 만료되면 갱신한 뒤 자격증명을 반환.
    pub async fn fresh_credential(
        &self,
        user_id: Uuid,
        exchange_id: Uuid,
        renewer: &dyn TokenRenewer,
    ) -> ExchangeResult<DecryptedCredential> {
        let credential = self.get_by_user_and_exchange(user_id, exchange_id).await?;
        if !credential.access_expiring(Utc::now()) {
            return Ok(credential);
        }

        debug!(
            user_id = %user_id,
            credential_id = %credential.id,
            "Access token missing or expiring, renewing"
        );
        self.renew_serialized(user_id, exchange_id, renewer, true).await
    }

    /// 액세스 토큰 갱신.
    ///
    /// 새 토큰과 API 키를 새 nonce로 다시 암호화하여 제자리에 저장하고,
    /// `access_expires_at = now + ttl`로 기록합니다.
    pub async fn renew_access_token(
        &self,
        user_id: Uuid,
        exchange_id: Uuid,
        renewer: &dyn TokenRenewer,
    ) -> ExchangeResult<DecryptedCredential> {
        self.renew_serialized(user_id, exchange_id, renewer, false).await
    }

    async fn renew_serialized(
        &self,
        user_id: Uuid,
        exchange_id: Uuid,
        renewer: &dyn TokenRenewer,
        only_if_expiring: bool,
    ) -> ExchangeResult<DecryptedCredential> {
        let credential = self.get_by_user_and_exchange(user_id, exchange_id).await?;
        let lock = self.renewal_lock(credential.id).await;
        let result = {
            let _guard = lock.lock().await;
            self.renew_locked(user_id, exchange_id, renewer, only_if_expiring)
                .await
        };
        self.release_renewal_lock(credential.id, lock).await;
        result
    }

    async fn renew_locked(
        &self,
        user_id: Uuid,
        exchange_id: Uuid,
        renewer: &dyn TokenRenewer,
        only_if_expiring: bool,
    ) -> ExchangeResult<DecryptedCredential> {
        // 대기 중 다른 작업이 갱신했을 수 있으므로 다시 읽음
        let credential = self.get_by_user_and_exchange(user_id, exchange_id).await?;
        if only_if_expiring && !credential.access_expiring(Utc::now()) {
            return Ok(credential);
        }

        let renewed = renewer.renew(&credential).await.map_err(|e| {
            warn!(
                user_id = %user_id,
                credential_id = %credential.id,
                error = %e,
                "Token renewal failed"
            );
            e
        })?;

        let secrets = RotatedSecrets {
            api_key: self.seal(credential.api_key.expose_secret())?,
            access_key: self.seal(renewed.access_key.expose_secret())?,
            refresh_key: renewed
                .refresh_key
                .as_ref()
                .map(|k| self.seal(k.expose_secret()))
                .transpose()?,
            access_expires_at: Some(Utc::now() + renewer.token_ttl()),
        };

        let record = self
            .store
            .rotate_credential_secrets(credential.id, &secrets)
            .await?;

        info!(
            user_id = %user_id,
            credential_id = %record.id,
            expires_at = ?record.access_expires_at,
            "Access token renewed"
        );

        self.decrypt(record)
    }

    async fn renewal_lock(&self, credential_id: Uuid) -> Arc<Mutex<()>> {
        let mut locks = self.renewals.lock().await;
        locks.entry(credential_id).or_default().clone()
    }

    /// 대기 중인 작업이 없으면 잠금 항목 제거.
    async fn release_renewal_lock(&self, credential_id: Uuid, lock: Arc<Mutex<()>>) {
        let mut locks = self.renewals.lock().await;
        drop(lock);
        if locks
            .get(&credential_id)
            .is_some_and(|l| Arc::strong_count(l) == 1)
        {
            locks.remove(&credential_id);
        }
    }

    /// 새 자격증명을 암호화하여 저장.
    ///
    /// 같은 (사용자, 거래소, 라벨)의 활성 자격증명이 있으면 `ValidationFailed`.
    pub async fn store_credential(
        &self,
        input: NewCredentialInput,
    ) -> ExchangeResult<ExchangeCredential> {
        let label = input
            .label
            .filter(|l| !l.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_CREDENTIAL_LABEL.to_string());

        let new_credential = NewCredential {
            user_id: input.user_id,
            exchange_id: input.exchange_id,
            label: label.clone(),
            api_key: self.seal(input.api_key.expose_secret())?,
            secret_key: self.seal(input.secret_key.expose_secret())?,
            access_key: input
                .access_key
                .as_ref()
                .map(|k| self.seal(k.expose_secret()))
                .transpose()?,
            refresh_key: input
                .refresh_key
                .as_ref()
                .map(|k| self.seal(k.expose_secret()))
                .transpose()?,
            access_expires_at: input.access_expires_at,
            is_testnet: input.is_testnet,
        };

        let record = self
            .store
            .insert_credential(&new_credential)
            .await
            .map_err(|e| match e {
                StoreError::Conflict(_) => ExchangeError::ValidationFailed(format!(
                    "an active credential labelled '{}' already exists for this exchange",
                    label
                )),
                other => other.into(),
            })?;

        info!(
            user_id = %record.user_id,
            exchange_id = %record.exchange_id,
            credential_id = %record.id,
            label = %record.label,
            "Credential stored"
        );

        Ok(record)
    }

    /// 마지막 사용 시각 갱신.
    pub async fn mark_used(&self, credential_id: Uuid) -> ExchangeResult<()> {
        self.store
            .touch_credential(credential_id, Utc::now())
            .await
            .map_err(Into::into)
    }

    /// 사용자의 활성 자격증명 (암호화된 상태 그대로).
    pub async fn list_for_user(&self, user_id: Uuid) -> ExchangeResult<Vec<ExchangeCredential>> {
        Ok(self.store.list_credentials(user_id).await?)
    }

    /// 자격증명 비활성화.
    pub async fn deactivate(&self, credential_id: Uuid) -> ExchangeResult<()> {
        self.store.deactivate_credential(credential_id).await?;
        info!(credential_id = %credential_id, "Credential deactivated");
        Ok(())
    }

    fn seal(&self, plaintext: &str) -> ExchangeResult<String> {
        self.codec
            .encrypt(plaintext)
            .map_err(|e| ExchangeError::Internal(format!("failed to encrypt credential: {}", e)))
    }

    fn open(&self, envelope: &str) -> ExchangeResult<SecretString> {
        Ok(self.codec.decrypt_secret(envelope)?)
    }

    fn decrypt(&self, record: ExchangeCredential) -> ExchangeResult<DecryptedCredential> {
        let access_key = record.access_key.as_deref().map(|v| self.open(v)).transpose()?;
        let refresh_key = record.refresh_key.as_deref().map(|v| self.open(v)).transpose()?;

        Ok(DecryptedCredential {
            id: record.id,
            user_id: record.user_id,
            exchange_id: record.exchange_id,
            label: record.label,
            api_key: self.open(&record.api_key)?,
            secret_key: self.open(&record.secret_key)?,
            access_key,
            refresh_key,
            access_expires_at: record.access_expires_at,
            is_testnet: record.is_testnet,
            last_used: record.last_used,
        })
    }
}
