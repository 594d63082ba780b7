//! # 암호화 모듈
//!
//! AES-256-GCM을 사용한 자격증명 필드 암호화/복호화 기능을 제공합니다.
//!
//! ## 저장 형식
//! `v1.<key-id>.<base64(nonce || ciphertext)>`
//!
//! - `key-id`: 마스터 키 지문 (SHA-256 앞 4바이트, hex)
//! - 각 암호화마다 고유한 nonce (12바이트) 사용
//!
//! key-id 덕분에 "다른 키로 암호화된 값"과 "변조된 값"을 구분할 수 있습니다.

use aes_gcm::{
    aead::{Aead, KeyInit, OsRng},
    Aes256Gcm, Nonce,
};
use base64::Engine;
use rand::RngCore;
use secrecy::{ExposeSecret, SecretString};
use sha2::{Digest, Sha256};
use std::fmt;
use thiserror::Error;

/// 암호화 에러
#[derive(Error, Debug)]
pub enum CryptoError {
    #[error("Invalid master key length: expected 32 bytes, got {0}")]
    InvalidKeyLength(usize),

    #[error("Master key is not valid base64: {0}")]
    InvalidKeyEncoding(String),

    #[error("Encryption failed: {0}")]
    EncryptionFailed(String),

    /// 봉투 형식/base64/길이가 잘못됨
    #[error("Malformed ciphertext: {0}")]
    Malformed(String),

    /// 다른 마스터 키로 암호화된 값
    #[error("Ciphertext was sealed with a different key (key id {found}, expected {expected})")]
    WrongKey { expected: String, found: String },

    /// 키는 맞지만 인증 태그 검증 실패 (변조)
    #[error("Ciphertext integrity check failed")]
    IntegrityFailed,

    #[error("UTF-8 decode error: {0}")]
    Utf8Error(#[from] std::string::FromUtf8Error),

    #[error("Master key not configured")]
    MasterKeyNotConfigured,
}

/// AES-256-GCM nonce 크기 (바이트)
pub const NONCE_SIZE: usize = 12;

/// AES-256 키 크기 (바이트)
pub const KEY_SIZE: usize = 32;

/// AES-GCM 인증 태그 크기 (바이트)
const TAG_SIZE: usize = 16;

const ENVELOPE_VERSION: &str = "v1";
const KEY_ID_DOMAIN: &[u8] = b"eyeon.secret-codec.key-id";

/// 자격증명 필드 암호화 코덱.
///
/// 프로세스 전역 마스터 키 하나로 생성하며, 생성 후에는 불변이므로
/// `Arc`로 공유해 동시에 사용할 수 있습니다.
pub struct SecretCodec {
    cipher: Aes256Gcm,
    key_id: String,
}

impl fmt::Debug for SecretCodec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SecretCodec")
            .field("key_id", &self.key_id)
            .finish_non_exhaustive()
    }
}

impl SecretCodec {
    /// Base64 마스터 키로 코덱 생성
    ///
    /// # Example
    /// ```ignore
    /// let key = std::env::var("EYEON__SECURITY__ENCRYPTION_KEY")?;
    /// let codec = SecretCodec::new(&key)?;
    /// ```
    pub fn new(master_key: &str) -> Result<Self, CryptoError> {
        if master_key.trim().is_empty() {
            return Err(CryptoError::MasterKeyNotConfigured);
        }

        let key_bytes = Self::decode_key(master_key)?;
        let cipher = Aes256Gcm::new_from_slice(&key_bytes)
            .map_err(|_| CryptoError::InvalidKeyLength(key_bytes.len()))?;

        Ok(Self {
            cipher,
            key_id: Self::fingerprint(&key_bytes),
        })
    }

    /// 설정의 `SecretString`에서 코덱 생성
    pub fn from_secret(master_key: &SecretString) -> Result<Self, CryptoError> {
        Self::new(master_key.expose_secret())
    }

    fn decode_key(master_key: &str) -> Result<Vec<u8>, CryptoError> {
        let key_bytes = base64::engine::general_purpose::STANDARD
            .decode(master_key.trim())
            .map_err(|e| CryptoError::InvalidKeyEncoding(e.to_string()))?;

        if key_bytes.len() != KEY_SIZE {
            return Err(CryptoError::InvalidKeyLength(key_bytes.len()));
        }

        Ok(key_bytes)
    }

    fn fingerprint(key_bytes: &[u8]) -> String {
        let mut hasher = Sha256::new();
        hasher.update(KEY_ID_DOMAIN);
        hasher.update(key_bytes);
        hex::encode(&hasher.finalize()[..4])
    }

    /// 마스터 키 지문
    pub fn key_id(&self) -> &str {
        &self.key_id
    }

    /// 랜덤 nonce 생성
    fn generate_nonce() -> [u8; NONCE_SIZE] {
        let mut nonce = [0u8; NONCE_SIZE];
        OsRng.fill_bytes(&mut nonce);
        nonce
    }

    /// 문자열 암호화.
    ///
    /// 같은 평문이라도 nonce가 매번 달라 결과 봉투는 항상 다릅니다.
    pub fn encrypt(&self, plaintext: &str) -> Result<String, CryptoError> {
        let nonce_bytes = Self::generate_nonce();
        let nonce = Nonce::from_slice(&nonce_bytes);

        let ciphertext = self
            .cipher
            .encrypt(nonce, plaintext.as_bytes())
            .map_err(|e| CryptoError::EncryptionFailed(e.to_string()))?;

        let mut sealed = Vec::with_capacity(NONCE_SIZE + ciphertext.len());
        sealed.extend_from_slice(&nonce_bytes);
        sealed.extend_from_slice(&ciphertext);

        Ok(format!(
            "{}.{}.{}",
            ENVELOPE_VERSION,
            self.key_id,
            base64::engine::general_purpose::STANDARD.encode(sealed)
        ))
    }

    /// 봉투 복호화
    pub fn decrypt(&self, envelope: &str) -> Result<String, CryptoError> {
        let mut parts = envelope.splitn(3, '.');
        let (version, key_id, payload) = match (parts.next(), parts.next(), parts.next()) {
            (Some(v), Some(k), Some(p)) => (v, k, p),
            _ => return Err(CryptoError::Malformed("expected 3 envelope segments".into())),
        };

        if version != ENVELOPE_VERSION {
            return Err(CryptoError::Malformed(format!(
                "unsupported envelope version '{}'",
                version
            )));
        }

        if key_id != self.key_id {
            return Err(CryptoError::WrongKey {
                expected: self.key_id.clone(),
                found: key_id.to_string(),
            });
        }

        let sealed = base64::engine::general_purpose::STANDARD
            .decode(payload)
            .map_err(|e| CryptoError::Malformed(e.to_string()))?;

        if sealed.len() < NONCE_SIZE + TAG_SIZE {
            return Err(CryptoError::Malformed(format!(
                "sealed payload too short ({} bytes)",
                sealed.len()
            )));
        }

        let (nonce_bytes, ciphertext) = sealed.split_at(NONCE_SIZE);
        let plaintext = self
            .cipher
            .decrypt(Nonce::from_slice(nonce_bytes), ciphertext)
            .map_err(|_| CryptoError::IntegrityFailed)?;

        String::from_utf8(plaintext).map_err(CryptoError::from)
    }

    /// 복호화 결과를 `SecretString`으로 감싸 반환
    pub fn decrypt_secret(&self, envelope: &str) -> Result<SecretString, CryptoError> {
        self.decrypt(envelope).map(|plain| SecretString::new(plain.into()))
    }
}

/// 새로운 마스터 키 생성 (초기 설정용)
///
/// # Example
/// ```
/// let key = eyeon_core::crypto::generate_master_key();
/// println!("EYEON__SECURITY__ENCRYPTION_KEY={}", key);
/// ```
pub fn generate_master_key() -> String {
    let mut key = [0u8; KEY_SIZE];
    OsRng.fill_bytes(&mut key);
    base64::engine::general_purpose::STANDARD.encode(key)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn test_codec() -> SecretCodec {
        SecretCodec::new(&generate_master_key()).unwrap()
    }

    #[test]
    fn test_encrypt_decrypt_string() {
        let codec = test_codec();
        let plaintext = "my-secret-api-key-12345";

        let envelope = codec.encrypt(plaintext).unwrap();
        assert!(envelope.starts_with("v1."));
        assert!(!envelope.contains(plaintext));

        assert_eq!(codec.decrypt(&envelope).unwrap(), plaintext);
    }

    #[test]
    fn test_fresh_nonce_per_encryption() {
        let codec = test_codec();
        let a = codec.encrypt("same").unwrap();
        let b = codec.encrypt("same").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_invalid_key_length() {
        let short_key = base64::engine::general_purpose::STANDARD.encode([0u8; 16]);
        let result = SecretCodec::new(&short_key);
        assert!(matches!(result, Err(CryptoError::InvalidKeyLength(16))));
    }

    #[test]
    fn test_empty_key_is_not_configured() {
        assert!(matches!(
            SecretCodec::new("  "),
            Err(CryptoError::MasterKeyNotConfigured)
        ));
    }

    #[test]
    fn test_wrong_key_is_distinct_from_tampering() {
        let codec = test_codec();
        let other = test_codec();
        let envelope = codec.encrypt("secret").unwrap();

        assert!(matches!(
            other.decrypt(&envelope),
            Err(CryptoError::WrongKey { .. })
        ));

        // 마지막 바이트를 변조
        let (head, payload) = envelope.rsplit_once('.').unwrap();
        let mut sealed = base64::engine::general_purpose::STANDARD
            .decode(payload)
            .unwrap();
        let last = sealed.len() - 1;
        sealed[last] ^= 0x01;
        let tampered = format!(
            "{}.{}",
            head,
            base64::engine::general_purpose::STANDARD.encode(sealed)
        );

        assert!(matches!(
            codec.decrypt(&tampered),
            Err(CryptoError::IntegrityFailed)
        ));
    }

    #[test]
    fn test_malformed_envelopes() {
        let codec = test_codec();
        let prefix = format!("v1.{}.", codec.key_id());

        assert!(matches!(codec.decrypt("garbage"), Err(CryptoError::Malformed(_))));
        assert!(matches!(
            codec.decrypt(&format!("v2.{}.AAAA", codec.key_id())),
            Err(CryptoError::Malformed(_))
        ));
        assert!(matches!(
            codec.decrypt(&format!("{}not*base64", prefix)),
            Err(CryptoError::Malformed(_))
        ));
        assert!(matches!(
            codec.decrypt(&format!("{}AAAA", prefix)),
            Err(CryptoError::Malformed(_))
        ));
    }

    #[test]
    fn test_generate_master_key() {
        let key1 = generate_master_key();
        let key2 = generate_master_key();

        assert_ne!(key1, key2);
        assert!(SecretCodec::new(&key1).is_ok());
        assert_ne!(
            SecretCodec::new(&key1).unwrap().key_id(),
            SecretCodec::new(&key2).unwrap().key_id()
        );
    }

    proptest! {
        #[test]
        fn prop_round_trip(plaintext in ".*") {
            let codec = test_codec();
            let envelope = codec.encrypt(&plaintext).unwrap();
            prop_assert_eq!(codec.decrypt(&envelope).unwrap(), plaintext);
        }
    }
}
