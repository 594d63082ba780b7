//! 거래소 에러 타입.

use eyeon_core::{CryptoError, StoreError};
use thiserror::Error;

/// 상위 계층(HTTP 등)으로 매핑하기 위한 에러 분류.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    NotFound,
    Validation,
    AuthExpired,
    Upstream,
    Decryption,
    Internal,
}

/// 거래소 관련 에러.
#[derive(Debug, Error)]
pub enum ExchangeError {
    /// 자격증명/주문/거래소 등 레코드 없음
    #[error("Not found: {0}")]
    NotFound(String),

    /// 거래소 카탈로그에 없는 심볼
    #[error("Symbol not found on {exchange}: {symbol}")]
    SymbolNotFound { exchange: String, symbol: String },

    /// 주문 요청 검증 실패 (네트워크 호출 전)
    #[error("Validation failed: {0}")]
    ValidationFailed(String),

    /// 수량을 결정할 수 없음
    #[error("Amount indeterminate: {0}")]
    AmountIndeterminate(String),

    /// 심볼을 기준/호가 자산으로 분리할 수 없음
    #[error("Unparseable symbol: {0}")]
    UnparseableSymbol(String),

    /// 액세스 토큰 만료 (갱신 후 재시도 대상)
    #[error("Access token expired on {exchange}")]
    AuthExpired { exchange: String },

    /// 거래소가 성공이 아닌 응답을 반환
    #[error("{exchange} returned {status}: {body}")]
    Upstream {
        exchange: String,
        status: u16,
        body: String,
    },

    /// 주문 취소가 성공 신호 없이 끝남
    #[error("{exchange} cancellation failed with {status}: {body}")]
    CancellationFailed {
        exchange: String,
        status: u16,
        body: String,
    },

    /// 자격증명 복호화 실패
    #[error("Decryption failed: {0}")]
    DecryptionFailed(String),

    /// 네트워크/연결 에러
    #[error("Network error: {0}")]
    NetworkError(String),

    /// 타임아웃
    #[error("Request timeout: {0}")]
    Timeout(String),

    /// 응답 파싱 에러
    #[error("Parse error: {0}")]
    ParseError(String),

    /// 레지스트리에 없는 거래소
    #[error("Unsupported exchange: {0}")]
    UnsupportedExchange(String),

    /// 이미 등록된 거래소 이름
    #[error("Exchange already registered: {0}")]
    AlreadyRegistered(String),

    /// 저장소/내부 에러
    #[error("Internal error: {0}")]
    Internal(String),
}

impl ExchangeError {
    /// 상위 계층 매핑용 분류.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::NotFound(_) | Self::SymbolNotFound { .. } | Self::UnsupportedExchange(_) => {
                ErrorKind::NotFound
            }
            Self::ValidationFailed(_)
            | Self::AmountIndeterminate(_)
            | Self::UnparseableSymbol(_) => ErrorKind::Validation,
            Self::AuthExpired { .. } => ErrorKind::AuthExpired,
            Self::Upstream { .. }
            | Self::CancellationFailed { .. }
            | Self::NetworkError(_)
            | Self::Timeout(_)
            | Self::ParseError(_) => ErrorKind::Upstream,
            Self::DecryptionFailed(_) => ErrorKind::Decryption,
            Self::AlreadyRegistered(_) | Self::Internal(_) => ErrorKind::Internal,
        }
    }

    /// 에러를 만든 거래소 이름 (알 수 있을 때).
    pub fn exchange(&self) -> Option<&str> {
        match self {
            Self::SymbolNotFound { exchange, .. }
            | Self::AuthExpired { exchange }
            | Self::Upstream { exchange, .. }
            | Self::CancellationFailed { exchange, .. } => Some(exchange),
            _ => None,
        }
    }

    /// 인증 만료 에러인지 확인.
    pub fn is_auth_expired(&self) -> bool {
        matches!(self, Self::AuthExpired { .. })
    }

    pub fn upstream(exchange: &str, status: u16, body: impl Into<String>) -> Self {
        Self::Upstream {
            exchange: exchange.to_string(),
            status,
            body: body.into(),
        }
    }
}

impl From<reqwest::Error> for ExchangeError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            ExchangeError::Timeout(err.to_string())
        } else {
            ExchangeError::NetworkError(err.to_string())
        }
    }
}

impl From<serde_json::Error> for ExchangeError {
    fn from(err: serde_json::Error) -> Self {
        ExchangeError::ParseError(err.to_string())
    }
}

impl From<CryptoError> for ExchangeError {
    fn from(err: CryptoError) -> Self {
        ExchangeError::DecryptionFailed(err.to_string())
    }
}

impl From<StoreError> for ExchangeError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(what) => ExchangeError::NotFound(what),
            other => ExchangeError::Internal(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_mapping() {
        assert_eq!(
            ExchangeError::AmountIndeterminate("x".into()).kind(),
            ErrorKind::Validation
        );
        assert_eq!(
            ExchangeError::upstream("bitpin", 500, "boom").kind(),
            ErrorKind::Upstream
        );
        assert_eq!(
            ExchangeError::from(StoreError::NotFound("credential".into())).kind(),
            ErrorKind::NotFound
        );
        assert_eq!(
            ExchangeError::from(CryptoError::IntegrityFailed).kind(),
            ErrorKind::Decryption
        );
    }

    #[test]
    fn test_upstream_keeps_raw_body() {
        let err = ExchangeError::upstream("nobitex", 422, r#"{"status":"failed"}"#);
        assert_eq!(err.exchange(), Some("nobitex"));
        assert!(err.to_string().contains(r#"{"status":"failed"}"#));
    }
}
