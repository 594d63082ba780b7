//! 거래소 어댑터 서브시스템.
//!
//! 이 크레이트는 다음을 제공합니다:
//! - Exchange trait: 통합 거래소 인터페이스
//! - Bitpin, Nobitex 커넥터
//! - 거래소 레지스트리와 심볼 카탈로그 정합
//! - 자격증명 수명 주기 관리 (복호화, 토큰 갱신)
//! - 정규 주문 ↔ 거래소 페이로드 변환
//! - HTTP 전송 계층

pub mod catalog;
pub mod connector;
pub mod credentials;
pub mod error;
pub mod registry;
pub mod traits;
pub mod translator;
pub mod transport;

pub use catalog::{BitpinCatalog, CatalogEntry, NobitexCatalog, SymbolCatalog};
pub use connector::{BitpinExchange, NobitexExchange};
pub use credentials::{
    CredentialManager, DecryptedCredential, NewCredentialInput, RenewedTokens, TokenRenewer,
};
pub use error::*;
pub use registry::{
    AdapterConstructor, AdapterContext, ExchangeHandle, ExchangeRegistry, ExchangeRegistryBuilder,
};
pub use traits::*;
pub use translator::SymbolParts;
pub use transport::{AuthScheme, HttpTransport};
