//! # Eye-on Core
//!
//! 거래소 어댑터 서브시스템의 핵심 타입을 제공합니다:
//! - 정규 주문/잔고/호가창 모델
//! - 영속 레코드와 저장소 포트
//! - 자격증명 필드 암호화 (`SecretCodec`)
//! - 설정 관리
//! - 로깅 인프라

pub mod config;
pub mod crypto;
pub mod domain;
pub mod error;
pub mod logging;
pub mod repository;

pub use config::*;
pub use crypto::{CryptoError, SecretCodec};
pub use domain::*;
pub use error::*;
pub use logging::*;
pub use repository::*;
