//! 코어 에러 타입.

use thiserror::Error;

/// 정규 모델 값 파싱 에러.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ModelError {
    #[error("invalid {field}: '{value}'")]
    InvalidValue { field: &'static str, value: String },
}

impl ModelError {
    pub fn invalid(field: &'static str, value: impl Into<String>) -> Self {
        Self::InvalidValue {
            field,
            value: value.into(),
        }
    }
}

/// 저장소 에러.
///
/// 저장소 구현(PostgreSQL, 메모리)은 자체 에러를 이 타입으로 변환합니다.
#[derive(Debug, Error)]
pub enum StoreError {
    /// 레코드를 찾을 수 없음
    #[error("저장소 레코드 없음: {0}")]
    NotFound(String),

    /// 유일성 제약 위반
    #[error("저장소 충돌: {0}")]
    Conflict(String),

    /// 데이터베이스/드라이버 에러
    #[error("데이터베이스 에러: {0}")]
    Database(String),
}

/// 저장소 작업 Result 타입.
pub type StoreResult<T> = Result<T, StoreError>;
