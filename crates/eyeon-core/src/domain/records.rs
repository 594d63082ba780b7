//! 영속 레코드 타입.
//!
//! 저장소 포트(`crate::repository`)가 읽고 쓰는 행(row) 구조체입니다.
//! 관계는 외래 키 ID로만 표현하고, 필요한 엔티티는 명시적으로 조회합니다.

use super::market::OrderLevel;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// 기본 자격증명 라벨
pub const DEFAULT_CREDENTIAL_LABEL: &str = "Default";

// ============================================================================
// 거래소 / 거래쌍
// ============================================================================

/// 거래소 레코드.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx-support", derive(sqlx::FromRow))]
pub struct ExchangeRecord {
    pub id: Uuid,
    /// 활성 행 중 유일한 이름 (예: "bitpin")
    pub name: String,
    pub display_name: String,
    pub base_url: String,
    /// 분당 요청 한도
    pub rate_limit: i32,
    pub features: serde_json::Value,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

/// 새 거래소 입력.
#[derive(Debug, Clone)]
pub struct NewExchange {
    pub name: String,
    pub display_name: String,
    pub base_url: String,
    pub rate_limit: i32,
    pub features: serde_json::Value,
}

/// 거래쌍 레코드.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx-support", derive(sqlx::FromRow))]
pub struct TradingPair {
    pub id: Uuid,
    pub exchange_id: Uuid,
    /// 거래소 고유 심볼 (예: "BTC_USDT", "BTCUSDT")
    pub symbol: String,
    pub base_asset: String,
    pub quote_asset: String,
    pub tick_size: Decimal,
    pub step_size: Decimal,
    pub min_quantity: Option<Decimal>,
    pub max_quantity: Option<Decimal>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

/// 새 거래쌍 입력.
#[derive(Debug, Clone, PartialEq)]
pub struct NewTradingPair {
    pub exchange_id: Uuid,
    pub symbol: String,
    pub base_asset: String,
    pub quote_asset: String,
    pub tick_size: Decimal,
    pub step_size: Decimal,
    pub min_quantity: Option<Decimal>,
    pub max_quantity: Option<Decimal>,
}

// ============================================================================
// 자격증명
// ============================================================================

/// 거래소 자격증명 레코드.
///
/// `api_key`, `secret_key`, `access_key`, `refresh_key`는 모두
/// `SecretCodec` 봉투 형태로 암호화되어 저장됩니다.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx-support", derive(sqlx::FromRow))]
pub struct ExchangeCredential {
    pub id: Uuid,
    pub user_id: Uuid,
    pub exchange_id: Uuid,
    pub label: String,
    pub api_key: String,
    pub secret_key: String,
    pub access_key: Option<String>,
    pub refresh_key: Option<String>,
    /// 액세스 토큰 예상 만료 시각 (선제 갱신용)
    pub access_expires_at: Option<DateTime<Utc>>,
    pub is_testnet: bool,
    pub is_active: bool,
    pub last_used: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// 새 자격증명 입력 (이미 암호화된 값).
#[derive(Debug, Clone)]
pub struct NewCredential {
    pub user_id: Uuid,
    pub exchange_id: Uuid,
    pub label: String,
    pub api_key: String,
    pub secret_key: String,
    pub access_key: Option<String>,
    pub refresh_key: Option<String>,
    pub access_expires_at: Option<DateTime<Utc>>,
    pub is_testnet: bool,
}

/// 토큰 갱신 후 덮어쓸 암호화된 비밀 값.
#[derive(Debug, Clone)]
pub struct RotatedSecrets {
    pub api_key: String,
    pub access_key: String,
    /// `None`이면 기존 값을 유지
    pub refresh_key: Option<String>,
    pub access_expires_at: Option<DateTime<Utc>>,
}

// ============================================================================
// 주문 기록
// ============================================================================

/// 주문 기록 레코드.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx-support", derive(sqlx::FromRow))]
pub struct OrderHistory {
    pub id: Uuid,
    pub user_id: Uuid,
    pub exchange_credential_id: Uuid,
    pub exchange_id: Uuid,
    pub trading_pair_id: Uuid,
    pub client_order_id: String,
    pub exchange_order_id: String,
    pub side: String,
    pub order_type: String,
    pub quantity: Decimal,
    pub price: Option<Decimal>,
    pub status: String,
    pub created_at: DateTime<Utc>,
}

/// 새 주문 기록 입력.
#[derive(Debug, Clone)]
pub struct NewOrderHistory {
    pub user_id: Uuid,
    pub exchange_credential_id: Uuid,
    pub exchange_id: Uuid,
    pub trading_pair_id: Uuid,
    pub client_order_id: String,
    pub exchange_order_id: String,
    pub side: String,
    pub order_type: String,
    pub quantity: Decimal,
    pub price: Option<Decimal>,
    pub status: String,
}

// ============================================================================
// 스냅샷
// ============================================================================

/// 잔고 스냅샷 레코드 (추가 전용).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx-support", derive(sqlx::FromRow))]
pub struct BalanceSnapshot {
    pub id: Uuid,
    pub user_id: Uuid,
    pub exchange_id: Uuid,
    pub currency: String,
    pub total: Decimal,
    pub available: Decimal,
    pub snapshot_time: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewBalanceSnapshot {
    pub user_id: Uuid,
    pub exchange_id: Uuid,
    pub currency: String,
    pub total: Decimal,
    pub available: Decimal,
    pub snapshot_time: DateTime<Utc>,
}

/// 호가창 스냅샷 레코드 (추가 전용).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderBookSnapshot {
    pub id: Uuid,
    pub exchange_id: Uuid,
    pub trading_pair_id: Uuid,
    pub symbol: String,
    pub bids: Vec<OrderLevel>,
    pub asks: Vec<OrderLevel>,
    pub snapshot_time: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewOrderBookSnapshot {
    pub exchange_id: Uuid,
    pub trading_pair_id: Uuid,
    pub symbol: String,
    pub bids: Vec<OrderLevel>,
    pub asks: Vec<OrderLevel>,
    pub snapshot_time: DateTime<Utc>,
}
