//! 잔고 및 호가창 정규 모델.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// 자산별 잔고.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StandardBalanceResponse {
    /// 대문자 자산 코드 (예: "BTC", "IRT")
    pub asset: String,
    /// 총 잔고
    pub total: Decimal,
    /// 사용 가능 잔고 (총 잔고 - 주문에 묶인 잔고)
    pub available: Decimal,
}

impl StandardBalanceResponse {
    pub fn new(asset: impl AsRef<str>, total: Decimal, available: Decimal) -> Self {
        Self {
            asset: asset.as_ref().trim().to_uppercase(),
            total,
            available,
        }
    }

    /// 주문에 묶인 잔고.
    pub fn locked(&self) -> Decimal {
        self.total - self.available
    }
}

/// 호가 레벨.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OrderLevel {
    pub price: Decimal,
    pub quantity: Decimal,
}

/// 호가창 스냅샷.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StandardOrderBookResponse {
    pub exchange: String,
    /// 거래소 고유 심볼
    pub symbol: String,
    pub bids: Vec<OrderLevel>,
    pub asks: Vec<OrderLevel>,
    pub snapshot_time: DateTime<Utc>,
}

impl StandardOrderBookResponse {
    pub fn best_bid(&self) -> Option<&OrderLevel> {
        self.bids.first()
    }

    pub fn best_ask(&self) -> Option<&OrderLevel> {
        self.asks.first()
    }
}
