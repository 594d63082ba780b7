//! 정규 주문 모델.
//!
//! 거래소와 무관한 주문 요청/응답 타입을 정의합니다:
//! - `Side` - 주문 방향 (매수/매도)
//! - `OrderType` - 주문 유형 (시장가/지정가)
//! - `OrderStatus` - 정규 주문 상태
//! - `StandardOrderRequest` / `StandardOrderResponse`
//! - `CancelHints` - 거래소별 취소 방식에 필요한 부가 정보

use crate::error::ModelError;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use uuid::Uuid;

/// 주문 방향 (매수 또는 매도).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    /// 매수
    Buy,
    /// 매도
    Sell,
}

impl Side {
    pub fn as_str(&self) -> &'static str {
        match self {
            Side::Buy => "buy",
            Side::Sell => "sell",
        }
    }
}

impl std::fmt::Display for Side {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Side {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "buy" => Ok(Side::Buy),
            "sell" => Ok(Side::Sell),
            _ => Err(ModelError::invalid("side", s)),
        }
    }
}

/// 주문 유형.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderType {
    /// 시장가 주문
    Market,
    /// 지정가 주문
    Limit,
}

impl OrderType {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderType::Market => "market",
            OrderType::Limit => "limit",
        }
    }
}

impl std::fmt::Display for OrderType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OrderType {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "market" => Ok(OrderType::Market),
            "limit" => Ok(OrderType::Limit),
            _ => Err(ModelError::invalid("type", s)),
        }
    }
}

/// 정규 주문 상태.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    /// 거래소 접수 대기
    Pending,
    /// 부분 체결
    Partial,
    /// 전량 체결
    Filled,
    /// 취소됨
    Cancelled,
    /// 신규 (미체결)
    New,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Partial => "partial",
            Self::Filled => "filled",
            Self::Cancelled => "cancelled",
            Self::New => "new",
        }
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OrderStatus {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "pending" => Ok(Self::Pending),
            "partial" => Ok(Self::Partial),
            "filled" => Ok(Self::Filled),
            "cancelled" => Ok(Self::Cancelled),
            "new" => Ok(Self::New),
            _ => Err(ModelError::invalid("status", s)),
        }
    }
}

/// 정규 주문 요청.
///
/// 수량은 `quantity`, `base_amount`, `quote_amount` 중 하나 이상으로 지정합니다.
/// 어떤 값이 우선하는지는 주문 변환기(translator)가 결정합니다.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StandardOrderRequest {
    /// 정규 심볼 (예: "BTC_USDT", "BTC-USDT", "BTCUSDT")
    pub symbol: String,
    pub side: Option<Side>,
    #[serde(rename = "type")]
    pub order_type: Option<OrderType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quantity: Option<Decimal>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_amount: Option<Decimal>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quote_amount: Option<Decimal>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub price: Option<Decimal>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stop_price: Option<Decimal>,
    /// 호출자가 지정하는 주문 식별자 (거래소로 전달)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_order_id: Option<String>,
}

impl StandardOrderRequest {
    /// 지정가 주문 요청 생성.
    pub fn limit(symbol: impl Into<String>, side: Side, quantity: Decimal, price: Decimal) -> Self {
        Self {
            symbol: symbol.into(),
            side: Some(side),
            order_type: Some(OrderType::Limit),
            quantity: Some(quantity),
            price: Some(price),
            ..Default::default()
        }
    }

    /// 시장가 주문 요청 생성 (기준 자산 수량).
    pub fn market(symbol: impl Into<String>, side: Side, quantity: Decimal) -> Self {
        Self {
            symbol: symbol.into(),
            side: Some(side),
            order_type: Some(OrderType::Market),
            quantity: Some(quantity),
            ..Default::default()
        }
    }

    pub fn with_client_order_id(mut self, id: impl Into<String>) -> Self {
        self.client_order_id = Some(id.into());
        self
    }
}

/// 정규 주문 응답.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StandardOrderResponse {
    /// 복합 주문 ID (`{exchange_order_id}-{user_id}`)
    pub id: String,
    /// 주문 기록(order_history) 행 ID, 취소 시 사용
    pub history_id: Uuid,
    pub exchange: String,
    pub exchange_order_id: String,
    pub symbol: String,
    pub side: Side,
    #[serde(rename = "type")]
    pub order_type: OrderType,
    pub quantity: Decimal,
    pub price: Option<Decimal>,
    pub status: OrderStatus,
    pub created_at: DateTime<Utc>,
}

/// 주문 취소 부가 정보.
///
/// 거래소마다 취소 방식이 다릅니다.
/// - 개별 주문 취소 거래소(Bitpin)는 힌트를 사용하지 않습니다.
/// - 시간 창 일괄 취소 거래소(Nobitex)는 `hours`가 필수이며, 해당 시간 안에
///   열린 같은 마켓/실행 유형의 주문이 모두 취소됩니다.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct CancelHints {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hours: Option<Decimal>,
}

impl CancelHints {
    pub fn within_hours(hours: Decimal) -> Self {
        Self { hours: Some(hours) }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_side_and_type_parsing() {
        assert_eq!("BUY".parse::<Side>().unwrap(), Side::Buy);
        assert_eq!("sell".parse::<Side>().unwrap(), Side::Sell);
        assert!("hold".parse::<Side>().is_err());

        assert_eq!("Limit".parse::<OrderType>().unwrap(), OrderType::Limit);
        assert!("stop".parse::<OrderType>().is_err());
    }

    #[test]
    fn test_request_json_shape() {
        let json = r#"{"symbol":"BTC_USDT","side":"buy","type":"limit","quantity":"0.5","price":"50000"}"#;
        let req: StandardOrderRequest = serde_json::from_str(json).unwrap();

        assert_eq!(req, StandardOrderRequest::limit("BTC_USDT", Side::Buy, dec!(0.5), dec!(50000)));
    }

    #[test]
    fn test_unknown_side_rejected_on_deserialize() {
        let json = r#"{"symbol":"BTC_USDT","side":"hold","type":"limit"}"#;
        assert!(serde_json::from_str::<StandardOrderRequest>(json).is_err());
    }

    #[test]
    fn test_status_round_trips_through_str() {
        for status in [
            OrderStatus::Pending,
            OrderStatus::Partial,
            OrderStatus::Filled,
            OrderStatus::Cancelled,
            OrderStatus::New,
        ] {
            assert_eq!(status.as_str().parse::<OrderStatus>().unwrap(), status);
        }
    }
}
