//! 거래소 커넥터.
//!
//! 거래소별 어댑터와 어댑터들이 공유하는 저장/파싱 헬퍼입니다.

pub mod bitpin;
pub mod nobitex;

pub use bitpin::BitpinExchange;
pub use nobitex::NobitexExchange;

use crate::catalog::SymbolCatalog;
use crate::credentials::CredentialManager;
use crate::error::ExchangeError;
use crate::registry::AdapterContext;
use crate::traits::ExchangeResult;
use crate::transport::{ApiRequest, HttpTransport, RawResponse};
use crate::translator::{parse_symbol, SymbolParts};
use chrono::Utc;
use eyeon_core::{
    ExchangeRecord, NewBalanceSnapshot, NewOrderBookSnapshot, NewOrderHistory, OrderHistory,
    OrderLevel, OrderStatus, OrderType, Side, StandardBalanceResponse, StandardOrderBookResponse,
    StandardOrderResponse, Store, TradingPair,
};
use rust_decimal::Decimal;
use serde_json::Value;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};
use uuid::Uuid;

/// 주문 기록의 복합 클라이언트 주문 ID.
pub fn composite_order_id(exchange_order_id: &str, user_id: Uuid) -> String {
    format!("{}-{}", exchange_order_id, user_id)
}

/// 거래소 숫자 문자열 파싱 (빈 문자열은 `None`).
pub fn parse_decimal(raw: &str) -> Option<Decimal> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    Decimal::from_str(raw)
        .or_else(|_| Decimal::from_scientific(raw))
        .ok()
}

fn decimal_from_value(value: &Value) -> Option<Decimal> {
    match value {
        Value::String(s) => parse_decimal(s),
        Value::Number(n) => parse_decimal(&n.to_string()),
        _ => None,
    }
}

/// 문자열/숫자 형태의 거래소 주문 ID.
pub(crate) fn id_from_value(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// `[price, quantity]` 호가 레벨 배열 파싱.
///
/// 형식이 잘못된 레벨은 건너뜁니다.
pub fn parse_levels(levels: &[Value]) -> Vec<OrderLevel> {
    levels
        .iter()
        .filter_map(|level| {
            let parsed = level.as_array().and_then(|pair| {
                let price = decimal_from_value(pair.first()?)?;
                let quantity = decimal_from_value(pair.get(1)?)?;
                Some(OrderLevel { price, quantity })
            });
            if parsed.is_none() {
                debug!(level = %level, "Skipping malformed order book level");
            }
            parsed
        })
        .collect()
}

/// 거래소 주문 접수 응답에서 추출한 값.
#[derive(Debug, Clone)]
pub(crate) struct OrderAck {
    pub exchange_order_id: String,
    pub side: Side,
    pub order_type: OrderType,
    pub quantity: Decimal,
    pub price: Option<Decimal>,
    pub status: OrderStatus,
}

/// 어댑터 공통 의존성.
pub(crate) struct AdapterCore {
    pub exchange: ExchangeRecord,
    pub store: Arc<dyn Store>,
    pub credentials: Arc<CredentialManager>,
    pub catalog: Arc<dyn SymbolCatalog>,
    pub transport: HttpTransport,
}

impl AdapterCore {
    pub fn new(ctx: AdapterContext) -> ExchangeResult<Self> {
        let transport = HttpTransport::new(
            ctx.exchange.name.clone(),
            ctx.config.base_url.clone(),
            Duration::from_secs(ctx.config.timeout_secs),
        )?;

        Ok(Self {
            exchange: ctx.exchange,
            store: ctx.store,
            credentials: ctx.credentials,
            catalog: ctx.catalog,
            transport,
        })
    }

    pub fn name(&self) -> &str {
        &self.exchange.name
    }

    pub fn exchange_id(&self) -> Uuid {
        self.exchange.id
    }

    pub fn upstream(&self, response: &RawResponse) -> ExchangeError {
        ExchangeError::upstream(self.name(), response.status, response.body.clone())
    }

    /// 공개 엔드포인트 도달 확인.
    pub async fn ping(&self, path: &str) -> ExchangeResult<()> {
        let response = self.transport.send(&ApiRequest::Get(path.to_string()), None).await?;
        if !response.is_success() {
            return Err(self.upstream(&response));
        }
        Ok(())
    }

    /// 정규 심볼을 거래소 형식으로 바꾸고 저장된 거래쌍을 찾습니다.
    pub async fn resolve_pair(&self, symbol: &str) -> ExchangeResult<(SymbolParts, TradingPair)> {
        let parts = parse_symbol(symbol)?;
        let native = self.catalog.format_symbol(&parts);

        let pair = self
            .store
            .find_trading_pair(self.exchange_id(), &native)
            .await?
            .ok_or_else(|| ExchangeError::SymbolNotFound {
                exchange: self.name().to_string(),
                symbol: native,
            })?;

        Ok((parts, pair))
    }

    /// 사용자/거래소 범위의 주문 기록과 거래쌍.
    pub async fn find_order(
        &self,
        order_id: Uuid,
        user_id: Uuid,
    ) -> ExchangeResult<(OrderHistory, TradingPair)> {
        let order = self
            .store
            .find_order(order_id, user_id, self.exchange_id())
            .await?
            .ok_or_else(|| ExchangeError::NotFound(format!("order {}", order_id)))?;

        let pair = self
            .store
            .find_trading_pair_by_id(order.trading_pair_id)
            .await?
            .ok_or_else(|| {
                ExchangeError::NotFound(format!("trading pair {}", order.trading_pair_id))
            })?;

        Ok((order, pair))
    }

    /// 잔고 스냅샷을 한 번에 저장.
    pub async fn record_balances(
        &self,
        user_id: Uuid,
        balances: Vec<StandardBalanceResponse>,
    ) -> ExchangeResult<Vec<StandardBalanceResponse>> {
        if balances.is_empty() {
            return Ok(balances);
        }

        let snapshot_time = Utc::now();
        let snapshots: Vec<NewBalanceSnapshot> = balances
            .iter()
            .map(|b| NewBalanceSnapshot {
                user_id,
                exchange_id: self.exchange_id(),
                currency: b.asset.clone(),
                total: b.total,
                available: b.available,
                snapshot_time,
            })
            .collect();

        self.store.insert_balance_snapshots(&snapshots).await?;
        Ok(balances)
    }

    pub async fn record_order_book(
        &self,
        pair: &TradingPair,
        bids: Vec<OrderLevel>,
        asks: Vec<OrderLevel>,
    ) -> ExchangeResult<StandardOrderBookResponse> {
        let snapshot = self
            .store
            .insert_order_book_snapshot(&NewOrderBookSnapshot {
                exchange_id: self.exchange_id(),
                trading_pair_id: pair.id,
                symbol: pair.symbol.clone(),
                bids,
                asks,
                snapshot_time: Utc::now(),
            })
            .await?;

        Ok(StandardOrderBookResponse {
            exchange: self.name().to_string(),
            symbol: snapshot.symbol,
            bids: snapshot.bids,
            asks: snapshot.asks,
            snapshot_time: snapshot.snapshot_time,
        })
    }

    /// 주문 기록 저장 후 정규 응답 생성.
    pub async fn record_order(
        &self,
        ack: OrderAck,
        user_id: Uuid,
        credential_id: Uuid,
        pair: &TradingPair,
    ) -> ExchangeResult<StandardOrderResponse> {
        let history = self
            .store
            .insert_order(&NewOrderHistory {
                user_id,
                exchange_credential_id: credential_id,
                exchange_id: self.exchange_id(),
                trading_pair_id: pair.id,
                client_order_id: composite_order_id(&ack.exchange_order_id, user_id),
                exchange_order_id: ack.exchange_order_id.clone(),
                side: ack.side.as_str().to_string(),
                order_type: ack.order_type.as_str().to_string(),
                quantity: ack.quantity,
                price: ack.price,
                status: ack.status.as_str().to_string(),
            })
            .await?;

        Ok(StandardOrderResponse {
            id: history.client_order_id,
            history_id: history.id,
            exchange: self.name().to_string(),
            exchange_order_id: ack.exchange_order_id,
            symbol: pair.symbol.clone(),
            side: ack.side,
            order_type: ack.order_type,
            quantity: ack.quantity,
            price: ack.price,
            status: ack.status,
            created_at: history.created_at,
        })
    }

    /// 자격증명 사용 시각 기록. 실패해도 요청 결과는 유지합니다.
    pub async fn touch(&self, credential_id: Uuid) {
        if let Err(e) = self.credentials.mark_used(credential_id).await {
            warn!(
                exchange = %self.name(),
                credential_id = %credential_id,
                error = %e,
                "Failed to update credential last_used"
            );
        }
    }
}
