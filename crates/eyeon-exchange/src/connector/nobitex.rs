//! Nobitex REST API 어댑터.
//!
//! 인증은 장기 API 토큰(`Authorization: Token <api key>`)을 사용하며 갱신하지 않습니다.
//! 응답 본문의 `status: failed`는 HTTP 200이어도 실패로 처리합니다.

use super::{id_from_value, parse_decimal, parse_levels, AdapterCore, OrderAck};
use crate::credentials::DecryptedCredential;
use crate::error::ExchangeError;
use crate::registry::AdapterContext;
use crate::traits::{Exchange, ExchangeResult};
use crate::transport::{ApiRequest, Authorization, RawResponse};
use crate::translator::{
    nobitex_cancel_payload, nobitex_currency, nobitex_order_payload, validate_order_request,
    SymbolParts,
};
use async_trait::async_trait;
use eyeon_core::{
    CancelHints, OrderStatus, StandardBalanceResponse, StandardOrderBookResponse,
    StandardOrderRequest, StandardOrderResponse,
};
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{debug, info, instrument};
use uuid::Uuid;

const PING_PATH: &str = "/market/stats";
const BALANCE_PATH: &str = "/users/wallets/balance";
const ORDER_ADD_PATH: &str = "/market/orders/add";
const ORDER_CANCEL_OLD_PATH: &str = "/market/orders/cancel-old";

// ============================================================================
// 응답 타입
// ============================================================================

#[derive(Debug, Deserialize)]
struct NobitexStatus {
    #[serde(default)]
    status: Option<String>,
}

impl NobitexStatus {
    fn failed(&self) -> bool {
        self.status
            .as_deref()
            .is_some_and(|s| s.eq_ignore_ascii_case("failed"))
    }

    fn ok(&self) -> bool {
        self.status
            .as_deref()
            .is_some_and(|s| s.eq_ignore_ascii_case("ok"))
    }
}

#[derive(Debug, Deserialize)]
struct NobitexBalance {
    #[serde(default)]
    balance: String,
}

#[derive(Debug, Deserialize)]
struct NobitexOrderBook {
    #[serde(default)]
    bids: Vec<Value>,
    #[serde(default)]
    asks: Vec<Value>,
}

#[derive(Debug, Deserialize)]
struct NobitexOrderEnvelope {
    order: NobitexOrder,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct NobitexOrder {
    id: Value,
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    partial: bool,
    #[serde(default)]
    amount: Option<String>,
    #[serde(default)]
    price: Option<String>,
    #[serde(default)]
    total_order_price: Option<String>,
}

/// Nobitex 주문 상태를 정규 상태로 변환.
pub fn map_order_status(status: &str, partial: bool) -> OrderStatus {
    match status.trim() {
        "Active" if partial => OrderStatus::Partial,
        "Active" => OrderStatus::New,
        "Done" => OrderStatus::Filled,
        "Canceled" => OrderStatus::Cancelled,
        "Inactive" => OrderStatus::Pending,
        _ => OrderStatus::New,
    }
}

// ============================================================================
// 어댑터
// ============================================================================

/// Nobitex 거래소 어댑터.
pub struct NobitexExchange {
    core: AdapterCore,
}

impl NobitexExchange {
    pub fn new(ctx: AdapterContext) -> ExchangeResult<Self> {
        Ok(Self {
            core: AdapterCore::new(ctx)?,
        })
    }

    /// 레지스트리 생성자.
    pub fn create(ctx: AdapterContext) -> ExchangeResult<Arc<dyn Exchange>> {
        Ok(Arc::new(Self::new(ctx)?))
    }

    async fn send_authenticated(
        &self,
        credential: &DecryptedCredential,
        request: &ApiRequest,
    ) -> ExchangeResult<RawResponse> {
        self.core
            .transport
            .send(request, Some(Authorization::token(&credential.api_key)))
            .await
    }

    /// HTTP 상태와 본문 `status`를 함께 확인.
    fn check(&self, response: &RawResponse, accepted: &[u16]) -> ExchangeResult<()> {
        if !accepted.contains(&response.status) {
            return Err(self.core.upstream(response));
        }
        let status: NobitexStatus = response.json()?;
        if status.failed() {
            return Err(self.core.upstream(response));
        }
        Ok(())
    }
}

impl std::fmt::Debug for NobitexExchange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NobitexExchange")
            .field("exchange_id", &self.core.exchange_id())
            .field("base_url", &self.core.transport.base_url())
            .finish()
    }
}

#[async_trait]
impl Exchange for NobitexExchange {
    fn name(&self) -> &str {
        self.core.name()
    }

    async fn ping(&self) -> ExchangeResult<()> {
        self.core.ping(PING_PATH).await
    }

    /// 자산 하나의 잔고만 조회할 수 있으므로 `asset`이 필수입니다.
    #[instrument(skip(self))]
    async fn get_balance(
        &self,
        user_id: Uuid,
        asset: Option<&str>,
    ) -> ExchangeResult<Vec<StandardBalanceResponse>> {
        let asset = asset
            .map(str::trim)
            .filter(|a| !a.is_empty())
            .ok_or_else(|| {
                ExchangeError::ValidationFailed("nobitex requires an asset to query balance".into())
            })?;

        let credential = self
            .core
            .credentials
            .get_by_user_and_exchange(user_id, self.core.exchange_id())
            .await?;

        let request = ApiRequest::Post(
            BALANCE_PATH.to_string(),
            json!({ "currency": nobitex_currency(asset) }),
        );
        let response = self.send_authenticated(&credential, &request).await?;
        self.check(&response, &[200])?;

        let balance: NobitexBalance = response.json()?;
        let total = parse_decimal(&balance.balance).ok_or_else(|| {
            ExchangeError::ParseError(format!("unparseable balance '{}'", balance.balance))
        })?;

        // 동결 잔고 정보가 없으므로 available = total
        let balances = vec![StandardBalanceResponse::new(asset, total, total)];
        let balances = self.core.record_balances(user_id, balances).await?;
        self.core.touch(credential.id).await;

        Ok(balances)
    }

    #[instrument(skip(self))]
    async fn get_order_book(
        &self,
        symbol: &str,
        _user_id: Uuid,
    ) -> ExchangeResult<StandardOrderBookResponse> {
        let (_, pair) = self.core.resolve_pair(symbol).await?;

        let path = format!("/v3/orderbook/{}", pair.symbol);
        let response = self.core.transport.send(&ApiRequest::Get(path), None).await?;
        self.check(&response, &[200, 202])?;

        let book: NobitexOrderBook = response.json()?;
        self.core
            .record_order_book(&pair, parse_levels(&book.bids), parse_levels(&book.asks))
            .await
    }

    #[instrument(skip(self, request), fields(symbol = %request.symbol))]
    async fn place_order(
        &self,
        request: &StandardOrderRequest,
        user_id: Uuid,
    ) -> ExchangeResult<StandardOrderResponse> {
        let (side, order_type) = validate_order_request(request)?;
        let credential = self
            .core
            .credentials
            .get_by_user_and_exchange(user_id, self.core.exchange_id())
            .await?;
        let (parts, pair) = self.core.resolve_pair(&request.symbol).await?;

        let request = match request.client_order_id.as_deref() {
            Some(id) if !id.is_empty() => request.clone(),
            _ => request
                .clone()
                .with_client_order_id(Uuid::new_v4().simple().to_string()),
        };
        let payload = nobitex_order_payload(&request, &parts)?;

        let api_request = ApiRequest::Post(ORDER_ADD_PATH.to_string(), serde_json::to_value(&payload)?);
        let response = self.send_authenticated(&credential, &api_request).await?;
        self.check(&response, &[200])?;

        let envelope: NobitexOrderEnvelope = response.json()?;
        let order = envelope.order;
        let exchange_order_id = id_from_value(&order.id).ok_or_else(|| {
            ExchangeError::ParseError(format!("order id missing in {} response", self.core.name()))
        })?;

        let quantity = order
            .amount
            .as_deref()
            .and_then(parse_decimal)
            .filter(|q| !q.is_zero())
            .or_else(|| parse_decimal(&payload.amount))
            .ok_or_else(|| ExchangeError::ParseError("order amount missing".into()))?;
        let price = [order.price.as_deref(), order.total_order_price.as_deref()]
            .into_iter()
            .flatten()
            .filter_map(parse_decimal)
            .find(|p| !p.is_zero());
        let status = order
            .status
            .as_deref()
            .map_or(OrderStatus::New, |s| map_order_status(s, order.partial));

        let ack = OrderAck {
            exchange_order_id,
            side,
            order_type,
            quantity,
            price,
            status,
        };
        let response = self
            .core
            .record_order(ack, user_id, credential.id, &pair)
            .await?;
        self.core.touch(credential.id).await;

        info!(
            user_id = %user_id,
            order_id = %response.id,
            status = %response.status,
            "Order placed"
        );
        Ok(response)
    }

    /// 시간 창 일괄 취소.
    ///
    /// 주문의 마켓/실행 유형으로 최근 `hints.hours` 시간 안에 만든 열린 주문을 모두 취소합니다.
    #[instrument(skip(self))]
    async fn cancel_order(
        &self,
        order_id: Uuid,
        user_id: Uuid,
        hints: CancelHints,
    ) -> ExchangeResult<()> {
        let hours = hints.hours.ok_or_else(|| {
            ExchangeError::ValidationFailed(
                "nobitex expects hours (to cancel orders made since x hours ago)".into(),
            )
        })?;

        let credential = self
            .core
            .credentials
            .get_by_user_and_exchange(user_id, self.core.exchange_id())
            .await?;
        let (order, pair) = self.core.find_order(order_id, user_id).await?;

        let parts = SymbolParts::new(&pair.base_asset, &pair.quote_asset);
        let payload = nobitex_cancel_payload(&order.order_type, &parts, hours)?;

        let request = ApiRequest::Post(
            ORDER_CANCEL_OLD_PATH.to_string(),
            serde_json::to_value(&payload)?,
        );
        let response = self.send_authenticated(&credential, &request).await?;

        let acknowledged = matches!(response.status, 200 | 202)
            && serde_json::from_str::<NobitexStatus>(&response.body)
                .map(|s| s.ok())
                .unwrap_or(false);
        if !acknowledged {
            return Err(ExchangeError::CancellationFailed {
                exchange: self.core.name().to_string(),
                status: response.status,
                body: response.body,
            });
        }

        self.core.touch(credential.id).await;
        debug!(user_id = %user_id, order_id = %order_id, hours = %hours, "Orders cancelled in window");
        Ok(())
    }
}
