//! Bitpin REST API 어댑터.
//!
//! 처리 기능:
//! - 단기 액세스 토큰 인증 (`Authorization: Bearer`, `X-Timestamp`)
//! - 토큰 갱신 (리프레시 토큰, 없으면 API 키/시크릿 재인증)
//! - 지갑 잔고, 호가창, 주문 생성/취소
//!
//! 401 응답은 토큰 만료로 보고 한 번 갱신 후 한 번만 재시도합니다.

use super::{id_from_value, parse_decimal, parse_levels, AdapterCore, OrderAck};
use crate::credentials::{DecryptedCredential, RenewedTokens, TokenRenewer};
use crate::error::ExchangeError;
use crate::registry::AdapterContext;
use crate::traits::{Exchange, ExchangeResult};
use crate::transport::{ApiRequest, Authorization, RawResponse};
use crate::translator::{bitpin_order_payload, resolve_base_amount, validate_order_request};
use async_trait::async_trait;
use eyeon_core::{
    CancelHints, OrderStatus, StandardBalanceResponse, StandardOrderBookResponse,
    StandardOrderRequest, StandardOrderResponse,
};
use rust_decimal::Decimal;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

/// 기본 액세스 토큰 수명 (초).
pub const DEFAULT_TOKEN_TTL_SECS: u64 = 15 * 60;
const MAX_TOKEN_TTL_SECS: u64 = 24 * 60 * 60;

const PING_PATH: &str = "/api/v1/mkt/markets/";
const WALLETS_PATH: &str = "/api/v1/wlt/wallets/";
const ORDERS_PATH: &str = "/api/v1/odr/orders/";
const REFRESH_PATH: &str = "/api/v1/usr/refresh_token/";
const AUTHENTICATE_PATH: &str = "/api/v1/usr/authenticate/";

// ============================================================================
// 응답 타입
// ============================================================================

#[derive(Debug, Deserialize)]
struct BitpinWallet {
    asset: String,
    #[serde(default)]
    balance: String,
    #[serde(default)]
    frozen: String,
}

#[derive(Debug, Deserialize)]
struct BitpinOrderBook {
    #[serde(default)]
    bids: Vec<Value>,
    #[serde(default)]
    asks: Vec<Value>,
}

#[derive(Debug, Deserialize)]
struct BitpinOrder {
    id: Value,
    #[serde(default)]
    price: Option<String>,
    #[serde(default)]
    base_amount: Option<String>,
    #[serde(default)]
    state: Option<String>,
}

#[derive(Deserialize)]
struct BitpinTokens {
    #[serde(alias = "access_token")]
    access: String,
    #[serde(default, alias = "refresh_token")]
    refresh: Option<String>,
}

/// Bitpin 주문 상태를 정규 상태로 변환.
///
/// `filled`는 `Filled`로 변환합니다. 이전 연동은 `filled`를 `failed`로 기록했으나
/// 오기로 보고 체결로 처리합니다. 제품 확인 전까지 `test_filled_state_is_filled`가
/// 이 변환을 고정합니다.
pub fn map_order_state(state: &str) -> OrderStatus {
    match state.trim().to_lowercase().as_str() {
        "pending" => OrderStatus::Pending,
        "partial" | "partially_filled" => OrderStatus::Partial,
        "filled" | "closed" => OrderStatus::Filled,
        "cancelled" | "canceled" => OrderStatus::Cancelled,
        _ => OrderStatus::New,
    }
}

// ============================================================================
// 어댑터
// ============================================================================

/// Bitpin 거래소 어댑터.
pub struct BitpinExchange {
    core: AdapterCore,
    token_ttl: chrono::Duration,
}

impl BitpinExchange {
    pub fn new(ctx: AdapterContext) -> ExchangeResult<Self> {
        let ttl_secs = ctx
            .config
            .token_ttl_secs
            .unwrap_or(DEFAULT_TOKEN_TTL_SECS)
            .min(MAX_TOKEN_TTL_SECS);
        let token_ttl = chrono::Duration::seconds(ttl_secs as i64);

        Ok(Self {
            core: AdapterCore::new(ctx)?,
            token_ttl,
        })
    }

    /// 레지스트리 생성자.
    pub fn create(ctx: AdapterContext) -> ExchangeResult<Arc<dyn Exchange>> {
        Ok(Arc::new(Self::new(ctx)?))
    }

    async fn send_with(
        &self,
        credential: &DecryptedCredential,
        request: &ApiRequest,
    ) -> ExchangeResult<RawResponse> {
        let access = credential
            .access_key
            .as_ref()
            .ok_or_else(|| ExchangeError::AuthExpired {
                exchange: self.core.name().to_string(),
            })?;
        self.core
            .transport
            .send(request, Some(Authorization::bearer(access)))
            .await
    }

    /// 만료 임박 토큰은 먼저 갱신한 자격증명.
    async fn credential(&self, user_id: Uuid) -> ExchangeResult<DecryptedCredential> {
        self.core
            .credentials
            .fresh_credential(user_id, self.core.exchange_id(), self)
            .await
    }

    /// 인증 요청 전송. 401이면 한 번 갱신 후 한 번 재시도합니다.
    async fn send_authenticated(
        &self,
        user_id: Uuid,
        credential: DecryptedCredential,
        request: &ApiRequest,
    ) -> ExchangeResult<(DecryptedCredential, RawResponse)> {
        let exchange_id = self.core.exchange_id();
        let response = self.send_with(&credential, request).await?;
        if response.status != 401 {
            return Ok((credential, response));
        }

        warn!(
            exchange = %self.core.name(),
            user_id = %user_id,
            path = request.path(),
            "Access token rejected, renewing and retrying once"
        );

        let credential = self
            .core
            .credentials
            .renew_access_token(user_id, exchange_id, self)
            .await?;
        let response = self.send_with(&credential, request).await?;
        if response.status == 401 {
            return Err(ExchangeError::AuthExpired {
                exchange: self.core.name().to_string(),
            });
        }

        Ok((credential, response))
    }

    async fn refresh(&self, refresh_key: &SecretString) -> ExchangeResult<Option<RenewedTokens>> {
        let body = json!({ "refresh": refresh_key.expose_secret() });
        let response = self.core.transport.post_json(REFRESH_PATH, &body, None).await?;

        match response.status {
            200 | 201 => {
                let tokens: BitpinTokens = response.json()?;
                Ok(Some(RenewedTokens {
                    access_key: SecretString::new(tokens.access.into()),
                    refresh_key: tokens.refresh.map(|r| SecretString::new(r.into())),
                }))
            }
            401 => Ok(None),
            _ => Err(self.core.upstream(&response)),
        }
    }

    async fn authenticate(&self, credential: &DecryptedCredential) -> ExchangeResult<RenewedTokens> {
        let body = json!({
            "api_key": credential.api_key.expose_secret(),
            "secret_key": credential.secret_key.expose_secret(),
        });
        let response = self
            .core
            .transport
            .post_json(AUTHENTICATE_PATH, &body, None)
            .await?;

        if !matches!(response.status, 200 | 201) {
            return Err(self.core.upstream(&response));
        }

        let tokens: BitpinTokens = response.json()?;
        Ok(RenewedTokens {
            access_key: SecretString::new(tokens.access.into()),
            refresh_key: tokens.refresh.map(|r| SecretString::new(r.into())),
        })
    }
}

impl std::fmt::Debug for BitpinExchange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BitpinExchange")
            .field("exchange_id", &self.core.exchange_id())
            .field("base_url", &self.core.transport.base_url())
            .field("token_ttl", &self.token_ttl)
            .finish()
    }
}

#[async_trait]
impl TokenRenewer for BitpinExchange {
    fn token_ttl(&self) -> chrono::Duration {
        self.token_ttl
    }

    async fn renew(&self, credential: &DecryptedCredential) -> ExchangeResult<RenewedTokens> {
        if let Some(refresh_key) = &credential.refresh_key {
            if let Some(tokens) = self.refresh(refresh_key).await? {
                return Ok(tokens);
            }
            debug!(
                exchange = %self.core.name(),
                credential_id = %credential.id,
                "Refresh token rejected, re-authenticating with API key"
            );
        }

        self.authenticate(credential).await
    }
}

#[async_trait]
impl Exchange for BitpinExchange {
    fn name(&self) -> &str {
        self.core.name()
    }

    async fn ping(&self) -> ExchangeResult<()> {
        self.core.ping(PING_PATH).await
    }

    #[instrument(skip(self))]
    async fn get_balance(
        &self,
        user_id: Uuid,
        asset: Option<&str>,
    ) -> ExchangeResult<Vec<StandardBalanceResponse>> {
        let credential = self.credential(user_id).await?;
        let request = ApiRequest::Get(WALLETS_PATH.to_string());
        let (credential, response) = self
            .send_authenticated(user_id, credential, &request)
            .await?;
        if !matches!(response.status, 200 | 202) {
            return Err(self.core.upstream(&response));
        }

        let wallets: Vec<BitpinWallet> = response.json()?;
        let filter = asset.map(|a| a.trim().to_uppercase());

        let balances: Vec<StandardBalanceResponse> = wallets
            .into_iter()
            .filter(|w| {
                filter
                    .as_deref()
                    .map_or(true, |f| w.asset.trim().eq_ignore_ascii_case(f))
            })
            .filter_map(|w| {
                let Some(total) = parse_decimal(&w.balance) else {
                    warn!(asset = %w.asset, "Skipping wallet with unparseable balance");
                    return None;
                };
                let frozen = parse_decimal(&w.frozen).unwrap_or(Decimal::ZERO);
                Some(StandardBalanceResponse::new(&w.asset, total, total - frozen))
            })
            .collect();

        let balances = self.core.record_balances(user_id, balances).await?;
        self.core.touch(credential.id).await;

        debug!(user_id = %user_id, count = balances.len(), "Balances fetched");
        Ok(balances)
    }

    #[instrument(skip(self))]
    async fn get_order_book(
        &self,
        symbol: &str,
        _user_id: Uuid,
    ) -> ExchangeResult<StandardOrderBookResponse> {
        let (_, pair) = self.core.resolve_pair(symbol).await?;

        let path = format!("/api/v1/mth/orderbook/{}/", pair.symbol);
        let response = self.core.transport.send(&ApiRequest::Get(path), None).await?;
        if !matches!(response.status, 200 | 202) {
            return Err(self.core.upstream(&response));
        }

        let book: BitpinOrderBook = response.json()?;
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
        let credential = self.credential(user_id).await?;
        let (_, pair) = self.core.resolve_pair(&request.symbol).await?;
        let payload = bitpin_order_payload(request, &pair.symbol)?;

        let api_request = ApiRequest::Post(ORDERS_PATH.to_string(), serde_json::to_value(&payload)?);
        let (credential, response) = self
            .send_authenticated(user_id, credential, &api_request)
            .await?;
        if !matches!(response.status, 200 | 201) {
            return Err(self.core.upstream(&response));
        }

        let order: BitpinOrder = response.json()?;
        let exchange_order_id = id_from_value(&order.id).ok_or_else(|| {
            ExchangeError::ParseError(format!("order id missing in {} response", self.core.name()))
        })?;

        let quantity = order
            .base_amount
            .as_deref()
            .and_then(parse_decimal)
            .filter(|q| !q.is_zero())
            .map_or_else(|| resolve_base_amount(request), Ok)?;
        let price = order
            .price
            .as_deref()
            .and_then(parse_decimal)
            .filter(|p| !p.is_zero());
        let status = order
            .state
            .as_deref()
            .map_or(OrderStatus::New, map_order_state);

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

    #[instrument(skip(self, _hints))]
    async fn cancel_order(
        &self,
        order_id: Uuid,
        user_id: Uuid,
        _hints: CancelHints,
    ) -> ExchangeResult<()> {
        // 자격증명이 없으면 주문 조회 전에 실패
        let credential = self.credential(user_id).await?;
        let (order, _) = self.core.find_order(order_id, user_id).await?;

        let path = format!("{}{}/", ORDERS_PATH, order.exchange_order_id);
        let (credential, response) = self
            .send_authenticated(user_id, credential, &ApiRequest::Delete(path))
            .await?;

        if response.status != 204 {
            return Err(ExchangeError::CancellationFailed {
                exchange: self.core.name().to_string(),
                status: response.status,
                body: response.body,
            });
        }

        self.core.touch(credential.id).await;
        info!(user_id = %user_id, order_id = %order_id, "Order cancelled");
        Ok(())
    }
}
