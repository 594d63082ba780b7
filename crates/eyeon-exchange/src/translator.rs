//! 주문 변환기.
//!
//! 정규 주문 요청(`StandardOrderRequest`)을 검증하고, 수량 의미
//! (quantity / base_amount / quote_amount)를 하나의 규칙으로 정리한 뒤
//! 거래소별 주문 페이로드로 변환합니다.
//!
//! 모든 검증은 네트워크 호출 전에 수행됩니다.

use crate::error::ExchangeError;
use crate::traits::ExchangeResult;
use eyeon_core::{OrderType, Side, StandardOrderRequest};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::Serialize;

/// 구분자 없는 심볼에서 시도하는 호가 자산 (순서대로).
pub const KNOWN_QUOTE_ASSETS: [&str; 7] = ["USDT", "USDC", "BTC", "ETH", "BNB", "IRT", "RLS"];

/// 거래소로 보내는 소수 자릿수.
pub const WIRE_DECIMAL_PLACES: u32 = 8;

// ============================================================================
// 검증 / 수량 결정
// ============================================================================

fn positive(value: Option<Decimal>) -> Option<Decimal> {
    value.filter(|v| v.is_sign_positive() && !v.is_zero())
}

/// 주문 요청 검증.
///
/// 검증된 방향과 유형을 반환합니다.
pub fn validate_order_request(req: &StandardOrderRequest) -> ExchangeResult<(Side, OrderType)> {
    if req.symbol.trim().is_empty() {
        return Err(ExchangeError::ValidationFailed("symbol is required".into()));
    }

    let side = req.side.ok_or_else(|| {
        ExchangeError::ValidationFailed("invalid side: must be 'buy' or 'sell'".into())
    })?;
    let order_type = req.order_type.ok_or_else(|| {
        ExchangeError::ValidationFailed("invalid type: must be 'market' or 'limit'".into())
    })?;

    if order_type == OrderType::Limit && positive(req.price).is_none() {
        return Err(ExchangeError::ValidationFailed(
            "a positive price is required for limit orders".into(),
        ));
    }

    if positive(req.quantity).is_none()
        && positive(req.base_amount).is_none()
        && positive(req.quote_amount).is_none()
    {
        return Err(ExchangeError::ValidationFailed(
            "must specify either quantity or base_amount/quote_amount".into(),
        ));
    }

    Ok((side, order_type))
}

/// 단일 수량을 받는 거래소용 수량.
///
/// 우선순위: `quantity` → `base_amount` → `quote_amount / price`.
pub fn resolve_quantity(req: &StandardOrderRequest) -> ExchangeResult<Decimal> {
    positive(req.quantity)
        .or_else(|| positive(req.base_amount))
        .or_else(|| quote_over_price(req))
        .ok_or_else(|| {
            ExchangeError::AmountIndeterminate("cannot determine quantity from provided amounts".into())
        })
}

/// 기준 자산 수량.
///
/// 우선순위: `base_amount` → `quantity` → `quote_amount / price`.
pub fn resolve_base_amount(req: &StandardOrderRequest) -> ExchangeResult<Decimal> {
    positive(req.base_amount)
        .or_else(|| positive(req.quantity))
        .or_else(|| quote_over_price(req))
        .ok_or_else(|| {
            ExchangeError::AmountIndeterminate(
                "cannot determine base amount from provided amounts".into(),
            )
        })
}

/// 호가 자산 금액.
///
/// `quote_amount`가 있으면 그대로, 없으면 (`base_amount` 또는 `quantity`) × `price`.
pub fn resolve_quote_amount(req: &StandardOrderRequest) -> ExchangeResult<Decimal> {
    if let Some(quote) = positive(req.quote_amount) {
        return Ok(quote);
    }

    let base = positive(req.base_amount)
        .or_else(|| positive(req.quantity))
        .ok_or_else(|| {
            ExchangeError::AmountIndeterminate(
                "cannot determine quote amount without base amount or quantity".into(),
            )
        })?;
    let price = positive(req.price).ok_or_else(|| {
        ExchangeError::AmountIndeterminate("cannot determine quote amount without price".into())
    })?;

    Ok(base * price)
}

fn quote_over_price(req: &StandardOrderRequest) -> Option<Decimal> {
    let quote = positive(req.quote_amount)?;
    let price = positive(req.price)?;
    quote.checked_div(price)
}

/// 8자리 소수 문자열 (예: `0.5` → `"0.50000000"`).
pub fn format_amount(value: Decimal) -> String {
    let mut value = value.round_dp(WIRE_DECIMAL_PLACES);
    value.rescale(WIRE_DECIMAL_PLACES);
    value.to_string()
}

// ============================================================================
// 심볼
// ============================================================================

/// 기준/호가 자산으로 분리된 심볼 (대문자).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SymbolParts {
    pub base: String,
    pub quote: String,
}

impl SymbolParts {
    pub fn new(base: impl AsRef<str>, quote: impl AsRef<str>) -> Self {
        Self {
            base: base.as_ref().to_uppercase(),
            quote: quote.as_ref().to_uppercase(),
        }
    }

    /// 구분자로 결합 (예: `"_"` → `BTC_USDT`, `""` → `BTCUSDT`).
    pub fn joined(&self, separator: &str) -> String {
        format!("{}{}{}", self.base, separator, self.quote)
    }
}

impl std::fmt::Display for SymbolParts {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.base, self.quote)
    }
}

/// 정규 심볼 파싱.
///
/// `BTC_USDT`, `BTC-USDT`, `BTCUSDT` 모두 `BTC` / `USDT`가 됩니다.
pub fn parse_symbol(symbol: &str) -> ExchangeResult<SymbolParts> {
    let trimmed = symbol.trim();
    let unparseable = || ExchangeError::UnparseableSymbol(symbol.to_string());

    for separator in ['_', '-'] {
        if trimmed.contains(separator) {
            let mut parts = trimmed.split(separator);
            return match (parts.next(), parts.next(), parts.next()) {
                (Some(base), Some(quote), None) if !base.is_empty() && !quote.is_empty() => {
                    Ok(SymbolParts::new(base, quote))
                }
                _ => Err(unparseable()),
            };
        }
    }

    let upper = trimmed.to_uppercase();
    KNOWN_QUOTE_ASSETS
        .iter()
        .find_map(|quote| {
            upper
                .strip_suffix(quote)
                .filter(|base| !base.is_empty())
                .map(|base| SymbolParts::new(base, quote))
        })
        .ok_or_else(unparseable)
}

/// Nobitex 통화 코드 (소문자, `irt` → `rls`).
pub fn nobitex_currency(asset: &str) -> String {
    let lower = asset.trim().to_lowercase();
    if lower == "irt" {
        "rls".to_string()
    } else {
        lower
    }
}

// ============================================================================
// Bitpin 페이로드
// ============================================================================

/// Bitpin 주문 생성 요청 본문.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BitpinOrderPayload {
    pub symbol: String,
    #[serde(rename = "type")]
    pub order_type: String,
    pub side: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_amount: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quote_amount: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub price: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stop_price: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub identifier: Option<String>,
}

/// Bitpin 주문 페이로드 생성.
///
/// `symbol`은 거래소 고유 형식(`BASE_QUOTE`)이어야 합니다.
/// 기준/호가 금액 중 결정 가능한 값을 모두 보내며, 둘 다 불가하면 실패합니다.
pub fn bitpin_order_payload(
    req: &StandardOrderRequest,
    symbol: &str,
) -> ExchangeResult<BitpinOrderPayload> {
    let (side, order_type) = validate_order_request(req)?;

    let base_amount = resolve_base_amount(req).ok();
    let quote_amount = resolve_quote_amount(req).ok();
    if base_amount.is_none() && quote_amount.is_none() {
        return Err(ExchangeError::AmountIndeterminate(
            "bitpin requires a base or quote amount".into(),
        ));
    }

    let price = match order_type {
        OrderType::Limit => req.price.map(format_amount),
        OrderType::Market => None,
    };

    Ok(BitpinOrderPayload {
        symbol: symbol.to_string(),
        order_type: order_type.as_str().to_string(),
        side: side.as_str().to_string(),
        base_amount: base_amount.map(format_amount),
        quote_amount: quote_amount.map(format_amount),
        price,
        stop_price: positive(req.stop_price).map(format_amount),
        identifier: req
            .client_order_id
            .as_ref()
            .filter(|id| !id.is_empty())
            .cloned(),
    })
}

// ============================================================================
// Nobitex 페이로드
// ============================================================================

/// Nobitex에서 호가 자산으로 허용되는 통화.
pub const NOBITEX_QUOTE_CURRENCIES: [&str; 2] = ["rls", "usdt"];

/// Nobitex 주문 생성 요청 본문.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NobitexOrderPayload {
    /// 주문 방향 ("buy" / "sell")
    #[serde(rename = "type")]
    pub side: String,
    /// 실행 방식 ("limit" / "market")
    pub execution: String,
    /// 거래 대상 자산
    pub src_currency: String,
    /// 호가 자산 ("rls" / "usdt")
    pub dst_currency: String,
    pub amount: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub price: Option<String>,
    pub client_order_id: String,
}

/// Nobitex 주문 페이로드 생성.
///
/// 클라이언트 주문 ID가 필요합니다.
pub fn nobitex_order_payload(
    req: &StandardOrderRequest,
    parts: &SymbolParts,
) -> ExchangeResult<NobitexOrderPayload> {
    let (side, order_type) = validate_order_request(req)?;

    let src_currency = nobitex_currency(&parts.base);
    let dst_currency = nobitex_currency(&parts.quote);
    if !NOBITEX_QUOTE_CURRENCIES.contains(&dst_currency.as_str()) {
        return Err(ExchangeError::ValidationFailed(format!(
            "nobitex only supports rls and usdt markets, got {}",
            parts.quote
        )));
    }

    let client_order_id = req
        .client_order_id
        .as_ref()
        .filter(|id| !id.is_empty())
        .cloned()
        .ok_or_else(|| ExchangeError::ValidationFailed("nobitex expects client order id".into()))?;

    let amount = resolve_quantity(req)?;
    let price = match order_type {
        OrderType::Limit => req.price.map(format_amount),
        OrderType::Market => None,
    };

    Ok(NobitexOrderPayload {
        side: side.as_str().to_string(),
        execution: order_type.as_str().to_string(),
        src_currency,
        dst_currency,
        amount: format_amount(amount),
        price,
        client_order_id,
    })
}

/// Nobitex 시간 창 일괄 취소 요청 본문.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NobitexCancelPayload {
    pub execution: String,
    pub src_currency: String,
    pub dst_currency: String,
    /// 최근 몇 시간 안에 만든 주문을 취소할지
    pub hours: f64,
}

pub fn nobitex_cancel_payload(
    execution: &str,
    parts: &SymbolParts,
    hours: Decimal,
) -> ExchangeResult<NobitexCancelPayload> {
    let hours = positive(Some(hours))
        .and_then(|h| h.to_f64())
        .ok_or_else(|| ExchangeError::ValidationFailed("hours must be positive".into()))?;

    Ok(NobitexCancelPayload {
        execution: execution.to_lowercase(),
        src_currency: nobitex_currency(&parts.base),
        dst_currency: nobitex_currency(&parts.quote),
        hours,
    })
}
