//! 주문 생성/취소 명령.

use super::App;
use anyhow::Result;
use eyeon_core::{CancelHints, OrderType, Side, StandardOrderRequest};
use rust_decimal::Decimal;
use tracing::info;
use uuid::Uuid;

/// `place-order` 인자.
pub struct PlaceOrderArgs {
    pub exchange: String,
    pub user: Uuid,
    pub symbol: String,
    pub side: Side,
    pub order_type: OrderType,
    pub quantity: Option<Decimal>,
    pub base_amount: Option<Decimal>,
    pub quote_amount: Option<Decimal>,
    pub price: Option<Decimal>,
    pub stop_price: Option<Decimal>,
    pub client_order_id: Option<String>,
}

impl PlaceOrderArgs {
    fn to_request(&self) -> StandardOrderRequest {
        StandardOrderRequest {
            symbol: self.symbol.clone(),
            side: Some(self.side),
            order_type: Some(self.order_type),
            quantity: self.quantity,
            base_amount: self.base_amount,
            quote_amount: self.quote_amount,
            price: self.price,
            stop_price: self.stop_price,
            client_order_id: self.client_order_id.clone(),
        }
    }
}

pub async fn place_order(app: &App, args: PlaceOrderArgs) -> Result<()> {
    let handle = app.exchange(&args.exchange).await?;
    let response = handle
        .adapter
        .place_order(&args.to_request(), args.user)
        .await?;

    info!(
        exchange = %response.exchange,
        order_id = %response.id,
        history_id = %response.history_id,
        "Order submitted"
    );
    println!("{}", serde_json::to_string_pretty(&response)?);
    Ok(())
}

pub async fn cancel_order(
    app: &App,
    exchange: &str,
    user: Uuid,
    order_id: Uuid,
    hours: Option<Decimal>,
) -> Result<()> {
    let handle = app.exchange(exchange).await?;
    let hints = hours.map(CancelHints::within_hours).unwrap_or_default();

    handle.adapter.cancel_order(order_id, user, hints).await?;
    println!("주문 취소 요청 완료: {}", order_id);
    Ok(())
}
