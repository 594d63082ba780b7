//! 시장 데이터/주문 조회 명령.

use super::App;
use anyhow::Result;
use eyeon_core::{OrderLevel, OrderStore};
use uuid::Uuid;

pub async fn ping(app: &App, exchange: &str) -> Result<()> {
    let handle = app.exchange(exchange).await?;
    handle.adapter.ping().await?;
    println!("{}: OK", handle.adapter.name());
    Ok(())
}

pub async fn balance(app: &App, exchange: &str, user: Uuid, asset: Option<&str>) -> Result<()> {
    let handle = app.exchange(exchange).await?;
    let balances = handle.adapter.get_balance(user, asset).await?;

    println!("{:<8} {:>24} {:>24} {:>24}", "ASSET", "TOTAL", "AVAILABLE", "LOCKED");
    for b in &balances {
        println!(
            "{:<8} {:>24} {:>24} {:>24}",
            b.asset,
            b.total,
            b.available,
            b.locked()
        );
    }
    Ok(())
}

fn print_levels(title: &str, levels: &[OrderLevel], depth: usize) {
    println!("{}", title);
    for level in levels.iter().take(depth) {
        println!("  {:>20} {:>20}", level.price, level.quantity);
    }
}

pub async fn order_book(app: &App, exchange: &str, symbol: &str, depth: usize) -> Result<()> {
    let handle = app.exchange(exchange).await?;
    // 호가창은 공개 엔드포인트이므로 사용자 ID는 사용되지 않음
    let book = handle.adapter.get_order_book(symbol, Uuid::nil()).await?;

    println!("{} {} @ {}", book.exchange, book.symbol, book.snapshot_time);
    print_levels("ASKS", &book.asks, depth);
    print_levels("BIDS", &book.bids, depth);
    Ok(())
}

pub async fn orders(app: &App, user: Uuid, limit: i64) -> Result<()> {
    let orders = app.store.list_orders(user, limit).await?;
    if orders.is_empty() {
        println!("주문 기록이 없습니다.");
        return Ok(());
    }

    for order in orders {
        let line = serde_json::json!({
            "id": order.id,
            "client_order_id": order.client_order_id,
            "exchange_order_id": order.exchange_order_id,
            "side": order.side,
            "type": order.order_type,
            "quantity": order.quantity,
            "price": order.price,
            "status": order.status,
            "created_at": order.created_at,
        });
        println!("{}", line);
    }
    Ok(())
}
