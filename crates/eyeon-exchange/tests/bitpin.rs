//! Bitpin 어댑터 통합 테스트 (mockito + 메모리 저장소).

mod common;

use chrono::{Duration, Utc};
use common::{harness, in_ten_minutes, Harness};
use eyeon_core::{
    CancelHints, OrderStatus, OrderStore, Side, SnapshotStore, StandardOrderRequest,
    StandardOrderResponse,
};
use eyeon_exchange::{ExchangeError, ExchangeHandle};
use mockito::Matcher;
use rust_decimal_macros::dec;
use secrecy::ExposeSecret;
use serde_json::json;
use uuid::Uuid;

const ORDERS_PATH: &str = "/api/v1/odr/orders/";

async fn place_btc_order(
    h: &mut Harness,
    handle: &ExchangeHandle,
    user: Uuid,
) -> StandardOrderResponse {
    let _mock = h
        .server
        .mock("POST", ORDERS_PATH)
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"id":123,"state":"active","price":"50000","base_amount":"0.5"}"#)
        .create_async()
        .await;

    let request = StandardOrderRequest::limit("BTC_USDT", Side::Buy, dec!(0.5), dec!(50000));
    handle.adapter.place_order(&request, user).await.unwrap()
}

#[tokio::test]
async fn test_place_limit_order_records_history() {
    let mut h = harness().await;
    let handle = h.bitpin().await;
    let user = Uuid::new_v4();
    h.store_token_credential(user, handle.exchange.id, "fresh", in_ten_minutes())
        .await;

    let mock = h
        .server
        .mock("POST", ORDERS_PATH)
        .match_header("authorization", "Bearer fresh")
        .match_header("x-timestamp", Matcher::Any)
        .match_body(Matcher::PartialJson(json!({
            "symbol": "BTC_USDT",
            "side": "buy",
            "type": "limit",
            "base_amount": "0.50000000",
            "price": "50000.00000000",
        })))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"id":123,"state":"active","price":"50000","base_amount":"0.5"}"#)
        .create_async()
        .await;

    let request = StandardOrderRequest::limit("BTC-USDT", Side::Buy, dec!(0.5), dec!(50000));
    let response = handle.adapter.place_order(&request, user).await.unwrap();

    mock.assert_async().await;
    assert_eq!(response.id, format!("123-{}", user));
    assert_eq!(response.exchange_order_id, "123");
    assert_eq!(response.symbol, "BTC_USDT");
    assert_eq!(response.status, OrderStatus::New);
    assert_eq!(response.quantity, dec!(0.5));
    assert_eq!(response.price, Some(dec!(50000)));

    let orders = h.store.list_orders(user, 10).await.unwrap();
    assert_eq!(orders.len(), 1);
    assert_eq!(orders[0].id, response.history_id);
    assert_eq!(orders[0].client_order_id, response.id);
    assert_eq!(orders[0].status, "new");
}

#[tokio::test]
async fn test_invalid_order_never_reaches_exchange() {
    let mut h = harness().await;
    let handle = h.bitpin().await;
    let user = Uuid::new_v4();
    h.store_token_credential(user, handle.exchange.id, "fresh", in_ten_minutes())
        .await;

    let mock = h
        .server
        .mock("POST", ORDERS_PATH)
        .expect(0)
        .create_async()
        .await;

    let mut request = StandardOrderRequest::limit("BTC_USDT", Side::Buy, dec!(0.5), dec!(1));
    request.price = None;

    let result = handle.adapter.place_order(&request, user).await;
    assert!(matches!(result, Err(ExchangeError::ValidationFailed(_))));

    let result = handle
        .adapter
        .place_order(
            &StandardOrderRequest::market("FOO_USDT", Side::Sell, dec!(1)),
            user,
        )
        .await;
    assert!(matches!(result, Err(ExchangeError::SymbolNotFound { .. })));

    mock.assert_async().await;
    assert!(h.store.list_orders(user, 10).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_renews_and_retries_once_on_401() {
    let mut h = harness().await;
    let handle = h.bitpin().await;
    let user = Uuid::new_v4();
    h.store_token_credential(user, handle.exchange.id, "stale", in_ten_minutes())
        .await;

    let rejected = h
        .server
        .mock("GET", "/api/v1/wlt/wallets/")
        .match_header("authorization", "Bearer stale")
        .with_status(401)
        .expect(1)
        .create_async()
        .await;
    let refresh = h
        .server
        .mock("POST", "/api/v1/usr/refresh_token/")
        .match_body(Matcher::PartialJson(json!({ "refresh": "refresh" })))
        .with_status(200)
        .with_body(r#"{"access":"fresh","refresh":"refresh-2"}"#)
        .expect(1)
        .create_async()
        .await;
    let accepted = h
        .server
        .mock("GET", "/api/v1/wlt/wallets/")
        .match_header("authorization", "Bearer fresh")
        .with_status(200)
        .with_body(r#"[{"asset":"USDT","balance":"100","frozen":"25"}]"#)
        .expect(1)
        .create_async()
        .await;

    let balances = handle.adapter.get_balance(user, None).await.unwrap();

    rejected.assert_async().await;
    refresh.assert_async().await;
    accepted.assert_async().await;
    assert_eq!(balances.len(), 1);
    assert_eq!(balances[0].total, dec!(100));
    assert_eq!(balances[0].available, dec!(75));

    let credential = h
        .registry
        .credentials()
        .get_by_user_and_exchange(user, handle.exchange.id)
        .await
        .unwrap();
    assert_eq!(
        credential.access_key.as_ref().map(|k| k.expose_secret().to_string()),
        Some("fresh".to_string())
    );
    assert_eq!(
        credential.refresh_key.as_ref().map(|k| k.expose_secret().to_string()),
        Some("refresh-2".to_string())
    );
    assert!(credential.last_used.is_some());
}

#[tokio::test]
async fn test_second_401_is_auth_expired() {
    let mut h = harness().await;
    let handle = h.bitpin().await;
    let user = Uuid::new_v4();
    h.store_token_credential(user, handle.exchange.id, "stale", in_ten_minutes())
        .await;

    let wallets = h
        .server
        .mock("GET", "/api/v1/wlt/wallets/")
        .with_status(401)
        .expect(2)
        .create_async()
        .await;
    let _refresh = h
        .server
        .mock("POST", "/api/v1/usr/refresh_token/")
        .with_status(200)
        .with_body(r#"{"access":"also-rejected"}"#)
        .create_async()
        .await;

    let result = handle.adapter.get_balance(user, None).await;

    wallets.assert_async().await;
    assert!(matches!(result, Err(ExchangeError::AuthExpired { .. })));
}

#[tokio::test]
async fn test_expired_token_renewed_before_request() {
    let mut h = harness().await;
    let handle = h.bitpin().await;
    let user = Uuid::new_v4();
    h.store_token_credential(
        user,
        handle.exchange.id,
        "stale",
        Utc::now() - Duration::minutes(1),
    )
    .await;

    let refresh = h
        .server
        .mock("POST", "/api/v1/usr/refresh_token/")
        .with_status(201)
        .with_body(r#"{"access_token":"fresh"}"#)
        .expect(1)
        .create_async()
        .await;
    let wallets = h
        .server
        .mock("GET", "/api/v1/wlt/wallets/")
        .match_header("authorization", "Bearer fresh")
        .with_status(200)
        .with_body(
            r#"[{"asset":"BTC","balance":"1.5","frozen":"0.5"},{"asset":"USDT","balance":"100","frozen":"0"}]"#,
        )
        .expect(1)
        .create_async()
        .await;

    let balances = handle.adapter.get_balance(user, Some("btc")).await.unwrap();

    refresh.assert_async().await;
    wallets.assert_async().await;
    assert_eq!(balances.len(), 1);
    assert_eq!(balances[0].asset, "BTC");
    assert_eq!(balances[0].total, dec!(1.5));
    assert_eq!(balances[0].available, dec!(1.0));

    let snapshots = h
        .store
        .latest_balances(user, handle.exchange.id)
        .await
        .unwrap();
    assert_eq!(snapshots.len(), 1);
    assert_eq!(snapshots[0].currency, "BTC");

    let credential = h
        .registry
        .credentials()
        .get_by_user_and_exchange(user, handle.exchange.id)
        .await
        .unwrap();
    let expires_at = credential.access_expires_at.unwrap();
    assert!(expires_at > Utc::now() + Duration::minutes(14));
    // 응답에 리프레시 토큰이 없으면 기존 값 유지
    assert_eq!(
        credential.refresh_key.as_ref().map(|k| k.expose_secret().to_string()),
        Some("refresh".to_string())
    );
}

#[tokio::test]
async fn test_rejected_refresh_falls_back_to_authenticate() {
    let mut h = harness().await;
    let handle = h.bitpin().await;
    let user = Uuid::new_v4();
    h.store_token_credential(
        user,
        handle.exchange.id,
        "stale",
        Utc::now() - Duration::minutes(1),
    )
    .await;

    let refresh = h
        .server
        .mock("POST", "/api/v1/usr/refresh_token/")
        .with_status(401)
        .expect(1)
        .create_async()
        .await;
    let authenticate = h
        .server
        .mock("POST", "/api/v1/usr/authenticate/")
        .match_body(Matcher::PartialJson(json!({
            "api_key": "key",
            "secret_key": "secret",
        })))
        .with_status(200)
        .with_body(r#"{"access":"fresh","refresh":"refresh-2"}"#)
        .expect(1)
        .create_async()
        .await;
    let wallets = h
        .server
        .mock("GET", "/api/v1/wlt/wallets/")
        .match_header("authorization", "Bearer fresh")
        .with_status(200)
        .with_body("[]")
        .create_async()
        .await;

    let balances = handle.adapter.get_balance(user, None).await.unwrap();

    refresh.assert_async().await;
    authenticate.assert_async().await;
    wallets.assert_async().await;
    assert!(balances.is_empty());
}

#[tokio::test]
async fn test_order_book_skips_malformed_levels() {
    let mut h = harness().await;
    let handle = h.bitpin().await;

    let mock = h
        .server
        .mock("GET", "/api/v1/mth/orderbook/ETH_USDT/")
        .with_status(200)
        .with_body(
            r#"{"bids":[["3000.5","1.2"],["bad","1"]],"asks":[["3001","0.4"],["3002"]]}"#,
        )
        .create_async()
        .await;

    let book = handle
        .adapter
        .get_order_book("ETHUSDT", Uuid::new_v4())
        .await
        .unwrap();

    mock.assert_async().await;
    assert_eq!(book.symbol, "ETH_USDT");
    assert_eq!(book.bids.len(), 1);
    assert_eq!(book.bids[0].price, dec!(3000.5));
    assert_eq!(book.asks.len(), 1);
    assert_eq!(book.asks[0].quantity, dec!(0.4));

    let pair = handle
        .trading_pairs
        .iter()
        .find(|p| p.symbol == "ETH_USDT")
        .unwrap();
    let snapshot = h.store.latest_order_book(pair.id).await.unwrap().unwrap();
    assert_eq!(snapshot.bids, book.bids);
    assert_eq!(snapshot.asks, book.asks);
}

#[tokio::test]
async fn test_upstream_error_keeps_raw_body() {
    let mut h = harness().await;
    let handle = h.bitpin().await;

    let _mock = h
        .server
        .mock("GET", "/api/v1/mth/orderbook/BTC_USDT/")
        .with_status(503)
        .with_body("maintenance")
        .create_async()
        .await;

    let err = handle
        .adapter
        .get_order_book("BTC_USDT", Uuid::new_v4())
        .await
        .unwrap_err();

    match err {
        ExchangeError::Upstream { exchange, status, body } => {
            assert_eq!(exchange, "bitpin");
            assert_eq!(status, 503);
            assert_eq!(body, "maintenance");
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn test_cancel_order_succeeds_on_204() {
    let mut h = harness().await;
    let handle = h.bitpin().await;
    let user = Uuid::new_v4();
    h.store_token_credential(user, handle.exchange.id, "fresh", in_ten_minutes())
        .await;
    let order = place_btc_order(&mut h, &handle, user).await;

    let mock = h
        .server
        .mock("DELETE", "/api/v1/odr/orders/123/")
        .match_header("authorization", "Bearer fresh")
        .with_status(204)
        .expect(1)
        .create_async()
        .await;

    handle
        .adapter
        .cancel_order(order.history_id, user, CancelHints::default())
        .await
        .unwrap();

    mock.assert_async().await;
}

#[tokio::test]
async fn test_cancel_order_requires_204() {
    let mut h = harness().await;
    let handle = h.bitpin().await;
    let user = Uuid::new_v4();
    h.store_token_credential(user, handle.exchange.id, "fresh", in_ten_minutes())
        .await;
    let order = place_btc_order(&mut h, &handle, user).await;

    let _mock = h
        .server
        .mock("DELETE", "/api/v1/odr/orders/123/")
        .with_status(200)
        .with_body(r#"{"detail":"already closed"}"#)
        .create_async()
        .await;

    let result = handle
        .adapter
        .cancel_order(order.history_id, user, CancelHints::default())
        .await;

    assert!(matches!(
        result,
        Err(ExchangeError::CancellationFailed { status: 200, .. })
    ));
}

#[tokio::test]
async fn test_cancel_is_scoped_to_owner() {
    let mut h = harness().await;
    let handle = h.bitpin().await;
    let owner = Uuid::new_v4();
    let other = Uuid::new_v4();
    h.store_token_credential(owner, handle.exchange.id, "fresh", in_ten_minutes())
        .await;
    h.store_token_credential(other, handle.exchange.id, "fresh", in_ten_minutes())
        .await;
    let order = place_btc_order(&mut h, &handle, owner).await;

    let mock = h
        .server
        .mock("DELETE", "/api/v1/odr/orders/123/")
        .expect(0)
        .create_async()
        .await;

    let result = handle
        .adapter
        .cancel_order(order.history_id, other, CancelHints::default())
        .await;

    mock.assert_async().await;
    assert!(matches!(result, Err(ExchangeError::NotFound(_))));
}

#[tokio::test]
async fn test_missing_credential_is_not_found() {
    let h = harness().await;
    let handle = h.bitpin().await;

    let result = handle.adapter.get_balance(Uuid::new_v4(), None).await;
    assert!(matches!(result, Err(ExchangeError::NotFound(_))));
}

#[tokio::test]
async fn test_missing_credential_checked_before_symbol() {
    let mut h = harness().await;
    let handle = h.bitpin().await;

    let mock = h
        .server
        .mock("POST", ORDERS_PATH)
        .expect(0)
        .create_async()
        .await;

    let request = StandardOrderRequest::market("FOO_USDT", Side::Buy, dec!(1));
    let result = handle.adapter.place_order(&request, Uuid::new_v4()).await;

    mock.assert_async().await;
    assert!(matches!(result, Err(ExchangeError::NotFound(_))));
}

#[tokio::test]
async fn test_ping_is_public() {
    let mut h = harness().await;
    let handle = h.bitpin().await;

    let mock = h
        .server
        .mock("GET", "/api/v1/mkt/markets/")
        .match_header("authorization", Matcher::Missing)
        .with_status(200)
        .with_body("[]")
        .create_async()
        .await;

    handle.adapter.ping().await.unwrap();
    mock.assert_async().await;
}

#[tokio::test]
async fn test_ping_surfaces_upstream_error() {
    let mut h = harness().await;
    let handle = h.bitpin().await;

    let _mock = h
        .server
        .mock("GET", "/api/v1/mkt/markets/")
        .with_status(502)
        .with_body("bad gateway")
        .create_async()
        .await;

    match handle.adapter.ping().await.unwrap_err() {
        ExchangeError::Upstream { exchange, status, body } => {
            assert_eq!(exchange, "bitpin");
            assert_eq!(status, 502);
            assert_eq!(body, "bad gateway");
        }
        other => panic!("unexpected error: {other:?}"),
    }
}
