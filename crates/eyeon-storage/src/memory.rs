//! 메모리 저장소 구현.
//!
//! 테스트와 로컬 실행용. PostgreSQL 구현과 같은 유일성 제약
//! (활성 거래소 이름, 활성 거래쌍 심볼, 활성 자격증명 라벨)을 지킵니다.
//!
//! 카탈로그 트랜잭션은 전체 상태의 복사본에 쓰고, 커밋 시 교체합니다.
//! 트랜잭션이 열려 있는 동안 다른 호출은 대기합니다.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use eyeon_core::{
    BalanceSnapshot, CatalogStore, CatalogTransaction, CredentialStore, ExchangeCredential,
    ExchangeRecord, NewBalanceSnapshot, NewCredential, NewExchange, NewOrderBookSnapshot,
    NewOrderHistory, NewTradingPair, OrderBookSnapshot, OrderHistory, OrderStore, RotatedSecrets,
    SnapshotStore, StoreError, StoreResult, TradingPair,
};
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};
use uuid::Uuid;

#[derive(Debug, Default, Clone)]
struct MemoryState {
    exchanges: Vec<ExchangeRecord>,
    pairs: Vec<TradingPair>,
    credentials: Vec<ExchangeCredential>,
    orders: Vec<OrderHistory>,
    balances: Vec<BalanceSnapshot>,
    books: Vec<OrderBookSnapshot>,
}

impl MemoryState {
    fn active_exchange(&self, name: &str) -> Option<&ExchangeRecord> {
        self.exchanges.iter().find(|e| e.is_active && e.name == name)
    }

    fn insert_exchange(&mut self, exchange: &NewExchange) -> StoreResult<ExchangeRecord> {
        if self.active_exchange(&exchange.name).is_some() {
            return Err(StoreError::Conflict(format!(
                "active exchange '{}' already exists",
                exchange.name
            )));
        }

        let record = ExchangeRecord {
            id: Uuid::new_v4(),
            name: exchange.name.clone(),
            display_name: exchange.display_name.clone(),
            base_url: exchange.base_url.clone(),
            rate_limit: exchange.rate_limit,
            features: exchange.features.clone(),
            is_active: true,
            created_at: Utc::now(),
        };
        self.exchanges.push(record.clone());
        Ok(record)
    }

    fn insert_pair(&mut self, pair: &NewTradingPair) -> StoreResult<TradingPair> {
        if !self.exchanges.iter().any(|e| e.id == pair.exchange_id) {
            return Err(StoreError::NotFound(format!("exchange {}", pair.exchange_id)));
        }
        if self
            .pairs
            .iter()
            .any(|p| p.is_active && p.exchange_id == pair.exchange_id && p.symbol == pair.symbol)
        {
            return Err(StoreError::Conflict(format!(
                "active trading pair '{}' already exists",
                pair.symbol
            )));
        }

        let record = TradingPair {
            id: Uuid::new_v4(),
            exchange_id: pair.exchange_id,
            symbol: pair.symbol.clone(),
            base_asset: pair.base_asset.clone(),
            quote_asset: pair.quote_asset.clone(),
            tick_size: pair.tick_size,
            step_size: pair.step_size,
            min_quantity: pair.min_quantity,
            max_quantity: pair.max_quantity,
            is_active: true,
            created_at: Utc::now(),
        };
        self.pairs.push(record.clone());
        Ok(record)
    }

    fn active_pairs(&self, exchange_id: Uuid) -> Vec<TradingPair> {
        let mut pairs: Vec<_> = self
            .pairs
            .iter()
            .filter(|p| p.is_active && p.exchange_id == exchange_id)
            .cloned()
            .collect();
        pairs.sort_by(|a, b| a.symbol.cmp(&b.symbol));
        pairs
    }

    fn credential_mut(&mut self, id: Uuid) -> StoreResult<&mut ExchangeCredential> {
        self.credentials
            .iter_mut()
            .find(|c| c.id == id)
            .ok_or_else(|| StoreError::NotFound(format!("exchange credential {}", id)))
    }
}

/// 저장소 포트의 메모리 구현.
#[derive(Clone, Default)]
pub struct MemoryStore {
    state: Arc<Mutex<MemoryState>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

/// 메모리 카탈로그 트랜잭션.
pub struct MemoryCatalogTransaction {
    guard: OwnedMutexGuard<MemoryState>,
    staged: MemoryState,
}

#[async_trait]
impl CatalogTransaction for MemoryCatalogTransaction {
    async fn lock_exchange_name(&mut self, _name: &str) -> StoreResult<()> {
        // 트랜잭션이 상태 전체의 잠금을 이미 보유
        Ok(())
    }

    async fn find_active_exchange(&mut self, name: &str) -> StoreResult<Option<ExchangeRecord>> {
        Ok(self.staged.active_exchange(name).cloned())
    }

    async fn insert_exchange(&mut self, exchange: &NewExchange) -> StoreResult<ExchangeRecord> {
        self.staged.insert_exchange(exchange)
    }

    async fn active_pairs_for_symbols(
        &mut self,
        exchange_id: Uuid,
        symbols: &[String],
    ) -> StoreResult<Vec<TradingPair>> {
        Ok(self
            .staged
            .active_pairs(exchange_id)
            .into_iter()
            .filter(|p| symbols.contains(&p.symbol))
            .collect())
    }

    async fn insert_trading_pair(&mut self, pair: &NewTradingPair) -> StoreResult<TradingPair> {
        self.staged.insert_pair(pair)
    }

    async fn commit(self: Box<Self>) -> StoreResult<()> {
        let MemoryCatalogTransaction { mut guard, staged } = *self;
        *guard = staged;
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> StoreResult<()> {
        Ok(())
    }
}

#[async_trait]
impl CatalogStore for MemoryStore {
    async fn begin_catalog(&self) -> StoreResult<Box<dyn CatalogTransaction>> {
        let guard = self.state.clone().lock_owned().await;
        let staged = guard.clone();
        Ok(Box::new(MemoryCatalogTransaction { guard, staged }))
    }

    async fn find_exchange_by_name(&self, name: &str) -> StoreResult<Option<ExchangeRecord>> {
        Ok(self.state.lock().await.active_exchange(name).cloned())
    }

    async fn find_exchange(&self, id: Uuid) -> StoreResult<Option<ExchangeRecord>> {
        let state = self.state.lock().await;
        Ok(state.exchanges.iter().find(|e| e.id == id).cloned())
    }

    async fn list_trading_pairs(&self, exchange_id: Uuid) -> StoreResult<Vec<TradingPair>> {
        Ok(self.state.lock().await.active_pairs(exchange_id))
    }

    async fn find_trading_pair(
        &self,
        exchange_id: Uuid,
        symbol: &str,
    ) -> StoreResult<Option<TradingPair>> {
        let state = self.state.lock().await;
        Ok(state
            .pairs
            .iter()
            .find(|p| p.is_active && p.exchange_id == exchange_id && p.symbol == symbol)
            .cloned())
    }

    async fn find_trading_pair_by_id(&self, id: Uuid) -> StoreResult<Option<TradingPair>> {
        let state = self.state.lock().await;
        Ok(state.pairs.iter().find(|p| p.id == id).cloned())
    }
}

#[async_trait]
impl CredentialStore for MemoryStore {
    async fn find_latest_active_credential(
        &self,
        user_id: Uuid,
        exchange_id: Uuid,
    ) -> StoreResult<Option<ExchangeCredential>> {
        let state = self.state.lock().await;
        // 같은 시각이면 나중에 저장된 행이 우선
        Ok(state
            .credentials
            .iter()
            .filter(|c| c.is_active && c.user_id == user_id && c.exchange_id == exchange_id)
            .max_by_key(|c| c.created_at)
            .cloned())
    }

    async fn list_credentials(&self, user_id: Uuid) -> StoreResult<Vec<ExchangeCredential>> {
        let state = self.state.lock().await;
        let mut credentials: Vec<_> = state
            .credentials
            .iter()
            .filter(|c| c.is_active && c.user_id == user_id)
            .cloned()
            .collect();
        credentials.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(credentials)
    }

    async fn insert_credential(
        &self,
        credential: &NewCredential,
    ) -> StoreResult<ExchangeCredential> {
        let mut state = self.state.lock().await;

        if state.credentials.iter().any(|c| {
            c.is_active
                && c.user_id == credential.user_id
                && c.exchange_id == credential.exchange_id
                && c.label == credential.label
        }) {
            return Err(StoreError::Conflict(format!(
                "active credential '{}' already exists",
                credential.label
            )));
        }

        let now = Utc::now();
        let record = ExchangeCredential {
            id: Uuid::new_v4(),
            user_id: credential.user_id,
            exchange_id: credential.exchange_id,
            label: credential.label.clone(),
            api_key: credential.api_key.clone(),
            secret_key: credential.secret_key.clone(),
            access_key: credential.access_key.clone(),
            refresh_key: credential.refresh_key.clone(),
            access_expires_at: credential.access_expires_at,
            is_testnet: credential.is_testnet,
            is_active: true,
            last_used: None,
            created_at: now,
            updated_at: now,
        };
        state.credentials.push(record.clone());
        Ok(record)
    }

    async fn rotate_credential_secrets(
        &self,
        id: Uuid,
        secrets: &RotatedSecrets,
    ) -> StoreResult<ExchangeCredential> {
        let mut state = self.state.lock().await;
        let credential = state.credential_mut(id)?;
        if !credential.is_active {
            return Err(StoreError::NotFound(format!("exchange credential {}", id)));
        }

        credential.api_key = secrets.api_key.clone();
        credential.access_key = Some(secrets.access_key.clone());
        if let Some(refresh_key) = &secrets.refresh_key {
            credential.refresh_key = Some(refresh_key.clone());
        }
        credential.access_expires_at = secrets.access_expires_at;
        credential.updated_at = Utc::now();

        Ok(credential.clone())
    }

    async fn touch_credential(&self, id: Uuid, used_at: DateTime<Utc>) -> StoreResult<()> {
        let mut state = self.state.lock().await;
        state.credential_mut(id)?.last_used = Some(used_at);
        Ok(())
    }

    async fn deactivate_credential(&self, id: Uuid) -> StoreResult<()> {
        let mut state = self.state.lock().await;
        let credential = state.credential_mut(id)?;
        credential.is_active = false;
        credential.updated_at = Utc::now();
        Ok(())
    }
}

#[async_trait]
impl OrderStore for MemoryStore {
    async fn insert_order(&self, order: &NewOrderHistory) -> StoreResult<OrderHistory> {
        let mut state = self.state.lock().await;
        if !state.pairs.iter().any(|p| p.id == order.trading_pair_id) {
            return Err(StoreError::NotFound(format!(
                "trading pair {}",
                order.trading_pair_id
            )));
        }

        let record = OrderHistory {
            id: Uuid::new_v4(),
            user_id: order.user_id,
            exchange_credential_id: order.exchange_credential_id,
            exchange_id: order.exchange_id,
            trading_pair_id: order.trading_pair_id,
            client_order_id: order.client_order_id.clone(),
            exchange_order_id: order.exchange_order_id.clone(),
            side: order.side.clone(),
            order_type: order.order_type.clone(),
            quantity: order.quantity,
            price: order.price,
            status: order.status.clone(),
            created_at: Utc::now(),
        };
        state.orders.push(record.clone());
        Ok(record)
    }

    async fn find_order(
        &self,
        id: Uuid,
        user_id: Uuid,
        exchange_id: Uuid,
    ) -> StoreResult<Option<OrderHistory>> {
        let state = self.state.lock().await;
        Ok(state
            .orders
            .iter()
            .find(|o| o.id == id && o.user_id == user_id && o.exchange_id == exchange_id)
            .cloned())
    }

    async fn find_order_by_client_order_id(
        &self,
        user_id: Uuid,
        client_order_id: &str,
    ) -> StoreResult<Option<OrderHistory>> {
        let state = self.state.lock().await;
        Ok(state
            .orders
            .iter()
            .rev()
            .find(|o| o.user_id == user_id && o.client_order_id == client_order_id)
            .cloned())
    }

    async fn find_order_by_exchange_order_id(
        &self,
        exchange_id: Uuid,
        exchange_order_id: &str,
    ) -> StoreResult<Option<OrderHistory>> {
        let state = self.state.lock().await;
        Ok(state
            .orders
            .iter()
            .rev()
            .find(|o| o.exchange_id == exchange_id && o.exchange_order_id == exchange_order_id)
            .cloned())
    }

    async fn list_orders(&self, user_id: Uuid, limit: i64) -> StoreResult<Vec<OrderHistory>> {
        let state = self.state.lock().await;
        Ok(state
            .orders
            .iter()
            .rev()
            .filter(|o| o.user_id == user_id)
            .take(usize::try_from(limit).unwrap_or(0))
            .cloned()
            .collect())
    }
}

#[async_trait]
impl SnapshotStore for MemoryStore {
    async fn insert_balance_snapshots(
        &self,
        snapshots: &[NewBalanceSnapshot],
    ) -> StoreResult<Vec<BalanceSnapshot>> {
        let mut state = self.state.lock().await;
        let saved: Vec<_> = snapshots
            .iter()
            .map(|s| BalanceSnapshot {
                id: Uuid::new_v4(),
                user_id: s.user_id,
                exchange_id: s.exchange_id,
                currency: s.currency.clone(),
                total: s.total,
                available: s.available,
                snapshot_time: s.snapshot_time,
            })
            .collect();
        state.balances.extend(saved.iter().cloned());
        Ok(saved)
    }

    async fn latest_balances(
        &self,
        user_id: Uuid,
        exchange_id: Uuid,
    ) -> StoreResult<Vec<BalanceSnapshot>> {
        let state = self.state.lock().await;
        let mut latest: Vec<BalanceSnapshot> = Vec::new();

        for snapshot in state
            .balances
            .iter()
            .filter(|b| b.user_id == user_id && b.exchange_id == exchange_id)
        {
            match latest.iter_mut().find(|b| b.currency == snapshot.currency) {
                Some(existing) if existing.snapshot_time <= snapshot.snapshot_time => {
                    *existing = snapshot.clone();
                }
                Some(_) => {}
                None => latest.push(snapshot.clone()),
            }
        }

        latest.sort_by(|a, b| a.currency.cmp(&b.currency));
        Ok(latest)
    }

    async fn insert_order_book_snapshot(
        &self,
        snapshot: &NewOrderBookSnapshot,
    ) -> StoreResult<OrderBookSnapshot> {
        let mut state = self.state.lock().await;
        let record = OrderBookSnapshot {
            id: Uuid::new_v4(),
            exchange_id: snapshot.exchange_id,
            trading_pair_id: snapshot.trading_pair_id,
            symbol: snapshot.symbol.clone(),
            bids: snapshot.bids.clone(),
            asks: snapshot.asks.clone(),
            snapshot_time: snapshot.snapshot_time,
        };
        state.books.push(record.clone());
        Ok(record)
    }

    async fn latest_order_book(
        &self,
        trading_pair_id: Uuid,
    ) -> StoreResult<Option<OrderBookSnapshot>> {
        let state = self.state.lock().await;
        Ok(state
            .books
            .iter()
            .filter(|b| b.trading_pair_id == trading_pair_id)
            .max_by_key(|b| b.snapshot_time)
            .cloned())
    }

    async fn prune_snapshots_before(&self, cutoff: DateTime<Utc>) -> StoreResult<u64> {
        let mut state = self.state.lock().await;
        let before = state.balances.len() + state.books.len();
        state.balances.retain(|b| b.snapshot_time >= cutoff);
        state.books.retain(|b| b.snapshot_time >= cutoff);
        Ok((before - state.balances.len() - state.books.len()) as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn new_exchange(name: &str) -> NewExchange {
        NewExchange {
            name: name.to_string(),
            display_name: name.to_uppercase(),
            base_url: "http://localhost".to_string(),
            rate_limit: 1000,
            features: serde_json::json!({}),
        }
    }

    fn new_pair(exchange_id: Uuid, symbol: &str) -> NewTradingPair {
        NewTradingPair {
            exchange_id,
            symbol: symbol.to_string(),
            base_asset: "BTC".to_string(),
            quote_asset: "USDT".to_string(),
            tick_size: dec!(0.01),
            step_size: dec!(0.00000001),
            min_quantity: None,
            max_quantity: None,
        }
    }

    #[tokio::test]
    async fn test_catalog_commit_and_rollback() {
        let store = MemoryStore::new();

        let mut tx = store.begin_catalog().await.unwrap();
        tx.insert_exchange(&new_exchange("bitpin")).await.unwrap();
        tx.rollback().await.unwrap();
        assert!(store.find_exchange_by_name("bitpin").await.unwrap().is_none());

        let mut tx = store.begin_catalog().await.unwrap();
        let exchange = tx.insert_exchange(&new_exchange("bitpin")).await.unwrap();
        tx.insert_trading_pair(&new_pair(exchange.id, "BTC_USDT"))
            .await
            .unwrap();
        tx.commit().await.unwrap();

        assert_eq!(
            store.find_exchange_by_name("bitpin").await.unwrap().unwrap().id,
            exchange.id
        );
        assert_eq!(store.list_trading_pairs(exchange.id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_dropped_transaction_discards_changes() {
        let store = MemoryStore::new();
        {
            let mut tx = store.begin_catalog().await.unwrap();
            tx.insert_exchange(&new_exchange("nobitex")).await.unwrap();
        }
        assert!(store.find_exchange_by_name("nobitex").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_unique_constraints() {
        let store = MemoryStore::new();
        let mut tx = store.begin_catalog().await.unwrap();
        let exchange = tx.insert_exchange(&new_exchange("bitpin")).await.unwrap();

        assert!(matches!(
            tx.insert_exchange(&new_exchange("bitpin")).await,
            Err(StoreError::Conflict(_))
        ));

        tx.insert_trading_pair(&new_pair(exchange.id, "BTC_USDT"))
            .await
            .unwrap();
        assert!(matches!(
            tx.insert_trading_pair(&new_pair(exchange.id, "BTC_USDT")).await,
            Err(StoreError::Conflict(_))
        ));
    }

    #[tokio::test]
    async fn test_latest_balances_per_currency() {
        let store = MemoryStore::new();
        let user_id = Uuid::new_v4();
        let exchange_id = Uuid::new_v4();
        let earlier = Utc::now() - chrono::Duration::minutes(5);
        let now = Utc::now();

        let snapshot = |currency: &str, total, at| NewBalanceSnapshot {
            user_id,
            exchange_id,
            currency: currency.to_string(),
            total,
            available: total,
            snapshot_time: at,
        };

        store
            .insert_balance_snapshots(&[
                snapshot("BTC", dec!(1), earlier),
                snapshot("USDT", dec!(100), earlier),
                snapshot("BTC", dec!(2), now),
            ])
            .await
            .unwrap();

        let latest = store.latest_balances(user_id, exchange_id).await.unwrap();
        assert_eq!(latest.len(), 2);
        assert_eq!(latest[0].currency, "BTC");
        assert_eq!(latest[0].total, dec!(2));

        let pruned = store
            .prune_snapshots_before(now - chrono::Duration::minutes(1))
            .await
            .unwrap();
        assert_eq!(pruned, 2);
    }
}
