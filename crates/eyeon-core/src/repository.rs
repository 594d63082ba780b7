//! 저장소 포트.
//!
//! 어댑터 서브시스템이 사용하는 영속 계층 인터페이스입니다.
//! `eyeon-storage` 크레이트가 PostgreSQL 구현과 메모리 구현을 제공합니다.
//!
//! 거래소/거래쌍 정합(reconciliation)은 반드시 `CatalogTransaction` 안에서
//! 수행되며, 커밋 전 실패는 전부 롤백됩니다.

use crate::domain::{
    BalanceSnapshot, ExchangeCredential, ExchangeRecord, NewBalanceSnapshot, NewCredential,
    NewExchange, NewOrderBookSnapshot, NewOrderHistory, NewTradingPair, OrderBookSnapshot,
    OrderHistory, RotatedSecrets, TradingPair,
};
use crate::error::StoreResult;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

/// 거래소/거래쌍 카탈로그 저장소.
#[async_trait]
pub trait CatalogStore: Send + Sync {
    /// 카탈로그 정합용 트랜잭션 시작.
    async fn begin_catalog(&self) -> StoreResult<Box<dyn CatalogTransaction>>;

    /// 이름으로 활성 거래소 조회.
    async fn find_exchange_by_name(&self, name: &str) -> StoreResult<Option<ExchangeRecord>>;

    async fn find_exchange(&self, id: Uuid) -> StoreResult<Option<ExchangeRecord>>;

    /// 거래소의 활성 거래쌍 전체 (심볼 순).
    async fn list_trading_pairs(&self, exchange_id: Uuid) -> StoreResult<Vec<TradingPair>>;

    /// 거래소 고유 심볼로 활성 거래쌍 조회.
    async fn find_trading_pair(
        &self,
        exchange_id: Uuid,
        symbol: &str,
    ) -> StoreResult<Option<TradingPair>>;

    async fn find_trading_pair_by_id(&self, id: Uuid) -> StoreResult<Option<TradingPair>>;
}

/// 카탈로그 정합 트랜잭션.
///
/// `commit` 없이 drop 되면 모든 변경이 폐기됩니다.
#[async_trait]
pub trait CatalogTransaction: Send {
    /// 같은 이름에 대한 동시 정합을 직렬화합니다.
    async fn lock_exchange_name(&mut self, name: &str) -> StoreResult<()>;

    async fn find_active_exchange(&mut self, name: &str) -> StoreResult<Option<ExchangeRecord>>;

    async fn insert_exchange(&mut self, exchange: &NewExchange) -> StoreResult<ExchangeRecord>;

    /// 주어진 심볼 중 이미 저장된 활성 거래쌍.
    async fn active_pairs_for_symbols(
        &mut self,
        exchange_id: Uuid,
        symbols: &[String],
    ) -> StoreResult<Vec<TradingPair>>;

    async fn insert_trading_pair(&mut self, pair: &NewTradingPair) -> StoreResult<TradingPair>;

    async fn commit(self: Box<Self>) -> StoreResult<()>;

    async fn rollback(self: Box<Self>) -> StoreResult<()>;
}

/// 자격증명 저장소.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// (사용자, 거래소)의 가장 최근 활성 자격증명.
    async fn find_latest_active_credential(
        &self,
        user_id: Uuid,
        exchange_id: Uuid,
    ) -> StoreResult<Option<ExchangeCredential>>;

    /// 사용자의 활성 자격증명 목록.
    async fn list_credentials(&self, user_id: Uuid) -> StoreResult<Vec<ExchangeCredential>>;

    /// 같은 (사용자, 거래소, 라벨)의 활성 행이 있으면 `Conflict`.
    async fn insert_credential(
        &self,
        credential: &NewCredential,
    ) -> StoreResult<ExchangeCredential>;

    /// 갱신된 비밀 값을 제자리에서 덮어씁니다.
    async fn rotate_credential_secrets(
        &self,
        id: Uuid,
        secrets: &RotatedSecrets,
    ) -> StoreResult<ExchangeCredential>;

    async fn touch_credential(&self, id: Uuid, used_at: DateTime<Utc>) -> StoreResult<()>;

    /// 비활성화 (삭제하지 않음).
    async fn deactivate_credential(&self, id: Uuid) -> StoreResult<()>;
}

/// 주문 기록 저장소.
#[async_trait]
pub trait OrderStore: Send + Sync {
    async fn insert_order(&self, order: &NewOrderHistory) -> StoreResult<OrderHistory>;

    /// 사용자/거래소 범위로 제한된 주문 조회.
    async fn find_order(
        &self,
        id: Uuid,
        user_id: Uuid,
        exchange_id: Uuid,
    ) -> StoreResult<Option<OrderHistory>>;

    async fn find_order_by_client_order_id(
        &self,
        user_id: Uuid,
        client_order_id: &str,
    ) -> StoreResult<Option<OrderHistory>>;

    async fn find_order_by_exchange_order_id(
        &self,
        exchange_id: Uuid,
        exchange_order_id: &str,
    ) -> StoreResult<Option<OrderHistory>>;

    /// 최신순 주문 목록.
    async fn list_orders(&self, user_id: Uuid, limit: i64) -> StoreResult<Vec<OrderHistory>>;
}

/// 잔고/호가창 스냅샷 저장소.
#[async_trait]
pub trait SnapshotStore: Send + Sync {
    /// 한 번의 원자적 배치로 저장합니다.
    async fn insert_balance_snapshots(
        &self,
        snapshots: &[NewBalanceSnapshot],
    ) -> StoreResult<Vec<BalanceSnapshot>>;

    /// 통화별 최신 잔고 스냅샷.
    async fn latest_balances(
        &self,
        user_id: Uuid,
        exchange_id: Uuid,
    ) -> StoreResult<Vec<BalanceSnapshot>>;

    async fn insert_order_book_snapshot(
        &self,
        snapshot: &NewOrderBookSnapshot,
    ) -> StoreResult<OrderBookSnapshot>;

    async fn latest_order_book(
        &self,
        trading_pair_id: Uuid,
    ) -> StoreResult<Option<OrderBookSnapshot>>;

    /// `cutoff` 이전 스냅샷 삭제, 삭제된 행 수 반환.
    async fn prune_snapshots_before(&self, cutoff: DateTime<Utc>) -> StoreResult<u64>;
}

/// 어댑터 서브시스템이 요구하는 저장소 전체.
pub trait Store: CatalogStore + CredentialStore + OrderStore + SnapshotStore {}

impl<T> Store for T where T: CatalogStore + CredentialStore + OrderStore + SnapshotStore {}
