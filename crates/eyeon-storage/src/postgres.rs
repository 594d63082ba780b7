//! PostgreSQL 저장소 구현.
//!
//! `sqlx`를 사용해 저장소 포트를 구현합니다. 스키마는 저장소 루트의
//! `migrations/` 디렉토리에 있으며 `Database::migrate`로 적용합니다.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use eyeon_core::{
    BalanceSnapshot, CatalogStore, CatalogTransaction, CredentialStore, DatabaseConfig,
    ExchangeCredential, ExchangeRecord, NewBalanceSnapshot, NewCredential, NewExchange,
    NewOrderBookSnapshot, NewOrderHistory, NewTradingPair, OrderBookSnapshot, OrderHistory,
    OrderLevel, OrderStore, RotatedSecrets, SnapshotStore, StoreError, StoreResult, TradingPair,
};
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::types::Json;
use sqlx::{FromRow, Postgres, Transaction};
use std::time::Duration;
use tracing::{debug, info};
use uuid::Uuid;

/// sqlx 에러를 저장소 에러로 변환.
fn db_err(err: sqlx::Error) -> StoreError {
    match &err {
        sqlx::Error::RowNotFound => StoreError::NotFound(err.to_string()),
        sqlx::Error::Database(db) if db.is_unique_violation() => {
            StoreError::Conflict(db.message().to_string())
        }
        _ => StoreError::Database(err.to_string()),
    }
}

// ============================================================================
// 연결 풀
// ============================================================================

/// 데이터베이스 연결 풀 래퍼.
#[derive(Clone)]
pub struct Database {
    pool: PgPool,
}

impl Database {
    /// 새로운 데이터베이스 연결 풀을 생성합니다.
    pub async fn connect(config: &DatabaseConfig) -> StoreResult<Self> {
        info!("Connecting to database...");

        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(Duration::from_secs(config.connect_timeout_secs))
            .connect(&config.url)
            .await
            .map_err(db_err)?;

        info!("Database connection established");

        Ok(Self { pool })
    }

    /// 기존 연결 풀에서 생성.
    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// 데이터베이스 마이그레이션을 실행합니다.
    pub async fn migrate(&self) -> StoreResult<()> {
        info!("Running database migrations...");

        sqlx::migrate!("../../migrations")
            .run(&self.pool)
            .await
            .map_err(|e| StoreError::Database(e.to_string()))?;

        info!("Migrations completed successfully");
        Ok(())
    }

    /// 저장소 포트 구현 생성.
    pub fn store(&self) -> PgStore {
        PgStore::new(self.pool.clone())
    }
}

// ============================================================================
// 저장소
// ============================================================================

/// 저장소 포트의 PostgreSQL 구현.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

/// order_book_snapshots 행 (JSONB 호가 레벨).
#[derive(FromRow)]
struct OrderBookSnapshotRow {
    id: Uuid,
    exchange_id: Uuid,
    trading_pair_id: Uuid,
    symbol: String,
    bids: Json<Vec<OrderLevel>>,
    asks: Json<Vec<OrderLevel>>,
    snapshot_time: DateTime<Utc>,
}

impl From<OrderBookSnapshotRow> for OrderBookSnapshot {
    fn from(row: OrderBookSnapshotRow) -> Self {
        Self {
            id: row.id,
            exchange_id: row.exchange_id,
            trading_pair_id: row.trading_pair_id,
            symbol: row.symbol,
            bids: row.bids.0,
            asks: row.asks.0,
            snapshot_time: row.snapshot_time,
        }
    }
}

// ----------------------------------------------------------------------------
// 카탈로그
// ----------------------------------------------------------------------------

/// 카탈로그 정합 트랜잭션.
pub struct PgCatalogTransaction {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl CatalogTransaction for PgCatalogTransaction {
    async fn lock_exchange_name(&mut self, name: &str) -> StoreResult<()> {
        // 트랜잭션 종료 시 자동 해제되는 advisory lock
        sqlx::query("SELECT pg_advisory_xact_lock(hashtext($1))")
            .bind(name)
            .execute(&mut *self.tx)
            .await
            .map_err(db_err)?;
        Ok(())
    }

    async fn find_active_exchange(&mut self, name: &str) -> StoreResult<Option<ExchangeRecord>> {
        sqlx::query_as::<_, ExchangeRecord>(
            "SELECT * FROM exchanges WHERE name = $1 AND is_active = true",
        )
        .bind(name)
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(db_err)
    }

    async fn insert_exchange(&mut self, exchange: &NewExchange) -> StoreResult<ExchangeRecord> {
        sqlx::query_as::<_, ExchangeRecord>(
            r#"
            INSERT INTO exchanges (id, name, display_name, base_url, rate_limit, features)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&exchange.name)
        .bind(&exchange.display_name)
        .bind(&exchange.base_url)
        .bind(exchange.rate_limit)
        .bind(&exchange.features)
        .fetch_one(&mut *self.tx)
        .await
        .map_err(db_err)
    }

    async fn active_pairs_for_symbols(
        &mut self,
        exchange_id: Uuid,
        symbols: &[String],
    ) -> StoreResult<Vec<TradingPair>> {
        sqlx::query_as::<_, TradingPair>(
            r#"
            SELECT * FROM trading_pairs
            WHERE exchange_id = $1 AND is_active = true AND symbol = ANY($2)
            ORDER BY symbol
            "#,
        )
        .bind(exchange_id)
        .bind(symbols)
        .fetch_all(&mut *self.tx)
        .await
        .map_err(db_err)
    }

    async fn insert_trading_pair(&mut self, pair: &NewTradingPair) -> StoreResult<TradingPair> {
        sqlx::query_as::<_, TradingPair>(
            r#"
            INSERT INTO trading_pairs (
                id, exchange_id, symbol, base_asset, quote_asset,
                tick_size, step_size, min_quantity, max_quantity
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(pair.exchange_id)
        .bind(&pair.symbol)
        .bind(&pair.base_asset)
        .bind(&pair.quote_asset)
        .bind(pair.tick_size)
        .bind(pair.step_size)
        .bind(pair.min_quantity)
        .bind(pair.max_quantity)
        .fetch_one(&mut *self.tx)
        .await
        .map_err(db_err)
    }

    async fn commit(self: Box<Self>) -> StoreResult<()> {
        let PgCatalogTransaction { tx } = *self;
        tx.commit().await.map_err(db_err)
    }

    async fn rollback(self: Box<Self>) -> StoreResult<()> {
        let PgCatalogTransaction { tx } = *self;
        tx.rollback().await.map_err(db_err)
    }
}

#[async_trait]
impl CatalogStore for PgStore {
    async fn begin_catalog(&self) -> StoreResult<Box<dyn CatalogTransaction>> {
        let tx = self.pool.begin().await.map_err(db_err)?;
        Ok(Box::new(PgCatalogTransaction { tx }))
    }

    async fn find_exchange_by_name(&self, name: &str) -> StoreResult<Option<ExchangeRecord>> {
        sqlx::query_as::<_, ExchangeRecord>(
            "SELECT * FROM exchanges WHERE name = $1 AND is_active = true",
        )
        .bind(name)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err)
    }

    async fn find_exchange(&self, id: Uuid) -> StoreResult<Option<ExchangeRecord>> {
        sqlx::query_as::<_, ExchangeRecord>("SELECT * FROM exchanges WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)
    }

    async fn list_trading_pairs(&self, exchange_id: Uuid) -> StoreResult<Vec<TradingPair>> {
        sqlx::query_as::<_, TradingPair>(
            r#"
            SELECT * FROM trading_pairs
            WHERE exchange_id = $1 AND is_active = true
            ORDER BY symbol
            "#,
        )
        .bind(exchange_id)
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)
    }

    async fn find_trading_pair(
        &self,
        exchange_id: Uuid,
        symbol: &str,
    ) -> StoreResult<Option<TradingPair>> {
        sqlx::query_as::<_, TradingPair>(
            r#"
            SELECT * FROM trading_pairs
            WHERE exchange_id = $1 AND symbol = $2 AND is_active = true
            "#,
        )
        .bind(exchange_id)
        .bind(symbol)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err)
    }

    async fn find_trading_pair_by_id(&self, id: Uuid) -> StoreResult<Option<TradingPair>> {
        sqlx::query_as::<_, TradingPair>("SELECT * FROM trading_pairs WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)
    }
}

// ----------------------------------------------------------------------------
// 자격증명
// ----------------------------------------------------------------------------

#[async_trait]
impl CredentialStore for PgStore {
    async fn find_latest_active_credential(
        &self,
        user_id: Uuid,
        exchange_id: Uuid,
    ) -> StoreResult<Option<ExchangeCredential>> {
        sqlx::query_as::<_, ExchangeCredential>(
            r#"
            SELECT * FROM exchange_credentials
            WHERE user_id = $1 AND exchange_id = $2 AND is_active = true
            ORDER BY created_at DESC
            LIMIT 1
            "#,
        )
        .bind(user_id)
        .bind(exchange_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err)
    }

    async fn list_credentials(&self, user_id: Uuid) -> StoreResult<Vec<ExchangeCredential>> {
        sqlx::query_as::<_, ExchangeCredential>(
            r#"
            SELECT * FROM exchange_credentials
            WHERE user_id = $1 AND is_active = true
            ORDER BY created_at DESC
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)
    }

    async fn insert_credential(
        &self,
        credential: &NewCredential,
    ) -> StoreResult<ExchangeCredential> {
        sqlx::query_as::<_, ExchangeCredential>(
            r#"
            INSERT INTO exchange_credentials (
                id, user_id, exchange_id, label, api_key, secret_key,
                access_key, refresh_key, access_expires_at, is_testnet
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(credential.user_id)
        .bind(credential.exchange_id)
        .bind(&credential.label)
        .bind(&credential.api_key)
        .bind(&credential.secret_key)
        .bind(&credential.access_key)
        .bind(&credential.refresh_key)
        .bind(credential.access_expires_at)
        .bind(credential.is_testnet)
        .fetch_one(&self.pool)
        .await
        .map_err(db_err)
    }

    async fn rotate_credential_secrets(
        &self,
        id: Uuid,
        secrets: &RotatedSecrets,
    ) -> StoreResult<ExchangeCredential> {
        sqlx::query_as::<_, ExchangeCredential>(
            r#"
            UPDATE exchange_credentials
            SET api_key = $2,
                access_key = $3,
                refresh_key = COALESCE($4, refresh_key),
                access_expires_at = $5,
                updated_at = NOW()
            WHERE id = $1 AND is_active = true
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(&secrets.api_key)
        .bind(&secrets.access_key)
        .bind(&secrets.refresh_key)
        .bind(secrets.access_expires_at)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err)?
        .ok_or_else(|| StoreError::NotFound(format!("exchange credential {}", id)))
    }

    async fn touch_credential(&self, id: Uuid, used_at: DateTime<Utc>) -> StoreResult<()> {
        sqlx::query("UPDATE exchange_credentials SET last_used = $2 WHERE id = $1")
            .bind(id)
            .bind(used_at)
            .execute(&self.pool)
            .await
            .map_err(db_err)?;
        Ok(())
    }

    async fn deactivate_credential(&self, id: Uuid) -> StoreResult<()> {
        let result = sqlx::query(
            "UPDATE exchange_credentials SET is_active = false, updated_at = NOW() WHERE id = $1",
        )
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(db_err)?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(format!("exchange credential {}", id)));
        }
        Ok(())
    }
}

// ----------------------------------------------------------------------------
// 주문 기록
// ----------------------------------------------------------------------------

#[async_trait]
impl OrderStore for PgStore {
    async fn insert_order(&self, order: &NewOrderHistory) -> StoreResult<OrderHistory> {
        sqlx::query_as::<_, OrderHistory>(
            r#"
            INSERT INTO order_history (
                id, user_id, exchange_credential_id, exchange_id, trading_pair_id,
                client_order_id, exchange_order_id, side, order_type,
                quantity, price, status
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(order.user_id)
        .bind(order.exchange_credential_id)
        .bind(order.exchange_id)
        .bind(order.trading_pair_id)
        .bind(&order.client_order_id)
        .bind(&order.exchange_order_id)
        .bind(&order.side)
        .bind(&order.order_type)
        .bind(order.quantity)
        .bind(order.price)
        .bind(&order.status)
        .fetch_one(&self.pool)
        .await
        .map_err(db_err)
    }

    async fn find_order(
        &self,
        id: Uuid,
        user_id: Uuid,
        exchange_id: Uuid,
    ) -> StoreResult<Option<OrderHistory>> {
        sqlx::query_as::<_, OrderHistory>(
            r#"
            SELECT * FROM order_history
            WHERE id = $1 AND user_id = $2 AND exchange_id = $3
            "#,
        )
        .bind(id)
        .bind(user_id)
        .bind(exchange_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err)
    }

    async fn find_order_by_client_order_id(
        &self,
        user_id: Uuid,
        client_order_id: &str,
    ) -> StoreResult<Option<OrderHistory>> {
        sqlx::query_as::<_, OrderHistory>(
            r#"
            SELECT * FROM order_history
            WHERE user_id = $1 AND client_order_id = $2
            ORDER BY created_at DESC
            LIMIT 1
            "#,
        )
        .bind(user_id)
        .bind(client_order_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err)
    }

    async fn find_order_by_exchange_order_id(
        &self,
        exchange_id: Uuid,
        exchange_order_id: &str,
    ) -> StoreResult<Option<OrderHistory>> {
        sqlx::query_as::<_, OrderHistory>(
            r#"
            SELECT * FROM order_history
            WHERE exchange_id = $1 AND exchange_order_id = $2
            ORDER BY created_at DESC
            LIMIT 1
            "#,
        )
        .bind(exchange_id)
        .bind(exchange_order_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err)
    }

    async fn list_orders(&self, user_id: Uuid, limit: i64) -> StoreResult<Vec<OrderHistory>> {
        sqlx::query_as::<_, OrderHistory>(
            r#"
            SELECT * FROM order_history
            WHERE user_id = $1
            ORDER BY created_at DESC
            LIMIT $2
            "#,
        )
        .bind(user_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)
    }
}

// ----------------------------------------------------------------------------
// 스냅샷
// ----------------------------------------------------------------------------

#[async_trait]
impl SnapshotStore for PgStore {
    async fn insert_balance_snapshots(
        &self,
        snapshots: &[NewBalanceSnapshot],
    ) -> StoreResult<Vec<BalanceSnapshot>> {
        let mut tx = self.pool.begin().await.map_err(db_err)?;
        let mut saved = Vec::with_capacity(snapshots.len());

        for snapshot in snapshots {
            let row = sqlx::query_as::<_, BalanceSnapshot>(
                r#"
                INSERT INTO balance_snapshots (
                    id, user_id, exchange_id, currency, total, available, snapshot_time
                )
                VALUES ($1, $2, $3, $4, $5, $6, $7)
                RETURNING *
                "#,
            )
            .bind(Uuid::new_v4())
            .bind(snapshot.user_id)
            .bind(snapshot.exchange_id)
            .bind(&snapshot.currency)
            .bind(snapshot.total)
            .bind(snapshot.available)
            .bind(snapshot.snapshot_time)
            .fetch_one(&mut *tx)
            .await
            .map_err(db_err)?;
            saved.push(row);
        }

        tx.commit().await.map_err(db_err)?;
        debug!(count = saved.len(), "Balance snapshots saved");

        Ok(saved)
    }

    async fn latest_balances(
        &self,
        user_id: Uuid,
        exchange_id: Uuid,
    ) -> StoreResult<Vec<BalanceSnapshot>> {
        sqlx::query_as::<_, BalanceSnapshot>(
            r#"
            SELECT DISTINCT ON (currency) *
            FROM balance_snapshots
            WHERE user_id = $1 AND exchange_id = $2
            ORDER BY currency, snapshot_time DESC
            "#,
        )
        .bind(user_id)
        .bind(exchange_id)
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)
    }

    async fn insert_order_book_snapshot(
        &self,
        snapshot: &NewOrderBookSnapshot,
    ) -> StoreResult<OrderBookSnapshot> {
        let row = sqlx::query_as::<_, OrderBookSnapshotRow>(
            r#"
            INSERT INTO order_book_snapshots (
                id, exchange_id, trading_pair_id, symbol, bids, asks, snapshot_time
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(snapshot.exchange_id)
        .bind(snapshot.trading_pair_id)
        .bind(&snapshot.symbol)
        .bind(Json(&snapshot.bids))
        .bind(Json(&snapshot.asks))
        .bind(snapshot.snapshot_time)
        .fetch_one(&self.pool)
        .await
        .map_err(db_err)?;

        Ok(row.into())
    }

    async fn latest_order_book(
        &self,
        trading_pair_id: Uuid,
    ) -> StoreResult<Option<OrderBookSnapshot>> {
        let row = sqlx::query_as::<_, OrderBookSnapshotRow>(
            r#"
            SELECT * FROM order_book_snapshots
            WHERE trading_pair_id = $1
            ORDER BY snapshot_time DESC
            LIMIT 1
            "#,
        )
        .bind(trading_pair_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err)?;

        Ok(row.map(Into::into))
    }

    async fn prune_snapshots_before(&self, cutoff: DateTime<Utc>) -> StoreResult<u64> {
        let mut tx = self.pool.begin().await.map_err(db_err)?;

        let balances = sqlx::query("DELETE FROM balance_snapshots WHERE snapshot_time < $1")
            .bind(cutoff)
            .execute(&mut *tx)
            .await
            .map_err(db_err)?
            .rows_affected();

        let books = sqlx::query("DELETE FROM order_book_snapshots WHERE snapshot_time < $1")
            .bind(cutoff)
            .execute(&mut *tx)
            .await
            .map_err(db_err)?
            .rows_affected();

        tx.commit().await.map_err(db_err)?;
        info!(balances, books, %cutoff, "Old snapshots pruned");

        Ok(balances + books)
    }
}
