//! 거래소 레지스트리.
//!
//! 거래소 이름을 심볼 카탈로그와 어댑터 생성자에 묶습니다.
//! 프로세스 시작 시 한 번 만들어 `Arc`로 공유하며, `build()` 이후에는 읽기 전용입니다.
//!
//! `get_or_create_exchange`는 하나의 트랜잭션 안에서:
//! 1. 거래소 이름 잠금
//! 2. 활성 거래소 조회, 없으면 생성
//! 3. 카탈로그와 저장된 거래쌍 비교 후 빠진 심볼만 추가
//! 4. 커밋 (실패 시 전부 롤백)
//!
//! 그 다음 어댑터를 생성합니다.

use crate::catalog::{BitpinCatalog, NobitexCatalog, SymbolCatalog};
use crate::connector::{BitpinExchange, NobitexExchange};
use crate::credentials::CredentialManager;
use crate::error::ExchangeError;
use crate::traits::{Exchange, ExchangeResult};
use eyeon_core::{
    CatalogTransaction, ExchangeConfig, ExchangeRecord, NewExchange, SecretCodec, Store,
    TradingPair,
};
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// 어댑터 생성자에 전달되는 값.
pub struct AdapterContext {
    pub config: ExchangeConfig,
    pub exchange: ExchangeRecord,
    pub store: Arc<dyn Store>,
    pub credentials: Arc<CredentialManager>,
    pub catalog: Arc<dyn SymbolCatalog>,
}

/// 어댑터 생성자.
pub type AdapterConstructor =
    Arc<dyn Fn(AdapterContext) -> ExchangeResult<Arc<dyn Exchange>> + Send + Sync>;

#[derive(Clone)]
struct Binding {
    catalog: Arc<dyn SymbolCatalog>,
    constructor: AdapterConstructor,
}

/// 준비된 거래소.
pub struct ExchangeHandle {
    pub exchange: ExchangeRecord,
    /// 카탈로그에 있는 활성 거래쌍 (심볼 순)
    pub trading_pairs: Vec<TradingPair>,
    pub adapter: Arc<dyn Exchange>,
    /// 이번 호출에서 거래소 행을 새로 만들었는지
    pub is_new_exchange: bool,
}

impl fmt::Debug for ExchangeHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExchangeHandle")
            .field("exchange", &self.exchange.name)
            .field("trading_pairs", &self.trading_pairs.len())
            .field("is_new_exchange", &self.is_new_exchange)
            .finish()
    }
}

fn normalize(name: &str) -> String {
    name.trim().to_lowercase()
}

// ============================================================================
// 빌더
// ============================================================================

/// 레지스트리 빌더.
pub struct ExchangeRegistryBuilder {
    store: Arc<dyn Store>,
    credentials: Arc<CredentialManager>,
    bindings: HashMap<String, Binding>,
}

impl ExchangeRegistryBuilder {
    /// 이름에 카탈로그와 생성자를 등록.
    ///
    /// # Errors
    /// 이미 등록된 이름이면 `ExchangeError::AlreadyRegistered`.
    pub fn register<F>(
        mut self,
        name: impl AsRef<str>,
        catalog: Arc<dyn SymbolCatalog>,
        constructor: F,
    ) -> ExchangeResult<Self>
    where
        F: Fn(AdapterContext) -> ExchangeResult<Arc<dyn Exchange>> + Send + Sync + 'static,
    {
        let name = normalize(name.as_ref());
        if name.is_empty() {
            return Err(ExchangeError::ValidationFailed(
                "exchange name must not be empty".into(),
            ));
        }
        if self.bindings.contains_key(&name) {
            return Err(ExchangeError::AlreadyRegistered(name));
        }

        debug!(exchange = %name, "Registering exchange adapter");
        self.bindings.insert(
            name,
            Binding {
                catalog,
                constructor: Arc::new(constructor),
            },
        );
        Ok(self)
    }

    /// Bitpin, Nobitex 어댑터 등록.
    pub fn with_default_adapters(self) -> ExchangeResult<Self> {
        self.register("bitpin", Arc::new(BitpinCatalog), BitpinExchange::create)?
            .register("nobitex", Arc::new(NobitexCatalog), NobitexExchange::create)
    }

    pub fn build(self) -> ExchangeRegistry {
        ExchangeRegistry {
            store: self.store,
            credentials: self.credentials,
            bindings: self.bindings,
        }
    }
}

// ============================================================================
// 레지스트리
// ============================================================================

/// 거래소 레지스트리.
pub struct ExchangeRegistry {
    store: Arc<dyn Store>,
    credentials: Arc<CredentialManager>,
    bindings: HashMap<String, Binding>,
}

impl fmt::Debug for ExchangeRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExchangeRegistry")
            .field("exchanges", &self.supported_exchanges())
            .finish()
    }
}

impl ExchangeRegistry {
    pub fn builder(store: Arc<dyn Store>, codec: Arc<SecretCodec>) -> ExchangeRegistryBuilder {
        let credentials = Arc::new(CredentialManager::new(store.clone(), codec));
        ExchangeRegistryBuilder {
            store,
            credentials,
            bindings: HashMap::new(),
        }
    }

    /// 등록된 거래소 이름 (정렬).
    pub fn supported_exchanges(&self) -> Vec<String> {
        let mut names: Vec<String> = self.bindings.keys().cloned().collect();
        names.sort();
        names
    }

    pub fn is_supported(&self, name: &str) -> bool {
        self.bindings.contains_key(&normalize(name))
    }

    /// 어댑터들이 공유하는 자격증명 관리자.
    pub fn credentials(&self) -> Arc<CredentialManager> {
        self.credentials.clone()
    }

    /// 거래소 행과 거래쌍을 준비하고 어댑터를 생성.
    ///
    /// 여러 번 호출해도 같은 거래소 행을 재사용하며 거래쌍을 중복 생성하지 않습니다.
    pub async fn get_or_create_exchange(
        &self,
        config: &ExchangeConfig,
    ) -> ExchangeResult<ExchangeHandle> {
        let name = normalize(&config.name);
        let binding = self
            .bindings
            .get(&name)
            .ok_or_else(|| ExchangeError::UnsupportedExchange(config.name.clone()))?;

        let mut tx = self.store.begin_catalog().await?;
        let reconciled = reconcile(tx.as_mut(), &name, config, binding.catalog.as_ref()).await;

        let (exchange, trading_pairs, is_new_exchange, inserted) = match reconciled {
            Ok(result) => result,
            Err(e) => {
                error!(exchange = %name, error = %e, "Catalog reconciliation failed, rolling back");
                if let Err(rollback_err) = tx.rollback().await {
                    warn!(exchange = %name, error = %rollback_err, "Rollback failed");
                }
                return Err(e);
            }
        };
        tx.commit().await?;

        info!(
            exchange = %name,
            exchange_id = %exchange.id,
            is_new_exchange,
            inserted_pairs = inserted,
            total_pairs = trading_pairs.len(),
            "Exchange catalog reconciled"
        );

        let adapter = (binding.constructor)(AdapterContext {
            config: config.clone(),
            exchange: exchange.clone(),
            store: self.store.clone(),
            credentials: self.credentials.clone(),
            catalog: binding.catalog.clone(),
        })
        .map_err(|e| {
            error!(exchange = %name, error = %e, "Adapter construction failed");
            e
        })?;

        Ok(ExchangeHandle {
            exchange,
            trading_pairs,
            adapter,
            is_new_exchange,
        })
    }
}

/// 트랜잭션 안에서 거래소/거래쌍 정합.
///
/// 추가만 하며 기존 거래쌍은 변경하거나 삭제하지 않습니다.
async fn reconcile(
    tx: &mut dyn CatalogTransaction,
    name: &str,
    config: &ExchangeConfig,
    catalog: &dyn SymbolCatalog,
) -> ExchangeResult<(ExchangeRecord, Vec<TradingPair>, bool, usize)> {
    tx.lock_exchange_name(name).await?;

    let (exchange, is_new_exchange) = match tx.find_active_exchange(name).await? {
        Some(existing) => (existing, false),
        None => {
            let created = tx
                .insert_exchange(&NewExchange {
                    name: name.to_string(),
                    display_name: config.display_name.clone(),
                    base_url: config.base_url.clone(),
                    rate_limit: config.rate_limit,
                    features: config.features.clone(),
                })
                .await?;
            (created, true)
        }
    };

    let entries = catalog.pairs();
    let symbols = catalog.symbols();
    let mut pairs = tx.active_pairs_for_symbols(exchange.id, &symbols).await?;
    let existing: HashSet<String> = pairs.iter().map(|p| p.symbol.clone()).collect();

    let mut inserted = 0;
    for entry in entries.iter().filter(|e| !existing.contains(e.symbol)) {
        let pair = tx.insert_trading_pair(&entry.to_new_pair(exchange.id)).await?;
        pairs.push(pair);
        inserted += 1;
    }

    pairs.sort_by(|a, b| a.symbol.cmp(&b.symbol));
    Ok((exchange, pairs, is_new_exchange, inserted))
}
