//! CLI 명령어 구현 모듈.

mod credentials;
mod market;
mod trading;

pub use credentials::{add_credential, deactivate_credential, list_credentials, AddCredentialArgs};
pub use market::{balance, order_book, orders, ping};
pub use trading::{cancel_order, place_order, PlaceOrderArgs};

use anyhow::{Context, Result};
use eyeon_core::crypto::generate_master_key;
use eyeon_core::{AppConfig, ExchangeConfig, SecretCodec, Store};
use eyeon_exchange::{ExchangeHandle, ExchangeRegistry};
use eyeon_storage::Database;
use std::sync::Arc;
use tracing::info;

/// 명령 실행에 필요한 공유 상태.
pub struct App {
    pub config: AppConfig,
    pub store: Arc<dyn Store>,
    pub registry: ExchangeRegistry,
}

impl App {
    /// DB 연결, 마이그레이션, 레지스트리 생성.
    pub async fn bootstrap(config: AppConfig) -> Result<Self> {
        let codec = SecretCodec::from_secret(&config.security.encryption_key)
            .context("invalid security.encryption_key")?;

        let db = Database::connect(&config.database)
            .await
            .context("database connection failed")?;
        db.migrate().await.context("database migration failed")?;

        let store: Arc<dyn Store> = Arc::new(db.store());
        let registry = ExchangeRegistry::builder(store.clone(), Arc::new(codec))
            .with_default_adapters()?
            .build();

        Ok(Self {
            config,
            store,
            registry,
        })
    }

    /// 설정에 있는 거래소 설정, 없으면 내장 기본값.
    pub fn exchange_config(&self, name: &str) -> Result<ExchangeConfig> {
        if let Some(config) = self.config.exchange(name) {
            return Ok(config.clone());
        }
        match name.to_lowercase().as_str() {
            "bitpin" => Ok(ExchangeConfig::bitpin()),
            "nobitex" => Ok(ExchangeConfig::nobitex()),
            _ => anyhow::bail!(
                "Unknown exchange: {}. Supported: {}",
                name,
                self.registry.supported_exchanges().join(", ")
            ),
        }
    }

    /// 거래소 준비 (카탈로그 정합 포함).
    pub async fn exchange(&self, name: &str) -> Result<ExchangeHandle> {
        let config = self.exchange_config(name)?;
        Ok(self.registry.get_or_create_exchange(&config).await?)
    }
}

/// 새 마스터 키 출력.
pub fn keygen() {
    println!("{}", generate_master_key());
    eprintln!("\nEYEON__SECURITY__ENCRYPTION_KEY 환경 변수 또는 [security] encryption_key 에 설정하세요.");
}

/// 거래소 카탈로그 동기화.
pub async fn sync(app: &App, exchange: Option<&str>) -> Result<()> {
    let names: Vec<String> = match exchange {
        Some(name) => vec![name.to_string()],
        None => app.config.exchanges.iter().map(|e| e.name.clone()).collect(),
    };

    for name in names {
        let handle = app.exchange(&name).await?;
        info!(
            exchange = %handle.exchange.name,
            pairs = handle.trading_pairs.len(),
            is_new = handle.is_new_exchange,
            "Exchange synced"
        );
        println!(
            "{:<10} {}  pairs={}{}",
            handle.exchange.name,
            handle.exchange.id,
            handle.trading_pairs.len(),
            if handle.is_new_exchange { "  (new)" } else { "" }
        );
    }

    Ok(())
}
