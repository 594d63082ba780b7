//! 거래소별 정적 심볼 카탈로그.
//!
//! 레지스트리가 거래소를 처음 준비할 때 이 목록과 저장된 거래쌍을
//! 비교하여 빠진 심볼만 추가합니다.

mod bitpin;
mod nobitex;

pub use bitpin::BitpinCatalog;
pub use nobitex::NobitexCatalog;

use crate::translator::SymbolParts;
use eyeon_core::NewTradingPair;
use rust_decimal::Decimal;
use uuid::Uuid;

/// 카탈로그 항목.
#[derive(Debug, Clone, PartialEq)]
pub struct CatalogEntry {
    /// 거래소 고유 심볼
    pub symbol: &'static str,
    pub base_asset: &'static str,
    pub quote_asset: &'static str,
    pub tick_size: Decimal,
    pub step_size: Decimal,
    pub min_quantity: Option<Decimal>,
    pub max_quantity: Option<Decimal>,
}

impl CatalogEntry {
    /// 저장용 거래쌍 입력으로 변환.
    pub fn to_new_pair(&self, exchange_id: Uuid) -> NewTradingPair {
        NewTradingPair {
            exchange_id,
            symbol: self.symbol.to_string(),
            base_asset: self.base_asset.to_string(),
            quote_asset: self.quote_asset.to_string(),
            tick_size: self.tick_size,
            step_size: self.step_size,
            min_quantity: self.min_quantity,
            max_quantity: self.max_quantity,
        }
    }
}

pub(crate) fn entry(
    symbol: &'static str,
    base_asset: &'static str,
    quote_asset: &'static str,
    tick_size: Decimal,
    step_size: Decimal,
) -> CatalogEntry {
    CatalogEntry {
        symbol,
        base_asset,
        quote_asset,
        tick_size,
        step_size,
        min_quantity: None,
        max_quantity: None,
    }
}

/// 거래소 심볼 카탈로그.
pub trait SymbolCatalog: Send + Sync {
    fn exchange_name(&self) -> &str;

    /// 정적 거래쌍 전체.
    fn pairs(&self) -> Vec<CatalogEntry>;

    /// 기준/호가 자산을 거래소 고유 심볼 형식으로.
    fn format_symbol(&self, parts: &SymbolParts) -> String;

    /// 거래소 고유 심볼 목록 (`pairs` 순서).
    fn symbols(&self) -> Vec<String> {
        self.pairs().iter().map(|p| p.symbol.to_string()).collect()
    }
}
