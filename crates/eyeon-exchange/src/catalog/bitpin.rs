//! Bitpin 심볼 카탈로그 (`BASE_QUOTE`).

use super::{entry, CatalogEntry, SymbolCatalog};
use crate::translator::SymbolParts;
use rust_decimal_macros::dec;

#[derive(Debug, Clone, Copy, Default)]
pub struct BitpinCatalog;

impl SymbolCatalog for BitpinCatalog {
    fn exchange_name(&self) -> &str {
        "bitpin"
    }

    fn pairs(&self) -> Vec<CatalogEntry> {
        vec![
            entry("BTC_IRT", "BTC", "IRT", dec!(1), dec!(0.00000001)),
            entry("BTC_USDT", "BTC", "USDT", dec!(0.01), dec!(0.00000001)),
            entry("ETH_USDT", "ETH", "USDT", dec!(0.01), dec!(0.00001)),
            entry("ETH_IRT", "ETH", "IRT", dec!(1), dec!(0.00001)),
            entry("XRP_USDT", "XRP", "USDT", dec!(0.00001), dec!(0.0001)),
            entry("USDT_IRT", "USDT", "IRT", dec!(1), dec!(0.01)),
            entry("SOL_IRT", "SOL", "IRT", dec!(1), dec!(0.0001)),
            entry("SOL_USDT", "SOL", "USDT", dec!(0.001), dec!(0.0001)),
            entry("BNB_IRT", "BNB", "IRT", dec!(1), dec!(0.0001)),
            entry("BNB_USDT", "BNB", "USDT", dec!(0.001), dec!(0.0001)),
            entry("USDC_IRT", "USDC", "IRT", dec!(1), dec!(0.01)),
            entry("ADA_IRT", "ADA", "IRT", dec!(1), dec!(0.01)),
            entry("ADA_USDT", "ADA", "USDT", dec!(0.0001), dec!(0.01)),
            entry("DOGE_IRT", "DOGE", "IRT", dec!(1), dec!(0.0001)),
            entry("DOGE_USDT", "DOGE", "USDT", dec!(0.00001), dec!(0.0001)),
            entry("TRX_IRT", "TRX", "IRT", dec!(1), dec!(0.01)),
            entry("TRX_USDT", "TRX", "USDT", dec!(0.0001), dec!(0.01)),
            entry("LINK_USDT", "LINK", "USDT", dec!(0.0001), dec!(0.0001)),
            entry("DOT_IRT", "DOT", "IRT", dec!(1), dec!(0.0001)),
            entry("DOT_USDT", "DOT", "USDT", dec!(0.0001), dec!(0.0001)),
            entry("LTC_IRT", "LTC", "IRT", dec!(1), dec!(0.001)),
            entry("LTC_USDT", "LTC", "USDT", dec!(0.001), dec!(0.001)),
            entry("AVAX_IRT", "AVAX", "IRT", dec!(1), dec!(0.0001)),
            entry("AVAX_USDT", "AVAX", "USDT", dec!(0.001), dec!(0.0001)),
            entry("UNI_IRT", "UNI", "IRT", dec!(1), dec!(0.0001)),
            entry("UNI_USDT", "UNI", "USDT", dec!(0.0001), dec!(0.0001)),
            entry("TON_USDT", "TON", "USDT", dec!(0.0001), dec!(0.0001)),
            entry("ATOM_USDT", "ATOM", "USDT", dec!(0.0001), dec!(0.0001)),
            entry("XLM_USDT", "XLM", "USDT", dec!(0.0001), dec!(0.01)),
            entry("BCH_IRT", "BCH", "IRT", dec!(1), dec!(0.0001)),
            entry("BCH_USDT", "BCH", "USDT", dec!(0.01), dec!(0.0001)),
        ]
    }

    fn format_symbol(&self, parts: &SymbolParts) -> String {
        parts.joined("_")
    }
}
