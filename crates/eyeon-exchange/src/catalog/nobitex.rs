//! Nobitex 심볼 카탈로그 (`BASEQUOTE`).

use super::{entry, CatalogEntry, SymbolCatalog};
use crate::translator::SymbolParts;
use rust_decimal_macros::dec;

#[derive(Debug, Clone, Copy, Default)]
pub struct NobitexCatalog;

impl SymbolCatalog for NobitexCatalog {
    fn exchange_name(&self) -> &str {
        "nobitex"
    }

    fn pairs(&self) -> Vec<CatalogEntry> {
        vec![
            entry("BTCIRT", "BTC", "IRT", dec!(1), dec!(0.00000001)),
            entry("ETHIRT", "ETH", "IRT", dec!(1), dec!(0.00000001)),
            entry("USDTIRT", "USDT", "IRT", dec!(1), dec!(0.0001)),
            entry("BNBIRT", "BNB", "IRT", dec!(1), dec!(0.0001)),
            entry("USDCIRT", "USDC", "IRT", dec!(1), dec!(0.0001)),
            entry("BTCUSDT", "BTC", "USDT", dec!(0.01), dec!(0.00000001)),
            entry("ETHUSDT", "ETH", "USDT", dec!(0.01), dec!(0.00000001)),
            entry("LTCUSDT", "LTC", "USDT", dec!(0.01), dec!(0.001)),
            entry("XRPUSDT", "XRP", "USDT", dec!(0.01), dec!(0.0001)),
            entry("BCHUSDT", "BCH", "USDT", dec!(0.01), dec!(0.001)),
            entry("BNBUSDT", "BNB", "USDT", dec!(0.01), dec!(0.0001)),
            entry("EOSUSDT", "EOS", "USDT", dec!(0.01), dec!(0.0001)),
            entry("XLMUSDT", "XLM", "USDT", dec!(0.01), dec!(0.01)),
            entry("ETCUSDT", "ETC", "USDT", dec!(0.01), dec!(0.0001)),
            entry("TRXUSDT", "TRX", "USDT", dec!(0.01), dec!(0.01)),
            entry("DOGEUSDT", "DOGE", "USDT", dec!(0.01), dec!(0.0001)),
            entry("UNIUSDT", "UNI", "USDT", dec!(0.01), dec!(0.0001)),
            entry("DAIUSDT", "DAI", "USDT", dec!(0.01), dec!(0.0001)),
            entry("LINKUSDT", "LINK", "USDT", dec!(0.01), dec!(0.0001)),
            entry("DOTUSDT", "DOT", "USDT", dec!(0.01), dec!(0.0001)),
        ]
    }

    fn format_symbol(&self, parts: &SymbolParts) -> String {
        parts.joined("")
    }
}
