//! 거래소 어댑터 CLI.
//!
//! # 사용 예시
//!
//! ```bash
//! # 마스터 키 생성 (EYEON__SECURITY__ENCRYPTION_KEY 에 설정)
//! eyeon keygen
//!
//! # 마이그레이션 + 거래소 카탈로그 동기화
//! eyeon sync
//!
//! # 자격증명 등록
//! EYEON_API_KEY=... EYEON_SECRET_KEY=... eyeon add-credential -e bitpin -u <user-id>
//!
//! # 잔고/호가창 조회
//! eyeon balance -e nobitex -u <user-id> -a irt
//! eyeon order-book -e bitpin -s BTC_USDT
//!
//! # 주문 생성/취소
//! eyeon place-order -e bitpin -u <user-id> -s BTC_USDT --side buy --price 65000 -q 0.01
//! eyeon cancel-order -e nobitex -u <user-id> --order-id <history-id> --hours 2
//! ```

use clap::{Parser, Subcommand};
use eyeon_core::{init_logging, AppConfig, LogConfig, OrderType, Side};
use rust_decimal::Decimal;
use std::path::PathBuf;
use tracing::error;
use uuid::Uuid;

mod commands;

use commands::App;

#[derive(Parser)]
#[command(name = "eyeon")]
#[command(about = "Exchange adapter CLI - Bitpin / Nobitex 거래소 연동", long_about = None)]
#[command(version)]
struct Cli {
    /// 설정 파일 경로
    #[arg(short, long, default_value = "config/default.toml", global = true)]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// 새 마스터 키 생성 (Base64, 32바이트)
    Keygen,

    /// 마이그레이션 실행 후 거래소/거래쌍 카탈로그 동기화
    Sync {
        /// 특정 거래소만 (기본: 설정된 전체)
        #[arg(short, long)]
        exchange: Option<String>,
    },

    /// 거래소 연결 확인
    Ping {
        #[arg(short, long)]
        exchange: String,
    },

    /// 자격증명 등록 (암호화 저장)
    AddCredential {
        #[arg(short, long)]
        exchange: String,

        /// 사용자 ID
        #[arg(short, long)]
        user: Uuid,

        #[arg(long, env = "EYEON_API_KEY", hide_env_values = true)]
        api_key: String,

        #[arg(long, env = "EYEON_SECRET_KEY", hide_env_values = true)]
        secret_key: String,

        /// 라벨 (기본: Default)
        #[arg(short, long)]
        label: Option<String>,

        /// 테스트넷 자격증명 여부
        #[arg(long, default_value = "false")]
        testnet: bool,
    },

    /// 사용자 자격증명 목록
    ListCredentials {
        #[arg(short, long)]
        user: Uuid,
    },

    /// 자격증명 비활성화
    DeactivateCredential {
        /// 자격증명 ID
        id: Uuid,
    },

    /// 잔고 조회 (스냅샷 저장)
    Balance {
        #[arg(short, long)]
        exchange: String,

        #[arg(short, long)]
        user: Uuid,

        /// 자산 (Nobitex는 필수)
        #[arg(short, long)]
        asset: Option<String>,
    },

    /// 호가창 조회 (스냅샷 저장)
    OrderBook {
        #[arg(short, long)]
        exchange: String,

        /// 정규 심볼 (예: BTC_USDT, BTC-IRT, ETHUSDT)
        #[arg(short, long)]
        symbol: String,

        /// 표시할 호가 단계 수
        #[arg(long, default_value = "10")]
        depth: usize,
    },

    /// 주문 생성 (주문 기록 저장)
    PlaceOrder {
        #[arg(short, long)]
        exchange: String,

        #[arg(short, long)]
        user: Uuid,

        /// 정규 심볼 (예: BTC_USDT, BTC-IRT)
        #[arg(short, long)]
        symbol: String,

        /// buy 또는 sell
        #[arg(long)]
        side: Side,

        /// market 또는 limit
        #[arg(long = "type", default_value = "limit")]
        order_type: OrderType,

        /// 기준 자산 수량
        #[arg(short, long)]
        quantity: Option<Decimal>,

        #[arg(long)]
        base_amount: Option<Decimal>,

        /// 호가 자산 금액
        #[arg(long)]
        quote_amount: Option<Decimal>,

        /// 지정가 (limit 주문 필수)
        #[arg(long)]
        price: Option<Decimal>,

        #[arg(long)]
        stop_price: Option<Decimal>,

        #[arg(long)]
        client_order_id: Option<String>,
    },

    /// 주문 취소
    CancelOrder {
        #[arg(short, long)]
        exchange: String,

        #[arg(short, long)]
        user: Uuid,

        /// 주문 기록 ID (place-order 응답의 history_id)
        #[arg(long)]
        order_id: Uuid,

        /// 최근 N시간 안의 주문 일괄 취소 (Nobitex 필수)
        #[arg(long)]
        hours: Option<Decimal>,
    },

    /// 최근 주문 기록
    Orders {
        #[arg(short, long)]
        user: Uuid,

        #[arg(long, default_value = "20")]
        limit: i64,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    if let Commands::Keygen = cli.command {
        commands::keygen();
        return Ok(());
    }

    let config = AppConfig::load(&cli.config)?;
    init_logging(LogConfig::from(&config.logging))
        .map_err(|e| anyhow::anyhow!("failed to initialize logging: {}", e))?;

    let app = App::bootstrap(config).await.map_err(|e| {
        error!("Startup failed: {:#}", e);
        e
    })?;

    let result = match cli.command {
        Commands::Keygen => Ok(()),
        Commands::Sync { exchange } => commands::sync(&app, exchange.as_deref()).await,
        Commands::Ping { exchange } => commands::ping(&app, &exchange).await,
        Commands::AddCredential {
            exchange,
            user,
            api_key,
            secret_key,
            label,
            testnet,
        } => {
            commands::add_credential(
                &app,
                commands::AddCredentialArgs {
                    exchange,
                    user,
                    api_key,
                    secret_key,
                    label,
                    testnet,
                },
            )
            .await
        }
        Commands::ListCredentials { user } => commands::list_credentials(&app, user).await,
        Commands::DeactivateCredential { id } => commands::deactivate_credential(&app, id).await,
        Commands::Balance {
            exchange,
            user,
            asset,
        } => commands::balance(&app, &exchange, user, asset.as_deref()).await,
        Commands::OrderBook {
            exchange,
            symbol,
            depth,
        } => commands::order_book(&app, &exchange, &symbol, depth).await,
        Commands::PlaceOrder {
            exchange,
            user,
            symbol,
            side,
            order_type,
            quantity,
            base_amount,
            quote_amount,
            price,
            stop_price,
            client_order_id,
        } => {
            commands::place_order(
                &app,
                commands::PlaceOrderArgs {
                    exchange,
                    user,
                    symbol,
                    side,
                    order_type,
                    quantity,
                    base_amount,
                    quote_amount,
                    price,
                    stop_price,
                    client_order_id,
                },
            )
            .await
        }
        Commands::CancelOrder {
            exchange,
            user,
            order_id,
            hours,
        } => commands::cancel_order(&app, &exchange, user, order_id, hours).await,
        Commands::Orders { user, limit } => commands::orders(&app, user, limit).await,
    };

    if let Err(e) = &result {
        error!("Command failed: {:#}", e);
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_balance() {
        let user = Uuid::new_v4().to_string();
        let cli = Cli::try_parse_from([
            "eyeon",
            "balance",
            "-e",
            "nobitex",
            "-u",
            user.as_str(),
            "-a",
            "irt",
        ])
        .unwrap();

        match cli.command {
            Commands::Balance { exchange, asset, .. } => {
                assert_eq!(exchange, "nobitex");
                assert_eq!(asset.as_deref(), Some("irt"));
            }
            _ => panic!("expected balance command"),
        }
        assert_eq!(cli.config, PathBuf::from("config/default.toml"));
    }

    #[test]
    fn test_add_credential_requires_keys() {
        let user = Uuid::new_v4().to_string();
        let result = Cli::try_parse_from([
            "eyeon",
            "add-credential",
            "-e",
            "bitpin",
            "-u",
            user.as_str(),
            "--api-key",
            "key",
        ]);
        // EYEON_SECRET_KEY가 설정된 환경에서는 통과할 수 있음
        if std::env::var("EYEON_SECRET_KEY").is_err() {
            assert!(result.is_err());
        }
    }

    #[test]
    fn test_parse_place_order() {
        let user = Uuid::new_v4().to_string();
        let cli = Cli::try_parse_from([
            "eyeon",
            "place-order",
            "-e",
            "bitpin",
            "-u",
            user.as_str(),
            "-s",
            "BTC_USDT",
            "--side",
            "buy",
            "--price",
            "65000",
            "-q",
            "0.01",
        ])
        .unwrap();

        match cli.command {
            Commands::PlaceOrder {
                side,
                order_type,
                quantity,
                price,
                ..
            } => {
                assert_eq!(side, Side::Buy);
                assert_eq!(order_type, OrderType::Limit);
                assert_eq!(quantity, Some(Decimal::new(1, 2)));
                assert_eq!(price, Some(Decimal::new(65000, 0)));
            }
            _ => panic!("expected place-order command"),
        }
    }

    #[test]
    fn test_place_order_rejects_unknown_side() {
        let user = Uuid::new_v4().to_string();
        let result = Cli::try_parse_from([
            "eyeon",
            "place-order",
            "-e",
            "bitpin",
            "-u",
            user.as_str(),
            "-s",
            "BTC_USDT",
            "--side",
            "hold",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn test_parse_cancel_order() {
        let user = Uuid::new_v4().to_string();
        let order = Uuid::new_v4();
        let order_arg = order.to_string();
        let cli = Cli::try_parse_from([
            "eyeon",
            "cancel-order",
            "-e",
            "nobitex",
            "-u",
            user.as_str(),
            "--order-id",
            order_arg.as_str(),
            "--hours",
            "2.5",
        ])
        .unwrap();

        match cli.command {
            Commands::CancelOrder { order_id, hours, .. } => {
                assert_eq!(order_id, order);
                assert_eq!(hours, Some(Decimal::new(25, 1)));
            }
            _ => panic!("expected cancel-order command"),
        }
    }

    #[test]
    fn test_invalid_user_id_rejected() {
        let result = Cli::try_parse_from(["eyeon", "orders", "-u", "not-a-uuid"]);
        assert!(result.is_err());
    }
}
