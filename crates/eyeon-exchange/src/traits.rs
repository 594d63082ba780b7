//! 거래소 trait 정의.

use async_trait::async_trait;
use eyeon_core::{
    CancelHints, StandardBalanceResponse, StandardOrderBookResponse, StandardOrderRequest,
    StandardOrderResponse,
};
use uuid::Uuid;

use crate::ExchangeError;

/// 거래소 작업을 위한 Result 타입.
pub type ExchangeResult<T> = Result<T, ExchangeError>;

/// 통합 거래소 인터페이스를 위한 Exchange trait.
///
/// 거래소 고유 지식(인증, 엔드포인트, 심볼 형식, 응답 형태)은 구현체 안에만 존재합니다.
/// 성공한 조회/주문은 스냅샷 또는 주문 기록 한 건을 남깁니다.
#[async_trait]
pub trait Exchange: Send + Sync {
    /// 거래소 이름 반환.
    fn name(&self) -> &str;

    /// 거래소 API 도달 가능 여부 확인.
    async fn ping(&self) -> ExchangeResult<()>;

    // === 계좌 작업 ===

    /// 사용자 잔고 조회.
    ///
    /// `asset`을 주면 해당 자산만 반환합니다. 자산 지정이 필수인 거래소도 있습니다.
    async fn get_balance(
        &self,
        user_id: Uuid,
        asset: Option<&str>,
    ) -> ExchangeResult<Vec<StandardBalanceResponse>>;

    // === 시장 데이터 ===

    /// 심볼의 호가창 조회.
    ///
    /// `symbol`은 정규 심볼이며 거래소 형식으로 변환됩니다.
    async fn get_order_book(
        &self,
        symbol: &str,
        user_id: Uuid,
    ) -> ExchangeResult<StandardOrderBookResponse>;

    // === 주문 작업 ===

    /// 새 주문 제출.
    ///
    /// 요청 검증, 자격증명, 거래쌍 순서로 확인하며 모두 통과해야 네트워크 요청을 보냅니다.
    async fn place_order(
        &self,
        request: &StandardOrderRequest,
        user_id: Uuid,
    ) -> ExchangeResult<StandardOrderResponse>;

    /// 주문 취소.
    ///
    /// `order_id`는 주문 기록 ID입니다 (`StandardOrderResponse::history_id`).
    /// 거래소마다 의미가 다릅니다:
    /// - 개별 취소 거래소는 해당 주문 하나만 취소합니다.
    /// - 시간 창 일괄 취소 거래소는 `hints.hours`가 필요하며, 같은 마켓과 실행
    ///   유형으로 최근 `hours` 시간 안에 만든 열린 주문을 모두 취소합니다.
    ///
    /// 주문 기록의 상태는 변경하지 않습니다.
    async fn cancel_order(
        &self,
        order_id: Uuid,
        user_id: Uuid,
        hints: CancelHints,
    ) -> ExchangeResult<()>;
}
