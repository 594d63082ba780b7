//! 저장소 구현.
//!
//! `eyeon_core::repository`의 포트를 구현합니다:
//! - `PgStore`: PostgreSQL (`sqlx`)
//! - `MemoryStore`: 테스트/로컬 실행용 메모리 구현

pub mod memory;
pub mod postgres;

pub use memory::MemoryStore;
pub use postgres::{Database, PgStore};
