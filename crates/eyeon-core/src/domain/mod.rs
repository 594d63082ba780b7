//! 도메인 모델.

pub mod market;
pub mod order;
pub mod records;

pub use market::*;
pub use order::*;
pub use records::*;
