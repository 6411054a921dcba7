//! 식별자와 열거형 공통 타입.

mod period;
mod stock;

pub use period::*;
pub use stock::*;
