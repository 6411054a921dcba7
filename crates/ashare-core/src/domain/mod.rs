//! 수집 대상 레코드 모델.

mod fund_flow;
mod price_bar;
mod profile;
mod rank;

pub use fund_flow::*;
pub use price_bar::*;
pub use profile::*;
pub use rank::*;
