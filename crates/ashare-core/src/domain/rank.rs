//! 실시간 자금 흐름 랭킹.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use super::fund_flow::TierFlow;
use crate::types::{RankWindow, StockIdentifier};

/// 랭킹 한 행.
///
/// 키는 (captured_at, window, code).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FundFlowRankRow {
    pub captured_at: NaiveDateTime,
    pub window: RankWindow,
    /// 1부터 시작하는 순위
    pub rank: u32,
    pub identifier: StockIdentifier,
    pub name: Option<String>,
    pub latest_price: Option<f64>,
    pub pct_change: Option<f64>,
    pub main: TierFlow,
    pub ultra_large: TierFlow,
    pub large: TierFlow,
    pub medium: TierFlow,
    pub small: TierFlow,
}
