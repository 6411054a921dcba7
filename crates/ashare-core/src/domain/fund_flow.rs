//! 일별/분봉 자금 흐름 레코드.

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

use crate::types::{BarPeriod, Exchange, StockIdentifier};

/// 주문 규모별 자금 흐름 구분.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlowTier {
    /// 주력 (초대형 + 대형)
    Main,
    UltraLarge,
    Large,
    Medium,
    Small,
}

impl FlowTier {
    pub const ALL: [FlowTier; 5] = [
        FlowTier::Main,
        FlowTier::UltraLarge,
        FlowTier::Large,
        FlowTier::Medium,
        FlowTier::Small,
    ];

    /// 컬럼명에 쓰이는 라벨 접두어.
    pub fn label(&self) -> &'static str {
        match self {
            FlowTier::Main => "主力",
            FlowTier::UltraLarge => "超大单",
            FlowTier::Large => "大单",
            FlowTier::Medium => "中单",
            FlowTier::Small => "小单",
        }
    }
}

/// 한 구분의 순유입 금액(억 위안)과 비중(%).
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct TierFlow {
    pub net_amount: Option<f64>,
    pub net_ratio: Option<f64>,
}

impl TierFlow {
    pub fn new(net_amount: Option<f64>, net_ratio: Option<f64>) -> Self {
        Self {
            net_amount,
            net_ratio,
        }
    }
}

/// 종목의 하루치 자금 흐름.
///
/// 자연키는 (code, exchange, date)이며 upsert 시 나머지 필드는 모두 덮어씁니다.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FundFlowRecord {
    pub identifier: StockIdentifier,
    pub date: NaiveDate,
    /// 종목 약칭 (프로필 조회 시 채워짐)
    pub name: Option<String>,
    pub close: Option<f64>,
    pub pct_change: Option<f64>,
    pub main: TierFlow,
    pub ultra_large: TierFlow,
    pub large: TierFlow,
    pub medium: TierFlow,
    pub small: TierFlow,
}

impl FundFlowRecord {
    /// 값이 모두 비어 있는 레코드를 만듭니다.
    pub fn new(identifier: StockIdentifier, date: NaiveDate) -> Self {
        Self {
            identifier,
            date,
            name: None,
            close: None,
            pct_change: None,
            main: TierFlow::default(),
            ultra_large: TierFlow::default(),
            large: TierFlow::default(),
            medium: TierFlow::default(),
            small: TierFlow::default(),
        }
    }

    pub fn code(&self) -> &str {
        self.identifier.code()
    }

    pub fn exchange(&self) -> Exchange {
        self.identifier.exchange()
    }

    pub fn tier(&self, tier: FlowTier) -> &TierFlow {
        match tier {
            FlowTier::Main => &self.main,
            FlowTier::UltraLarge => &self.ultra_large,
            FlowTier::Large => &self.large,
            FlowTier::Medium => &self.medium,
            FlowTier::Small => &self.small,
        }
    }

    pub fn tier_mut(&mut self, tier: FlowTier) -> &mut TierFlow {
        match tier {
            FlowTier::Main => &mut self.main,
            FlowTier::UltraLarge => &mut self.ultra_large,
            FlowTier::Large => &mut self.large,
            FlowTier::Medium => &mut self.medium,
            FlowTier::Small => &mut self.small,
        }
    }
}

/// 분봉 구간 하나의 구분별 순유입 금액 (위안).
///
/// 분봉 테이블의 자금 흐름 컬럼만 갱신하며 키는 (ts_code, trade_time)입니다.
/// `trade_time`은 같은 간격 가격 봉의 시각과 같은 구간 종료 시각입니다.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MinuteFundFlow {
    pub identifier: StockIdentifier,
    pub trade_time: NaiveDateTime,
    pub period: BarPeriod,
    pub main: Option<f64>,
    pub ultra_large: Option<f64>,
    pub large: Option<f64>,
    pub medium: Option<f64>,
    pub small: Option<f64>,
}

impl MinuteFundFlow {
    pub fn new(identifier: StockIdentifier, trade_time: NaiveDateTime, period: BarPeriod) -> Self {
        Self {
            identifier,
            trade_time,
            period,
            main: None,
            ultra_large: None,
            large: None,
            medium: None,
            small: None,
        }
    }

    pub fn ts_code(&self) -> String {
        self.identifier.ts_code()
    }

    pub fn amount(&self, tier: FlowTier) -> Option<f64> {
        *self.slot(tier)
    }

    /// 값을 더합니다. 둘 다 없으면 `None`으로 남습니다.
    pub fn add(&mut self, tier: FlowTier, value: Option<f64>) {
        let slot = self.slot_mut(tier);
        *slot = match (*slot, value) {
            (Some(a), Some(b)) => Some(a + b),
            (a, b) => a.or(b),
        };
    }

    fn slot(&self, tier: FlowTier) -> &Option<f64> {
        match tier {
            FlowTier::Main => &self.main,
            FlowTier::UltraLarge => &self.ultra_large,
            FlowTier::Large => &self.large,
            FlowTier::Medium => &self.medium,
            FlowTier::Small => &self.small,
        }
    }

    fn slot_mut(&mut self, tier: FlowTier) -> &mut Option<f64> {
        match tier {
            FlowTier::Main => &mut self.main,
            FlowTier::UltraLarge => &mut self.ultra_large,
            FlowTier::Large => &mut self.large,
            FlowTier::Medium => &mut self.medium,
            FlowTier::Small => &mut self.small,
        }
    }
}
