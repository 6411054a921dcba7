//! 가격 봉 (일/주/월봉, 분봉).

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

use crate::types::{Adjust, BarPeriod, StockIdentifier};

/// 한 종목의 가격 봉 하나.
///
/// 일/주/월봉은 `timestamp`가 자정이며 키는 (ts_code, 날짜, 주기, 복권)입니다.
/// 분봉의 키는 (ts_code, trade_time)입니다.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceBar {
    pub identifier: StockIdentifier,
    pub name: Option<String>,
    pub timestamp: NaiveDateTime,
    pub period: BarPeriod,
    pub adjust: Adjust,
    pub open: Option<f64>,
    pub close: Option<f64>,
    pub high: Option<f64>,
    pub low: Option<f64>,
    /// 거래량 (주)
    pub volume: Option<f64>,
    /// 거래대금 (위안)
    pub amount: Option<f64>,
    /// 진폭 (%)
    pub amplitude: Option<f64>,
    pub pct_change: Option<f64>,
    /// 전일 대비 가격 변동
    pub change: Option<f64>,
    /// 회전율 (%)
    pub turnover: Option<f64>,
}

impl PriceBar {
    pub fn new(
        identifier: StockIdentifier,
        timestamp: NaiveDateTime,
        period: BarPeriod,
        adjust: Adjust,
    ) -> Self {
        Self {
            identifier,
            name: None,
            timestamp,
            period,
            adjust,
            open: None,
            close: None,
            high: None,
            low: None,
            volume: None,
            amount: None,
            amplitude: None,
            pct_change: None,
            change: None,
            turnover: None,
        }
    }

    pub fn date(&self) -> NaiveDate {
        self.timestamp.date()
    }

    pub fn ts_code(&self) -> String {
        self.identifier.ts_code()
    }
}
