//! 일/주/월봉 및 분봉 수집, 분봉 구간별 자금 흐름.

use chrono::{Duration, NaiveDate};
use std::sync::Arc;
use tracing::{info, warn};

use crate::error::CollectorError;
use crate::orchestrator::{self, BatchOptions, TaskOutput};
use crate::sink::RecordSink;
use crate::{CollectionStats, Result};
use ashare_core::{Adjust, BarPeriod, MinuteFundFlow, PriceBar, StockIdentifier, TradingCalendar};
use ashare_data::{map_bars, map_minute_flow, BarRequest, DataError, DateWindow, MarketDataSource};

/// 분봉 기본 조회 기간 (일).
const MINUTE_LOOKBACK_DAYS: i64 = 730;

/// 일/주/월봉 요청. 기간이 없으면 오늘 이전 가장 최근 거래일 하루.
pub fn daily_request(
    period: BarPeriod,
    adjust: Adjust,
    start: Option<NaiveDate>,
    end: Option<NaiveDate>,
    today: NaiveDate,
    calendar: &dyn TradingCalendar,
) -> Result<BarRequest> {
    if period.is_intraday() {
        return Err(CollectorError::Config(format!(
            "daily-bars는 daily/weekly/monthly만 지원합니다: {period}"
        )));
    }

    let (start, end) = match (start, end) {
        (None, None) => {
            let day = calendar.previous_trading_day(today).ok_or_else(|| {
                CollectorError::Config(format!("{today} 이전 거래일을 찾을 수 없습니다"))
            })?;
            (Some(day), Some(day))
        }
        other => other,
    };

    Ok(BarRequest::new(period, adjust).between(start, end))
}

/// 분봉 요청. 시작일이 없으면 최근 2년.
pub fn minute_request(
    period: BarPeriod,
    start: Option<NaiveDate>,
    end: Option<NaiveDate>,
    today: NaiveDate,
) -> Result<BarRequest> {
    if !period.is_intraday() {
        return Err(CollectorError::Config(format!(
            "minute-bars는 1/5/15/30/60분만 지원합니다: {period}"
        )));
    }

    let end = end.unwrap_or(today);
    let start = start.unwrap_or(end - Duration::days(MINUTE_LOOKBACK_DAYS));
    Ok(BarRequest::new(period, Adjust::None).between(Some(start), Some(end)))
}

/// 가격 봉 수집 실행기.
#[derive(Clone)]
pub struct PriceBarRun {
    pub source: Arc<dyn MarketDataSource>,
    pub sink: Arc<dyn RecordSink<PriceBar>>,
    pub options: BatchOptions,
}

impl PriceBarRun {
    pub async fn collect(
        &self,
        identifiers: Vec<StockIdentifier>,
        request: BarRequest,
    ) -> Result<CollectionStats> {
        info!(
            period = %request.period,
            adjust = request.adjust.label(),
            start = ?request.start,
            end = ?request.end,
            symbols = identifiers.len(),
            "가격 봉 수집 시작"
        );

        let source = Arc::clone(&self.source);
        let window = DateWindow::new(request.start, request.end);
        let task = move |id: StockIdentifier| {
            let source = Arc::clone(&source);
            async move {
                let rows = source.fetch_bars(&id, &request).await?;
                let bars = map_bars(&rows, &id, request.period, request.adjust, window);
                Ok::<_, DataError>(TaskOutput::records(bars))
            }
        };

        let mut result =
            orchestrator::run_batch(identifiers, &self.options, task, self.sink.as_ref()).await?;

        if !result.records.is_empty() {
            result.stats.written += self.sink.write(&result.records).await?;
        }
        for failure in &result.failures {
            warn!(code = %failure.identifier, error = %failure.error, "가격 봉 수집 실패");
        }

        Ok(result.stats)
    }
}

/// 분봉 자금 흐름 수집 실행기.
///
/// 당일 1분 자금 흐름을 받아 요청 간격으로 합산한 뒤 분봉 테이블의 자금
/// 흐름 컬럼만 갱신합니다.
#[derive(Clone)]
pub struct MinuteFlowRun {
    pub source: Arc<dyn MarketDataSource>,
    pub sink: Arc<dyn RecordSink<MinuteFundFlow>>,
    pub options: BatchOptions,
}

impl MinuteFlowRun {
    pub async fn collect(
        &self,
        identifiers: Vec<StockIdentifier>,
        request: BarRequest,
    ) -> Result<CollectionStats> {
        if !request.period.is_intraday() {
            return Err(CollectorError::Config(format!(
                "자금 흐름 합산은 분봉 주기만 지원합니다: {}",
                request.period
            )));
        }
        info!(period = %request.period, symbols = identifiers.len(), "분봉 자금 흐름 수집 시작");

        let source = Arc::clone(&self.source);
        let window = DateWindow::new(request.start, request.end);
        let task = move |id: StockIdentifier| {
            let source = Arc::clone(&source);
            async move {
                let rows = source.fetch_minute_flow(&id).await?;
                let flows = map_minute_flow(&rows, &id, request.period, window);
                Ok::<_, DataError>(TaskOutput::records(flows))
            }
        };

        let mut result =
            orchestrator::run_batch(identifiers, &self.options, task, self.sink.as_ref()).await?;

        if !result.records.is_empty() {
            result.stats.written += self.sink.write(&result.records).await?;
        }
        for failure in &result.failures {
            warn!(code = %failure.identifier, error = %failure.error, "분봉 자금 흐름 수집 실패");
        }

        Ok(result.stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ashare_core::WeekdayCalendar;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn test_daily_request_defaults_to_previous_trading_day() {
        // 2024-03-04 월요일
        let req = daily_request(
            BarPeriod::Daily,
            Adjust::Qfq,
            None,
            None,
            d(2024, 3, 4),
            &WeekdayCalendar,
        )
        .unwrap();
        assert_eq!(req.start, Some(d(2024, 3, 1)));
        assert_eq!(req.end, Some(d(2024, 3, 1)));
        assert_eq!(req.adjust, Adjust::Qfq);
    }

    #[test]
    fn test_period_kind_is_checked() {
        let today = d(2024, 3, 4);
        assert!(daily_request(BarPeriod::Min5, Adjust::None, None, None, today, &WeekdayCalendar).is_err());
        assert!(minute_request(BarPeriod::Weekly, None, None, today).is_err());
    }

    #[test]
    fn test_minute_request_two_year_window() {
        let req = minute_request(BarPeriod::Min15, None, None, d(2024, 3, 4)).unwrap();
        assert_eq!(req.end, Some(d(2024, 3, 4)));
        assert_eq!(req.start, Some(d(2022, 3, 5)));
    }
}
