//! 일별 자금 흐름 수집.
//!
//! 실행 모드:
//! - 단일 일자 (기본: 오늘 이전 가장 최근 거래일)
//! - 기간 채우기 (샘플 종목의 최초 일자부터 거래일마다 한 배치)
//! - 전체 이력 (구간 없이 한 배치, 임계치마다 중간 저장)

use chrono::{Local, NaiveDate};
use futures::stream::{self, StreamExt};
use std::sync::Arc;
use tracing::{info, warn};

use crate::error::CollectorError;
use crate::orchestrator::{self, BatchOptions, TaskOutput};
use crate::sink::RecordSink;
use crate::{CollectionStats, Result};
use ashare_core::{FundFlowRecord, StockBasicProfile, StockIdentifier, TradingCalendar};
use ashare_data::{map_fund_flow, map_profile, DataError, DateWindow, HttpClient, MarketDataSource};

/// 기간 수집 결과.
#[derive(Debug, Clone, Default)]
pub struct RangeSummary {
    /// 실행한 일자 배치 수
    pub batches: usize,
    pub stats: CollectionStats,
}

/// 자금 흐름 수집 실행기.
#[derive(Clone)]
pub struct FundFlowRun {
    pub source: Arc<dyn MarketDataSource>,
    pub sink: Arc<dyn RecordSink<FundFlowRecord>>,
    pub profile_sink: Arc<dyn RecordSink<StockBasicProfile>>,
    pub calendar: Arc<dyn TradingCalendar>,
    pub options: BatchOptions,
    /// 종목 기본 정보도 함께 수집
    pub with_profile: bool,
    /// 단일 일자 배치 후 프록시 갱신에 사용
    pub http: Option<Arc<HttpClient>>,
}

impl FundFlowRun {
    /// 구간 하나에 대해 전체 종목 배치를 실행하고 남은 레코드를 저장합니다.
    pub async fn run_batch(
        &self,
        identifiers: Vec<StockIdentifier>,
        window: DateWindow,
    ) -> Result<CollectionStats> {
        let source = Arc::clone(&self.source);
        let with_profile = self.with_profile;

        let task = move |id: StockIdentifier| {
            let source = Arc::clone(&source);
            async move { fetch_symbol(source.as_ref(), &id, window, with_profile).await }
        };

        let mut result =
            orchestrator::run_batch(identifiers, &self.options, task, self.sink.as_ref()).await?;

        if !result.records.is_empty() {
            result.stats.written += self.sink.write(&result.records).await?;
        }

        let profiles: Vec<StockBasicProfile> = result
            .profiles
            .into_values()
            .filter(|p| !p.is_empty())
            .collect();
        if !profiles.is_empty() {
            let written = self.profile_sink.write(&profiles).await?;
            info!(profiles = profiles.len(), fields = written, "기본 정보 저장 완료");
        }

        for failure in &result.failures {
            warn!(
                code = %failure.identifier,
                attempts = failure.attempts,
                error = %failure.error,
                "수집 실패 종목"
            );
        }

        Ok(result.stats)
    }

    /// 단일 일자 수집. 휴장일이면 `None`.
    pub async fn run_single_date(
        &self,
        identifiers: Vec<StockIdentifier>,
        date: Option<NaiveDate>,
        today: NaiveDate,
    ) -> Result<Option<CollectionStats>> {
        let target = match date {
            Some(d) => d,
            None => self.calendar.previous_trading_day(today).ok_or_else(|| {
                CollectorError::Config(format!("{today} 이전 거래일을 찾을 수 없습니다"))
            })?,
        };

        if !self.calendar.is_trading_day(target) {
            info!(date = %target, "휴장일, 수집 건너뜀");
            return Ok(None);
        }

        info!(date = %target, symbols = identifiers.len(), "단일 일자 수집 시작");
        let stats = self.run_batch(identifiers, DateWindow::day(target)).await?;

        if let Some(http) = &self.http {
            match http.refresh_proxy().await {
                Ok(true) => info!("배치 후 프록시 갱신 완료"),
                Ok(false) => {}
                Err(e) => warn!(error = %e, "프록시 갱신 실패, 기존 연결 유지"),
            }
        }

        Ok(Some(stats))
    }

    /// `[start, end]` 거래일마다 한 배치씩 수집합니다.
    ///
    /// `start`가 없으면 첫 번째 종목의 최초 데이터 일자를 씁니다. 시작이
    /// `end`보다 늦으면 배치 없이 끝납니다.
    pub async fn run_full_range(
        &self,
        identifiers: Vec<StockIdentifier>,
        start: Option<NaiveDate>,
        end: NaiveDate,
    ) -> Result<RangeSummary> {
        let mut summary = RangeSummary::default();

        let start = match start {
            Some(s) => s,
            None => {
                let Some(sample) = identifiers.first() else {
                    warn!("대상 종목이 없어 기간 수집을 건너뜁니다");
                    return Ok(summary);
                };
                match self.earliest_date(sample).await? {
                    Some(d) => {
                        info!(code = %sample, earliest = %d, "샘플 종목 최초 일자");
                        d
                    }
                    None => {
                        warn!(code = %sample, "샘플 종목 데이터 없음, 기간 수집 건너뜀");
                        return Ok(summary);
                    }
                }
            }
        };

        let days = self.calendar.trading_days(start, end);
        if days.is_empty() {
            info!(start = %start, end = %end, "수집할 거래일 없음");
            return Ok(summary);
        }

        info!(start = %start, end = %end, days = days.len(), "기간 수집 시작");
        for day in days {
            let stats = self.run_batch(identifiers.clone(), DateWindow::day(day)).await?;
            info!(date = %day, records = stats.records, failed = stats.errors, "일자 배치 완료");
            summary.batches += 1;
            summary.stats.merge(&stats);
        }

        Ok(summary)
    }

    /// 구간 제한 없이 한 배치로 전체 이력을 수집합니다.
    pub async fn run_full_history(&self, identifiers: Vec<StockIdentifier>) -> Result<CollectionStats> {
        info!(symbols = identifiers.len(), "전체 이력 수집 시작");
        self.run_batch(identifiers, DateWindow::default()).await
    }

    /// 종목의 가장 이른 자금 흐름 일자.
    pub async fn earliest_date(&self, id: &StockIdentifier) -> Result<Option<NaiveDate>> {
        let rows = self.source.fetch_fund_flow(id).await?;
        Ok(map_fund_flow(&rows, id, DateWindow::default())
            .first()
            .map(|r| r.date))
    }

    /// 여러 종목의 최초 일자. 입력 순서를 유지합니다.
    pub async fn earliest_dates(
        &self,
        identifiers: &[StockIdentifier],
    ) -> Vec<(StockIdentifier, Result<Option<NaiveDate>>)> {
        stream::iter(identifiers.iter().cloned())
            .map(|id| async move {
                let earliest = self.earliest_date(&id).await;
                (id, earliest)
            })
            .buffered(self.options.workers.max(1))
            .collect()
            .await
    }
}

/// 한 종목 조회 → 변환. 기본 정보 실패는 빈 프로필로 대체합니다.
async fn fetch_symbol(
    source: &dyn MarketDataSource,
    id: &StockIdentifier,
    window: DateWindow,
    with_profile: bool,
) -> std::result::Result<TaskOutput<FundFlowRecord>, DataError> {
    let rows = source.fetch_fund_flow(id).await?;
    let mut records = map_fund_flow(&rows, id, window);

    if !with_profile {
        return Ok(TaskOutput::records(records));
    }

    let fetched_at = Local::now().naive_local();
    let profile = match source.fetch_profile(id).await {
        Ok(row) => map_profile(&row, id, fetched_at),
        Err(e) => {
            warn!(code = %id, error = %e, "기본 정보 조회 실패, 빈 값으로 대체");
            StockBasicProfile::new(id.clone(), fetched_at)
        }
    };

    if let Some(name) = profile.display_name() {
        for record in &mut records {
            record.name = Some(name.to_string());
        }
    }

    Ok(TaskOutput {
        records,
        profile: Some(profile),
    })
}
