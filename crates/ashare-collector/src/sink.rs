//! 레코드 저장 대상.
//!
//! 수집 모듈은 [`RecordSink`]에만 의존합니다. 실제 저장은 [`StoreSink`],
//! `--dry-run`은 개수만 세는 [`DryRunSink`]가 맡습니다.

use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};

use ashare_core::{FundFlowRankRow, FundFlowRecord, MinuteFundFlow, PriceBar, StockBasicProfile};
use ashare_data::{DataError, StoreWriter};

/// 레코드 일괄 저장.
#[async_trait]
pub trait RecordSink<R>: Send + Sync
where
    R: Send + Sync + 'static,
{
    /// 저장한 레코드 수를 반환합니다. 실패하면 실행 전체가 중단됩니다.
    async fn write(&self, records: &[R]) -> Result<usize, DataError>;
}

/// [`StoreWriter`] 기반 저장 대상.
#[derive(Debug, Clone)]
pub struct StoreSink {
    writer: StoreWriter,
}

impl StoreSink {
    pub fn new(writer: StoreWriter) -> Self {
        Self { writer }
    }

    pub fn writer(&self) -> &StoreWriter {
        &self.writer
    }
}

#[async_trait]
impl RecordSink<FundFlowRecord> for StoreSink {
    async fn write(&self, records: &[FundFlowRecord]) -> Result<usize, DataError> {
        self.writer.upsert_fund_flows(records).await
    }
}

#[async_trait]
impl RecordSink<PriceBar> for StoreSink {
    async fn write(&self, records: &[PriceBar]) -> Result<usize, DataError> {
        self.writer.upsert_bars(records).await
    }
}

#[async_trait]
impl RecordSink<MinuteFundFlow> for StoreSink {
    async fn write(&self, records: &[MinuteFundFlow]) -> Result<usize, DataError> {
        self.writer.upsert_minute_flows(records).await
    }
}

#[async_trait]
impl RecordSink<StockBasicProfile> for StoreSink {
    async fn write(&self, records: &[StockBasicProfile]) -> Result<usize, DataError> {
        self.writer.upsert_profiles(records).await
    }
}

#[async_trait]
impl RecordSink<FundFlowRankRow> for StoreSink {
    async fn write(&self, records: &[FundFlowRankRow]) -> Result<usize, DataError> {
        self.writer.upsert_rank(records).await
    }
}

/// 저장하지 않고 개수만 셉니다.
#[derive(Debug, Default)]
pub struct DryRunSink {
    seen: AtomicUsize,
}

impl DryRunSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// 지금까지 받은 레코드 수
    pub fn seen(&self) -> usize {
        self.seen.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl<R: Send + Sync + 'static> RecordSink<R> for DryRunSink {
    async fn write(&self, records: &[R]) -> Result<usize, DataError> {
        self.seen.fetch_add(records.len(), Ordering::Relaxed);
        tracing::debug!(count = records.len(), "dry-run: 저장 생략");
        Ok(records.len())
    }
}
