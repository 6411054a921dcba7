//! 가짜 공급자 기반 수집 실행 테스트.

use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use ashare_collector::modules::{load_universe, FundFlowRun, MinuteFlowRun, UniverseFilter};
use ashare_collector::{BatchOptions, DryRunSink, RecordSink, StoreSink};
use ashare_core::{
    normalize, Adjust, BarPeriod, FlowTier, FundFlowRecord, MinuteFundFlow, RankWindow,
    StockBasicProfile, StockIdentifier, WeekdayCalendar,
};
use ashare_data::labels::{self, tier_labels};
use ashare_data::{
    BarRequest, CodeCache, DataError, Dialect, MarketDataSource, RawRow, StoreWriter,
};
use async_trait::async_trait;
use chrono::NaiveDate;
use sqlx::any::AnyPoolOptions;
use sqlx::Row;

fn d(y: i32, m: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, day).unwrap()
}

/// 고정 일자 목록을 돌려주는 공급자. `failing` 종목은 항상 네트워크 오류.
#[derive(Default)]
struct FakeSource {
    dates: Vec<NaiveDate>,
    failing: HashSet<String>,
    profile_fails: bool,
    flow_calls: AtomicUsize,
}

impl FakeSource {
    fn new(dates: Vec<NaiveDate>) -> Self {
        Self {
            dates,
            ..Default::default()
        }
    }

    fn failing(mut self, code: &str) -> Self {
        self.failing.insert(code.to_string());
        self
    }
}

#[async_trait]
impl MarketDataSource for FakeSource {
    async fn fetch_fund_flow(&self, id: &StockIdentifier) -> Result<Vec<RawRow>, DataError> {
        self.flow_calls.fetch_add(1, Ordering::SeqCst);
        if self.failing.contains(id.code()) {
            return Err(DataError::Network("connection reset by peer".into()));
        }
        let (amount, ratio) = tier_labels(FlowTier::Main);
        Ok(self
            .dates
            .iter()
            .map(|date| {
                let mut row = RawRow::new();
                row.insert(labels::DATE, date.format("%Y-%m-%d").to_string());
                row.insert(amount, "123456789".to_string());
                row.insert(ratio, "12.345".to_string());
                row.insert(labels::CLOSE, "10.5".to_string());
                row.insert(labels::PCT_CHANGE, "".to_string());
                row
            })
            .collect())
    }

    async fn fetch_minute_flow(&self, id: &StockIdentifier) -> Result<Vec<RawRow>, DataError> {
        if self.failing.contains(id.code()) {
            return Err(DataError::Network("connection reset by peer".into()));
        }
        let (main, _) = tier_labels(FlowTier::Main);
        let (small, _) = tier_labels(FlowTier::Small);
        Ok(["09:31", "09:32", "09:46"]
            .iter()
            .map(|time| {
                let mut row = RawRow::new();
                row.insert(labels::TIME, format!("2024-03-01 {time}"));
                row.insert(main, "1000".to_string());
                row.insert(small, "-250".to_string());
                row
            })
            .collect())
    }

    async fn fetch_bars(&self, _id: &StockIdentifier, _request: &BarRequest) -> Result<Vec<RawRow>, DataError> {
        Ok(Vec::new())
    }

    async fn fetch_profile(&self, id: &StockIdentifier) -> Result<RawRow, DataError> {
        if self.profile_fails {
            return Err(DataError::HttpStatus {
                status: 500,
                body: "upstream".into(),
            });
        }
        let mut row = RawRow::new();
        row.insert("股票简称", format!("测试{}", id.code()));
        row.insert("行业", "白酒".to_string());
        Ok(row)
    }

    async fn fetch_rank(&self, _window: RankWindow, _limit: usize) -> Result<Vec<RawRow>, DataError> {
        Ok(Vec::new())
    }

    async fn fetch_code_universe(&self) -> Result<Vec<String>, DataError> {
        Ok(vec!["600519".into(), "000001".into(), "bj830799".into()])
    }
}

/// 받은 레코드를 보관하는 저장 대상.
struct CollectingSink<R> {
    rows: Mutex<Vec<R>>,
}

impl<R> Default for CollectingSink<R> {
    fn default() -> Self {
        Self {
            rows: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl<R: Clone + Send + Sync + 'static> RecordSink<R> for CollectingSink<R> {
    async fn write(&self, records: &[R]) -> Result<usize, DataError> {
        self.rows.lock().unwrap().extend_from_slice(records);
        Ok(records.len())
    }
}

fn ids(codes: &[&str]) -> Vec<StockIdentifier> {
    codes.iter().map(|c| normalize(c).unwrap()).collect()
}

fn options() -> BatchOptions {
    BatchOptions {
        workers: 3,
        attempts: 2,
        backoff: Duration::from_millis(1),
        batch_size: 2000,
        progress_every: 0,
    }
}

fn run_with(
    source: Arc<FakeSource>,
    sink: Arc<dyn RecordSink<FundFlowRecord>>,
    profile_sink: Arc<dyn RecordSink<StockBasicProfile>>,
    with_profile: bool,
) -> FundFlowRun {
    FundFlowRun {
        source,
        sink,
        profile_sink,
        calendar: Arc::new(WeekdayCalendar),
        options: options(),
        with_profile,
        http: None,
    }
}

#[tokio::test]
async fn failing_symbol_is_reported_separately() {
    let source = Arc::new(FakeSource::new(vec![d(2024, 3, 1)]).failing("000001"));
    let sink = Arc::new(CollectingSink::<FundFlowRecord>::default());
    let run = run_with(
        Arc::clone(&source),
        sink.clone(),
        Arc::new(DryRunSink::new()),
        false,
    );

    let stats = run
        .run_single_date(ids(&["600519", "000001", "300750", "688981"]), Some(d(2024, 3, 1)), d(2024, 3, 4))
        .await
        .unwrap()
        .unwrap();

    assert_eq!(stats.total, 4);
    assert_eq!(stats.success, 3);
    assert_eq!(stats.errors, 1);
    assert_eq!(stats.written, 3);

    let rows = sink.rows.lock().unwrap();
    assert_eq!(rows.len(), 3);
    assert!(rows.iter().all(|r| r.code() != "000001"));
    let main = rows[0].tier(FlowTier::Main);
    assert_eq!(main.net_amount, Some(1.2346));
    assert_eq!(main.net_ratio, Some(12.35));
    assert_eq!(rows[0].pct_change, None);

    // 성공 3회 + 실패 종목 2회 시도
    assert_eq!(source.flow_calls.load(Ordering::SeqCst), 5);
}

#[tokio::test]
async fn single_date_defaults_to_previous_trading_day() {
    let source = Arc::new(FakeSource::new(vec![d(2024, 2, 29), d(2024, 3, 1), d(2024, 3, 4)]));
    let sink = Arc::new(CollectingSink::<FundFlowRecord>::default());
    let run = run_with(source, sink.clone(), Arc::new(DryRunSink::new()), false);

    // 월요일 실행 → 직전 금요일만
    run.run_single_date(ids(&["600519"]), None, d(2024, 3, 4))
        .await
        .unwrap()
        .unwrap();

    let rows = sink.rows.lock().unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].date, d(2024, 3, 1));
}

#[tokio::test]
async fn weekend_date_is_skipped() {
    let source = Arc::new(FakeSource::new(vec![d(2024, 3, 2)]));
    let run = run_with(
        Arc::clone(&source),
        Arc::new(DryRunSink::new()),
        Arc::new(DryRunSink::new()),
        false,
    );

    let stats = run
        .run_single_date(ids(&["600519"]), Some(d(2024, 3, 2)), d(2024, 3, 4))
        .await
        .unwrap();
    assert!(stats.is_none());
    assert_eq!(source.flow_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn full_range_with_end_before_earliest_runs_no_batches() {
    let source = Arc::new(FakeSource::new(vec![d(2024, 3, 1), d(2024, 3, 4)]));
    let run = run_with(
        Arc::clone(&source),
        Arc::new(DryRunSink::new()),
        Arc::new(DryRunSink::new()),
        false,
    );

    let summary = run
        .run_full_range(ids(&["600519", "000001"]), None, d(2024, 2, 1))
        .await
        .unwrap();

    assert_eq!(summary.batches, 0);
    assert_eq!(summary.stats.total, 0);
    // 샘플 종목의 최초 일자 조회만 수행
    assert_eq!(source.flow_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn full_range_runs_one_batch_per_trading_day() {
    let source = Arc::new(FakeSource::new(vec![d(2024, 3, 1), d(2024, 3, 4), d(2024, 3, 5)]));
    let sink = Arc::new(CollectingSink::<FundFlowRecord>::default());
    let run = run_with(source, sink.clone(), Arc::new(DryRunSink::new()), false);

    // 금 ~ 화: 주말 제외 3일
    let summary = run
        .run_full_range(ids(&["600519", "000001"]), None, d(2024, 3, 5))
        .await
        .unwrap();

    assert_eq!(summary.batches, 3);
    assert_eq!(summary.stats.records, 6);
    assert_eq!(sink.rows.lock().unwrap().len(), 6);
}

#[tokio::test]
async fn profile_name_fills_records() {
    let source = Arc::new(FakeSource::new(vec![d(2024, 3, 1)]));
    let sink = Arc::new(CollectingSink::<FundFlowRecord>::default());
    let profiles = Arc::new(CollectingSink::<StockBasicProfile>::default());
    let run = run_with(source, sink.clone(), profiles.clone(), true);

    run.run_full_history(ids(&["600519", "000001"])).await.unwrap();

    let rows = sink.rows.lock().unwrap();
    assert_eq!(rows.len(), 2);
    for row in rows.iter() {
        assert_eq!(row.name.as_deref(), Some(format!("测试{}", row.code()).as_str()));
    }

    let profiles = profiles.rows.lock().unwrap();
    assert_eq!(profiles.len(), 2);
    assert!(profiles.iter().all(|p| p.get("industry") == Some("白酒")));
}

#[tokio::test]
async fn profile_failure_degrades_to_empty_profile() {
    let mut fake = FakeSource::new(vec![d(2024, 3, 1)]);
    fake.profile_fails = true;
    let sink = Arc::new(CollectingSink::<FundFlowRecord>::default());
    let profiles = Arc::new(CollectingSink::<StockBasicProfile>::default());
    let run = run_with(Arc::new(fake), sink.clone(), profiles.clone(), true);

    let stats = run.run_full_history(ids(&["600519"])).await.unwrap();

    assert_eq!(stats.errors, 0);
    assert_eq!(sink.rows.lock().unwrap()[0].name, None);
    // 빈 프로필은 저장하지 않음
    assert!(profiles.rows.lock().unwrap().is_empty());
}

#[tokio::test]
async fn records_land_in_store() {
    sqlx::any::install_default_drivers();
    let pool = AnyPoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .unwrap();
    let store = StoreWriter::from_pool(pool, Dialect::Sqlite);
    store.ensure_schema().await.unwrap();

    let source = Arc::new(FakeSource::new(vec![d(2024, 3, 1), d(2024, 3, 4)]));
    let sink = Arc::new(StoreSink::new(store.clone()));
    let run = run_with(source, sink.clone(), sink, true);

    // 같은 구간을 두 번 수집해도 키당 한 행
    for _ in 0..2 {
        run.run_full_history(ids(&["600519", "sz000001"])).await.unwrap();
    }

    let n: i64 = sqlx::query("SELECT COUNT(*) AS n FROM `fund_flow_daily`")
        .fetch_one(store.pool())
        .await
        .unwrap()
        .try_get("n")
        .unwrap();
    assert_eq!(n, 4);

    let names: i64 = sqlx::query("SELECT COUNT(*) AS n FROM `fund_flow_daily` WHERE `名称` LIKE '测试%'")
        .fetch_one(store.pool())
        .await
        .unwrap()
        .try_get("n")
        .unwrap();
    assert_eq!(names, 4);
}

#[tokio::test]
async fn explicit_codes_skip_invalid_and_cache_is_written() {
    let source = FakeSource::new(Vec::new());
    let path = std::env::temp_dir().join(format!("ashare-universe-{}.json", std::process::id()));
    let _ = std::fs::remove_file(&path);
    let cache = CodeCache::new(&path);

    let filter = UniverseFilter::default().with_codes_arg(Some("600519, abc123,sz000001,600519.SH"));
    let explicit = load_universe(&source, &cache, &filter).await.unwrap();
    assert_eq!(explicit, ids(&["600519", "000001"]));
    assert!(cache.load().is_none());

    let filter = UniverseFilter {
        limit: Some(1),
        skip: 1,
        ..Default::default()
    };
    let live = load_universe(&source, &cache, &filter).await.unwrap();
    assert_eq!(live, ids(&["000001"]));
    assert_eq!(cache.load().unwrap().len(), 3);

    let _ = std::fs::remove_file(&path);
}

#[tokio::test]
async fn minute_flow_run_sums_into_bar_intervals() {
    let source = Arc::new(FakeSource::new(Vec::new()).failing("000001"));
    let sink = Arc::new(CollectingSink::<MinuteFundFlow>::default());
    let run = MinuteFlowRun {
        source,
        sink: sink.clone(),
        options: options(),
    };

    let request = BarRequest::new(BarPeriod::Min15, Adjust::None).between(Some(d(2024, 3, 1)), Some(d(2024, 3, 1)));
    let stats = run.collect(ids(&["600519", "000001"]), request).await.unwrap();

    assert_eq!(stats.success, 1);
    assert_eq!(stats.errors, 1);
    assert_eq!(stats.written, 2);

    let mut rows = sink.rows.lock().unwrap().clone();
    rows.sort_by_key(|f| f.trade_time);
    assert_eq!(rows[0].trade_time, d(2024, 3, 1).and_hms_opt(9, 45, 0).unwrap());
    assert_eq!(rows[0].main, Some(2000.0));
    assert_eq!(rows[0].small, Some(-500.0));
    assert_eq!(rows[1].trade_time, d(2024, 3, 1).and_hms_opt(10, 0, 0).unwrap());
    assert_eq!(rows[1].main, Some(1000.0));
    assert_eq!(rows[1].ultra_large, None);
}

#[tokio::test]
async fn minute_flow_run_rejects_daily_period() {
    let run = MinuteFlowRun {
        source: Arc::new(FakeSource::new(Vec::new())),
        sink: Arc::new(DryRunSink::new()),
        options: options(),
    };
    let request = BarRequest::new(BarPeriod::Daily, Adjust::Qfq);
    assert!(run.collect(ids(&["600519"]), request).await.is_err());
}
