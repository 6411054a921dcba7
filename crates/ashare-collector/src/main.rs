//! A주 자금 흐름 수집 CLI.

use std::sync::Arc;
use std::time::Duration;

use ashare_collector::modules::{
    self, FundFlowRun, MinuteFlowRun, PriceBarRun, RankOptions, UniverseFilter,
};
use ashare_collector::{
    BatchOptions, CollectionStats, CollectorConfig, CollectorError, DryRunSink, RecordSink, StoreSink,
};
use ashare_core::{
    init_logging, Adjust, BarPeriod, FundFlowRankRow, LogConfig, RankWindow, TradingCalendar,
    WeekdayCalendar,
};
use ashare_data::{CodeCache, EastmoneyClient, HttpClient, MarketDataSource, StoreWriter};
use chrono::{NaiveDate, Utc};
use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "ashare-collector")]
#[command(about = "China A-share fund-flow bulk collector", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// 저장소 DSN (미지정 시 MYSQL_DSN / APP_MYSQL_DSN)
    #[arg(long, alias = "db", global = true)]
    dsn: Option<String>,

    /// 특정 종목만 수집 (쉼표로 구분, 예: "600519,sz000001,830799.BJ")
    #[arg(long, global = true)]
    codes: Option<String>,

    /// 최대 종목 수
    #[arg(long, global = true)]
    limit: Option<usize>,

    /// 앞에서 건너뛸 종목 수
    #[arg(long, default_value_t = 0, global = true)]
    skip: usize,

    /// 동시 작업 수 (BULK_WORKERS 대체)
    #[arg(long, global = true)]
    workers: Option<usize>,

    /// 중간 저장 임계치 (BULK_BATCH_SIZE 대체)
    #[arg(long, global = true)]
    batch_size: Option<usize>,

    /// 저장하지 않고 수집만 수행
    #[arg(long, global = true)]
    dry_run: bool,

    /// 로그 레벨 (trace, debug, info, warn, error)
    #[arg(long, default_value = "info", global = true)]
    log_level: String,
}

#[derive(Subcommand)]
enum Commands {
    /// 일별 자금 흐름 수집 (기본: 오늘 이전 가장 최근 거래일)
    FundFlow {
        /// 수집 일자 (YYYY-MM-DD 또는 YYYYMMDD)
        #[arg(long, value_parser = parse_date, conflicts_with_all = ["start", "end", "fill_to", "full_history"])]
        date: Option<NaiveDate>,

        /// 기간 시작일 (미지정 시 첫 종목의 최초 일자)
        #[arg(long, value_parser = parse_date)]
        start: Option<NaiveDate>,

        /// 기간 종료일
        #[arg(long, value_parser = parse_date)]
        end: Option<NaiveDate>,

        /// 최초 일자부터 이 날짜까지 거래일마다 수집
        #[arg(long, value_parser = parse_date, conflicts_with = "end")]
        fill_to: Option<NaiveDate>,

        /// 구간 제한 없이 전체 이력 수집
        #[arg(long, conflicts_with_all = ["start", "end", "fill_to"])]
        full_history: bool,

        /// 매일 정해진 시각에 단일 일자 수집 반복
        #[arg(long, conflicts_with_all = ["date", "start", "end", "fill_to", "full_history"])]
        schedule: bool,

        /// 종목 기본 정보도 함께 수집
        #[arg(long)]
        with_profile: bool,
    },

    /// 일/주/월봉 수집
    DailyBars {
        /// daily, weekly, monthly
        #[arg(long, default_value = "daily")]
        period: BarPeriod,

        /// none, qfq, hfq
        #[arg(long, default_value = "qfq")]
        adjust: Adjust,

        #[arg(long, value_parser = parse_date)]
        start: Option<NaiveDate>,

        #[arg(long, value_parser = parse_date)]
        end: Option<NaiveDate>,
    },

    /// 분봉 수집 (기본: 최근 2년)
    MinuteBars {
        /// 1, 5, 15, 30, 60
        #[arg(long, default_value = "5")]
        period: BarPeriod,

        #[arg(long, value_parser = parse_date)]
        start: Option<NaiveDate>,

        #[arg(long, value_parser = parse_date)]
        end: Option<NaiveDate>,

        /// 당일 1분 자금 흐름을 같은 간격으로 합산해 함께 저장
        #[arg(long)]
        with_flow: bool,
    },

    /// 실시간 자금 흐름 랭킹
    Rank {
        /// today, 3d, 5d, 10d
        #[arg(long, default_value = "today")]
        window: RankWindow,

        /// 출력할 상위 행 수
        #[arg(long, default_value_t = 20)]
        top: usize,

        /// 업스트림에서 받을 행 수
        #[arg(long, default_value_t = 6000)]
        fetch_limit: usize,

        /// 한 번만 조회 (기본 동작)
        #[arg(long, conflicts_with = "interval")]
        once: bool,

        /// 반복 조회 주기 (초)
        #[arg(long)]
        interval: Option<u64>,

        /// fund_flow_rank 테이블에 저장
        #[arg(long)]
        persist: bool,
    },

    /// 종목별 최초 자금 흐름 일자 출력
    Earliest,

    /// 전체 종목 코드 목록 갱신
    Codes,
}

impl Commands {
    /// 저장소가 필요한 명령인지
    fn writes_store(&self) -> bool {
        match self {
            Commands::FundFlow { .. } | Commands::DailyBars { .. } | Commands::MinuteBars { .. } => {
                true
            }
            Commands::Rank { persist, .. } => *persist,
            Commands::Earliest | Commands::Codes => false,
        }
    }
}

fn parse_date(raw: &str) -> Result<NaiveDate, String> {
    let raw = raw.trim();
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .or_else(|_| NaiveDate::parse_from_str(raw, "%Y%m%d"))
        .map_err(|_| format!("잘못된 날짜 형식: {raw} (YYYY-MM-DD 또는 YYYYMMDD)"))
}

fn sink_for<R>(store: Option<&StoreWriter>) -> Arc<dyn RecordSink<R>>
where
    R: Send + Sync + 'static,
    StoreSink: RecordSink<R>,
{
    match store {
        Some(writer) => Arc::new(StoreSink::new(writer.clone())),
        None => Arc::new(DryRunSink::new()),
    }
}

fn report(stats: &CollectionStats, operation: &str) {
    stats.log_summary(operation);
    println!("{}", stats.summary_line());
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // 로깅 초기화 (RUST_LOG가 있으면 우선)
    let mut log_config = LogConfig::from_env();
    if std::env::var("RUST_LOG").is_err() {
        let level = &cli.log_level;
        log_config.level = format!("ashare_collector={level},ashare_data={level},ashare_core={level}");
    }
    init_logging(log_config)?;

    tracing::info!("A-Share Collector 시작");

    // 설정 로드 (CLI 플래그 우선)
    let mut config = CollectorConfig::from_env()?;
    if let Some(dsn) = cli.dsn.clone() {
        config.dsn = Some(dsn);
    }
    if let Some(workers) = cli.workers {
        config.bulk.workers = workers;
    }
    if let Some(batch_size) = cli.batch_size {
        config.bulk.batch_size = batch_size;
    }

    // 저장소 연결 (네트워크 작업 전에 DSN 확인)
    let store = if cli.command.writes_store() && !cli.dry_run {
        let dsn = config.require_dsn()?;
        let max_connections = config.bulk.workers.clamp(1, 10) as u32;
        let writer = StoreWriter::connect(dsn, max_connections).await?;
        writer.ensure_schema().await?;
        tracing::info!("저장소 연결 및 스키마 확인 완료");
        Some(writer)
    } else {
        if cli.dry_run {
            tracing::info!("dry-run 모드: 저장하지 않습니다");
        }
        None
    };

    // HTTP 클라이언트 및 프록시
    let http = Arc::new(
        HttpClient::new(config.http_config())?.with_proxy_source(config.proxy.source.clone()),
    );
    if config.proxy.source.is_some() {
        if let Err(e) = http.refresh_proxy().await {
            tracing::warn!(error = %e, "초기 프록시 설정 실패, 직접 연결로 진행");
        }
    }
    let refresher = config
        .proxy
        .refresh_interval()
        .map(|every| Arc::clone(&http).spawn_proxy_refresher(every));

    let source: Arc<dyn MarketDataSource> = Arc::new(EastmoneyClient::new(Arc::clone(&http)));
    let calendar: Arc<dyn TradingCalendar> = Arc::new(WeekdayCalendar);
    let cache = CodeCache::new(config.code_cache_path.clone());
    let filter = UniverseFilter {
        codes: None,
        limit: cli.limit,
        skip: cli.skip,
    }
    .with_codes_arg(cli.codes.as_deref());
    let options = BatchOptions::from(&config.bulk);
    let today = Utc::now().with_timezone(&config.schedule.timezone).date_naive();

    match cli.command {
        Commands::FundFlow {
            date,
            start,
            end,
            fill_to,
            full_history,
            schedule,
            with_profile,
        } => {
            let identifiers = modules::load_universe(source.as_ref(), &cache, &filter).await?;
            let run = FundFlowRun {
                source: Arc::clone(&source),
                sink: sink_for(store.as_ref()),
                profile_sink: sink_for(store.as_ref()),
                calendar: Arc::clone(&calendar),
                options,
                with_profile,
                http: Some(Arc::clone(&http)),
            };

            if schedule {
                modules::run_daily(&config.schedule, calendar.as_ref(), |day| {
                    let run = run.clone();
                    let identifiers = identifiers.clone();
                    async move {
                        if let Some(stats) = run.run_single_date(identifiers, Some(day), day).await? {
                            report(&stats, "정기 자금 흐름 수집");
                        }
                        Ok::<(), CollectorError>(())
                    }
                })
                .await?;
            } else if full_history {
                let stats = run.run_full_history(identifiers).await?;
                report(&stats, "전체 이력 수집");
            } else if fill_to.is_some() || start.is_some() || end.is_some() {
                let end = fill_to.or(end).unwrap_or(today);
                let summary = run.run_full_range(identifiers, start, end).await?;
                tracing::info!(batches = summary.batches, "기간 수집 완료");
                report(&summary.stats, "기간 수집");
            } else {
                match run.run_single_date(identifiers, date, today).await? {
                    Some(stats) => report(&stats, "자금 흐름 수집"),
                    None => println!("Skipped: not a trading day"),
                }
            }
        }
        Commands::DailyBars {
            period,
            adjust,
            start,
            end,
        } => {
            let request =
                modules::daily_request(period, adjust, start, end, today, calendar.as_ref())?;
            let identifiers = modules::load_universe(source.as_ref(), &cache, &filter).await?;
            let run = PriceBarRun {
                source: Arc::clone(&source),
                sink: sink_for(store.as_ref()),
                options,
            };
            let stats = run.collect(identifiers, request).await?;
            report(&stats, "일봉 수집");
        }
        Commands::MinuteBars {
            period,
            start,
            end,
            with_flow,
        } => {
            let request = modules::minute_request(period, start, end, today)?;
            let identifiers = modules::load_universe(source.as_ref(), &cache, &filter).await?;
            let run = PriceBarRun {
                source: Arc::clone(&source),
                sink: sink_for(store.as_ref()),
                options: options.clone(),
            };
            let stats = run.collect(identifiers.clone(), request).await?;
            report(&stats, "분봉 수집");

            if with_flow {
                let flow_run = MinuteFlowRun {
                    source: Arc::clone(&source),
                    sink: sink_for(store.as_ref()),
                    options,
                };
                let stats = flow_run.collect(identifiers, request).await?;
                report(&stats, "분봉 자금 흐름 수집");
            }
        }
        Commands::Rank {
            window,
            top,
            fetch_limit,
            once: _,
            interval,
            persist,
        } => {
            let targets = match filter.codes {
                Some(_) => Some(modules::load_universe(source.as_ref(), &cache, &filter).await?),
                None => None,
            };
            let rank_options = RankOptions {
                window,
                limit: fetch_limit,
                top,
                targets,
            };
            let sink: Option<Arc<dyn RecordSink<FundFlowRankRow>>> =
                persist.then(|| sink_for(store.as_ref()));
            let sink = sink.as_deref();

            match interval {
                Some(secs) => {
                    modules::poll_rank(
                        source.as_ref(),
                        sink,
                        &rank_options,
                        Duration::from_secs(secs.max(1)),
                    )
                    .await
                }
                None => {
                    let written =
                        modules::collect_and_persist(source.as_ref(), sink, &rank_options).await?;
                    if persist {
                        println!("Done. rank rows written={written}");
                    }
                }
            }
        }
        Commands::Earliest => {
            let identifiers = modules::load_universe(source.as_ref(), &cache, &filter).await?;
            let run = FundFlowRun {
                source: Arc::clone(&source),
                sink: Arc::new(DryRunSink::new()),
                profile_sink: Arc::new(DryRunSink::new()),
                calendar: Arc::clone(&calendar),
                options,
                with_profile: false,
                http: None,
            };
            for (id, earliest) in run.earliest_dates(&identifiers).await {
                match earliest {
                    Ok(Some(date)) => println!("{id}\t{date}"),
                    Ok(None) => println!("{id}\t-"),
                    Err(e) => {
                        tracing::warn!(code = %id, error = %e, "최초 일자 조회 실패");
                        println!("{id}\terror");
                    }
                }
            }
        }
        Commands::Codes => {
            let codes = modules::refresh_universe(source.as_ref(), &cache).await?;
            println!("Done. codes={} cache={}", codes.len(), cache.path().display());
        }
    }

    if let Some(handle) = refresher {
        handle.abort();
    }
    if let Some(writer) = store {
        writer.pool().close().await;
    }
    tracing::info!("A-Share Collector 종료");

    Ok(())
}
