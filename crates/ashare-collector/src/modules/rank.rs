//! 실시간 자금 흐름 랭킹.

use chrono::{Local, NaiveDateTime};
use std::fmt::Write;
use std::time::Duration;
use tracing::{error, info};

use crate::sink::RecordSink;
use crate::Result;
use ashare_core::{FundFlowRankRow, RankWindow, StockIdentifier};
use ashare_data::{map_rank, MarketDataSource};

/// 랭킹 조회 옵션.
#[derive(Debug, Clone)]
pub struct RankOptions {
    pub window: RankWindow,
    /// 업스트림에서 받을 행 수
    pub limit: usize,
    /// 출력할 상위 행 수
    pub top: usize,
    /// 지정하면 해당 종목만 남김
    pub targets: Option<Vec<StockIdentifier>>,
}

/// 랭킹 한 번 조회.
pub async fn collect_rank(
    source: &dyn MarketDataSource,
    options: &RankOptions,
    captured_at: NaiveDateTime,
) -> Result<Vec<FundFlowRankRow>> {
    let rows = source.fetch_rank(options.window, options.limit).await?;
    let ranked = map_rank(&rows, options.window, captured_at, options.targets.as_deref());
    info!(window = options.window.label(), rows = ranked.len(), "랭킹 조회 완료");
    Ok(ranked)
}

/// 조회 → 출력 → (저장). 저장한 행 수를 반환합니다.
pub async fn collect_and_persist(
    source: &dyn MarketDataSource,
    sink: Option<&dyn RecordSink<FundFlowRankRow>>,
    options: &RankOptions,
) -> Result<usize> {
    let captured_at = Local::now().naive_local();
    let rows = collect_rank(source, options, captured_at).await?;
    println!("{}", render_rank(&rows, options.top));

    match sink {
        Some(sink) if !rows.is_empty() => Ok(sink.write(&rows).await?),
        _ => Ok(0),
    }
}

/// `interval`마다 반복 조회합니다. Ctrl-C로 종료.
pub async fn poll_rank(
    source: &dyn MarketDataSource,
    sink: Option<&dyn RecordSink<FundFlowRankRow>>,
    options: &RankOptions,
    interval: Duration,
) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("종료 신호 수신, 랭킹 조회 중단");
                break;
            }
            _ = ticker.tick() => {
                if let Err(e) = collect_and_persist(source, sink, options).await {
                    error!("랭킹 조회 실패: {}", e);
                }
            }
        }
    }
}

/// 상위 `top`개 행을 표로 렌더링합니다. 금액 단위는 억 위안.
pub fn render_rank(rows: &[FundFlowRankRow], top: usize) -> String {
    let mut out = String::new();
    let window = rows.first().map(|r| r.window.label()).unwrap_or("-");
    let _ = writeln!(out, "[{window}] 主力净流入排名 total={}", rows.len());
    let _ = writeln!(
        out,
        "{:>4}  {:<10} {:<10} {:>9} {:>8} {:>12} {:>9}",
        "序号", "代码", "名称", "最新价", "涨跌幅", "主力净额(亿)", "净占比"
    );

    for row in rows.iter().take(top) {
        let _ = writeln!(
            out,
            "{:>4}  {:<10} {:<10} {:>9} {:>8} {:>12} {:>9}",
            row.rank,
            row.identifier.ts_code(),
            row.name.as_deref().unwrap_or("-"),
            fmt_opt(row.latest_price, 2),
            fmt_pct(row.pct_change),
            fmt_opt(row.main.net_amount, 4),
            fmt_pct(row.main.net_ratio),
        );
    }
    out
}

fn fmt_opt(value: Option<f64>, decimals: usize) -> String {
    value.map_or_else(|| "-".to_string(), |v| format!("{v:.decimals$}"))
}

fn fmt_pct(value: Option<f64>) -> String {
    value.map_or_else(|| "-".to_string(), |v| format!("{v:.2}%"))
}
