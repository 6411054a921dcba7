//! 종목별 동시 수집.
//!
//! 종목마다 하나의 tokio 태스크로 "조회 → 변환"을 실행하고, 동시 실행 수는
//! `buffer_unordered`로 제한합니다. 한 종목의 실패는 배치를 중단시키지 않고
//! 모아서 보고합니다. 버퍼가 임계치에 도달하면 저장 대상에 flush합니다.

use futures::stream::{self, StreamExt};
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use crate::config::BulkConfig;
use crate::sink::RecordSink;
use crate::{CollectionStats, Result};
use ashare_core::{StockBasicProfile, StockIdentifier};
use ashare_data::DataError;

/// 배치 실행 옵션.
#[derive(Debug, Clone)]
pub struct BatchOptions {
    pub workers: usize,
    /// 종목당 최대 시도 횟수
    pub attempts: u32,
    /// n번째 실패 후 `backoff * n` 대기
    pub backoff: Duration,
    /// flush 임계치
    pub batch_size: usize,
    pub progress_every: usize,
}

impl Default for BatchOptions {
    fn default() -> Self {
        Self {
            workers: 20,
            attempts: 3,
            backoff: Duration::from_secs(1),
            batch_size: 2000,
            progress_every: 50,
        }
    }
}

impl From<&BulkConfig> for BatchOptions {
    fn from(cfg: &BulkConfig) -> Self {
        Self {
            workers: cfg.workers.max(1),
            attempts: cfg.task_attempts.max(1),
            backoff: cfg.task_backoff(),
            batch_size: cfg.batch_size.max(1),
            progress_every: cfg.progress_every,
        }
    }
}

/// 한 종목 작업의 결과.
#[derive(Debug)]
pub struct TaskOutput<R> {
    pub records: Vec<R>,
    pub profile: Option<StockBasicProfile>,
}

impl<R> TaskOutput<R> {
    pub fn records(records: Vec<R>) -> Self {
        Self {
            records,
            profile: None,
        }
    }
}

/// 최종 실패한 종목.
#[derive(Debug, Clone)]
pub struct SymbolFailure {
    pub identifier: StockIdentifier,
    pub attempts: u32,
    pub error: String,
}

/// 배치 결과.
///
/// `records`에는 임계치 flush 후 남은 레코드만 들어 있습니다.
#[derive(Debug)]
pub struct BatchResult<R> {
    pub records: Vec<R>,
    pub profiles: HashMap<StockIdentifier, StockBasicProfile>,
    pub failures: Vec<SymbolFailure>,
    pub stats: CollectionStats,
}

/// 종목 목록에 대해 `task`를 동시 실행합니다.
///
/// 저장(flush) 오류는 즉시 반환되어 실행을 중단합니다.
pub async fn run_batch<R, F, Fut>(
    identifiers: Vec<StockIdentifier>,
    options: &BatchOptions,
    task: F,
    sink: &dyn RecordSink<R>,
) -> Result<BatchResult<R>>
where
    R: Send + Sync + 'static,
    F: Fn(StockIdentifier) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = std::result::Result<TaskOutput<R>, DataError>> + Send + 'static,
{
    let started = Instant::now();
    let total = identifiers.len();
    let task = Arc::new(task);
    let attempts = options.attempts.max(1);
    let backoff = options.backoff;

    let mut result = BatchResult {
        records: Vec::new(),
        profiles: HashMap::new(),
        failures: Vec::new(),
        stats: CollectionStats::new(),
    };

    let mut outcomes = stream::iter(identifiers)
        .map(|id| {
            let task = Arc::clone(&task);
            let task_id = id.clone();
            let handle = tokio::spawn(async move {
                run_with_retry(task_id, attempts, backoff, task.as_ref()).await
            });
            async move { (id, handle.await) }
        })
        .buffer_unordered(options.workers.max(1));

    while let Some((id, joined)) = outcomes.next().await {
        result.stats.total += 1;

        match joined {
            Ok(Ok(output)) => {
                if output.records.is_empty() {
                    result.stats.empty += 1;
                    debug!(code = %id, "데이터 없음");
                } else {
                    result.stats.success += 1;
                    result.stats.records += output.records.len();
                    result.records.extend(output.records);
                }
                if let Some(profile) = output.profile {
                    result.profiles.insert(id, profile);
                }
            }
            Ok(Err((attempts, e))) => {
                result.stats.errors += 1;
                warn!(code = %id, attempts, error = %e, "종목 수집 실패");
                result.failures.push(SymbolFailure {
                    identifier: id,
                    attempts,
                    error: e.to_string(),
                });
            }
            Err(join_err) => {
                result.stats.errors += 1;
                warn!(code = %id, error = %join_err, "종목 작업 비정상 종료");
                result.failures.push(SymbolFailure {
                    identifier: id,
                    attempts: 0,
                    error: join_err.to_string(),
                });
            }
        }

        if result.records.len() >= options.batch_size {
            let written = sink.write(&result.records).await?;
            result.stats.written += written;
            debug!(written, "중간 저장");
            result.records.clear();
        }

        let done = result.stats.total;
        if options.progress_every > 0 && (done % options.progress_every == 0 || done == total) {
            println!(
                "[{done}/{total}] ok={} empty={} failed={} records={}",
                result.stats.success,
                result.stats.empty,
                result.stats.errors,
                result.stats.records
            );
            info!(done, total, records = result.stats.records, "진행 상황");
        }
    }

    result.stats.elapsed = started.elapsed();
    Ok(result)
}

/// 선형 백오프로 재시도합니다. 실패 시 (시도 횟수, 마지막 에러).
async fn run_with_retry<R, F, Fut>(
    id: StockIdentifier,
    attempts: u32,
    backoff: Duration,
    task: &F,
) -> std::result::Result<TaskOutput<R>, (u32, DataError)>
where
    F: Fn(StockIdentifier) -> Fut,
    Fut: Future<Output = std::result::Result<TaskOutput<R>, DataError>>,
{
    let mut attempt = 1;
    loop {
        match task(id.clone()).await {
            Ok(output) => return Ok(output),
            Err(e) if attempt < attempts => {
                debug!(code = %id, attempt, error = %e, "종목 재시도 예정");
                tokio::time::sleep(backoff * attempt).await;
                attempt += 1;
            }
            Err(e) => return Err((attempt, e)),
        }
    }
}
