//! 멱등 upsert 저장소.
//!
//! `sqlx::AnyPool` 위에서 SQLite와 MySQL을 모두 지원합니다. 각 호출은 풀에서
//! 자체 연결을 얻어 하나의 트랜잭션으로 실행되므로 동시 flush가 안전합니다.

use chrono::{NaiveDate, NaiveDateTime};
use sqlx::any::AnyPoolOptions;
use sqlx::{Any, AnyPool, QueryBuilder};
use std::collections::BTreeMap;
use std::path::PathBuf;
use tracing::{debug, info, instrument};

use super::schema::{self, Dialect, TableSpec};
use crate::error::{DataError, Result};
use ashare_core::{
    FlowTier, FundFlowRankRow, FundFlowRecord, MinuteFundFlow, PriceBar, StockBasicProfile, TierFlow,
};

/// 한 INSERT 문에 담는 최대 행 수.
const UPSERT_CHUNK: usize = 500;

/// 바인딩 값.
#[derive(Debug, Clone, PartialEq)]
enum SqlValue {
    Text(Option<String>),
    Real(Option<f64>),
    Int(i64),
}

impl From<&str> for SqlValue {
    fn from(s: &str) -> Self {
        SqlValue::Text(Some(s.to_string()))
    }
}

impl From<String> for SqlValue {
    fn from(s: String) -> Self {
        SqlValue::Text(Some(s))
    }
}

impl From<Option<String>> for SqlValue {
    fn from(s: Option<String>) -> Self {
        SqlValue::Text(s)
    }
}

impl From<Option<f64>> for SqlValue {
    fn from(v: Option<f64>) -> Self {
        SqlValue::Real(v)
    }
}

fn date_text(date: NaiveDate) -> SqlValue {
    date.format("%Y-%m-%d").to_string().into()
}

fn datetime_text(ts: NaiveDateTime) -> SqlValue {
    ts.format("%Y-%m-%d %H:%M:%S").to_string().into()
}

fn push_tiers(values: &mut Vec<SqlValue>, tiers: [&TierFlow; 5]) {
    for tier in tiers {
        values.push(tier.net_amount.into());
        values.push(tier.net_ratio.into());
    }
}

/// DSN을 sqlx 연결 URL로 정규화합니다.
///
/// - `mysql+pymysql://...` → `mysql://...`
/// - 스킴 없는 경로 → `sqlite://<path>?mode=rwc`
/// - `sqlite:` URL에 옵션이 없으면 `mode=rwc` 추가 (메모리 DB 제외)
pub fn normalize_dsn(dsn: &str) -> String {
    let dsn = dsn.trim();
    if let Some((scheme, rest)) = dsn.split_once("://") {
        if let Some(driver) = scheme.strip_prefix("mysql+") {
            debug!(driver, "드라이버 접미사 제거");
            return format!("mysql://{rest}");
        }
    }
    if dsn.starts_with("sqlite:") {
        if dsn.contains(":memory:") || dsn.contains('?') {
            return dsn.to_string();
        }
        return format!("{dsn}?mode=rwc");
    }
    if dsn.contains("://") {
        return dsn.to_string();
    }
    format!("sqlite://{dsn}?mode=rwc")
}

/// SQLite 파일 경로 (메모리 DB는 `None`).
fn sqlite_path(url: &str) -> Option<PathBuf> {
    let rest = url.strip_prefix("sqlite:")?;
    let rest = rest.split('?').next().unwrap_or("").trim();
    if rest.is_empty() || rest.contains(":memory:") {
        return None;
    }
    let path = if let Some(abs) = rest.strip_prefix("///") {
        format!("/{abs}")
    } else {
        rest.trim_start_matches("//").to_string()
    };
    Some(PathBuf::from(path))
}

/// 레코드 upsert 저장소.
#[derive(Debug, Clone)]
pub struct StoreWriter {
    pool: AnyPool,
    dialect: Dialect,
}

impl StoreWriter {
    /// DSN으로 연결합니다.
    pub async fn connect(dsn: &str, max_connections: u32) -> Result<Self> {
        sqlx::any::install_default_drivers();

        let url = normalize_dsn(dsn);
        let dialect = Dialect::from_url(&url)?;

        if let Some(parent) = sqlite_path(&url).and_then(|p| p.parent().map(|p| p.to_path_buf())) {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(&parent)?;
            }
        }

        // 메모리 DB는 연결마다 별도 DB가 되므로 단일 연결로 제한
        let max_connections = if url.contains(":memory:") {
            1
        } else {
            max_connections.max(1)
        };

        let pool = AnyPoolOptions::new()
            .max_connections(max_connections)
            .connect(&url)
            .await
            .map_err(|e| DataError::Store(format!("connect failed: {e}")))?;

        info!(dialect = ?dialect, max_connections, "저장소 연결");
        Ok(Self { pool, dialect })
    }

    /// 이미 연결된 풀로 생성합니다.
    pub fn from_pool(pool: AnyPool, dialect: Dialect) -> Self {
        Self { pool, dialect }
    }

    pub fn pool(&self) -> &AnyPool {
        &self.pool
    }

    pub fn dialect(&self) -> Dialect {
        self.dialect
    }

    /// 전체 테이블을 생성합니다. 반복 호출해도 안전합니다.
    #[instrument(skip(self))]
    pub async fn ensure_schema(&self) -> Result<()> {
        for table in schema::all_tables() {
            sqlx::query(&table.create_sql(self.dialect))
                .execute(&self.pool)
                .await?;
            for index in table.index_sql(self.dialect) {
                sqlx::query(&index).execute(&self.pool).await?;
            }
        }
        debug!("스키마 확인 완료");
        Ok(())
    }

    /// 일별 자금 흐름을 upsert합니다.
    #[instrument(skip(self, records), fields(count = records.len()))]
    pub async fn upsert_fund_flows(&self, records: &[FundFlowRecord]) -> Result<usize> {
        let rows: Vec<Vec<SqlValue>> = records
            .iter()
            .map(|r| {
                let mut values = vec![
                    r.code().into(),
                    r.exchange().as_str().into(),
                    date_text(r.date),
                    r.close.into(),
                    r.pct_change.into(),
                ];
                push_tiers(&mut values, FlowTier::ALL.map(|t| r.tier(t)));
                values.push(r.name.clone().into());
                values
            })
            .collect();

        let written = self
            .write_tables(vec![(schema::fund_flow_table(), rows)])
            .await?;
        info!(written, "자금 흐름 저장");
        Ok(written)
    }

    /// 기본 정보를 필드 단위로 upsert합니다. 반환값은 저장한 필드 수.
    #[instrument(skip(self, profiles), fields(count = profiles.len()))]
    pub async fn upsert_profiles(&self, profiles: &[StockBasicProfile]) -> Result<usize> {
        let rows: Vec<Vec<SqlValue>> = profiles
            .iter()
            .flat_map(|p| {
                p.fields.iter().map(move |(field, value)| {
                    vec![
                        p.identifier.code().into(),
                        p.identifier.exchange().as_str().into(),
                        field.as_str().into(),
                        value.as_str().into(),
                        datetime_text(p.fetched_at),
                    ]
                })
            })
            .collect();

        let written = self
            .write_tables(vec![(schema::profile_table(), rows)])
            .await?;
        info!(written, "기본 정보 저장");
        Ok(written)
    }

    /// 가격 봉을 upsert합니다.
    ///
    /// 일/주/월봉은 `stock_daily_em`, 분봉은 간격별 `stock_minute_{n}m`의 가격
    /// 컬럼에 씁니다.
    #[instrument(skip(self, bars), fields(count = bars.len()))]
    pub async fn upsert_bars(&self, bars: &[PriceBar]) -> Result<usize> {
        let mut grouped: BTreeMap<Option<u32>, Vec<Vec<SqlValue>>> = BTreeMap::new();
        for bar in bars {
            let minutes = bar.period.minutes();
            let values = match minutes {
                Some(_) => vec![
                    bar.ts_code().into(),
                    datetime_text(bar.timestamp),
                    bar.open.into(),
                    bar.close.into(),
                    bar.high.into(),
                    bar.low.into(),
                    bar.volume.into(),
                    bar.amount.into(),
                ],
                None => vec![
                    bar.ts_code().into(),
                    bar.identifier.code().into(),
                    bar.name.clone().into(),
                    date_text(bar.date()),
                    bar.open.into(),
                    bar.close.into(),
                    bar.high.into(),
                    bar.low.into(),
                    bar.volume.into(),
                    bar.amount.into(),
                    bar.amplitude.into(),
                    bar.pct_change.into(),
                    bar.change.into(),
                    bar.turnover.into(),
                    bar.period.as_str().into(),
                    bar.adjust.label().into(),
                ],
            };
            grouped.entry(minutes).or_default().push(values);
        }

        let tables = grouped
            .into_iter()
            .map(|(minutes, rows)| {
                let table = match minutes {
                    Some(m) => schema::minute_price_table(m),
                    None => schema::daily_bar_table(),
                };
                (table, rows)
            })
            .collect();

        let written = self.write_tables(tables).await?;
        info!(written, "가격 봉 저장");
        Ok(written)
    }

    /// 분봉 자금 흐름을 upsert합니다. 같은 행의 가격 컬럼은 유지됩니다.
    #[instrument(skip(self, flows), fields(count = flows.len()))]
    pub async fn upsert_minute_flows(&self, flows: &[MinuteFundFlow]) -> Result<usize> {
        let mut grouped: BTreeMap<u32, Vec<Vec<SqlValue>>> = BTreeMap::new();
        for flow in flows {
            let Some(minutes) = flow.period.minutes() else {
                return Err(DataError::Config(format!(
                    "minute flow needs an intraday period: {}",
                    flow.period
                )));
            };
            let mut values = vec![flow.ts_code().into(), datetime_text(flow.trade_time)];
            values.extend(FlowTier::ALL.map(|t| SqlValue::from(flow.amount(t))));
            grouped.entry(minutes).or_default().push(values);
        }

        let tables = grouped
            .into_iter()
            .map(|(minutes, rows)| (schema::minute_flow_table(minutes), rows))
            .collect();

        let written = self.write_tables(tables).await?;
        info!(written, "분봉 자금 흐름 저장");
        Ok(written)
    }

    /// 랭킹 스냅샷을 upsert합니다.
    #[instrument(skip(self, rows), fields(count = rows.len()))]
    pub async fn upsert_rank(&self, rows: &[FundFlowRankRow]) -> Result<usize> {
        let values: Vec<Vec<SqlValue>> = rows
            .iter()
            .map(|r| {
                let mut values = vec![
                    datetime_text(r.captured_at),
                    r.window.label().into(),
                    SqlValue::Int(i64::from(r.rank)),
                    r.identifier.code().into(),
                    r.name.clone().into(),
                    r.latest_price.into(),
                    r.pct_change.into(),
                ];
                push_tiers(
                    &mut values,
                    [&r.main, &r.ultra_large, &r.large, &r.medium, &r.small],
                );
                values
            })
            .collect();

        let written = self.write_tables(vec![(schema::rank_table(), values)]).await?;
        info!(written, "랭킹 저장");
        Ok(written)
    }

    /// 하나의 트랜잭션에서 여러 테이블에 청크 단위로 씁니다.
    async fn write_tables(&self, tables: Vec<(TableSpec, Vec<Vec<SqlValue>>)>) -> Result<usize> {
        let total: usize = tables.iter().map(|(_, rows)| rows.len()).sum();
        if total == 0 {
            return Ok(0);
        }

        let mut tx = self.pool.begin().await?;
        for (table, rows) in &tables {
            let prefix = format!(
                "INSERT INTO {} ({}) ",
                schema::quote(&table.name),
                table.column_list()
            );
            let clause = table.upsert_clause(self.dialect);

            for chunk in rows.chunks(UPSERT_CHUNK) {
                let mut builder: QueryBuilder<Any> = QueryBuilder::new(prefix.as_str());
                builder.push_values(chunk, |mut b, row| {
                    for value in row {
                        match value.clone() {
                            SqlValue::Text(v) => b.push_bind(v),
                            SqlValue::Real(v) => b.push_bind(v),
                            SqlValue::Int(v) => b.push_bind(v),
                        };
                    }
                });
                builder.push(clause.as_str());
                builder.build().execute(&mut *tx).await?;
            }
            debug!(table = %table.name, rows = rows.len(), "테이블 쓰기");
        }
        tx.commit().await?;

        Ok(total)
    }
}
