//! 테이블 정의와 방언별 DDL/upsert 구문.
//!
//! 컬럼명, 순서, 타입은 기존 데이터베이스와 동일하게 유지합니다. 백틱 인용은 MySQL과
//! SQLite 모두에서 동작합니다.

use ashare_core::{BarPeriod, FlowTier};

use crate::error::{DataError, Result};

/// 대상 데이터베이스 방언.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dialect {
    Sqlite,
    MySql,
}

impl Dialect {
    /// DSN 스킴으로 방언을 판별합니다.
    pub fn from_url(url: &str) -> Result<Self> {
        let url = url.trim();
        if url.starts_with("sqlite:") {
            Ok(Dialect::Sqlite)
        } else if url.starts_with("mysql://") || url.starts_with("mariadb://") {
            Ok(Dialect::MySql)
        } else {
            Err(DataError::Config(format!("unsupported database URL: {url}")))
        }
    }

    fn column_type(&self, kind: ColumnKind) -> String {
        match (self, kind) {
            (Dialect::Sqlite, ColumnKind::Real) => "REAL".to_string(),
            (Dialect::Sqlite, ColumnKind::Int) => "INTEGER".to_string(),
            (Dialect::Sqlite, _) => "TEXT".to_string(),
            (Dialect::MySql, ColumnKind::Varchar(len)) => format!("VARCHAR({len})"),
            (Dialect::MySql, ColumnKind::LongText) => "TEXT".to_string(),
            (Dialect::MySql, ColumnKind::Date) => "DATE".to_string(),
            (Dialect::MySql, ColumnKind::DateTime) => "DATETIME".to_string(),
            (Dialect::MySql, ColumnKind::Real) => "DOUBLE".to_string(),
            (Dialect::MySql, ColumnKind::Int) => "INT".to_string(),
        }
    }
}

/// 논리 컬럼 타입.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnKind {
    /// 최대 길이가 있는 문자열
    Varchar(u16),
    LongText,
    Date,
    DateTime,
    Real,
    Int,
}

/// 컬럼 정의.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Column {
    pub name: String,
    pub kind: ColumnKind,
    pub not_null: bool,
}

/// 테이블 정의.
///
/// `columns`는 DDL 순서이며 INSERT 시 값도 이 순서로 바인딩합니다.
/// 키 컬럼은 항상 NOT NULL입니다.
#[derive(Debug, Clone)]
pub struct TableSpec {
    pub name: String,
    pub columns: Vec<Column>,
    pub keys: Vec<String>,
    /// 보조 인덱스 (인덱스명, 컬럼)
    pub indexes: Vec<(String, String)>,
}

impl TableSpec {
    fn new(name: impl Into<String>, columns: &[(&str, ColumnKind)], keys: &[&str]) -> Self {
        let columns = columns
            .iter()
            .map(|(n, kind)| Column {
                name: n.to_string(),
                kind: *kind,
                not_null: keys.contains(n),
            })
            .collect();
        Self {
            name: name.into(),
            columns,
            keys: keys.iter().map(|k| k.to_string()).collect(),
            indexes: Vec::new(),
        }
    }

    /// 키가 아닌 NOT NULL 컬럼을 지정합니다.
    fn require(mut self, names: &[&str]) -> Self {
        for column in &mut self.columns {
            if names.contains(&column.name.as_str()) {
                column.not_null = true;
            }
        }
        self
    }

    fn index(mut self, name: &str, column: &str) -> Self {
        self.indexes.push((name.to_string(), column.to_string()));
        self
    }

    /// 키 컬럼과 `values`에 든 값 컬럼만 남긴 쓰기용 정의.
    ///
    /// 같은 테이블의 일부 컬럼만 갱신할 때 씁니다. 빠진 컬럼은 새 행에서
    /// NULL이고 기존 행에서는 그대로 유지됩니다.
    pub fn project(&self, values: &[&str]) -> Self {
        let columns = self
            .columns
            .iter()
            .filter(|c| self.is_key(&c.name) || values.contains(&c.name.as_str()))
            .cloned()
            .collect();
        Self {
            name: self.name.clone(),
            columns,
            keys: self.keys.clone(),
            indexes: Vec::new(),
        }
    }

    fn is_key(&self, name: &str) -> bool {
        self.keys.iter().any(|k| k == name)
    }

    pub fn key_columns(&self) -> impl Iterator<Item = &str> {
        self.keys.iter().map(String::as_str)
    }

    pub fn value_columns(&self) -> impl Iterator<Item = &str> {
        self.columns
            .iter()
            .map(|c| c.name.as_str())
            .filter(|n| !self.is_key(n))
    }

    /// `` `a`, `b`, `c` ``
    pub fn column_list(&self) -> String {
        self.columns
            .iter()
            .map(|c| quote(&c.name))
            .collect::<Vec<_>>()
            .join(", ")
    }

    pub fn create_sql(&self, dialect: Dialect) -> String {
        let mut defs: Vec<String> = self
            .columns
            .iter()
            .map(|c| {
                let null = if c.not_null { "NOT NULL" } else { "NULL" };
                format!("{} {} {}", quote(&c.name), dialect.column_type(c.kind), null)
            })
            .collect();
        let keys = self.key_columns().map(quote).collect::<Vec<_>>().join(", ");
        defs.push(format!("PRIMARY KEY ({keys})"));

        let suffix = match dialect {
            Dialect::Sqlite => "",
            Dialect::MySql => {
                for (name, column) in &self.indexes {
                    defs.push(format!("INDEX {} ({})", quote(name), quote(column)));
                }
                " ENGINE=InnoDB DEFAULT CHARSET=utf8mb4 COLLATE=utf8mb4_unicode_ci"
            }
        };
        format!(
            "CREATE TABLE IF NOT EXISTS {} (\n    {}\n){}",
            quote(&self.name),
            defs.join(",\n    "),
            suffix
        )
    }

    /// 테이블 생성 뒤 실행할 인덱스 DDL.
    ///
    /// MySQL은 `CREATE TABLE` 안에 선언하므로 비어 있습니다. SQLite 인덱스명은
    /// 스키마 전체에서 유일해야 해서 테이블명을 붙입니다.
    pub fn index_sql(&self, dialect: Dialect) -> Vec<String> {
        match dialect {
            Dialect::MySql => Vec::new(),
            Dialect::Sqlite => self
                .indexes
                .iter()
                .map(|(name, column)| {
                    format!(
                        "CREATE INDEX IF NOT EXISTS {} ON {} ({})",
                        quote(&format!("{}_{}", self.name, name)),
                        quote(&self.name),
                        quote(column)
                    )
                })
                .collect(),
        }
    }

    /// `INSERT ... VALUES` 뒤에 붙는 충돌 처리 구문.
    pub fn upsert_clause(&self, dialect: Dialect) -> String {
        match dialect {
            Dialect::Sqlite => {
                let keys = self.key_columns().map(quote).collect::<Vec<_>>().join(", ");
                let sets = self
                    .value_columns()
                    .map(|c| format!("{0} = excluded.{0}", quote(c)))
                    .collect::<Vec<_>>()
                    .join(", ");
                format!(" ON CONFLICT({keys}) DO UPDATE SET {sets}")
            }
            Dialect::MySql => {
                let sets = self
                    .value_columns()
                    .map(|c| format!("{0} = VALUES({0})", quote(c)))
                    .collect::<Vec<_>>()
                    .join(", ");
                format!(" ON DUPLICATE KEY UPDATE {sets}")
            }
        }
    }
}

pub(crate) fn quote(ident: &str) -> String {
    format!("`{}`", ident.replace('`', "``"))
}

fn tier_columns() -> Vec<(&'static str, ColumnKind)> {
    FlowTier::ALL
        .iter()
        .flat_map(|tier| {
            let (amount, ratio) = crate::labels::tier_labels(*tier);
            [(amount, ColumnKind::Real), (ratio, ColumnKind::Real)]
        })
        .collect()
}

pub const FUND_FLOW_TABLE: &str = "fund_flow_daily";
pub const PROFILE_TABLE: &str = "stock_basic_info_xq";
pub const DAILY_BAR_TABLE: &str = "stock_daily_em";
pub const RANK_TABLE: &str = "fund_flow_rank";

/// 분봉 테이블명 (`stock_minute_5m` 등).
pub fn minute_table(minutes: u32) -> String {
    format!("stock_minute_{minutes}m")
}

/// 분봉 테이블의 가격 컬럼.
pub const MINUTE_PRICE_COLUMNS: [&str; 6] = ["open", "close", "high", "low", "vol", "amount"];

/// 분봉 테이블의 구분별 자금 흐름 컬럼 ([`FlowTier::ALL`] 순서).
pub const MINUTE_FLOW_COLUMNS: [&str; 5] = ["main", "ultra_large", "large", "medium", "small"];

pub fn fund_flow_table() -> TableSpec {
    use ColumnKind::*;
    let mut columns = vec![
        ("代码", Varchar(6)),
        ("交易所", Varchar(4)),
        ("日期", Date),
        ("收盘价", Real),
        ("涨跌幅", Real),
    ];
    columns.extend(tier_columns());
    columns.push(("名称", Varchar(255)));
    TableSpec::new(FUND_FLOW_TABLE, &columns, &["代码", "交易所", "日期"])
}

pub fn profile_table() -> TableSpec {
    use ColumnKind::*;
    TableSpec::new(
        PROFILE_TABLE,
        &[
            ("代码", Varchar(6)),
            ("交易所", Varchar(4)),
            ("字段", Varchar(255)),
            ("值", LongText),
            ("更新时间", DateTime),
        ],
        &["代码", "交易所", "字段"],
    )
}

pub fn daily_bar_table() -> TableSpec {
    use ColumnKind::*;
    TableSpec::new(
        DAILY_BAR_TABLE,
        &[
            ("ts_code", Varchar(12)),
            ("股票代码", Varchar(6)),
            ("股票名称", Varchar(64)),
            ("日期", Date),
            ("开盘", Real),
            ("收盘", Real),
            ("最高", Real),
            ("最低", Real),
            ("成交量", Real),
            ("成交额", Real),
            ("振幅", Real),
            ("涨跌幅", Real),
            ("涨跌额", Real),
            ("换手率", Real),
            ("周期", Varchar(10)),
            ("复权", Varchar(4)),
        ],
        &["ts_code", "日期", "周期", "复权"],
    )
    .require(&["股票代码"])
}

/// 분봉 테이블 전체 정의 (가격 + 자금 흐름).
pub fn minute_bar_table(minutes: u32) -> TableSpec {
    use ColumnKind::*;
    let mut columns = vec![("ts_code", Varchar(12)), ("trade_time", DateTime)];
    columns.extend(MINUTE_PRICE_COLUMNS.iter().map(|c| (*c, Real)));
    columns.extend(MINUTE_FLOW_COLUMNS.iter().map(|c| (*c, Real)));
    TableSpec::new(minute_table(minutes), &columns, &["ts_code", "trade_time"])
        .index("idx_trade_time", "trade_time")
}

/// 분봉 가격만 쓰는 정의. 자금 흐름 컬럼은 건드리지 않습니다.
pub fn minute_price_table(minutes: u32) -> TableSpec {
    minute_bar_table(minutes).project(&MINUTE_PRICE_COLUMNS)
}

/// 분봉 자금 흐름만 쓰는 정의. 가격 컬럼은 건드리지 않습니다.
pub fn minute_flow_table(minutes: u32) -> TableSpec {
    minute_bar_table(minutes).project(&MINUTE_FLOW_COLUMNS)
}

pub fn rank_table() -> TableSpec {
    use ColumnKind::*;
    let mut columns = vec![
        ("采集时间", DateTime),
        ("指标", Varchar(16)),
        ("序号", Int),
        ("代码", Varchar(6)),
        ("名称", Varchar(255)),
        ("最新价", Real),
        ("涨跌幅", Real),
    ];
    columns.extend(tier_columns());
    TableSpec::new(RANK_TABLE, &columns, &["采集时间", "指标", "代码"])
}

/// `ensure_schema`가 만드는 전체 테이블.
pub fn all_tables() -> Vec<TableSpec> {
    let mut tables = vec![
        fund_flow_table(),
        profile_table(),
        daily_bar_table(),
        rank_table(),
    ];
    tables.extend(
        BarPeriod::MINUTES
            .iter()
            .filter_map(BarPeriod::minutes)
            .map(minute_bar_table),
    );
    tables
}
