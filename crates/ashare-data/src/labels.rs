//! 업스트림 컬럼 라벨.
//!
//! 공급자는 원본 행을 이 라벨로 이름 붙이고, 매퍼는 같은 라벨로 필드를 찾습니다.
//! 라벨은 기존 데이터베이스 및 AKShare 출력 컬럼명과 동일합니다.

use ashare_core::FlowTier;

pub const DATE: &str = "日期";
pub const TIME: &str = "时间";
pub const CODE: &str = "代码";
pub const NAME: &str = "名称";
pub const RANK: &str = "序号";
pub const CLOSE: &str = "收盘价";
pub const LATEST_PRICE: &str = "最新价";
pub const PCT_CHANGE: &str = "涨跌幅";

pub const OPEN: &str = "开盘";
pub const BAR_CLOSE: &str = "收盘";
pub const HIGH: &str = "最高";
pub const LOW: &str = "最低";
pub const VOLUME: &str = "成交量";
pub const AMOUNT: &str = "成交额";
pub const AMPLITUDE: &str = "振幅";
pub const CHANGE: &str = "涨跌额";
pub const TURNOVER: &str = "换手率";

/// 구분별 (순유입 금액 라벨, 순유입 비중 라벨).
pub fn tier_labels(tier: FlowTier) -> (&'static str, &'static str) {
    match tier {
        FlowTier::Main => ("主力净流入-净额", "主力净流入-净占比"),
        FlowTier::UltraLarge => ("超大单净流入-净额", "超大单净流入-净占比"),
        FlowTier::Large => ("大单净流入-净额", "大单净流入-净占比"),
        FlowTier::Medium => ("中单净流入-净额", "中单净流入-净占比"),
        FlowTier::Small => ("小单净流入-净额", "小单净流入-净占比"),
    }
}

/// 자금 흐름 일봉 컬럼 순서 (`fields2=f51..f65`).
pub const FUND_FLOW_COLUMNS: [&str; 13] = [
    DATE,
    "主力净流入-净额",
    "小单净流入-净额",
    "中单净流入-净额",
    "大单净流入-净额",
    "超大单净流入-净额",
    "主力净流入-净占比",
    "小单净流入-净占比",
    "中单净流入-净占比",
    "大单净流入-净占比",
    "超大单净流入-净占比",
    CLOSE,
    PCT_CHANGE,
];

/// 분 단위 자금 흐름 컬럼 순서 (`fields2=f51..f56`). 금액은 위안 단위.
pub const MINUTE_FLOW_COLUMNS: [&str; 6] = [
    TIME,
    "主力净流入-净额",
    "小单净流入-净额",
    "中单净流入-净额",
    "大单净流入-净额",
    "超大单净流入-净额",
];

/// 가격 봉 컬럼 순서 (`fields2=f51..f61`). 분봉은 첫 컬럼이 시각.
pub const KLINE_COLUMNS: [&str; 11] = [
    DATE, OPEN, BAR_CLOSE, HIGH, LOW, VOLUME, AMOUNT, AMPLITUDE, PCT_CHANGE, CHANGE, TURNOVER,
];

/// 기본 정보 필드: (Eastmoney 필드 ID, 라벨, 저장 필드명)
pub const PROFILE_FIELDS: [(&str, &str, &str); 8] = [
    ("f57", "股票代码", "code"),
    ("f58", "股票简称", "short_name"),
    ("f84", "总股本", "total_shares"),
    ("f85", "流通股", "float_shares"),
    ("f127", "行业", "industry"),
    ("f116", "总市值", "total_market_cap"),
    ("f117", "流通市值", "float_market_cap"),
    ("f189", "上市时间", "listing_date"),
];
