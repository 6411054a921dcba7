//! 원본 행 → 타입 레코드 변환.
//!
//! 모든 함수는 순수 함수입니다. 숫자가 아닌 값(빈 문자열, `-` 등)은 0이
//! 아니라 `None`이 됩니다. 금액은 억 위안(소수 4자리), 비율은 소수 2자리로
//! 반올림합니다. 분 단위 자금 흐름은 분봉 테이블과 같이 위안 단위로 둡니다.

use chrono::{NaiveDate, NaiveDateTime, NaiveTime, Timelike};
use std::collections::BTreeMap;

use crate::labels;
use crate::provider::RawRow;
use ashare_core::{
    normalize, Adjust, BarPeriod, FlowTier, FundFlowRankRow, FundFlowRecord, MinuteFundFlow,
    PriceBar, RankWindow, StockBasicProfile, StockIdentifier, TierFlow,
};

/// 위안 → 억 위안.
const YUAN_PER_YI: f64 = 1e8;
const AMOUNT_DECIMALS: i32 = 4;
const PERCENT_DECIMALS: i32 = 2;

/// 오전/오후 장 시작 (자정 기준 분).
const MORNING_OPEN: u32 = 9 * 60 + 30;
const AFTERNOON_OPEN: u32 = 13 * 60;
const NOON: u32 = 12 * 60;

/// 포함 구간 `[start, end]`. 한쪽이 없으면 그쪽은 열린 구간.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DateWindow {
    pub start: Option<NaiveDate>,
    pub end: Option<NaiveDate>,
}

impl DateWindow {
    pub fn new(start: Option<NaiveDate>, end: Option<NaiveDate>) -> Self {
        Self { start, end }
    }

    /// 하루짜리 구간.
    pub fn day(date: NaiveDate) -> Self {
        Self::new(Some(date), Some(date))
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start.map_or(true, |s| date >= s) && self.end.map_or(true, |e| date <= e)
    }
}

/// 숫자 문자열을 파싱합니다. 공백, `-`, 비숫자, NaN은 `None`.
pub fn parse_number(raw: &str) -> Option<f64> {
    let s = raw.trim().trim_end_matches('%').replace(',', "");
    if s.is_empty() || s == "-" || s == "--" {
        return None;
    }
    s.parse::<f64>().ok().filter(|v| v.is_finite())
}

/// 소수 `decimals`자리로 반올림 (0.5는 0에서 먼 쪽).
pub fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}

fn number(row: &RawRow, label: &str) -> Option<f64> {
    row.get(label).and_then(|v| parse_number(v))
}

fn percent(row: &RawRow, label: &str) -> Option<f64> {
    number(row, label).map(|v| round_to(v, PERCENT_DECIMALS))
}

fn amount_yi(row: &RawRow, label: &str) -> Option<f64> {
    number(row, label).map(|v| round_to(v / YUAN_PER_YI, AMOUNT_DECIMALS))
}

fn text(row: &RawRow, label: &str) -> Option<String> {
    row.get(label)
        .map(|v| v.trim())
        .filter(|v| !v.is_empty() && *v != "-")
        .map(str::to_string)
}

fn tier(row: &RawRow, tier: FlowTier) -> TierFlow {
    let (amount_label, ratio_label) = labels::tier_labels(tier);
    TierFlow::new(amount_yi(row, amount_label), percent(row, ratio_label))
}

fn parse_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .or_else(|_| NaiveDate::parse_from_str(raw, "%Y%m%d"))
        .ok()
}

fn parse_time(raw: &str) -> Option<NaiveDateTime> {
    let raw = raw.trim();
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M")
        .or_else(|_| NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S"))
        .ok()
        .or_else(|| parse_date(raw).map(|d| d.and_time(NaiveTime::MIN)))
}

/// 일별 자금 흐름 행을 레코드로 변환합니다.
///
/// 날짜를 해석할 수 없는 행은 버립니다. 결과는 날짜 오름차순입니다.
pub fn map_fund_flow(
    rows: &[RawRow],
    id: &StockIdentifier,
    window: DateWindow,
) -> Vec<FundFlowRecord> {
    let mut records: Vec<FundFlowRecord> = rows
        .iter()
        .filter_map(|row| {
            let date = row.get(labels::DATE).and_then(|d| parse_date(d))?;
            if !window.contains(date) {
                return None;
            }
            let mut record = FundFlowRecord::new(id.clone(), date);
            record.name = text(row, labels::NAME);
            record.close = number(row, labels::CLOSE);
            record.pct_change = percent(row, labels::PCT_CHANGE);
            for kind in FlowTier::ALL {
                *record.tier_mut(kind) = tier(row, kind);
            }
            Some(record)
        })
        .collect();

    records.sort_by_key(|r| r.date);
    records
}

/// K선 행을 가격 봉으로 변환합니다.
///
/// 분봉의 구간 필터는 거래 시각의 날짜 기준입니다.
pub fn map_bars(
    rows: &[RawRow],
    id: &StockIdentifier,
    period: BarPeriod,
    adjust: Adjust,
    window: DateWindow,
) -> Vec<PriceBar> {
    let time_label = if period.is_intraday() {
        labels::TIME
    } else {
        labels::DATE
    };

    let mut bars: Vec<PriceBar> = rows
        .iter()
        .filter_map(|row| {
            let timestamp = row.get(time_label).and_then(|t| parse_time(t))?;
            if !window.contains(timestamp.date()) {
                return None;
            }
            let mut bar = PriceBar::new(id.clone(), timestamp, period, adjust);
            bar.name = text(row, labels::NAME);
            bar.open = number(row, labels::OPEN);
            bar.close = number(row, labels::BAR_CLOSE);
            bar.high = number(row, labels::HIGH);
            bar.low = number(row, labels::LOW);
            bar.volume = number(row, labels::VOLUME);
            bar.amount = number(row, labels::AMOUNT);
            bar.amplitude = percent(row, labels::AMPLITUDE);
            bar.pct_change = percent(row, labels::PCT_CHANGE);
            bar.change = number(row, labels::CHANGE);
            bar.turnover = percent(row, labels::TURNOVER);
            Some(bar)
        })
        .collect();

    bars.sort_by_key(|b| b.timestamp);
    bars
}

/// 1분 자금 흐름이 속하는 `minutes`분 구간의 종료 시각.
///
/// 구간은 장 시작(09:30, 13:00)부터 자르며 종료 시각을 포함합니다. 같은
/// 간격 K선의 시각과 일치합니다 (09:31..09:45 → 09:45). 장 시작 이전 값은
/// 첫 구간에 넣습니다.
fn bucket_end(ts: NaiveDateTime, minutes: u32) -> Option<NaiveDateTime> {
    let of_day = ts.hour() * 60 + ts.minute();
    let open = if of_day < NOON { MORNING_OPEN } else { AFTERNOON_OPEN };
    let step = minutes.max(1);
    let elapsed = of_day.saturating_sub(open).max(1);
    let end = open + elapsed.div_ceil(step) * step;
    ts.date().and_hms_opt(end / 60, end % 60, 0)
}

/// 1분 자금 흐름 행을 `period` 간격으로 합산합니다.
///
/// 구분별 금액을 구간 안에서 더하고, 값이 하나도 없던 구분은 `None`으로
/// 둡니다. 분봉이 아닌 주기나 시각을 해석할 수 없는 행은 버립니다. 결과는
/// 시각 오름차순입니다.
pub fn map_minute_flow(
    rows: &[RawRow],
    id: &StockIdentifier,
    period: BarPeriod,
    window: DateWindow,
) -> Vec<MinuteFundFlow> {
    let Some(minutes) = period.minutes() else {
        return Vec::new();
    };

    let mut buckets: BTreeMap<NaiveDateTime, MinuteFundFlow> = BTreeMap::new();
    for row in rows {
        let Some(ts) = row.get(labels::TIME).and_then(|t| parse_time(t)) else {
            continue;
        };
        if !window.contains(ts.date()) {
            continue;
        }
        let Some(end) = bucket_end(ts, minutes) else {
            continue;
        };
        let flow = buckets
            .entry(end)
            .or_insert_with(|| MinuteFundFlow::new(id.clone(), end, period));
        for tier in FlowTier::ALL {
            let (amount_label, _) = labels::tier_labels(tier);
            flow.add(tier, number(row, amount_label));
        }
    }

    buckets.into_values().collect()
}

/// 기본 정보 행을 프로필로 변환합니다. 빈 값은 저장하지 않습니다.
pub fn map_profile(
    row: &RawRow,
    id: &StockIdentifier,
    fetched_at: NaiveDateTime,
) -> StockBasicProfile {
    let mut profile = StockBasicProfile::new(id.clone(), fetched_at);
    let fields: BTreeMap<String, String> = labels::PROFILE_FIELDS
        .iter()
        .filter_map(|(_, label, field)| text(row, label).map(|v| (field.to_string(), v)))
        .collect();
    profile.fields = fields;
    profile
}

/// 랭킹 행을 변환합니다.
///
/// 코드가 잘못된 행은 버립니다. `targets`가 있으면 해당 종목만 남깁니다.
/// 결과는 순위 오름차순입니다.
pub fn map_rank(
    rows: &[RawRow],
    window: RankWindow,
    captured_at: NaiveDateTime,
    targets: Option<&[StockIdentifier]>,
) -> Vec<FundFlowRankRow> {
    let mut ranked: Vec<FundFlowRankRow> = rows
        .iter()
        .enumerate()
        .filter_map(|(idx, row)| {
            let identifier = normalize(row.get(labels::CODE)?).ok()?;
            if targets.is_some_and(|t| !t.contains(&identifier)) {
                return None;
            }
            let rank = row
                .get(labels::RANK)
                .and_then(|r| r.trim().parse::<u32>().ok())
                .unwrap_or(idx as u32 + 1);
            Some(FundFlowRankRow {
                captured_at,
                window,
                rank,
                identifier,
                name: text(row, labels::NAME),
                latest_price: number(row, labels::LATEST_PRICE),
                pct_change: percent(row, labels::PCT_CHANGE),
                main: tier(row, FlowTier::Main),
                ultra_large: tier(row, FlowTier::UltraLarge),
                large: tier(row, FlowTier::Large),
                medium: tier(row, FlowTier::Medium),
                small: tier(row, FlowTier::Small),
            })
        })
        .collect();

    ranked.sort_by_key(|r| r.rank);
    ranked
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(pairs: &[(&'static str, &str)]) -> RawRow {
        pairs.iter().map(|(k, v)| (*k, v.to_string())).collect()
    }

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn flow_row(date: &str) -> RawRow {
        row(&[
            (labels::DATE, date),
            ("主力净流入-净额", "123456789.0"),
            ("主力净流入-净占比", "12.345"),
            ("超大单净流入-净额", "-98765432.1"),
            ("超大单净流入-净占比", ""),
            ("小单净流入-净额", "-"),
            (labels::CLOSE, "1700.5"),
            (labels::PCT_CHANGE, "12.345"),
        ])
    }

    #[test]
    fn test_parse_number() {
        assert_eq!(parse_number("12.5"), Some(12.5));
        assert_eq!(parse_number(" -3 "), Some(-3.0));
        assert_eq!(parse_number("1,234.5"), Some(1234.5));
        assert_eq!(parse_number(""), None);
        assert_eq!(parse_number("-"), None);
        assert_eq!(parse_number("abc"), None);
        assert_eq!(parse_number("NaN"), None);
    }

    #[test]
    fn test_percent_rounding() {
        assert_eq!(round_to(12.345, 2), 12.35);
        assert_eq!(round_to(-12.345, 2), -12.35);
        assert_eq!(round_to(1.23456789, 4), 1.2346);
    }

    #[test]
    fn test_map_fund_flow_scales_and_rounds() {
        let id = normalize("600519").unwrap();
        let records = map_fund_flow(&[flow_row("2024-03-01")], &id, DateWindow::default());

        assert_eq!(records.len(), 1);
        let r = &records[0];
        assert_eq!(r.date, d(2024, 3, 1));
        assert_eq!(r.pct_change, Some(12.35));
        assert_eq!(r.close, Some(1700.5));
        assert_eq!(r.main.net_amount, Some(1.2346));
        assert_eq!(r.main.net_ratio, Some(12.35));
        assert_eq!(r.ultra_large.net_amount, Some(-0.9877));
        // 빈 값과 "-"는 None
        assert_eq!(r.ultra_large.net_ratio, None);
        assert_eq!(r.small.net_amount, None);
        assert_eq!(r.medium, TierFlow::default());
    }

    #[test]
    fn test_map_fund_flow_filters_and_sorts() {
        let id = normalize("000001").unwrap();
        let rows = vec![
            flow_row("2024-03-05"),
            flow_row("2024-03-01"),
            flow_row("not-a-date"),
            flow_row("2024-03-04"),
        ];

        let all = map_fund_flow(&rows, &id, DateWindow::default());
        let dates: Vec<_> = all.iter().map(|r| r.date).collect();
        assert_eq!(dates, vec![d(2024, 3, 1), d(2024, 3, 4), d(2024, 3, 5)]);

        let window = DateWindow::new(Some(d(2024, 3, 2)), Some(d(2024, 3, 4)));
        let some = map_fund_flow(&rows, &id, window);
        assert_eq!(some.len(), 1);
        assert_eq!(some[0].date, d(2024, 3, 4));
    }

    #[test]
    fn test_map_fund_flow_is_idempotent() {
        let id = normalize("600519").unwrap();
        let rows = vec![flow_row("2024-03-04"), flow_row("2024-03-01")];
        let first = map_fund_flow(&rows, &id, DateWindow::default());
        let second = map_fund_flow(&rows, &id, DateWindow::default());
        assert_eq!(first, second);
    }

    #[test]
    fn test_map_minute_bars() {
        let id = normalize("000001").unwrap();
        let rows = vec![
            row(&[(labels::TIME, "2024-03-01 09:40"), (labels::OPEN, "10.2"), (labels::VOLUME, "800")]),
            row(&[(labels::TIME, "2024-03-01 09:35"), (labels::OPEN, "10.1"), (labels::TURNOVER, "0.014")]),
        ];

        let bars = map_bars(&rows, &id, BarPeriod::Min5, Adjust::None, DateWindow::default());
        assert_eq!(bars.len(), 2);
        assert_eq!(bars[0].timestamp.format("%H:%M").to_string(), "09:35");
        assert_eq!(bars[0].turnover, Some(0.01));
        assert_eq!(bars[1].volume, Some(800.0));
        assert_eq!(bars[1].close, None);
    }

    fn minute_flow_row(time: &str, main: &str, small: &str) -> RawRow {
        row(&[
            (labels::TIME, time),
            ("主力净流入-净额", main),
            ("小单净流入-净额", small),
        ])
    }

    #[test]
    fn test_bucket_end_follows_sessions() {
        let at = |h, m| d(2024, 3, 1).and_hms_opt(h, m, 0).unwrap();
        assert_eq!(bucket_end(at(9, 31), 15), Some(at(9, 45)));
        assert_eq!(bucket_end(at(9, 45), 15), Some(at(9, 45)));
        assert_eq!(bucket_end(at(9, 46), 15), Some(at(10, 0)));
        assert_eq!(bucket_end(at(9, 30), 15), Some(at(9, 45)));
        assert_eq!(bucket_end(at(13, 1), 15), Some(at(13, 15)));
        // 60분봉은 10:30, 11:30, 14:00, 15:00
        assert_eq!(bucket_end(at(10, 31), 60), Some(at(11, 30)));
        assert_eq!(bucket_end(at(13, 1), 60), Some(at(14, 0)));
        assert_eq!(bucket_end(at(15, 0), 60), Some(at(15, 0)));
        assert_eq!(bucket_end(at(14, 7), 1), Some(at(14, 7)));
    }

    #[test]
    fn test_map_minute_flow_sums_into_intervals() {
        let id = normalize("000001").unwrap();
        let rows = vec![
            minute_flow_row("2024-03-01 09:46", "300", "-"),
            minute_flow_row("2024-03-01 09:31", "1000", "-200"),
            minute_flow_row("2024-03-01 09:45", "-400", "50"),
            minute_flow_row("garbage", "1", "1"),
        ];

        let flows = map_minute_flow(&rows, &id, BarPeriod::Min15, DateWindow::default());
        assert_eq!(flows.len(), 2);

        assert_eq!(flows[0].trade_time.format("%H:%M").to_string(), "09:45");
        assert_eq!(flows[0].main, Some(600.0));
        assert_eq!(flows[0].small, Some(-150.0));
        assert_eq!(flows[0].large, None);
        assert_eq!(flows[0].period, BarPeriod::Min15);

        assert_eq!(flows[1].trade_time.format("%H:%M").to_string(), "10:00");
        assert_eq!(flows[1].main, Some(300.0));
        assert_eq!(flows[1].small, None);
    }

    #[test]
    fn test_map_minute_flow_window_and_period() {
        let id = normalize("000001").unwrap();
        let rows = vec![minute_flow_row("2024-03-01 09:31", "1000", "0")];

        let outside = DateWindow::day(d(2024, 3, 4));
        assert!(map_minute_flow(&rows, &id, BarPeriod::Min5, outside).is_empty());
        assert!(map_minute_flow(&rows, &id, BarPeriod::Daily, DateWindow::default()).is_empty());

        let one = map_minute_flow(&rows, &id, BarPeriod::Min1, DateWindow::default());
        assert_eq!(one[0].trade_time.format("%H:%M").to_string(), "09:31");
    }

    #[test]
    fn test_map_daily_bars_window() {
        let id = normalize("600519").unwrap();
        let rows = vec![
            row(&[(labels::DATE, "2024-02-29"), (labels::BAR_CLOSE, "1690")]),
            row(&[(labels::DATE, "2024-03-01"), (labels::BAR_CLOSE, "1700")]),
        ];
        let bars = map_bars(
            &rows,
            &id,
            BarPeriod::Daily,
            Adjust::Qfq,
            DateWindow::day(d(2024, 3, 1)),
        );
        assert_eq!(bars.len(), 1);
        assert_eq!(bars[0].date(), d(2024, 3, 1));
        assert_eq!(bars[0].adjust, Adjust::Qfq);
    }

    #[test]
    fn test_map_profile_skips_blank_fields() {
        let id = normalize("600519").unwrap();
        let at = d(2024, 3, 1).and_hms_opt(10, 0, 0).unwrap();
        let raw = row(&[("股票简称", "贵州茅台"), ("行业", "-"), ("总市值", "")]);

        let profile = map_profile(&raw, &id, at);
        assert_eq!(profile.display_name(), Some("贵州茅台"));
        assert_eq!(profile.fields.len(), 1);
    }

    #[test]
    fn test_map_rank_with_targets() {
        let at = d(2024, 3, 1).and_hms_opt(14, 30, 0).unwrap();
        let rows = vec![
            row(&[(labels::RANK, "2"), (labels::CODE, "000001"), ("主力净流入-净额", "50000000")]),
            row(&[(labels::RANK, "1"), (labels::CODE, "600519"), ("主力净流入-净额", "250000000")]),
            row(&[(labels::RANK, "3"), (labels::CODE, "bad")]),
        ];

        let all = map_rank(&rows, RankWindow::Today, at, None);
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].identifier.code(), "600519");
        assert_eq!(all[0].main.net_amount, Some(2.5));

        let targets = vec![normalize("000001").unwrap()];
        let filtered = map_rank(&rows, RankWindow::Today, at, Some(&targets));
        assert_eq!(filtered.len(), 1);
        assert_eq!(filtered[0].rank, 2);
    }
}
