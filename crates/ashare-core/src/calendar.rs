//! 거래일 캘린더.
//!
//! 기본 구현은 요일만 봅니다 (월~금 = 거래일). 공휴일 목록이 필요하면
//! [`TradingCalendar`]를 구현한 다른 타입을 주입하면 됩니다.

use chrono::{Datelike, Duration, NaiveDate, Weekday};

/// 이전 거래일 탐색 시 거슬러 올라갈 최대 일수.
const MAX_LOOKBACK_DAYS: i64 = 30;

/// 거래일 판정.
pub trait TradingCalendar: Send + Sync {
    fn is_trading_day(&self, date: NaiveDate) -> bool;

    /// `date`보다 엄격히 이전인 가장 최근 거래일.
    fn previous_trading_day(&self, date: NaiveDate) -> Option<NaiveDate> {
        (1..=MAX_LOOKBACK_DAYS)
            .map(|offset| date - Duration::days(offset))
            .find(|d| self.is_trading_day(*d))
    }

    /// `[start, end]` 구간의 거래일 목록. `end < start`이면 빈 목록.
    fn trading_days(&self, start: NaiveDate, end: NaiveDate) -> Vec<NaiveDate> {
        start
            .iter_days()
            .take_while(|d| *d <= end)
            .filter(|d| self.is_trading_day(*d))
            .collect()
    }
}

/// 주말만 휴장으로 보는 캘린더.
#[derive(Debug, Clone, Copy, Default)]
pub struct WeekdayCalendar;

impl TradingCalendar for WeekdayCalendar {
    fn is_trading_day(&self, date: NaiveDate) -> bool {
        !matches!(date.weekday(), Weekday::Sat | Weekday::Sun)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn test_previous_trading_day_skips_weekend() {
        let cal = WeekdayCalendar;
        // 2024-03-04 월요일 → 직전 금요일
        assert_eq!(cal.previous_trading_day(d(2024, 3, 4)), Some(d(2024, 3, 1)));
        // 화요일 → 월요일 (당일 제외)
        assert_eq!(cal.previous_trading_day(d(2024, 3, 5)), Some(d(2024, 3, 4)));
        assert_eq!(cal.previous_trading_day(d(2024, 3, 3)), Some(d(2024, 3, 1)));
    }

    #[test]
    fn test_trading_days_range() {
        let cal = WeekdayCalendar;
        let days = cal.trading_days(d(2024, 3, 1), d(2024, 3, 5));
        assert_eq!(days, vec![d(2024, 3, 1), d(2024, 3, 4), d(2024, 3, 5)]);

        assert!(cal.trading_days(d(2024, 3, 5), d(2024, 3, 1)).is_empty());
    }
}
